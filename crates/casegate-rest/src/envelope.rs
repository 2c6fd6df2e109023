//! Response envelopes returned by the repository REST API.
//!
//! ```json
//! { "entries": [ { "content": { "properties": { "r_object_id": "..." } } } ],
//!   "links":   [ { "rel": "next", "href": "..." } ] }
//! ```
//!
//! Entries are kept loose (`serde_json::Value`): a partial entry without a
//! property bag is skipped by the flattener rather than failing the page.

use crate::transport::TransportError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Ordered column → value mapping (insertion order preserved).
pub type Row = Map<String, Value>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub entries: Vec<Entry>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub links: Vec<Link>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default, rename = "items-per-page")]
    pub items_per_page: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    #[serde(default)]
    pub content: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub rel: String,
    #[serde(default)]
    pub href: Option<String>,
}

/// `POST /login-tickets` response.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginTicket {
    pub id: String,
}

impl Page {
    pub fn from_value(value: Value) -> Result<Self, TransportError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value).map_err(|e| TransportError::Decode(format!("page envelope: {e}")))
    }

    pub fn link(&self, rel: &str) -> Option<&Link> {
        self.links.iter().find(|l| l.rel == rel)
    }

    /// True when the repository advertises another page.
    pub fn has_next(&self) -> bool {
        self.link("next").is_some()
    }
}

impl Entry {
    pub fn properties(&self) -> Option<&Row> {
        self.content.get("properties")?.as_object()
    }
}

/// Property bag of a single-object response (`GET /objects/<id>`).
pub fn object_properties(value: &Value) -> Option<&Row> {
    value.get("properties")?.as_object()
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
