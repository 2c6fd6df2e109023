//! Test doubles: a scripted transport and a hand-driven clock.

use crate::credentials::Clock;
use crate::transport::{RestRequest, Transport, TransportError};
use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;

/// Replays queued responses in order and records every request.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<Value, TransportError>>>,
    requests: Mutex<Vec<RestRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_ok(&self, value: Value) {
        self.responses.lock().push_back(Ok(value));
    }

    pub(crate) fn push_err(&self, err: TransportError) {
        self.responses.lock().push_back(Err(err));
    }

    pub(crate) fn requests(&self) -> Vec<RestRequest> {
        self.requests.lock().clone()
    }

    pub(crate) fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

impl Transport for ScriptedTransport {
    fn execute(&self, request: &RestRequest) -> Result<Value, TransportError> {
        self.requests.lock().push(request.clone());
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Network("no scripted response".to_string())))
    }
}

pub(crate) struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self {
            now: Mutex::new(Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap()),
        }
    }
}

impl ManualClock {
    pub(crate) fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// A DQL page envelope with `count` rows numbered from `start`.
pub(crate) fn dql_page(start: usize, count: usize, next: bool) -> Value {
    let entries: Vec<Value> = (start..start + count)
        .map(|i| {
            json!({
                "content": { "properties": {
                    "r_object_id": format!("0b{i:014}"),
                    "object_name": format!("case-{i}")
                } }
            })
        })
        .collect();
    let mut links = vec![json!({ "rel": "self", "href": "https://repo/self" })];
    if next {
        links.push(json!({ "rel": "next", "href": "https://repo/next" }));
    }
    json!({ "entries": entries, "links": links })
}
