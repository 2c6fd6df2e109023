//! `cms_user_profile` directory and `dm_user` accounts.
//!
//! Toggling `is_active` on a profile also enables or disables the matching
//! repository account. The account update is best effort: a failure is
//! logged and the profile change still goes through.

use super::ServiceContext;
use crate::credentials::CredentialBroker;
use crate::envelope::{object_properties, Row};
use crate::error::{Error, Result};
use crate::fetch::{PageSlice, PagedFetcher};
use crate::flatten::ResponseFlattener;
use crate::transport::{RestRequest, Transport};
use casegate_dql::statement::{
    self, profile_login_name, set_user_state, user_profile_search, ACTIVE_USER_LIMIT,
    EDITABLE_PROFILE_PROPERTIES, USER_PROFILE_COLUMNS,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

const OBJECTS_PATH: &str = "/objects";
const SUPERUSER_PRIVILEGES: i64 = 16;

/// One enabled repository account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveUser {
    pub username: String,
    pub email: Option<String>,
    pub is_superuser: bool,
}

pub struct UserService {
    profiles: PagedFetcher,
    accounts: PagedFetcher,
    transport: Arc<dyn Transport>,
    broker: Arc<CredentialBroker>,
}

impl UserService {
    pub fn new(context: &ServiceContext) -> Self {
        Self {
            profiles: context
                .fetcher()
                .with_flattener(ResponseFlattener::with_columns(USER_PROFILE_COLUMNS.iter().copied())),
            accounts: context.fetcher(),
            transport: context.transport().clone(),
            broker: context.broker().clone(),
        }
    }

    pub fn search(&self, term: Option<&str>, page: u32, items_per_page: u32) -> Result<PageSlice> {
        let statement = user_profile_search(term);
        tracing::debug!(statement = %statement, page, "searching user profiles");
        self.profiles.fetch_page(&statement, page, items_per_page)
    }

    /// Enabled `dm_user` accounts, by name.
    pub fn active_users(&self) -> Result<Vec<ActiveUser>> {
        let slice = self
            .accounts
            .fetch_page(&statement::active_users(), 1, ACTIVE_USER_LIMIT)?;

        let users: Vec<ActiveUser> = slice
            .rows
            .iter()
            .filter_map(|row| {
                let username = row.get("user_name").and_then(Value::as_str)?.to_string();
                let email = row
                    .get("user_address")
                    .and_then(Value::as_str)
                    .filter(|address| !address.is_empty())
                    .map(str::to_string);
                let is_superuser =
                    row.get("user_privileges").and_then(Value::as_i64) == Some(SUPERUSER_PRIVILEGES);
                Some(ActiveUser {
                    username,
                    email,
                    is_superuser,
                })
            })
            .collect();

        tracing::debug!(count = users.len(), "listed active accounts");
        Ok(users)
    }

    /// Apply `changes` to a profile object and return its updated properties.
    ///
    /// Only [`EDITABLE_PROFILE_PROPERTIES`] are sent; other keys are dropped.
    pub fn update_profile(&self, object_id: &str, changes: &Row) -> Result<Row> {
        let object_id = object_id.trim();
        if let Some(active) = changes.get("is_active") {
            self.sync_account_state(object_id, truthy(active))?;
        }

        let properties: Row = changes
            .iter()
            .filter(|(key, _)| EDITABLE_PROFILE_PROPERTIES.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        let dropped = changes.len() - properties.len();
        if dropped > 0 {
            tracing::warn!(object_id, dropped, "ignoring non-editable profile properties");
        }

        let request = RestRequest::patch(
            &format!("{OBJECTS_PATH}/{object_id}"),
            &self.broker.user_auth_header(),
            json!({ "properties": properties }),
        );
        let body = self
            .transport
            .execute(&request)
            .map_err(Error::request("update user profile"))?;

        tracing::info!(object_id, "updated user profile");
        Ok(object_properties(&body).cloned().unwrap_or_default())
    }

    fn sync_account_state(&self, profile_id: &str, active: bool) -> Result<()> {
        let lookup = self.accounts.fetch_page(&profile_login_name(profile_id), 1, 1)?;
        let login = lookup
            .rows
            .first()
            .and_then(|row| row.get("user_login_name"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|login| !login.is_empty());
        let Some(login) = login else {
            tracing::warn!(profile_id, "profile has no login name; account state unchanged");
            return Ok(());
        };

        tracing::info!(user = login, active, "syncing account state");
        let request = RestRequest::get("", &self.broker.user_auth_header())
            .param("dql", set_user_state(login, active));
        if let Err(err) = self.transport.execute(&request) {
            tracing::warn!(user = login, error = %err, "account state update failed");
        }
        Ok(())
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::String(text) => text.trim().eq_ignore_ascii_case("true"),
        _ => false,
    }
}
