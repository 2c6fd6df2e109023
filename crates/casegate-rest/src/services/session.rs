//! Credential check against `GET /currentuser` and login tickets issued on
//! behalf of named users.

use super::ServiceContext;
use crate::credentials::{CredentialBroker, Credentials};
use crate::envelope::{object_properties, Page, Row};
use crate::error::{Error, Result};
use crate::transport::{RestRequest, Transport};
use casegate_dql::statement::generate_login_ticket;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

const CURRENT_USER_PATH: &str = "/currentuser";
/// Lifetime the repository gives tickets from `generateUserLoginTicket`.
const USER_TICKET_MINUTES: u32 = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthenticatedUser {
    pub username: String,
    pub properties: Row,
}

/// A login ticket minted for one user by the service account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserTicket {
    pub username: String,
    pub ticket: String,
    pub valid_for_minutes: u32,
}

pub struct SessionService {
    transport: Arc<dyn Transport>,
    broker: Arc<CredentialBroker>,
    configured: Credentials,
}

impl SessionService {
    pub fn new(context: &ServiceContext) -> Self {
        Self {
            transport: context.transport().clone(),
            broker: context.broker().clone(),
            configured: context.config().user_credentials(),
        }
    }

    /// Verify `credentials` with the repository. A blank username checks the
    /// configured account instead.
    pub fn authenticate(&self, credentials: &Credentials) -> Result<AuthenticatedUser> {
        let credentials = if credentials.username.trim().is_empty() {
            &self.configured
        } else {
            credentials
        };

        let request = RestRequest::get(CURRENT_USER_PATH, &credentials.basic_header());
        let body = self.transport.execute(&request).map_err(|err| match err.status() {
            Some(401) => Error::InvalidCredentials,
            Some(403) => Error::AccessDenied,
            _ => Error::request("authenticate")(err),
        })?;

        let properties = object_properties(&body).cloned().unwrap_or_default();
        let username = properties
            .get("user_name")
            .and_then(Value::as_str)
            .unwrap_or(credentials.username.as_str())
            .to_string();

        tracing::info!(username = %username, "authenticated");
        Ok(AuthenticatedUser { username, properties })
    }

    /// Whether the configured account is still accepted.
    pub fn verify_configured(&self) -> Result<AuthenticatedUser> {
        self.authenticate(&self.configured)
    }

    /// Ask the repository to mint a login ticket for `username` (the
    /// configured user when `None` or blank). Runs with the service header.
    pub fn issue_user_ticket(&self, username: Option<&str>) -> Result<UserTicket> {
        let username = username
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(self.configured.username.as_str())
            .to_string();

        let body = self.broker.execute_as_service(&self.configured.username, |header| {
            let request = RestRequest::get("", header)
                .param("dql", generate_login_ticket(&username))
                .param("inline", true);
            self.transport.execute(&request)
        });
        let page = body
            .and_then(Page::from_value)
            .map_err(Error::request("issue login ticket"))?;

        let Some(entry) = page.entries.first() else {
            return Err(Error::TicketNotIssued {
                username,
                reason: "method execution returned no results".to_string(),
            });
        };
        let result = entry
            .properties()
            .and_then(|properties| properties.get("result"))
            .and_then(Value::as_str)
            .map(str::trim);
        let ticket = match result {
            None => {
                return Err(Error::TicketNotIssued {
                    username,
                    reason: "no result returned from method".to_string(),
                })
            }
            Some(text) if text.is_empty() || text.starts_with("ERROR:") => {
                return Err(Error::TicketNotIssued {
                    username,
                    reason: text.to_string(),
                })
            }
            Some(text) => text.to_string(),
        };

        tracing::info!(username = %username, "issued user login ticket");
        Ok(UserTicket {
            username,
            ticket,
            valid_for_minutes: USER_TICKET_MINUTES,
        })
    }
}
