//! Authorization headers for repository calls.
//!
//! Regular lookups authenticate with the user's Basic credentials. Elevated
//! lookups go through a privileged service account; instead of sending its
//! password on every call we obtain a login ticket once and reuse it until
//! shortly before the repository expires it.
//!
//! Ticket acquisition never fails the caller: if the ticket endpoint is
//! unreachable or answers nonsense, the service account's Basic header is
//! used for that call ([`ServiceCredential::Fallback`]).

use crate::config::RestConfig;
use crate::envelope::LoginTicket;
use crate::transport::{RestRequest, Transport, TransportError};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Tickets live ~10 minutes upstream; we stop using them a minute early.
pub const TICKET_LIFETIME_MINUTES: i64 = 9;

pub const LOGIN_TICKETS_PATH: &str = "/login-tickets";

// ============================================================================
// Credentials
// ============================================================================

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    /// `Basic base64(username:password)`
    pub fn basic_header(&self) -> String {
        let token = STANDARD.encode(format!("{}:{}", self.username, self.password));
        format!("Basic {token}")
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

// ============================================================================
// Clock
// ============================================================================

/// Time source for ticket expiry.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// ============================================================================
// Broker
// ============================================================================

/// What the privileged account authenticates with for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceCredential {
    /// A live login ticket.
    Ticket(String),
    /// A complete `Authorization` value used instead of a ticket.
    Fallback(String),
}

impl ServiceCredential {
    pub fn authorization(&self) -> String {
        match self {
            Self::Ticket(ticket) => format!("DmTicket {ticket}"),
            Self::Fallback(header) => header.clone(),
        }
    }

    pub fn is_ticket(&self) -> bool {
        matches!(self, Self::Ticket(_))
    }
}

#[derive(Debug, Clone)]
struct CachedTicket {
    value: String,
    expires_at: DateTime<Utc>,
}

/// Produces `Authorization` values and owns the service-account ticket cache.
///
/// One instance is shared (via `Arc`) by everything talking to the same
/// repository. The cache lock is held across a refresh, so concurrent callers
/// that find the ticket expired wait for a single refresh.
pub struct CredentialBroker {
    user: Credentials,
    service: Option<Credentials>,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    lifetime: Duration,
    cache: Mutex<Option<CachedTicket>>,
}

impl CredentialBroker {
    pub fn new(
        user: Credentials,
        service: Option<Credentials>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let service = service.filter(|c| !c.username.trim().is_empty());
        Self {
            user,
            service,
            transport,
            clock: Arc::new(SystemClock),
            lifetime: Duration::minutes(TICKET_LIFETIME_MINUTES),
            cache: Mutex::new(None),
        }
    }

    pub fn from_config(config: &RestConfig, transport: Arc<dyn Transport>) -> Self {
        Self::new(
            config.user_credentials(),
            config.service_credentials(),
            transport,
        )
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn is_privileged_configured(&self) -> bool {
        self.service.is_some()
    }

    /// Basic header of the configured user.
    pub fn user_auth_header(&self) -> String {
        self.user.basic_header()
    }

    /// Header for elevated calls; the user's header when no service account
    /// is configured.
    pub fn service_auth_header(&self) -> String {
        if !self.is_privileged_configured() {
            tracing::warn!("service account not configured, using regular user credentials");
            return self.user_auth_header();
        }
        self.get_or_refresh_ticket().authorization()
    }

    /// Cached ticket while `now < expiry`, otherwise one `POST /login-tickets`.
    pub fn get_or_refresh_ticket(&self) -> ServiceCredential {
        let Some(service) = self.service.as_ref() else {
            return ServiceCredential::Fallback(self.user_auth_header());
        };

        let mut cache = self.cache.lock();
        let now = self.clock.now();
        if let Some(ticket) = cache.as_ref() {
            if now < ticket.expires_at {
                return ServiceCredential::Ticket(ticket.value.clone());
            }
        }
        *cache = None;

        let basic = service.basic_header();
        match self.request_ticket(&basic) {
            Ok(value) => {
                let expires_at = now + self.lifetime;
                tracing::info!(
                    account = %service.username,
                    expires_at = %expires_at,
                    "obtained service account login ticket"
                );
                *cache = Some(CachedTicket {
                    value: value.clone(),
                    expires_at,
                });
                ServiceCredential::Ticket(value)
            }
            Err(err) => {
                tracing::error!(
                    account = %service.username,
                    error = %err,
                    "failed to obtain service account login ticket; using basic credentials"
                );
                ServiceCredential::Fallback(basic)
            }
        }
    }

    /// Drop the cached ticket; the next elevated call fetches a fresh one.
    pub fn invalidate(&self) {
        *self.cache.lock() = None;
        tracing::info!("service account login ticket cache cleared");
    }

    /// Expiry of the cached ticket, if one is held (expired or not).
    pub fn ticket_expiry(&self) -> Option<DateTime<Utc>> {
        self.cache.lock().as_ref().map(|t| t.expires_at)
    }

    /// Run `operation` with the service header, recording who asked for it.
    pub fn execute_as_service<T>(&self, actual_user: &str, operation: impl FnOnce(&str) -> T) -> T {
        tracing::info!(
            user = actual_user,
            "executing privileged operation using service account"
        );
        let header = self.service_auth_header();
        operation(&header)
    }

    fn request_ticket(&self, basic: &str) -> Result<String, TransportError> {
        let response = self
            .transport
            .execute(&RestRequest::post(LOGIN_TICKETS_PATH, basic))?;
        let ticket: LoginTicket = serde_json::from_value(response)
            .map_err(|e| TransportError::Decode(format!("login ticket: {e}")))?;
        if ticket.id.trim().is_empty() {
            return Err(TransportError::Decode("login ticket without id".to_string()));
        }
        Ok(ticket.id)
    }
}

impl fmt::Debug for CredentialBroker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialBroker")
            .field("user", &self.user)
            .field("service", &self.service)
            .field("ticket_expiry", &self.ticket_expiry())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ManualClock, ScriptedTransport};
    use crate::transport::Method;
    use serde_json::json;

    fn broker(transport: &Arc<ScriptedTransport>, clock: &Arc<ManualClock>) -> CredentialBroker {
        CredentialBroker::new(
            Credentials::new("clerk", "pw"),
            Some(Credentials::new("svc", "svc-pw")),
            transport.clone(),
        )
        .with_clock(clock.clone())
    }

    #[test]
    fn test_basic_header_encoding() {
        let creds = Credentials::new("Aladdin", "open sesame");
        assert_eq!(creds.basic_header(), "Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ==");
    }

    #[test]
    fn test_debug_redacts_password() {
        let creds = Credentials::new("clerk", "hunter2");
        assert!(!format!("{creds:?}").contains("hunter2"));
    }

    #[test]
    fn test_ticket_cached_within_lifetime() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_ok(json!({ "id": "ticket-1" }));
        let clock = Arc::new(ManualClock::default());
        let broker = broker(&transport, &clock);

        assert_eq!(
            broker.get_or_refresh_ticket(),
            ServiceCredential::Ticket("ticket-1".to_string())
        );
        clock.advance(Duration::minutes(8));
        assert_eq!(
            broker.get_or_refresh_ticket(),
            ServiceCredential::Ticket("ticket-1".to_string())
        );
        assert_eq!(transport.request_count(), 1);

        let request = &transport.requests()[0];
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.path, LOGIN_TICKETS_PATH);
        assert_eq!(request.authorization, Credentials::new("svc", "svc-pw").basic_header());
    }

    #[test]
    fn test_ticket_refreshed_once_after_expiry() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_ok(json!({ "id": "ticket-1" }));
        transport.push_ok(json!({ "id": "ticket-2" }));
        let clock = Arc::new(ManualClock::default());
        let broker = broker(&transport, &clock);

        broker.get_or_refresh_ticket();
        broker.get_or_refresh_ticket();
        clock.advance(Duration::minutes(TICKET_LIFETIME_MINUTES));

        assert_eq!(broker.service_auth_header(), "DmTicket ticket-2");
        assert_eq!(broker.service_auth_header(), "DmTicket ticket-2");
        assert_eq!(transport.request_count(), 2);
    }

    #[test]
    fn test_ticket_failure_falls_back_to_service_basic() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_err(TransportError::Network("connection refused".to_string()));
        transport.push_ok(json!({ "id": "ticket-after-outage" }));
        let clock = Arc::new(ManualClock::default());
        let broker = broker(&transport, &clock);

        let credential = broker.get_or_refresh_ticket();
        assert_eq!(
            credential,
            ServiceCredential::Fallback(Credentials::new("svc", "svc-pw").basic_header())
        );
        assert!(credential.authorization().starts_with("Basic "));
        assert!(broker.ticket_expiry().is_none());

        // The failure is not cached; the next call tries again.
        assert!(broker.get_or_refresh_ticket().is_ticket());
    }

    #[test]
    fn test_ticket_without_id_falls_back() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_ok(json!({ "name": "no id here" }));
        let clock = Arc::new(ManualClock::default());
        let broker = broker(&transport, &clock);

        assert!(!broker.get_or_refresh_ticket().is_ticket());
    }

    #[test]
    fn test_invalidate_forces_refresh() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_ok(json!({ "id": "ticket-1" }));
        transport.push_ok(json!({ "id": "ticket-2" }));
        let clock = Arc::new(ManualClock::default());
        let broker = broker(&transport, &clock);

        broker.get_or_refresh_ticket();
        assert!(broker.ticket_expiry().is_some());
        broker.invalidate();
        assert!(broker.ticket_expiry().is_none());
        assert_eq!(
            broker.get_or_refresh_ticket(),
            ServiceCredential::Ticket("ticket-2".to_string())
        );
    }

    #[test]
    fn test_unconfigured_service_account_uses_user_header() {
        let transport = Arc::new(ScriptedTransport::new());
        let broker = CredentialBroker::new(
            Credentials::new("clerk", "pw"),
            Some(Credentials::new("  ", "ignored")),
            transport.clone(),
        );

        assert!(!broker.is_privileged_configured());
        assert_eq!(broker.service_auth_header(), broker.user_auth_header());
        assert_eq!(transport.request_count(), 0);
    }

    #[test]
    fn test_execute_as_service_passes_service_header() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_ok(json!({ "id": "ticket-1" }));
        let clock = Arc::new(ManualClock::default());
        let broker = broker(&transport, &clock);

        let seen = broker.execute_as_service("clerk", |header| header.to_string());
        assert_eq!(seen, "DmTicket ticket-1");
    }
}
