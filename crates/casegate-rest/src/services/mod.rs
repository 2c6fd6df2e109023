//! Repository lookups used by the casegate front end.
//!
//! Each service is a thin composition of statement builders, the paged
//! fetcher and the flattener. They share one transport and one
//! [`CredentialBroker`] through a [`ServiceContext`].

pub mod cases;
pub mod groups;
pub mod query;
pub mod session;
pub mod users;
pub mod workflows;

pub use cases::CaseService;
pub use groups::GroupService;
pub use query::{QueryOutcome, QueryService};
pub use session::{AuthenticatedUser, SessionService, UserTicket};
pub use users::{ActiveUser, UserService};
pub use workflows::WorkflowService;

use crate::config::{ConfigError, RestConfig};
use crate::credentials::CredentialBroker;
use crate::fetch::PagedFetcher;
use crate::transport::{HttpTransport, Transport};
use std::sync::Arc;

/// Shared wiring for every service talking to one repository.
#[derive(Clone)]
pub struct ServiceContext {
    config: Arc<RestConfig>,
    transport: Arc<dyn Transport>,
    broker: Arc<CredentialBroker>,
}

impl ServiceContext {
    pub fn new(config: RestConfig, transport: Arc<dyn Transport>) -> Self {
        let broker = Arc::new(CredentialBroker::from_config(&config, transport.clone()));
        Self::with_broker(config, transport, broker)
    }

    pub fn with_broker(
        config: RestConfig,
        transport: Arc<dyn Transport>,
        broker: Arc<CredentialBroker>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            transport,
            broker,
        }
    }

    /// Wire against the real repository over HTTP.
    pub fn connect(config: RestConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(&config)?);
        Ok(Self::new(config, transport))
    }

    pub fn config(&self) -> &RestConfig {
        &self.config
    }

    pub fn broker(&self) -> &Arc<CredentialBroker> {
        &self.broker
    }

    pub fn fetcher(&self) -> PagedFetcher {
        PagedFetcher::new(self.transport.clone(), self.broker.clone())
    }

    pub fn query(&self) -> QueryService {
        QueryService::new(self)
    }

    pub fn cases(&self) -> CaseService {
        CaseService::new(self)
    }

    pub fn groups(&self) -> GroupService {
        GroupService::new(self)
    }

    pub fn users(&self) -> UserService {
        UserService::new(self)
    }

    pub fn workflows(&self) -> WorkflowService {
        WorkflowService::new(self)
    }

    pub fn session(&self) -> SessionService {
        SessionService::new(self)
    }

    pub(crate) fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }
}
