//! casegate REST session layer
//!
//! Talks to a content repository's REST API on behalf of the casegate tools:
//!
//! ```text
//!   caller ──► QueryRewriter ──► PagedFetcher ──► Transport ──► repository
//!                                   │   ▲
//!                 CredentialBroker ◄┘   └── ResponseFlattener (per page)
//! ```
//!
//! - [`credentials`]: Basic headers and the cached service-account ticket,
//! - [`fetch`]: sequential page loop with a hard page bound,
//! - [`flatten`]: `entries[].content.properties` → uniform rows,
//! - [`services`]: case, group, user, workflow and ad-hoc query lookups.
//!
//! All calls are blocking; one request runs one page loop on the caller's
//! thread.

pub mod config;
pub mod credentials;
pub mod envelope;
pub mod error;
pub mod fetch;
pub mod flatten;
pub mod services;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{ConfigError, RestConfig};
pub use credentials::{Clock, CredentialBroker, Credentials, ServiceCredential, SystemClock};
pub use envelope::{Entry, Link, Page, Row};
pub use error::{Error, Result};
pub use fetch::{AuthScope, PageSlice, PagedFetcher, RowSet};
pub use flatten::ResponseFlattener;
pub use services::{
    ActiveUser, AuthenticatedUser, CaseService, GroupService, QueryOutcome, QueryService,
    ServiceContext, SessionService, UserService, UserTicket, WorkflowService,
};
pub use transport::{HttpTransport, Method, RestRequest, Transport, TransportError};
