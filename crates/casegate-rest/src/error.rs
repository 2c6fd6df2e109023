use crate::config::ConfigError;
use crate::transport::TransportError;

/// Failures surfaced to callers of the session layer.
///
/// Recoverable conditions (hint parsing, ticket refresh) never show up here;
/// they are absorbed where they happen.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("query cannot be empty")]
    EmptyQuery,

    /// A page request failed mid-loop; rows fetched so far were discarded.
    #[error("query failed on page {page}: {source}")]
    QueryExecution {
        page: u32,
        #[source]
        source: TransportError,
    },

    #[error("{operation} failed: {source}")]
    Request {
        operation: &'static str,
        #[source]
        source: TransportError,
    },

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("access denied")]
    AccessDenied,

    /// The repository's ticket method answered without a usable ticket.
    #[error("no login ticket issued for {username}: {reason}")]
    TicketNotIssued { username: String, reason: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub(crate) fn request(operation: &'static str) -> impl FnOnce(TransportError) -> Self {
        move |source| Self::Request { operation, source }
    }
}
