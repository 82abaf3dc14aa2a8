//! Pool error types.

use thiserror::Error;

/// Errors produced by the connection pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// No session became available within the acquisition deadline.
    #[error("timed out waiting for a pooled session")]
    AcquireTimeout,

    /// The pool has been closed.
    #[error("pool is closed")]
    Closed,

    /// Invalid pool configuration.
    #[error("pool configuration error: {0}")]
    Configuration(String),

    /// Opening or resetting a session failed.
    #[error(transparent)]
    Client(#[from] mysql_client::Error),
}

impl PoolError {
    /// Convert into the client error space for callers that work with a
    /// single error type.
    #[must_use]
    pub fn into_client_error(self) -> mysql_client::Error {
        match self {
            Self::AcquireTimeout => {
                mysql_client::Error::Timeout(mysql_client::TimeoutKind::PoolAcquire)
            }
            Self::Closed => mysql_client::Error::Usage("pool is closed".into()),
            Self::Configuration(msg) => mysql_client::Error::Config(msg),
            Self::Client(e) => e,
        }
    }
}

/// Result type for pool operations.
pub type Result<T> = std::result::Result<T, PoolError>;
