//! Client error types.

use std::sync::Arc;

use mysql_wire::response::ErrPacket;
use thiserror::Error;

/// Which time budget expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    /// The TCP/TLS/handshake budget.
    Connect,
    /// The per-command budget, after cancellation also failed to land.
    Command,
    /// Waiting for a pooled session.
    PoolAcquire,
}

/// Errors surfaced by the driver.
///
/// The variants split into two families: errors that poison the session
/// (the transport can no longer be trusted) and errors that leave it
/// usable. [`Error::is_fatal`] encodes the split; the pool destroys
/// sessions returned after a fatal error.
#[derive(Debug, Error)]
pub enum Error {
    /// The server answered a command with an ERR packet.
    ///
    /// Non-fatal: the session has consumed the whole response and remains
    /// usable.
    #[error("server error {code} ({sqlstate}): {message}")]
    Server {
        /// MySQL error code.
        code: u16,
        /// Five-character SQLSTATE.
        sqlstate: String,
        /// Message text.
        message: String,
    },

    /// The byte stream violated the protocol. Always fatal.
    #[error("protocol error: {0}")]
    Protocol(#[from] mysql_wire::ProtocolError),

    /// Framing-level failure. Fatal.
    #[error("codec error: {0}")]
    Codec(#[from] mysql_codec::CodecError),

    /// The handshake failed to authenticate. Fatal.
    #[error("authentication failed: {0}")]
    Auth(#[from] mysql_auth::AuthError),

    /// TLS negotiation failed. Fatal.
    #[error("TLS error: {0}")]
    Tls(#[from] mysql_tls::TlsError),

    /// Transport-level IO failure. Fatal.
    #[error("IO error: {0}")]
    Io(Arc<std::io::Error>),

    /// A time budget expired.
    #[error("timeout expired: {0:?}")]
    Timeout(TimeoutKind),

    /// The command was cancelled; carries the server-side interruption
    /// when KILL QUERY landed.
    #[error("command cancelled")]
    Cancelled {
        /// The `QueryInterrupted` server error, if the server confirmed.
        #[source]
        source: Option<Box<Error>>,
    },

    /// A value could not be converted to the requested type. Non-fatal.
    #[error("conversion error: {0}")]
    Conversion(#[from] mysql_types::TypeError),

    /// The caller violated the API contract. Non-fatal.
    #[error("usage error: {0}")]
    Usage(String),

    /// The session is poisoned from an earlier failure and refuses new
    /// commands.
    #[error("session is poisoned and cannot be reused")]
    Poisoned,

    /// Connection configuration was invalid.
    #[error("configuration error: {0}")]
    Config(String),
}

/// `ER_QUERY_INTERRUPTED` code surfaced after a KILL QUERY.
pub const ER_QUERY_INTERRUPTED: u16 = mysql_wire::ER_QUERY_INTERRUPTED;

impl Error {
    /// Build a server error from a parsed ERR packet.
    #[must_use]
    pub fn from_err_packet(err: ErrPacket) -> Self {
        Self::Server {
            code: err.code,
            sqlstate: err.sqlstate,
            message: err.message,
        }
    }

    /// Whether this error poisons the session it occurred on.
    ///
    /// Server errors, conversion errors, and usage errors leave the
    /// session usable; everything touching the transport or the protocol
    /// state machine does not.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Server { .. } | Self::Conversion(_) | Self::Usage(_) => false,
            Self::Cancelled { source } => source.as_deref().map_or(true, Error::is_fatal),
            Self::Timeout(kind) => !matches!(kind, TimeoutKind::PoolAcquire),
            Self::Protocol(_)
            | Self::Codec(_)
            | Self::Auth(_)
            | Self::Tls(_)
            | Self::Io(_)
            | Self::Poisoned
            | Self::Config(_) => true,
        }
    }

    /// Whether this is the server-side query-interrupted error.
    #[must_use]
    pub fn is_query_interrupted(&self) -> bool {
        matches!(self, Self::Server { code, .. } if *code == ER_QUERY_INTERRUPTED)
    }

    /// The server error code, if this is a server error.
    #[must_use]
    pub fn server_code(&self) -> Option<u16> {
        match self {
            Self::Server { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(Arc::new(e))
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    fn server_error(code: u16) -> Error {
        Error::Server {
            code,
            sqlstate: "HY000".into(),
            message: "test".into(),
        }
    }

    #[test]
    fn test_server_errors_are_not_fatal() {
        assert!(!server_error(1062).is_fatal());
        assert!(!Error::Usage("bad index".into()).is_fatal());
    }

    #[test]
    fn test_transport_errors_are_fatal() {
        let io = Error::from(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset",
        ));
        assert!(io.is_fatal());
        assert!(Error::Poisoned.is_fatal());
        assert!(
            Error::Protocol(mysql_wire::ProtocolError::Malformed("x")).is_fatal()
        );
    }

    #[test]
    fn test_cancelled_with_server_source_is_not_fatal() {
        let cancelled = Error::Cancelled {
            source: Some(Box::new(server_error(ER_QUERY_INTERRUPTED))),
        };
        assert!(!cancelled.is_fatal());

        // Cancellation that never got a server confirmation poisons.
        let unconfirmed = Error::Cancelled { source: None };
        assert!(unconfirmed.is_fatal());
    }

    #[test]
    fn test_query_interrupted_detection() {
        assert!(server_error(ER_QUERY_INTERRUPTED).is_query_interrupted());
        assert!(!server_error(1062).is_query_interrupted());
    }

    #[test]
    fn test_pool_acquire_timeout_not_fatal() {
        assert!(!Error::Timeout(TimeoutKind::PoolAcquire).is_fatal());
        assert!(Error::Timeout(TimeoutKind::Command).is_fatal());
    }
}
