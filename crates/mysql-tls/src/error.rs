//! TLS error types.

use thiserror::Error;

/// Errors that can occur while configuring or performing TLS.
#[derive(Debug, Error)]
pub enum TlsError {
    /// Invalid TLS configuration.
    #[error("TLS configuration error: {0}")]
    Configuration(String),

    /// A certificate could not be parsed or added to the store.
    #[error("invalid certificate: {0}")]
    InvalidCertificate(String),

    /// The hostname could not be used for SNI or validation.
    #[error("invalid server name `{0}`")]
    InvalidServerName(String),

    /// The TLS handshake failed.
    #[error("TLS handshake failed: {0}")]
    HandshakeFailed(String),

    /// IO error during the handshake.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for TLS operations.
pub type Result<T> = std::result::Result<T, TlsError>;
