//! Codec error types.

use mysql_wire::ProtocolError;
use thiserror::Error;

/// Errors that can occur in the framing layer.
#[derive(Debug, Error)]
pub enum CodecError {
    /// IO error on the underlying transport.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Wire-protocol violation in a frame.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The transport closed mid-frame or mid-payload.
    #[error("connection closed unexpectedly")]
    ConnectionClosed,

    /// The zlib stream inside a compressed envelope was invalid.
    #[error("compression error: {0}")]
    Compression(String),
}

/// Result type for codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;
