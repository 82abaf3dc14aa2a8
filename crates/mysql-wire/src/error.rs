//! Protocol error definitions.

use core::fmt;

/// Errors produced while encoding or decoding wire-protocol payloads.
///
/// Any of these means the byte stream no longer matches what the protocol
/// grammar allows; the owning session must treat the transport as unusable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// The payload ended before a field could be fully read.
    UnexpectedEof {
        /// What was being decoded when the payload ran out.
        context: &'static str,
    },

    /// A length-encoded integer began with a reserved prefix byte.
    InvalidLengthEncoding(u8),

    /// The received sequence id does not match the expected counter.
    UnexpectedSequence {
        /// Sequence id the session expected.
        expected: u8,
        /// Sequence id carried by the frame.
        actual: u8,
    },

    /// The server spoke a handshake protocol version other than 10.
    UnsupportedProtocolVersion(u8),

    /// A column definition carried a type code this driver does not know.
    UnknownColumnType(u8),

    /// A packet payload exceeded the negotiated maximum.
    PacketTooLarge {
        /// Actual payload size.
        size: usize,
        /// Negotiated maximum.
        max: usize,
    },

    /// The payload violated the expected packet grammar.
    Malformed(&'static str),

    /// A string field was not valid UTF-8 where the protocol requires it.
    InvalidUtf8 {
        /// The field that failed to decode.
        context: &'static str,
    },
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEof { context } => {
                write!(f, "truncated packet while reading {context}")
            }
            Self::InvalidLengthEncoding(byte) => {
                write!(f, "invalid length-encoded integer prefix 0x{byte:02X}")
            }
            Self::UnexpectedSequence { expected, actual } => {
                write!(f, "unexpected sequence id {actual}, expected {expected}")
            }
            Self::UnsupportedProtocolVersion(v) => {
                write!(f, "unsupported handshake protocol version {v}")
            }
            Self::UnknownColumnType(code) => {
                write!(f, "unknown column type code 0x{code:02X}")
            }
            Self::PacketTooLarge { size, max } => {
                write!(f, "packet payload of {size} bytes exceeds maximum {max}")
            }
            Self::Malformed(msg) => write!(f, "malformed packet: {msg}"),
            Self::InvalidUtf8 { context } => write!(f, "invalid utf-8 in {context}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ProtocolError {}

/// Result alias for protocol operations.
pub type Result<T> = core::result::Result<T, ProtocolError>;
