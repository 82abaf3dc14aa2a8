//! Type conversion error types.

use thiserror::Error;

/// Errors that can occur while decoding or converting values.
///
/// Conversion errors never poison the session: the row was fully read off
/// the wire before conversion is attempted.
#[derive(Debug, Error)]
pub enum TypeError {
    /// Value is NULL where a non-null value was requested.
    #[error("unexpected null value")]
    UnexpectedNull,

    /// Type mismatch during conversion.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Expected type name.
        expected: &'static str,
        /// Actual value type name.
        actual: &'static str,
    },

    /// Value does not fit in the target type.
    #[error("value out of range for {target}")]
    OutOfRange {
        /// Target type name.
        target: &'static str,
    },

    /// A text-protocol field failed to parse as its column type.
    #[error("cannot parse `{text}` as {ty}")]
    InvalidText {
        /// Offending text, truncated for the message.
        text: String,
        /// Column type name.
        ty: &'static str,
    },

    /// A binary-protocol field had an invalid layout.
    #[error("invalid binary value for {ty}: {detail}")]
    InvalidBinary {
        /// Column type name.
        ty: &'static str,
        /// What was wrong with it.
        detail: &'static str,
    },

    /// The year 0000-00-00 style zero date was rejected by configuration.
    #[error("zero datetime value rejected; enable AllowZeroDateTime or ConvertZeroDateTime")]
    ZeroDateTime,

    /// A GUID column had an unexpected length for the configured format.
    #[error("invalid GUID value: {0}")]
    InvalidGuid(String),
}

/// Result type for conversions.
pub type Result<T> = std::result::Result<T, TypeError>;
