//! # mysql-types
//!
//! Value model and row decoding for the MySQL driver.
//!
//! Cells arrive either as text (one length-encoded string per column) or
//! in the binary protocol's per-type layouts; both paths produce the same
//! [`Value`] for the same server-side value, so callers never care which
//! protocol a statement ran under. Conversions into Rust types go through
//! [`FromValue`] and fail with a [`TypeError`] that never poisons the
//! session.

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![allow(clippy::cast_possible_truncation)]

pub mod decode;
pub mod encode;
pub mod error;
pub mod from_value;
pub mod guid;
pub mod value;

pub use decode::{
    DecodeOptions, decode_binary_row, decode_binary_value, decode_text_row, decode_text_value,
};
pub use encode::{UNSIGNED_FLAG, encode_param_value, param_type_bytes};
pub use error::TypeError;
pub use from_value::FromValue;
pub use guid::{GuidFormat, decode_guid};
pub use value::{Date, DateTime, Time, Value};
