//! # mysql-wire
//!
//! Pure implementation of the MySQL client/server wire protocol
//! (4.1 through 8.x compatible).
//!
//! This crate provides `no_std` compatible packet structures, payload
//! primitives, and handshake/response parsing. It is intentionally
//! IO-agnostic: it contains no networking logic and makes no assumptions
//! about the async runtime. Higher-level crates build upon this foundation
//! to provide framing and connection management.
//!
//! ## Features
//!
//! - `std` (default): Enable standard library support
//! - `alloc`: Enable allocation without full std (requires `alloc` crate)
//!
//! ## Layout
//!
//! - [`packet`] — the 4-byte frame header and size limits
//! - [`io`] — length-encoded integers, protocol strings, LE fields
//! - [`capability`] — capability and status flag sets
//! - [`handshake`] — greeting, SSL request, handshake response, auth loop
//! - [`response`] — OK / ERR / EOF / LOCAL INFILE packets
//! - [`column`] — column definitions, type codes, column flags
//! - [`version`] — server banner parsing

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]
#![deny(unsafe_code)]
#![allow(clippy::cast_possible_truncation)]

#[cfg(all(not(feature = "std"), not(feature = "alloc")))]
compile_error!(
    "mysql-wire requires either the `std` feature (default) or the `alloc` feature. \
     Enable at least one: `--features std` or `--features alloc`"
);

#[cfg(feature = "alloc")]
extern crate alloc;

// Internal prelude for no_std compatibility - provides String, Vec, etc.
mod prelude;

pub mod capability;
pub mod charset;
pub mod column;
pub mod command;
pub mod error;
pub mod handshake;
pub mod io;
pub mod packet;
pub mod response;
pub mod version;

pub use capability::{Capabilities, StatusFlags};
pub use column::{ColumnDefinition, ColumnFlags, ColumnType};
pub use command::Command;
pub use error::ProtocolError;
pub use handshake::{
    AuthMoreData, AuthSwitchRequest, DEFAULT_AUTH_PLUGIN, HandshakeResponse, InitialHandshake,
    MAX_ALLOWED_PACKET, SslRequest,
};
pub use io::{LENENC_NULL, PayloadReader, PayloadWriter};
pub use packet::{COMPRESSED_HEADER_SIZE, MAX_PAYLOAD_SIZE, PACKET_HEADER_SIZE, PacketHeader};
pub use response::{
    EofPacket, ER_QUERY_INTERRUPTED, ErrPacket, LocalInfilePacket, OkPacket, ResponseKind,
    is_row_terminator,
};
pub use version::{ServerVersion, Vendor};
