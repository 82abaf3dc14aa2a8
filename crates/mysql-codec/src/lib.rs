//! # mysql-codec
//!
//! Async framing layer for MySQL packet handling.
//!
//! This crate transforms raw byte streams into logical MySQL payloads,
//! handling frame reassembly across TCP segment boundaries, continuation
//! of payloads larger than 2^24 - 1 bytes, sequence-id bookkeeping, and
//! the optional compression envelope.
//!
//! ## Architecture
//!
//! ```text
//! TCP/TLS stream → CompressedCodec (optional) → PacketCodec → PayloadAssembler → Session
//! ```
//!
//! The session reads and writes whole logical payloads through
//! [`PacketConn`]; everything below that line lives here.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod assembler;
pub mod compression;
pub mod connection;
pub mod error;
pub mod framed;
pub mod packet_codec;

pub use assembler::PayloadAssembler;
pub use compression::{CompressedCodec, MIN_COMPRESS_LENGTH};
pub use connection::{BoxTransport, PacketConn, Transport};
pub use error::CodecError;
pub use framed::{PacketReader, PacketStream, PacketWriter};
pub use packet_codec::{Packet, PacketCodec};
