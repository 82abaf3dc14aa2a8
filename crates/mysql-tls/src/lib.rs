//! # mysql-tls
//!
//! TLS layering for MySQL connections, built on rustls.
//!
//! MySQL upgrades to TLS in the middle of its handshake: the client sends
//! a truncated SSL Request packet in the clear, both sides switch the
//! transport to TLS, and the handshake continues encrypted. This crate
//! provides the connector and the policy knobs; the interleave itself is
//! driven by the session.
//!
//! The five policy levels mirror the `SSL Mode` connection-string key:
//! `Disabled`, `Preferred`, `Required`, `VerifyCa`, `VerifyFull`.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod connector;
pub mod error;

pub use config::{SslMode, TlsConfig};
pub use connector::{TlsConnector, TlsStream};
pub use error::TlsError;
