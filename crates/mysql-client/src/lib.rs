//! # mysql-client
//!
//! The connection core of the driver: the session state machine, the
//! command executor, and the configuration surface.
//!
//! A [`Session`] is one logical connection — transport, sequence
//! counter, negotiated capabilities, prepared-statement cache — driven
//! by exactly one task at a time. Commands run under the configured time
//! budgets; cancellation goes server-side through a sidecar session
//! issuing `KILL QUERY`, and every failure path either fully consumes
//! the response or poisons the session so a half-read frame can never
//! leak into the next command.
//!
//! ## Example
//!
//! ```rust,ignore
//! use mysql_client::{Config, Session};
//!
//! let config = Config::from_connection_string(
//!     "Server=db.example.com;User ID=app;Password=secret;Database=orders",
//! )?;
//! let mut session = Session::connect(config.into()).await?;
//!
//! let mut rows = session.query("SELECT id, total FROM orders").await?;
//! while let Some(row) = rows.next_row().await? {
//!     let id: u64 = row.get(0)?;
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod blocking;
pub mod config;
pub mod error;
pub mod executor;
pub mod params;
pub mod query;
pub mod row;
pub mod session;
pub mod statement;
pub mod transaction;

pub use config::{CancellationTimeout, Config, LoadBalance, LocalInfileHandler, PoolKey};
pub use error::{Error, Result, TimeoutKind};
pub use executor::CancelToken;
pub use params::Params;
pub use query::{CommandResult, QueryStream};
pub use row::Row;
pub use session::{Session, SessionState};
pub use statement::{PreparedStatement, StatementCache};
pub use transaction::Transaction;

// The collaborating layers re-exported for downstream crates.
pub use mysql_tls::SslMode;
pub use mysql_types::{FromValue, GuidFormat, Value};
