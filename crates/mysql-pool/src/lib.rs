//! # mysql-pool
//!
//! Keyed connection pooling for the MySQL driver.
//!
//! Each distinct [`PoolKey`](mysql_client::PoolKey) gets one process-wide
//! pool holding idle sessions, a hard ceiling on concurrent leases, and a
//! background worker that reaps stale entries, refills the floor, and
//! probes quarantined hosts. Sessions returning to the pool are reset
//! (`COM_RESET_CONNECTION`) or destroyed; a session that carried a fatal
//! error is never reused.
//!
//! ## Example
//!
//! ```rust,ignore
//! use mysql_pool::manager;
//!
//! let config = std::sync::Arc::new(Config::from_connection_string(
//!     "Server=db;User ID=app;Password=secret;Maximum Pool Size=20",
//! )?);
//!
//! let mut session = manager::acquire(&config).await?;
//! session.execute("INSERT INTO t VALUES (1)").await?;
//! // Dropping the lease returns the session to the pool.
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod balance;
pub mod error;
pub mod manager;
pub mod pool;

pub use balance::HostBalancer;
pub use error::PoolError;
pub use pool::{Pool, PoolStatus, PooledSession};
