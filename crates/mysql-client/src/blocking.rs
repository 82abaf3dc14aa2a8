//! Blocking facade over the async core.
//!
//! The same protocol engine runs under a private current-thread runtime;
//! every method maps one-to-one onto its async counterpart with identical
//! semantics. Intended for tools and tests that have no runtime of their
//! own — inside an async context, use [`Session`](crate::Session)
//! directly.

use std::sync::Arc;

use tokio::runtime::{Builder, Runtime};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::params::Params;
use crate::query::CommandResult;
use crate::row::Row;
use crate::session::{Session, SessionState};

/// A blocking connection: an async [`Session`] plus the runtime that
/// drives it.
pub struct Connection {
    runtime: Runtime,
    session: Session,
}

impl Connection {
    /// Connect using a parsed configuration.
    pub fn connect(config: Config) -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_io()
            .enable_time()
            .build()
            .map_err(Error::from)?;
        let session = runtime.block_on(Session::connect(Arc::new(config)))?;
        Ok(Self { runtime, session })
    }

    /// Connect using a connection string.
    pub fn connect_str(connection_string: &str) -> Result<Self> {
        Self::connect(Config::from_connection_string(connection_string)?)
    }

    /// Execute SQL and return the final summary.
    pub fn execute(&mut self, sql: &str) -> Result<CommandResult> {
        self.runtime.block_on(self.session.execute(sql))
    }

    /// Execute SQL with text-protocol parameter interpolation.
    pub fn execute_with_params(&mut self, sql: &str, params: &Params) -> Result<CommandResult> {
        self.runtime
            .block_on(self.session.execute_with_params(sql, params))
    }

    /// Run a query and collect every row of every result set.
    ///
    /// The blocking facade materializes rows; lazy streaming is an async
    /// concern.
    pub fn query(&mut self, sql: &str) -> Result<Vec<Row>> {
        self.runtime.block_on(async {
            let mut stream = self.session.query(sql).await?;
            let mut rows = stream.collect_rows().await?;
            while stream.next_result().await? {
                rows.extend(stream.collect_rows().await?);
            }
            Ok(rows)
        })
    }

    /// Run a parameterized query through the binary protocol.
    pub fn query_prepared(&mut self, sql: &str, params: &Params) -> Result<Vec<Row>> {
        self.runtime.block_on(async {
            let mut stream = self.session.query_prepared(sql, params).await?;
            let mut rows = stream.collect_rows().await?;
            while stream.next_result().await? {
                rows.extend(stream.collect_rows().await?);
            }
            Ok(rows)
        })
    }

    /// Liveness check.
    pub fn ping(&mut self) -> Result<()> {
        self.runtime.block_on(self.session.ping())
    }

    /// Reset the session to a pristine state.
    pub fn reset(&mut self) -> Result<()> {
        self.runtime.block_on(self.session.reset())
    }

    /// Change the default database.
    pub fn select_db(&mut self, database: &str) -> Result<()> {
        self.runtime.block_on(self.session.select_db(database))
    }

    /// Open a transaction; commit and rollback run through [`execute`].
    ///
    /// [`execute`]: Self::execute
    pub fn begin(&mut self) -> Result<CommandResult> {
        self.execute("START TRANSACTION")
    }

    /// Commit the open transaction.
    pub fn commit(&mut self) -> Result<CommandResult> {
        self.execute("COMMIT")
    }

    /// Roll back the open transaction.
    pub fn rollback(&mut self) -> Result<CommandResult> {
        self.execute("ROLLBACK")
    }

    /// Current protocol state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// The underlying async session.
    #[must_use]
    pub fn session(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Close the connection.
    pub fn close(mut self) {
        self.runtime.block_on(self.session.close());
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}
