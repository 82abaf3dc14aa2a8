//! Explicit transaction control.

use crate::error::Result;
use crate::query::CommandResult;
use crate::session::Session;

impl Session {
    /// Open an explicit transaction.
    pub async fn begin(&mut self) -> Result<Transaction<'_>> {
        self.execute("START TRANSACTION").await?;
        Ok(Transaction {
            session: self,
            completed: false,
        })
    }
}

/// An open transaction bound to a session lease.
///
/// Commit and rollback consume the guard. A guard dropped without either
/// leaves the server-side transaction open; the session's `IN_TRANS`
/// status stays set, and the pool's reset-on-return rolls it back before
/// the session is reused.
pub struct Transaction<'a> {
    session: &'a mut Session,
    completed: bool,
}

impl Transaction<'_> {
    /// Run SQL inside the transaction.
    pub async fn execute(&mut self, sql: &str) -> Result<CommandResult> {
        self.session.execute(sql).await
    }

    /// The session this transaction runs on.
    pub fn session(&mut self) -> &mut Session {
        self.session
    }

    /// Commit the transaction.
    pub async fn commit(mut self) -> Result<()> {
        self.session.execute("COMMIT").await?;
        self.completed = true;
        Ok(())
    }

    /// Roll the transaction back.
    pub async fn rollback(mut self) -> Result<()> {
        self.session.execute("ROLLBACK").await?;
        self.completed = true;
        Ok(())
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.completed && self.session.in_transaction() {
            tracing::warn!(
                thread_id = self.session.thread_id(),
                "transaction dropped without commit or rollback; it will be rolled back on pool return"
            );
        }
    }
}

impl std::fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("completed", &self.completed)
            .finish_non_exhaustive()
    }
}
