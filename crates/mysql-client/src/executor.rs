//! Command orchestration: time budgets, cancellation, and the
//! drain-or-poison guarantee.
//!
//! MySQL delivers no out-of-band data to a busy session, so cancellation
//! runs through a sidecar: a fresh pool-bypassing session issues
//! `KILL QUERY <thread-id>` and the original query fails with
//! `ER_QUERY_INTERRUPTED`. The executor's job is the bookkeeping around
//! that: fire the sidecar at the right moment, keep reading the original
//! session until the interruption (or a clean finish) arrives, and poison
//! the session if the server never reacts inside the grace window.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use mysql_wire::Capabilities;
use mysql_wire::response::{ErrPacket, ResponseKind, is_row_terminator};
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

use crate::config::CancellationTimeout;
use crate::error::{Error, Result, TimeoutKind};
use crate::params::{Params, interpolate_params};
use crate::query::{self, CommandResult, QueryStream, ResponseEvent};
use crate::session::{Session, SessionState};
use crate::statement;

/// Cancellation signal shared between a command and its canceller.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: CancellationToken,
}

impl CancelToken {
    /// Create an unsignalled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation. Safe to call from any task, any number of
    /// times.
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    async fn wait(&self) {
        self.inner.cancelled().await;
    }
}

enum Outcome<T> {
    Done(T),
    TimedOut,
    Cancelled,
}

/// How an interrupted command was brought to rest.
enum Settled {
    /// The server killed the query; here is its ERR.
    ServerError(Error),
    /// The command finished cleanly while the interrupt was in flight.
    CompletedAnyway,
    /// The session could not be driven to a terminal state.
    Poisoned,
}

impl Session {
    /// Execute SQL and drain every result set, under the configured
    /// command timeout.
    pub async fn execute(&mut self, sql: &str) -> Result<CommandResult> {
        self.execute_cancellable(sql, None).await
    }

    /// Execute SQL with parameters interpolated into the text protocol.
    ///
    /// User variables in parameterized SQL are rejected unless the
    /// configuration sets `Allow User Variables`.
    pub async fn execute_with_params(
        &mut self,
        sql: &str,
        params: &Params,
    ) -> Result<CommandResult> {
        if !self.config().allow_user_variables && crate::params::contains_user_variables(sql) {
            return Err(Error::Usage(
                "SQL references a @user variable; set `Allow User Variables=true` to permit this"
                    .into(),
            ));
        }
        let sql = interpolate_params(sql, params.values())?;
        self.execute_cancellable(&sql, None).await
    }

    /// Execute SQL, optionally honoring an external cancellation token.
    pub async fn execute_cancellable(
        &mut self,
        sql: &str,
        cancel: Option<&CancelToken>,
    ) -> Result<CommandResult> {
        let budget = self.config().command_timeout;
        let outcome = {
            let work = query::execute_text(self, sql);
            tokio::pin!(work);
            run_until_interrupt(&mut work, budget, cancel).await
        };

        match outcome {
            Outcome::Done(result) => result,
            Outcome::TimedOut => Err(self.interrupt_command(false).await),
            Outcome::Cancelled => Err(self.interrupt_command(true).await),
        }
    }

    /// Run a query and stream its rows.
    ///
    /// The command timeout covers the request and the first response; row
    /// streaming is caller-paced and not under a budget.
    pub async fn query(&mut self, sql: &str) -> Result<QueryStream<'_>> {
        let budget = self.config().command_timeout;
        self.send_command(mysql_wire::Command::Query, sql.as_bytes())
            .await?;

        let outcome = {
            let work = query::read_command_response(self);
            tokio::pin!(work);
            run_until_interrupt(&mut work, budget, None).await
        };

        match outcome {
            Outcome::Done(Ok(ResponseEvent::Ok(ok))) => Ok(QueryStream::completed(self, ok)),
            Outcome::Done(Ok(ResponseEvent::ResultSet(columns))) => {
                Ok(QueryStream::new(self, columns, false))
            }
            Outcome::Done(Err(e)) => Err(e),
            Outcome::TimedOut => Err(self.interrupt_command(false).await),
            Outcome::Cancelled => Err(self.interrupt_command(true).await),
        }
    }

    /// Run a query with parameters through the binary protocol,
    /// preparing (or reusing) a server-side statement.
    pub async fn query_prepared(
        &mut self,
        sql: &str,
        params: &Params,
    ) -> Result<QueryStream<'_>> {
        let stmt = statement::prepare(self, sql).await?;
        statement::execute(self, &stmt, params.values()).await
    }

    /// Execute a prepared statement and drain its result sets, under the
    /// configured command timeout.
    pub async fn execute_prepared(
        &mut self,
        sql: &str,
        params: &Params,
    ) -> Result<CommandResult> {
        let stmt = statement::prepare(self, sql).await?;
        let budget = self.config().command_timeout;

        let outcome = {
            let work = async {
                let stream = statement::execute(self, &stmt, params.values()).await?;
                stream.drain().await
            };
            tokio::pin!(work);
            run_until_interrupt(&mut work, budget, None).await
        };

        match outcome {
            Outcome::Done(result) => result,
            Outcome::TimedOut => Err(self.interrupt_command(false).await),
            Outcome::Cancelled => Err(self.interrupt_command(true).await),
        }
    }

    /// Bring an interrupted command to rest and produce its error.
    ///
    /// `external` distinguishes a caller-driven cancel (surfaced as
    /// [`Error::Cancelled`]) from a timeout (surfaced as the server's
    /// interruption error, or [`Error::Timeout`] after poisoning).
    async fn interrupt_command(&mut self, external: bool) -> Error {
        let cancellation = self.config().cancellation_timeout;

        let settled = match cancellation {
            CancellationTimeout::PoisonImmediately => {
                // No KILL: the contract is to fail fast and give up the
                // connection.
                self.poison();
                Settled::Poisoned
            }
            CancellationTimeout::After(grace) => {
                self.spawn_kill_sidecar(grace);
                match timeout(grace, drain_interrupted(self)).await {
                    Ok(Ok(Some(server_error))) => Settled::ServerError(server_error),
                    Ok(Ok(None)) => Settled::CompletedAnyway,
                    Ok(Err(fatal)) => return fatal,
                    Err(_elapsed) => {
                        self.poison();
                        Settled::Poisoned
                    }
                }
            }
        };

        match settled {
            Settled::ServerError(server_error) => {
                if external {
                    Error::Cancelled {
                        source: Some(Box::new(server_error)),
                    }
                } else {
                    // A timeout that the server confirmed surfaces as the
                    // interruption itself; the session stays usable.
                    server_error
                }
            }
            Settled::CompletedAnyway | Settled::Poisoned => {
                // Either the session is already poisoned, or the command
                // finished during the grace window with its result
                // discarded. Both ways the session cannot vouch for the
                // command's effects being observed, so it is not reused.
                self.poison();
                if external {
                    Error::Cancelled { source: None }
                } else {
                    Error::Timeout(TimeoutKind::Command)
                }
            }
        }
    }

    /// Fire the KILL QUERY sidecar as a detached task.
    ///
    /// Pool-bypassing by construction: the sidecar dials the same host
    /// directly, issues the KILL, and closes. Failures are logged and
    /// otherwise ignored; the drain window decides the outcome either
    /// way.
    fn spawn_kill_sidecar(&self, budget: Duration) {
        let config = Arc::clone(self.config());
        let host = self.host().to_owned();
        let thread_id = self.thread_id();

        tokio::spawn(async move {
            let kill = async {
                let mut sidecar = Session::connect_to_host(config, &host).await?;
                sidecar.kill_query(thread_id).await?;
                sidecar.close().await;
                Ok::<(), Error>(())
            };
            match timeout(budget, kill).await {
                Ok(Ok(())) => {
                    tracing::debug!(thread_id, "KILL QUERY issued");
                }
                Ok(Err(e)) => {
                    tracing::warn!(thread_id, error = %e, "KILL QUERY sidecar failed");
                }
                Err(_) => {
                    tracing::warn!(thread_id, "KILL QUERY sidecar timed out");
                }
            }
        });
    }
}

async fn run_until_interrupt<F, T>(
    work: &mut std::pin::Pin<&mut F>,
    budget: Option<Duration>,
    cancel: Option<&CancelToken>,
) -> Outcome<T>
where
    F: std::future::Future<Output = T>,
{
    let deadline = async {
        match budget {
            Some(t) => sleep(t).await,
            None => std::future::pending().await,
        }
    };
    let cancelled = async {
        match cancel {
            Some(token) => token.wait().await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        result = work.as_mut() => Outcome::Done(result),
        () = deadline => Outcome::TimedOut,
        () = cancelled => Outcome::Cancelled,
    }
}

/// Drive an interrupted command to its terminal packet.
///
/// Returns `Some(error)` when an ERR (normally `ER_QUERY_INTERRUPTED`)
/// ended the command, `None` when the command finished cleanly. The
/// payload-skipping strategy relies on DEPRECATE_EOF framing, where the
/// only 0xFE-headed short frame in a response is the terminal OK; legacy
/// sessions cannot be resynchronized this way and are poisoned instead.
async fn drain_interrupted(session: &mut Session) -> Result<Option<Error>> {
    if !session
        .capabilities()
        .contains(Capabilities::DEPRECATE_EOF)
    {
        session.poison();
        return Ok(None);
    }

    // True while the next payload is in command-response position (start
    // of a statement's response, or after a MORE_RESULTS terminator).
    let mut command_position = session.state() == SessionState::Querying;

    loop {
        let payload = session.read_payload().await?;

        if payload.first() == Some(&0xFF) {
            let err = ErrPacket::decode(&payload)?;
            session.set_state(SessionState::Ready);
            return Ok(Some(Error::from_err_packet(err)));
        }

        if command_position {
            match ResponseKind::classify(&payload, session.capabilities()) {
                ResponseKind::Ok => {
                    let ok = session.settle_ok(&payload)?;
                    if !ok.status.has_more_results() {
                        return Ok(None);
                    }
                }
                ResponseKind::LocalInfile => {
                    // Refuse the upload so the server moves on.
                    session.write_continuation(Bytes::new()).await?;
                }
                ResponseKind::Data => {
                    // Result-set header; everything up to the terminal OK
                    // is skipped without decoding.
                    command_position = false;
                    session.set_state(SessionState::StreamingResult);
                }
                ResponseKind::Err | ResponseKind::Eof => unreachable!("handled above"),
            }
        } else if is_row_terminator(&payload, session.capabilities()) {
            let ok = query::terminal_ok(session, &payload)?;
            if !ok.status.has_more_results() {
                return Ok(None);
            }
            command_position = true;
        }
        // Column definitions and rows fall through and are discarded.
    }
}
