//! Connection pool implementation.

// The lease guard's accessors expect() on an Option that is only None
// after Drop has run.
#![allow(clippy::expect_used)]

use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::{Duration, Instant};

use mysql_client::{Config, Error, Session};
use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::balance::HostBalancer;
use crate::error::{PoolError, Result};

/// Idle sessions untouched for longer than this get a ping before they
/// are handed out, when reset-on-return is enabled.
const PING_AFTER_IDLE: Duration = Duration::from_secs(60);

/// Background sweep interval.
const SWEEP_INTERVAL: Duration = Duration::from_secs(15);

struct IdleEntry {
    session: Session,
    since: Instant,
}

struct PoolInner {
    config: Arc<Config>,
    /// Idle entries, oldest first. Guarded by a short critical section;
    /// nothing async happens under the lock.
    idle: Mutex<VecDeque<IdleEntry>>,
    /// Bounds concurrently leased sessions at `max_pool_size`; one
    /// waiter wakes per released permit.
    semaphore: Arc<Semaphore>,
    /// Live sessions: leased plus idle.
    total: AtomicU32,
    balancer: HostBalancer,
    closed: AtomicBool,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

/// A pool of reusable sessions for one [`PoolKey`](mysql_client::PoolKey).
///
/// Cloning is cheap and shares the same underlying pool.
#[derive(Clone)]
pub struct Pool {
    inner: Arc<PoolInner>,
}

impl Pool {
    /// Create a pool for a configuration and start its background
    /// worker.
    pub fn new(config: Arc<Config>) -> Result<Self> {
        config
            .validate()
            .map_err(|e| PoolError::Configuration(e.to_string()))?;

        let inner = Arc::new(PoolInner {
            semaphore: Arc::new(Semaphore::new(config.max_pool_size as usize)),
            balancer: HostBalancer::new(&config.hosts, config.load_balance),
            idle: Mutex::new(VecDeque::new()),
            total: AtomicU32::new(0),
            closed: AtomicBool::new(false),
            sweeper: Mutex::new(None),
            config,
        });

        let pool = Self { inner };
        pool.spawn_sweeper();
        Ok(pool)
    }

    /// Acquire a session, waiting up to the connect timeout for capacity.
    ///
    /// Preference order: a validated idle entry, then a freshly opened
    /// session if below the ceiling, otherwise the caller queues until a
    /// lease returns.
    pub async fn acquire(&self) -> Result<PooledSession> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(PoolError::Closed);
        }

        let permit = match timeout(
            self.inner.config.connect_timeout,
            Arc::clone(&self.inner.semaphore).acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_closed)) => return Err(PoolError::Closed),
            Err(_elapsed) => return Err(PoolError::AcquireTimeout),
        };

        // Idle entries first, discarding any that went stale.
        while let Some(entry) = self.inner.pop_idle() {
            match self.inner.validate_entry(entry).await {
                Some(session) => {
                    tracing::trace!("leasing idle session");
                    return Ok(PooledSession::new(session, permit, Arc::clone(&self.inner)));
                }
                None => continue,
            }
        }

        let session = self.inner.open_session().await?;
        Ok(PooledSession::new(session, permit, Arc::clone(&self.inner)))
    }

    /// Current pool statistics.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let idle = self.inner.idle.lock().len() as u32;
        let total = self.inner.total.load(Ordering::Acquire);
        PoolStatus {
            idle,
            in_use: total.saturating_sub(idle),
            total,
            max: self.inner.config.max_pool_size,
        }
    }

    /// Whether the pool has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// The configuration this pool serves.
    #[must_use]
    pub fn config(&self) -> &Arc<Config> {
        &self.inner.config
    }

    /// Close the pool: stop the sweeper, wake all waiters with an error,
    /// and tear down every idle session.
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.semaphore.close();

        if let Some(handle) = self.inner.sweeper.lock().take() {
            handle.abort();
        }

        loop {
            let entry = self.inner.pop_idle();
            match entry {
                Some(entry) => self.inner.destroy(entry.session).await,
                None => break,
            }
        }
        tracing::info!("connection pool closed");
    }

    fn spawn_sweeper(&self) {
        let inner = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                ticker.tick().await;
                let Some(inner) = inner.upgrade() else { break };
                if inner.closed.load(Ordering::Acquire) {
                    break;
                }
                inner.sweep().await;
            }
        });
        *self.inner.sweeper.lock() = Some(handle);
    }
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = self.status();
        f.debug_struct("Pool")
            .field("idle", &status.idle)
            .field("in_use", &status.in_use)
            .field("max", &status.max)
            .finish_non_exhaustive()
    }
}

impl PoolInner {
    fn pop_idle(&self) -> Option<IdleEntry> {
        self.idle.lock().pop_front()
    }

    /// Check an idle entry's age and liveness; stale entries are
    /// destroyed and `None` is returned.
    async fn validate_entry(&self, entry: IdleEntry) -> Option<Session> {
        let mut session = entry.session;

        let expired = self
            .config
            .connection_lifetime
            .is_some_and(|lifetime| session.created_at().elapsed() > lifetime);
        let idle_expired = entry.since.elapsed() > self.config.connection_idle_timeout;

        if expired || idle_expired || !session.is_usable() || !session.state().is_ready() {
            tracing::debug!(expired, idle_expired, "discarding stale idle session");
            self.destroy(session).await;
            return None;
        }

        // A long-idle session may have been dropped by the server;
        // probe it before handing it out.
        if self.config.connection_reset && entry.since.elapsed() > PING_AFTER_IDLE {
            if let Err(e) = session.ping().await {
                tracing::debug!(error = %e, "idle session failed ping");
                self.destroy(session).await;
                return None;
            }
        }

        Some(session)
    }

    /// Open a new session against the best host, respecting the size
    /// ceiling and quarantine state.
    async fn open_session(&self) -> Result<Session> {
        // Optimistic reservation; rolled back on failure.
        let prev = self.total.fetch_add(1, Ordering::AcqRel);
        if prev >= self.config.max_pool_size {
            self.total.fetch_sub(1, Ordering::AcqRel);
            return Err(PoolError::Configuration(
                "session accounting exceeded the pool ceiling".into(),
            ));
        }

        let mut last_error = Error::Config("no reachable host".into());
        for host in self.balancer.candidates() {
            match Session::connect_to_host(Arc::clone(&self.config), &host).await {
                Ok(session) => {
                    self.balancer.report_success(&host);
                    tracing::debug!(host = %host, "opened pooled session");
                    return Ok(session);
                }
                Err(e) => {
                    self.balancer.report_failure(&host);
                    last_error = e;
                }
            }
        }

        self.total.fetch_sub(1, Ordering::AcqRel);
        Err(PoolError::Client(last_error))
    }

    /// Return a leased session to the idle set, resetting or destroying
    /// it per policy.
    async fn release(self: Arc<Self>, mut session: Session, permit: OwnedSemaphorePermit) {
        let reusable = !self.closed.load(Ordering::Acquire)
            && session.is_usable()
            && session.state().is_ready();

        if reusable {
            let settled = if self.config.connection_reset {
                session.reset().await.is_ok()
            } else if session.in_transaction() {
                // Reset disabled, but a session mid-transaction must
                // never reach a general-purpose slot.
                session.execute("ROLLBACK").await.is_ok()
            } else {
                true
            };

            if settled && session.state().is_ready() {
                self.idle.lock().push_back(IdleEntry {
                    session,
                    since: Instant::now(),
                });
                // The permit drop below wakes exactly one waiter, who
                // will find the entry just pushed.
                drop(permit);
                return;
            }
        }

        self.destroy(session).await;
        drop(permit);
    }

    async fn destroy(&self, mut session: Session) {
        let host = session.host().to_owned();
        session.close().await;
        self.balancer.on_session_closed(&host);
        self.total.fetch_sub(1, Ordering::AcqRel);
        tracing::debug!(host = %host, "destroyed pooled session");
    }

    /// One background pass: reap stale idle entries, refill to the
    /// floor, and probe quarantined hosts.
    async fn sweep(&self) {
        // Reap: drain the idle set through the same validation used at
        // acquire time, keeping survivors.
        let mut keep = VecDeque::new();
        while let Some(entry) = self.pop_idle() {
            let since = entry.since;
            if let Some(session) = self.validate_entry(entry).await {
                keep.push_back(IdleEntry { session, since });
            }
        }
        self.idle.lock().append(&mut keep);

        // Refill to the floor.
        while self.total.load(Ordering::Acquire) < self.config.min_pool_size
            && !self.closed.load(Ordering::Acquire)
        {
            match self.open_session().await {
                Ok(session) => {
                    self.idle.lock().push_back(IdleEntry {
                        session,
                        since: Instant::now(),
                    });
                }
                Err(e) => {
                    tracing::debug!(error = %e, "pool floor refill failed");
                    break;
                }
            }
        }

        // Probe quarantined hosts with a full connect.
        for host in self.balancer.quarantined_hosts() {
            match Session::connect_to_host(Arc::clone(&self.config), &host).await {
                Ok(mut probe) => {
                    self.balancer.mark_healthy(&host);
                    probe.close().await;
                }
                Err(_) => {
                    // Still down; the existing backoff stands.
                }
            }
        }
    }
}

/// Pool statistics snapshot.
#[derive(Debug, Clone, Copy)]
pub struct PoolStatus {
    /// Idle sessions available for lease.
    pub idle: u32,
    /// Sessions currently leased out.
    pub in_use: u32,
    /// All live sessions.
    pub total: u32,
    /// Configured ceiling.
    pub max: u32,
}

/// An exclusively leased session.
///
/// Dereferences to [`Session`]; dropping the lease returns the session
/// to the pool on a background task, where it is reset or destroyed per
/// policy. Release happens on every exit path, panics included, because
/// it rides on `Drop`.
pub struct PooledSession {
    session: Option<Session>,
    permit: Option<OwnedSemaphorePermit>,
    inner: Arc<PoolInner>,
}

impl PooledSession {
    fn new(session: Session, permit: OwnedSemaphorePermit, inner: Arc<PoolInner>) -> Self {
        Self {
            session: Some(session),
            permit: Some(permit),
            inner,
        }
    }

    /// Detach the session from the pool.
    ///
    /// The caller takes ownership; the pool frees the slot immediately.
    #[must_use]
    pub fn detach(mut self) -> Session {
        let session = self.session.take().expect("session present until drop");
        let host = session.host().to_owned();
        self.inner.balancer.on_session_closed(&host);
        self.inner.total.fetch_sub(1, Ordering::AcqRel);
        session
    }
}

impl Deref for PooledSession {
    type Target = Session;

    fn deref(&self) -> &Self::Target {
        self.session.as_ref().expect("session present until drop")
    }
}

impl DerefMut for PooledSession {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.session.as_mut().expect("session present until drop")
    }
}

impl Drop for PooledSession {
    fn drop(&mut self) {
        let (Some(session), Some(permit)) = (self.session.take(), self.permit.take()) else {
            return;
        };
        let inner = Arc::clone(&self.inner);

        // Release must not block Drop; the reset runs on its own task.
        // Outside a runtime (e.g. a test dropping the lease after the
        // runtime shut down) the session is leaked to the OS teardown,
        // which closes the socket anyway.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(inner.release(session, permit));
        } else {
            inner.total.fetch_sub(1, Ordering::AcqRel);
            inner.balancer.on_session_closed(session.host());
        }
    }
}

impl std::fmt::Debug for PooledSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledSession")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}
