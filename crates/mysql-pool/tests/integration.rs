//! Pool behavior against the mock server.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use mysql_pool::{Pool, PoolError};
use mysql_testing::{MockResponse, MockServer};

async fn server() -> MockServer {
    MockServer::builder()
        .response("SELECT 1", MockResponse::scalar(1))
        .start()
        .await
        .unwrap()
}

#[tokio::test]
async fn acquire_reuses_idle_session() {
    let server = server().await;
    let config = Arc::new(server.config());
    let pool = Pool::new(Arc::clone(&config)).unwrap();

    let thread_id = {
        let mut lease = pool.acquire().await.unwrap();
        lease.execute("SELECT 1").await.unwrap();
        lease.thread_id()
    };

    // Give the release task a moment to reset and re-enqueue.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let lease = pool.acquire().await.unwrap();
    assert_eq!(lease.thread_id(), thread_id, "expected the same session back");
    assert_eq!(server.connection_count(), 1);
}

#[tokio::test]
async fn blocked_acquire_wakes_on_release() {
    let server = server().await;
    let mut config = server.config();
    config.max_pool_size = 1;
    config.connect_timeout = Duration::from_secs(5);
    let config = Arc::new(config);

    let pool = Pool::new(Arc::clone(&config)).unwrap();
    let first = pool.acquire().await.unwrap();

    let waiter_pool = pool.clone();
    let waiter = tokio::spawn(async move {
        let started = Instant::now();
        let lease = waiter_pool.acquire().await.unwrap();
        (started.elapsed(), lease.thread_id())
    });

    // Hold the only session, then release it.
    tokio::time::sleep(Duration::from_millis(400)).await;
    drop(first);

    let (waited, _thread_id) = waiter.await.unwrap();
    // The second acquire blocked until the first lease came back.
    assert!(waited >= Duration::from_millis(350), "waited {waited:?}");
    assert!(waited < Duration::from_secs(3), "waited {waited:?}");
}

#[tokio::test]
async fn pool_never_exceeds_max_size() {
    let server = server().await;
    let mut config = server.config();
    config.max_pool_size = 2;
    config.connect_timeout = Duration::from_secs(10);
    let config = Arc::new(config);

    let pool = Pool::new(Arc::clone(&config)).unwrap();

    let mut tasks = Vec::new();
    for _ in 0..6 {
        let pool = pool.clone();
        tasks.push(tokio::spawn(async move {
            let mut lease = pool.acquire().await.unwrap();
            lease.execute("SELECT 1").await.unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;
        }));
    }

    for task in tasks {
        task.await.unwrap();
    }

    let status = pool.status();
    assert!(status.total <= 2, "total {}", status.total);
    assert!(server.connection_count() <= 2);
}

#[tokio::test]
async fn session_in_transaction_is_reset_on_return() {
    let server = server().await;
    let config = Arc::new(server.config());
    let pool = Pool::new(Arc::clone(&config)).unwrap();

    {
        let mut lease = pool.acquire().await.unwrap();
        lease.execute("START TRANSACTION").await.unwrap();
        assert!(lease.in_transaction());
        // Dropped mid-transaction.
    }

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(server.reset_count() >= 1, "reset was not issued on return");

    let lease = pool.acquire().await.unwrap();
    assert!(!lease.in_transaction(), "reused session still in transaction");
}

#[tokio::test]
async fn poisoned_session_is_destroyed_not_reused() {
    let server = MockServer::builder()
        .response(
            "SELECT big",
            MockResponse::ResultSet {
                columns: vec![mysql_testing::MockColumn::long("n")],
                rows: vec![vec![Some("1".into())], vec![Some("2".into())]],
            },
        )
        .response("SELECT 1", MockResponse::scalar(1))
        .start()
        .await
        .unwrap();
    let config = Arc::new(server.config());
    let pool = Pool::new(Arc::clone(&config)).unwrap();

    let poisoned_id = {
        let mut lease = pool.acquire().await.unwrap();
        let id = lease.thread_id();
        // Abandon a stream mid-set: the session comes back poisoned.
        let mut stream = lease.query("SELECT big").await.unwrap();
        let _ = stream.next_row().await.unwrap();
        drop(stream);
        id
    };

    tokio::time::sleep(Duration::from_millis(100)).await;

    let lease = pool.acquire().await.unwrap();
    assert_ne!(
        lease.thread_id(),
        poisoned_id,
        "poisoned session must not be leased again"
    );
}

#[tokio::test]
async fn acquire_times_out_when_exhausted() {
    let server = server().await;
    let mut config = server.config();
    config.max_pool_size = 1;
    config.connect_timeout = Duration::from_millis(300);
    let config = Arc::new(config);

    let pool = Pool::new(Arc::clone(&config)).unwrap();
    let _held = pool.acquire().await.unwrap();

    let started = Instant::now();
    let err = pool.acquire().await.unwrap_err();
    assert!(matches!(err, PoolError::AcquireTimeout));
    assert!(started.elapsed() >= Duration::from_millis(250));
}

#[tokio::test]
async fn close_rejects_new_acquires() {
    let server = server().await;
    let config = Arc::new(server.config());
    let pool = Pool::new(Arc::clone(&config)).unwrap();

    let lease = pool.acquire().await.unwrap();
    drop(lease);

    pool.close().await;
    assert!(pool.is_closed());
    assert!(matches!(pool.acquire().await, Err(PoolError::Closed)));
}

#[tokio::test]
async fn detach_removes_session_from_accounting() {
    let server = server().await;
    let mut config = server.config();
    config.max_pool_size = 1;
    let config = Arc::new(config);

    let pool = Pool::new(Arc::clone(&config)).unwrap();
    let lease = pool.acquire().await.unwrap();
    let mut session = lease.detach();

    // The slot is free again even though the session lives on.
    let second = pool.acquire().await.unwrap();
    assert_ne!(second.thread_id(), session.thread_id());

    session.close().await;
}
