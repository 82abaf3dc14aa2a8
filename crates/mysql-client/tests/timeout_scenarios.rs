//! Command timeout and cancellation scenarios.
//!
//! The mock scripts a slow statement; the interesting part is what the
//! driver does when the budget expires: KILL QUERY through a sidecar,
//! wait for the server's interruption, and poison only when the server
//! never reacts.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use mysql_client::{
    CancelToken, CancellationTimeout, Error, Session, SessionState, TimeoutKind,
};
use mysql_testing::{MockResponse, MockServer};

fn slow_query_script() -> MockResponse {
    MockResponse::sleep(Duration::from_secs(10), MockResponse::scalar(0))
}

#[tokio::test]
async fn timeout_with_working_kill_keeps_session() {
    let server = MockServer::builder()
        .response("SELECT SLEEP(10)", slow_query_script())
        .response("SELECT 1", MockResponse::scalar(1))
        .start()
        .await
        .unwrap();

    let mut config = server.config();
    config.command_timeout = Some(Duration::from_secs(1));
    config.cancellation_timeout = CancellationTimeout::After(Duration::from_secs(2));

    let mut session = Session::connect(Arc::new(config)).await.unwrap();

    let started = Instant::now();
    let err = session.execute("SELECT SLEEP(10)").await.unwrap_err();
    let elapsed = started.elapsed();

    // The server confirmed the kill: the surfaced error is the server's
    // own interruption, inside the T..T+grace window.
    assert!(err.is_query_interrupted(), "got {err:?}");
    assert!(!err.is_fatal());
    assert!(elapsed >= Duration::from_millis(900), "elapsed {elapsed:?}");
    assert!(elapsed <= Duration::from_millis(1800), "elapsed {elapsed:?}");

    // The connection is still open and usable.
    assert_eq!(session.state(), SessionState::Ready);
    let result = session.execute("SELECT 1").await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn timeout_with_ignored_kill_poisons_after_grace() {
    let server = MockServer::builder()
        .response(
            "SELECT SLEEP(10)",
            MockResponse::sleep_unkillable(Duration::from_secs(10), MockResponse::scalar(0)),
        )
        .start()
        .await
        .unwrap();

    let mut config = server.config();
    config.command_timeout = Some(Duration::from_secs(1));
    config.cancellation_timeout = CancellationTimeout::After(Duration::from_secs(2));

    let mut session = Session::connect(Arc::new(config)).await.unwrap();

    let started = Instant::now();
    let err = session.execute("SELECT SLEEP(10)").await.unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(err, Error::Timeout(TimeoutKind::Command)), "got {err:?}");
    assert!(err.is_fatal());
    // T + CancellationTimeout, with scheduling slack.
    assert!(elapsed >= Duration::from_millis(2900), "elapsed {elapsed:?}");
    assert!(elapsed <= Duration::from_millis(3800), "elapsed {elapsed:?}");

    assert_eq!(session.state(), SessionState::Failed);
}

#[tokio::test]
async fn timeout_with_cancellation_disabled_poisons_immediately() {
    let server = MockServer::builder()
        .response("SELECT SLEEP(10)", slow_query_script())
        .start()
        .await
        .unwrap();

    let mut config = server.config();
    config.command_timeout = Some(Duration::from_secs(1));
    config.cancellation_timeout = CancellationTimeout::PoisonImmediately;

    let mut session = Session::connect(Arc::new(config)).await.unwrap();

    let started = Instant::now();
    let err = session.execute("SELECT SLEEP(10)").await.unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(err, Error::Timeout(TimeoutKind::Command)), "got {err:?}");
    assert!(elapsed >= Duration::from_millis(900), "elapsed {elapsed:?}");
    assert!(elapsed <= Duration::from_millis(1800), "elapsed {elapsed:?}");
    assert_eq!(session.state(), SessionState::Failed);
}

#[tokio::test]
async fn external_cancel_wraps_server_interruption() {
    let server = MockServer::builder()
        .response("SELECT SLEEP(10)", slow_query_script())
        .response("SELECT 1", MockResponse::scalar(1))
        .start()
        .await
        .unwrap();

    let mut config = server.config();
    config.command_timeout = None; // cancellation only
    config.cancellation_timeout = CancellationTimeout::After(Duration::from_secs(2));

    let mut session = Session::connect(Arc::new(config)).await.unwrap();

    let token = CancelToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = session
        .execute_cancellable("SELECT SLEEP(10)", Some(&token))
        .await
        .unwrap_err();
    let elapsed = started.elapsed();

    match &err {
        Error::Cancelled { source: Some(inner) } => {
            assert!(inner.is_query_interrupted());
        }
        other => panic!("expected cancelled-with-source, got {other:?}"),
    }
    assert!(!err.is_fatal());
    assert!(elapsed >= Duration::from_millis(300));
    assert!(elapsed <= Duration::from_millis(1500), "elapsed {elapsed:?}");

    // Cancellation that the server confirmed leaves the session usable.
    assert!(session.execute("SELECT 1").await.is_ok());
}

#[tokio::test]
async fn no_timeout_lets_slow_query_finish() {
    let server = MockServer::builder()
        .response(
            "SELECT SLEEP(10)",
            MockResponse::sleep(Duration::from_millis(300), MockResponse::scalar(0)),
        )
        .start()
        .await
        .unwrap();

    let mut config = server.config();
    config.command_timeout = None;

    let mut session = Session::connect(Arc::new(config)).await.unwrap();
    let mut stream = session.query("SELECT SLEEP(10)").await.unwrap();
    let row = stream.next_row().await.unwrap().unwrap();
    assert_eq!(row.get::<i64>(0).unwrap(), 0);
}
