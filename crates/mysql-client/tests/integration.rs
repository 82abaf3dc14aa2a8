//! End-to-end protocol tests against the mock server.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use mysql_client::{Config, Error, LocalInfileHandler, Params, Session, SessionState};
use mysql_testing::{MockColumn, MockResponse, MockServer};

async fn connect(server: &MockServer) -> Session {
    Session::connect(Arc::new(server.config())).await.unwrap()
}

#[tokio::test]
async fn connect_and_select_scalar() {
    let server = MockServer::builder()
        .response("SELECT 1", MockResponse::scalar(1))
        .start()
        .await
        .unwrap();

    let mut session = connect(&server).await;
    assert_eq!(session.state(), SessionState::Ready);
    assert!(session.thread_id() >= 100);
    assert_eq!(session.server_version().major, 8);

    let mut stream = session.query("SELECT 1").await.unwrap();
    let row = stream.next_row().await.unwrap().unwrap();
    assert_eq!(row.get::<i64>(0).unwrap(), 1);
    assert!(stream.next_row().await.unwrap().is_none());
    assert!(!stream.next_result().await.unwrap());
    drop(stream);

    assert_eq!(session.state(), SessionState::Ready);
}

#[tokio::test]
async fn connect_with_caching_sha2_fast_auth() {
    let server = MockServer::builder()
        .caching_sha2()
        .response("SELECT 1", MockResponse::scalar(1))
        .start()
        .await
        .unwrap();

    let mut session = connect(&server).await;
    let mut stream = session.query("SELECT 1").await.unwrap();
    let row = stream.next_row().await.unwrap().unwrap();
    assert_eq!(row.get::<i64>(0).unwrap(), 1);
}

#[tokio::test]
async fn execute_reports_affected_rows() {
    let server = MockServer::builder()
        .response("DELETE FROM t", MockResponse::affected(7))
        .start()
        .await
        .unwrap();

    let mut session = connect(&server).await;
    let result = session.execute("DELETE FROM t").await.unwrap();
    assert_eq!(result.affected_rows, 7);
}

#[tokio::test]
async fn server_error_leaves_session_usable() {
    let server = MockServer::builder()
        .response(
            "SELECT broken",
            MockResponse::error(1064, "You have an error in your SQL syntax"),
        )
        .response("SELECT 1", MockResponse::scalar(1))
        .start()
        .await
        .unwrap();

    let mut session = connect(&server).await;

    let err = session.execute("SELECT broken").await.unwrap_err();
    match &err {
        Error::Server { code, sqlstate, .. } => {
            assert_eq!(*code, 1064);
            assert_eq!(sqlstate, "HY000");
        }
        other => panic!("expected server error, got {other:?}"),
    }
    assert!(!err.is_fatal());

    // The session consumed the whole response and keeps working.
    assert_eq!(session.state(), SessionState::Ready);
    let result = session.execute("SELECT 1").await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn ping_and_reset() {
    let server = MockServer::builder().start().await.unwrap();

    let mut session = connect(&server).await;
    session.ping().await.unwrap();

    session.reset().await.unwrap();
    assert_eq!(server.reset_count(), 1);
    assert_eq!(session.state(), SessionState::Ready);
}

#[tokio::test]
async fn transaction_status_tracking() {
    let server = MockServer::builder().start().await.unwrap();

    let mut session = connect(&server).await;
    assert!(!session.in_transaction());

    session.execute("START TRANSACTION").await.unwrap();
    assert!(session.in_transaction());

    session.execute("ROLLBACK").await.unwrap();
    assert!(!session.in_transaction());
}

#[tokio::test]
async fn multi_result_sets_stream_in_order() {
    let server = MockServer::builder()
        .response(
            "CALL report()",
            MockResponse::Many(vec![
                MockResponse::ResultSet {
                    columns: vec![MockColumn::long("a")],
                    rows: vec![vec![Some("1".into())], vec![Some("2".into())]],
                },
                MockResponse::ResultSet {
                    columns: vec![MockColumn::long("b")],
                    rows: vec![vec![Some("3".into())]],
                },
                MockResponse::affected(5),
            ]),
        )
        .start()
        .await
        .unwrap();

    let mut session = connect(&server).await;
    let mut stream = session.query("CALL report()").await.unwrap();

    // All rows of set one before set two.
    let mut seen = Vec::new();
    while let Some(row) = stream.next_row().await.unwrap() {
        seen.push(row.get::<i64>(0).unwrap());
    }
    assert_eq!(seen, vec![1, 2]);

    assert!(stream.next_result().await.unwrap());
    assert_eq!(stream.columns()[0].name, "b");
    let row = stream.next_row().await.unwrap().unwrap();
    assert_eq!(row.get::<i64>(0).unwrap(), 3);
    assert!(stream.next_row().await.unwrap().is_none());

    // Final OK terminates the chain.
    assert!(stream.next_result().await.unwrap());
    assert_eq!(stream.last_result().unwrap().affected_rows, 5);
    assert!(!stream.next_result().await.unwrap());
    assert!(stream.is_finished());
}

#[tokio::test]
async fn prepared_statement_roundtrip() {
    let server = MockServer::builder()
        .response(
            "SELECT id FROM t WHERE id = ?",
            MockResponse::ResultSet {
                columns: vec![MockColumn::long("id")],
                rows: vec![vec![Some("42".into())]],
            },
        )
        .start()
        .await
        .unwrap();

    let mut session = connect(&server).await;

    let params: Params = [42i64].into_iter().collect();
    let mut stream = session
        .query_prepared("SELECT id FROM t WHERE id = ?", &params)
        .await
        .unwrap();

    let row = stream.next_row().await.unwrap().unwrap();
    assert_eq!(row.get::<i64>(0).unwrap(), 42);
    assert!(stream.next_row().await.unwrap().is_none());
    drop(stream);

    // Second run hits the statement cache (no new PREPARE round trip is
    // observable, but the call must still succeed).
    let mut stream = session
        .query_prepared("SELECT id FROM t WHERE id = ?", &params)
        .await
        .unwrap();
    assert!(stream.next_row().await.unwrap().is_some());
}

#[tokio::test]
async fn prepared_param_count_mismatch_is_usage_error() {
    let server = MockServer::builder()
        .response(
            "SELECT id FROM t WHERE id = ?",
            MockResponse::scalar(1),
        )
        .start()
        .await
        .unwrap();

    let mut session = connect(&server).await;
    let err = session
        .query_prepared("SELECT id FROM t WHERE id = ?", &Params::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Usage(_)));
    assert!(session.is_usable());
}

#[tokio::test]
async fn local_infile_without_handler_is_usage_error() {
    let server = MockServer::builder()
        .response(
            "LOAD DATA LOCAL INFILE 'x' INTO TABLE t",
            MockResponse::LocalInfile {
                filename: "x".into(),
            },
        )
        .response("SELECT 1", MockResponse::scalar(1))
        .start()
        .await
        .unwrap();

    let mut session = connect(&server).await;
    let err = session
        .execute("LOAD DATA LOCAL INFILE 'x' INTO TABLE t")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Usage(_)), "got {err:?}");

    // The refusal left the protocol in sync.
    assert!(session.execute("SELECT 1").await.is_ok());
}

#[tokio::test]
async fn local_infile_with_handler_uploads() {
    let server = MockServer::builder()
        .response(
            "LOAD DATA LOCAL INFILE 'rows.csv' INTO TABLE t",
            MockResponse::LocalInfile {
                filename: "rows.csv".into(),
            },
        )
        .start()
        .await
        .unwrap();

    let mut config = server.config();
    config.local_infile_handler = Some(LocalInfileHandler::new(|filename| {
        assert_eq!(filename, "rows.csv");
        Ok(b"1,a\n2,b\n".to_vec())
    }));

    let mut session = Session::connect(Arc::new(config)).await.unwrap();
    let result = session
        .execute("LOAD DATA LOCAL INFILE 'rows.csv' INTO TABLE t")
        .await
        .unwrap();
    // The mock reports the received byte count as affected rows.
    assert_eq!(result.affected_rows, 8);
}

#[tokio::test]
async fn dropped_stream_poisons_session() {
    let server = MockServer::builder()
        .response(
            "SELECT big",
            MockResponse::ResultSet {
                columns: vec![MockColumn::long("n")],
                rows: vec![vec![Some("1".into())], vec![Some("2".into())]],
            },
        )
        .start()
        .await
        .unwrap();

    let mut session = connect(&server).await;
    {
        let mut stream = session.query("SELECT big").await.unwrap();
        let _ = stream.next_row().await.unwrap();
        // Dropped with a row and the terminator unread.
    }
    assert_eq!(session.state(), SessionState::Failed);
    assert!(matches!(
        session.execute("SELECT 1").await.unwrap_err(),
        Error::Poisoned
    ));
}

#[tokio::test]
async fn text_params_interpolate() {
    let server = MockServer::builder()
        .response(
            "SELECT * FROM t WHERE id = 5 AND name = 'O''Brien'",
            MockResponse::affected(1),
        )
        .start()
        .await
        .unwrap();

    let mut session = connect(&server).await;
    let mut params = Params::new();
    params.push(5i64);
    params.push("O'Brien");

    let result = session
        .execute_with_params("SELECT * FROM t WHERE id = ? AND name = ?", &params)
        .await
        .unwrap();
    assert_eq!(result.affected_rows, 1);
}

#[tokio::test]
async fn change_user_reauthenticates() {
    let server = MockServer::builder()
        .response("SELECT 1", MockResponse::scalar(1))
        .start()
        .await
        .unwrap();

    let mut session = connect(&server).await;
    session.execute("START TRANSACTION").await.unwrap();

    session
        .change_user("other", "other-password", None)
        .await
        .unwrap();

    // Change-user resets server-side session state.
    assert!(!session.in_transaction());
    assert!(session.execute("SELECT 1").await.is_ok());
}

#[tokio::test]
async fn user_variables_rejected_without_opt_in() {
    let server = MockServer::builder().start().await.unwrap();

    let mut session = connect(&server).await;
    let mut params = Params::new();
    params.push(1i64);

    let err = session
        .execute_with_params("SET @x = ?", &params)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Usage(_)));
    assert!(session.is_usable());
}

#[tokio::test]
async fn connect_timeout_applies() {
    // A TCP listener that never speaks MySQL: the handshake stalls until
    // the connect budget expires.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else { break };
            // Hold the socket open silently.
            tokio::spawn(async move {
                let _stream = stream;
                tokio::time::sleep(Duration::from_secs(60)).await;
            });
        }
    });

    let mut config = Config::default()
        .host(addr.ip().to_string())
        .port(addr.port())
        .username("u");
    config.tls.mode = mysql_client::SslMode::Disabled;
    config.connect_timeout = Duration::from_millis(200);

    let started = std::time::Instant::now();
    let err = Session::connect(Arc::new(config)).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Timeout(mysql_client::TimeoutKind::Connect)
    ));
    assert!(started.elapsed() < Duration::from_secs(2));
}
