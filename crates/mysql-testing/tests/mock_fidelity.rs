//! Sanity checks that the mock speaks wire-accurate MySQL.

#![allow(clippy::unwrap_used)]

use bytes::Bytes;
use mysql_codec::PacketConn;
use mysql_testing::{MOCK_SCRAMBLE, MockResponse, MockServer};
use mysql_wire::handshake::InitialHandshake;
use mysql_wire::{Capabilities, OkPacket, PayloadWriter};
use tokio::net::TcpStream;

/// Drive the handshake by hand, without the client crate, to pin the
/// exact bytes the mock puts on the wire.
#[tokio::test]
async fn greeting_parses_as_protocol_10() {
    let server = MockServer::builder().start().await.unwrap();

    let stream = TcpStream::connect(server.addr()).await.unwrap();
    let mut conn = PacketConn::new(stream);

    let greeting_payload = conn.read_payload().await.unwrap();
    let greeting = InitialHandshake::decode(&greeting_payload).unwrap();

    assert_eq!(greeting.server_version.banner, "8.0.34-mock");
    assert_eq!(greeting.scramble, MOCK_SCRAMBLE.to_vec());
    assert_eq!(greeting.auth_plugin, "mysql_native_password");
    assert!(greeting.capabilities.contains(Capabilities::PROTOCOL_41));
    assert!(greeting.capabilities.contains(Capabilities::DEPRECATE_EOF));
    assert!(!greeting.capabilities.contains(Capabilities::SSL));
}

#[tokio::test]
async fn raw_handshake_and_ping() {
    let server = MockServer::builder().start().await.unwrap();

    let stream = TcpStream::connect(server.addr()).await.unwrap();
    let mut conn = PacketConn::new(stream);

    let greeting_payload = conn.read_payload().await.unwrap();
    let greeting = InitialHandshake::decode(&greeting_payload).unwrap();
    let caps = Capabilities::client_default() & greeting.capabilities;

    // Minimal handshake response; the mock accepts any credentials.
    let mut w = PayloadWriter::new();
    w.write_u32_le(caps.bits());
    w.write_u32_le(1 << 24);
    w.write_u8(255);
    w.write_zeros(23);
    w.write_nul_str("raw-test");
    w.write_lenenc_bytes(&[]);
    w.write_nul_str("mysql_native_password");
    conn.write_payload(w.freeze()).await.unwrap();

    let ok_payload = conn.read_payload().await.unwrap();
    let ok = OkPacket::decode(&ok_payload, caps).unwrap();
    assert_eq!(ok.affected_rows, 0);

    // COM_PING answered with OK at a fresh sequence.
    conn.reset_sequence();
    conn.write_payload(Bytes::from_static(&[0x0E])).await.unwrap();
    let pong = conn.read_payload().await.unwrap();
    assert_eq!(pong.first(), Some(&0x00));
}

#[tokio::test]
async fn distinct_connections_get_distinct_thread_ids() {
    let server = MockServer::builder().start().await.unwrap();

    let mut first = PacketConn::new(TcpStream::connect(server.addr()).await.unwrap());
    let mut second = PacketConn::new(TcpStream::connect(server.addr()).await.unwrap());

    let a = InitialHandshake::decode(&first.read_payload().await.unwrap()).unwrap();
    let b = InitialHandshake::decode(&second.read_payload().await.unwrap()).unwrap();
    assert_ne!(a.connection_id, b.connection_id);
}

#[tokio::test]
async fn scripted_error_carries_sqlstate() {
    let server = MockServer::builder()
        .response("boom", MockResponse::error(1045, "Access denied"))
        .start()
        .await
        .unwrap();

    // Full client path for convenience.
    let mut session =
        mysql_client::Session::connect(std::sync::Arc::new(server.config()))
            .await
            .unwrap();
    let err = session.execute("boom").await.unwrap_err();
    match err {
        mysql_client::Error::Server { code, sqlstate, message } => {
            assert_eq!(code, 1045);
            assert_eq!(sqlstate, "HY000");
            assert_eq!(message, "Access denied");
        }
        other => panic!("expected server error, got {other:?}"),
    }
}
