//! Mock MySQL server for protocol-level testing.
//!
//! Speaks enough of the wire protocol to exercise the client end to end
//! without a real server: a scripted v10 handshake, canned responses
//! keyed by SQL text, per-connection thread ids, working
//! `KILL QUERY` semantics (an in-flight scripted delay aborts with
//! `ER_QUERY_INTERRUPTED`), `COM_RESET_CONNECTION`, and both text and
//! binary result-set encodings.
//!
//! ## Example
//!
//! ```rust,ignore
//! let server = MockServer::builder()
//!     .response("SELECT 1", MockResponse::scalar(1))
//!     .start()
//!     .await?;
//!
//! let config = server.config();
//! let mut session = Session::connect(config.into()).await?;
//! ```

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use mysql_codec::PacketConn;
use mysql_wire::column::{ColumnFlags, ColumnType};
use mysql_wire::{Capabilities, Command, PayloadReader, PayloadWriter, StatusFlags};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;

/// Error type for mock server operations.
#[derive(Debug, Error)]
pub enum MockServerError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Framing error while talking to a client.
    #[error("codec error: {0}")]
    Codec(#[from] mysql_codec::CodecError),

    /// Wire-grammar error in a client packet.
    #[error("protocol error: {0}")]
    Protocol(#[from] mysql_wire::ProtocolError),
}

/// Result type for mock server operations.
pub type Result<T> = std::result::Result<T, MockServerError>;

/// Scramble the mock hands out; fixed so tests are deterministic.
pub const MOCK_SCRAMBLE: [u8; 20] = [
    0x0A, 0x14, 0x1E, 0x28, 0x32, 0x3C, 0x46, 0x50, 0x5A, 0x64, 0x6E, 0x78, 0x02, 0x0C, 0x16,
    0x20, 0x2A, 0x34, 0x3E, 0x48,
];

/// A column in a scripted result set.
#[derive(Debug, Clone)]
pub struct MockColumn {
    /// Column name.
    pub name: String,
    /// Wire type.
    pub column_type: ColumnType,
    /// Column flags (UNSIGNED matters for binary encoding).
    pub flags: ColumnFlags,
}

impl MockColumn {
    /// A signed 32-bit integer column.
    #[must_use]
    pub fn long(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: ColumnType::Long,
            flags: ColumnFlags::empty(),
        }
    }

    /// A variable-length string column.
    #[must_use]
    pub fn varchar(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: ColumnType::VarString,
            flags: ColumnFlags::empty(),
        }
    }
}

/// A scripted cell value.
pub type MockCell = Option<String>;

/// Scripted response to a SQL statement.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// An OK packet.
    Ok {
        /// Affected-rows count.
        affected_rows: u64,
        /// Last-insert id.
        last_insert_id: u64,
    },

    /// An ERR packet.
    Error {
        /// MySQL error code.
        code: u16,
        /// Five-character SQLSTATE.
        sqlstate: String,
        /// Message text.
        message: String,
    },

    /// A single result set.
    ResultSet {
        /// Column definitions.
        columns: Vec<MockColumn>,
        /// Rows, one cell per column, `None` for NULL.
        rows: Vec<Vec<MockCell>>,
    },

    /// Several responses in sequence with MORE_RESULTS chaining.
    Many(Vec<MockResponse>),

    /// A `LOCAL INFILE` request: the server asks the client to upload a
    /// file and acknowledges with an OK reporting the byte count.
    LocalInfile {
        /// Filename the server requests.
        filename: String,
    },

    /// Delay before answering; aborts with `ER_QUERY_INTERRUPTED` if the
    /// connection's query is killed first. `ignore_kill` simulates a
    /// server that never honors the KILL.
    Delayed {
        /// How long the statement "runs".
        delay: Duration,
        /// The eventual answer.
        then: Box<MockResponse>,
        /// When set, KILL QUERY has no effect on this statement.
        ignore_kill: bool,
    },
}

impl MockResponse {
    /// A one-column, one-row integer result.
    #[must_use]
    pub fn scalar(value: i64) -> Self {
        Self::ResultSet {
            columns: vec![MockColumn::long("value")],
            rows: vec![vec![Some(value.to_string())]],
        }
    }

    /// An empty OK.
    #[must_use]
    pub fn ok() -> Self {
        Self::Ok {
            affected_rows: 0,
            last_insert_id: 0,
        }
    }

    /// An OK reporting affected rows.
    #[must_use]
    pub fn affected(rows: u64) -> Self {
        Self::Ok {
            affected_rows: rows,
            last_insert_id: 0,
        }
    }

    /// A generic server error.
    #[must_use]
    pub fn error(code: u16, message: impl Into<String>) -> Self {
        Self::Error {
            code,
            sqlstate: "HY000".into(),
            message: message.into(),
        }
    }

    /// A scripted slow statement.
    #[must_use]
    pub fn sleep(delay: Duration, then: MockResponse) -> Self {
        Self::Delayed {
            delay,
            then: Box::new(then),
            ignore_kill: false,
        }
    }

    /// A scripted slow statement on a server that ignores KILL.
    #[must_use]
    pub fn sleep_unkillable(delay: Duration, then: MockResponse) -> Self {
        Self::Delayed {
            delay,
            then: Box::new(then),
            ignore_kill: true,
        }
    }
}

/// Builder for [`MockServer`].
pub struct MockServerBuilder {
    responses: HashMap<String, MockResponse>,
    server_version: String,
    auth_plugin: String,
}

impl MockServerBuilder {
    fn new() -> Self {
        Self {
            responses: HashMap::new(),
            server_version: "8.0.34-mock".into(),
            auth_plugin: "mysql_native_password".into(),
        }
    }

    /// Script a response for an exact SQL text (case-insensitive).
    #[must_use]
    pub fn response(mut self, sql: impl Into<String>, response: MockResponse) -> Self {
        self.responses
            .insert(sql.into().trim().to_ascii_lowercase(), response);
        self
    }

    /// Override the advertised server version banner.
    #[must_use]
    pub fn server_version(mut self, version: impl Into<String>) -> Self {
        self.server_version = version.into();
        self
    }

    /// Advertise `caching_sha2_password` and answer with the fast-auth
    /// success path.
    #[must_use]
    pub fn caching_sha2(mut self) -> Self {
        self.auth_plugin = "caching_sha2_password".into();
        self
    }

    /// Bind a listener and start serving.
    pub async fn start(self) -> Result<MockServer> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let state = Arc::new(ServerState {
            responses: self.responses,
            server_version: self.server_version,
            auth_plugin: self.auth_plugin,
            next_thread_id: AtomicU32::new(100),
            kills: Mutex::new(HashMap::new()),
            reset_count: AtomicUsize::new(0),
            connection_count: AtomicUsize::new(0),
        });

        let accept_state = Arc::clone(&state);
        let handle = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, _)) => {
                        let state = Arc::clone(&accept_state);
                        tokio::spawn(async move {
                            if let Err(e) = serve_connection(stream, state).await {
                                tracing::debug!(error = %e, "mock connection ended");
                            }
                        });
                    }
                    Err(_) => break,
                }
            }
        });

        Ok(MockServer {
            addr,
            state,
            handle,
        })
    }
}

struct ServerState {
    responses: HashMap<String, MockResponse>,
    server_version: String,
    auth_plugin: String,
    next_thread_id: AtomicU32,
    /// Kill notifications per thread id.
    kills: Mutex<HashMap<u32, Arc<Notify>>>,
    reset_count: AtomicUsize,
    connection_count: AtomicUsize,
}

/// A running mock server.
pub struct MockServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
    handle: tokio::task::JoinHandle<()>,
}

impl MockServer {
    /// Start building a mock server.
    #[must_use]
    pub fn builder() -> MockServerBuilder {
        MockServerBuilder::new()
    }

    /// The address the server listens on.
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// A client configuration pointing at this server, with TLS off and
    /// pooling-friendly defaults.
    #[must_use]
    pub fn config(&self) -> mysql_client::Config {
        let mut config = mysql_client::Config::default()
            .host(self.addr.ip().to_string())
            .port(self.addr.port())
            .username("mock")
            .password("mock-password");
        config.tls.mode = mysql_tls::SslMode::Disabled;
        config.min_pool_size = 0;
        config
    }

    /// How many `COM_RESET_CONNECTION` requests the server has handled.
    #[must_use]
    pub fn reset_count(&self) -> usize {
        self.state.reset_count.load(Ordering::Acquire)
    }

    /// How many connections have been accepted.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.state.connection_count.load(Ordering::Acquire)
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

const SERVER_CAPABILITIES: Capabilities = Capabilities::PROTOCOL_41
    .union(Capabilities::SECURE_CONNECTION)
    .union(Capabilities::LONG_PASSWORD)
    .union(Capabilities::LONG_FLAG)
    .union(Capabilities::TRANSACTIONS)
    .union(Capabilities::MULTI_STATEMENTS)
    .union(Capabilities::MULTI_RESULTS)
    .union(Capabilities::PS_MULTI_RESULTS)
    .union(Capabilities::PLUGIN_AUTH)
    .union(Capabilities::PLUGIN_AUTH_LENENC_DATA)
    .union(Capabilities::CONNECT_WITH_DB)
    .union(Capabilities::CONNECT_ATTRS)
    .union(Capabilities::DEPRECATE_EOF);

struct ConnState {
    thread_id: u32,
    in_transaction: bool,
    kill_notify: Arc<Notify>,
    /// Prepared statements: id -> (sql, param count).
    statements: HashMap<u32, (String, u16)>,
    next_statement_id: u32,
}

async fn serve_connection(stream: TcpStream, state: Arc<ServerState>) -> Result<()> {
    stream.set_nodelay(true)?;
    state.connection_count.fetch_add(1, Ordering::AcqRel);

    let thread_id = state.next_thread_id.fetch_add(1, Ordering::AcqRel);
    let kill_notify = Arc::new(Notify::new());
    state
        .kills
        .lock()
        .insert(thread_id, Arc::clone(&kill_notify));

    let mut conn = ConnState {
        thread_id,
        in_transaction: false,
        kill_notify,
        statements: HashMap::new(),
        next_statement_id: 1,
    };

    let mut transport = PacketConn::new(stream);
    let result = handshake_and_serve(&mut transport, &mut conn, &state).await;

    state.kills.lock().remove(&thread_id);
    result
}

async fn handshake_and_serve(
    transport: &mut PacketConn<TcpStream>,
    conn: &mut ConnState,
    state: &Arc<ServerState>,
) -> Result<()> {
    // Greeting.
    let mut w = PayloadWriter::new();
    w.write_u8(10);
    w.write_nul_str(&state.server_version);
    w.write_u32_le(conn.thread_id);
    w.write_bytes(&MOCK_SCRAMBLE[..8]);
    w.write_u8(0);
    w.write_u16_le(SERVER_CAPABILITIES.low_bits());
    w.write_u8(255);
    w.write_u16_le(StatusFlags::AUTOCOMMIT.bits());
    w.write_u16_le(SERVER_CAPABILITIES.high_bits());
    w.write_u8(21);
    w.write_zeros(10);
    w.write_bytes(&MOCK_SCRAMBLE[8..]);
    w.write_u8(0);
    w.write_nul_str(&state.auth_plugin);
    transport.write_payload(w.freeze()).await?;

    // Handshake response; credentials are accepted as scripted.
    let _response = transport.read_payload().await?;

    if state.auth_plugin == "caching_sha2_password" {
        // Fast-auth success, then OK.
        transport
            .write_payload(Bytes::from_static(&[0x01, 0x03]))
            .await?;
    }
    write_ok(transport, conn, 0, 0).await?;

    // Command loop.
    loop {
        transport.reset_sequence();
        let payload = match transport.read_payload().await {
            Ok(payload) => payload,
            Err(mysql_codec::CodecError::ConnectionClosed) => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let Some(&command) = payload.first() else {
            continue;
        };

        match command {
            c if c == Command::Quit as u8 => return Ok(()),
            c if c == Command::Ping as u8 => write_ok(transport, conn, 0, 0).await?,
            c if c == Command::ResetConnection as u8 => {
                state.reset_count.fetch_add(1, Ordering::AcqRel);
                conn.in_transaction = false;
                conn.statements.clear();
                write_ok(transport, conn, 0, 0).await?;
            }
            c if c == Command::InitDb as u8 => write_ok(transport, conn, 0, 0).await?,
            c if c == Command::ChangeUser as u8 => {
                // Ask for a fresh round of native auth, accept whatever
                // comes back, and reset session state like a real server.
                let mut w = PayloadWriter::new();
                w.write_u8(0xFE);
                w.write_nul_str("mysql_native_password");
                w.write_bytes(&MOCK_SCRAMBLE);
                w.write_u8(0);
                transport.write_payload(w.freeze()).await?;

                let _auth_response = transport.read_payload().await?;
                conn.in_transaction = false;
                conn.statements.clear();
                write_ok(transport, conn, 0, 0).await?;
            }
            c if c == Command::Query as u8 => {
                let sql = String::from_utf8_lossy(&payload[1..]).into_owned();
                dispatch_query(transport, conn, state, &sql).await?;
            }
            c if c == Command::StmtPrepare as u8 => {
                let sql = String::from_utf8_lossy(&payload[1..]).into_owned();
                let param_count = sql.matches('?').count() as u16;
                let statement_id = conn.next_statement_id;
                conn.next_statement_id += 1;
                conn.statements
                    .insert(statement_id, (sql, param_count));

                let mut w = PayloadWriter::new();
                w.write_u8(0x00);
                w.write_u32_le(statement_id);
                w.write_u16_le(0); // column count deferred to execute
                w.write_u16_le(param_count);
                w.write_u8(0);
                w.write_u16_le(0);
                transport.write_payload(w.freeze()).await?;

                // Parameter definitions for each placeholder.
                for i in 0..param_count {
                    let column = MockColumn::varchar(format!("?{i}"));
                    transport
                        .write_payload(encode_column(&column))
                        .await?;
                }
            }
            c if c == Command::StmtExecute as u8 => {
                let mut reader = PayloadReader::new(&payload[1..]);
                let statement_id = reader.read_u32_le("statement id")?;
                let sql = conn
                    .statements
                    .get(&statement_id)
                    .map(|(sql, _)| sql.clone());
                match sql {
                    Some(sql) => dispatch_binary(transport, conn, state, &sql).await?,
                    None => {
                        write_error(transport, conn, 1243, "Unknown prepared statement handler")
                            .await?;
                    }
                }
            }
            c if c == Command::StmtClose as u8 => {
                let mut reader = PayloadReader::new(&payload[1..]);
                if let Ok(statement_id) = reader.read_u32_le("statement id") {
                    conn.statements.remove(&statement_id);
                }
                // No response by contract.
            }
            _ => {
                write_error(transport, conn, 1047, "Unknown command").await?;
            }
        }
    }
}

fn conn_status(conn: &ConnState) -> StatusFlags {
    let mut status = StatusFlags::AUTOCOMMIT;
    if conn.in_transaction {
        status |= StatusFlags::IN_TRANS;
    }
    status
}

async fn write_ok(
    transport: &mut PacketConn<TcpStream>,
    conn: &ConnState,
    affected_rows: u64,
    last_insert_id: u64,
) -> Result<()> {
    write_ok_with_status(transport, affected_rows, last_insert_id, conn_status(conn)).await
}

async fn write_ok_with_status(
    transport: &mut PacketConn<TcpStream>,
    affected_rows: u64,
    last_insert_id: u64,
    status: StatusFlags,
) -> Result<()> {
    let mut w = PayloadWriter::new();
    w.write_u8(0x00);
    w.write_lenenc_int(affected_rows);
    w.write_lenenc_int(last_insert_id);
    w.write_u16_le(status.bits());
    w.write_u16_le(0);
    transport.write_payload(w.freeze()).await?;
    Ok(())
}

async fn write_error(
    transport: &mut PacketConn<TcpStream>,
    _conn: &ConnState,
    code: u16,
    message: &str,
) -> Result<()> {
    let mut w = PayloadWriter::new();
    w.write_u8(0xFF);
    w.write_u16_le(code);
    w.write_u8(b'#');
    w.write_bytes(b"HY000");
    w.write_bytes(message.as_bytes());
    transport.write_payload(w.freeze()).await?;
    Ok(())
}

fn encode_column(column: &MockColumn) -> Bytes {
    let mut w = PayloadWriter::new();
    w.write_lenenc_str("def");
    w.write_lenenc_str("mock");
    w.write_lenenc_str("t");
    w.write_lenenc_str("t");
    w.write_lenenc_str(&column.name);
    w.write_lenenc_str(&column.name);
    w.write_lenenc_int(0x0C);
    w.write_u16_le(63);
    w.write_u32_le(255);
    w.write_u8(column.column_type as u8);
    w.write_u16_le(column.flags.bits());
    w.write_u8(0);
    w.write_u16_le(0);
    w.freeze()
}

/// Row-stream terminator: an OK packet with an 0xFE header
/// (DEPRECATE_EOF framing).
async fn write_terminator(
    transport: &mut PacketConn<TcpStream>,
    status: StatusFlags,
) -> Result<()> {
    let mut w = PayloadWriter::new();
    w.write_u8(0xFE);
    w.write_lenenc_int(0);
    w.write_lenenc_int(0);
    w.write_u16_le(status.bits());
    w.write_u16_le(0);
    transport.write_payload(w.freeze()).await?;
    Ok(())
}

async fn dispatch_query(
    transport: &mut PacketConn<TcpStream>,
    conn: &mut ConnState,
    state: &Arc<ServerState>,
    sql: &str,
) -> Result<()> {
    let normalized = sql.trim().to_ascii_lowercase();

    // Session-state statements the mock understands natively.
    if let Some(rest) = normalized.strip_prefix("kill query ") {
        if let Ok(victim) = rest.trim().parse::<u32>() {
            let notify = state.kills.lock().get(&victim).cloned();
            if let Some(notify) = notify {
                notify.notify_waiters();
                return write_ok(transport, conn, 0, 0).await;
            }
        }
        return write_error(transport, conn, 1094, "Unknown thread id").await;
    }
    match normalized.as_str() {
        "begin" | "start transaction" => {
            conn.in_transaction = true;
            return write_ok(transport, conn, 0, 0).await;
        }
        "commit" | "rollback" => {
            conn.in_transaction = false;
            return write_ok(transport, conn, 0, 0).await;
        }
        "set autocommit=1" => return write_ok(transport, conn, 0, 0).await,
        _ => {}
    }

    match state.responses.get(&normalized).cloned() {
        Some(response) => write_response(transport, conn, &response, false).await,
        None => {
            write_error(
                transport,
                conn,
                1064,
                &format!("mock has no script for: {sql}"),
            )
            .await
        }
    }
}

async fn dispatch_binary(
    transport: &mut PacketConn<TcpStream>,
    conn: &mut ConnState,
    state: &Arc<ServerState>,
    sql: &str,
) -> Result<()> {
    let normalized = sql.trim().to_ascii_lowercase();
    match state.responses.get(&normalized).cloned() {
        Some(response) => write_response(transport, conn, &response, true).await,
        None => {
            write_error(
                transport,
                conn,
                1064,
                &format!("mock has no script for: {sql}"),
            )
            .await
        }
    }
}

fn encode_text_row(row: &[MockCell]) -> Bytes {
    let mut w = PayloadWriter::new();
    for cell in row {
        match cell {
            Some(text) => w.write_lenenc_str(text),
            None => w.write_u8(0xFB),
        }
    }
    w.freeze()
}

fn encode_binary_row(columns: &[MockColumn], row: &[MockCell]) -> Bytes {
    let mut w = PayloadWriter::new();
    w.write_u8(0x00);

    let mut bitmap = vec![0u8; (columns.len() + 7 + 2) / 8];
    for (i, cell) in row.iter().enumerate() {
        if cell.is_none() {
            let bit = i + 2;
            bitmap[bit / 8] |= 1 << (bit % 8);
        }
    }
    w.write_bytes(&bitmap);

    for (column, cell) in columns.iter().zip(row) {
        let Some(text) = cell else { continue };
        match column.column_type {
            ColumnType::Long => {
                let parsed: i32 = text.parse().unwrap_or(0);
                w.write_u32_le(parsed as u32);
            }
            ColumnType::LongLong => {
                let parsed: i64 = text.parse().unwrap_or(0);
                w.write_u64_le(parsed as u64);
            }
            _ => w.write_lenenc_str(text),
        }
    }

    w.freeze()
}

async fn write_result_set(
    transport: &mut PacketConn<TcpStream>,
    columns: &[MockColumn],
    rows: &[Vec<MockCell>],
    binary: bool,
    status: StatusFlags,
) -> Result<()> {
    let mut w = PayloadWriter::new();
    w.write_lenenc_int(columns.len() as u64);
    transport.write_payload(w.freeze()).await?;

    for column in columns {
        transport.write_payload(encode_column(column)).await?;
    }

    for row in rows {
        let payload = if binary {
            encode_binary_row(columns, row)
        } else {
            encode_text_row(row)
        };
        transport.write_payload(payload).await?;
    }

    write_terminator(transport, status).await
}

fn write_response<'a>(
    transport: &'a mut PacketConn<TcpStream>,
    conn: &'a mut ConnState,
    response: &'a MockResponse,
    binary: bool,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>> {
    Box::pin(async move {
        match response {
            MockResponse::Ok {
                affected_rows,
                last_insert_id,
            } => write_ok(transport, conn, *affected_rows, *last_insert_id).await,
            MockResponse::Error {
                code,
                sqlstate,
                message,
            } => {
                let mut w = PayloadWriter::new();
                w.write_u8(0xFF);
                w.write_u16_le(*code);
                w.write_u8(b'#');
                w.write_bytes(sqlstate.as_bytes());
                w.write_bytes(message.as_bytes());
                transport.write_payload(w.freeze()).await?;
                Ok(())
            }
            MockResponse::ResultSet { columns, rows } => {
                write_result_set(transport, columns, rows, binary, conn_status(conn)).await
            }
            MockResponse::LocalInfile { filename } => {
                let mut w = PayloadWriter::new();
                w.write_u8(0xFB);
                w.write_bytes(filename.as_bytes());
                transport.write_payload(w.freeze()).await?;

                // Consume upload packets until the empty terminator.
                let mut received = 0u64;
                loop {
                    let chunk = transport.read_payload().await?;
                    if chunk.is_empty() {
                        break;
                    }
                    received += chunk.len() as u64;
                }
                write_ok(transport, conn, received, 0).await
            }
            MockResponse::Many(responses) => {
                for (i, part) in responses.iter().enumerate() {
                    let last = i == responses.len() - 1;
                    let mut status = conn_status(conn);
                    if !last {
                        status |= StatusFlags::MORE_RESULTS_EXISTS;
                    }
                    match part {
                        MockResponse::Ok {
                            affected_rows,
                            last_insert_id,
                        } => {
                            write_ok_with_status(
                                transport,
                                *affected_rows,
                                *last_insert_id,
                                status,
                            )
                            .await?;
                        }
                        MockResponse::ResultSet { columns, rows } => {
                            write_result_set(transport, columns, rows, binary, status).await?;
                        }
                        other => write_response(transport, conn, other, binary).await?,
                    }
                }
                Ok(())
            }
            MockResponse::Delayed {
                delay,
                then,
                ignore_kill,
            } => {
                let killed = if *ignore_kill {
                    tokio::time::sleep(*delay).await;
                    false
                } else {
                    tokio::select! {
                        () = tokio::time::sleep(*delay) => false,
                        () = conn.kill_notify.notified() => true,
                    }
                };

                if killed {
                    write_error(
                        transport,
                        conn,
                        mysql_wire::ER_QUERY_INTERRUPTED,
                        "Query execution was interrupted",
                    )
                    .await
                } else {
                    write_response(transport, conn, then, binary).await
                }
            }
        }
    })
}
