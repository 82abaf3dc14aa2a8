//! A single logical connection: transport, negotiated state, and the
//! protocol state machine.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use mysql_auth::{AuthContext, AuthStep};
use mysql_codec::{BoxTransport, PacketConn};
use mysql_tls::TlsConnector;
use mysql_types::DecodeOptions;
use mysql_wire::handshake::{
    AuthMoreData, AuthSwitchRequest, HandshakeResponse, InitialHandshake, MAX_ALLOWED_PACKET,
    SslRequest,
};
use mysql_wire::response::{ErrPacket, OkPacket, ResponseKind};
use mysql_wire::{Capabilities, Command, ProtocolError, ServerVersion, StatusFlags};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::config::Config;
use crate::error::{Error, Result, TimeoutKind};
use crate::statement::StatementCache;

/// Observable protocol state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Transport open, greeting not yet processed.
    Connecting,
    /// Handshake response sent, waiting for the server's verdict.
    Handshaking,
    /// Mid-auth: the server switched plugins or asked for more data.
    AuthSwitching,
    /// Idle between commands.
    Ready,
    /// A command request has been written, response pending.
    Querying,
    /// Rows are being streamed to the caller.
    StreamingResult,
    /// Poisoned: the transport can no longer be trusted.
    Failed,
    /// Closed by the caller.
    Closed,
}

impl SessionState {
    /// Whether new commands may be issued.
    #[must_use]
    pub fn is_ready(self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Whether the session must be destroyed rather than reused.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Closed)
    }
}

/// A single logical connection to a MySQL server.
///
/// A session is owned by at most one executor at a time; nothing in here
/// is synchronized. The pool enforces exclusive leases, and the sidecar
/// used for cancellation is a separate session entirely.
pub struct Session {
    conn: PacketConn<BoxTransport>,
    /// Capabilities granted for this session (client ∩ server).
    capabilities: Capabilities,
    /// Server-assigned connection id, the KILL QUERY target.
    thread_id: u32,
    server_version: ServerVersion,
    /// Status flags from the most recent OK/EOF/ERR exchange.
    status: StatusFlags,
    state: SessionState,
    /// Host actually connected, used to open the cancellation sidecar.
    host: String,
    /// Whether the transport is TLS or a Unix socket.
    secure_channel: bool,
    pub(crate) stmt_cache: StatementCache,
    decode_options: DecodeOptions,
    created_at: Instant,
    last_used: Instant,
    config: Arc<Config>,
}

impl Session {
    /// Connect to the first reachable host in the configuration.
    pub async fn connect(config: Arc<Config>) -> Result<Self> {
        let hosts = config.hosts.clone();
        let mut last_error = Error::Config("no server endpoint configured".into());

        if config.unix_socket.is_some() {
            return Self::connect_to_host(config, "localhost").await;
        }

        for host in hosts {
            match Self::connect_to_host(Arc::clone(&config), &host).await {
                Ok(session) => return Ok(session),
                Err(e) => {
                    tracing::warn!(host = %host, error = %e, "connect attempt failed");
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }

    /// Connect to a specific host, with the whole handshake under the
    /// connect-timeout budget.
    pub async fn connect_to_host(config: Arc<Config>, host: &str) -> Result<Self> {
        timeout(
            config.connect_timeout,
            Self::connect_inner(config, host),
        )
        .await
        .map_err(|_| Error::Timeout(TimeoutKind::Connect))?
    }

    async fn connect_inner(config: Arc<Config>, host: &str) -> Result<Self> {
        tracing::debug!(host = %host, port = config.port, "connecting");

        let (transport, secure_channel) = Self::open_transport(&config, host).await?;
        let mut conn = PacketConn::new(transport);

        // Step 1: the server speaks first.
        let greeting_payload = conn.read_payload().await?;
        let greeting = InitialHandshake::decode(&greeting_payload)?;

        tracing::debug!(
            server = %greeting.server_version,
            thread_id = greeting.connection_id,
            plugin = %greeting.auth_plugin,
            "received server greeting"
        );

        // Step 2: effective capabilities.
        let offered = greeting.capabilities;
        if !offered.contains(Capabilities::PROTOCOL_41 | Capabilities::SECURE_CONNECTION) {
            return Err(Error::Protocol(ProtocolError::Malformed(
                "server does not support the 4.1 protocol",
            )));
        }
        let desired = config.desired_capabilities();
        let mut effective = desired & offered;

        let want_tls = config.tls.mode.allows_tls() && config.unix_socket.is_none();
        if config.tls.mode.requires_tls() && !offered.contains(Capabilities::SSL) {
            return Err(Error::Tls(mysql_tls::TlsError::Configuration(
                "server does not offer TLS".into(),
            )));
        }
        let use_tls = want_tls && offered.contains(Capabilities::SSL);
        if use_tls {
            effective |= Capabilities::SSL;
        } else {
            effective -= Capabilities::SSL;
        }

        // Step 3: optional TLS interleave. The sequence counter continues
        // across the upgrade.
        let mut secure_channel = secure_channel;
        if use_tls {
            let request = SslRequest {
                capabilities: effective,
                max_packet_size: MAX_ALLOWED_PACKET,
                charset: config.charset,
            };
            conn.write_payload(Bytes::from(request.encode())).await?;

            let (transport, seq) = conn.into_inner();
            let connector = TlsConnector::new(config.tls.clone())?;
            let tls_stream = connector.connect(transport, host).await?;
            conn = PacketConn::new(Box::new(tls_stream) as BoxTransport);
            conn.set_sequence(seq);
            secure_channel = true;
        }

        // Step 4: authenticate, following switches and continuations.
        let mut plugin = mysql_auth::create(&greeting.auth_plugin)?;
        let mut scramble = greeting.scramble.clone();

        let initial = plugin.initial_response(&AuthContext {
            username: &config.username,
            password: &config.password,
            scramble: &scramble,
            secure_channel,
        })?;

        let response = HandshakeResponse {
            capabilities: effective,
            max_packet_size: MAX_ALLOWED_PACKET,
            charset: config.charset,
            username: config.username.clone(),
            auth_response: initial,
            database: config.database.clone(),
            auth_plugin: Some(plugin.name().to_owned()),
            attributes: config.attributes.clone(),
        };
        conn.write_payload(Bytes::from(response.encode())).await?;

        let ok = loop {
            let payload = conn.read_payload().await?;
            match payload.first().copied() {
                Some(0x00) => break OkPacket::decode(&payload, effective)?,
                Some(0xFF) => {
                    let err = ErrPacket::decode(&payload)?;
                    return Err(Error::Auth(mysql_auth::AuthError::ServerRejected {
                        code: err.code,
                        message: err.message,
                    }));
                }
                Some(0xFE) => {
                    // AuthSwitchRequest: restart with the named plugin.
                    let switch = AuthSwitchRequest::decode(&payload)?;
                    tracing::debug!(plugin = %switch.plugin_name, "auth switch requested");
                    plugin = mysql_auth::create(&switch.plugin_name)?;
                    scramble = switch.plugin_data.clone();
                    let response = plugin.initial_response(&AuthContext {
                        username: &config.username,
                        password: &config.password,
                        scramble: &scramble,
                        secure_channel,
                    })?;
                    conn.write_payload(Bytes::from(response)).await?;
                }
                Some(0x01) => {
                    let more = AuthMoreData::decode(&payload)?;
                    let step = plugin.continue_auth(
                        &AuthContext {
                            username: &config.username,
                            password: &config.password,
                            scramble: &scramble,
                            secure_channel,
                        },
                        &more.data,
                    )?;
                    match step {
                        AuthStep::Respond(bytes) => {
                            conn.write_payload(Bytes::from(bytes)).await?;
                        }
                        AuthStep::Done => {}
                    }
                }
                _ => {
                    return Err(Error::Protocol(ProtocolError::Malformed(
                        "unexpected packet during authentication",
                    )));
                }
            }
        };

        // Step 5: compression only starts after the handshake settles.
        if effective.contains(Capabilities::COMPRESS) {
            conn = conn.into_compressed();
            tracing::debug!("compression envelope enabled");
        }

        let now = Instant::now();
        tracing::info!(
            host = %host,
            thread_id = greeting.connection_id,
            server = %greeting.server_version,
            tls = use_tls,
            "session established"
        );

        Ok(Self {
            conn,
            capabilities: effective,
            thread_id: greeting.connection_id,
            server_version: greeting.server_version,
            status: ok.status,
            state: SessionState::Ready,
            host: host.to_owned(),
            secure_channel,
            stmt_cache: StatementCache::with_default_size(),
            decode_options: config.decode_options(),
            created_at: now,
            last_used: now,
            config,
        })
    }

    async fn open_transport(config: &Config, host: &str) -> Result<(BoxTransport, bool)> {
        if let Some(path) = &config.unix_socket {
            #[cfg(unix)]
            {
                let stream = tokio::net::UnixStream::connect(path).await?;
                return Ok((Box::new(stream) as BoxTransport, true));
            }
            #[cfg(not(unix))]
            {
                let _ = path;
                return Err(Error::Config(
                    "unix socket transport is not available on this platform".into(),
                ));
            }
        }

        let addr = format!("{}:{}", host, config.port);
        let stream = TcpStream::connect(&addr).await?;
        stream.set_nodelay(true)?;
        Ok((Box::new(stream) as BoxTransport, false))
    }

    /// Granted capability set.
    #[must_use]
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Server-assigned connection id.
    #[must_use]
    pub fn thread_id(&self) -> u32 {
        self.thread_id
    }

    /// Parsed server version.
    #[must_use]
    pub fn server_version(&self) -> &ServerVersion {
        &self.server_version
    }

    /// Status flags after the last completed exchange.
    #[must_use]
    pub fn status(&self) -> StatusFlags {
        self.status
    }

    /// Current protocol state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether an explicit transaction is open.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.status.in_transaction()
    }

    /// Host this session is connected to.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Whether the transport is safe for cleartext credentials (TLS or a
    /// Unix socket).
    #[must_use]
    pub fn is_secure_channel(&self) -> bool {
        self.secure_channel
    }

    /// When the session was established.
    #[must_use]
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// When the session last carried a command.
    #[must_use]
    pub fn last_used(&self) -> Instant {
        self.last_used
    }

    /// The configuration this session was built from.
    #[must_use]
    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    /// Decoding options in effect.
    #[must_use]
    pub(crate) fn decode_options(&self) -> DecodeOptions {
        self.decode_options
    }

    /// Mark the session unusable. Idempotent.
    pub fn poison(&mut self) {
        if self.state != SessionState::Failed {
            tracing::warn!(thread_id = self.thread_id, "session poisoned");
            self.state = SessionState::Failed;
        }
    }

    /// Whether the session can accept another command.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        !self.state.is_terminal()
    }

    pub(crate) fn set_state(&mut self, state: SessionState) {
        self.state = state;
    }

    pub(crate) fn update_status(&mut self, status: StatusFlags) {
        self.status = status;
    }

    /// Send a command request: sequence restarts at zero, the command
    /// byte leads the payload.
    pub(crate) async fn send_command(&mut self, command: Command, body: &[u8]) -> Result<()> {
        if self.state.is_terminal() {
            return Err(Error::Poisoned);
        }
        if !self.state.is_ready() {
            return Err(Error::Usage(format!(
                "cannot issue {command:?} while the session is {:?}",
                self.state
            )));
        }

        let mut payload = Vec::with_capacity(1 + body.len());
        payload.push(command as u8);
        payload.extend_from_slice(body);

        self.conn.reset_sequence();
        self.last_used = Instant::now();
        if !command.is_fire_and_forget() {
            self.state = SessionState::Querying;
        }

        tracing::debug!(command = ?command, len = body.len(), "sending command");

        match self.conn.write_payload(Bytes::from(payload)).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.poison();
                Err(e.into())
            }
        }
    }

    /// Read one logical payload, poisoning the session on transport or
    /// framing failure.
    pub(crate) async fn read_payload(&mut self) -> Result<Bytes> {
        match self.conn.read_payload().await {
            Ok(payload) => Ok(payload),
            Err(e) => {
                self.poison();
                Err(e.into())
            }
        }
    }

    /// Write a raw payload continuing the current command's sequence
    /// (LOCAL INFILE chunks, auth continuation).
    pub(crate) async fn write_continuation(&mut self, payload: Bytes) -> Result<()> {
        match self.conn.write_payload(payload).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.poison();
                Err(e.into())
            }
        }
    }

    /// Parse a payload the session expects to be OK or ERR.
    ///
    /// ERR surfaces as a server error and leaves the session Ready; any
    /// other shape poisons.
    pub(crate) fn settle_ok(&mut self, payload: &[u8]) -> Result<OkPacket> {
        match ResponseKind::classify(payload, self.capabilities) {
            ResponseKind::Ok => {
                let ok = OkPacket::decode(payload, self.capabilities).map_err(|e| {
                    self.poison();
                    Error::Protocol(e)
                })?;
                self.status = ok.status;
                self.state = SessionState::Ready;
                Ok(ok)
            }
            ResponseKind::Err => {
                let err = ErrPacket::decode(payload).map_err(|e| {
                    self.poison();
                    Error::Protocol(e)
                })?;
                self.state = SessionState::Ready;
                Err(Error::from_err_packet(err))
            }
            _ => {
                self.poison();
                Err(Error::Protocol(ProtocolError::Malformed(
                    "expected OK or ERR packet",
                )))
            }
        }
    }

    /// `COM_PING`: liveness check.
    pub async fn ping(&mut self) -> Result<()> {
        self.send_command(Command::Ping, &[]).await?;
        let payload = self.read_payload().await?;
        self.settle_ok(&payload)?;
        Ok(())
    }

    /// `COM_INIT_DB`: change the default database.
    pub async fn select_db(&mut self, database: &str) -> Result<()> {
        self.send_command(Command::InitDb, database.as_bytes())
            .await?;
        let payload = self.read_payload().await?;
        self.settle_ok(&payload)?;
        Ok(())
    }

    /// Return the session to a pristine state.
    ///
    /// Prefers `COM_RESET_CONNECTION`; servers too old for it get the
    /// statement fallback (`ROLLBACK` + autocommit restore). Either way
    /// the prepared-statement cache is invalidated.
    pub async fn reset(&mut self) -> Result<()> {
        if !self.is_usable() {
            return Err(Error::Poisoned);
        }

        if self.server_version.supports_reset_connection() {
            self.send_command(Command::ResetConnection, &[]).await?;
            let payload = self.read_payload().await?;
            self.settle_ok(&payload)?;
        } else {
            // Old-server fallback: roll back whatever is open and restore
            // autocommit, then drop local caches.
            if self.in_transaction() {
                crate::query::execute_text(self, "ROLLBACK").await?;
            }
            crate::query::execute_text(self, "SET autocommit=1").await?;
        }

        self.stmt_cache.clear();
        tracing::debug!(thread_id = self.thread_id, "session reset");
        Ok(())
    }

    /// `COM_CHANGE_USER`: re-authenticate, which also resets all session
    /// state.
    ///
    /// The request carries an empty auth response; the server answers
    /// with an AuthSwitch carrying a fresh scramble, and the exchange
    /// proceeds exactly like the tail of the initial handshake.
    pub async fn change_user(
        &mut self,
        username: &str,
        password: &str,
        database: Option<&str>,
    ) -> Result<()> {
        let mut body = mysql_wire::PayloadWriter::new();
        body.write_nul_str(username);
        body.write_u8(0); // empty auth response, length-prefixed
        body.write_nul_str(database.unwrap_or(""));
        body.write_u16_le(u16::from(self.config.charset));
        body.write_nul_str(mysql_wire::DEFAULT_AUTH_PLUGIN);

        self.send_command(Command::ChangeUser, body.as_bytes())
            .await?;

        let mut plugin: Option<Box<dyn mysql_auth::AuthPlugin>> = None;
        let mut scramble: Vec<u8> = Vec::new();

        loop {
            let payload = self.read_payload().await?;
            match payload.first().copied() {
                Some(0x00) => {
                    self.settle_ok(&payload)?;
                    break;
                }
                Some(0xFF) => {
                    // Re-auth failure does not poison: the old identity
                    // is still in effect.
                    let err = ErrPacket::decode(&payload)?;
                    self.state = SessionState::Ready;
                    return Err(Error::from_err_packet(err));
                }
                Some(0xFE) => {
                    let switch = AuthSwitchRequest::decode(&payload)?;
                    let mut next = mysql_auth::create(&switch.plugin_name)?;
                    scramble = switch.plugin_data.clone();
                    let response = next.initial_response(&AuthContext {
                        username,
                        password,
                        scramble: &scramble,
                        secure_channel: self.secure_channel,
                    })?;
                    plugin = Some(next);
                    self.write_continuation(Bytes::from(response)).await?;
                }
                Some(0x01) => {
                    let more = AuthMoreData::decode(&payload)?;
                    let Some(active) = plugin.as_mut() else {
                        self.poison();
                        return Err(Error::Protocol(ProtocolError::Malformed(
                            "auth continuation before an auth switch",
                        )));
                    };
                    let step = active.continue_auth(
                        &AuthContext {
                            username,
                            password,
                            scramble: &scramble,
                            secure_channel: self.secure_channel,
                        },
                        &more.data,
                    )?;
                    if let AuthStep::Respond(bytes) = step {
                        self.write_continuation(Bytes::from(bytes)).await?;
                    }
                }
                _ => {
                    self.poison();
                    return Err(Error::Protocol(ProtocolError::Malformed(
                        "unexpected packet during COM_CHANGE_USER",
                    )));
                }
            }
        }

        // Server-side statement ids died with the old session state.
        self.stmt_cache.clear();
        tracing::debug!(thread_id = self.thread_id, user = %username, "changed user");
        Ok(())
    }

    /// `COM_QUIT` followed by transport teardown. Errors are ignored;
    /// the session is closed regardless.
    pub async fn close(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.conn.reset_sequence();
        let _ = self
            .conn
            .write_payload(Bytes::from_static(&[Command::Quit as u8]))
            .await;
        self.state = SessionState::Closed;
        tracing::debug!(thread_id = self.thread_id, "session closed");
    }

    /// Issue `KILL QUERY` against another session's thread id.
    ///
    /// This is the sidecar side of cancellation: the canceled session
    /// never sees out-of-band data, it just observes its query erroring
    /// with `ER_QUERY_INTERRUPTED`.
    pub async fn kill_query(&mut self, thread_id: u32) -> Result<()> {
        let sql = format!("KILL QUERY {thread_id}");
        crate::query::execute_text(self, &sql).await?;
        Ok(())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("thread_id", &self.thread_id)
            .field("state", &self.state)
            .field("host", &self.host)
            .field("server", &self.server_version.banner)
            .field("compressed", &self.capabilities.contains(Capabilities::COMPRESS))
            .finish_non_exhaustive()
    }
}
