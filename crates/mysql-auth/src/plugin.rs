//! The authentication plugin contract.
//!
//! A plugin is a per-handshake state machine: the session creates one from
//! the registry when the server names it, feeds it the scramble for the
//! initial response, and routes every AuthMoreData payload through
//! [`AuthPlugin::continue_auth`] until the server settles the exchange
//! with OK or ERR.

use crate::error::Result;

/// Immutable facts about the handshake the plugin is running in.
#[derive(Debug, Clone, Copy)]
pub struct AuthContext<'a> {
    /// User being authenticated.
    pub username: &'a str,
    /// Password from the configuration, possibly empty.
    pub password: &'a str,
    /// Server scramble (nonce) for this handshake.
    pub scramble: &'a [u8],
    /// Whether the transport is safe for cleartext: TLS or a Unix socket.
    pub secure_channel: bool,
}

/// Outcome of one continuation step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStep {
    /// Send these bytes to the server and keep the exchange open.
    Respond(Vec<u8>),
    /// The plugin is finished; the server's OK/ERR settles the handshake.
    Done,
}

/// A pluggable authentication method.
///
/// Implementations are created per handshake and may carry state between
/// continuation steps (e.g. awaiting the server's RSA public key).
pub trait AuthPlugin: Send {
    /// The wire name this plugin answers to.
    fn name(&self) -> &'static str;

    /// Produce the auth response embedded in the Handshake Response packet
    /// (or sent after an AuthSwitch naming this plugin).
    fn initial_response(&mut self, ctx: &AuthContext<'_>) -> Result<Vec<u8>>;

    /// Consume an AuthMoreData payload (0x01 header already stripped).
    fn continue_auth(&mut self, ctx: &AuthContext<'_>, data: &[u8]) -> Result<AuthStep>;
}
