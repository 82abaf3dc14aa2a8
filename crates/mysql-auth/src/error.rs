//! Authentication error types.

use thiserror::Error;

/// Errors that can occur during the authentication exchange.
///
/// All of these are terminal for the session being established.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// The server asked for a plugin nobody registered.
    #[error("unknown authentication plugin `{0}`")]
    UnknownPlugin(String),

    /// The plugin refused to run under the current conditions.
    #[error("plugin `{plugin}` refused: {reason}")]
    Refused {
        /// Plugin that refused.
        plugin: &'static str,
        /// Why it refused.
        reason: &'static str,
    },

    /// Sending a cleartext password requires TLS or a Unix socket.
    #[error("cleartext authentication requires a secure channel")]
    InsecureCleartext,

    /// RSA key parsing or encryption failed during full authentication.
    #[error("RSA password encryption failed: {0}")]
    Rsa(String),

    /// The server's side of the exchange violated the plugin's protocol.
    #[error("malformed authentication exchange: {0}")]
    MalformedExchange(&'static str),

    /// The server answered the handshake with an ERR packet.
    #[error("server rejected authentication ({code}): {message}")]
    ServerRejected {
        /// MySQL error code, e.g. 1045 for access denied.
        code: u16,
        /// Server-provided message.
        message: String,
    },
}

/// Result type for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;
