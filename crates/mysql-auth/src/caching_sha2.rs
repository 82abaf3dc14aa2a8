//! `caching_sha2_password`: the SHA256-based method, default since 8.0.
//!
//! The fast path is a single scramble exchange answered with 0x03 when the
//! server has the credential cached. A cache miss triggers full
//! authentication (0x04): over TLS or a Unix socket the cleartext password
//! is sent; otherwise the client requests the server's RSA public key and
//! sends the password OAEP-encrypted.

use crate::error::{AuthError, Result};
use crate::plugin::{AuthContext, AuthPlugin, AuthStep};
use crate::scramble;

/// Wire name of this plugin.
pub const NAME: &str = "caching_sha2_password";

/// Fast-auth success marker inside AuthMoreData.
pub const FAST_AUTH_SUCCESS: u8 = 0x03;
/// Full-auth-required marker inside AuthMoreData.
pub const PERFORM_FULL_AUTH: u8 = 0x04;
/// Client request for the server's RSA public key.
pub const REQUEST_PUBLIC_KEY: u8 = 0x02;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Scramble sent, awaiting 0x03 / 0x04.
    AwaitingVerdict,
    /// Public key requested, awaiting the PEM blob.
    AwaitingPublicKey,
    /// Nothing further expected from the plugin.
    Settled,
}

/// SHA256 challenge-response with server-side credential caching.
#[derive(Debug)]
pub struct CachingSha2Password {
    state: State,
}

impl CachingSha2Password {
    /// Create a plugin instance for one handshake.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: State::AwaitingVerdict,
        }
    }
}

impl Default for CachingSha2Password {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthPlugin for CachingSha2Password {
    fn name(&self) -> &'static str {
        NAME
    }

    fn initial_response(&mut self, ctx: &AuthContext<'_>) -> Result<Vec<u8>> {
        self.state = State::AwaitingVerdict;
        Ok(scramble::sha2_password(ctx.password, ctx.scramble))
    }

    fn continue_auth(&mut self, ctx: &AuthContext<'_>, data: &[u8]) -> Result<AuthStep> {
        match self.state {
            State::AwaitingVerdict => match data.first() {
                Some(&FAST_AUTH_SUCCESS) => {
                    tracing::debug!("caching_sha2 fast authentication accepted");
                    self.state = State::Settled;
                    Ok(AuthStep::Done)
                }
                Some(&PERFORM_FULL_AUTH) => {
                    if ctx.secure_channel {
                        tracing::debug!("caching_sha2 full auth over secure channel");
                        self.state = State::Settled;
                        let mut cleartext = ctx.password.as_bytes().to_vec();
                        cleartext.push(0);
                        Ok(AuthStep::Respond(cleartext))
                    } else {
                        tracing::debug!("caching_sha2 full auth, requesting server public key");
                        self.state = State::AwaitingPublicKey;
                        Ok(AuthStep::Respond(vec![REQUEST_PUBLIC_KEY]))
                    }
                }
                _ => Err(AuthError::MalformedExchange(
                    "caching_sha2_password expected a fast-auth verdict",
                )),
            },
            State::AwaitingPublicKey => {
                let encrypted =
                    scramble::rsa_encrypt_password(ctx.password, ctx.scramble, data, true)?;
                self.state = State::Settled;
                Ok(AuthStep::Respond(encrypted))
            }
            State::Settled => Err(AuthError::MalformedExchange(
                "caching_sha2_password exchange already settled",
            )),
        }
    }
}
