//! `sha256_password`: RSA-based authentication without server-side caching.
//!
//! Behaves like the full-auth path of `caching_sha2_password`: cleartext
//! over a secure channel, otherwise a public-key request (0x01 for this
//! plugin) followed by an RSA-encrypted password. Pre-8.0.5 servers expect
//! PKCS#1 v1.5 padding here rather than OAEP.

use crate::error::{AuthError, Result};
use crate::plugin::{AuthContext, AuthPlugin, AuthStep};
use crate::scramble;

/// Wire name of this plugin.
pub const NAME: &str = "sha256_password";

/// Client request for the server's RSA public key.
pub const REQUEST_PUBLIC_KEY: u8 = 0x01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Initial,
    AwaitingPublicKey,
    Settled,
}

/// RSA password authentication.
#[derive(Debug)]
pub struct Sha256Password {
    state: State,
}

impl Sha256Password {
    /// Create a plugin instance for one handshake.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: State::Initial,
        }
    }
}

impl Default for Sha256Password {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthPlugin for Sha256Password {
    fn name(&self) -> &'static str {
        NAME
    }

    fn initial_response(&mut self, ctx: &AuthContext<'_>) -> Result<Vec<u8>> {
        if ctx.password.is_empty() {
            self.state = State::Settled;
            return Ok(Vec::new());
        }
        if ctx.secure_channel {
            self.state = State::Settled;
            let mut cleartext = ctx.password.as_bytes().to_vec();
            cleartext.push(0);
            return Ok(cleartext);
        }
        self.state = State::AwaitingPublicKey;
        Ok(vec![REQUEST_PUBLIC_KEY])
    }

    fn continue_auth(&mut self, ctx: &AuthContext<'_>, data: &[u8]) -> Result<AuthStep> {
        match self.state {
            State::AwaitingPublicKey => {
                let encrypted =
                    scramble::rsa_encrypt_password(ctx.password, ctx.scramble, data, false)?;
                self.state = State::Settled;
                Ok(AuthStep::Respond(encrypted))
            }
            State::Initial | State::Settled => Err(AuthError::MalformedExchange(
                "sha256_password received unexpected continuation data",
            )),
        }
    }
}
