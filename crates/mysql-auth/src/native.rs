//! `mysql_native_password`: the SHA1-based method, default before 8.0.

use crate::error::{AuthError, Result};
use crate::plugin::{AuthContext, AuthPlugin, AuthStep};
use crate::scramble;

/// Wire name of this plugin.
pub const NAME: &str = "mysql_native_password";

/// SHA1 challenge-response authentication.
#[derive(Debug, Default)]
pub struct NativePassword;

impl AuthPlugin for NativePassword {
    fn name(&self) -> &'static str {
        NAME
    }

    fn initial_response(&mut self, ctx: &AuthContext<'_>) -> Result<Vec<u8>> {
        Ok(scramble::native_password(ctx.password, ctx.scramble))
    }

    fn continue_auth(&mut self, _ctx: &AuthContext<'_>, _data: &[u8]) -> Result<AuthStep> {
        // The exchange is a single round trip; any continuation data means
        // the server is off-script.
        Err(AuthError::MalformedExchange(
            "mysql_native_password received unexpected continuation data",
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn ctx<'a>(scramble: &'a [u8]) -> AuthContext<'a> {
        AuthContext {
            username: "root",
            password: "secret",
            scramble,
            secure_channel: false,
        }
    }

    #[test]
    fn test_initial_response_is_twenty_bytes() {
        let seed = [7u8; 20];
        let mut plugin = NativePassword;
        let response = plugin.initial_response(&ctx(&seed)).unwrap();
        assert_eq!(response.len(), 20);
    }

    #[test]
    fn test_continuation_is_protocol_error() {
        let seed = [7u8; 20];
        let mut plugin = NativePassword;
        assert!(plugin.continue_auth(&ctx(&seed), &[1, 2, 3]).is_err());
    }
}
