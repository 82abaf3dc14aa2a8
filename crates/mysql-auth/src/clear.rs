//! `mysql_clear_password`: cleartext authentication for external backends
//! (PAM, LDAP). Only permitted over TLS or a Unix socket.

use crate::error::{AuthError, Result};
use crate::plugin::{AuthContext, AuthPlugin, AuthStep};

/// Wire name of this plugin.
pub const NAME: &str = "mysql_clear_password";

/// Cleartext password authentication.
#[derive(Debug, Default)]
pub struct ClearPassword;

impl AuthPlugin for ClearPassword {
    fn name(&self) -> &'static str {
        NAME
    }

    fn initial_response(&mut self, ctx: &AuthContext<'_>) -> Result<Vec<u8>> {
        if !ctx.secure_channel {
            return Err(AuthError::InsecureCleartext);
        }
        let mut response = ctx.password.as_bytes().to_vec();
        response.push(0);
        Ok(response)
    }

    fn continue_auth(&mut self, _ctx: &AuthContext<'_>, _data: &[u8]) -> Result<AuthStep> {
        Err(AuthError::MalformedExchange(
            "mysql_clear_password received unexpected continuation data",
        ))
    }
}
