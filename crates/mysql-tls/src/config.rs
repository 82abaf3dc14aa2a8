//! TLS configuration options.

use std::path::PathBuf;
use std::str::FromStr;

/// TLS policy for a connection, mirroring the `SSL Mode` connection-string
/// key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SslMode {
    /// Never use TLS.
    Disabled,
    /// Use TLS if the server offers it, without certificate validation.
    #[default]
    Preferred,
    /// Require TLS, without certificate validation.
    Required,
    /// Require TLS and validate the certificate chain.
    VerifyCa,
    /// Require TLS and validate both the chain and the hostname.
    VerifyFull,
}

impl SslMode {
    /// Whether this mode ever negotiates TLS.
    #[must_use]
    pub fn allows_tls(self) -> bool {
        !matches!(self, Self::Disabled)
    }

    /// Whether the connection must fail if the server cannot do TLS.
    #[must_use]
    pub fn requires_tls(self) -> bool {
        matches!(self, Self::Required | Self::VerifyCa | Self::VerifyFull)
    }

    /// Whether the certificate chain is validated.
    #[must_use]
    pub fn verifies_chain(self) -> bool {
        matches!(self, Self::VerifyCa | Self::VerifyFull)
    }

    /// Whether the hostname is validated against the certificate.
    #[must_use]
    pub fn verifies_hostname(self) -> bool {
        matches!(self, Self::VerifyFull)
    }
}

impl FromStr for SslMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Connection strings spell these with or without spaces.
        match s.trim().to_ascii_lowercase().replace([' ', '-', '_'], "").as_str() {
            "none" | "disabled" | "disable" => Ok(Self::Disabled),
            "preferred" | "prefer" => Ok(Self::Preferred),
            "required" | "require" => Ok(Self::Required),
            "verifyca" => Ok(Self::VerifyCa),
            "verifyfull" | "verifyidentity" => Ok(Self::VerifyFull),
            other => Err(format!("unrecognized SSL mode `{other}`")),
        }
    }
}

/// TLS configuration for MySQL connections.
#[derive(Debug, Clone, Default)]
pub struct TlsConfig {
    /// TLS policy.
    pub mode: SslMode,
    /// PEM file with additional trusted root certificates.
    pub ca_file: Option<PathBuf>,
    /// Hostname override for SNI and certificate validation.
    pub server_name: Option<String>,
}

impl TlsConfig {
    /// Create a configuration with the given mode and no extra roots.
    #[must_use]
    pub fn new(mode: SslMode) -> Self {
        Self {
            mode,
            ca_file: None,
            server_name: None,
        }
    }

    /// Trust the roots in a PEM bundle in addition to the system roots.
    #[must_use]
    pub fn ca_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_file = Some(path.into());
        self
    }

    /// Override the hostname used for SNI and validation.
    #[must_use]
    pub fn server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = Some(name.into());
        self
    }
}
