//! TLS connector for upgrading a MySQL transport.
//!
//! MySQL layers TLS mid-handshake: the client sends an SSL Request packet
//! in the clear, performs the TLS handshake over the same transport, and
//! continues the protocol on the encrypted stream. This module only deals
//! with the second step; the packet interleave lives in the client crate.

use std::fs;
use std::sync::Arc;

use rustls::client::danger::{
    HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
};
use rustls::client::WebPkiServerVerifier;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_rustls::TlsConnector as TokioTlsConnector;
pub use tokio_rustls::client::TlsStream;

use crate::config::{SslMode, TlsConfig};
use crate::error::TlsError;

/// TLS connector for MySQL connections.
pub struct TlsConnector {
    config: TlsConfig,
    inner: TokioTlsConnector,
}

impl TlsConnector {
    /// Build a connector for the given configuration.
    ///
    /// Fails for [`SslMode::Disabled`], which must be handled by the
    /// caller before reaching the TLS layer.
    pub fn new(config: TlsConfig) -> Result<Self, TlsError> {
        if !config.mode.allows_tls() {
            return Err(TlsError::Configuration(
                "TLS connector requested with SSL mode `Disabled`".into(),
            ));
        }

        let client_config = Self::build_client_config(&config)?;
        let inner = TokioTlsConnector::from(Arc::new(client_config));
        Ok(Self { config, inner })
    }

    fn build_client_config(config: &TlsConfig) -> Result<ClientConfig, TlsError> {
        let root_store = Self::build_root_store(config)?;

        let builder = ClientConfig::builder();

        let client_config = match config.mode {
            SslMode::Preferred | SslMode::Required => {
                // Encryption without authentication: accept any certificate.
                builder
                    .dangerous()
                    .with_custom_certificate_verifier(Arc::new(AcceptAnyCert::new()))
                    .with_no_client_auth()
            }
            SslMode::VerifyCa => {
                let webpki = WebPkiServerVerifier::builder(Arc::new(root_store))
                    .build()
                    .map_err(|e| TlsError::Configuration(e.to_string()))?;
                builder
                    .dangerous()
                    .with_custom_certificate_verifier(Arc::new(ChainOnlyVerifier {
                        inner: webpki,
                    }))
                    .with_no_client_auth()
            }
            SslMode::VerifyFull => builder
                .with_root_certificates(root_store)
                .with_no_client_auth(),
            SslMode::Disabled => unreachable!("rejected in new()"),
        };

        Ok(client_config)
    }

    fn build_root_store(config: &TlsConfig) -> Result<RootCertStore, TlsError> {
        let mut root_store = RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        if let Some(path) = &config.ca_file {
            let pem = fs::read(path).map_err(|e| {
                TlsError::InvalidCertificate(format!("cannot read {}: {e}", path.display()))
            })?;
            for cert in rustls_pemfile::certs(&mut pem.as_slice()) {
                let cert =
                    cert.map_err(|e| TlsError::InvalidCertificate(e.to_string()))?;
                root_store
                    .add(cert)
                    .map_err(|e| TlsError::InvalidCertificate(e.to_string()))?;
            }
        }

        Ok(root_store)
    }

    /// Perform the TLS handshake over the given stream.
    ///
    /// `server_name` is the host from the connection string; the
    /// configuration may override it for SNI and validation.
    pub async fn connect<S>(&self, stream: S, server_name: &str) -> Result<TlsStream<S>, TlsError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let server_name = self.config.server_name.as_deref().unwrap_or(server_name);

        let dns_name = ServerName::try_from(server_name.to_string())
            .map_err(|_| TlsError::InvalidServerName(server_name.to_string()))?;

        tracing::debug!(server_name = %server_name, mode = ?self.config.mode, "performing TLS handshake");

        let tls_stream = self
            .inner
            .connect(dns_name, stream)
            .await
            .map_err(|e| TlsError::HandshakeFailed(e.to_string()))?;

        tracing::debug!("TLS handshake completed");

        Ok(tls_stream)
    }

    /// The configuration this connector was built from.
    #[must_use]
    pub fn config(&self) -> &TlsConfig {
        &self.config
    }
}

impl std::fmt::Debug for TlsConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConnector")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Verifier that accepts any certificate (Preferred / Required modes).
#[derive(Debug)]
struct AcceptAnyCert {
    schemes: Vec<SignatureScheme>,
}

impl AcceptAnyCert {
    fn new() -> Self {
        Self {
            schemes: rustls::crypto::ring::default_provider()
                .signature_verification_algorithms
                .supported_schemes(),
        }
    }
}

impl ServerCertVerifier for AcceptAnyCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.schemes.clone()
    }
}

/// Verifier that validates the chain but tolerates hostname mismatches
/// (VerifyCa mode).
#[derive(Debug)]
struct ChainOnlyVerifier {
    inner: Arc<WebPkiServerVerifier>,
}

impl ServerCertVerifier for ChainOnlyVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        match self
            .inner
            .verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now)
        {
            Ok(verified) => Ok(verified),
            Err(rustls::Error::InvalidCertificate(e))
                if matches!(
                    e,
                    rustls::CertificateError::NotValidForName
                        | rustls::CertificateError::NotValidForNameContext { .. }
                ) =>
            {
                Ok(ServerCertVerified::assertion())
            }
            Err(e) => Err(e),
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_crypto_provider() {
        let _ = rustls::crypto::ring::default_provider().install_default();
    }

    #[test]
    fn test_connector_rejects_disabled() {
        setup_crypto_provider();
        let result = TlsConnector::new(TlsConfig::new(SslMode::Disabled));
        assert!(matches!(result, Err(TlsError::Configuration(_))));
    }

    #[test]
    fn test_connector_builds_for_each_mode() {
        setup_crypto_provider();
        for mode in [
            SslMode::Preferred,
            SslMode::Required,
            SslMode::VerifyCa,
            SslMode::VerifyFull,
        ] {
            assert!(
                TlsConnector::new(TlsConfig::new(mode)).is_ok(),
                "mode {mode:?}"
            );
        }
    }

    #[test]
    fn test_missing_ca_file() {
        setup_crypto_provider();
        let config = TlsConfig::new(SslMode::VerifyCa).ca_file("/nonexistent/ca.pem");
        assert!(matches!(
            TlsConnector::new(config),
            Err(TlsError::InvalidCertificate(_))
        ));
    }
}
