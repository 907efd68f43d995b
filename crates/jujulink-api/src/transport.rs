// Transport abstractions shared by the RPC channel and the HTTP side channel.
//
// The multiplexer only needs to know whether the socket is open and how
// to hand it a text frame; everything else (framing, TLS, reconnection)
// lives behind the `Transport` trait. HTTP clients for charm file
// transfer are built from `TransportConfig`; the WebSocket gets a rustls
// config from the same `TlsMode`.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, ServerName, UnixTime};

use crate::error::Error;

// ── ReadyState ──────────────────────────────────────────────────────

/// Lifecycle of the underlying duplex connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ReadyState {
    Connecting,
    Open,
    Closing,
    Closed,
}

impl ReadyState {
    pub fn is_open(self) -> bool {
        self == Self::Open
    }
}

// ── Transport ───────────────────────────────────────────────────────

/// A duplex text-frame connection to the controller.
///
/// Implementations must not block in [`send`](Self::send): frames are
/// queued for a writer task. Incoming frames are delivered out of band
/// (see [`crate::websocket::WebSocketTransport::connect`]).
pub trait Transport: Send + Sync {
    /// Current connection state.
    fn ready_state(&self) -> ReadyState;

    /// Queue a serialized frame for delivery.
    fn send(&self, frame: String) -> Result<(), Error>;

    /// Start an orderly close of the connection.
    fn close(&self);
}

// ── TLS ─────────────────────────────────────────────────────────────

/// TLS verification mode, shared by the RPC socket and the HTTP side channel.
#[derive(Debug, Clone, Default)]
pub enum TlsMode {
    /// Use the system certificate store.
    #[default]
    System,
    /// Use a custom CA certificate from the given PEM file.
    CustomCa(PathBuf),
    /// Accept any certificate (controllers bootstrap with self-signed certs).
    DangerAcceptInvalid,
}

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::System,
            timeout: Duration::from_secs(30),
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("jujulink/", env!("CARGO_PKG_VERSION")));

        match &self.tls {
            TlsMode::System => {}
            TlsMode::CustomCa(path) => {
                let cert_pem = std::fs::read(path)
                    .map_err(|e| Error::Tls(format!("failed to read CA cert: {e}")))?;
                let cert = reqwest::Certificate::from_pem(&cert_pem)
                    .map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
                builder = builder.add_root_certificate(cert);
            }
            TlsMode::DangerAcceptInvalid => {
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        builder
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }
}

impl TlsMode {
    /// rustls config for the WebSocket handshake. `None` keeps the
    /// connector's built-in webpki roots.
    pub fn rustls_config(&self) -> Result<Option<Arc<ClientConfig>>, Error> {
        let config = match self {
            Self::System => return Ok(None),
            Self::CustomCa(path) => {
                let pem = std::fs::read(path)
                    .map_err(|e| Error::Tls(format!("failed to read CA cert: {e}")))?;
                let mut roots = RootCertStore::empty();
                for cert in CertificateDer::pem_slice_iter(&pem) {
                    let cert = cert.map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
                    roots
                        .add(cert)
                        .map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
                }
                if roots.is_empty() {
                    return Err(Error::Tls(format!(
                        "no certificates in {}",
                        path.display()
                    )));
                }
                ClientConfig::builder()
                    .with_root_certificates(roots)
                    .with_no_client_auth()
            }
            Self::DangerAcceptInvalid => {
                let builder = ClientConfig::builder();
                let verifier = AcceptAnyCert(Arc::clone(builder.crypto_provider()));
                builder
                    .dangerous()
                    .with_custom_certificate_verifier(Arc::new(verifier))
                    .with_no_client_auth()
            }
        };
        Ok(Some(Arc::new(config)))
    }
}

/// Skips chain and hostname checks; handshake signatures are still verified.
#[derive(Debug)]
struct AcceptAnyCert(Arc<CryptoProvider>);

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
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

impl fmt::Display for TlsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => f.write_str("system"),
            Self::CustomCa(path) => write!(f, "custom CA ({})", path.display()),
            Self::DangerAcceptInvalid => f.write_str("insecure"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_state_displays_lowercase() {
        assert_eq!(ReadyState::Closing.to_string(), "closing");
        assert!(ReadyState::Open.is_open());
        assert!(!ReadyState::Connecting.is_open());
    }

    #[test]
    fn missing_ca_file_is_tls_error() {
        let config = TransportConfig {
            tls: TlsMode::CustomCa(PathBuf::from("/nonexistent/ca.pem")),
            ..TransportConfig::default()
        };
        let err = config.build_client().unwrap_err();
        assert!(matches!(err, Error::Tls(_)));
    }

    #[test]
    fn system_tls_keeps_default_websocket_roots() {
        assert!(TlsMode::System.rustls_config().unwrap().is_none());
    }

    #[test]
    fn insecure_tls_builds_a_websocket_config() {
        let config = TlsMode::DangerAcceptInvalid.rustls_config().unwrap();
        assert!(config.is_some());
    }

    #[test]
    fn ca_file_without_certificates_is_rejected() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "not a certificate\n").unwrap();

        let err = TlsMode::CustomCa(file.path().to_path_buf())
            .rustls_config()
            .unwrap_err();
        assert!(matches!(err, Error::Tls(ref msg) if msg.starts_with("no certificates")));
    }
}
