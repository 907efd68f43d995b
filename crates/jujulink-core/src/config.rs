// ── Runtime session configuration ──
//
// These types describe how to reach and authenticate with a controller.
// They carry credential data and tuning, but never touch disk; the CLI
// builds a `SessionConfig` through `jujulink-config` and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use jujulink_api::ProtocolGeneration;
use jujulink_api::transport::{TlsMode, TransportConfig};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use url::Url;

pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Credentials held in memory for the lifetime of a session.
#[derive(Debug, Clone)]
pub enum Credentials {
    /// User name (bare or `user-` tagged) and password.
    Password { user: String, password: SecretString },
    /// Discharged macaroons. `user` is known only after a successful login.
    Macaroons {
        user: Option<String>,
        macaroons: Value,
    },
}

impl Credentials {
    pub fn password(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Password {
            user: user.into(),
            password: SecretString::from(password.into()),
        }
    }

    pub fn user(&self) -> Option<&str> {
        match self {
            Self::Password { user, .. } => Some(user),
            Self::Macaroons { user, .. } => user.as_deref(),
        }
    }

    /// A user and a non-empty password.
    pub fn is_complete_password(&self) -> bool {
        match self {
            Self::Password { user, password } => {
                !user.is_empty() && !password.expose_secret().is_empty()
            }
            Self::Macaroons { .. } => false,
        }
    }

    pub fn macaroons(&self) -> Option<&Value> {
        match self {
            Self::Macaroons { macaroons, .. } => Some(macaroons),
            Self::Password { .. } => None,
        }
    }
}

/// TLS verification strategy for the RPC socket and the HTTP side channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store.
    #[default]
    SystemDefaults,
    /// Custom CA certificate file (controllers bootstrap their own CA).
    CustomCa(PathBuf),
    /// Skip verification.
    DangerAcceptInvalid,
}

/// Configuration for one controller connection.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// WebSocket API endpoint, e.g. `wss://10.0.0.2:17070/model/<uuid>/api`.
    pub url: Url,
    pub credentials: Option<Credentials>,
    pub protocol: ProtocolGeneration,
    /// Keepalive interval once authenticated.
    pub ping_interval: Duration,
    /// Capacity of the session event broadcast channel.
    pub event_capacity: usize,
    pub tls: TlsVerification,
    /// Timeout for HTTP side-channel requests.
    pub http_timeout: Duration,
}

impl SessionConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            credentials: None,
            protocol: ProtocolGeneration::default(),
            ping_interval: DEFAULT_PING_INTERVAL,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            tls: TlsVerification::default(),
            http_timeout: Duration::from_secs(30),
        }
    }

    /// The `https` root of the controller, for the HTTP side channel.
    pub fn http_base_url(&self) -> Url {
        let mut base = self.url.clone();
        let scheme = if base.scheme() == "ws" { "http" } else { "https" };
        // Only fails for cannot-be-a-base URLs, which a parsed ws URL is not.
        let _ = base.set_scheme(scheme);
        base.set_path("/");
        base.set_query(None);
        base
    }

    pub fn transport_config(&self) -> TransportConfig {
        let tls = match &self.tls {
            TlsVerification::SystemDefaults => TlsMode::System,
            TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        };
        TransportConfig {
            tls,
            timeout: self.http_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_base_follows_socket_scheme() {
        let config = SessionConfig::new("wss://10.0.0.2:17070/model/abc/api".parse().unwrap());
        assert_eq!(config.http_base_url().as_str(), "https://10.0.0.2:17070/");

        let plain = SessionConfig::new("ws://localhost:17070/api".parse().unwrap());
        assert_eq!(plain.http_base_url().as_str(), "http://localhost:17070/");
    }

    #[test]
    fn incomplete_passwords_are_detected() {
        assert!(Credentials::password("admin", "secret").is_complete_password());
        assert!(!Credentials::password("admin", "").is_complete_password());
        assert!(!Credentials::password("", "secret").is_complete_password());
    }
}
