//! Shared configuration for jujulink.
//!
//! TOML profiles merged by figment (defaults, then the config file, then
//! `JUJULINK_` environment variables), password resolution (env, keyring,
//! plaintext), and translation to `jujulink_core::SessionConfig`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use jujulink_core::{Credentials, ProtocolGeneration, SessionConfig, TlsVerification};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Keyring service name.
const KEYRING_SERVICE: &str = "jujulink";

/// Environment variable consulted for a password when the profile names none.
pub const PASSWORD_ENV: &str = "JUJULINK_PASSWORD";

/// Environment variable consulted for a user name when the profile has none.
pub const USERNAME_ENV: &str = "JUJULINK_USERNAME";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("profile '{name}' not found")]
    UnknownProfile { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named controller profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// The named profile, or the default one when `name` is `None`.
    pub fn profile(&self, name: Option<&str>) -> Result<(&str, &Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get_key_value(name)
            .map(|(k, v)| (k.as_str(), v))
            .ok_or_else(|| ConfigError::UnknownProfile { name: name.into() })
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default)]
    pub insecure: bool,

    /// HTTP side-channel timeout, seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Keepalive interval once logged in, seconds.
    #[serde(default = "default_ping_interval")]
    pub ping_interval: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            insecure: false,
            timeout: default_timeout(),
            ping_interval: default_ping_interval(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_ping_interval() -> u64 {
    10
}

/// A named controller profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Controller address: a full `wss://` API URL, or `host:port`.
    pub controller: String,

    /// Model to connect to. Without one the controller-level API is used.
    pub model_uuid: Option<String>,

    /// API generation spoken by the controller.
    #[serde(default)]
    pub protocol: ProtocolGeneration,

    /// User name (plain, not tagged).
    pub username: Option<String>,

    /// Password (plaintext; prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable name containing the password.
    pub password_env: Option<String>,

    /// Path to the controller CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override insecure TLS setting.
    pub insecure: Option<bool>,

    /// Override timeout.
    pub timeout: Option<u64>,

    /// Override keepalive interval.
    pub ping_interval: Option<u64>,
}

impl Profile {
    /// The WebSocket API URL for this profile.
    ///
    /// A bare `host:port` becomes `wss://host:port`. When a model UUID is
    /// configured and the URL has no path, the model endpoint is appended
    /// (`/model/<uuid>/api`, or `/environment/<uuid>/api` on legacy
    /// controllers).
    pub fn api_url(&self) -> Result<Url, ConfigError> {
        let raw = if self.controller.contains("://") {
            self.controller.clone()
        } else {
            format!("wss://{}", self.controller)
        };
        let mut url = Url::parse(&raw).map_err(|e| ConfigError::Validation {
            field: "controller".into(),
            reason: format!("invalid URL '{}': {e}", self.controller),
        })?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(ConfigError::Validation {
                field: "controller".into(),
                reason: format!("expected a ws:// or wss:// URL, got '{}'", url.scheme()),
            });
        }
        if let Some(uuid) = &self.model_uuid
            && matches!(url.path(), "" | "/")
        {
            let segment = match self.protocol {
                ProtocolGeneration::Modern => "model",
                ProtocolGeneration::Legacy => "environment",
            };
            url.set_path(&format!("/{segment}/{uuid}/api"));
        }
        Ok(url)
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("io", "jujulink", "jujulink").map_or_else(
        || PathBuf::from(".jujulink").join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// Provider stack: defaults, then `path`, then `JUJULINK_` env vars
/// (`JUJULINK_DEFAULTS__OUTPUT=json`).
pub fn figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("JUJULINK_").split("__"))
}

/// Load the full Config from `path` plus the environment.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    Ok(figment(path).extract()?)
}

/// Load the full Config from the canonical path plus the environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load config, returning a default if it cannot be read.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_else(|e| {
        tracing::debug!(error = %e, "using default configuration");
        Config::default()
    })
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

// ── Credential resolution ───────────────────────────────────────────

fn keyring_entry(profile_name: &str) -> Result<keyring::Entry, keyring::Error> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/password"))
}

fn keyring_password(profile_name: &str) -> Option<String> {
    keyring_entry(profile_name)
        .and_then(|entry| entry.get_password())
        .ok()
}

/// Store a profile password in the system keyring.
pub fn store_password(profile_name: &str, password: &SecretString) -> Result<(), ConfigError> {
    keyring_entry(profile_name)?.set_password(password.expose_secret())?;
    Ok(())
}

/// Password lookup chain with the keyring step injected.
fn resolve_password_with(
    profile: &Profile,
    profile_name: &str,
    env: impl Fn(&str) -> Option<String>,
    keyring: impl Fn(&str) -> Option<String>,
) -> Result<SecretString, ConfigError> {
    // 1. Env var named by the profile, then the global one
    let env_name = profile.password_env.as_deref().unwrap_or(PASSWORD_ENV);
    if let Some(pw) = env(env_name) {
        return Ok(SecretString::from(pw));
    }

    // 2. System keyring
    if let Some(pw) = keyring(profile_name) {
        return Ok(SecretString::from(pw));
    }

    // 3. Plaintext in config
    if let Some(ref pw) = profile.password {
        return Ok(SecretString::from(pw.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Resolve the password: env var, then keyring, then plaintext.
pub fn resolve_password(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    resolve_password_with(profile, profile_name, process_env, keyring_password)
}

fn resolve_credentials_with(
    profile: &Profile,
    profile_name: &str,
    env: impl Fn(&str) -> Option<String>,
    keyring: impl Fn(&str) -> Option<String>,
) -> Result<Credentials, ConfigError> {
    let user = profile
        .username
        .clone()
        .or_else(|| env(USERNAME_ENV))
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
        })?;
    let password = resolve_password_with(profile, profile_name, env, keyring)?;
    Ok(Credentials::Password { user, password })
}

/// Resolve user/password credentials without CLI flags.
pub fn resolve_credentials(profile: &Profile, profile_name: &str) -> Result<Credentials, ConfigError> {
    resolve_credentials_with(profile, profile_name, process_env, keyring_password)
}

fn build_session_config(
    profile: &Profile,
    defaults: &Defaults,
    credentials: Option<Credentials>,
) -> Result<SessionConfig, ConfigError> {
    let url = profile.api_url()?;

    let tls = if profile.insecure.unwrap_or(defaults.insecure) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    };

    let mut config = SessionConfig::new(url);
    config.credentials = credentials;
    config.protocol = profile.protocol;
    config.tls = tls;
    config.http_timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    config.ping_interval =
        Duration::from_secs(profile.ping_interval.unwrap_or(defaults.ping_interval).max(1));
    Ok(config)
}

/// Build a `SessionConfig` from a profile, with no CLI overrides.
///
/// Missing credentials are not an error here: macaroon logins need none.
pub fn profile_to_session_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<SessionConfig, ConfigError> {
    let credentials = match resolve_credentials(profile, profile_name) {
        Ok(credentials) => Some(credentials),
        Err(ConfigError::NoCredentials { .. }) => None,
        Err(e) => return Err(e),
    };
    build_session_config(profile, defaults, credentials)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn profile() -> Profile {
        Profile {
            controller: "10.0.0.2:17070".into(),
            model_uuid: Some("5bea955d".into()),
            username: Some("admin".into()),
            ..Profile::default()
        }
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn bare_host_gets_model_path() {
        let url = profile().api_url().unwrap();
        assert_eq!(url.as_str(), "wss://10.0.0.2:17070/model/5bea955d/api");
    }

    #[test]
    fn legacy_profile_uses_environment_path() {
        let p = Profile {
            protocol: ProtocolGeneration::Legacy,
            ..profile()
        };
        assert_eq!(
            p.api_url().unwrap().path(),
            "/environment/5bea955d/api"
        );
    }

    #[test]
    fn explicit_path_is_kept() {
        let p = Profile {
            controller: "wss://ctrl.example:17070/api".into(),
            ..profile()
        };
        assert_eq!(p.api_url().unwrap().path(), "/api");
    }

    #[test]
    fn http_controller_is_rejected() {
        let p = Profile {
            controller: "https://ctrl.example".into(),
            ..profile()
        };
        assert!(matches!(p.api_url(), Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn env_beats_keyring_beats_plaintext() {
        let p = Profile {
            password: Some("plain".into()),
            password_env: Some("MY_PW".into()),
            ..profile()
        };
        let from_env = resolve_password_with(
            &p,
            "default",
            |name| (name == "MY_PW").then(|| "env".to_owned()),
            |_| Some("ring".into()),
        )
        .unwrap();
        assert_eq!(from_env.expose_secret(), "env");

        let from_ring = resolve_password_with(&p, "default", no_env, |_| Some("ring".into())).unwrap();
        assert_eq!(from_ring.expose_secret(), "ring");

        let plain = resolve_password_with(&p, "default", no_env, |_| None).unwrap();
        assert_eq!(plain.expose_secret(), "plain");
    }

    #[test]
    fn global_password_env_is_the_fallback_name() {
        let pw = resolve_password_with(
            &profile(),
            "default",
            |name| (name == PASSWORD_ENV).then(|| "global".to_owned()),
            |_| None,
        )
        .unwrap();
        assert_eq!(pw.expose_secret(), "global");
    }

    #[test]
    fn missing_user_is_no_credentials() {
        let p = Profile {
            username: None,
            password: Some("pw".into()),
            ..profile()
        };
        let err = resolve_credentials_with(&p, "lab", no_env, |_| None).unwrap_err();
        assert!(matches!(err, ConfigError::NoCredentials { ref profile } if profile == "lab"));
    }

    #[test]
    fn session_config_applies_profile_overrides() {
        let p = Profile {
            insecure: Some(true),
            timeout: Some(5),
            ping_interval: Some(0),
            protocol: ProtocolGeneration::Legacy,
            ..profile()
        };
        let credentials = resolve_credentials_with(&p, "default", |_| Some("pw".into()), |_| None).unwrap();
        let cfg = build_session_config(&p, &Defaults::default(), Some(credentials)).unwrap();

        assert_eq!(cfg.tls, TlsVerification::DangerAcceptInvalid);
        assert_eq!(cfg.http_timeout, Duration::from_secs(5));
        assert_eq!(cfg.ping_interval, Duration::from_secs(1));
        assert_eq!(cfg.protocol, ProtocolGeneration::Legacy);
        assert_eq!(cfg.credentials.unwrap().user(), Some("admin"));
    }

    #[test]
    fn ca_cert_selects_custom_ca() {
        let p = Profile {
            ca_cert: Some(PathBuf::from("/etc/juju/ca.pem")),
            ..profile()
        };
        let cfg = build_session_config(&p, &Defaults::default(), None).unwrap();
        assert_eq!(cfg.tls, TlsVerification::CustomCa("/etc/juju/ca.pem".into()));
    }
}
