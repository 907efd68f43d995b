//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use jujulink_config::ConfigError;
use jujulink_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const UNSUPPORTED: i32 = 5;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to controller at {url}: {reason}")]
    #[diagnostic(
        code(jujulink::connection_failed),
        help(
            "Check that the controller is reachable and the API port (usually 17070) is open.\n\
             URL: {url}"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Connection to the controller was lost")]
    #[diagnostic(code(jujulink::disconnected))]
    Disconnected,

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(jujulink::auth_failed),
        help("Log in again with: jujulink login --profile {profile}")
    )]
    AuthFailed { profile: String, message: String },

    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(jujulink::no_credentials),
        help(
            "Run: jujulink login --save\n\
             Or set JUJULINK_USERNAME and JUJULINK_PASSWORD."
        )
    )]
    NoCredentials { profile: String },

    // ── Operations ───────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(code(jujulink::not_found), help("Run: jujulink {list_command}"))]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("Controller error: {message}")]
    #[diagnostic(code(jujulink::api_error))]
    ApiError { message: String },

    #[error("Operation not supported: {operation}")]
    #[diagnostic(
        code(jujulink::unsupported),
        help("The controller's API generation or facade versions do not offer this call.")
    )]
    Unsupported { operation: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(jujulink::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(jujulink::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: jujulink login --controller <HOST:PORT> --save"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No controller configured")]
    #[diagnostic(
        code(jujulink::no_config),
        help(
            "Pass --controller, or create a profile with: jujulink login --controller <HOST:PORT> --save\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(jujulink::config))]
    Config(ConfigError),

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(jujulink::timeout),
        help("Increase timeout with --timeout or check controller responsiveness.")
    )]
    Timeout { seconds: u64 },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Could not render output: {0}")]
    #[diagnostic(code(jujulink::render))]
    Render(String),

    #[error("Internal error: {0}")]
    #[diagnostic(code(jujulink::internal))]
    Internal(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::Disconnected => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::NoConfig { .. } => exit_code::USAGE,
            Self::Unsupported { .. } => exit_code::UNSUPPORTED,
            _ => exit_code::GENERAL,
        }
    }

    /// Attach the active profile name to an authentication failure.
    pub fn for_profile(self, profile: &str) -> Self {
        match self {
            Self::AuthFailed { message, .. } => Self::AuthFailed {
                profile: profile.into(),
                message,
            },
            other => other,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed { url, reason },

            CoreError::Disconnected => CliError::Disconnected,

            CoreError::AuthenticationFailed { message } => CliError::AuthFailed {
                profile: "default".into(),
                message,
            },

            CoreError::NotAuthenticated => CliError::AuthFailed {
                profile: "default".into(),
                message: "not logged in".into(),
            },

            CoreError::LoginInProgress => CliError::Internal("login already in progress".into()),

            CoreError::Unsupported { operation } => CliError::Unsupported { operation },

            CoreError::ValidationFailed { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::OperationFailed { message } | CoreError::Api { message, .. } => {
                CliError::ApiError { message }
            }

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            CoreError::NoChangeSetQueue | CoreError::NoFileTransfer => {
                CliError::Internal(err.to_string())
            }

            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_failures_exit_with_auth_code() {
        let err: CliError = CoreError::AuthenticationFailed {
            message: "invalid entity name or password".into(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_code::AUTH);

        let err = err.for_profile("lab");
        assert!(matches!(err, CliError::AuthFailed { ref profile, .. } if profile == "lab"));
    }

    #[test]
    fn unsupported_keeps_operation_text() {
        let err: CliError = CoreError::Unsupported {
            operation: "Offer".into(),
        }
        .into();
        assert_eq!(err.to_string(), "Operation not supported: Offer");
        assert_eq!(err.exit_code(), exit_code::UNSUPPORTED);
    }

    #[test]
    fn missing_config_credentials_map_to_no_credentials() {
        let err: CliError = ConfigError::NoCredentials {
            profile: "lab".into(),
        }
        .into();
        assert!(matches!(err, CliError::NoCredentials { .. }));
    }
}
