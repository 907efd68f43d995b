// ── Core error types ──
//
// Session-level errors. Server-reported failures of individual operations
// are data (`err` fields on result structs), not `CoreError`s; these
// cover the cases where no result could be produced at all.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to controller at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    /// The request was dropped, or the connection went away before a
    /// response arrived.
    #[error("Controller disconnected")]
    Disconnected,

    // ── Authentication errors ────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("A login attempt is already in progress")]
    LoginInProgress,

    #[error("Not authenticated")]
    NotAuthenticated,

    // ── Operation errors ─────────────────────────────────────────────
    #[error("api client: operation not supported: {operation}")]
    Unsupported { operation: String },

    #[error("No change-set queue is attached to this session")]
    NoChangeSetQueue,

    #[error("No file transfer handler is attached to this session")]
    NoFileTransfer,

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Operation failed: {message}")]
    OperationFailed { message: String },

    // ── API errors (wrapped) ─────────────────────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (side channel only).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<jujulink_api::Error> for CoreError {
    fn from(err: jujulink_api::Error) -> Self {
        use jujulink_api::Error as ApiError;

        match err {
            ApiError::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket connection failed: {reason}"),
            },
            ApiError::WebSocketClosed { code, reason } => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket closed (code {code}): {reason}"),
            },
            ApiError::NotOpen { .. } | ApiError::Disconnected => CoreError::Disconnected,
            ApiError::Transport(ref e) => {
                if e.is_connect() || e.is_timeout() {
                    CoreError::ConnectionFailed {
                        url: e.url().map(ToString::to_string).unwrap_or_default(),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            ApiError::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            ApiError::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            ApiError::HttpStatus { status, message } => CoreError::Api {
                message,
                status: Some(status),
            },
            ApiError::UnsupportedOperation { operation } => CoreError::Unsupported { operation },
            ApiError::MalformedPayload { message } => CoreError::Internal(message),
            ApiError::Json(e) => CoreError::Internal(format!("JSON error: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_keeps_wire_message() {
        let err: CoreError = jujulink_api::Error::UnsupportedOperation {
            operation: "{\"type\":\"Foo\"}".into(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "api client: operation not supported: {\"type\":\"Foo\"}"
        );
    }

    #[test]
    fn not_open_maps_to_disconnected() {
        let err: CoreError = jujulink_api::Error::NotOpen {
            state: jujulink_api::ReadyState::Closed,
        }
        .into();
        assert!(matches!(err, CoreError::Disconnected));
    }
}
