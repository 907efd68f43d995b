use thiserror::Error;

use crate::transport::ReadyState;

/// Top-level error type for the `jujulink-api` crate.
///
/// Covers the WebSocket RPC channel, payload encoding for both protocol
/// generations, and the HTTP side channel used for charm files.
/// `jujulink-core` maps these into session-level errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// WebSocket closed by the controller.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    /// A frame could not be written because the transport is not open.
    #[error("Transport is not open (state: {state})")]
    NotOpen { state: ReadyState },

    /// The connection went away before a response arrived.
    #[error("Connection closed before a response arrived")]
    Disconnected,

    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Non-success status from the HTTP side channel.
    #[error("HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    // ── Protocol ────────────────────────────────────────────────────
    /// The selected protocol generation (or the controller's facade table)
    /// cannot express this operation.
    #[error("api client: operation not supported: {operation}")]
    UnsupportedOperation { operation: String },

    /// A frame or payload did not have the expected shape.
    #[error("Malformed payload: {message}")]
    MalformedPayload { message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn unsupported(operation: impl Into<String>) -> Self {
        Self::UnsupportedOperation {
            operation: operation.into(),
        }
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedPayload {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::WebSocketConnect(_) | Self::Disconnected => true,
            _ => false,
        }
    }

    /// Returns `true` if the operation can never succeed on this connection.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::UnsupportedOperation { .. })
    }

    /// Returns `true` for a 404 from the HTTP side channel.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::HttpStatus { status: 404, .. } => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_message_matches_wire_convention() {
        let err = Error::unsupported(r#"{"type":"ModelManager","request":"ListModels"}"#);
        assert_eq!(
            err.to_string(),
            r#"api client: operation not supported: {"type":"ModelManager","request":"ListModels"}"#
        );
        assert!(err.is_unsupported());
        assert!(!err.is_transient());
    }

    #[test]
    fn http_status_not_found() {
        let err = Error::HttpStatus {
            status: 404,
            message: "no such charm".into(),
        };
        assert!(err.is_not_found());
    }
}
