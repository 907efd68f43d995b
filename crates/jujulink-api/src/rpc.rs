//! Request/response multiplexing over a single duplex connection.
//!
//! Every outgoing [`Operation`] gets a fresh request id; the handler
//! registered for that id runs exactly once, when the matching response
//! frame is dispatched. Frames whose id is unknown are ignored.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::{Map, Value};

use crate::protocol::Protocol;
use crate::transport::Transport;

/// Callback invoked with the response to one request.
pub type ResponseHandler = Box<dyn FnOnce(RpcResponse) + Send + 'static>;

// ── Operation ───────────────────────────────────────────────────────

/// A single facade call, before request-id assignment and encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub facade: String,
    pub request: String,
    /// Desired facade version; resolved against the facade table before send.
    pub version: Option<u32>,
    pub params: Option<Value>,
    /// Watcher handle, for watcher-scoped calls.
    pub id: Option<String>,
}

impl Operation {
    pub fn new(facade: impl Into<String>, request: impl Into<String>) -> Self {
        Self {
            facade: facade.into(),
            request: request.into(),
            version: None,
            params: None,
            id: None,
        }
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = Some(version);
        self
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Protocol-neutral description, used in error messages.
    pub fn describe(&self) -> Value {
        let mut desc = Map::new();
        desc.insert("type".into(), Value::String(self.facade.clone()));
        desc.insert("request".into(), Value::String(self.request.clone()));
        if let Some(v) = self.version {
            desc.insert("version".into(), Value::from(v));
        }
        if let Some(id) = &self.id {
            desc.insert("id".into(), Value::String(id.clone()));
        }
        desc.insert("params".into(), self.wire_params());
        Value::Object(desc)
    }

    /// Params to put on the wire; absent params become `{}`.
    pub fn wire_params(&self) -> Value {
        self.params
            .clone()
            .unwrap_or_else(|| Value::Object(Map::new()))
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.facade, self.request)?;
        if let Some(v) = self.version {
            write!(f, "(v{v})")?;
        }
        Ok(())
    }
}

// ── RpcResponse ─────────────────────────────────────────────────────

/// A decoded response frame (or a locally synthesized failure).
#[derive(Debug, Clone, PartialEq)]
pub struct RpcResponse {
    pub request_id: u64,
    /// Response body; `Value::Null` when the frame had none.
    pub response: Value,
    pub error: Option<String>,
    pub error_code: Option<String>,
}

impl RpcResponse {
    /// A failure that never reached the wire.
    pub fn local_error(message: impl Into<String>) -> Self {
        Self {
            request_id: 0,
            response: Value::Null,
            error: Some(message.into()),
            error_code: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

// ── Multiplexer ─────────────────────────────────────────────────────

/// Assigns request ids, writes frames, and routes responses to handlers.
///
/// Handlers run outside the pending-table lock, so a handler may issue
/// further requests through the same multiplexer.
pub struct Multiplexer {
    transport: Arc<dyn Transport>,
    protocol: Arc<dyn Protocol>,
    counter: AtomicU64,
    pending: Mutex<HashMap<u64, ResponseHandler>>,
}

impl Multiplexer {
    pub fn new(transport: Arc<dyn Transport>, protocol: Arc<dyn Protocol>) -> Self {
        Self {
            transport,
            protocol,
            counter: AtomicU64::new(0),
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn protocol(&self) -> &Arc<dyn Protocol> {
        &self.protocol
    }

    /// Encode and write `op`, registering `handler` for its response.
    ///
    /// Returns the assigned request id, or `None` when the transport is not
    /// open (or the write failed). A dropped request never reaches the
    /// handler; it is simply released.
    pub fn send(&self, op: &Operation, handler: Option<ResponseHandler>) -> Option<u64> {
        let state = self.transport.ready_state();
        if !state.is_open() {
            tracing::warn!(operation = %op, %state, "cannot send request: connection is not open");
            return None;
        }

        let request_id = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let frame = match self.protocol.encode(op, request_id) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(operation = %op, error = %e, "cannot encode request");
                return None;
            }
        };

        if let Some(handler) = handler {
            self.pending_table().insert(request_id, handler);
        }

        tracing::debug!(request_id, operation = %op, "sending request");
        if let Err(e) = self.transport.send(frame) {
            tracing::error!(request_id, error = %e, "request write failed");
            self.pending_table().remove(&request_id);
            return None;
        }
        Some(request_id)
    }

    /// Route one incoming frame to its handler.
    ///
    /// Returns `true` if a handler ran.
    pub fn dispatch(&self, frame: &str) -> bool {
        let response = match self.protocol.decode(frame) {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "discarding undecodable frame");
                return false;
            }
        };

        let handler = self.pending_table().remove(&response.request_id);
        match handler {
            Some(handler) => {
                tracing::trace!(request_id = response.request_id, "dispatching response");
                handler(response);
                true
            }
            None => {
                tracing::debug!(request_id = response.request_id, "no handler for response");
                false
            }
        }
    }

    /// Number of requests still awaiting a response.
    pub fn pending_count(&self) -> usize {
        self.pending_table().len()
    }

    /// Release every outstanding handler without invoking it.
    pub fn abandon_pending(&self) -> usize {
        let drained: Vec<_> = self.pending_table().drain().collect();
        let count = drained.len();
        drop(drained);
        if count > 0 {
            tracing::debug!(count, "abandoned pending requests");
        }
        count
    }

    fn pending_table(&self) -> std::sync::MutexGuard<'_, HashMap<u64, ResponseHandler>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use serde_json::json;

    use super::*;
    use crate::error::Error;
    use crate::protocol::ModernProtocol;
    use crate::transport::ReadyState;

    #[derive(Default)]
    struct RecordingTransport {
        frames: Mutex<Vec<String>>,
        closed: std::sync::atomic::AtomicBool,
    }

    impl Transport for RecordingTransport {
        fn ready_state(&self) -> ReadyState {
            if self.closed.load(Ordering::SeqCst) {
                ReadyState::Closed
            } else {
                ReadyState::Open
            }
        }

        fn send(&self, frame: String) -> Result<(), Error> {
            self.frames.lock().unwrap().push(frame);
            Ok(())
        }

        fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    fn mux() -> (Arc<RecordingTransport>, Multiplexer) {
        let transport = Arc::new(RecordingTransport::default());
        let mux = Multiplexer::new(transport.clone(), Arc::new(ModernProtocol));
        (transport, mux)
    }

    fn counting_handler(count: &Arc<AtomicUsize>) -> ResponseHandler {
        let count = Arc::clone(count);
        Box::new(move |_| {
            count.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn ids_increase_and_empty_params_become_object() {
        let (transport, mux) = mux();
        let op = Operation::new("Pinger", "Ping").with_version(1);
        assert_eq!(mux.send(&op, None), Some(1));
        assert_eq!(mux.send(&op, None), Some(2));

        let frames = transport.frames.lock().unwrap();
        let first: Value = serde_json::from_str(&frames[0]).unwrap();
        assert_eq!(first["request-id"], 1);
        assert_eq!(first["params"], json!({}));
    }

    #[test]
    fn handler_runs_at_most_once() {
        let (_transport, mux) = mux();
        let count = Arc::new(AtomicUsize::new(0));
        let id = mux
            .send(&Operation::new("Pinger", "Ping"), Some(counting_handler(&count)))
            .unwrap();

        let frame = json!({"request-id": id, "response": {}}).to_string();
        assert!(mux.dispatch(&frame));
        assert!(!mux.dispatch(&frame));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(mux.pending_count(), 0);
    }

    #[test]
    fn unknown_ids_and_garbage_are_ignored() {
        let (_transport, mux) = mux();
        assert!(!mux.dispatch(r#"{"request-id": 99, "response": {}}"#));
        assert!(!mux.dispatch("not json"));
    }

    #[test]
    fn closed_transport_drops_request_without_id() {
        let (transport, mux) = mux();
        transport.close();
        let count = Arc::new(AtomicUsize::new(0));
        let sent = mux.send(&Operation::new("Pinger", "Ping"), Some(counting_handler(&count)));
        assert_eq!(sent, None);
        assert!(transport.frames.lock().unwrap().is_empty());
        assert_eq!(mux.pending_count(), 0);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn handler_may_send_reentrantly() {
        let (transport, mux) = mux();
        let mux = Arc::new(mux);
        let inner = Arc::clone(&mux);
        let id = mux
            .send(
                &Operation::new("Client", "WatchAll"),
                Some(Box::new(move |_| {
                    inner.send(&Operation::new("AllWatcher", "Next").with_id("1"), None);
                })),
            )
            .unwrap();

        mux.dispatch(&json!({"request-id": id, "response": {"watcher-id": "1"}}).to_string());
        assert_eq!(transport.frames.lock().unwrap().len(), 2);
    }

    #[test]
    fn operation_display() {
        let op = Operation::new("Application", "Deploy").with_version(5);
        assert_eq!(op.to_string(), "Application.Deploy(v5)");
    }
}
