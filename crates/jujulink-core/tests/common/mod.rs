#![allow(clippy::unwrap_used, dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use jujulink_api::{Error, ReadyState, Transport};
use jujulink_core::{Credentials, ProtocolGeneration, Session, SessionConfig};
use serde_json::{Value, json};
use url::Url;

// ── Stub transport ──────────────────────────────────────────────────

/// In-memory transport that records every written frame.
pub struct StubTransport {
    frames: Mutex<Vec<String>>,
    open: AtomicBool,
}

impl StubTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            frames: Mutex::new(Vec::new()),
            open: AtomicBool::new(true),
        })
    }

    pub fn frames(&self) -> Vec<Value> {
        self.frames
            .lock()
            .unwrap()
            .iter()
            .map(|f| serde_json::from_str(f).unwrap())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.frames.lock().unwrap().len()
    }

    pub fn last(&self) -> Value {
        self.frames().pop().expect("no frame was sent")
    }

    /// `(facade, request)` of every frame, either casing.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.frames()
            .iter()
            .map(|f| {
                let facade = f.get("type").or_else(|| f.get("Type")).unwrap();
                let request = f.get("request").or_else(|| f.get("Request")).unwrap();
                (
                    facade.as_str().unwrap().to_owned(),
                    request.as_str().unwrap().to_owned(),
                )
            })
            .collect()
    }

    pub fn set_open(&self, open: bool) {
        self.open.store(open, Ordering::SeqCst);
    }
}

impl Transport for StubTransport {
    fn ready_state(&self) -> ReadyState {
        if self.open.load(Ordering::SeqCst) {
            ReadyState::Open
        } else {
            ReadyState::Closed
        }
    }

    fn send(&self, frame: String) -> Result<(), Error> {
        self.frames.lock().unwrap().push(frame);
        Ok(())
    }

    fn close(&self) {
        self.set_open(false);
    }
}

// ── Sessions ────────────────────────────────────────────────────────

pub const MODEL_TAG: &str = "model-5bea955d";

pub fn config(generation: ProtocolGeneration) -> SessionConfig {
    let mut config = SessionConfig::new(Url::parse("wss://10.0.0.2:17070/model/5bea955d/api").unwrap());
    config.protocol = generation;
    config.credentials = Some(Credentials::password("admin", "secret"));
    config
}

pub fn session(generation: ProtocolGeneration) -> (Session, Arc<StubTransport>) {
    let transport = StubTransport::new();
    let session = Session::builder(config(generation)).build(transport.clone());
    (session, transport)
}

/// Request id of a recorded frame, either casing.
pub fn request_id(frame: &Value) -> u64 {
    frame
        .get("request-id")
        .or_else(|| frame.get("RequestId"))
        .and_then(Value::as_u64)
        .unwrap()
}

/// Feed a modern success frame.
pub fn respond(session: &Session, id: u64, response: Value) -> bool {
    session.handle_frame(&json!({ "request-id": id, "response": response }).to_string())
}

/// Feed a modern error frame.
pub fn respond_error(session: &Session, id: u64, message: &str) -> bool {
    session.handle_frame(&json!({ "request-id": id, "error": message }).to_string())
}

/// Feed a legacy success frame.
pub fn respond_legacy(session: &Session, id: u64, response: Value) -> bool {
    session.handle_frame(&json!({ "RequestId": id, "Response": response }).to_string())
}

pub fn modern_login_response() -> Value {
    json!({
        "facades": [
            {"name": "AllWatcher", "versions": [1]},
            {"name": "Annotations", "versions": [2]},
            {"name": "Application", "versions": [1]},
            {"name": "Charms", "versions": [2]},
            {"name": "Client", "versions": [1]},
            {"name": "CrossModelRelations", "versions": [1]},
            {"name": "ModelConfig", "versions": [1]},
            {"name": "ModelManager", "versions": [2]},
            {"name": "Pinger", "versions": [1]},
        ],
        "model-tag": MODEL_TAG,
        "user-info": {"read-only": false, "identity": "user-admin"},
        "server-version": "2.1.0",
    })
}

pub fn model_info_response() -> Value {
    json!({
        "results": [{
            "result": {
                "name": "default",
                "uuid": "5bea955d",
                "controller-uuid": "c1",
                "default-series": "xenial",
                "provider-type": "lxd",
                "owner-tag": "user-admin",
                "life": "alive",
            }
        }]
    })
}

/// Log in on the modern protocol and answer the bootstrap model-info
/// request. Leaves the `WatchAll` request (id 3) outstanding.
pub async fn logged_in() -> (Session, Arc<StubTransport>) {
    let (session, transport) = session(ProtocolGeneration::Modern);
    let reply = session.login();
    assert!(respond(&session, 1, modern_login_response()));
    reply.await.unwrap();
    assert!(respond(&session, 2, model_info_response()));
    (session, transport)
}
