// ── Session abstraction ──
//
// One authenticated conversation with a controller: owns the multiplexer
// and transport, drives login (password, macaroon, legacy token), the
// post-login bootstrap (model info, mega-watcher, keepalive) and teardown.
// Domain operations live in `ops`, the watcher loop in `watcher`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use jujulink_api::facade::ADMIN_FACADE;
use jujulink_api::http::{FileTransfer, HttpFileTransfer};
use jujulink_api::params::{LoginRequest, user_tag};
use jujulink_api::protocol::LoginResponse;
use jujulink_api::websocket::WebSocketTransport;
use jujulink_api::{FacadeTable, Multiplexer, Operation, Protocol, ResponseHandler, RpcResponse};
use jujulink_api::{ProtocolGeneration, Transport};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{Credentials, SessionConfig};
use crate::error::CoreError;
use crate::event::{EventStream, SessionEvent};
use crate::queue::ChangeSetQueue;
use crate::reply::{Completer, Reply};

// ── AuthState ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum AuthState {
    #[default]
    Unauthenticated,
    Authenticating,
    Authenticated,
}

/// What the post-login bootstrap learned about the connected model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelInfo {
    pub name: String,
    pub uuid: Option<String>,
    pub series: Option<String>,
    pub provider: Option<String>,
    /// Set only for the `maas` provider, once `ModelGet` answers.
    pub maas_server: Option<String>,
}

/// Out-of-band credential discharge (macaroon bakery).
///
/// `done` receives the discharged proof, or a message explaining why the
/// discharge failed. It may be invoked from any thread.
pub trait Discharger: Send + Sync {
    fn discharge(&self, challenge: Value, done: DischargeCallback);
}

pub type DischargeCallback = Box<dyn FnOnce(Result<Value, String>) + Send + 'static>;

#[derive(Debug, Default)]
pub(crate) struct WatcherState {
    pub(crate) handle: Option<String>,
    /// `WatchAll` sent, handle not yet known.
    pub(crate) starting: bool,
    pub(crate) stopping: bool,
    /// Stops requested while starting; served once the handle arrives.
    pub(crate) deferred_stops: Vec<Completer<()>>,
}

#[derive(Debug, Default)]
pub(crate) struct SessionState {
    pub(crate) auth: AuthState,
    pub(crate) credentials: Option<Credentials>,
    /// `None` until the first successful login.
    pub(crate) facades: Option<FacadeTable>,
    pub(crate) read_only: bool,
    pub(crate) model_tag: Option<String>,
    pub(crate) failed_authentication: bool,
    pub(crate) failed_token_authentication: bool,
    pub(crate) model: Option<ModelInfo>,
    pub(crate) watcher: WatcherState,
}

/// Which login flow produced a login response; decides which failure
/// flag is raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoginKind {
    Password,
    Macaroon,
    Token,
}

// ── Session ──────────────────────────────────────────────────────

/// Handle to a controller session.
///
/// Cheaply cloneable via `Arc<SessionInner>`. Response handlers run on
/// whichever task dispatches incoming frames; no internal lock is held
/// while they run, so they may issue further requests.
#[derive(Clone)]
pub struct Session {
    pub(crate) inner: Arc<SessionInner>,
}

pub(crate) struct SessionInner {
    pub(crate) config: SessionConfig,
    pub(crate) protocol: Arc<dyn Protocol>,
    pub(crate) mux: Multiplexer,
    state: Mutex<SessionState>,
    events: broadcast::Sender<SessionEvent>,
    pinger: Mutex<Option<CancellationToken>>,
    cancel: CancellationToken,
    pub(crate) queue: Option<Arc<dyn ChangeSetQueue>>,
    pub(crate) files: Option<Arc<dyn FileTransfer>>,
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Builds a [`Session`] with optional collaborators.
pub struct SessionBuilder {
    config: SessionConfig,
    queue: Option<Arc<dyn ChangeSetQueue>>,
    files: Option<Arc<dyn FileTransfer>>,
}

impl SessionBuilder {
    pub fn change_set_queue(mut self, queue: Arc<dyn ChangeSetQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn file_transfer(mut self, files: Arc<dyn FileTransfer>) -> Self {
        self.files = Some(files);
        self
    }

    /// Build over an existing transport. Incoming frames must be fed to
    /// [`Session::handle_frame`].
    pub fn build(self, transport: Arc<dyn Transport>) -> Session {
        let protocol = self.config.protocol.protocol();
        let (events, _) = broadcast::channel(self.config.event_capacity.max(1));
        let state = SessionState {
            credentials: self.config.credentials.clone(),
            ..SessionState::default()
        };
        Session {
            inner: Arc::new(SessionInner {
                mux: Multiplexer::new(transport, Arc::clone(&protocol)),
                protocol,
                state: Mutex::new(state),
                events,
                pinger: Mutex::new(None),
                cancel: CancellationToken::new(),
                queue: self.queue,
                files: self.files,
                config: self.config,
            }),
        }
    }

    /// Open the WebSocket and start pumping frames into the session.
    ///
    /// An HTTP file transfer client is attached unless one was supplied.
    pub async fn connect(mut self) -> Result<Session, CoreError> {
        if self.files.is_none() {
            let files = HttpFileTransfer::new(
                self.config.http_base_url(),
                &self.config.transport_config(),
            )?;
            self.files = Some(Arc::new(files));
        }

        let cancel = CancellationToken::new();
        let url = self.config.url.clone();
        let tls = self.config.transport_config().tls;
        let (transport, mut incoming) = WebSocketTransport::connect(&url, &tls, cancel.clone())
            .await
            .map_err(|e| CoreError::ConnectionFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        info!(%url, generation = %self.config.protocol, "connected to controller");

        let session = self.build(Arc::new(transport));
        // Tear the socket down with the session.
        let session_cancel = session.inner.cancel.clone();
        tokio::spawn(async move {
            session_cancel.cancelled().await;
            cancel.cancel();
        });

        let weak = Arc::downgrade(&session.inner);
        tokio::spawn(async move {
            while let Some(frame) = incoming.recv().await {
                let Some(inner) = weak.upgrade() else { break };
                inner.mux.dispatch(&frame);
            }
            if let Some(inner) = weak.upgrade() {
                debug!("incoming frame channel closed");
                inner.mux.abandon_pending();
            }
        });

        Ok(session)
    }
}

impl Session {
    pub fn builder(config: SessionConfig) -> SessionBuilder {
        SessionBuilder {
            config,
            queue: None,
            files: None,
        }
    }

    /// Connect with default collaborators.
    pub async fn connect(config: SessionConfig) -> Result<Self, CoreError> {
        Self::builder(config).connect().await
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn generation(&self) -> ProtocolGeneration {
        self.inner.protocol.generation()
    }

    pub(crate) fn protocol(&self) -> &dyn Protocol {
        self.inner.protocol.as_ref()
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, SessionState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn downgrade(&self) -> Weak<SessionInner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn upgrade(weak: &Weak<SessionInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    // ── Events ───────────────────────────────────────────────────

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub fn events(&self) -> EventStream {
        EventStream::new(self.subscribe())
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }

    // ── Observable state ─────────────────────────────────────────

    pub fn auth_state(&self) -> AuthState {
        self.state().auth
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth_state() == AuthState::Authenticated
    }

    pub fn read_only(&self) -> bool {
        self.state().read_only
    }

    pub fn model_tag(&self) -> Option<String> {
        self.state().model_tag.clone()
    }

    pub fn model_info(&self) -> Option<ModelInfo> {
        self.state().model.clone()
    }

    pub fn facades(&self) -> Option<FacadeTable> {
        self.state().facades.clone()
    }

    pub fn failed_authentication(&self) -> bool {
        self.state().failed_authentication
    }

    pub fn failed_token_authentication(&self) -> bool {
        self.state().failed_token_authentication
    }

    pub fn watcher_id(&self) -> Option<String> {
        self.state().watcher.handle.clone()
    }

    pub fn credentials(&self) -> Option<Credentials> {
        self.state().credentials.clone()
    }

    /// Replace the stored credentials. Clearing them ends authentication.
    pub fn set_credentials(&self, credentials: Option<Credentials>) {
        let mut st = self.state();
        if credentials.is_none() && st.auth == AuthState::Authenticated {
            st.auth = AuthState::Unauthenticated;
        }
        st.credentials = credentials;
    }

    /// Clear credentials and return to `Unauthenticated`. The connection
    /// stays open.
    pub fn logout(&self) {
        self.disarm_pinger();
        let mut st = self.state();
        st.credentials = None;
        st.auth = AuthState::Unauthenticated;
        debug!("logged out");
    }

    // ── Sending ──────────────────────────────────────────────────

    /// Route one incoming frame to its pending handler.
    pub fn handle_frame(&self, frame: &str) -> bool {
        self.inner.mux.dispatch(frame)
    }

    pub(crate) fn is_open(&self) -> bool {
        self.inner.mux.transport().ready_state().is_open()
    }

    /// Number of requests still waiting for a response.
    pub fn pending_requests(&self) -> usize {
        self.inner.mux.pending_count()
    }

    /// Pin the facade version, or explain why the call cannot be made.
    fn resolve(&self, op: Operation) -> Result<Operation, String> {
        if op.facade == ADMIN_FACADE {
            return Ok(op);
        }
        let version = {
            let st = self.state();
            self.inner
                .protocol
                .resolve_facade(st.facades.as_ref(), &op.facade, op.version)
        };
        match version {
            Some(v) => Ok(op.with_version(v)),
            None => Err(jujulink_api::Error::UnsupportedOperation {
                operation: op.describe().to_string(),
            }
            .to_string()),
        }
    }

    /// Send `op`; the handler receives either the response or a local
    /// not-supported error. Returns `None` if nothing was written.
    pub(crate) fn send(&self, op: Operation, handler: ResponseHandler) -> Option<u64> {
        match self.resolve(op) {
            Ok(op) => self.inner.mux.send(&op, Some(handler)),
            Err(message) => {
                warn!(%message, "refusing request");
                handler(RpcResponse::local_error(message));
                None
            }
        }
    }

    /// Send a fire-and-forget request.
    pub(crate) fn notify(&self, op: Operation) {
        match self.resolve(op) {
            Ok(op) => {
                self.inner.mux.send(&op, None);
            }
            Err(message) => debug!(%message, "dropping notification"),
        }
    }

    /// Send the output of a payload builder; builder errors go to the
    /// handler as local errors.
    pub(crate) fn send_built(
        &self,
        built: Result<Operation, jujulink_api::Error>,
        handler: ResponseHandler,
    ) -> Option<u64> {
        match built {
            Ok(op) => self.send(op, handler),
            Err(e) => {
                handler(RpcResponse::local_error(e.to_string()));
                None
            }
        }
    }

    /// Send and map the response into a [`Reply`].
    pub(crate) fn call<T, F>(&self, built: Result<Operation, jujulink_api::Error>, parse: F) -> Reply<T>
    where
        T: Send + 'static,
        F: FnOnce(RpcResponse) -> T + Send + 'static,
    {
        let (completer, reply) = Reply::channel();
        self.send_built(built, Box::new(move |resp| completer.complete(parse(resp))));
        reply
    }

    // ── Login ────────────────────────────────────────────────────

    /// Log in with the stored user/password credentials.
    ///
    /// Emits [`SessionEvent::LoginCompleted`] except while another attempt
    /// is in flight, in which case nothing is sent and the reply fails with
    /// [`CoreError::LoginInProgress`].
    pub fn login(&self) -> Reply<()> {
        let request = {
            let mut st = self.state();
            match st.auth {
                AuthState::Authenticated => None,
                AuthState::Authenticating => {
                    debug!("login already in progress");
                    return Reply::failed(CoreError::LoginInProgress);
                }
                AuthState::Unauthenticated => {
                    let request = match &st.credentials {
                        Some(Credentials::Password { user, password })
                            if !user.is_empty() && !password.expose_secret().is_empty() =>
                        {
                            Some(LoginRequest::Password {
                                user_tag: user_tag(user),
                                password: password.expose_secret().to_owned(),
                            })
                        }
                        _ => None,
                    };
                    if request.is_some() {
                        st.auth = AuthState::Authenticating;
                    }
                    Some(request)
                }
            }
        };

        match request {
            None => {
                self.emit(SessionEvent::LoginCompleted {
                    result: true,
                    error: None,
                });
                Reply::ready(())
            }
            Some(None) => {
                warn!("attempted login without providing credentials");
                self.emit(SessionEvent::LoginCompleted {
                    result: false,
                    error: None,
                });
                Reply::failed(CoreError::AuthenticationFailed {
                    message: "missing credentials".into(),
                })
            }
            Some(Some(request)) => self.send_login(&request, LoginKind::Password),
        }
    }

    /// Log in with a one-time token (legacy controllers only).
    ///
    /// On success the controller issues a user and password which replace
    /// the stored credentials.
    pub fn token_login(&self, token: &str) -> Reply<()> {
        {
            let mut st = self.state();
            if st.auth == AuthState::Authenticating {
                return Reply::failed(CoreError::LoginInProgress);
            }
            st.auth = AuthState::Authenticating;
        }
        self.send_login(&LoginRequest::Token(token.to_owned()), LoginKind::Token)
    }

    fn send_login(&self, request: &LoginRequest, kind: LoginKind) -> Reply<()> {
        let op = match self.inner.protocol.login(request) {
            Ok(op) => op,
            Err(e) => {
                let reply = Reply::failed(CoreError::from(e));
                self.abort_login();
                return reply;
            }
        };

        let (completer, reply) = Reply::channel();
        let weak = self.downgrade();
        let handler: ResponseHandler = Box::new(move |resp| {
            // A dropped session drops the completer: the reply sees Disconnected.
            let Some(session) = Session::upgrade(&weak) else { return };
            let outcome = match resp.error {
                Some(err) => Err(err),
                None => Ok(session.inner.protocol.parse_login(&resp.response)),
            };
            session.conclude_login(outcome, kind, completer);
        });
        if self.send(op, handler).is_none() {
            self.abort_login();
        }
        reply
    }

    /// Log in with macaroons, discharging a third-party caveat if the
    /// controller asks for one.
    pub fn login_with_delegated_credentials(&self, discharger: Arc<dyn Discharger>) -> Reply<()> {
        let macaroons = {
            let mut st = self.state();
            if st.auth == AuthState::Authenticating {
                debug!("login already in progress");
                return Reply::failed(CoreError::LoginInProgress);
            }
            st.auth = AuthState::Authenticating;
            st.credentials.as_ref().and_then(Credentials::macaroons).cloned()
        };
        let (completer, reply) = Reply::channel();
        self.send_macaroon_login(macaroons, discharger, true, completer);
        reply
    }

    fn send_macaroon_login(
        &self,
        macaroons: Option<Value>,
        discharger: Arc<dyn Discharger>,
        may_discharge: bool,
        completer: Completer<()>,
    ) {
        let op = match self
            .inner
            .protocol
            .login(&LoginRequest::Macaroons(macaroons.clone()))
        {
            Ok(op) => op,
            Err(e) => {
                self.conclude_login(
                    Err(format!("authentication failed: {e}")),
                    LoginKind::Macaroon,
                    completer,
                );
                return;
            }
        };

        let weak = self.downgrade();
        let handler: ResponseHandler = Box::new(move |resp| {
            let Some(session) = Session::upgrade(&weak) else { return };
            session.handle_macaroon_response(resp, macaroons, discharger, may_discharge, completer);
        });
        if self.send(op, handler).is_none() {
            self.abort_login();
        }
    }

    fn handle_macaroon_response(
        &self,
        resp: RpcResponse,
        macaroons: Option<Value>,
        discharger: Arc<dyn Discharger>,
        may_discharge: bool,
        completer: Completer<()>,
    ) {
        if let Some(err) = resp.error {
            self.conclude_login(
                Err(format!("authentication failed: {err}")),
                LoginKind::Macaroon,
                completer,
            );
            return;
        }

        let parsed = self.inner.protocol.parse_login(&resp.response);
        if let Some(challenge) = parsed.discharge_required.clone() {
            if !may_discharge {
                self.conclude_login(
                    Err("authentication failed: discharge required again".into()),
                    LoginKind::Macaroon,
                    completer,
                );
                return;
            }
            debug!("controller requires macaroon discharge");
            let weak = self.downgrade();
            let next = Arc::clone(&discharger);
            discharger.discharge(
                challenge,
                Box::new(move |outcome| {
                    let Some(session) = Session::upgrade(&weak) else { return };
                    match outcome {
                        Ok(proof) => session.send_macaroon_login(Some(proof), next, false, completer),
                        Err(msg) => session.conclude_login(
                            Err(format!("macaroon discharge failed: {msg}")),
                            LoginKind::Macaroon,
                            completer,
                        ),
                    }
                }),
            );
            return;
        }

        let Some(identity) = parsed.identity.clone() else {
            self.conclude_login(
                Err("authentication failed: use a proper Juju 2 release".into()),
                LoginKind::Macaroon,
                completer,
            );
            return;
        };
        self.state().credentials = Some(Credentials::Macaroons {
            user: Some(identity),
            macaroons: macaroons.unwrap_or(Value::Null),
        });
        self.conclude_login(Ok(parsed), LoginKind::Macaroon, completer);
    }

    /// A login request never reached the wire.
    fn abort_login(&self) {
        let mut st = self.state();
        if st.auth == AuthState::Authenticating {
            st.auth = AuthState::Unauthenticated;
        }
    }

    fn conclude_login(
        &self,
        outcome: Result<LoginResponse, String>,
        kind: LoginKind,
        completer: Completer<()>,
    ) {
        let error = match outcome {
            Ok(response) => {
                {
                    let mut st = self.state();
                    st.auth = AuthState::Authenticated;
                    st.facades = Some(response.facades);
                    st.read_only = response.read_only;
                    st.model_tag = response.model_tag;
                    st.failed_authentication = false;
                    st.failed_token_authentication = false;
                    if let Some((user, password)) = response.issued_credentials {
                        st.credentials = Some(Credentials::Password {
                            user: user_tag(&user),
                            password: SecretString::from(password),
                        });
                    }
                }
                info!(generation = %self.generation(), "login succeeded");
                self.bootstrap();
                None
            }
            Err(message) => {
                {
                    let mut st = self.state();
                    st.auth = AuthState::Unauthenticated;
                    st.credentials = None;
                    match kind {
                        LoginKind::Token => st.failed_token_authentication = true,
                        LoginKind::Password | LoginKind::Macaroon => {
                            st.failed_authentication = true;
                        }
                    }
                }
                warn!(%message, "login failed");
                Some(message)
            }
        };

        self.emit(SessionEvent::LoginCompleted {
            result: error.is_none(),
            error: error.clone(),
        });
        match error {
            None => completer.complete(()),
            Some(message) => completer.fail(CoreError::AuthenticationFailed { message }),
        }
    }

    // ── Bootstrap ────────────────────────────────────────────────

    /// Model info, then the mega-watcher, then the keepalive.
    fn bootstrap(&self) {
        self.refresh_current_model();
        self.start_watching();
        self.arm_pinger();
    }

    fn refresh_current_model(&self) {
        let tags: Vec<String> = self.model_tag().into_iter().collect();
        let built = self.inner.protocol.model_info(&tags);
        let weak = self.downgrade();
        self.send_built(
            built,
            Box::new(move |resp| {
                let Some(session) = Session::upgrade(&weak) else { return };
                if let Some(err) = resp.error {
                    warn!(%err, "error retrieving model information");
                    return;
                }
                let details = match session.inner.protocol.parse_model_info(&resp.response, &tags) {
                    Ok(details) => details,
                    Err(err) => {
                        warn!(%err, "error retrieving model information");
                        return;
                    }
                };
                let Some(current) = details.into_iter().next() else {
                    warn!("model information response was empty");
                    return;
                };
                if let Some(err) = current.err {
                    warn!(%err, "error retrieving model information");
                    return;
                }
                let is_maas = current.provider.as_deref() == Some("maas");
                session.state().model = Some(ModelInfo {
                    name: current.name,
                    uuid: current.uuid,
                    series: current.series,
                    provider: current.provider,
                    maas_server: None,
                });
                if is_maas {
                    session.refresh_maas_server();
                }
            }),
        );
    }

    fn refresh_maas_server(&self) {
        let built = self.inner.protocol.model_get();
        let weak = self.downgrade();
        self.send_built(
            built,
            Box::new(move |resp| {
                let Some(session) = Session::upgrade(&weak) else { return };
                if let Some(err) = resp.error {
                    warn!(%err, "error calling ModelGet");
                    return;
                }
                let config = session.inner.protocol.parse_model_config(&resp.response);
                let server = config
                    .get("maas-server")
                    .map(|v| v.get("value").unwrap_or(v))
                    .and_then(Value::as_str)
                    .map(str::to_owned);
                if let Some(model) = session.state().model.as_mut() {
                    model.maas_server = server;
                }
            }),
        );
    }

    // ── Keepalive ────────────────────────────────────────────────

    /// Fire-and-forget `Pinger.Ping`.
    pub fn ping(&self) {
        self.notify(self.inner.protocol.ping());
    }

    fn arm_pinger(&self) {
        let mut slot = self.inner.pinger.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("no tokio runtime; keepalive disabled");
            return;
        };

        let token = self.inner.cancel.child_token();
        let cancel = token.clone();
        let weak = self.downgrade();
        let period = self.inner.config.ping_interval;
        runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(session) = Session::upgrade(&weak) else { break };
                        session.ping();
                    }
                }
            }
        });
        *slot = Some(token);
    }

    fn disarm_pinger(&self) {
        let token = self
            .inner
            .pinger
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(token) = token {
            token.cancel();
        }
    }

    // ── Teardown ─────────────────────────────────────────────────

    /// Stop the keepalive and the mega-watcher. Resolves once the watcher
    /// stop is acknowledged (immediately if no watcher was started).
    pub fn before_close(&self) -> Reply<()> {
        self.disarm_pinger();
        self.stop_watching()
    }

    /// Orderly shutdown: `before_close`, then close the transport and
    /// release every pending handler.
    pub async fn close(&self) {
        if let Err(e) = self.before_close().await {
            debug!(error = %e, "watcher stop not acknowledged");
        }
        self.inner.mux.transport().close();
        self.inner.mux.abandon_pending();
        self.inner.cancel.cancel();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.state();
        f.debug_struct("Session")
            .field("url", &self.inner.config.url.as_str())
            .field("generation", &self.inner.protocol.generation())
            .field("auth", &st.auth)
            .field("watcher", &st.watcher.handle)
            .finish_non_exhaustive()
    }
}
