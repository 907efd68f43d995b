//! WebSocket transport for the controller RPC channel.
//!
//! Splits a tungstenite stream into a writer task (fed by an unbounded
//! queue so [`Transport::send`] never blocks) and a reader task that
//! forwards text frames to an `mpsc` receiver handed back from
//! [`WebSocketTransport::connect`]. Connection state is published through
//! a [`tokio::sync::watch`] channel.
//!
//! # Example
//!
//! ```rust,ignore
//! use jujulink_api::transport::TlsMode;
//! use jujulink_api::websocket::WebSocketTransport;
//! use tokio_util::sync::CancellationToken;
//! use url::Url;
//!
//! let url = Url::parse("wss://10.0.0.2:17070/api")?;
//! let (transport, mut incoming) =
//!     WebSocketTransport::connect(&url, &TlsMode::DangerAcceptInvalid, CancellationToken::new()).await?;
//!
//! transport.send(r#"{"type":"Pinger","request":"Ping","request-id":1,"params":{}}"#.into())?;
//! while let Some(frame) = incoming.recv().await {
//!     println!("{frame}");
//! }
//! ```

use std::sync::Arc;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::Connector;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder, Message};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::transport::{ReadyState, TlsMode, Transport};

// ── Channel capacity ────────────────────────────────────────────────

const INCOMING_CHANNEL_CAPACITY: usize = 1024;

// ── WebSocketTransport ──────────────────────────────────────────────

/// A connected controller WebSocket.
///
/// Dropping the transport does not close the socket; call
/// [`close`](Transport::close) or cancel the token passed to `connect`.
pub struct WebSocketTransport {
    outgoing: mpsc::UnboundedSender<String>,
    state: Arc<watch::Sender<ReadyState>>,
    cancel: CancellationToken,
}

impl WebSocketTransport {
    /// Perform the WebSocket handshake and spawn the reader/writer tasks.
    ///
    /// `tls` applies to `wss://` URLs only. Returns the transport together
    /// with the receiver of incoming text frames. The receiver yields
    /// `None` once the socket is gone.
    pub async fn connect(
        url: &Url,
        tls: &TlsMode,
        cancel: CancellationToken,
    ) -> Result<(Self, mpsc::Receiver<String>), Error> {
        tracing::info!(url = %url, %tls, "connecting to controller WebSocket");
        let connector = tls.rustls_config()?.map(Connector::Rustls);

        let (state_tx, _) = watch::channel(ReadyState::Connecting);
        let state = Arc::new(state_tx);

        let uri: tungstenite::http::Uri = url.as_str().parse().map_err(
            |e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()),
        )?;

        let (ws_stream, _response) = tokio_tungstenite::connect_async_tls_with_config(
            ClientRequestBuilder::new(uri),
            None,
            false,
            connector,
        )
        .await
        .map_err(|e| {
            state.send_replace(ReadyState::Closed);
            Error::WebSocketConnect(e.to_string())
        })?;

        tracing::info!("controller WebSocket connected");
        state.send_replace(ReadyState::Open);

        let (sink, stream) = ws_stream.split();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::channel(INCOMING_CHANNEL_CAPACITY);
        let cancel = cancel.child_token();

        tokio::spawn(write_loop(sink, out_rx, Arc::clone(&state), cancel.clone()));
        tokio::spawn(read_loop(stream, in_tx, Arc::clone(&state), cancel.clone()));

        Ok((
            Self {
                outgoing: out_tx,
                state,
                cancel,
            },
            in_rx,
        ))
    }

    /// Watch connection state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<ReadyState> {
        self.state.subscribe()
    }
}

impl Transport for WebSocketTransport {
    fn ready_state(&self) -> ReadyState {
        *self.state.borrow()
    }

    fn send(&self, frame: String) -> Result<(), Error> {
        let state = self.ready_state();
        if !state.is_open() {
            return Err(Error::NotOpen { state });
        }
        self.outgoing.send(frame).map_err(|_| Error::Disconnected)
    }

    fn close(&self) {
        self.cancel.cancel();
    }
}

// ── Background tasks ────────────────────────────────────────────────

async fn write_loop<S>(
    mut sink: S,
    mut outgoing: mpsc::UnboundedReceiver<String>,
    state: Arc<watch::Sender<ReadyState>>,
    cancel: CancellationToken,
) where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                state.send_replace(ReadyState::Closing);
                if let Err(e) = sink.send(Message::Close(None)).await {
                    tracing::debug!(error = %e, "close frame not delivered");
                }
                break;
            }
            frame = outgoing.recv() => {
                let Some(text) = frame else { break };
                tracing::trace!(len = text.len(), "WebSocket send");
                if let Err(e) = sink.send(Message::Text(text.into())).await {
                    tracing::warn!(error = %e, "WebSocket write failed");
                    break;
                }
            }
        }
    }

    state.send_replace(ReadyState::Closed);
    cancel.cancel();
    tracing::debug!("WebSocket writer exiting");
}

async fn read_loop<S>(
    mut stream: S,
    incoming: mpsc::Sender<String>,
    state: Arc<watch::Sender<ReadyState>>,
    cancel: CancellationToken,
) where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        if incoming.send(text.to_string()).await.is_err() {
                            tracing::debug!("incoming frame receiver dropped");
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(_))) => {
                        // tungstenite handles pong replies automatically
                        tracing::trace!("WebSocket ping");
                    }
                    Some(Ok(Message::Close(frame))) => {
                        if let Some(ref cf) = frame {
                            tracing::info!(
                                code = %cf.code,
                                reason = %cf.reason,
                                "WebSocket close frame received"
                            );
                        } else {
                            tracing::info!("WebSocket close frame received (no payload)");
                        }
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "WebSocket read failed");
                        break;
                    }
                    None => {
                        tracing::info!("WebSocket stream ended");
                        break;
                    }
                    Some(Ok(_)) => {
                        // Binary, Pong, Frame -- ignore
                    }
                }
            }
        }
    }

    state.send_replace(ReadyState::Closed);
    cancel.cancel();
    tracing::debug!("WebSocket reader exiting");
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// Accept one connection and echo every text frame back.
    async fn spawn_echo_server() -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            while let Some(Ok(msg)) = ws.next().await {
                if msg.is_text() {
                    ws.send(msg).await.unwrap();
                } else if msg.is_close() {
                    break;
                }
            }
        });
        Url::parse(&format!("ws://{addr}/api")).unwrap()
    }

    #[tokio::test]
    async fn frames_round_trip_through_echo_server() {
        let url = spawn_echo_server().await;
        let (transport, mut incoming) = WebSocketTransport::connect(&url, &TlsMode::System, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(transport.ready_state(), ReadyState::Open);
        transport.send(r#"{"request-id":1}"#.into()).unwrap();
        let echoed = incoming.recv().await.unwrap();
        assert_eq!(echoed, r#"{"request-id":1}"#);
    }

    #[tokio::test]
    async fn close_rejects_further_sends() {
        let url = spawn_echo_server().await;
        let (transport, mut incoming) = WebSocketTransport::connect(&url, &TlsMode::System, CancellationToken::new())
            .await
            .unwrap();
        let mut state = transport.subscribe_state();

        transport.close();
        state
            .wait_for(|s| *s == ReadyState::Closed)
            .await
            .unwrap();

        let err = transport.send("{}".into()).unwrap_err();
        assert!(matches!(err, Error::NotOpen { state: ReadyState::Closed }));
        assert!(incoming.recv().await.is_none());
    }

    #[tokio::test]
    async fn insecure_mode_still_speaks_plain_ws() {
        let url = spawn_echo_server().await;
        let (transport, mut incoming) =
            WebSocketTransport::connect(&url, &TlsMode::DangerAcceptInvalid, CancellationToken::new())
                .await
                .unwrap();

        transport.send("ping".into()).unwrap();
        assert_eq!(incoming.recv().await.unwrap(), "ping");
    }

    #[tokio::test]
    async fn unreadable_ca_fails_before_connecting() {
        let url = Url::parse("wss://127.0.0.1:1/api").unwrap();
        let tls = TlsMode::CustomCa("/nonexistent/ca.pem".into());
        let result = WebSocketTransport::connect(&url, &tls, CancellationToken::new()).await;
        assert!(matches!(result, Err(Error::Tls(_))));
    }

    #[tokio::test]
    async fn connect_to_invalid_url_fails() {
        let url = Url::parse("ws://127.0.0.1:1/api").unwrap();
        let result = WebSocketTransport::connect(&url, &TlsMode::System, CancellationToken::new()).await;
        assert!(matches!(result, Err(Error::WebSocketConnect(_))));
    }
}
