// ── Session events ──
//
// Notifications published on the session's broadcast channel, plus a
// `Stream` adapter for consumers that prefer combinators.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use jujulink_api::DeltaRecord;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Outcome of a login attempt. `result` is `false` for every failure,
    /// including incomplete credentials.
    LoginCompleted { result: bool, error: Option<String> },
    /// One ordered mega-watcher batch.
    Deltas(Vec<DeltaRecord>),
}

/// `Stream` of session events.
///
/// Slow consumers that fall behind the channel capacity skip the missed
/// events (logged at `warn`) rather than ending the stream.
pub struct EventStream {
    inner: BroadcastStream<SessionEvent>,
}

impl EventStream {
    pub(crate) fn new(receiver: broadcast::Receiver<SessionEvent>) -> Self {
        Self {
            inner: BroadcastStream::new(receiver),
        }
    }
}

impl Stream for EventStream {
    type Item = SessionEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(event))) => return Poll::Ready(Some(event)),
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(skipped)))) => {
                    tracing::warn!(skipped, "event subscriber lagged");
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
