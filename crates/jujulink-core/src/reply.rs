use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::CoreError;

/// The eventual result of one operation.
///
/// Resolves once the response handler runs. If the request never reaches
/// the wire (transport closed) or the session abandons it, the handler is
/// dropped and the reply resolves to [`CoreError::Disconnected`].
#[must_use = "a Reply does nothing unless awaited"]
pub struct Reply<T> {
    state: ReplyState<T>,
}

enum ReplyState<T> {
    Pending(oneshot::Receiver<Result<T, CoreError>>),
    Ready(Option<Result<T, CoreError>>),
}

/// Sending half of a [`Reply`], moved into a response handler.
pub(crate) struct Completer<T> {
    tx: oneshot::Sender<Result<T, CoreError>>,
}

impl<T> std::fmt::Debug for Completer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completer").finish_non_exhaustive()
    }
}

impl<T> Completer<T> {
    pub(crate) fn complete(self, value: T) {
        self.finish(Ok(value));
    }

    pub(crate) fn fail(self, err: CoreError) {
        self.finish(Err(err));
    }

    pub(crate) fn finish(self, result: Result<T, CoreError>) {
        // The caller may have dropped the Reply; nothing to do then.
        let _ = self.tx.send(result);
    }
}

impl<T> Reply<T> {
    pub(crate) fn channel() -> (Completer<T>, Self) {
        let (tx, rx) = oneshot::channel();
        (
            Completer { tx },
            Self {
                state: ReplyState::Pending(rx),
            },
        )
    }

    /// A reply that is already resolved.
    pub fn ready(value: T) -> Self {
        Self {
            state: ReplyState::Ready(Some(Ok(value))),
        }
    }

    /// A reply that fails without contacting the controller.
    pub fn failed(err: CoreError) -> Self {
        Self {
            state: ReplyState::Ready(Some(Err(err))),
        }
    }
}

// The value is only ever moved out, never pinned in place.
impl<T> Unpin for Reply<T> {}

impl<T> Future for Reply<T> {
    type Output = Result<T, CoreError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().state {
            ReplyState::Pending(rx) => Pin::new(rx)
                .poll(cx)
                .map(|res| res.unwrap_or(Err(CoreError::Disconnected))),
            ReplyState::Ready(slot) => {
                Poll::Ready(slot.take().unwrap_or(Err(CoreError::Disconnected)))
            }
        }
    }
}

impl<T> std::fmt::Debug for Reply<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.state {
            ReplyState::Pending(_) => "pending",
            ReplyState::Ready(Some(_)) => "ready",
            ReplyState::Ready(None) => "taken",
        };
        f.debug_struct("Reply").field("state", &state).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completes_with_value() {
        let (completer, reply) = Reply::channel();
        completer.complete(42);
        assert_eq!(reply.await.unwrap(), 42);
    }

    #[tokio::test]
    async fn completer_can_fail() {
        let (completer, reply) = Reply::<u8>::channel();
        completer.fail(CoreError::NotAuthenticated);
        assert!(matches!(reply.await, Err(CoreError::NotAuthenticated)));
    }

    #[tokio::test]
    async fn dropped_completer_is_disconnected() {
        let (completer, reply) = Reply::<u8>::channel();
        drop(completer);
        assert!(matches!(reply.await, Err(CoreError::Disconnected)));
    }

    #[tokio::test]
    async fn failed_reply_surfaces_error() {
        let reply = Reply::<()>::failed(CoreError::LoginInProgress);
        assert!(matches!(reply.await, Err(CoreError::LoginInProgress)));
    }
}
