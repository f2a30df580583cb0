//! InvokeFuture: cancellable, single-assignment result container.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use parking_lot::Mutex;

use crate::{Message, RpcError};

/// Outcome of a finished invocation.
#[derive(Debug, Clone)]
enum Outcome {
    Ok(Message),
    Err(RpcError),
    Cancelled,
}

impl Outcome {
    fn into_result(self) -> Result<Message, RpcError> {
        match self {
            Outcome::Ok(message) => Ok(message),
            Outcome::Err(error) => Err(error),
            Outcome::Cancelled => Err(RpcError::Cancelled),
        }
    }
}

#[derive(Debug, Default)]
struct FutureState {
    outcome: Option<Outcome>,
    waker: Option<Waker>,
}

/// Cancellable, single-assignment container for an eventual RPC result.
///
/// Exactly one of [`complete`], [`fail`] or [`cancel`] ever takes effect.
/// Each mutator reports whether it won the assignment, so racing callers can
/// treat a lost race as a no-op; checking [`is_cancelled`] first and making
/// the assignment the final guard is what keeps delivery at-most-once even
/// when a cancel races with the transport callback.
///
/// Clones share the same slot: the invocation layer keeps one clone to
/// deliver the result while the caller awaits the other. Created per
/// invocation and discarded with the last clone.
///
/// [`complete`]: InvokeFuture::complete
/// [`fail`]: InvokeFuture::fail
/// [`cancel`]: InvokeFuture::cancel
/// [`is_cancelled`]: InvokeFuture::is_cancelled
#[derive(Debug, Clone, Default)]
pub struct InvokeFuture {
    state: Arc<Mutex<FutureState>>,
}

impl InvokeFuture {
    /// A fresh, pending future.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve with a successful payload.
    ///
    /// Returns false when the future already holds an outcome (including
    /// cancellation), in which case the payload is dropped.
    pub fn complete(&self, message: Message) -> bool {
        self.assign(Outcome::Ok(message))
    }

    /// Resolve with a failure.
    ///
    /// Returns false when the future already holds an outcome.
    pub fn fail(&self, error: RpcError) -> bool {
        self.assign(Outcome::Err(error))
    }

    /// Advisory cancellation: suppresses any later result or error delivery.
    ///
    /// Work already in flight at the transport is not aborted, only its
    /// outcome is ignored. Returns false when the future already completed.
    pub fn cancel(&self) -> bool {
        self.assign(Outcome::Cancelled)
    }

    /// True once any outcome (result, error or cancellation) is set.
    pub fn is_done(&self) -> bool {
        self.state.lock().outcome.is_some()
    }

    /// True when the future was cancelled before completing.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.state.lock().outcome, Some(Outcome::Cancelled))
    }

    /// Snapshot of the result, if the invocation has finished.
    pub fn try_result(&self) -> Option<Result<Message, RpcError>> {
        self.state
            .lock()
            .outcome
            .clone()
            .map(Outcome::into_result)
    }

    fn assign(&self, outcome: Outcome) -> bool {
        let waker = {
            let mut state = self.state.lock();
            if state.outcome.is_some() {
                return false;
            }
            state.outcome = Some(outcome);
            state.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
        true
    }
}

impl Future for InvokeFuture {
    type Output = Result<Message, RpcError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.state.lock();
        match &state.outcome {
            Some(outcome) => Poll::Ready(outcome.clone().into_result()),
            None => {
                state.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AppMessage, TransportError};
    use bytes::Bytes;
    use std::time::Duration;

    fn payload() -> Message {
        Message::App(AppMessage::new("test", Bytes::from_static(b"{}")))
    }

    #[test]
    fn first_assignment_wins() {
        let future = InvokeFuture::new();
        assert!(future.complete(payload()));
        assert!(!future.fail(RpcError::Cancelled));
        assert!(!future.cancel());
        assert!(future.is_done());
        assert!(!future.is_cancelled());
        assert!(matches!(future.try_result(), Some(Ok(_))));
    }

    #[test]
    fn cancellation_suppresses_later_results() {
        let future = InvokeFuture::new();
        assert!(future.cancel());
        assert!(!future.complete(payload()));
        assert!(!future.fail(RpcError::Transport(TransportError::Closed)));
        assert!(future.is_cancelled());
        assert_eq!(future.try_result(), Some(Err(RpcError::Cancelled)));
    }

    #[test]
    fn failure_is_preserved() {
        let future = InvokeFuture::new();
        let error = RpcError::Transport(TransportError::Timeout { timeout_ms: 10 });
        assert!(future.fail(error.clone()));
        assert_eq!(future.try_result(), Some(Err(error)));
    }

    #[tokio::test]
    async fn awaiting_wakes_on_completion() {
        let future = InvokeFuture::new();
        let completer = future.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            completer.complete(payload());
        });
        let result = future.await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn awaiting_a_cancelled_future_returns_cancelled() {
        let future = InvokeFuture::new();
        future.cancel();
        assert_eq!(future.await, Err(RpcError::Cancelled));
    }

    #[tokio::test]
    async fn concurrent_assignments_resolve_exactly_once() {
        for _ in 0..100 {
            let future = InvokeFuture::new();
            let a = future.clone();
            let b = future.clone();
            let t1 = tokio::spawn(async move { a.complete(payload()) });
            let t2 = tokio::spawn(async move { b.cancel() });
            let (won_complete, won_cancel) = (t1.await.unwrap(), t2.await.unwrap());
            assert!(won_complete ^ won_cancel);
        }
    }
}
