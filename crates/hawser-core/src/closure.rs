//! Single-shot result closures.

use crate::{Message, Status};

/// Capability a caller may supply to receive the final [`Status`] when an
/// invocation completes.
///
/// For a well-formed non-error response the typed payload is handed over
/// together with the status; error statuses come with `None`. Consuming
/// `Box<Self>` makes at-most-once invocation a property of the type rather
/// than a runtime convention.
///
/// Closures run on the service's dispatch pool, never on the transport's I/O
/// context or the invoking caller's thread. Panics raised inside a closure
/// are caught and logged by the service; they never cross the API boundary.
pub trait ResponseClosure: Send + 'static {
    /// Deliver the final status and, for non-error responses, the payload.
    fn complete(self: Box<Self>, status: Status, response: Option<Message>);
}

impl<F> ResponseClosure for F
where
    F: FnOnce(Status, Option<Message>) + Send + 'static,
{
    fn complete(self: Box<Self>, status: Status, response: Option<Message>) {
        self(status, response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn fn_once_is_a_closure() {
        let fired = Arc::new(AtomicBool::new(false));
        let observer = fired.clone();
        let closure: Box<dyn ResponseClosure> =
            Box::new(move |status: Status, response: Option<Message>| {
                assert!(status.is_ok());
                assert!(response.is_none());
                observer.store(true, Ordering::SeqCst);
            });
        closure.complete(Status::ok(), None);
        assert!(fired.load(Ordering::SeqCst));
    }
}
