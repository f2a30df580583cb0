//! hawser-transport-mem: In-process transport for hawser.
//!
//! This is the semantic reference implementation of the
//! [`RpcTransport`] contract. Real network transports must behave
//! identically to this one; if behavior differs, the other transport has a
//! bug.
//!
//! # Characteristics
//!
//! - Requests are handed to scripted peers registered per connection key;
//!   no serialization, no sockets
//! - Per-call timeouts enforced with `tokio::time::timeout`
//! - An unregistered peer behaves like an unreachable host: the call hangs
//!   until its deadline elapses
//!
//! # Usage
//!
//! ```ignore
//! let transport = InProcTransport::new();
//! transport.register_peer("127.0.0.1:9000", Box::new(|request| {
//!     Box::pin(async move { Ok(reply_for(request)) })
//! }));
//! ```
//!
//! The handle is cheap to clone; tests keep one clone for scripting after
//! handing the transport to a client service.

#![forbid(unsafe_code)]

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::Mutex;

use hawser_core::{
    InvokeCallback, Message, RpcTransport, TransportAddress, TransportError,
};

/// Async handler a scripted peer runs for each delivered request.
///
/// The handler sees every message, connection probes included; wrap it with
/// a ping-answering layer when probe handling should be implicit.
pub type PeerHandler =
    Box<dyn Fn(Message) -> BoxFuture<'static, Result<Message, TransportError>> + Send + Sync>;

/// In-process transport implementation.
///
/// Cloneable handle over shared state. All I/O is simulated by running peer
/// handlers on the current Tokio runtime, so `send_async` must be called
/// from within one.
#[derive(Clone)]
pub struct InProcTransport {
    inner: Arc<Inner>,
}

struct Inner {
    peers: Mutex<HashMap<String, Arc<PeerHandler>>>,
    connections: Mutex<HashSet<String>>,
    started: AtomicBool,
    closed: AtomicBool,
    /// Diagnostics: how often `start` was called.
    start_calls: AtomicU64,
    /// Diagnostics: completed request round trips, probes included.
    round_trips: AtomicU64,
}

impl InProcTransport {
    /// Create an empty transport with no reachable peers.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                peers: Mutex::new(HashMap::new()),
                connections: Mutex::new(HashSet::new()),
                started: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                start_calls: AtomicU64::new(0),
                round_trips: AtomicU64::new(0),
            }),
        }
    }

    /// Register a scripted peer reachable at `key` (the endpoint's stable
    /// string form). Replaces any previous peer at that key.
    pub fn register_peer(&self, key: impl Into<String>, handler: PeerHandler) {
        let key = key.into();
        tracing::debug!(key = %key, "registered in-proc peer");
        self.inner.peers.lock().insert(key, Arc::new(handler));
    }

    /// Remove the peer at `key`, making it unreachable again.
    pub fn unregister_peer(&self, key: &str) {
        self.inner.peers.lock().remove(key);
    }

    /// True after `start` and before `shutdown`.
    pub fn is_started(&self) -> bool {
        self.inner.started.load(Ordering::Acquire) && !self.inner.closed.load(Ordering::Acquire)
    }

    /// Number of times `start` was called.
    pub fn start_count(&self) -> u64 {
        self.inner.start_calls.load(Ordering::Relaxed)
    }

    /// Number of completed request round trips, probes included.
    pub fn round_trip_count(&self) -> u64 {
        self.inner.round_trips.load(Ordering::Relaxed)
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.is_started() {
            Ok(())
        } else {
            Err(TransportError::Closed)
        }
    }

    async fn round_trip(
        inner: Arc<Inner>,
        key: String,
        request: Message,
        timeout: Duration,
    ) -> Result<Message, TransportError> {
        let handler = inner.peers.lock().get(&key).cloned();
        let deliver = async {
            match handler {
                Some(handler) => handler(request).await,
                // No peer: an unreachable host, the call just hangs.
                None => std::future::pending().await,
            }
        };
        match tokio::time::timeout(timeout, deliver).await {
            Ok(Ok(response)) => {
                inner.round_trips.fetch_add(1, Ordering::Relaxed);
                inner.connections.lock().insert(key);
                Ok(response)
            }
            Ok(Err(error)) => Err(error),
            Err(_) => Err(TransportError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }
}

impl Default for InProcTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl RpcTransport for InProcTransport {
    fn start(&self) -> Result<(), TransportError> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        self.inner.start_calls.fetch_add(1, Ordering::Relaxed);
        self.inner.started.store(true, Ordering::Release);
        Ok(())
    }

    fn shutdown(&self) {
        self.inner.closed.store(true, Ordering::Release);
        self.inner.peers.lock().clear();
        self.inner.connections.lock().clear();
    }

    fn send_async(
        &self,
        address: &TransportAddress,
        request: Message,
        timeout: Duration,
        callback: Box<dyn InvokeCallback>,
    ) -> Result<(), TransportError> {
        self.ensure_open()?;
        let inner = self.inner.clone();
        let key = address.key().to_string();
        tokio::spawn(async move {
            match Self::round_trip(inner, key, request, timeout).await {
                Ok(response) => callback.on_response(response),
                Err(error) => callback.on_exception(error),
            }
        });
        Ok(())
    }

    fn send_sync(
        &self,
        address: &TransportAddress,
        request: Message,
        timeout: Duration,
    ) -> impl Future<Output = Result<Message, TransportError>> + Send {
        let open = self.ensure_open();
        let inner = self.inner.clone();
        let key = address.key().to_string();
        async move {
            open?;
            Self::round_trip(inner, key, request, timeout).await
        }
    }

    fn check_connection(&self, key: &str) -> bool {
        self.is_started() && self.inner.connections.lock().contains(key)
    }

    fn close_connection(&self, key: &str) {
        tracing::debug!(key = %key, "closing in-proc connection");
        self.inner.connections.lock().remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use hawser_core::{AppMessage, ErrorResponse, InvokeFuture, RpcError};

    fn address(key: &str) -> TransportAddress {
        TransportAddress::new(format!("hawser://{key}"), key)
    }

    fn echo_peer() -> PeerHandler {
        Box::new(|request| Box::pin(async move { Ok(request) }))
    }

    fn started() -> InProcTransport {
        let transport = InProcTransport::new();
        transport.start().unwrap();
        transport
    }

    /// Callback that forwards into an InvokeFuture for easy awaiting.
    struct FutureCallback(InvokeFuture);

    impl InvokeCallback for FutureCallback {
        fn on_response(self: Box<Self>, response: Message) {
            self.0.complete(response);
        }

        fn on_exception(self: Box<Self>, error: TransportError) {
            self.0.fail(RpcError::Transport(error));
        }
    }

    #[tokio::test]
    async fn sync_round_trip_reaches_registered_peer() {
        let transport = started();
        transport.register_peer("a:1", echo_peer());

        let request = Message::App(AppMessage::new("echo", Bytes::from_static(b"x")));
        let response = transport
            .send_sync(&address("a:1"), request.clone(), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(response, request);
        assert_eq!(transport.round_trip_count(), 1);
    }

    #[tokio::test]
    async fn async_round_trip_invokes_callback_once() {
        let transport = started();
        transport.register_peer("a:1", echo_peer());

        let future = InvokeFuture::new();
        transport
            .send_async(
                &address("a:1"),
                Message::Error(ErrorResponse::success()),
                Duration::from_secs(1),
                Box::new(FutureCallback(future.clone())),
            )
            .unwrap();
        assert_eq!(
            future.await,
            Ok(Message::Error(ErrorResponse::success()))
        );
    }

    #[tokio::test]
    async fn unregistered_peer_times_out() {
        let transport = started();
        let future = InvokeFuture::new();
        transport
            .send_async(
                &address("nowhere:1"),
                Message::Error(ErrorResponse::success()),
                Duration::from_millis(10),
                Box::new(FutureCallback(future.clone())),
            )
            .unwrap();
        assert_eq!(
            future.await,
            Err(RpcError::Transport(TransportError::Timeout {
                timeout_ms: 10
            }))
        );
    }

    #[tokio::test]
    async fn peer_faults_pass_through() {
        let transport = started();
        transport.register_peer(
            "a:1",
            Box::new(|_| {
                Box::pin(async { Err(TransportError::Connection("reset by peer".into())) })
            }),
        );

        let result = transport
            .send_sync(
                &address("a:1"),
                Message::Error(ErrorResponse::success()),
                Duration::from_secs(1),
            )
            .await;
        assert_eq!(
            result,
            Err(TransportError::Connection("reset by peer".into()))
        );
    }

    #[tokio::test]
    async fn connections_track_successful_traffic() {
        let transport = started();
        transport.register_peer("a:1", echo_peer());
        assert!(!transport.check_connection("a:1"));

        transport
            .send_sync(
                &address("a:1"),
                Message::Error(ErrorResponse::success()),
                Duration::from_secs(1),
            )
            .await
            .unwrap();
        assert!(transport.check_connection("a:1"));

        transport.close_connection("a:1");
        assert!(!transport.check_connection("a:1"));
    }

    #[tokio::test]
    async fn lifecycle_gates_sending() {
        let transport = InProcTransport::new();
        let result = transport
            .send_sync(
                &address("a:1"),
                Message::Error(ErrorResponse::success()),
                Duration::from_secs(1),
            )
            .await;
        assert_eq!(result, Err(TransportError::Closed));

        transport.start().unwrap();
        transport.shutdown();
        assert!(!transport.is_started());
        assert!(transport.start().is_err());

        let future = InvokeFuture::new();
        let submit = transport.send_async(
            &address("a:1"),
            Message::Error(ErrorResponse::success()),
            Duration::from_secs(1),
            Box::new(FutureCallback(future)),
        );
        assert_eq!(submit, Err(TransportError::Closed));
    }
}
