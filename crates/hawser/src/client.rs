//! ClientService: lifecycle, connection probing, and asynchronous invocation
//! against remote peers.
//!
//! # Architecture
//!
//! ```text
//!  caller ── invoke_with_done ──▶ ClientService ── send_async ──▶ transport
//!     │                               │                              │
//!     │                        InvokeBridge ◀── on_response / on_exception
//!     │                          │        │
//!     ▼                          ▼        ▼
//!  InvokeFuture ◀── complete/fail    dispatch pool ──▶ ResponseClosure
//! ```
//!
//! The bridge turns the transport's single callback into the two completion
//! channels a caller can consume: a cancellable [`InvokeFuture`] and an
//! optional [`ResponseClosure`]. Transport faults are normalized into a
//! [`Status`] before they reach the closure; the future keeps the raw error.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};

use hawser_core::{
    AddressResolver, Endpoint, ErrorCode, InvokeCallback, InvokeFuture, Message, PingRequest,
    ResponseClosure, RpcError, RpcTransport, StaticResolver, Status, TransportError,
};

use crate::dispatch::{DispatchMetrics, DispatchPool, run_guarded};
use crate::options::RpcOptions;

/// Hook run against the transport right before it is started.
type ConfigureHook<T> = Box<dyn FnOnce(&T) + Send>;

/// Slot the closure waits in until exactly one delivery path claims it.
type ClosureSlot = Arc<Mutex<Option<Box<dyn ResponseClosure>>>>;

enum Lifecycle {
    Uninitialized,
    Running(Arc<Running>),
    Shutdown,
}

struct Running {
    dispatch: Arc<DispatchPool>,
    options: RpcOptions,
}

/// Client-side RPC facade for a peer in a distributed service.
///
/// Owns the transport handle and a bounded dispatch pool for running result
/// closures, and exposes `init`/`shutdown`/`connect`/`disconnect`/
/// `invoke_with_done`. The lifecycle is `Uninitialized -> Running ->
/// Shutdown`, with shutdown terminal.
///
/// All operations that reach the transport require a Tokio runtime to be
/// current: the dispatch pool and the independent-task handoff both spawn
/// onto it.
pub struct ClientService<T: RpcTransport> {
    transport: T,
    resolver: Arc<dyn AddressResolver>,
    configure: Mutex<Option<ConfigureHook<T>>>,
    state: RwLock<Lifecycle>,
}

impl<T: RpcTransport> ClientService<T> {
    /// Create a service over `transport` with the default address resolver.
    pub fn new(transport: T) -> Self {
        Self::with_resolver(transport, StaticResolver)
    }

    /// Create a service with a custom [`AddressResolver`].
    pub fn with_resolver(transport: T, resolver: impl AddressResolver) -> Self {
        Self {
            transport,
            resolver: Arc::new(resolver),
            configure: Mutex::new(None),
            state: RwLock::new(Lifecycle::Uninitialized),
        }
    }

    /// Install a hook run against the transport during `init`, before it is
    /// started. No-op unless installed; this is the seam specialized
    /// deployments use to tune the transport while the service stays generic.
    pub fn with_transport_config(self, hook: impl FnOnce(&T) + Send + 'static) -> Self {
        *self.configure.lock() = Some(Box::new(hook));
        self
    }

    /// The transport this service was built over.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Initialize the service: configure and start the transport, then bring
    /// up the dispatch pool sized from `options`.
    ///
    /// Concurrent callers observe a single initialization; calling `init` on
    /// a running service is a no-op returning success. A service that was
    /// shut down cannot be initialized again. The only failure source is the
    /// transport refusing to start.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn init(&self, options: RpcOptions) -> Result<(), RpcError> {
        let mut state = self.state.write();
        match &*state {
            Lifecycle::Running(_) => return Ok(()),
            Lifecycle::Shutdown => {
                return Err(RpcError::IllegalState("client service is shut down"));
            }
            Lifecycle::Uninitialized => {}
        }

        if let Some(hook) = self.configure.lock().take() {
            hook(&self.transport);
        }
        self.transport.start()?;

        let dispatch = Arc::new(DispatchPool::new(
            options.dispatch_workers(),
            options.dispatch_queue_capacity,
        ));
        tracing::info!(
            workers = options.dispatch_workers(),
            queue_capacity = options.dispatch_queue_capacity,
            "client service initialized"
        );
        *state = Lifecycle::Running(Arc::new(Running { dispatch, options }));
        Ok(())
    }

    /// Shut the service down: release the transport and let the dispatch
    /// pool drain. Idempotent, and terminal.
    pub fn shutdown(&self) {
        let mut state = self.state.write();
        match &*state {
            Lifecycle::Shutdown => return,
            Lifecycle::Running(_) => {
                self.transport.shutdown();
                tracing::info!("client service shut down");
            }
            Lifecycle::Uninitialized => {}
        }
        *state = Lifecycle::Shutdown;
    }

    fn running(&self) -> Result<Arc<Running>, RpcError> {
        match &*self.state.read() {
            Lifecycle::Running(running) => Ok(running.clone()),
            Lifecycle::Uninitialized => {
                Err(RpcError::IllegalState("client service is not initialized"))
            }
            Lifecycle::Shutdown => Err(RpcError::IllegalState("client service is shut down")),
        }
    }

    /// True when the transport holds a live connection to `endpoint`.
    pub fn is_connected(&self, endpoint: &Endpoint) -> bool {
        if self.running().is_err() {
            return false;
        }
        self.transport.check_connection(&endpoint.connection_key())
    }

    /// Probe `endpoint` with a synchronous ping.
    ///
    /// Returns `Ok(true)` when already connected (no I/O in that case) or
    /// when the peer answers the probe with a zero error code. Transport
    /// faults on this path are logged and reported as `Ok(false)`, never as
    /// errors; the only error is calling before `init`.
    pub async fn connect(&self, endpoint: &Endpoint) -> Result<bool, RpcError> {
        let running = self.running()?;
        if self.transport.check_connection(&endpoint.connection_key()) {
            return Ok(true);
        }

        let address = match self.resolver.resolve(endpoint) {
            Ok(address) => address,
            Err(e) => {
                tracing::error!(endpoint = %endpoint, error = %e, "failed to resolve endpoint");
                return Ok(false);
            }
        };
        let probe = Message::Ping(PingRequest::now());
        match self
            .transport
            .send_sync(&address, probe, running.options.rpc_connect_timeout)
            .await
        {
            Ok(Message::Error(response)) => Ok(response.code == 0),
            Ok(other) => {
                tracing::warn!(endpoint = %endpoint, response = ?other, "unexpected ping reply");
                Ok(false)
            }
            Err(e) => {
                tracing::error!(endpoint = %endpoint, error = %e, "failed to connect");
                Ok(false)
            }
        }
    }

    /// Close the connection to `endpoint`. Always reports success.
    pub fn disconnect(&self, endpoint: &Endpoint) -> bool {
        tracing::info!(endpoint = %endpoint, "disconnecting from peer");
        if self.running().is_ok() {
            self.transport.close_connection(&endpoint.connection_key());
        }
        true
    }

    /// Issue an asynchronous request to `endpoint`.
    ///
    /// Returns immediately with a cancellable [`InvokeFuture`]; the caller
    /// may await it, poll it, cancel it, or drop it in favor of the optional
    /// `done` closure. The closure, when supplied, fires exactly once with
    /// the normalized [`Status`] (and the payload for non-error responses),
    /// always on the dispatch pool rather than the transport's I/O context
    /// or the caller's thread.
    ///
    /// `timeout` falls back to the configured default when absent or zero.
    /// Submission failures fail the future on the spot and notify the
    /// closure from an independently spawned task, never inline: the caller
    /// may be holding a lock the closure's own logic needs.
    pub fn invoke_with_done(
        &self,
        endpoint: &Endpoint,
        request: Message,
        done: Option<Box<dyn ResponseClosure>>,
        timeout: Option<Duration>,
    ) -> InvokeFuture {
        let future = InvokeFuture::new();

        let running = match self.running() {
            Ok(running) => running,
            Err(e) => {
                let status = Status::error(ErrorCode::IllegalState, e.to_string());
                future.fail(e);
                if let Some(done) = done {
                    notify_detached(done, status, None);
                }
                return future;
            }
        };

        let address = match self.resolver.resolve(endpoint) {
            Ok(address) => address,
            Err(e) => {
                let status = classify_submission_failure(&e);
                future.fail(RpcError::Transport(e));
                if let Some(done) = done {
                    notify_detached(done, status, None);
                }
                return future;
            }
        };

        let timeout = match timeout {
            Some(t) if t > Duration::ZERO => t,
            _ => running.options.rpc_default_timeout,
        };

        let closure: ClosureSlot = Arc::new(Mutex::new(done));
        let bridge = InvokeBridge {
            future: future.clone(),
            closure: closure.clone(),
            dispatch: running.dispatch.clone(),
            endpoint: endpoint.clone(),
        };

        if let Err(e) = self
            .transport
            .send_async(&address, request, timeout, Box::new(bridge))
        {
            // The transport never accepted the request: reclaim the closure
            // and fail the future before returning.
            tracing::warn!(endpoint = %endpoint, error = %e, "failed to submit RPC request");
            let status = classify_submission_failure(&e);
            future.fail(RpcError::Transport(e));
            if let Some(done) = closure.lock().take() {
                notify_detached(done, status, None);
            }
        }

        future
    }

    /// Snapshot of the dispatch pool's counters, when the service is running.
    pub fn dispatch_metrics(&self) -> Option<DispatchMetrics> {
        self.running().ok().map(|running| running.dispatch.metrics())
    }
}

/// Bridges the transport's callback into the future/closure pair.
///
/// The closure lives in a shared slot so that exactly one delivery path
/// (response, exception, or submission failure) can claim it, even against a
/// misbehaving transport. The cancellation check at the top of each path is
/// a cooperative snapshot; the future's single-assignment guard is the final
/// arbiter, so a cancel racing with delivery costs at most one no-op
/// classification and can never double-deliver.
struct InvokeBridge {
    future: InvokeFuture,
    closure: ClosureSlot,
    dispatch: Arc<DispatchPool>,
    endpoint: Endpoint,
}

impl InvokeBridge {
    fn run_closure(&self, status: Status, response: Option<Message>) {
        if let Some(done) = self.closure.lock().take() {
            self.dispatch
                .execute(Box::new(move || done.complete(status, response)));
        }
    }
}

impl InvokeCallback for InvokeBridge {
    fn on_response(self: Box<Self>, response: Message) {
        if self.future.is_cancelled() {
            tracing::debug!(endpoint = %self.endpoint, "dropping response for cancelled invocation");
            return;
        }

        let (status, payload) = match response.as_error() {
            Some(error) => (error.to_status(), None),
            None => (Status::ok(), Some(response.clone())),
        };
        self.run_closure(status, payload);
        self.future.complete(response);
    }

    fn on_exception(self: Box<Self>, error: TransportError) {
        if self.future.is_cancelled() {
            tracing::debug!(endpoint = %self.endpoint, "dropping error for cancelled invocation");
            return;
        }

        self.run_closure(classify_invoke_failure(&error), None);
        self.future.fail(RpcError::Transport(error));
    }
}

/// Map a fault delivered through `on_exception` to the closure's status.
fn classify_invoke_failure(error: &TransportError) -> Status {
    match error {
        TransportError::Timeout { .. } => Status::error(ErrorCode::TimedOut, error.to_string()),
        other => Status::error(ErrorCode::Internal, format!("RPC exception: {other}")),
    }
}

/// Map a send-time fault to the closure's status.
fn classify_submission_failure(error: &TransportError) -> Status {
    match error {
        TransportError::Interrupted => {
            Status::error(ErrorCode::Interrupted, "sending rpc was interrupted")
        }
        other => Status::error(
            ErrorCode::Internal,
            format!("failed to send RPC request: {other}"),
        ),
    }
}

/// Run a closure on a task of its own, never on the calling thread.
fn notify_detached(done: Box<dyn ResponseClosure>, status: Status, response: Option<Message>) {
    let job: crate::dispatch::Job = Box::new(move || done.complete(status, response));
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move { run_guarded(job) });
        }
        Err(_) => {
            std::thread::spawn(move || run_guarded(job));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hawser_core::TransportError;

    #[test]
    fn timeouts_classify_as_timed_out() {
        let status = classify_invoke_failure(&TransportError::Timeout { timeout_ms: 7 });
        assert_eq!(status.code(), ErrorCode::TimedOut as i32);
        assert_eq!(status.message(), Some("request timed out after 7ms"));
    }

    #[test]
    fn other_faults_classify_as_internal() {
        let status = classify_invoke_failure(&TransportError::Connection("reset".into()));
        assert_eq!(status.code(), ErrorCode::Internal as i32);
        assert_eq!(
            status.message(),
            Some("RPC exception: connection error: reset")
        );
    }

    #[test]
    fn submission_failures_distinguish_interruption() {
        let status = classify_submission_failure(&TransportError::Interrupted);
        assert_eq!(status.code(), ErrorCode::Interrupted as i32);
        assert_eq!(status.message(), Some("sending rpc was interrupted"));

        let status = classify_submission_failure(&TransportError::Closed);
        assert_eq!(status.code(), ErrorCode::Internal as i32);
        assert_eq!(
            status.message(),
            Some("failed to send RPC request: transport closed")
        );
    }
}
