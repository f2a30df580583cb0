//! hawser-testkit: shared scenarios for exercising a [`ClientService`] end
//! to end.
//!
//! Provides scripted peers, a closure probe, and `run_*` scenario functions.
//! Thin `#[tokio::test]` wrappers in the consuming crates call the
//! scenarios:
//!
//! ```ignore
//! #[tokio::test(flavor = "multi_thread")]
//! async fn invoke_happy_path() {
//!     hawser_testkit::run_invoke_happy_path().await;
//! }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use hawser::{ClientService, RpcOptions};
use hawser_core::{
    AppMessage, Endpoint, InvokeCallback, Message, ResponseClosure, RpcError, RpcTransport,
    Status, TransportAddress, TransportError,
};
use hawser_transport_mem::InProcTransport;

mod peers;
mod scenarios;

pub use peers::*;
pub use scenarios::*;

/// Error type for test scenarios.
#[derive(Debug)]
pub enum TestError {
    /// Harness setup failed.
    Setup(String),
    /// An invocation failed where the scenario expected success.
    Rpc(RpcError),
    /// Assertion failed.
    Assertion(String),
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestError::Setup(msg) => write!(f, "setup error: {msg}"),
            TestError::Rpc(e) => write!(f, "RPC error: {e}"),
            TestError::Assertion(msg) => write!(f, "assertion failed: {msg}"),
        }
    }
}

impl std::error::Error for TestError {}

impl From<RpcError> for TestError {
    fn from(e: RpcError) -> Self {
        TestError::Rpc(e)
    }
}

pub(crate) fn ensure(cond: bool, msg: impl Into<String>) -> Result<(), TestError> {
    if cond {
        Ok(())
    } else {
        Err(TestError::Assertion(msg.into()))
    }
}

// ============================================================================
// Test service: counter
// ============================================================================

/// Method name of the test counter operation.
pub const INCREMENT_AND_GET: &str = "increment_and_get";

/// Request payload of the test counter operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncrementAndGetRequest {
    /// Amount added to the counter.
    pub delta: u64,
}

/// Response payload of the test counter operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncrementAndGetResponse {
    /// Counter value after the increment.
    pub value: u64,
}

/// Encode a counter request as an invocation payload.
pub fn increment_request(delta: u64) -> Result<Message, TestError> {
    let payload = AppMessage::encode(INCREMENT_AND_GET, &IncrementAndGetRequest { delta })
        .map_err(|e| TestError::Setup(format!("encode request: {e}")))?;
    Ok(Message::App(payload))
}

fn decode_counter_response(message: &Message) -> Result<IncrementAndGetResponse, TestError> {
    let app = message
        .as_app()
        .ok_or_else(|| TestError::Assertion(format!("expected app payload, got {message:?}")))?;
    app.decode()
        .map_err(|e| TestError::Assertion(format!("decode response: {e}")))
}

// ============================================================================
// Harness
// ============================================================================

/// Endpoint used by all scenarios.
pub fn test_endpoint() -> Endpoint {
    Endpoint::new("127.0.0.1", 9000)
}

/// Build an initialized service over a fresh in-proc transport.
///
/// Returns the transport handle too, so scenarios can keep scripting peers
/// after handing the transport to the service.
pub fn ready_service() -> Result<(ClientService<InProcTransport>, InProcTransport), TestError> {
    ready_service_with(RpcOptions::default())
}

/// [`ready_service`] with custom options.
pub fn ready_service_with(
    options: RpcOptions,
) -> Result<(ClientService<InProcTransport>, InProcTransport), TestError> {
    let transport = InProcTransport::new();
    let service = ClientService::new(transport.clone());
    service
        .init(options)
        .map_err(|e| TestError::Setup(format!("init failed: {e}")))?;
    Ok((service, transport))
}

// ============================================================================
// Closure probe
// ============================================================================

/// Records the single `(status, response)` delivery made to a
/// [`ResponseClosure`], and how often the closure fired.
pub struct ClosureProbe {
    slot: Arc<Mutex<Option<(Status, Option<Message>)>>>,
    fired: Arc<AtomicUsize>,
}

struct Recorder {
    slot: Arc<Mutex<Option<(Status, Option<Message>)>>>,
    fired: Arc<AtomicUsize>,
}

impl ResponseClosure for Recorder {
    fn complete(self: Box<Self>, status: Status, response: Option<Message>) {
        *self.slot.lock() = Some((status, response));
        self.fired.fetch_add(1, Ordering::SeqCst);
    }
}

impl ClosureProbe {
    /// A fresh probe plus the closure to hand to `invoke_with_done`.
    pub fn new() -> (Box<dyn ResponseClosure>, Self) {
        let probe = Self {
            slot: Arc::new(Mutex::new(None)),
            fired: Arc::new(AtomicUsize::new(0)),
        };
        let recorder = Recorder {
            slot: probe.slot.clone(),
            fired: probe.fired.clone(),
        };
        (Box::new(recorder), probe)
    }

    /// Await the closure's delivery, failing after two seconds.
    pub async fn wait(&self) -> Result<(Status, Option<Message>), TestError> {
        let start = tokio::time::Instant::now();
        while start.elapsed() < Duration::from_secs(2) {
            if let Some(delivery) = self.slot.lock().clone() {
                return Ok(delivery);
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        Err(TestError::Assertion(
            "closure was not invoked within 2s".into(),
        ))
    }

    /// How often the closure fired so far.
    pub fn fire_count(&self) -> usize {
        self.fired.load(Ordering::SeqCst)
    }

    /// True once the closure fired at least once.
    pub fn fired(&self) -> bool {
        self.fire_count() > 0
    }
}

// ============================================================================
// Submission-failure transport
// ============================================================================

/// Transport whose submissions always fail, for exercising the send-time
/// failure path of the client service. Accepted nowhere, delivers nothing.
#[derive(Clone)]
pub struct SubmitFailTransport {
    error: TransportError,
}

impl SubmitFailTransport {
    /// A transport failing every submission with `error`.
    pub fn new(error: TransportError) -> Self {
        Self { error }
    }
}

impl RpcTransport for SubmitFailTransport {
    fn start(&self) -> Result<(), TransportError> {
        Ok(())
    }

    fn shutdown(&self) {}

    fn send_async(
        &self,
        _address: &TransportAddress,
        _request: Message,
        _timeout: Duration,
        _callback: Box<dyn InvokeCallback>,
    ) -> Result<(), TransportError> {
        Err(self.error.clone())
    }

    fn send_sync(
        &self,
        _address: &TransportAddress,
        _request: Message,
        _timeout: Duration,
    ) -> impl std::future::Future<Output = Result<Message, TransportError>> + Send {
        let error = self.error.clone();
        async move { Err(error) }
    }

    fn check_connection(&self, _key: &str) -> bool {
        false
    }

    fn close_connection(&self, _key: &str) {}
}
