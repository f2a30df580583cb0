//! Shared end-to-end scenarios for the client service.
//!
//! Each public `run_*` function panics on failure so consuming crates can
//! wrap it in a bare `#[tokio::test]`.

use std::time::Duration;

use hawser::{ClientService, RpcOptions};
use hawser_core::{ErrorCode, ErrorResponse, Message, RpcError, TransportError};
use hawser_transport_mem::InProcTransport;

use crate::{
    ClosureProbe, SubmitFailTransport, TestError, counter_peer, decode_counter_response, ensure,
    error_peer, faulty_peer, increment_request, ping_rejecting_peer, ready_service,
    ready_service_with, slow_peer, test_endpoint,
};

// ============================================================================
// Invocation scenarios
// ============================================================================

/// Happy path: a counter peer applies `delta = 5` on top of 37 and both
/// completion channels observe `{value: 42}`.
pub async fn run_invoke_happy_path() {
    if let Err(e) = run_invoke_happy_path_inner().await {
        panic!("run_invoke_happy_path failed: {e}");
    }
}

async fn run_invoke_happy_path_inner() -> Result<(), TestError> {
    let (service, transport) = ready_service()?;
    let endpoint = test_endpoint();
    transport.register_peer(endpoint.connection_key(), counter_peer(37));

    let (done, probe) = ClosureProbe::new();
    let future = service.invoke_with_done(&endpoint, increment_request(5)?, Some(done), None);

    let reply = future.await?;
    let response = decode_counter_response(&reply)?;
    ensure(
        response.value == 42,
        format!("expected future value 42, got {}", response.value),
    )?;

    let (status, payload) = probe.wait().await?;
    ensure(status.is_ok(), format!("expected ok status, got {status}"))?;
    let payload = payload.ok_or_else(|| TestError::Assertion("closure got no payload".into()))?;
    let response = decode_counter_response(&payload)?;
    ensure(
        response.value == 42,
        format!("expected closure value 42, got {}", response.value),
    )?;

    tokio::time::sleep(Duration::from_millis(20)).await;
    ensure(
        probe.fire_count() == 1,
        format!("closure fired {} times", probe.fire_count()),
    )?;
    Ok(())
}

/// An in-band application error reaches the closure as its status while the
/// future still resolves with the raw response.
pub async fn run_invoke_application_error() {
    if let Err(e) = run_invoke_application_error_inner().await {
        panic!("run_invoke_application_error failed: {e}");
    }
}

async fn run_invoke_application_error_inner() -> Result<(), TestError> {
    let (service, transport) = ready_service()?;
    let endpoint = test_endpoint();
    transport.register_peer(endpoint.connection_key(), error_peer(1003, "not leader"));

    let (done, probe) = ClosureProbe::new();
    let future = service.invoke_with_done(&endpoint, increment_request(5)?, Some(done), None);

    // The future resolves with the raw error response, it does not fail.
    let reply = future.await?;
    ensure(
        reply == Message::Error(ErrorResponse::new(1003, "not leader")),
        format!("unexpected future resolution: {reply:?}"),
    )?;

    let (status, payload) = probe.wait().await?;
    ensure(status.code() == 1003, format!("unexpected status {status}"))?;
    ensure(
        status.message() == Some("not leader"),
        format!("unexpected status message {:?}", status.message()),
    )?;
    ensure(payload.is_none(), "error status must not carry a payload")?;
    Ok(())
}

/// A request against an unreachable peer with a tiny deadline fails the
/// future and classifies as a timeout for the closure.
pub async fn run_invoke_timeout() {
    if let Err(e) = run_invoke_timeout_inner().await {
        panic!("run_invoke_timeout failed: {e}");
    }
}

async fn run_invoke_timeout_inner() -> Result<(), TestError> {
    let (service, _transport) = ready_service()?;
    let endpoint = test_endpoint();

    let (done, probe) = ClosureProbe::new();
    let future = service.invoke_with_done(
        &endpoint,
        increment_request(1)?,
        Some(done),
        Some(Duration::from_millis(10)),
    );

    match future.await {
        Err(RpcError::Transport(TransportError::Timeout { timeout_ms: 10 })) => {}
        other => {
            return Err(TestError::Assertion(format!(
                "expected timeout failure, got {other:?}"
            )));
        }
    }

    let (status, payload) = probe.wait().await?;
    ensure(
        status.code() == ErrorCode::TimedOut as i32,
        format!("expected timed out status, got {status}"),
    )?;
    ensure(payload.is_none(), "timeout must not carry a payload")?;
    Ok(())
}

/// A non-timeout transport fault classifies as internal.
pub async fn run_invoke_transport_fault() {
    if let Err(e) = run_invoke_transport_fault_inner().await {
        panic!("run_invoke_transport_fault failed: {e}");
    }
}

async fn run_invoke_transport_fault_inner() -> Result<(), TestError> {
    let (service, transport) = ready_service()?;
    let endpoint = test_endpoint();
    transport.register_peer(
        endpoint.connection_key(),
        faulty_peer(TransportError::Connection("connection reset".into())),
    );

    let (done, probe) = ClosureProbe::new();
    let future = service.invoke_with_done(&endpoint, increment_request(1)?, Some(done), None);

    match future.await {
        Err(RpcError::Transport(TransportError::Connection(detail))) => {
            ensure(
                detail == "connection reset",
                format!("unexpected fault detail {detail:?}"),
            )?;
        }
        other => {
            return Err(TestError::Assertion(format!(
                "expected connection failure, got {other:?}"
            )));
        }
    }

    let (status, _) = probe.wait().await?;
    ensure(
        status.code() == ErrorCode::Internal as i32,
        format!("expected internal status, got {status}"),
    )?;
    ensure(
        status
            .message()
            .is_some_and(|m| m.starts_with("RPC exception:")),
        format!("unexpected status message {:?}", status.message()),
    )?;
    Ok(())
}

/// Cancelling before transport delivery suppresses the closure entirely and
/// leaves the future cancelled.
pub async fn run_cancel_before_delivery() {
    if let Err(e) = run_cancel_before_delivery_inner().await {
        panic!("run_cancel_before_delivery failed: {e}");
    }
}

async fn run_cancel_before_delivery_inner() -> Result<(), TestError> {
    let (service, transport) = ready_service()?;
    let endpoint = test_endpoint();
    transport.register_peer(
        endpoint.connection_key(),
        slow_peer(Duration::from_millis(200), counter_peer(0)),
    );

    let (done, probe) = ClosureProbe::new();
    let future = service.invoke_with_done(&endpoint, increment_request(1)?, Some(done), None);

    ensure(future.cancel(), "cancel should win the pending future")?;
    ensure(
        future.clone().await == Err(RpcError::Cancelled),
        "future must report cancellation",
    )?;

    // Let the delayed delivery happen; it has to be dropped.
    tokio::time::sleep(Duration::from_millis(300)).await;
    ensure(!probe.fired(), "closure ran after cancellation")?;
    ensure(future.is_cancelled(), "future lost its cancelled state")?;
    Ok(())
}

/// A cancel racing the response still yields at most one closure delivery
/// and a future that either resolved or reports cancellation.
pub async fn run_cancel_race_is_single_shot() {
    if let Err(e) = run_cancel_race_is_single_shot_inner().await {
        panic!("run_cancel_race_is_single_shot failed: {e}");
    }
}

async fn run_cancel_race_is_single_shot_inner() -> Result<(), TestError> {
    let (service, transport) = ready_service()?;
    let endpoint = test_endpoint();
    transport.register_peer(endpoint.connection_key(), counter_peer(0));

    for round in 0..25 {
        let (done, probe) = ClosureProbe::new();
        let future = service.invoke_with_done(&endpoint, increment_request(1)?, Some(done), None);

        let canceller = future.clone();
        let racer = tokio::spawn(async move { canceller.cancel() });

        let outcome = future.await;
        racer
            .await
            .map_err(|e| TestError::Setup(format!("cancel task panicked: {e}")))?;

        match outcome {
            Ok(_) | Err(RpcError::Cancelled) => {}
            other => {
                return Err(TestError::Assertion(format!(
                    "round {round}: unexpected outcome {other:?}"
                )));
            }
        }

        tokio::time::sleep(Duration::from_millis(5)).await;
        ensure(
            probe.fire_count() <= 1,
            format!("round {round}: closure fired {} times", probe.fire_count()),
        )?;
    }
    Ok(())
}

/// An interrupted submission fails the future on the spot and notifies the
/// closure with an interrupted status, off the caller's thread.
pub async fn run_submission_failure_interrupted() {
    if let Err(e) =
        run_submission_failure_inner(TransportError::Interrupted, ErrorCode::Interrupted).await
    {
        panic!("run_submission_failure_interrupted failed: {e}");
    }
}

/// Any other send-time fault fails the future on the spot and notifies the
/// closure with an internal status.
pub async fn run_submission_failure_fault() {
    if let Err(e) = run_submission_failure_inner(
        TransportError::Connection("dial refused".into()),
        ErrorCode::Internal,
    )
    .await
    {
        panic!("run_submission_failure_fault failed: {e}");
    }
}

async fn run_submission_failure_inner(
    error: TransportError,
    expected: ErrorCode,
) -> Result<(), TestError> {
    let service = ClientService::new(SubmitFailTransport::new(error.clone()));
    service
        .init(RpcOptions::default())
        .map_err(|e| TestError::Setup(format!("init failed: {e}")))?;

    let (done, probe) = ClosureProbe::new();
    let future = service.invoke_with_done(&test_endpoint(), increment_request(1)?, Some(done), None);

    // The failure is synchronous: the returned future is already resolved.
    ensure(future.is_done(), "future must fail before invoke returns")?;
    ensure(
        future.clone().await == Err(RpcError::Transport(error)),
        "future must carry the raw submission fault",
    )?;

    let (status, payload) = probe.wait().await?;
    ensure(
        status.code() == expected as i32,
        format!("expected {expected} status, got {status}"),
    )?;
    ensure(payload.is_none(), "submission failure carries no payload")?;
    Ok(())
}

/// Invoking before `init` fails the future synchronously with an
/// illegal-state error and still notifies the closure.
pub async fn run_invoke_before_init() {
    if let Err(e) = run_invoke_before_init_inner().await {
        panic!("run_invoke_before_init failed: {e}");
    }
}

async fn run_invoke_before_init_inner() -> Result<(), TestError> {
    let service = ClientService::new(InProcTransport::new());

    let (done, probe) = ClosureProbe::new();
    let future = service.invoke_with_done(&test_endpoint(), increment_request(1)?, Some(done), None);

    ensure(future.is_done(), "future must fail before invoke returns")?;
    match future.await {
        Err(RpcError::IllegalState(_)) => {}
        other => {
            return Err(TestError::Assertion(format!(
                "expected illegal state, got {other:?}"
            )));
        }
    }

    let (status, _) = probe.wait().await?;
    ensure(
        status.code() == ErrorCode::IllegalState as i32,
        format!("expected illegal state status, got {status}"),
    )?;
    Ok(())
}

/// A panicking closure is isolated: the future still resolves and the
/// service keeps serving later invocations.
pub async fn run_closure_panic_is_isolated() {
    if let Err(e) = run_closure_panic_is_isolated_inner().await {
        panic!("run_closure_panic_is_isolated failed: {e}");
    }
}

async fn run_closure_panic_is_isolated_inner() -> Result<(), TestError> {
    let (service, transport) = ready_service()?;
    let endpoint = test_endpoint();
    transport.register_peer(endpoint.connection_key(), counter_peer(0));

    let exploding = Box::new(|_status: hawser_core::Status, _response: Option<Message>| {
        panic!("closure exploded")
    });
    let future = service.invoke_with_done(&endpoint, increment_request(1)?, Some(exploding), None);
    future.await?;

    let (done, probe) = ClosureProbe::new();
    let future = service.invoke_with_done(&endpoint, increment_request(1)?, Some(done), None);
    future.await?;
    let (status, _) = probe.wait().await?;
    ensure(
        status.is_ok(),
        "service must keep serving after a closure panic",
    )?;
    Ok(())
}

// ============================================================================
// Connection scenarios
// ============================================================================

/// A probe connects once; a second `connect` reuses the live connection
/// without any network traffic.
pub async fn run_connect_probe_and_reuse() {
    if let Err(e) = run_connect_probe_and_reuse_inner().await {
        panic!("run_connect_probe_and_reuse failed: {e}");
    }
}

async fn run_connect_probe_and_reuse_inner() -> Result<(), TestError> {
    let (service, transport) = ready_service()?;
    let endpoint = test_endpoint();
    transport.register_peer(endpoint.connection_key(), counter_peer(0));

    ensure(!service.is_connected(&endpoint), "fresh peer looks connected")?;
    ensure(service.connect(&endpoint).await?, "connect should succeed")?;
    ensure(service.is_connected(&endpoint), "probe must mark the connection live")?;

    let probes = transport.round_trip_count();
    ensure(service.connect(&endpoint).await?, "reconnect should succeed")?;
    ensure(
        transport.round_trip_count() == probes,
        "connect on a live connection must not touch the network",
    )?;
    Ok(())
}

/// Connecting to an unreachable peer reports false, not an error.
pub async fn run_connect_unreachable() {
    if let Err(e) = run_connect_unreachable_inner().await {
        panic!("run_connect_unreachable failed: {e}");
    }
}

async fn run_connect_unreachable_inner() -> Result<(), TestError> {
    let options = RpcOptions {
        rpc_connect_timeout: Duration::from_millis(50),
        ..RpcOptions::default()
    };
    let (service, _transport) = ready_service_with(options)?;
    ensure(
        !service.connect(&test_endpoint()).await?,
        "unreachable peer must not connect",
    )?;
    Ok(())
}

/// A peer rejecting the probe with a nonzero code reports false.
pub async fn run_connect_rejected() {
    if let Err(e) = run_connect_rejected_inner().await {
        panic!("run_connect_rejected failed: {e}");
    }
}

async fn run_connect_rejected_inner() -> Result<(), TestError> {
    let (service, transport) = ready_service()?;
    let endpoint = test_endpoint();
    transport.register_peer(
        endpoint.connection_key(),
        ping_rejecting_peer(1086, "still joining"),
    );
    ensure(
        !service.connect(&endpoint).await?,
        "rejected probe must not connect",
    )?;
    Ok(())
}

/// Connecting before `init` is a programming error and signals immediately.
pub async fn run_connect_before_init() {
    if let Err(e) = run_connect_before_init_inner().await {
        panic!("run_connect_before_init failed: {e}");
    }
}

async fn run_connect_before_init_inner() -> Result<(), TestError> {
    let service = ClientService::new(InProcTransport::new());
    match service.connect(&test_endpoint()).await {
        Err(RpcError::IllegalState(_)) => Ok(()),
        other => Err(TestError::Assertion(format!(
            "expected illegal state, got {other:?}"
        ))),
    }
}

/// Disconnect always succeeds and drops the live connection.
pub async fn run_disconnect() {
    if let Err(e) = run_disconnect_inner().await {
        panic!("run_disconnect failed: {e}");
    }
}

async fn run_disconnect_inner() -> Result<(), TestError> {
    let (service, transport) = ready_service()?;
    let endpoint = test_endpoint();
    transport.register_peer(endpoint.connection_key(), counter_peer(0));

    ensure(service.connect(&endpoint).await?, "connect should succeed")?;
    ensure(service.disconnect(&endpoint), "disconnect reports success")?;
    ensure(!service.is_connected(&endpoint), "connection must be gone")?;
    ensure(
        service.disconnect(&endpoint),
        "repeated disconnect reports success",
    )?;
    Ok(())
}

// ============================================================================
// Lifecycle scenarios
// ============================================================================

/// `init` is idempotent and starts the transport exactly once.
pub async fn run_init_is_idempotent() {
    if let Err(e) = run_init_is_idempotent_inner().await {
        panic!("run_init_is_idempotent failed: {e}");
    }
}

async fn run_init_is_idempotent_inner() -> Result<(), TestError> {
    let transport = InProcTransport::new();
    let service = ClientService::new(transport.clone());

    service
        .init(RpcOptions::default())
        .map_err(|e| TestError::Setup(format!("first init failed: {e}")))?;
    service
        .init(RpcOptions::default())
        .map_err(|e| TestError::Setup(format!("second init failed: {e}")))?;

    ensure(
        transport.start_count() == 1,
        format!("transport started {} times", transport.start_count()),
    )?;
    Ok(())
}

/// `shutdown` is idempotent and terminal: the service cannot come back.
pub async fn run_shutdown_is_idempotent_and_terminal() {
    if let Err(e) = run_shutdown_is_idempotent_and_terminal_inner().await {
        panic!("run_shutdown_is_idempotent_and_terminal failed: {e}");
    }
}

async fn run_shutdown_is_idempotent_and_terminal_inner() -> Result<(), TestError> {
    let (service, transport) = ready_service()?;
    let endpoint = test_endpoint();
    transport.register_peer(endpoint.connection_key(), counter_peer(0));

    service.shutdown();
    service.shutdown();
    ensure(!transport.is_started(), "transport must be released")?;

    match service.init(RpcOptions::default()) {
        Err(RpcError::IllegalState(_)) => {}
        other => {
            return Err(TestError::Assertion(format!(
                "expected illegal state on re-init, got {other:?}"
            )));
        }
    }

    let future = service.invoke_with_done(&endpoint, increment_request(1)?, None, None);
    match future.await {
        Err(RpcError::IllegalState(_)) => {}
        other => {
            return Err(TestError::Assertion(format!(
                "expected illegal state on invoke, got {other:?}"
            )));
        }
    }
    ensure(
        !service.is_connected(&endpoint),
        "a shut-down service has no connections",
    )?;
    Ok(())
}
