//! End-to-end conformance for the client service over the in-proc transport.
//!
//! The scenarios live in `hawser-testkit`; this file only wires them to the
//! test runner.

use std::sync::Once;

static INIT: Once = Once::new();

fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .init();
    });
}

// Invocation scenarios

#[tokio::test(flavor = "multi_thread")]
async fn invoke_happy_path() {
    init_tracing();
    hawser_testkit::run_invoke_happy_path().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn invoke_application_error() {
    hawser_testkit::run_invoke_application_error().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn invoke_timeout() {
    hawser_testkit::run_invoke_timeout().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn invoke_transport_fault() {
    hawser_testkit::run_invoke_transport_fault().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn cancel_before_delivery() {
    hawser_testkit::run_cancel_before_delivery().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn cancel_race_is_single_shot() {
    hawser_testkit::run_cancel_race_is_single_shot().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn submission_failure_interrupted() {
    hawser_testkit::run_submission_failure_interrupted().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn submission_failure_fault() {
    hawser_testkit::run_submission_failure_fault().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn invoke_before_init() {
    hawser_testkit::run_invoke_before_init().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn closure_panic_is_isolated() {
    init_tracing();
    hawser_testkit::run_closure_panic_is_isolated().await;
}

// Connection scenarios

#[tokio::test(flavor = "multi_thread")]
async fn connect_probe_and_reuse() {
    hawser_testkit::run_connect_probe_and_reuse().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn connect_unreachable() {
    hawser_testkit::run_connect_unreachable().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn connect_rejected() {
    hawser_testkit::run_connect_rejected().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn connect_before_init() {
    hawser_testkit::run_connect_before_init().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn disconnect() {
    hawser_testkit::run_disconnect().await;
}

// Lifecycle scenarios

#[tokio::test(flavor = "multi_thread")]
async fn init_is_idempotent() {
    hawser_testkit::run_init_is_idempotent().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_is_idempotent_and_terminal() {
    hawser_testkit::run_shutdown_is_idempotent_and_terminal().await;
}
