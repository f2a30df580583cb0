//! Scripted peers for the in-proc transport.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use hawser_core::{AppMessage, ErrorResponse, Message, TransportError};
use hawser_transport_mem::PeerHandler;

use crate::{INCREMENT_AND_GET, IncrementAndGetRequest, IncrementAndGetResponse};

/// Wrap `handler` with the standard peer behavior of answering connection
/// probes with a success [`ErrorResponse`]. Non-probe traffic passes through.
pub fn with_ping_support(handler: PeerHandler) -> PeerHandler {
    Box::new(move |request| match request {
        Message::Ping(_) => Box::pin(async { Ok(Message::Error(ErrorResponse::success())) }),
        other => handler(other),
    })
}

/// A counter peer: answers probes, applies `delta` from each
/// `increment_and_get` request to its counter and replies with the new
/// value. Anything else earns an in-band application error.
pub fn counter_peer(initial: u64) -> PeerHandler {
    let value = Arc::new(AtomicU64::new(initial));
    with_ping_support(Box::new(move |request| {
        let value = value.clone();
        Box::pin(async move {
            let app = match request.as_app() {
                Some(app) => app.clone(),
                None => {
                    return Ok(Message::Error(ErrorResponse::new(
                        1000,
                        "unsupported message",
                    )));
                }
            };
            if app.method != INCREMENT_AND_GET {
                return Ok(Message::Error(ErrorResponse::new(
                    1001,
                    format!("unknown method {}", app.method),
                )));
            }
            let request: IncrementAndGetRequest = match app.decode() {
                Ok(request) => request,
                Err(e) => {
                    return Ok(Message::Error(ErrorResponse::new(1002, e.to_string())));
                }
            };
            let value = value.fetch_add(request.delta, Ordering::SeqCst) + request.delta;
            let reply = AppMessage::encode(INCREMENT_AND_GET, &IncrementAndGetResponse { value })
                .map_err(|e| TransportError::Other(e.to_string()))?;
            Ok(Message::App(reply))
        })
    }))
}

/// A peer that answers probes but replies to every request with the given
/// in-band application error.
pub fn error_peer(code: i32, message: &str) -> PeerHandler {
    let message = message.to_string();
    with_ping_support(Box::new(move |_| {
        let response = ErrorResponse::new(code, message.clone());
        Box::pin(async move { Ok(Message::Error(response)) })
    }))
}

/// A peer whose replies fail at the transport level.
pub fn faulty_peer(error: TransportError) -> PeerHandler {
    with_ping_support(Box::new(move |_| {
        let error = error.clone();
        Box::pin(async move { Err(error) })
    }))
}

/// A peer that rejects connection probes with a nonzero code.
pub fn ping_rejecting_peer(code: i32, message: &str) -> PeerHandler {
    let message = message.to_string();
    Box::new(move |_| {
        let response = ErrorResponse::new(code, message.clone());
        Box::pin(async move { Ok(Message::Error(response)) })
    })
}

/// Delay every request to `inner` by `delay`.
pub fn slow_peer(delay: Duration, inner: PeerHandler) -> PeerHandler {
    let inner = Arc::new(inner);
    Box::new(move |request| {
        let inner = inner.clone();
        Box::pin(async move {
            tokio::time::sleep(delay).await;
            inner(request).await
        })
    })
}
