//! hawser: client-side RPC invocation for distributed peers.
//!
//! A [`ClientService`] issues asynchronous requests to remote peers over a
//! pluggable transport and bridges the transport's callback completion into
//! two channels the caller picks from: a cancellable [`InvokeFuture`] to
//! await, and an optional [`ResponseClosure`] fired exactly once with a
//! normalized [`Status`].
//!
//! # Quick Start
//!
//! ```ignore
//! use hawser::prelude::*;
//! use hawser_transport_mem::InProcTransport;
//!
//! let transport = InProcTransport::new();
//! let service = ClientService::new(transport.clone());
//! service.init(RpcOptions::default())?;
//!
//! let leader: Endpoint = "127.0.0.1:9000".parse()?;
//! if service.connect(&leader).await? {
//!     let request = Message::App(AppMessage::encode("increment_and_get", &req)?);
//!     let done = Box::new(|status: Status, response: Option<Message>| {
//!         println!("done: {status}");
//!     });
//!     let reply = service
//!         .invoke_with_done(&leader, request, Some(done), None)
//!         .await?;
//! }
//! service.shutdown();
//! ```
//!
//! # Error Handling
//!
//! Closures only ever observe a [`Status`]: transport faults are classified
//! (timeout, internal, interrupted) before delivery. The future keeps the
//! raw [`RpcError`] for callers that want full diagnostic detail, and an
//! in-band application error from the peer resolves the future with the raw
//! response rather than failing it.

#![forbid(unsafe_code)]

mod client;
mod dispatch;
mod options;

pub use client::ClientService;
pub use dispatch::{DispatchMetrics, DispatchPool};
pub use options::RpcOptions;

// Re-export the core contract so most callers need a single crate.
pub use hawser_core::*;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use hawser::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        AppMessage, ClientService, Endpoint, ErrorCode, ErrorResponse, InvokeFuture, Message,
        ResponseClosure, RpcError, RpcOptions, RpcTransport, Status,
    };
}
