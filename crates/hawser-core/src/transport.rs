//! The transport contract consumed by the client service.
//!
//! The wire transport is an external collaborator. The service only needs a
//! narrow surface: submit a request and get called back once, probe a peer
//! synchronously, and check or close a connection by its key. Everything
//! else (pooling, framing, reconnection, wire serialization) stays behind
//! this boundary.

use core::fmt;
use std::future::Future;
use std::time::Duration;

use crate::{Message, TransportError};

/// Address in the transport's own scheme, resolved from an
/// [`Endpoint`](crate::Endpoint).
///
/// Carries the dialable URI alongside the stable connection key so both are
/// derived exactly once per invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransportAddress {
    uri: String,
    key: String,
}

impl TransportAddress {
    /// Create an address from a dialable URI and its connection key.
    pub fn new(uri: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            key: key.into(),
        }
    }

    /// The dialable URI.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// The connection key, matching the endpoint's stable string form.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for TransportAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uri)
    }
}

/// Completion callback handed to [`RpcTransport::send_async`].
///
/// A transport delivers exactly one of `on_response`/`on_exception` per
/// accepted submission; consuming `Box<Self>` makes a second delivery
/// impossible. Either may run on the transport's own I/O context, so
/// implementations must not block it.
pub trait InvokeCallback: Send + 'static {
    /// The peer answered with `response` before the deadline.
    fn on_response(self: Box<Self>, response: Message);

    /// The request failed after submission (timeout, connection fault, ...).
    fn on_exception(self: Box<Self>, error: TransportError);
}

/// Narrow contract over the wire transport.
pub trait RpcTransport: Send + Sync + 'static {
    /// Start the transport. The service calls this once during `init`; it is
    /// the only step of initialization that can fail.
    fn start(&self) -> Result<(), TransportError>;

    /// Release the transport's resources. Idempotent.
    fn shutdown(&self);

    /// Submit `request` for asynchronous delivery to `address`.
    ///
    /// Returns an error only when the submission itself fails, in which case
    /// the callback is dropped without being invoked. An accepted submission
    /// invokes the callback exactly once, within `timeout`.
    fn send_async(
        &self,
        address: &TransportAddress,
        request: Message,
        timeout: Duration,
        callback: Box<dyn InvokeCallback>,
    ) -> Result<(), TransportError>;

    /// Send `request` and await the peer's reply. Used by the connect probe.
    fn send_sync(
        &self,
        address: &TransportAddress,
        request: Message,
        timeout: Duration,
    ) -> impl Future<Output = Result<Message, TransportError>> + Send;

    /// Liveness of the connection identified by `key`. No side effects.
    fn check_connection(&self, key: &str) -> bool;

    /// Close the connection identified by `key`, if one exists.
    fn close_connection(&self, key: &str);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_exposes_uri_and_key() {
        let address = TransportAddress::new("hawser://127.0.0.1:9000", "127.0.0.1:9000");
        assert_eq!(address.uri(), "hawser://127.0.0.1:9000");
        assert_eq!(address.key(), "127.0.0.1:9000");
        assert_eq!(address.to_string(), "hawser://127.0.0.1:9000");
    }
}
