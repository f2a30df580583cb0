//! Error types for the invocation layer.

use core::fmt;

/// Faults surfaced by a transport implementation.
///
/// Kept cloneable so the same fault can be carried by an
/// [`InvokeFuture`](crate::InvokeFuture) for diagnostics and classified into
/// a [`Status`](crate::Status) for the closure, independently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The request did not complete within its deadline.
    Timeout {
        /// The deadline that elapsed, in milliseconds.
        timeout_ms: u64,
    },
    /// The peer could not be reached or the connection failed.
    Connection(String),
    /// The submitting task was interrupted before the transport accepted the
    /// request.
    Interrupted,
    /// The transport handle is not started or already shut down.
    Closed,
    /// Any other transport fault.
    Other(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout { timeout_ms } => {
                write!(f, "request timed out after {timeout_ms}ms")
            }
            Self::Connection(detail) => write!(f, "connection error: {detail}"),
            Self::Interrupted => write!(f, "sending was interrupted"),
            Self::Closed => write!(f, "transport closed"),
            Self::Other(detail) => write!(f, "{detail}"),
        }
    }
}

impl std::error::Error for TransportError {}

/// High-level invocation errors carried by [`InvokeFuture`](crate::InvokeFuture).
///
/// Transport faults reach the closure only as a [`Status`](crate::Status);
/// the future keeps the raw fault for callers that need the full detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcError {
    /// Raw transport fault, preserved for diagnostics.
    Transport(TransportError),
    /// The invocation was cancelled before a result was delivered.
    Cancelled,
    /// Operation attempted while the service is not in a usable state.
    IllegalState(&'static str),
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport error: {e}"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::IllegalState(detail) => write!(f, "illegal state: {detail}"),
        }
    }
}

impl std::error::Error for RpcError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TransportError> for RpcError {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn display_is_descriptive() {
        let e = TransportError::Timeout { timeout_ms: 500 };
        assert_eq!(e.to_string(), "request timed out after 500ms");

        let e = RpcError::Transport(TransportError::Connection("refused".into()));
        assert_eq!(e.to_string(), "transport error: connection error: refused");
    }

    #[test]
    fn transport_error_is_preserved_as_source() {
        let e = RpcError::from(TransportError::Closed);
        assert!(e.source().is_some());
        assert!(RpcError::Cancelled.source().is_none());
    }
}
