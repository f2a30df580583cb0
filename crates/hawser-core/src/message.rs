//! Wire messages exchanged with remote peers.
//!
//! The invocation layer only inspects message shape: an [`ErrorResponse`] is
//! an in-band application error, everything else is an opaque payload handed
//! through verbatim. How a transport moves these messages (framing, wire
//! serialization, pooling) is the transport's concern.

use core::fmt;

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::Status;

/// Connection probe sent by the client service when dialing a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingRequest {
    /// Wall-clock send time in milliseconds since the Unix epoch.
    pub send_timestamp_ms: u64,
}

impl PingRequest {
    /// A probe stamped with the current wall-clock time.
    pub fn now() -> Self {
        let send_timestamp_ms = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self { send_timestamp_ms }
    }
}

/// In-band application error from a remote peer.
///
/// Peers answer a [`PingRequest`] with an `ErrorResponse` of code 0, so
/// code 0 doubles as the probe's success reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorResponse {
    /// Application error code. 0 means success.
    pub code: i32,
    /// Human-readable detail, when the peer attached one.
    pub message: Option<String>,
}

impl ErrorResponse {
    /// The success response (code 0).
    pub fn success() -> Self {
        Self {
            code: 0,
            message: None,
        }
    }

    /// An error response with a code and message.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
        }
    }

    /// Translate into the [`Status`] delivered to result closures.
    pub fn to_status(&self) -> Status {
        if self.code == 0 {
            return Status::ok();
        }
        match &self.message {
            Some(message) => Status::error(self.code, message.clone()),
            None => Status::from_code(self.code),
        }
    }
}

/// Opaque application payload: a method name plus an encoded body.
///
/// The invocation layer never looks inside `body`; the [`encode`] and
/// [`decode`] helpers exist for callers and tests that want typed payloads
/// without bringing their own codec.
///
/// [`encode`]: AppMessage::encode
/// [`decode`]: AppMessage::decode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppMessage {
    /// Name of the remote operation this payload belongs to.
    pub method: String,
    /// Encoded payload body.
    pub body: Bytes,
}

impl AppMessage {
    /// Wrap an already-encoded body.
    pub fn new(method: impl Into<String>, body: Bytes) -> Self {
        Self {
            method: method.into(),
            body,
        }
    }

    /// Encode `value` as the payload body.
    pub fn encode<T: Serialize>(
        method: impl Into<String>,
        value: &T,
    ) -> Result<Self, CodecError> {
        let body = serde_json::to_vec(value).map_err(|e| CodecError::Encode(Box::new(e)))?;
        Ok(Self::new(method, Bytes::from(body)))
    }

    /// Decode the payload body.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, CodecError> {
        serde_json::from_slice(&self.body).map_err(|e| CodecError::Decode(Box::new(e)))
    }
}

/// Error type for payload encode/decode helpers.
#[derive(Debug)]
pub enum CodecError {
    /// Failed to encode a payload to bytes.
    Encode(Box<dyn std::error::Error + Send + Sync>),
    /// Failed to decode bytes to a payload.
    Decode(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::Encode(e) => write!(f, "encode error: {e}"),
            CodecError::Decode(e) => write!(f, "decode error: {e}"),
        }
    }
}

impl std::error::Error for CodecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CodecError::Encode(e) => Some(e.as_ref()),
            CodecError::Decode(e) => Some(e.as_ref()),
        }
    }
}

/// A message exchanged with a remote peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Connection probe.
    Ping(PingRequest),
    /// In-band application error.
    Error(ErrorResponse),
    /// Application payload, opaque to the invocation layer.
    App(AppMessage),
}

impl Message {
    /// The in-band application error carried by this message, if any.
    pub fn as_error(&self) -> Option<&ErrorResponse> {
        match self {
            Message::Error(e) => Some(e),
            _ => None,
        }
    }

    /// The application payload carried by this message, if any.
    pub fn as_app(&self) -> Option<&AppMessage> {
        match self {
            Message::App(m) => Some(m),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct TestPayload {
        value: u64,
    }

    #[test]
    fn encode_decode_round_trip() {
        let message = AppMessage::encode("get_value", &TestPayload { value: 42 }).unwrap();
        assert_eq!(message.method, "get_value");
        let decoded: TestPayload = message.decode().unwrap();
        assert_eq!(decoded, TestPayload { value: 42 });
    }

    #[test]
    fn decode_rejects_garbage() {
        let message = AppMessage::new("get_value", Bytes::from_static(b"not json"));
        assert!(message.decode::<TestPayload>().is_err());
    }

    #[test]
    fn error_response_maps_to_status() {
        assert!(ErrorResponse::success().to_status().is_ok());

        let status = ErrorResponse::new(1003, "not leader").to_status();
        assert_eq!(status.code(), 1003);
        assert_eq!(status.message(), Some("not leader"));

        let bare = ErrorResponse {
            code: 1004,
            message: None,
        };
        assert_eq!(bare.to_status().message(), None);
    }

    #[test]
    fn shape_accessors() {
        let err = Message::Error(ErrorResponse::success());
        assert!(err.as_error().is_some());
        assert!(err.as_app().is_none());

        let app = Message::App(AppMessage::new("m", Bytes::new()));
        assert!(app.as_error().is_none());
        assert!(app.as_app().is_some());
    }
}
