//! Normalized outcome descriptors.

use core::fmt;

/// Well-known status codes produced by the invocation layer.
///
/// Code 0 is success. Codes 1-99 are reserved for the invocation layer
/// itself; remote peers carry their own application codes in-band
/// (conventionally 1000 and up) and those are surfaced verbatim through
/// [`Status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    /// No error.
    Ok = 0,
    /// The request did not complete within its deadline.
    TimedOut = 1,
    /// Transport fault not classified as a timeout.
    Internal = 2,
    /// The submission was interrupted locally before the transport accepted it.
    Interrupted = 3,
    /// Operation attempted on a service that is not initialized.
    IllegalState = 4,
}

impl ErrorCode {
    /// Look up a well-known code by its numeric value.
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Ok),
            1 => Some(Self::TimedOut),
            2 => Some(Self::Internal),
            3 => Some(Self::Interrupted),
            4 => Some(Self::IllegalState),
            _ => None,
        }
    }
}

impl From<ErrorCode> for i32 {
    fn from(code: ErrorCode) -> Self {
        code as i32
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::TimedOut => write!(f, "timed out"),
            Self::Internal => write!(f, "internal error"),
            Self::Interrupted => write!(f, "interrupted"),
            Self::IllegalState => write!(f, "illegal state"),
        }
    }
}

/// Result descriptor for a single RPC invocation: a code plus an optional
/// error message.
///
/// Invariant: `code == 0` iff the invocation succeeded, and `message` is only
/// present on error. A `Status` is immutable once constructed and cheap to
/// clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    code: i32,
    message: Option<String>,
}

impl Status {
    /// The success status.
    pub fn ok() -> Self {
        Self {
            code: 0,
            message: None,
        }
    }

    /// An error status with a code and a message.
    pub fn error(code: impl Into<i32>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: Some(message.into()),
        }
    }

    /// An error status carrying only a code.
    pub fn from_code(code: impl Into<i32>) -> Self {
        Self {
            code: code.into(),
            message: None,
        }
    }

    /// True when the code is 0.
    pub fn is_ok(&self) -> bool {
        self.code == 0
    }

    /// The numeric code.
    pub fn code(&self) -> i32 {
        self.code
    }

    /// The error message, if one was attached.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ok() {
            return write!(f, "ok");
        }
        match &self.message {
            Some(message) => write!(f, "error {}: {}", self.code, message),
            None => write!(f, "error {}", self.code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_has_code_zero_and_no_message() {
        let status = Status::ok();
        assert!(status.is_ok());
        assert_eq!(status.code(), 0);
        assert_eq!(status.message(), None);
        assert_eq!(status.to_string(), "ok");
    }

    #[test]
    fn error_carries_code_and_message() {
        let status = Status::error(ErrorCode::TimedOut, "deadline elapsed");
        assert!(!status.is_ok());
        assert_eq!(status.code(), 1);
        assert_eq!(status.message(), Some("deadline elapsed"));
        assert_eq!(status.to_string(), "error 1: deadline elapsed");
    }

    #[test]
    fn application_codes_pass_through() {
        let status = Status::error(1003, "not leader");
        assert_eq!(status.code(), 1003);
        assert_eq!(ErrorCode::from_i32(1003), None);
    }

    #[test]
    fn well_known_codes_round_trip() {
        for code in [
            ErrorCode::Ok,
            ErrorCode::TimedOut,
            ErrorCode::Internal,
            ErrorCode::Interrupted,
            ErrorCode::IllegalState,
        ] {
            assert_eq!(ErrorCode::from_i32(code as i32), Some(code));
        }
        assert_eq!(ErrorCode::from_i32(99), None);
    }
}
