//! Host-side error types for the Kiln bridge.
//!
//! `FetchError` covers everything a `ResourceSource` can report when asked
//! for bytes. `BackendError` is what a drawing backend returns when it
//! rejects a call; the bridge forwards it to the log and never interprets it.

use std::io;

/// Failure to fetch bytes from a resource source.
///
/// Guests see the `i32` code via [`code`](FetchError::code) in their
/// failure callback.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Nothing exists at the requested path.
    #[error("resource not found: {0}")]
    NotFound(String),

    /// The path is absolute, escapes the root, or is otherwise unusable.
    #[error("invalid resource path: {0}")]
    InvalidPath(String),

    /// The backing store failed while reading.
    #[error("i/o error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl FetchError {
    /// Code handed to the guest's `file_failed` callback.
    pub fn code(&self) -> i32 {
        match self {
            Self::NotFound(_) => 1,
            Self::InvalidPath(_) => 2,
            Self::Io { .. } => 3,
        }
    }
}

/// Guest-visible failure code for a fetch whose payload could not be copied
/// into guest memory (the guest allocator returned null).
pub const FETCH_ALLOCATION_FAILED: i32 = 4;

/// A drawing backend rejected an operation.
///
/// `code` follows the GL error enumeration where one applies
/// (e.g. `0x0502` for `INVALID_OPERATION`); 2D surfaces use `0`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("backend error 0x{code:04X}: {message}")]
pub struct BackendError {
    pub code: u32,
    pub message: String,
}

impl BackendError {
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Create an `INVALID_OPERATION` error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::new(crate::types::gl::INVALID_OPERATION, message)
    }

    /// Create an `INVALID_VALUE` error.
    pub fn invalid_value(message: impl Into<String>) -> Self {
        Self::new(crate::types::gl::INVALID_VALUE, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_codes() {
        assert_eq!(FetchError::NotFound("a".into()).code(), 1);
        assert_eq!(FetchError::InvalidPath("../a".into()).code(), 2);
        let io_err = FetchError::Io {
            path: "a".into(),
            source: io::Error::new(io::ErrorKind::Other, "disk"),
        };
        assert_eq!(io_err.code(), 3);
        assert_ne!(FETCH_ALLOCATION_FAILED, io_err.code());
    }

    #[test]
    fn test_backend_error_display() {
        let err = BackendError::invalid_operation("no program in use");
        let s = format!("{}", err);
        assert!(s.contains("0x0502"));
        assert!(s.contains("no program in use"));
    }
}
