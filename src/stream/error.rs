//! Error types for stream operations.

use std::io;

use thiserror::Error;

/// Result type for stream operations.
pub type StreamResult<T> = std::result::Result<T, StreamError>;

/// Errors that can occur while opening or operating on a stream.
///
/// Unlike error types that embed their sources, every variant here is `Clone`:
/// the buffered layer keeps the first error it sees and returns a copy of it
/// from every subsequent call on the stream, so source errors are mapped to a
/// variant (and a message) at the point where they occur.
#[derive(Debug, Clone, Error)]
pub enum StreamError {
    /// The resource does not exist (HTTP 404/410, ENOENT).
    #[error("not found: {0}")]
    NotFound(String),

    /// Access to the resource was refused (HTTP 401/403/407, EACCES).
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The operation timed out (HTTP 408/504, or a transport timeout).
    #[error("timed out: {0}")]
    Timeout(String),

    /// The resource is temporarily unavailable (HTTP 503).
    #[error("temporarily unavailable: {0}")]
    TryAgain(String),

    /// Malformed URL, unusable argument, or an HTTP 4xx with no better mapping.
    #[error("invalid: {0}")]
    Invalid(String),

    /// The backend cannot seek, or cannot seek the way that was asked.
    #[error("not seekable: {0}")]
    NotSeekable(String),

    /// The operation is not supported by this stream or its backend.
    #[error("unsupported operation: {op}")]
    Unsupported {
        /// Name of the rejected operation
        op: &'static str,
    },

    /// Any other transport, filesystem, or allocation failure.
    #[error("I/O error: {0}")]
    Io(String),

    /// A remote response ended short of the expected length and could not be
    /// resumed.
    #[error("response truncated at byte {offset}")]
    Truncated {
        /// Absolute stream offset of the last byte that was delivered
        offset: u64,
    },
}

impl StreamError {
    pub(crate) fn unsupported(op: &'static str) -> Self {
        StreamError::Unsupported { op }
    }
}

impl From<io::Error> for StreamError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::NotFound => StreamError::NotFound(e.to_string()),
            io::ErrorKind::PermissionDenied => StreamError::PermissionDenied(e.to_string()),
            io::ErrorKind::TimedOut => StreamError::Timeout(e.to_string()),
            _ => StreamError::Io(e.to_string()),
        }
    }
}

impl From<StreamError> for io::Error {
    fn from(e: StreamError) -> Self {
        let kind = match &e {
            StreamError::NotFound(_) => io::ErrorKind::NotFound,
            StreamError::PermissionDenied(_) => io::ErrorKind::PermissionDenied,
            StreamError::Timeout(_) => io::ErrorKind::TimedOut,
            StreamError::TryAgain(_) => io::ErrorKind::WouldBlock,
            StreamError::Invalid(_) => io::ErrorKind::InvalidInput,
            StreamError::NotSeekable(_) | StreamError::Unsupported { .. } => {
                io::ErrorKind::Unsupported
            }
            StreamError::Io(_) => io::ErrorKind::Other,
            StreamError::Truncated { .. } => io::ErrorKind::UnexpectedEof,
        };
        io::Error::new(kind, e.to_string())
    }
}
