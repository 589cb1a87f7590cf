//! Trait defining the capability bundle implemented by concrete byte sources.

use std::io::SeekFrom;

use super::error::{StreamError, StreamResult};

/// Direction a stream was opened in. Reading and writing are mutually
/// exclusive per stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// The stream delivers bytes from the backend.
    Read,
    /// The stream stages bytes for delivery to the backend.
    Write,
}

/// A concrete byte source or sink behind a buffered stream.
///
/// Each operation is optional except [`close`](Backend::close); the default
/// bodies reject the call, which is how a backend declares that it lacks a
/// capability. The buffered layer never retries a rejected operation.
///
/// Contracts:
/// - `read` returns `Ok(0)` only at end-of-stream; short reads are permitted.
/// - `write` may accept fewer bytes than offered; the caller loops.
/// - `seek` returns the new absolute position.
pub trait Backend: Send {
    /// Identifier for diagnostics: the URL or path this backend was opened on.
    fn source_id(&self) -> &str;

    fn read(&mut self, _buf: &mut [u8]) -> StreamResult<usize> {
        Err(StreamError::unsupported("read"))
    }

    fn write(&mut self, _buf: &[u8]) -> StreamResult<usize> {
        Err(StreamError::unsupported("write"))
    }

    fn seek(&mut self, _pos: SeekFrom) -> StreamResult<u64> {
        Err(StreamError::NotSeekable(
            "backend does not support seeking".into(),
        ))
    }

    /// Push any bytes the backend itself is holding to durable storage.
    fn flush(&mut self) -> StreamResult<()> {
        Ok(())
    }

    /// Release the underlying resource. Called exactly once by the stream.
    fn close(&mut self) -> StreamResult<()>;
}
