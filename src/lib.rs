//! # hstream
//!
//! Uniform buffered byte streams over files, memory, and resumable HTTP.
//!
//! Higher-level binary-format readers want to consume local files, in-memory
//! buffers, and remote resources through a single API. The [`Hstream`] type
//! provides that API: a single-buffer stream with explicit offset accounting,
//! non-destructive peek, and per-stream sticky errors, over whichever
//! [`Backend`] the URL selects. The HTTP backend recovers from truncated
//! responses by reissuing byte-range requests, so flaky CDNs look like
//! ordinary files.
//!
//! ```
//! use hstream::{Hstream, Mode};
//!
//! let mut f = Hstream::open("data:hello, world!\n", Mode::Read)?;
//! let mut buf = [0u8; 64];
//! let n = f.read(&mut buf)?;
//! assert_eq!(&buf[..n], b"hello, world!\n");
//! # Ok::<(), hstream::StreamError>(())
//! ```

pub mod stream;

pub use stream::{
    Backend, DEFAULT_CAPACITY, DataBackend, FileBackend, Hstream, HttpAuthConfig, HttpBackend,
    HttpConfig, MemBackend, Mode, SharedMem, StreamError, StreamResult,
};
