//! Uniform buffered byte streams over heterogeneous sources.
//!
//! This module unifies local files, in-memory buffers, `data:` URLs, and
//! HTTP/HTTPS resources behind one buffered read/write/seek interface whose
//! offset semantics, peek behavior, and recovery guarantees are identical
//! across backends.
//!
//! # Features
//!
//! - **One API**: [`Hstream`] fronts every source with the same read, peek,
//!   write, seek, and tell operations.
//! - **Resumable HTTP**: a response that ends before the expected length is
//!   transparently reissued as a `Range: bytes=<next>-` request; callers see
//!   one continuous byte stream.
//! - **Pluggable backends**: anything implementing [`Backend`] can sit behind
//!   the buffer, with unsupported capabilities declared rather than faked.
//!
//! # Example
//!
//! ```no_run
//! use hstream::{Hstream, Mode};
//!
//! let mut f = Hstream::open("https://example.com/large.bin", Mode::Read)?;
//! let mut header = [0u8; 16];
//! let peeked = f.peek(&mut header)?;
//! assert!(peeked <= 16);
//! assert_eq!(f.tell(), 0); // peeking never moves the stream
//! # Ok::<(), hstream::StreamError>(())
//! ```

mod backend;
mod buffer;
mod error;
mod file;
mod http;
mod memory;

pub use backend::{Backend, Mode};
pub use buffer::{DEFAULT_CAPACITY, Hstream};
pub use error::{StreamError, StreamResult};
pub use file::FileBackend;
pub use http::{HttpAuthConfig, HttpBackend, HttpConfig};
pub use memory::{DataBackend, MemBackend, SharedMem};
