//! Buffered stream layer and URL dispatcher.

#![allow(clippy::cast_possible_truncation)]

use std::io::{self, SeekFrom};

use super::backend::{Backend, Mode};
use super::error::{StreamError, StreamResult};
use super::file::FileBackend;
use super::http::{HttpBackend, HttpConfig};
use super::memory::{DataBackend, MemBackend, SharedMem};

/// Default buffer capacity in bytes.
pub const DEFAULT_CAPACITY: usize = 32 * 1024;

/// Buffered byte stream over a [`Backend`].
///
/// One `Hstream` owns exactly one backend and a single fixed-capacity buffer
/// used for whichever direction the stream was opened in. The live bytes
/// occupy `buffer[begin..end]`; `offset` is the absolute stream position of
/// `buffer[begin]`, so the caller's position is `offset` when reading and
/// `offset + (end - begin)` when writing (pending bytes not yet delivered).
///
/// The first error any operation hits is kept; every later call fails with a
/// copy of it until the stream is closed. Closing always releases the backend
/// even when a final flush fails.
///
/// # Example
///
/// ```
/// use hstream::{Hstream, Mode};
///
/// let mut f = Hstream::open("data:hello, world!\n", Mode::Read)?;
/// let mut buf = [0u8; 300];
/// let n = f.read(&mut buf)?;
/// assert_eq!(&buf[..n], b"hello, world!\n");
/// f.close()?;
/// # Ok::<(), hstream::StreamError>(())
/// ```
pub struct Hstream {
    buffer: Box<[u8]>,
    begin: usize,
    end: usize,
    /// Absolute stream position of `buffer[begin]`.
    offset: u64,
    mode: Mode,
    at_eof: bool,
    err: Option<StreamError>,
    backend: Box<dyn Backend>,
    closed: bool,
}

impl std::fmt::Debug for Hstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hstream")
            .field("source", &self.backend.source_id())
            .field("offset", &self.offset)
            .field("mode", &self.mode)
            .field("at_eof", &self.at_eof)
            .field("err", &self.err)
            .field("closed", &self.closed)
            .finish()
    }
}

impl Hstream {
    /// Opens a stream, selecting the backend by URL prefix:
    ///
    /// - `data:` — in-memory read of the literal bytes after the prefix
    /// - `mem:` — read/write against the [`SharedMem`] buffer registered
    ///   under this URL (see [`SharedMem::register`]; [`Hstream::open_mem`]
    ///   reaches a handle without going through a URL)
    /// - `http://` / `https://` — resumable HTTP range reader
    /// - anything else — local filesystem path
    ///
    /// # Errors
    ///
    /// Fails with [`StreamError::Unsupported`] when the scheme cannot provide
    /// the requested mode (HTTP and `data:` are read-only), with
    /// [`StreamError::Invalid`] for a `mem:` URL no buffer is registered
    /// under, or with the backend's open error.
    pub fn open(url: &str, mode: Mode) -> StreamResult<Self> {
        if let Some(payload) = url.strip_prefix("data:") {
            if mode == Mode::Write {
                return Err(StreamError::unsupported("write"));
            }
            Self::with_backend(Box::new(DataBackend::new(payload.as_bytes().to_vec())), mode)
        } else if url.starts_with("mem:") {
            let mem = SharedMem::resolve(url)?;
            Self::with_backend(Box::new(MemBackend::open(mem, mode)?), mode)
        } else if url.starts_with("http://") || url.starts_with("https://") {
            if mode == Mode::Write {
                return Err(StreamError::unsupported("write"));
            }
            Self::with_backend(Box::new(HttpBackend::open(url)?), mode)
        } else {
            Self::with_backend(Box::new(FileBackend::open(url, mode)?), mode)
        }
    }

    /// Opens a stream over a caller-owned [`SharedMem`] buffer.
    ///
    /// Write mode starts from an empty buffer; after [`close`](Self::close)
    /// the handle holds exactly the written bytes.
    pub fn open_mem(mem: &SharedMem, mode: Mode) -> StreamResult<Self> {
        Self::with_backend(Box::new(MemBackend::open(mem.clone(), mode)?), mode)
    }

    /// Opens an HTTP stream with explicit configuration.
    pub fn open_http(url: &str, config: HttpConfig) -> StreamResult<Self> {
        Self::with_backend(Box::new(HttpBackend::with_config(url, config)?), Mode::Read)
    }

    /// Wraps an arbitrary backend with the default buffer capacity.
    pub fn with_backend(backend: Box<dyn Backend>, mode: Mode) -> StreamResult<Self> {
        Self::with_capacity(backend, mode, DEFAULT_CAPACITY)
    }

    /// Wraps an arbitrary backend with a specific buffer capacity.
    pub fn with_capacity(
        backend: Box<dyn Backend>,
        mode: Mode,
        capacity: usize,
    ) -> StreamResult<Self> {
        if capacity == 0 {
            return Err(StreamError::Invalid(
                "stream buffer capacity must be non-zero".into(),
            ));
        }
        Ok(Self {
            buffer: vec![0u8; capacity].into_boxed_slice(),
            begin: 0,
            end: 0,
            offset: 0,
            mode,
            at_eof: false,
            err: None,
            backend,
            closed: false,
        })
    }

    /// The caller's current absolute position in the stream.
    #[must_use]
    pub fn tell(&self) -> u64 {
        match self.mode {
            Mode::Read => self.offset,
            Mode::Write => self.offset + (self.end - self.begin) as u64,
        }
    }

    /// Direction this stream was opened in.
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Buffer capacity in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Whether the next read would return end-of-stream.
    #[must_use]
    pub fn is_eof(&self) -> bool {
        self.at_eof && self.begin == self.end
    }

    /// The first error this stream hit, if any. All operations after it fail
    /// with a copy of the same error.
    #[must_use]
    pub fn last_error(&self) -> Option<&StreamError> {
        self.err.as_ref()
    }

    /// Identifier of the underlying source (URL or path).
    #[must_use]
    pub fn source_id(&self) -> &str {
        self.backend.source_id()
    }

    fn check_healthy(&self) -> StreamResult<()> {
        match &self.err {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    fn fail<T>(&mut self, e: StreamError) -> StreamResult<T> {
        self.err = Some(e.clone());
        Err(e)
    }

    /// Copies buffered bytes into `dst`, consuming them.
    fn take_buffered(&mut self, dst: &mut [u8]) -> usize {
        let n = (self.end - self.begin).min(dst.len());
        if n > 0 {
            dst[..n].copy_from_slice(&self.buffer[self.begin..self.begin + n]);
            self.begin += n;
            self.offset += n as u64;
        }
        n
    }

    /// Refills the (empty) read buffer with a single backend read.
    fn refill(&mut self) -> StreamResult<()> {
        self.begin = 0;
        self.end = 0;
        match self.backend.read(&mut self.buffer) {
            Ok(0) => {
                self.at_eof = true;
                Ok(())
            }
            Ok(n) => {
                self.end = n;
                Ok(())
            }
            Err(e) => self.fail(e),
        }
    }

    /// Reads up to `dst.len()` bytes, returning how many were copied.
    ///
    /// Keeps reading from the backend until `dst` is full or the stream ends;
    /// `Ok(0)` therefore means end-of-stream. Reads larger than the buffer
    /// capacity go straight from the backend into `dst`.
    pub fn read(&mut self, dst: &mut [u8]) -> StreamResult<usize> {
        self.check_healthy()?;
        if self.mode != Mode::Read {
            let e = StreamError::unsupported("read");
            return self.fail(e);
        }

        let mut copied = self.take_buffered(dst);
        while copied < dst.len() && !self.at_eof {
            if dst.len() - copied >= self.buffer.len() {
                match self.backend.read(&mut dst[copied..]) {
                    Ok(0) => self.at_eof = true,
                    Ok(n) => {
                        copied += n;
                        self.offset += n as u64;
                    }
                    Err(e) => return self.fail(e),
                }
            } else {
                self.refill()?;
                copied += self.take_buffered(&mut dst[copied..]);
            }
        }
        Ok(copied)
    }

    /// Reads up to `dst.len()` bytes without advancing the stream position.
    ///
    /// At most [`capacity`](Self::capacity) bytes can be peeked; the buffered
    /// window is extended with further backend reads as needed.
    /// [`tell`](Self::tell) returns the same value before and after any peek,
    /// and the peeked bytes are exactly the ones subsequent reads will
    /// deliver.
    pub fn peek(&mut self, dst: &mut [u8]) -> StreamResult<usize> {
        self.check_healthy()?;
        if self.mode != Mode::Read {
            let e = StreamError::unsupported("peek");
            return self.fail(e);
        }

        let want = dst.len().min(self.buffer.len());
        if self.end - self.begin < want && !self.at_eof {
            // Slide the live bytes to the front to make room, then extend.
            if self.begin > 0 {
                self.buffer.copy_within(self.begin..self.end, 0);
                self.end -= self.begin;
                self.begin = 0;
            }
            while self.end < want && !self.at_eof {
                match self.backend.read(&mut self.buffer[self.end..]) {
                    Ok(0) => self.at_eof = true,
                    Ok(n) => self.end += n,
                    Err(e) => return self.fail(e),
                }
            }
        }

        let n = (self.end - self.begin).min(dst.len());
        dst[..n].copy_from_slice(&self.buffer[self.begin..self.begin + n]);
        Ok(n)
    }

    /// Reads one byte; `None` at end-of-stream.
    pub fn read_byte(&mut self) -> StreamResult<Option<u8>> {
        let mut b = [0u8; 1];
        match self.read(&mut b)? {
            0 => Ok(None),
            _ => Ok(Some(b[0])),
        }
    }

    /// Drains the pending write buffer to the backend.
    fn flush_pending(&mut self) -> StreamResult<()> {
        while self.begin < self.end {
            match self.backend.write(&self.buffer[self.begin..self.end]) {
                Ok(0) => {
                    let e = StreamError::Io(format!(
                        "{}: backend accepted no bytes",
                        self.backend.source_id()
                    ));
                    return self.fail(e);
                }
                Ok(n) => {
                    self.begin += n;
                    self.offset += n as u64;
                }
                Err(e) => return self.fail(e),
            }
        }
        self.begin = 0;
        self.end = 0;
        Ok(())
    }

    /// Writes all of `src`, staging it in the buffer; returns `src.len()`.
    ///
    /// The backend only sees data when the buffer fills, or on
    /// [`flush`](Self::flush), [`seek`](Self::seek), or [`close`](Self::close).
    /// Writes larger than the buffer capacity go straight to the backend.
    pub fn write(&mut self, src: &[u8]) -> StreamResult<usize> {
        self.check_healthy()?;
        if self.mode != Mode::Write {
            let e = StreamError::unsupported("write");
            return self.fail(e);
        }

        let capacity = self.buffer.len();
        let mut remaining = src;
        while !remaining.is_empty() {
            if self.end == capacity {
                self.flush_pending()?;
            } else if self.end == 0 && remaining.len() >= capacity {
                match self.backend.write(remaining) {
                    Ok(0) => {
                        let e = StreamError::Io(format!(
                            "{}: backend accepted no bytes",
                            self.backend.source_id()
                        ));
                        return self.fail(e);
                    }
                    Ok(n) => {
                        self.offset += n as u64;
                        remaining = &remaining[n..];
                    }
                    Err(e) => return self.fail(e),
                }
            } else {
                let n = (capacity - self.end).min(remaining.len());
                self.buffer[self.end..self.end + n].copy_from_slice(&remaining[..n]);
                self.end += n;
                remaining = &remaining[n..];
            }
        }
        Ok(src.len())
    }

    /// Writes one byte.
    pub fn write_byte(&mut self, byte: u8) -> StreamResult<()> {
        self.write(&[byte]).map(|_| ())
    }

    /// Writes the bytes of `s`.
    pub fn write_str(&mut self, s: &str) -> StreamResult<()> {
        self.write(s.as_bytes()).map(|_| ())
    }

    /// Delivers any pending writes to the backend.
    pub fn flush(&mut self) -> StreamResult<()> {
        self.check_healthy()?;
        if self.mode == Mode::Write {
            self.flush_pending()?;
            if let Err(e) = self.backend.flush() {
                return self.fail(e);
            }
        }
        Ok(())
    }

    /// Repositions the stream, returning the new absolute position.
    ///
    /// In write mode pending bytes are flushed first. In read mode a target
    /// inside the buffered window is repositioned without touching the
    /// backend; otherwise the buffer is discarded and the backend seeks.
    pub fn seek(&mut self, pos: SeekFrom) -> StreamResult<u64> {
        self.check_healthy()?;

        if self.mode == Mode::Write {
            self.flush_pending()?;
            let new = match self.backend.seek(pos) {
                Ok(o) => o,
                Err(e) => return self.fail(e),
            };
            self.offset = new;
            return Ok(new);
        }

        // Resolve the absolute target where the origin permits; End needs the
        // backend.
        let target = match pos {
            SeekFrom::Start(p) => Some(i128::from(p)),
            SeekFrom::Current(d) => Some(i128::from(self.offset) + i128::from(d)),
            SeekFrom::End(_) => None,
        };

        if let Some(t) = target {
            if t < 0 {
                let e = StreamError::Invalid("seek target before start of stream".into());
                return self.fail(e);
            }
            let t = t as u64;
            let window_end = self.offset + (self.end - self.begin) as u64;
            if t >= self.offset && t <= window_end {
                self.begin += (t - self.offset) as usize;
                self.offset = t;
                return Ok(t);
            }
        }

        // The backend's physical position is the end of the buffered window,
        // so Current must go down as an absolute target.
        let backend_pos = match (pos, target) {
            (SeekFrom::Current(_), Some(t)) => SeekFrom::Start(t as u64),
            _ => pos,
        };
        let new = match self.backend.seek(backend_pos) {
            Ok(o) => o,
            Err(e) => return self.fail(e),
        };
        self.begin = 0;
        self.end = 0;
        self.at_eof = false;
        self.offset = new;
        Ok(new)
    }

    fn do_close(&mut self) -> StreamResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let mut result = Ok(());
        if self.mode == Mode::Write && self.err.is_none() {
            result = self.flush_pending().and_then(|()| {
                self.backend.flush().map_err(|e| {
                    self.err = Some(e.clone());
                    e
                })
            });
        }
        if let Err(e) = self.backend.close() {
            if result.is_ok() {
                result = Err(e);
            }
        }
        result
    }

    /// Flushes pending writes, closes the backend, and releases the buffer.
    ///
    /// Resources are released even when the flush or the backend close fails;
    /// the first of those errors is returned.
    pub fn close(mut self) -> StreamResult<()> {
        self.do_close()
    }
}

impl Drop for Hstream {
    fn drop(&mut self) {
        let _ = self.do_close();
    }
}

impl io::Read for Hstream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Hstream::read(self, buf).map_err(io::Error::from)
    }
}

impl io::Write for Hstream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Hstream::write(self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        Hstream::flush(self).map_err(io::Error::from)
    }
}

impl io::Seek for Hstream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Hstream::seek(self, pos).map_err(io::Error::from)
    }
}
