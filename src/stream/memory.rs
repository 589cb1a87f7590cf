//! In-memory backends: `data:` URL payloads and caller-owned shared buffers.

#![allow(clippy::cast_possible_truncation)]

use std::collections::HashMap;
use std::io::SeekFrom;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use super::backend::{Backend, Mode};
use super::error::{StreamError, StreamResult};

fn resolve_seek(pos: SeekFrom, current: u64, len: u64) -> StreamResult<u64> {
    let target = match pos {
        SeekFrom::Start(p) => i128::from(p),
        SeekFrom::Current(d) => i128::from(current) + i128::from(d),
        SeekFrom::End(d) => i128::from(len) + i128::from(d),
    };
    if target < 0 || target > i128::from(len) {
        return Err(StreamError::Invalid(format!(
            "seek target {target} outside stream of {len} bytes"
        )));
    }
    Ok(target as u64)
}

/// Read-only backend over the literal bytes of a `data:` URL.
///
/// The payload is everything after the `data:` prefix, taken verbatim; no
/// percent-decoding is applied. Length is known, so all seek origins work.
pub struct DataBackend {
    data: Vec<u8>,
    pos: u64,
}

impl DataBackend {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data, pos: 0 }
    }
}

impl Backend for DataBackend {
    fn source_id(&self) -> &str {
        "data:"
    }

    fn read(&mut self, buf: &mut [u8]) -> StreamResult<usize> {
        let start = self.pos as usize;
        let remaining = self.data.len().saturating_sub(start);
        let n = remaining.min(buf.len());
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        self.pos += n as u64;
        Ok(n)
    }

    fn seek(&mut self, pos: SeekFrom) -> StreamResult<u64> {
        self.pos = resolve_seek(pos, self.pos, self.data.len() as u64)?;
        Ok(self.pos)
    }

    fn close(&mut self) -> StreamResult<()> {
        Ok(())
    }
}

/// Process-wide table resolving `mem:` URLs to their registered buffers.
/// Initialized once, like the HTTP transport; entries hold a clone of the
/// handle, so a registered buffer stays alive until unregistered.
fn registry() -> &'static Mutex<HashMap<String, SharedMem>> {
    static REGISTRY: OnceLock<Mutex<HashMap<String, SharedMem>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Cloneable handle to a caller-owned growable byte buffer.
///
/// The caller keeps one clone of the handle, opens a stream on another, and
/// reads the accumulated bytes back out of the handle after the stream is
/// closed. Growth is `Vec`'s amortized doubling; after a writing stream
/// closes, the handle holds exactly the bytes that were written.
///
/// A handle can be opened directly (`Hstream::open_mem`) or through the
/// textual `mem:` scheme: [`register`](SharedMem::register) returns a
/// `mem:<token>` URL that any later `Hstream::open` resolves to this buffer,
/// so code paths that only pass URLs around still reach caller-owned memory.
#[derive(Clone, Debug, Default)]
pub struct SharedMem {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedMem {
    /// Creates an empty shared buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a shared buffer seeded with `data`.
    #[must_use]
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(data)),
        }
    }

    /// Number of bytes currently in the buffer.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Io`] if another holder of the handle panicked
    /// while using it.
    pub fn len(&self) -> StreamResult<u64> {
        Ok(self.lock()?.len() as u64)
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> StreamResult<bool> {
        Ok(self.lock()?.is_empty())
    }

    /// Copies the current contents out of the buffer.
    pub fn to_vec(&self) -> StreamResult<Vec<u8>> {
        Ok(self.lock()?.clone())
    }

    /// Publishes this buffer under a fresh `mem:<token>` URL and returns the
    /// URL. Opening that URL reaches this buffer until
    /// [`unregister`](SharedMem::unregister) is called; the registry keeps a
    /// clone of the handle, so the buffer outlives the caller's copy if
    /// needed.
    pub fn register(&self) -> StreamResult<String> {
        let token = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
        let url = format!("mem:{token:x}");
        registry()
            .lock()
            .map_err(|_| StreamError::Io("shared buffer registry mutex poisoned".into()))?
            .insert(url.clone(), self.clone());
        Ok(url)
    }

    /// Removes a previously registered `mem:` URL, returning its handle if
    /// one was registered.
    pub fn unregister(url: &str) -> StreamResult<Option<SharedMem>> {
        Ok(registry()
            .lock()
            .map_err(|_| StreamError::Io("shared buffer registry mutex poisoned".into()))?
            .remove(url))
    }

    /// Looks up a registered `mem:` URL.
    pub(crate) fn resolve(url: &str) -> StreamResult<SharedMem> {
        registry()
            .lock()
            .map_err(|_| StreamError::Io("shared buffer registry mutex poisoned".into()))?
            .get(url)
            .cloned()
            .ok_or_else(|| {
                StreamError::Invalid(format!(
                    "{url}: no shared buffer registered under this URL; \
                     obtain one from SharedMem::register"
                ))
            })
    }

    fn lock(&self) -> StreamResult<std::sync::MutexGuard<'_, Vec<u8>>> {
        self.inner
            .lock()
            .map_err(|_| StreamError::Io("shared buffer mutex poisoned".into()))
    }
}

/// Backend over a [`SharedMem`] handle.
///
/// Write mode starts from an empty buffer and appends; read mode reads the
/// bytes present at each call, with full seek support.
pub struct MemBackend {
    mem: SharedMem,
    pos: u64,
    mode: Mode,
}

impl MemBackend {
    pub fn open(mem: SharedMem, mode: Mode) -> StreamResult<Self> {
        if mode == Mode::Write {
            mem.lock()?.clear();
        }
        Ok(Self { mem, pos: 0, mode })
    }
}

impl Backend for MemBackend {
    fn source_id(&self) -> &str {
        "mem:"
    }

    fn read(&mut self, buf: &mut [u8]) -> StreamResult<usize> {
        if self.mode != Mode::Read {
            return Err(StreamError::unsupported("read"));
        }
        let data = self.mem.lock()?;
        let start = self.pos as usize;
        let remaining = data.len().saturating_sub(start);
        let n = remaining.min(buf.len());
        buf[..n].copy_from_slice(&data[start..start + n]);
        drop(data);
        self.pos += n as u64;
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> StreamResult<usize> {
        if self.mode != Mode::Write {
            return Err(StreamError::unsupported("write"));
        }
        self.mem.lock()?.extend_from_slice(buf);
        self.pos += buf.len() as u64;
        Ok(buf.len())
    }

    fn seek(&mut self, pos: SeekFrom) -> StreamResult<u64> {
        if self.mode != Mode::Read {
            return Err(StreamError::NotSeekable(
                "shared memory stream opened for writing only appends".into(),
            ));
        }
        let len = self.mem.len()?;
        self.pos = resolve_seek(pos, self.pos, len)?;
        Ok(self.pos)
    }

    fn close(&mut self) -> StreamResult<()> {
        Ok(())
    }
}
