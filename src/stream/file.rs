//! Local filesystem backend.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use super::backend::{Backend, Mode};
use super::error::{StreamError, StreamResult};

/// Backend over a local file. Delegates directly to the file descriptor and
/// does no buffering of its own; interrupted system calls are retried.
#[derive(Debug)]
pub struct FileBackend {
    path: String,
    file: Option<File>,
}

impl FileBackend {
    /// Opens `path` for the given mode. `Mode::Write` creates or truncates.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::NotFound`] or [`StreamError::PermissionDenied`]
    /// for the matching OS errors, [`StreamError::Io`] otherwise.
    pub fn open<P: AsRef<Path>>(path: P, mode: Mode) -> StreamResult<Self> {
        let path = path.as_ref();
        let result = match mode {
            Mode::Read => File::open(path),
            Mode::Write => File::create(path),
        };
        let file = result.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StreamError::NotFound(path.display().to_string()),
            std::io::ErrorKind::PermissionDenied => {
                StreamError::PermissionDenied(path.display().to_string())
            }
            _ => StreamError::Io(format!("{}: {e}", path.display())),
        })?;

        Ok(Self {
            path: path.display().to_string(),
            file: Some(file),
        })
    }

    fn file(&mut self) -> StreamResult<&mut File> {
        self.file
            .as_mut()
            .ok_or_else(|| StreamError::Io(format!("{}: file already closed", self.path)))
    }
}

impl Backend for FileBackend {
    fn source_id(&self) -> &str {
        &self.path
    }

    fn read(&mut self, buf: &mut [u8]) -> StreamResult<usize> {
        let file = self.file()?;
        loop {
            match file.read(buf) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn write(&mut self, buf: &[u8]) -> StreamResult<usize> {
        let file = self.file()?;
        loop {
            match file.write(buf) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn seek(&mut self, pos: SeekFrom) -> StreamResult<u64> {
        Ok(self.file()?.seek(pos)?)
    }

    fn flush(&mut self) -> StreamResult<()> {
        Ok(self.file()?.flush()?)
    }

    fn close(&mut self) -> StreamResult<()> {
        self.file = None;
        Ok(())
    }
}
