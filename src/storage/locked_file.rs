//! Scoped advisory locks over flat files
//!
//! Every ledger access goes through [`with_shared_read`] or
//! [`with_exclusive_write`]. The lock is taken on open and released when the
//! [`LockedFile`] guard drops, so early returns and `?` never leak a lock.
//! Locks cover one file for one call; callers needing cross-file atomicity
//! nest scopes in a fixed order (election state, turnout, ballot).

use crate::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Lock mode held by a [`LockedFile`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

/// An open file holding an advisory lock until dropped
#[derive(Debug)]
pub struct LockedFile {
    file: File,
    path: PathBuf,
    mode: LockMode,
}

impl LockedFile {
    /// Open `path` read-only under a shared lock. `Ok(None)` if it does not exist.
    pub fn open_shared(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::storage(path, e)),
        };
        fs2::FileExt::lock_shared(&file).map_err(|e| Error::storage(path, e))?;

        Ok(Some(Self {
            file,
            path: path.to_path_buf(),
            mode: LockMode::Shared,
        }))
    }

    /// Open (creating if needed) `path` for read + append under an exclusive lock.
    pub fn open_exclusive(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)
            .map_err(|e| Error::storage(path, e))?;
        fs2::FileExt::lock_exclusive(&file).map_err(|e| Error::storage(path, e))?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
            mode: LockMode::Exclusive,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> LockMode {
        self.mode
    }

    /// All lines of the file, newline stripped, read from the start.
    pub fn read_lines(&mut self) -> Result<Vec<String>> {
        self.rewind()?;
        let mut reader = BufReader::new(&self.file);
        read_lines_from(&mut reader).map_err(|e| Error::storage(&self.path, e))
    }

    /// Whether any line equals `needle` exactly.
    pub fn contains_line(&mut self, needle: &str) -> Result<bool> {
        self.rewind()?;
        let mut reader = BufReader::new(&self.file);
        scan_lines(&mut reader, |line| line == needle).map_err(|e| Error::storage(&self.path, e))
    }

    pub fn len(&self) -> Result<u64> {
        let metadata = self
            .file
            .metadata()
            .map_err(|e| Error::storage(&self.path, e))?;
        Ok(metadata.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Whole file contents from the start
    pub fn read_bytes(&mut self) -> Result<Vec<u8>> {
        self.rewind()?;
        let mut bytes = Vec::new();
        (&self.file)
            .read_to_end(&mut bytes)
            .map_err(|e| Error::storage(&self.path, e))?;
        Ok(bytes)
    }

    /// Cut the file back to `len` bytes, discarding anything appended after it.
    pub fn truncate_to(&mut self, len: u64) -> Result<()> {
        self.require_exclusive()?;
        self.file
            .set_len(len)
            .and_then(|_| self.file.sync_data())
            .map_err(|e| Error::storage(&self.path, e))
    }

    /// Append one record terminated by a newline and flush it to disk.
    pub fn append_line(&mut self, line: &str) -> Result<()> {
        self.require_exclusive()?;
        let mut record = String::with_capacity(line.len() + 1);
        record.push_str(line);
        record.push('\n');

        self.file
            .write_all(record.as_bytes())
            .and_then(|_| self.file.sync_data())
            .map_err(|e| Error::storage(&self.path, e))
    }

    /// Replace the whole file with `contents`.
    pub fn replace_contents(&mut self, contents: &str) -> Result<()> {
        self.require_exclusive()?;
        self.file
            .set_len(0)
            .and_then(|_| self.file.write_all(contents.as_bytes()))
            .and_then(|_| self.file.sync_data())
            .map_err(|e| Error::storage(&self.path, e))
    }

    pub fn truncate(&mut self) -> Result<()> {
        self.replace_contents("")
    }

    fn rewind(&mut self) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(0))
            .map(|_| ())
            .map_err(|e| Error::storage(&self.path, e))
    }

    fn require_exclusive(&self) -> Result<()> {
        match self.mode {
            LockMode::Exclusive => Ok(()),
            LockMode::Shared => Err(Error::storage(
                &self.path,
                io::Error::new(
                    io::ErrorKind::PermissionDenied,
                    "write attempted under a shared lock",
                ),
            )),
        }
    }
}

impl Drop for LockedFile {
    fn drop(&mut self) {
        if let Err(e) = fs2::FileExt::unlock(&self.file) {
            tracing::warn!("Failed to unlock {}: {}", self.path.display(), e);
        }
    }
}

/// Run `f` over the contents of `path` while holding a shared lock.
///
/// A missing file is presented to `f` as an empty reader.
pub fn with_shared_read<T>(
    path: impl AsRef<Path>,
    f: impl FnOnce(&mut dyn BufRead) -> Result<T>,
) -> Result<T> {
    match LockedFile::open_shared(path)? {
        Some(locked) => {
            let mut reader = BufReader::new(&locked.file);
            f(&mut reader)
        }
        None => f(&mut io::empty()),
    }
}

/// Run `f` with an exclusively locked handle on `path`, creating it if needed.
pub fn with_exclusive_write<T>(
    path: impl AsRef<Path>,
    f: impl FnOnce(&mut LockedFile) -> Result<T>,
) -> Result<T> {
    let mut locked = LockedFile::open_exclusive(path)?;
    f(&mut locked)
}

/// Read newline-delimited records, tolerating invalid UTF-8 and CRLF endings.
pub fn read_lines_from(reader: &mut dyn BufRead) -> io::Result<Vec<String>> {
    let mut lines = Vec::new();
    scan_lines(reader, |line| {
        lines.push(line.to_string());
        false
    })?;
    Ok(lines)
}

/// Feed each line to `visit` until it returns `true`. Returns whether it did.
pub fn scan_lines(
    reader: &mut dyn BufRead,
    mut visit: impl FnMut(&str) -> bool,
) -> io::Result<bool> {
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(false);
        }
        let text = String::from_utf8_lossy(&buf);
        let line = text.trim_end_matches(['\n', '\r']);
        if visit(line) {
            return Ok(true);
        }
    }
}

/// Create `path` as an empty file if it is missing.
pub fn ensure_file(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map(|_| ())
        .map_err(|e| Error::storage(path, e))
}
