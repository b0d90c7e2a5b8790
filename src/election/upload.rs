//! Streaming ingestion of candidate portraits
//!
//! A push-style multipart parser feeds each file field into an
//! [`UploadSession`] one [`UploadChunk`] at a time. The session validates the
//! declared type on the first chunk, enforces the size limit as bytes arrive,
//! and stages the data in a temporary file inside the upload directory so the
//! final placement is a same-directory rename.
//!
//! ```text
//! AwaitingFirstChunk --valid type--> Receiving --end of field--> Closed
//!         |                              |
//!         +--bad type--> Failed          +--too large / io error--> Failed
//! ```
//!
//! A failed or abandoned session never leaves a file behind: the staged temp
//! file is removed on failure and whenever the session is dropped.

use crate::errors::UploadError;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use uuid::Uuid;

/// Default upload size limit (5 MiB)
pub const MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;

/// Content types accepted for candidate portraits
pub const ACCEPTED_CONTENT_TYPES: [&str; 2] = ["image/jpeg", "image/png"];

const ACCEPTED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];
const DEFAULT_EXTENSION: &str = "jpg";

/// One piece of a file field as delivered by the multipart parser
#[derive(Debug, Clone, Copy)]
pub struct UploadChunk<'a> {
    /// Position of `data` within the field
    pub offset: u64,
    pub data: &'a [u8],
    /// Parser signals this is the last chunk of the field
    pub is_final: bool,
    /// Declared `Content-Type` of the field
    pub content_type: Option<&'a str>,
    /// Client-supplied file name
    pub filename: Option<&'a str>,
}

impl<'a> UploadChunk<'a> {
    pub fn new(offset: u64, data: &'a [u8]) -> Self {
        Self {
            offset,
            data,
            is_final: false,
            content_type: None,
            filename: None,
        }
    }

    /// Zero-length chunk marking the end of the field
    pub fn end_of_field(offset: u64) -> Self {
        Self::new(offset, &[])
    }

    pub fn with_content_type(mut self, content_type: &'a str) -> Self {
        self.content_type = Some(content_type);
        self
    }

    pub fn with_filename(mut self, filename: &'a str) -> Self {
        self.filename = Some(filename);
        self
    }

    pub fn final_chunk(mut self) -> Self {
        self.is_final = true;
        self
    }
}

/// Per-field upload state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadState {
    AwaitingFirstChunk,
    Receiving { bytes_so_far: u64 },
    Closed { bytes: u64 },
    Failed(UploadError),
}

/// Transient state for one image field of one request
#[derive(Debug)]
pub struct UploadSession {
    id: Uuid,
    upload_dir: PathBuf,
    max_bytes: u64,
    state: UploadState,
    temp: Option<NamedTempFile>,
    content_type: Option<String>,
    filename: Option<String>,
}

impl UploadSession {
    /// New session staging into `upload_dir` with a `max_bytes` limit
    pub fn new(upload_dir: impl Into<PathBuf>, max_bytes: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            upload_dir: upload_dir.into(),
            max_bytes,
            state: UploadState::AwaitingFirstChunk,
            temp: None,
            content_type: None,
            filename: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> &UploadState {
        &self.state
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, UploadState::Closed { .. })
    }

    pub fn bytes_received(&self) -> u64 {
        match self.state {
            UploadState::Receiving { bytes_so_far } => bytes_so_far,
            UploadState::Closed { bytes } => bytes,
            _ => 0,
        }
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Path of the staged temp file, if one is open
    pub fn temp_path(&self) -> Option<&Path> {
        self.temp.as_ref().map(|t| t.path())
    }

    /// Normalized extension for the final file name
    pub fn extension(&self) -> &'static str {
        self.filename
            .as_deref()
            .and_then(|name| Path::new(name).extension())
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
            .and_then(|ext| ACCEPTED_EXTENSIONS.into_iter().find(|accepted| *accepted == ext))
            .unwrap_or(DEFAULT_EXTENSION)
    }

    /// Feed the next chunk of the field
    pub fn push(&mut self, chunk: UploadChunk<'_>) -> Result<&UploadState, UploadError> {
        match self.state.clone() {
            UploadState::Failed(reason) => Err(reason),
            UploadState::Closed { .. } => {
                Err(self.fail(UploadError::write_failure("chunk received after end of field")))
            }
            UploadState::AwaitingFirstChunk => {
                self.begin(&chunk)?;
                self.receive(chunk, 0)
            }
            UploadState::Receiving { bytes_so_far } => self.receive(chunk, bytes_so_far),
        }
    }

    fn begin(&mut self, chunk: &UploadChunk<'_>) -> Result<(), UploadError> {
        if chunk.offset != 0 {
            return Err(self.fail(UploadError::write_failure(format!(
                "first chunk arrived at offset {}",
                chunk.offset
            ))));
        }

        let filename = chunk.filename.map(str::trim).unwrap_or_default();
        if chunk.data.is_empty() && filename.is_empty() {
            // Browsers send an empty, nameless part when no file was chosen
            return Err(self.fail(UploadError::Missing));
        }

        let declared = chunk.content_type.unwrap_or_default();
        let normalized = normalize_content_type(declared);
        if !ACCEPTED_CONTENT_TYPES.contains(&normalized.as_str()) {
            return Err(self.fail(UploadError::BadType {
                content_type: declared.to_string(),
            }));
        }

        let temp = tempfile::Builder::new()
            .prefix(".upload-")
            .suffix(".part")
            .tempfile_in(&self.upload_dir)
            .map_err(|e| self.fail(UploadError::write_failure(e.to_string())))?;

        tracing::debug!(
            "📥 Upload {} started: type={}, staged at {}",
            self.id,
            normalized,
            temp.path().display()
        );

        self.temp = Some(temp);
        self.content_type = Some(normalized);
        self.filename = Some(filename.to_string()).filter(|f| !f.is_empty());
        Ok(())
    }

    fn receive(
        &mut self,
        chunk: UploadChunk<'_>,
        bytes_so_far: u64,
    ) -> Result<&UploadState, UploadError> {
        if chunk.offset != bytes_so_far {
            return Err(self.fail(UploadError::write_failure(format!(
                "chunk offset {} does not follow {} received bytes",
                chunk.offset, bytes_so_far
            ))));
        }

        let total = bytes_so_far + chunk.data.len() as u64;
        if total > self.max_bytes {
            tracing::warn!(
                "📥 Upload {} rejected: exceeds {} bytes",
                self.id,
                self.max_bytes
            );
            return Err(self.fail(UploadError::TooLarge {
                limit: self.max_bytes,
            }));
        }

        if !chunk.data.is_empty() {
            let write = match self.temp.as_mut() {
                Some(temp) => temp.write_all(chunk.data),
                None => Err(std::io::Error::other("no staging file open")),
            };
            if let Err(e) = write {
                return Err(self.fail(UploadError::write_failure(e.to_string())));
            }
        }

        self.state = if chunk.data.is_empty() || chunk.is_final {
            if let Some(Err(e)) = self.temp.as_ref().map(|t| t.as_file().sync_all()) {
                return Err(self.fail(UploadError::write_failure(e.to_string())));
            }
            tracing::debug!("📥 Upload {} closed after {} bytes", self.id, total);
            UploadState::Closed { bytes: total }
        } else {
            UploadState::Receiving {
                bytes_so_far: total,
            }
        };
        Ok(&self.state)
    }

    /// Record `reason`, remove any staged file, and hand the reason back
    fn fail(&mut self, reason: UploadError) -> UploadError {
        self.discard_temp();
        self.state = UploadState::Failed(reason.clone());
        reason
    }

    fn discard_temp(&mut self) {
        if let Some(temp) = self.temp.take() {
            let path = temp.path().to_path_buf();
            if let Err(e) = temp.close() {
                tracing::warn!("Failed to remove staged upload {}: {}", path.display(), e);
            }
        }
    }

    /// Atomically move the staged file to `<upload_dir>/<stem>.<ext>`
    ///
    /// Only valid once the field is closed with at least one byte. An existing
    /// file is never replaced: the name falls back to `<stem>-<n>.<ext>`.
    pub(crate) fn persist(mut self, stem: &str) -> Result<PathBuf, UploadError> {
        match &self.state {
            UploadState::Closed { bytes } if *bytes > 0 => {}
            UploadState::Failed(reason) => return Err(reason.clone()),
            _ => return Err(UploadError::Missing),
        }

        let extension = self.extension();
        let mut temp = self.temp.take().ok_or(UploadError::Missing)?;
        let mut attempt = 0u32;
        loop {
            let file_name = match attempt {
                0 => format!("{stem}.{extension}"),
                n => format!("{stem}-{n}.{extension}"),
            };
            let final_path = self.upload_dir.join(file_name);

            match temp.persist_noclobber(&final_path) {
                Ok(_) => {
                    tracing::info!("🖼️ Upload {} stored at {}", self.id, final_path.display());
                    return Ok(final_path);
                }
                Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
                    temp = e.file;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(
                        "📥 Upload {} could not be placed at {}: {}",
                        self.id,
                        final_path.display(),
                        e.error
                    );
                    return Err(UploadError::write_failure(e.error.to_string()));
                }
            }
        }
    }

    /// Abandon the field, removing any staged data
    pub fn abort(mut self) {
        self.discard_temp();
    }
}

impl Drop for UploadSession {
    fn drop(&mut self) {
        if self.temp.is_some() {
            tracing::debug!("📥 Upload {} dropped with staged data; removing", self.id);
            self.discard_temp();
        }
    }
}

fn normalize_content_type(declared: &str) -> String {
    declared
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}
