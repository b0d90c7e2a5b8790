//! Candidate registry with an owned, explicitly reloaded cache

use super::locked_file::{scan_lines, with_exclusive_write, with_shared_read};
use crate::types::{Candidate, CandidateId};
use crate::{Error, Result, validation_error};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Registry of candidates backed by `id,name,party,imageRef` lines
///
/// The cache is a convenience for rendering. It is replaced wholesale by
/// [`CandidateRegistry::reload`] and may be stale between reloads.
#[derive(Debug)]
pub struct CandidateRegistry {
    path: PathBuf,
    cache: RwLock<Vec<Candidate>>,
}

impl CandidateRegistry {
    /// Create a registry over `path` with an empty cache
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: RwLock::new(Vec::new()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every well-formed record from disk. Malformed lines are skipped.
    pub fn load_all(&self) -> Result<Vec<Candidate>> {
        let mut skipped = 0usize;
        let candidates = with_shared_read(&self.path, |reader| {
            let mut candidates = Vec::new();
            scan_lines(reader, |line| {
                if line.trim().is_empty() {
                    return false;
                }
                match Candidate::parse_record(line) {
                    Some(candidate) => candidates.push(candidate),
                    None => skipped += 1,
                }
                false
            })
            .map_err(|e| Error::storage(&self.path, e))?;
            Ok(candidates)
        })?;

        if skipped > 0 {
            tracing::warn!(
                "Skipped {} malformed candidate record(s) in {}",
                skipped,
                self.path.display()
            );
        }

        Ok(candidates)
    }

    /// Rebuild the cache from disk and return the fresh list
    pub fn reload(&self) -> Result<Vec<Candidate>> {
        let candidates = self.load_all()?;
        let mut cache = self
            .cache
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *cache = candidates.clone();

        tracing::debug!("Candidate cache reloaded: {} candidates", candidates.len());
        Ok(candidates)
    }

    /// Copy of the cached candidate list
    pub fn snapshot(&self) -> Vec<Candidate> {
        self.cache
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// First cached candidate with `id`
    pub fn get(&self, id: CandidateId) -> Option<Candidate> {
        self.cache
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .find(|c| c.id == id)
            .cloned()
    }

    /// Append one record. The cache is left untouched; call [`reload`](Self::reload).
    pub fn append(
        &self,
        id: CandidateId,
        name: &str,
        party: &str,
        image_ref: &str,
    ) -> Result<Candidate> {
        for (field, value) in [("name", name), ("party", party), ("image_ref", image_ref)] {
            if value.trim().is_empty() {
                return Err(validation_error!("candidate {} is required", field));
            }
            if value.contains('\n') || value.contains('\r') {
                return Err(validation_error!("candidate {} must be a single line", field));
            }
        }

        let candidate = Candidate::new(id, name, party, image_ref);
        with_exclusive_write(&self.path, |file| file.append_line(&candidate.to_record()))?;

        tracing::info!("🧾 Candidate registered: id={}, name={}", id, name);
        Ok(candidate)
    }
}
