//! Voter roll backed by `aadhar,name` lines

use super::locked_file::{scan_lines, with_exclusive_write, with_shared_read};
use crate::types::VoterRecord;
use crate::{Error, Result, validation_error};
use std::path::{Path, PathBuf};

/// Registered voters, matched exactly on both aadhar and name
#[derive(Debug, Clone)]
pub struct VoterRoll {
    path: PathBuf,
}

impl VoterRoll {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_registered(&self, aadhar: &str, name: &str) -> Result<bool> {
        with_shared_read(&self.path, |reader| {
            scan_lines(reader, |line| {
                VoterRecord::parse_record(line).is_some_and(|voter| voter.matches(aadhar, name))
            })
            .map_err(|e| Error::storage(&self.path, e))
        })
    }

    pub fn append(&self, aadhar: &str, name: &str) -> Result<VoterRecord> {
        if aadhar.trim().is_empty() {
            return Err(validation_error!("voter aadhar is required"));
        }
        if name.trim().is_empty() {
            return Err(validation_error!("voter name is required"));
        }
        if aadhar.contains(',') {
            return Err(validation_error!("voter aadhar must not contain ','"));
        }
        if [aadhar, name].iter().any(|v| v.contains(['\n', '\r'])) {
            return Err(validation_error!("voter fields must be a single line"));
        }

        let voter = VoterRecord::new(aadhar, name);
        with_exclusive_write(&self.path, |file| file.append_line(&voter.to_record()))?;

        tracing::info!("🪪 Voter registered: aadhar={}", crate::mask_identifier(aadhar));
        Ok(voter)
    }

    /// Every record on the roll
    pub fn list(&self) -> Result<Vec<VoterRecord>> {
        with_shared_read(&self.path, |reader| {
            let mut voters = Vec::new();
            scan_lines(reader, |line| {
                if let Some(voter) = VoterRecord::parse_record(line) {
                    voters.push(voter);
                }
                false
            })
            .map_err(|e| Error::storage(&self.path, e))?;
            Ok(voters)
        })
    }
}
