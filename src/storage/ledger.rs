//! Turnout and ballot ledgers
//!
//! The turnout ledger records who has voted; the ballot ledger records what
//! was voted for. The two are unlinked: a ballot line carries
//! only a candidate id.
//!
//! [`Ledgers::cast_vote`] is the only path that writes both. It holds a shared
//! lock on the election state file and an exclusive lock on the turnout ledger
//! for the entire check-and-append sequence, so two requests for the same
//! aadhar can never both pass the `has_voted` check.

use super::locked_file::{LockedFile, scan_lines, with_exclusive_write, with_shared_read};
use super::voters::VoterRoll;
use crate::election::ElectionState;
use crate::types::{Candidate, CandidateId, Tally, VoteReceipt};
use crate::{Error, Result, mask_identifier};
use chrono::Utc;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Paired append-only ledgers
#[derive(Debug, Clone)]
pub struct Ledgers {
    turnout_path: PathBuf,
    ballot_path: PathBuf,
}

impl Ledgers {
    pub fn new(turnout_path: impl Into<PathBuf>, ballot_path: impl Into<PathBuf>) -> Self {
        Self {
            turnout_path: turnout_path.into(),
            ballot_path: ballot_path.into(),
        }
    }

    pub fn turnout_path(&self) -> &Path {
        &self.turnout_path
    }

    pub fn ballot_path(&self) -> &Path {
        &self.ballot_path
    }

    pub fn has_voted(&self, aadhar: &str) -> Result<bool> {
        with_shared_read(&self.turnout_path, |reader| {
            scan_lines(reader, |line| line == aadhar).map_err(|e| Error::storage(&self.turnout_path, e))
        })
    }

    /// Append one ballot outside a vote transaction (imports, fixtures)
    pub fn record_vote(&self, candidate_id: CandidateId) -> Result<()> {
        with_exclusive_write(&self.ballot_path, |file| {
            file.append_line(&candidate_id.to_string())
        })
    }

    /// Append one turnout entry outside a vote transaction
    pub fn record_turnout(&self, aadhar: &str) -> Result<()> {
        with_exclusive_write(&self.turnout_path, |file| file.append_line(aadhar))
    }

    /// Accept one ballot as a single transaction
    ///
    /// 1. Election phase must be LIVE
    /// 2. `(aadhar, name)` must be on the voter roll
    /// 3. No turnout entry may exist for `aadhar`
    /// 4. Turnout is appended, then the ballot
    ///
    /// Both ledgers are locked before either is written. If the ballot append
    /// fails the turnout entry is cut back off, so the voter may retry.
    pub fn cast_vote(
        &self,
        state: &ElectionState,
        roll: &VoterRoll,
        aadhar: &str,
        name: &str,
        candidate_id: CandidateId,
    ) -> Result<VoteReceipt> {
        state.with_phase(|phase| {
            if !phase.is_accepting_votes() {
                tracing::warn!(
                    "🚫 Vote rejected: election not live (phase={}, aadhar={})",
                    phase,
                    mask_identifier(aadhar)
                );
                return Err(Error::ElectionNotLive { phase });
            }

            if !roll.is_registered(aadhar, name)? {
                tracing::warn!(
                    "🚫 Vote rejected: voter not registered (aadhar={})",
                    mask_identifier(aadhar)
                );
                return Err(Error::NotRegistered);
            }

            let mut turnout = LockedFile::open_exclusive(&self.turnout_path)?;
            if turnout.contains_line(aadhar)? {
                tracing::warn!(
                    "🚫 Vote rejected: already voted (aadhar={})",
                    mask_identifier(aadhar)
                );
                return Err(Error::AlreadyVoted);
            }

            let mut ballots = LockedFile::open_exclusive(&self.ballot_path)?;
            let turnout_len = turnout.len()?;
            turnout.append_line(aadhar)?;
            if let Err(e) = ballots.append_line(&candidate_id.to_string()) {
                tracing::error!(
                    "Ballot append failed, rolling back turnout (aadhar={}): {}",
                    mask_identifier(aadhar),
                    e
                );
                turnout.truncate_to(turnout_len)?;
                return Err(e);
            }
            drop(ballots);
            drop(turnout);

            tracing::info!("🗳️ Vote recorded: aadhar={}", mask_identifier(aadhar));

            Ok(VoteReceipt {
                candidate_id,
                recorded_at: Utc::now(),
            })
        })
    }

    /// Count every ballot against `candidates`
    ///
    /// Ids absent from `candidates` count toward the total only. With duplicate
    /// ids the first matching candidate receives the vote. Non-integer lines
    /// are skipped and not counted.
    pub fn tally(&self, candidates: &[Candidate]) -> Result<Tally> {
        let mut tally = Tally {
            candidates: candidates
                .iter()
                .map(|c| Candidate {
                    votes: 0,
                    ..c.clone()
                })
                .collect(),
            ..Tally::default()
        };
        let mut malformed = 0usize;

        with_shared_read(&self.ballot_path, |reader| {
            scan_lines(reader, |line| {
                let line = line.trim();
                if line.is_empty() {
                    return false;
                }
                let Ok(choice) = line.parse::<CandidateId>() else {
                    malformed += 1;
                    return false;
                };

                tally.total_votes += 1;
                match tally.candidates.iter_mut().find(|c| c.id == choice) {
                    Some(candidate) => candidate.votes += 1,
                    None => tally.unattributed_votes += 1,
                }
                false
            })
            .map_err(|e| Error::storage(&self.ballot_path, e))
        })?;

        if malformed > 0 {
            tracing::warn!(
                "Skipped {} malformed ballot line(s) in {}",
                malformed,
                self.ballot_path.display()
            );
        }

        Ok(tally)
    }

    /// Clear turnout and archive any recorded ballots
    ///
    /// The ballots are copied to a fresh archive file and the active ledger is
    /// truncated in place, so it keeps its identity for writers queued on its
    /// lock. Returns the archive path when the ballot ledger was non-empty.
    pub fn archive_and_reset(&self) -> Result<Option<PathBuf>> {
        let mut turnout = LockedFile::open_exclusive(&self.turnout_path)?;
        let mut ballots = LockedFile::open_exclusive(&self.ballot_path)?;

        if ballots.is_empty()? {
            turnout.truncate()?;
            tracing::info!("♻️ Ledgers reset: turnout cleared, no ballots to archive");
            return Ok(None);
        }

        let archive_path = self.write_archive(&ballots.read_bytes()?)?;
        ballots.truncate()?;
        turnout.truncate()?;

        tracing::info!(
            "♻️ Ledgers reset: ballots archived to {}",
            archive_path.display()
        );
        Ok(Some(archive_path))
    }

    fn write_archive(&self, contents: &[u8]) -> Result<PathBuf> {
        let dir = self
            .ballot_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut staged = tempfile::Builder::new()
            .prefix(".archive-")
            .tempfile_in(dir)
            .map_err(|e| Error::storage(dir, e))?;
        staged
            .write_all(contents)
            .and_then(|_| staged.as_file().sync_all())
            .map_err(|e| Error::storage(staged.path(), e))?;

        loop {
            let archive_path = self.next_archive_path();
            match staged.persist_noclobber(&archive_path) {
                Ok(_) => return Ok(archive_path),
                Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => staged = e.file,
                Err(e) => return Err(Error::storage(&archive_path, e.error)),
            }
        }
    }

    fn next_archive_path(&self) -> PathBuf {
        let stem = self
            .ballot_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "votes".to_string());
        let extension = self
            .ballot_path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let stamp = Utc::now().format("%Y%m%dT%H%M%SZ");

        let mut candidate = self
            .ballot_path
            .with_file_name(format!("{stem}-{stamp}{extension}"));
        let mut counter = 1u32;
        while candidate.exists() {
            candidate = self
                .ballot_path
                .with_file_name(format!("{stem}-{stamp}-{counter}{extension}"));
            counter += 1;
        }
        candidate
    }
}
