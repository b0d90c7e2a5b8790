//! Persisted election lifecycle and name
//!
//! The phase lives in a one-token file. Every transition re-reads that file
//! under an exclusive lock and validates against what it finds there, so a
//! caller's view of the phase is never trusted.

use crate::storage::locked_file::{LockedFile, ensure_file, read_lines_from, with_exclusive_write, with_shared_read};
use crate::storage::Ledgers;
use crate::types::{ElectionPhase, Transition};
use crate::{Error, Result, validation_error};
use std::path::{Path, PathBuf};

/// Default name reported before an admin sets one
pub const DEFAULT_ELECTION_NAME: &str = "Election";

/// Handle on the persisted phase and election name
#[derive(Debug, Clone)]
pub struct ElectionState {
    state_path: PathBuf,
    name_path: PathBuf,
}

impl ElectionState {
    pub fn new(state_path: impl Into<PathBuf>, name_path: impl Into<PathBuf>) -> Self {
        Self {
            state_path: state_path.into(),
            name_path: name_path.into(),
        }
    }

    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    /// Current persisted phase. A missing or empty file means PREP.
    pub fn phase(&self) -> Result<ElectionPhase> {
        with_shared_read(&self.state_path, |reader| {
            let lines = read_lines_from(reader).map_err(|e| Error::storage(&self.state_path, e))?;
            self.parse_phase(&lines)
        })
    }

    /// Run `f` with the current phase while holding a shared lock on the
    /// state file, so no transition can land until `f` returns.
    pub fn with_phase<T>(&self, f: impl FnOnce(ElectionPhase) -> Result<T>) -> Result<T> {
        ensure_file(&self.state_path)?;
        let mut locked = LockedFile::open_shared(&self.state_path)?.ok_or_else(|| {
            Error::storage(
                &self.state_path,
                std::io::Error::from(std::io::ErrorKind::NotFound),
            )
        })?;
        let phase = self.parse_phase(&locked.read_lines()?)?;
        let result = f(phase);
        drop(locked);
        result
    }

    /// PREP/CLOSED -> LIVE
    pub fn start(&self) -> Result<ElectionPhase> {
        self.transition(Transition::Start, None)
    }

    /// LIVE -> CLOSED
    pub fn stop(&self) -> Result<ElectionPhase> {
        self.transition(Transition::Stop, None)
    }

    /// PREP/CLOSED -> PREP, archiving ballots and clearing turnout
    pub fn reset(&self, ledgers: &Ledgers) -> Result<ElectionPhase> {
        self.transition(Transition::Reset, Some(ledgers))
    }

    pub fn apply(&self, transition: Transition, ledgers: &Ledgers) -> Result<ElectionPhase> {
        match transition {
            Transition::Start => self.start(),
            Transition::Stop => self.stop(),
            Transition::Reset => self.reset(ledgers),
        }
    }

    fn transition(&self, transition: Transition, ledgers: Option<&Ledgers>) -> Result<ElectionPhase> {
        with_exclusive_write(&self.state_path, |file| {
            let current = self.parse_phase(&file.read_lines()?)?;
            let Some(next) = current.after(transition) else {
                tracing::warn!("⛔ Rejected {} while election is {}", transition, current);
                return Err(Error::InvalidTransition {
                    transition,
                    phase: current,
                });
            };

            if let Some(ledgers) = ledgers {
                ledgers.archive_and_reset()?;
            }

            file.replace_contents(&format!("{}\n", next.as_str()))?;
            tracing::info!("🔁 Election {}: {} -> {}", transition, current, next);
            Ok(next)
        })
    }

    fn parse_phase(&self, lines: &[String]) -> Result<ElectionPhase> {
        match lines.iter().map(|l| l.trim()).find(|l| !l.is_empty()) {
            None => Ok(ElectionPhase::Prep),
            Some(token) => token
                .parse()
                .map_err(|message: String| Error::corrupt(&self.state_path, message)),
        }
    }

    /// Persisted election name, or [`DEFAULT_ELECTION_NAME`] if unset
    pub fn name(&self) -> Result<String> {
        with_shared_read(&self.name_path, |reader| {
            let lines = read_lines_from(reader).map_err(|e| Error::storage(&self.name_path, e))?;
            Ok(lines
                .into_iter()
                .map(|l| l.trim().to_string())
                .find(|l| !l.is_empty())
                .unwrap_or_else(|| DEFAULT_ELECTION_NAME.to_string()))
        })
    }

    pub fn set_name(&self, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(validation_error!("election name is required"));
        }
        if name.contains(['\n', '\r']) {
            return Err(validation_error!("election name must be a single line"));
        }

        with_exclusive_write(&self.name_path, |file| {
            file.replace_contents(&format!("{name}\n"))
        })?;
        tracing::info!("🏷️ Election renamed to '{}'", name);
        Ok(())
    }
}
