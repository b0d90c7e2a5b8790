//! Entry point for the request layer
//!
//! One method per form action. Every method returns either a value to render
//! or a typed [`Error`]; business rejections never abort the process.

use super::admin::AdminCredential;
use super::state::ElectionState;
use super::upload::UploadSession;
use crate::config::Config;
use crate::errors::UploadError;
use crate::storage::locked_file::ensure_file;
use crate::storage::{CandidateRegistry, Ledgers, VoterRoll};
use crate::types::{
    Candidate, CandidateForm, CandidateId, ElectionPhase, ResultsReport, StoredImage, Transition,
    VoteReceipt, VoterRecord,
};
use crate::{Error, Result, validation_error};
use std::path::{Path, PathBuf};

/// Owns every store of one election
#[derive(Debug)]
pub struct ElectionService {
    upload_dir: PathBuf,
    max_upload_bytes: u64,
    admin: AdminCredential,
    candidates: CandidateRegistry,
    voters: VoterRoll,
    ledgers: Ledgers,
    state: ElectionState,
}

impl ElectionService {
    /// Prepare the data directory and load startup state
    ///
    /// Fails if directories or ledger files cannot be created, or if the admin
    /// credential cannot be read. Callers should treat this as fatal.
    pub fn open(config: &Config) -> Result<Self> {
        let storage = &config.storage;
        for dir in [&storage.data_dir, &storage.upload_dir] {
            std::fs::create_dir_all(dir).map_err(|e| Error::storage(dir, e))?;
        }
        for path in [
            storage.candidates_path(),
            storage.voters_path(),
            storage.turnout_path(),
            storage.ballots_path(),
            storage.state_path(),
            storage.name_path(),
        ] {
            ensure_file(&path)?;
        }

        let admin = AdminCredential::load(&config.admin.credential_file)?;

        let service = Self {
            upload_dir: storage.upload_dir.clone(),
            max_upload_bytes: storage.max_upload_bytes,
            admin,
            candidates: CandidateRegistry::new(storage.candidates_path()),
            voters: VoterRoll::new(storage.voters_path()),
            ledgers: Ledgers::new(storage.turnout_path(), storage.ballots_path()),
            state: ElectionState::new(storage.state_path(), storage.name_path()),
        };

        let loaded = service.candidates.reload()?;
        tracing::info!(
            "🗳️ Election store opened at {} ({} candidates, phase {})",
            storage.data_dir.display(),
            loaded.len(),
            service.state.phase()?
        );
        Ok(service)
    }

    pub fn phase(&self) -> Result<ElectionPhase> {
        self.state.phase()
    }

    pub fn election_name(&self) -> Result<String> {
        self.state.name()
    }

    /// Cached candidate list (may be stale until [`reload_candidates`](Self::reload_candidates))
    pub fn candidates(&self) -> Vec<Candidate> {
        self.candidates.snapshot()
    }

    /// Rebuild the candidate cache, e.g. before serving the ballot form
    pub fn reload_candidates(&self) -> Result<Vec<Candidate>> {
        self.candidates.reload()
    }

    /// Submit a ballot
    ///
    /// `candidate` is the raw form value; `None` or blank means no choice.
    pub fn cast_vote(&self, aadhar: &str, name: &str, candidate: Option<&str>) -> Result<VoteReceipt> {
        if aadhar.trim().is_empty() {
            return Err(validation_error!("aadhar is required"));
        }
        if name.trim().is_empty() {
            return Err(validation_error!("name is required"));
        }
        let candidate = candidate.map(str::trim).filter(|c| !c.is_empty());
        let Some(candidate) = candidate else {
            return Err(Error::NoSelection);
        };
        let candidate_id: CandidateId = candidate
            .parse()
            .map_err(|_| validation_error!("candidate '{}' is not a valid id", candidate))?;

        self.ledgers
            .cast_vote(&self.state, &self.voters, aadhar, name, candidate_id)
    }

    /// Start a session for the next image field of an add-candidate form
    pub fn begin_upload(&self) -> UploadSession {
        UploadSession::new(&self.upload_dir, self.max_upload_bytes)
    }

    /// Complete an add-candidate submission
    ///
    /// On any rejection the upload is dropped (removing its staged file) and
    /// the registry is not touched.
    pub fn add_candidate(
        &self,
        password: &str,
        form: &CandidateForm,
        upload: UploadSession,
    ) -> Result<Candidate> {
        self.admin.authorize(password)?;

        let id = form.id.trim();
        if id.is_empty() {
            return Err(validation_error!("candidate id is required"));
        }
        let id: CandidateId = id
            .parse()
            .map_err(|_| validation_error!("candidate id '{}' is not an integer", form.id))?;
        let name = form.name.trim();
        let party = form.party.trim();
        for (field, value) in [("name", name), ("party", party)] {
            if value.is_empty() {
                return Err(validation_error!("candidate {} is required", field));
            }
            if value.contains(['\n', '\r']) {
                return Err(validation_error!("candidate {} must be a single line", field));
            }
        }
        if !upload.is_closed() {
            return Err(match upload.state() {
                super::upload::UploadState::Failed(reason) => reason.clone(),
                _ => UploadError::Missing,
            }
            .into());
        }

        let placed = upload.persist(&id.to_string())?;
        let image_ref = placed.to_string_lossy();

        let candidate = match self.candidates.append(id, name, party, &image_ref) {
            Ok(candidate) => candidate,
            Err(e) => {
                if let Err(remove) = std::fs::remove_file(&placed) {
                    tracing::warn!(
                        "Failed to remove orphaned portrait {}: {}",
                        placed.display(),
                        remove
                    );
                }
                return Err(e);
            }
        };
        self.candidates.reload()?;
        Ok(candidate)
    }

    pub fn add_voter(&self, password: &str, aadhar: &str, name: &str) -> Result<VoterRecord> {
        self.admin.authorize(password)?;
        self.voters.append(aadhar.trim(), name.trim())
    }

    pub fn change_state(&self, password: &str, transition: Transition) -> Result<ElectionPhase> {
        self.admin.authorize(password)?;
        self.state.apply(transition, &self.ledgers)
    }

    pub fn set_name(&self, password: &str, name: &str) -> Result<()> {
        self.admin.authorize(password)?;
        self.state.set_name(name)
    }

    /// Tally against a fresh read of the registry
    pub fn results(&self, password: &str) -> Result<ResultsReport> {
        self.admin.authorize(password)?;

        let candidates = self.candidates.reload()?;
        let tally = self.ledgers.tally(&candidates)?;
        Ok(ResultsReport {
            election_name: self.state.name()?,
            phase: self.state.phase()?,
            outcome: tally.outcome(),
            tally,
        })
    }

    /// Raw bytes of a stored portrait
    ///
    /// `image_ref` is used as given; the caller must have resolved it safely.
    pub fn image(&self, image_ref: impl AsRef<Path>) -> Result<StoredImage> {
        let path = image_ref.as_ref();
        let bytes = std::fs::read(path).map_err(|e| Error::storage(path, e))?;
        Ok(StoredImage {
            content_type: content_type_for(path),
            bytes,
        })
    }

    pub fn ledgers(&self) -> &Ledgers {
        &self.ledgers
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }
}

fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}
