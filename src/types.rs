//! # Core Types for the Election Data Layer
//!
//! This module defines the records persisted in the flat-file ledgers and the
//! structured values returned to the request layer for rendering.
//!
//! ## Type Categories
//!
//! ### Persisted Records
//! - [`Candidate`]: Registry entry with a derived vote count
//! - [`VoterRecord`]: Voter roll entry (exact-match key)
//! - [`ElectionPhase`]: Persisted lifecycle gate
//!
//! ### Results
//! - [`VoteReceipt`]: Acknowledgement of an accepted ballot
//! - [`Tally`]: Per-candidate counts derived from the ballot ledger
//! - [`Outcome`]: Winner, tie, or no votes cast
//! - [`ResultsReport`]: Everything the results page needs
//!
//! ## Usage Examples
//!
//! ```rust
//! use votebox::types::{Candidate, Outcome, Tally};
//!
//! let mut alice = Candidate::new(1, "Alice", "Blue", "uploads/1.jpg");
//! let mut bob = Candidate::new(2, "Bob", "Green", "uploads/2.png");
//! alice.votes = 2;
//! bob.votes = 1;
//!
//! let tally = Tally {
//!     candidates: vec![alice, bob],
//!     total_votes: 3,
//!     unattributed_votes: 0,
//! };
//!
//! match tally.outcome() {
//!     Outcome::Winner(winner) => assert_eq!(winner.name, "Alice"),
//!     other => panic!("unexpected outcome: {other:?}"),
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Candidate identifier as written to the ballot ledger
pub type CandidateId = i64;

/// A candidate standing in the election
///
/// Stored as `id,name,party,imageRef`. The `votes` field is never persisted;
/// it is filled in by [`crate::storage::Ledgers::tally`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candidate {
    /// Identifier voters submit on their ballot
    ///
    /// Uniqueness is not enforced by the registry.
    pub id: CandidateId,

    /// Display name
    pub name: String,

    /// Party or symbol shown next to the name
    pub party: String,

    /// Location of the candidate portrait
    pub image_ref: String,

    /// Derived vote count
    #[serde(default)]
    pub votes: u64,
}

impl Candidate {
    pub fn new(
        id: CandidateId,
        name: impl Into<String>,
        party: impl Into<String>,
        image_ref: impl Into<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            party: party.into(),
            image_ref: image_ref.into(),
            votes: 0,
        }
    }

    /// Parse one registry line. Returns `None` for malformed records.
    pub(crate) fn parse_record(line: &str) -> Option<Self> {
        let mut fields = line.splitn(4, ',');
        let id = fields.next()?.trim().parse().ok()?;
        let name = fields.next()?;
        let party = fields.next()?;
        let image_ref = fields.next()?;

        if name.is_empty() || party.is_empty() || image_ref.is_empty() {
            return None;
        }

        Some(Self::new(id, name, party, image_ref))
    }

    /// Registry line for this candidate (no delimiter escaping).
    pub(crate) fn to_record(&self) -> String {
        format!("{},{},{},{}", self.id, self.name, self.party, self.image_ref)
    }
}

/// A registered voter
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoterRecord {
    /// Opaque identity number, matched exactly
    pub aadhar: String,

    /// Full name, matched exactly
    pub name: String,
}

impl VoterRecord {
    pub fn new(aadhar: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            aadhar: aadhar.into(),
            name: name.into(),
        }
    }

    pub(crate) fn parse_record(line: &str) -> Option<Self> {
        let (aadhar, name) = line.split_once(',')?;
        Some(Self::new(aadhar, name))
    }

    pub(crate) fn to_record(&self) -> String {
        format!("{},{}", self.aadhar, self.name)
    }

    pub fn matches(&self, aadhar: &str, name: &str) -> bool {
        self.aadhar == aadhar && self.name == name
    }
}

/// Election lifecycle phase
///
/// ```text
/// PREP --start--> LIVE --stop--> CLOSED --reset--> PREP
///                   ^               |
///                   +----start------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum ElectionPhase {
    /// Setup allowed, voting closed
    #[default]
    Prep,
    /// Voting open
    Live,
    /// Voting closed, results final
    Closed,
}

impl ElectionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prep => "PREP",
            Self::Live => "LIVE",
            Self::Closed => "CLOSED",
        }
    }

    pub fn is_accepting_votes(&self) -> bool {
        matches!(self, Self::Live)
    }

    /// Phase reached by applying `transition`, or `None` if the transition is
    /// not permitted from this phase.
    pub fn after(self, transition: Transition) -> Option<Self> {
        match (transition, self) {
            (Transition::Start, Self::Prep | Self::Closed) => Some(Self::Live),
            (Transition::Stop, Self::Live) => Some(Self::Closed),
            (Transition::Reset, Self::Prep | Self::Closed) => Some(Self::Prep),
            _ => None,
        }
    }
}

impl fmt::Display for ElectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElectionPhase {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "PREP" => Ok(Self::Prep),
            "LIVE" => Ok(Self::Live),
            "CLOSED" => Ok(Self::Closed),
            other => Err(format!("unknown election phase '{other}'")),
        }
    }
}

/// Admin-triggered lifecycle transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    Start,
    Stop,
    Reset,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Reset => "reset",
        })
    }
}

impl FromStr for Transition {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            "reset" => Ok(Self::Reset),
            other => Err(format!("unknown transition '{other}'")),
        }
    }
}

/// Acknowledgement returned for an accepted ballot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VoteReceipt {
    pub candidate_id: CandidateId,
    pub recorded_at: DateTime<Utc>,
}

/// Vote counts derived from a full scan of the ballot ledger
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Tally {
    /// Registry snapshot with `votes` filled in
    pub candidates: Vec<Candidate>,

    /// Every well-formed ballot entry, attributed or not
    pub total_votes: u64,

    /// Ballots naming an id absent from the registry
    pub unattributed_votes: u64,
}

/// Result of an election according to the winner rule
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// One candidate holds the strictly highest count
    Winner(Candidate),
    /// Two or more candidates share a maximum greater than zero
    Tie { leaders: Vec<Candidate>, votes: u64 },
    /// Highest count is zero
    NoVotes,
}

impl Tally {
    /// Apply the winner rule to this tally
    pub fn outcome(&self) -> Outcome {
        let max_votes = self.candidates.iter().map(|c| c.votes).max().unwrap_or(0);
        if max_votes == 0 {
            return Outcome::NoVotes;
        }

        let mut leaders: Vec<Candidate> = self
            .candidates
            .iter()
            .filter(|c| c.votes == max_votes)
            .cloned()
            .collect();

        if leaders.len() == 1 {
            Outcome::Winner(leaders.remove(0))
        } else {
            Outcome::Tie {
                leaders,
                votes: max_votes,
            }
        }
    }

    pub fn votes_for(&self, id: CandidateId) -> Option<u64> {
        self.candidates.iter().find(|c| c.id == id).map(|c| c.votes)
    }
}

/// Everything the results page renders
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResultsReport {
    pub election_name: String,
    pub phase: ElectionPhase,
    pub tally: Tally,
    pub outcome: Outcome,
}

impl ResultsReport {
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Text fields submitted with an add-candidate form
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CandidateForm {
    pub id: String,
    pub name: String,
    pub party: String,
}

/// Raw bytes of a stored candidate portrait
#[derive(Debug, Clone)]
pub struct StoredImage {
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}
