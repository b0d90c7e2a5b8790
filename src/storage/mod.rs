//! Flat-file persistence for the election

pub mod candidates;
pub mod ledger;
pub mod locked_file;
pub mod voters;

pub use candidates::CandidateRegistry;
pub use ledger::Ledgers;
pub use locked_file::{LockMode, LockedFile, with_exclusive_write, with_shared_read};
pub use voters::VoterRoll;
