//! Error handling for the election data layer

use crate::types::{ElectionPhase, Transition};
use std::path::{Path, PathBuf};

/// Result type alias for the election data layer
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the election data layer
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A required field was empty or malformed
    #[error("Validation failed: {field}")]
    Validation { field: String },

    /// Submitted admin password did not match the credential
    #[error("Authentication failed")]
    Auth,

    /// No voter record matches the submitted aadhar and name
    #[error("Voter is not registered")]
    NotRegistered,

    /// A turnout entry already exists for the submitted aadhar
    #[error("Voter has already cast a ballot")]
    AlreadyVoted,

    /// The ballot carried no candidate choice
    #[error("No candidate selected")]
    NoSelection,

    /// Votes are only accepted while the election is live
    #[error("Election is not accepting votes (phase: {phase})")]
    ElectionNotLive { phase: ElectionPhase },

    /// Lifecycle transition not permitted from the persisted phase
    #[error("Cannot {transition} election while {phase}")]
    InvalidTransition {
        transition: Transition,
        phase: ElectionPhase,
    },

    /// Image upload rejected mid-stream or at completion
    #[error("Upload rejected: {0}")]
    Upload(#[from] UploadError),

    /// Underlying file I/O failure
    #[error("Storage error at {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Reasons an upload session can fail
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    #[error("file exceeds the {limit} byte limit")]
    TooLarge { limit: u64 },

    #[error("unsupported content type '{content_type}'")]
    BadType { content_type: String },

    #[error("write failure: {message}")]
    WriteFailure { message: String },

    #[error("no image was received")]
    Missing,
}

impl Error {
    /// Create a new validation error
    pub fn validation(field: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
        }
    }

    /// Create a new storage error for `path`
    pub fn storage(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Storage {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Storage error for a file whose contents could not be understood
    pub fn corrupt(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Self::storage(
            path,
            std::io::Error::new(std::io::ErrorKind::InvalidData, message.into()),
        )
    }

    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether this is a business-rule rejection the caller should render,
    /// as opposed to an infrastructure failure.
    pub fn is_rejection(&self) -> bool {
        !matches!(
            self,
            Self::Storage { .. } | Self::Config { .. } | Self::Serialization(_)
        )
    }
}

impl UploadError {
    pub fn write_failure(message: impl Into<String>) -> Self {
        Self::WriteFailure {
            message: message.into(),
        }
    }
}

/// Convenience macros for creating specific error types
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::Error::config($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::Error::config(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! validation_error {
    ($msg:expr) => {
        $crate::Error::validation($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::Error::validation(format!($fmt, $($arg)*))
    };
}
