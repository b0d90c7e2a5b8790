//! Configuration management for the election data layer
//!
//! Loads storage locations and limits from environment variables (with `.env`
//! support) and validates them.

use crate::election::upload::MAX_UPLOAD_BYTES;
use crate::{Result, config_error};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File names inside the data directory
pub const CANDIDATES_FILE: &str = "candidates.txt";
pub const VOTERS_FILE: &str = "voters.txt";
pub const TURNOUT_FILE: &str = "voted.txt";
pub const BALLOTS_FILE: &str = "votes.txt";
pub const STATE_FILE: &str = "election_state.txt";
pub const NAME_FILE: &str = "election_name.txt";
pub const ADMIN_CREDENTIAL_FILE: &str = "admin.txt";

/// Where the ledgers and uploaded images live
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding every flat-file ledger
    pub data_dir: PathBuf,

    /// Directory holding candidate portraits (and staged uploads)
    pub upload_dir: PathBuf,

    /// Maximum accepted image size in bytes (default: 5 MiB)
    pub max_upload_bytes: u64,
}

impl StorageConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            upload_dir: data_dir.join("uploads"),
            data_dir,
            max_upload_bytes: MAX_UPLOAD_BYTES,
        }
    }

    pub fn candidates_path(&self) -> PathBuf {
        self.data_dir.join(CANDIDATES_FILE)
    }

    pub fn voters_path(&self) -> PathBuf {
        self.data_dir.join(VOTERS_FILE)
    }

    pub fn turnout_path(&self) -> PathBuf {
        self.data_dir.join(TURNOUT_FILE)
    }

    pub fn ballots_path(&self) -> PathBuf {
        self.data_dir.join(BALLOTS_FILE)
    }

    pub fn state_path(&self) -> PathBuf {
        self.data_dir.join(STATE_FILE)
    }

    pub fn name_path(&self) -> PathBuf {
        self.data_dir.join(NAME_FILE)
    }
}

/// Admin credential location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// File containing the single admin token
    pub credential_file: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub admin: AdminConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from environment
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if present
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from any key/value source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let data_dir = PathBuf::from(lookup("VOTE_DATA_DIR").unwrap_or_else(|| "data".to_string()));
        if data_dir.as_os_str().is_empty() {
            return Err(config_error!("VOTE_DATA_DIR must not be empty"));
        }

        let mut storage = StorageConfig::new(&data_dir);
        if let Some(upload_dir) = lookup("VOTE_UPLOAD_DIR") {
            storage.upload_dir = PathBuf::from(upload_dir);
        }
        if let Some(max) = lookup("VOTE_MAX_UPLOAD_BYTES") {
            storage.max_upload_bytes = max
                .trim()
                .parse()
                .map_err(|_| config_error!("Invalid VOTE_MAX_UPLOAD_BYTES: {}", max))?;
        }
        if storage.max_upload_bytes == 0 {
            return Err(config_error!("VOTE_MAX_UPLOAD_BYTES must be greater than zero"));
        }

        let admin = AdminConfig {
            credential_file: lookup("VOTE_ADMIN_CREDENTIAL_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join(ADMIN_CREDENTIAL_FILE)),
        };

        let logging = LoggingConfig {
            level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            format: lookup("LOG_FORMAT").unwrap_or_else(|| "compact".to_string()),
        };

        Ok(Self {
            storage,
            admin,
            logging,
        })
    }

    /// Create configuration for testing rooted at `root`
    pub fn for_testing(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            storage: StorageConfig::new(root),
            admin: AdminConfig {
                credential_file: root.join(ADMIN_CREDENTIAL_FILE),
            },
            logging: LoggingConfig {
                level: "debug".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}
