//! File-backed election ledger
//!
//! Candidate registry, voter roll, turnout and ballot ledgers, the election
//! lifecycle gate, and streaming portrait uploads. Every durable write goes
//! through an advisory-locked flat file; the request layer drives it all
//! through [`election::ElectionService`].

pub mod config;
pub mod election;
pub mod errors;
pub mod storage;
pub mod types;

// Re-export commonly used types
pub use election::ElectionService;
pub use errors::{Error, Result, UploadError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize logging with the default filter
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "votebox=info".into()),
        )
        .try_init()
        .map_err(|e| config_error!("logging already initialized: {}", e))?;

    tracing::info!("🗳️  Election store v{} initialized", VERSION);
    Ok(())
}

/// Initialize logging from [`config::LoggingConfig`]
pub fn init_with(logging: &config::LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_new(format!("votebox={}", logging.level))
        .map_err(|e| config_error!("Invalid LOG_LEVEL '{}': {}", logging.level, e))?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let installed = match logging.format.as_str() {
        "pretty" => builder.pretty().try_init(),
        "compact" => builder.compact().try_init(),
        other => return Err(config_error!("Unsupported LOG_FORMAT '{}'", other)),
    };
    installed.map_err(|e| config_error!("logging already initialized: {}", e))?;

    tracing::info!("🗳️  Election store v{} initialized", VERSION);
    Ok(())
}

/// Shorten a voter identifier for logs to its last four characters
pub fn mask_identifier(id: &str) -> String {
    let chars: Vec<char> = id.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let visible: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}", "*".repeat(chars.len() - 4), visible)
}
