//! Election lifecycle, admin access, portrait uploads and the request-facing service

pub mod admin;
pub mod service;
pub mod state;
pub mod upload;

pub use admin::AdminCredential;
pub use service::ElectionService;
pub use state::{DEFAULT_ELECTION_NAME, ElectionState};
pub use upload::{MAX_UPLOAD_BYTES, UploadChunk, UploadSession, UploadState};
