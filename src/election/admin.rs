//! Shared admin secret

use crate::{Error, Result, config_error};
use std::fmt;
use std::path::Path;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

/// Admin password loaded once at startup and compared verbatim
#[derive(Clone)]
pub struct AdminCredential {
    secret: Zeroizing<String>,
}

impl AdminCredential {
    pub fn new(secret: impl Into<String>) -> Result<Self> {
        let secret = Zeroizing::new(secret.into());
        if secret.is_empty() {
            return Err(config_error!("admin credential must not be empty"));
        }
        Ok(Self { secret })
    }

    /// Read the single token from `path`. Trailing line endings are ignored.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents =
            Zeroizing::new(std::fs::read_to_string(path).map_err(|e| Error::storage(path, e))?);
        let token = contents.trim_end_matches(['\n', '\r']);
        if token.is_empty() {
            return Err(config_error!(
                "admin credential file {} is empty",
                path.display()
            ));
        }
        Self::new(token)
    }

    /// Constant-time comparison against a submitted password
    pub fn verify(&self, submitted: &str) -> bool {
        self.secret.as_bytes().ct_eq(submitted.as_bytes()).into()
    }

    /// `Ok(())` when `submitted` matches, [`Error::Auth`] otherwise
    pub fn authorize(&self, submitted: &str) -> Result<()> {
        if self.verify(submitted) {
            Ok(())
        } else {
            tracing::warn!("🔐 Admin authentication failed");
            Err(Error::Auth)
        }
    }
}

impl fmt::Debug for AdminCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminCredential")
            .field("secret", &"<redacted>")
            .finish()
    }
}
