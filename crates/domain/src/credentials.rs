//! Application credentials for the client-credentials grant.
//!
//! A [`Credentials`] value is immutable for the lifetime of a client. Its
//! [`Credentials::fingerprint`] is persisted next to the cached token so a
//! later run with different credentials can detect that the cache belongs to
//! someone else.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Application id + secret pair.
///
/// `Debug` is manually implemented to redact the secret.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub application: String,
    pub password: String,
}

impl Credentials {
    pub fn new(application: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            application: application.into(),
            password: password.into(),
        }
    }

    /// Deterministic content hash of the credential pair.
    ///
    /// Used only as a change detector for cached tokens, never as a secret.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.application.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.password.as_bytes());
        hex::encode(&hasher.finalize()[..16])
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("application", &self.application)
            .field("password", &"[REDACTED]")
            .finish()
    }
}
