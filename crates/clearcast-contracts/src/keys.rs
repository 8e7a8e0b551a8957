use std::fmt;

use sha2::{Digest, Sha256};

/// A generation-service credential. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Returns `None` for blank input.
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self(trimmed.to_string()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Stable short id safe to put in logs.
    pub fn redacted_id(&self) -> String {
        let digest = Sha256::digest(self.0.as_bytes());
        format!("key-{}", hex::encode(&digest[..4]))
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ApiKey").field(&self.redacted_id()).finish()
    }
}

/// Host-provided credential management.
///
/// `prompt_key_selection` blocks until the user finishes or dismisses the
/// selection UI; it reports nothing about the outcome, so callers re-check
/// with `has_key` afterwards.
pub trait KeyProvider {
    fn has_key(&self) -> bool;
    fn prompt_key_selection(&self);
    fn current_key(&self) -> Option<ApiKey>;
}
