//! # API Key Verification
//!
//! A single shared key guards every operation. The verifier holds only
//! the key's digest and answers whether a presented key hashes to it.

use std::fmt;

use super::crypto::{constant_time_str_eq, is_digest, sha256_hex, DIGEST_HEX_LEN};
use super::errors::{AuthError, AuthResult};

/// Checks presented API keys against a configured SHA-256 digest
#[derive(Clone)]
pub struct ApiKeyVerifier {
    digest: String,
}

impl ApiKeyVerifier {
    /// Create from a hex digest; case is ignored
    pub fn new(digest: &str) -> AuthResult<Self> {
        let digest = digest.trim().to_lowercase();
        if !is_digest(&digest) {
            return Err(AuthError::MalformedDigest(format!(
                "expected {} hex characters, got {}",
                DIGEST_HEX_LEN,
                digest.len()
            )));
        }
        Ok(Self { digest })
    }

    /// Create from the plaintext key
    pub fn from_key(key: &str) -> Self {
        Self {
            digest: sha256_hex(key),
        }
    }

    /// Whether `key` is present and hashes to the configured digest
    pub fn verify(&self, key: Option<&str>) -> bool {
        match key {
            Some(key) => constant_time_str_eq(&sha256_hex(key), &self.digest),
            None => false,
        }
    }

    /// Like [`verify`](Self::verify) but as a `Result`
    pub fn check(&self, key: Option<&str>) -> AuthResult<()> {
        if self.verify(key) {
            Ok(())
        } else {
            Err(AuthError::InvalidApiKey)
        }
    }
}

impl fmt::Debug for ApiKeyVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeyVerifier")
            .field("digest", &format!("{}...", &self.digest[..8]))
            .finish()
    }
}
