//! # Auth Errors
//!
//! Error types for the authentication module.

use thiserror::Error;

/// Result type for auth operations
pub type AuthResult<T> = Result<T, AuthError>;

/// Authentication errors
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// Configured digest is not 64 hex characters
    #[error("Configured API key digest is malformed: {0}")]
    MalformedDigest(String),

    /// No key was presented, or it did not match
    #[error("Invalid API key")]
    InvalidApiKey,
}

impl AuthError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::MalformedDigest(_) => 500,
            // Key rejections are reported through the operation envelope
            AuthError::InvalidApiKey => 500,
        }
    }
}
