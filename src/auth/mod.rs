//! # Auth Module
//!
//! API key authentication.

pub mod crypto;
pub mod errors;
pub mod verifier;

pub use errors::{AuthError, AuthResult};
pub use verifier::ApiKeyVerifier;
