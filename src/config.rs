//! # Configuration
//!
//! Process configuration: a JSON file with serde defaults, then
//! environment overrides. Only the API key digest has no default.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::crypto::is_digest;
use crate::auth::ApiKeyVerifier;
use crate::http_server::HttpServerConfig;
use crate::store::PostgresConfig;

/// Default config file location
pub const DEFAULT_CONFIG_PATH: &str = "./tablegate.json";

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("Invalid config JSON in {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("API key digest is not configured (set API_KEY or api_key_digest)")]
    MissingApiKey,

    #[error("API key digest must be 64 hex characters")]
    InvalidDigest,

    #[error("Invalid value for {var}: {value}")]
    InvalidEnv { var: &'static str, value: String },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Hex SHA-256 of the API key
    #[serde(default)]
    pub api_key_digest: Option<String>,

    #[serde(default)]
    pub postgres: PostgresConfig,

    /// Bound on one operation, in milliseconds
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,

    #[serde(default)]
    pub http: HttpServerConfig,

    /// Default tracing filter; `RUST_LOG` takes precedence
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_operation_timeout_ms() -> u64 {
    30_000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key_digest: None,
            postgres: PostgresConfig::default(),
            operation_timeout_ms: default_operation_timeout_ms(),
            http: HttpServerConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load, apply process environment, validate
    ///
    /// An explicit path must exist. Without one, `./tablegate.json` is read
    /// if present and defaults are used otherwise.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_PATH))?
            }
            None => Self::default(),
        };

        config.apply_env(|var| std::env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a config file without overrides or validation
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Apply overrides from `lookup` (the process environment in production)
    pub fn apply_env<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(digest) = lookup("API_KEY") {
            self.api_key_digest = Some(digest);
        }
        if let Some(host) = lookup("POSTGRES_HOST") {
            self.postgres.host = host;
        }
        if let Some(port) = lookup("POSTGRES_PORT") {
            self.postgres.port = port.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                var: "POSTGRES_PORT",
                value: port.clone(),
            })?;
        }
        if let Some(dbname) = lookup("POSTGRES_DB") {
            self.postgres.dbname = dbname;
        }
        if let Some(user) = lookup("POSTGRES_USER") {
            self.postgres.user = user;
        }
        if let Some(password) = lookup("POSTGRES_PASSWORD") {
            self.postgres.password = Some(password);
        }
        Ok(())
    }

    /// Validate and normalize the digest
    pub fn validate(&mut self) -> ConfigResult<()> {
        let digest = self
            .api_key_digest
            .as_deref()
            .map(|d| d.trim().to_lowercase())
            .ok_or(ConfigError::MissingApiKey)?;
        if !is_digest(&digest) {
            return Err(ConfigError::InvalidDigest);
        }
        self.api_key_digest = Some(digest);

        if self.operation_timeout_ms == 0 {
            return Err(ConfigError::Invalid("operation_timeout_ms must be > 0".into()));
        }
        if self.postgres.pool_size == 0 {
            return Err(ConfigError::Invalid("postgres.pool_size must be > 0".into()));
        }
        Ok(())
    }

    /// Verifier for the configured digest
    pub fn verifier(&self) -> ConfigResult<ApiKeyVerifier> {
        let digest = self.api_key_digest.as_deref().ok_or(ConfigError::MissingApiKey)?;
        ApiKeyVerifier::new(digest).map_err(|_| ConfigError::InvalidDigest)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }
}
