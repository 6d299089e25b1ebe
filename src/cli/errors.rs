//! CLI-specific error types
//!
//! Every CLI error ends the process. The code is printed with the
//! message; the exit status follows sysexits(3).

use std::io;

use thiserror::Error;

use crate::config::ConfigError;

/// Stable CLI error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Config file, environment or digest problem
    Config,
    /// Reading arguments or writing stdout
    Io,
    /// Runtime, pool or listener did not come up
    BootFailed,
}

impl CliErrorCode {
    pub fn code(self) -> &'static str {
        match self {
            Self::Config => "TABLEGATE_CLI_CONFIG_ERROR",
            Self::Io => "TABLEGATE_CLI_IO_ERROR",
            Self::BootFailed => "TABLEGATE_CLI_BOOT_FAILED",
        }
    }

    /// Process exit status
    pub fn exit_status(self) -> i32 {
        match self {
            Self::Config => 78,
            Self::Io => 74,
            Self::BootFailed => 69,
        }
    }
}

/// CLI error
#[derive(Debug, Error)]
#[error("{}: {}", .code.code(), .message)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::Config, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::Io, msg)
    }

    pub fn boot_failed(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::BootFailed, msg)
    }

    pub fn code(&self) -> CliErrorCode {
        self.code
    }

    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("Invalid JSON: {}", e))
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::config_error(e.to_string())
    }
}

pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_code() {
        let err = CliError::boot_failed("pool");
        assert_eq!(err.to_string(), "TABLEGATE_CLI_BOOT_FAILED: pool");
        assert_eq!(err.code(), CliErrorCode::BootFailed);
        assert_eq!(err.code().exit_status(), 69);
    }

    #[test]
    fn test_config_error_conversion() {
        let err: CliError = ConfigError::MissingApiKey.into();
        assert_eq!(err.code_str(), "TABLEGATE_CLI_CONFIG_ERROR");
        assert_eq!(err.code().exit_status(), 78);
        assert!(err.message().contains("API_KEY"));
    }
}
