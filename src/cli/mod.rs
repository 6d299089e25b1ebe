//! CLI module
//!
//! Provides command-line interface for:
//! - serve: Boot the engine and serve HTTP
//! - hash-key: Print an API key digest
//! - call: One-shot operation execution

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{boot, call, hash_key, run, run_command, serve};
pub use errors::{CliError, CliErrorCode, CliResult};
