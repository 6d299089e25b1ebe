//! CLI argument definitions using clap
//!
//! Commands:
//! - tablegate serve [--config <path>] [--port <n>] [--memory]
//! - tablegate hash-key <key>
//! - tablegate call <operation> --api-key <key> [--data <json>]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// tablegate - remote table, column and row management for PostgreSQL
#[derive(Parser, Debug)]
#[command(name = "tablegate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the HTTP API
    Serve {
        /// Path to configuration file (default: ./tablegate.json if present)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the configured HTTP port
        #[arg(long)]
        port: Option<u16>,

        /// Use the in-process store instead of PostgreSQL
        #[arg(long)]
        memory: bool,
    },

    /// Print the SHA-256 digest to configure as API_KEY
    HashKey {
        /// The API key to hash
        key: String,
    },

    /// Run a single operation and print the response
    Call {
        /// Operation name, e.g. list_tables or create_table
        operation: String,

        /// API key to authenticate with
        #[arg(long)]
        api_key: String,

        /// JSON payload
        #[arg(long)]
        data: Option<String>,

        /// Path to configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Use the in-process store instead of PostgreSQL
        #[arg(long)]
        memory: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_call() {
        let cli = Cli::try_parse_from([
            "tablegate",
            "call",
            "create_table",
            "--api-key",
            "k",
            "--data",
            r#"{"table_name": "pets"}"#,
            "--memory",
        ])
        .unwrap();

        match cli.command {
            Command::Call {
                operation,
                api_key,
                data,
                memory,
                ..
            } => {
                assert_eq!(operation, "create_table");
                assert_eq!(api_key, "k");
                assert!(data.is_some());
                assert!(memory);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_serve_defaults() {
        let cli = Cli::try_parse_from(["tablegate", "serve"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Serve {
                config: None,
                port: None,
                memory: false
            }
        ));
    }
}
