//! CLI command implementations
//!
//! `serve` and `call` boot the same way: load config, start logging,
//! open the store, build the engine. `hash-key` needs none of that.

use std::path::Path;
use std::sync::Arc;

use tokio::runtime::Runtime;
use tracing::info;

use crate::auth::crypto::sha256_hex;
use crate::config::Config;
use crate::core::Engine;
use crate::http_server::HttpServer;
use crate::observability::init_logging;
use crate::store::{MemoryStore, PgStore, Store};

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};
use super::io::{parse_payload, write_value};

/// Parse arguments and run the selected command
pub fn run() -> CliResult<()> {
    run_command(Cli::parse_args().command)
}

/// Run a parsed command
pub fn run_command(command: Command) -> CliResult<()> {
    match command {
        Command::HashKey { key } => hash_key(&key),
        Command::Serve {
            config,
            port,
            memory,
        } => runtime()?.block_on(serve(config.as_deref(), port, memory)),
        Command::Call {
            operation,
            api_key,
            data,
            config,
            memory,
        } => runtime()?.block_on(call(
            &operation,
            &api_key,
            data.as_deref(),
            config.as_deref(),
            memory,
        )),
    }
}

fn runtime() -> CliResult<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::boot_failed(format!("Failed to start runtime: {}", e)))
}

/// Print the digest of `key`
pub fn hash_key(key: &str) -> CliResult<()> {
    println!("{}", sha256_hex(key));
    Ok(())
}

/// Load config and build the engine over the selected store
pub fn boot(config: &Config, memory: bool) -> CliResult<Engine> {
    let store: Arc<dyn Store> = if memory {
        Arc::new(MemoryStore::new())
    } else {
        let pg = PgStore::new(&config.postgres)
            .map_err(|e| CliError::boot_failed(format!("Failed to build connection pool: {}", e)))?;
        Arc::new(pg)
    };

    let verifier = config.verifier()?;
    info!(
        store = store.kind(),
        timeout_ms = config.operation_timeout_ms,
        "engine ready"
    );
    Ok(Engine::new(store, verifier, config.operation_timeout()))
}

/// Serve the HTTP API
pub async fn serve(config_path: Option<&Path>, port: Option<u16>, memory: bool) -> CliResult<()> {
    let mut config = Config::load(config_path)?;
    if let Some(port) = port {
        config.http.port = port;
    }
    init_logging(&config.log_level);

    let engine = Arc::new(boot(&config, memory)?);
    HttpServer::new(config.http.clone(), engine)
        .start()
        .await
        .map_err(|e| CliError::boot_failed(format!("HTTP server failed: {}", e)))
}

/// Run one operation and print its response
pub async fn call(
    operation: &str,
    api_key: &str,
    data: Option<&str>,
    config_path: Option<&Path>,
    memory: bool,
) -> CliResult<()> {
    let payload = parse_payload(data)?;
    let config = Config::load(config_path)?;
    init_logging(&config.log_level);

    let engine = boot(&config, memory)?;
    let response = engine.call(operation, Some(api_key), payload).await;
    write_value(&response.to_json())
}
