//! # Observability
//!
//! Process-wide `tracing` subscriber. Operation spans and events are
//! emitted by the pipeline's observe middleware.

use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber
///
/// `RUST_LOG` wins over `default_level` when set. Calling this more than
/// once is harmless; later calls leave the first subscriber in place.
pub fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}
