pub mod config;
pub mod connectivity;
pub mod consultation; // Multi-turn triage state machine
pub mod db;
pub mod escalation;
pub mod language;
pub mod models;
pub mod oracle; // Inference calls + fallback
pub mod store;
pub mod trend_analyzer;

use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .try_init();
}
