//! Tempest relay: single-endpoint HTTP relay that streams photo previews
//! from the Tempest image API to browsers, translating upstream failures
//! into a stable JSON error surface.

mod config;
mod error;
mod page;
mod relay;
mod server;

use std::time::Duration;

use config::RelayConfig;
use server::AppState;

fn main() -> anyhow::Result<()> {
    // Determine config path
    let config_path = {
        let args: Vec<String> = std::env::args().collect();
        // Check for --config flag first
        args.iter()
            .position(|a| a == "--config")
            .and_then(|i| args.get(i + 1).cloned())
            // Fall back to positional arg
            .or_else(|| args.get(1).filter(|a| !a.starts_with('-')).cloned())
            .or_else(|| std::env::var("TEMPEST_RELAY_CONFIG").ok())
            .unwrap_or_else(|| "tempest-relay.toml".to_string())
    };

    // Load configuration
    let config = RelayConfig::load(&config_path)?;

    init_tracing(&config.log_level);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        tracing::info!(
            config_path = %config_path,
            listen_address = %config.server.listen_address,
            upstream_base = %config.upstream.base_url,
            upstream_timeout_secs = config.upstream.timeout_secs,
            "Starting tempest-relay"
        );

        run(config).await
    })
}

/// Structured log lines to stdout; `RUST_LOG` overrides the configured level.
fn init_tracing(log_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(config: RelayConfig) -> anyhow::Result<()> {
    // One pooled client for all upstream calls; the timeout is a
    // per-request deadline, not a pool-wide budget.
    let upstream_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.upstream.timeout_secs))
        .build()?;

    let state = AppState {
        config,
        upstream_client,
    };

    server::run(state).await
}
