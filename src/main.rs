//! Pondwatch service
//!
//! Run with: cargo run
//!
//! Environment variables:
//! - PONDWATCH_HOST: Bind address (default: 0.0.0.0)
//! - PONDWATCH_PORT: Port number (default: 8080)
//! - PONDWATCH_ALERT_INTERVAL_SECS: Threshold evaluation interval (default: 60)
//! - PONDWATCH_LIVENESS_INTERVAL_SECS: Liveness evaluation interval (default: 60)
//! - PONDWATCH_DEFAULT_COOLDOWN_MINUTES: Repeat-alert cooldown when the owner has none (default: 30)
//! - PONDWATCH_FAILURE_BACKOFF_SECS: Retry delay after a failed tick (default: 10)
//! - PONDWATCH_EVAL_CONCURRENCY: Devices evaluated in parallel (default: 8)
//! - PONDWATCH_SEED_FILE: JSON file of owners, devices and samples to load at startup
//! - PONDWATCH_PUSH_URL: Push gateway endpoint; notifications are only logged when unset
//! - PONDWATCH_PUSH_TIMEOUT_SECS: Push request timeout (default: 10)
//! - RUST_LOG: Log level (default: info)

use pondwatch::api::run_server;
use pondwatch::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pondwatch=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    tracing::info!("Pondwatch configuration:");
    tracing::info!("  Listen: {}:{}", config.host, config.port);
    tracing::info!("  Alert interval: {:?}", config.alert_interval);
    tracing::info!("  Liveness interval: {:?}", config.liveness_interval);
    tracing::info!(
        "  Default cooldown: {} minutes",
        config.default_cooldown_minutes
    );
    tracing::info!("  Failure backoff: {:?}", config.failure_backoff);
    tracing::info!("  Evaluation concurrency: {}", config.eval_concurrency);

    run_server(config).await
}
