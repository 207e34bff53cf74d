use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{alert_states, health_check, ingest_sample, list_events, stats, AppState};
use crate::alerts::{AlertStateStore, ThresholdAlertEngine};
use crate::config::Config;
use crate::liveness::LivenessMonitor;
use crate::notify::{LogNotifier, Notifier, WebhookNotifier};
use crate::repository::{MemoryRepository, Seed};
use crate::scheduler::{Schedule, Scheduler};

/// Build the application router
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Telemetry
        .route("/samples", post(ingest_sample))
        // Alerting
        .route("/events", get(list_events))
        .route("/alerts/state", get(alert_states))
        // Stats
        .route("/stats", get(stats))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Start both evaluation tasks and serve the ops API until Ctrl+C
pub async fn run_server(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let repository = Arc::new(match &config.seed_file {
        Some(path) => {
            let seed = Seed::from_file(path)?;
            tracing::info!(
                "Loaded seed {}: {} owners, {} devices, {} samples",
                path.display(),
                seed.owners.len(),
                seed.devices.len(),
                seed.samples.len()
            );
            MemoryRepository::from_seed(seed)
        }
        None => MemoryRepository::new(),
    });

    let notifier: Arc<dyn Notifier> = match &config.push_url {
        Some(url) => {
            tracing::info!("Push notifications via {}", url);
            Arc::new(WebhookNotifier::new(url.clone(), config.push_timeout)?)
        }
        None => {
            tracing::info!("No push gateway configured, notifications are logged only");
            Arc::new(LogNotifier)
        }
    };

    // Hysteresis memory lives for the process; a restart starts clean
    let alert_states = Arc::new(AlertStateStore::new());

    let alert_engine = ThresholdAlertEngine::new(
        repository.clone(),
        Arc::clone(&notifier),
        Arc::clone(&alert_states),
    )
    .with_default_cooldown(config.default_cooldown_minutes)
    .with_concurrency(config.eval_concurrency);
    let liveness = LivenessMonitor::new(repository.clone(), Arc::clone(&notifier));

    let mut scheduler = Scheduler::new();
    scheduler.spawn(
        Arc::new(alert_engine),
        Schedule {
            interval: config.alert_interval,
            failure_backoff: config.failure_backoff,
        },
    );
    scheduler.spawn(
        Arc::new(liveness),
        Schedule {
            interval: config.liveness_interval,
            failure_backoff: config.failure_backoff,
        },
    );

    let state = Arc::new(AppState {
        repository,
        alert_states,
        scheduler_stats: scheduler.stats(),
    });
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!("Starting pondwatch on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Waiting for in-flight ticks to finish");
    scheduler.shutdown().await;

    tracing::info!("pondwatch stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
