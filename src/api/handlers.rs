use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::alerts::{AlertKey, AlertState, AlertStateStore};
use crate::model::{AlertEvent, DeviceId, Sample};
use crate::repository::{MemoryRepository, RepositoryError};
use crate::scheduler::{SchedulerStats, TaskStats};

/// Application state shared across handlers
pub struct AppState {
    pub repository: Arc<MemoryRepository>,
    pub alert_states: Arc<AlertStateStore>,
    pub scheduler_stats: SchedulerStats,
}

// ============================================================================
// Health Check
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============================================================================
// Stats
// ============================================================================

#[derive(Serialize)]
pub struct StatsResponse {
    pub tasks: BTreeMap<String, TaskStats>,
    pub devices: usize,
    pub tracked_alert_keys: usize,
    pub violating_alert_keys: usize,
}

pub async fn stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    Json(StatsResponse {
        tasks: state.scheduler_stats.snapshot(),
        devices: state.repository.device_count(),
        tracked_alert_keys: state.alert_states.len(),
        violating_alert_keys: state.alert_states.violating_count(),
    })
}

// ============================================================================
// Alert State
// ============================================================================

#[derive(Serialize)]
pub struct AlertStateEntry {
    #[serde(flatten)]
    pub key: AlertKey,
    #[serde(flatten)]
    pub state: AlertState,
}

pub async fn alert_states(State(state): State<Arc<AppState>>) -> Json<Vec<AlertStateEntry>> {
    Json(
        state
            .alert_states
            .snapshot()
            .into_iter()
            .map(|(key, state)| AlertStateEntry { key, state })
            .collect(),
    )
}

// ============================================================================
// Sample Ingest
// ============================================================================

#[derive(Deserialize)]
pub struct IngestRequest {
    pub device_id: DeviceId,
    /// Device-reported time, defaults to receive time
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub ph: Option<f64>,
    #[serde(default)]
    pub dissolved_oxygen: Option<f64>,
    #[serde(default)]
    pub tds: Option<f64>,
    #[serde(default)]
    pub ammonia: Option<f64>,
    #[serde(default)]
    pub salinity: Option<f64>,
}

#[derive(Serialize)]
pub struct IngestResponse {
    pub device_id: DeviceId,
    pub received_at: DateTime<Utc>,
}

pub async fn ingest_sample(
    State(state): State<Arc<AppState>>,
    Json(request): Json<IngestRequest>,
) -> Result<(StatusCode, Json<IngestResponse>), ApiError> {
    let received_at = Utc::now();
    let sample = Sample {
        device_id: request.device_id,
        timestamp: request.timestamp.unwrap_or(received_at),
        temperature: request.temperature,
        ph: request.ph,
        dissolved_oxygen: request.dissolved_oxygen,
        tds: request.tds,
        ammonia: request.ammonia,
        salinity: request.salinity,
    };

    state.repository.record_sample(sample, received_at)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(IngestResponse {
            device_id: request.device_id,
            received_at,
        }),
    ))
}

// ============================================================================
// Events
// ============================================================================

#[derive(Deserialize)]
pub struct EventsQuery {
    pub device_id: Option<DeviceId>,
    pub limit: Option<usize>,
}

/// Persisted alert and recovery events, newest first
pub async fn list_events(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<Vec<AlertEvent>>, ApiError> {
    let limit = query.limit.unwrap_or(100);
    if limit == 0 || limit > 1000 {
        return Err(ApiError::BadRequest(
            "limit must be between 1 and 1000".to_string(),
        ));
    }

    let mut events = match query.device_id {
        Some(device_id) => {
            if state.repository.device(device_id).is_none() {
                return Err(ApiError::NotFound(format!("Device {} not found", device_id)));
            }
            state.repository.events_for_device(device_id)
        }
        None => {
            let mut events = state.repository.events();
            events.reverse();
            events
        }
    };
    events.truncate(limit);

    Ok(Json(events))
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Unavailable(String),
    Internal(String),
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::DeviceNotFound(_) | RepositoryError::EventNotFound(_) => {
                ApiError::NotFound(err.to_string())
            }
            RepositoryError::Unavailable(_) => ApiError::Unavailable(err.to_string()),
            RepositoryError::Seed(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
