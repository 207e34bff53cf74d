use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::device::{DeviceId, OwnerId};
use super::sample::{Bound, Parameter};

pub type EventId = u64;

/// Kind of event handed to the notifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    SensorAlert,
    SensorRecovery,
    DeviceStatusChange,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::SensorAlert => "sensor_alert",
            EventKind::SensorRecovery => "sensor_recovery",
            EventKind::DeviceStatusChange => "device_status_change",
        }
    }
}

/// Alert or recovery record before it is persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAlertEvent {
    pub device_id: DeviceId,
    pub owner_id: OwnerId,
    pub kind: EventKind,
    pub parameter: Parameter,
    pub bound: Bound,
    pub limit: f64,
    pub observed: f64,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Persisted alert or recovery record. Only `delivered` is written after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub id: EventId,
    pub device_id: DeviceId,
    pub owner_id: OwnerId,
    pub kind: EventKind,
    pub parameter: Parameter,
    pub bound: Bound,
    pub limit: f64,
    pub observed: f64,
    pub message: String,
    pub delivered: bool,
    pub created_at: DateTime<Utc>,
}

impl AlertEvent {
    pub fn from_new(id: EventId, event: NewAlertEvent) -> Self {
        Self {
            id,
            device_id: event.device_id,
            owner_id: event.owner_id,
            kind: event.kind,
            parameter: event.parameter,
            bound: event.bound,
            limit: event.limit,
            observed: event.observed,
            message: event.message,
            delivered: false,
            created_at: event.created_at,
        }
    }
}
