//! Push notification capability
//!
//! The engines hand every alert, recovery and status change to a
//! [`Notifier`]. Delivery is best-effort: `send` reports the outcome as a
//! boolean and never fails the caller.

pub mod webhook;

#[cfg(test)]
pub mod recording;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::{DeviceId, DeviceStatus, EventId, EventKind, Parameter};

pub use webhook::WebhookNotifier;

#[cfg(test)]
pub use recording::RecordingNotifier;

/// Push delivery to a destination token
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Returns whether the message was accepted for delivery
    async fn send(&self, token: &str, payload: &NotifyPayload) -> bool;
}

/// Message handed to the notifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotifyPayload {
    pub title: String,
    pub body: String,
    pub data: NotifyData,
}

/// Structured data carried with a push message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotifyData {
    /// Persisted event, absent for status changes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<EventId>,
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameter: Option<Parameter>,
    pub device_id: DeviceId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_status: Option<DeviceStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_status: Option<DeviceStatus>,
}

impl NotifyPayload {
    pub fn sensor_event(
        kind: EventKind,
        event_id: EventId,
        device_id: DeviceId,
        parameter: Parameter,
        message: &str,
    ) -> Self {
        let title = match kind {
            EventKind::SensorRecovery => "Sensor Normal",
            _ => "Sensor Alert",
        };
        Self {
            title: title.to_string(),
            body: message.to_string(),
            data: NotifyData {
                event_id: Some(event_id),
                kind,
                parameter: Some(parameter),
                device_id,
                old_status: None,
                new_status: None,
            },
        }
    }

    pub fn status_change(
        device_id: DeviceId,
        device_name: &str,
        old_status: DeviceStatus,
        new_status: DeviceStatus,
    ) -> Self {
        let body = match new_status {
            DeviceStatus::Online => format!("Device {} is back online", device_name),
            _ => format!("Device {} is {}", device_name, new_status),
        };
        Self {
            title: "Device Status Changed".to_string(),
            body,
            data: NotifyData {
                event_id: None,
                kind: EventKind::DeviceStatusChange,
                parameter: None,
                device_id,
                old_status: Some(old_status),
                new_status: Some(new_status),
            },
        }
    }
}

/// Notifier that only writes to the log
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, token: &str, payload: &NotifyPayload) -> bool {
        tracing::warn!(
            device_id = payload.data.device_id,
            kind = payload.data.kind.as_str(),
            token = %redact(token),
            "{}: {}",
            payload.title,
            payload.body
        );
        true
    }
}

/// First few characters of a token, safe to log
pub(crate) fn redact(token: &str) -> String {
    let prefix: String = token.chars().take(10).collect();
    format!("{}...", prefix)
}

/// Notifier errors
#[derive(Debug, thiserror::Error)]
pub enum NotifierError {
    #[error("Client error: {0}")]
    Client(String),

    #[error("Webhook error: {0}")]
    Webhook(String),
}
