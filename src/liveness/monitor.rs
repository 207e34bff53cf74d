use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::model::{Device, DeviceStatus, StatusChange};
use crate::notify::{Notifier, NotifyPayload};
use crate::repository::{Repository, RepositoryError, UnitOfWork};
use crate::scheduler::{PeriodicTask, TickError};

/// What the monitor should do with a device on this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessAction {
    /// Scheduled deactivation time has passed
    Deactivate,
    /// In maintenance, never changed automatically
    Frozen,
    Transition {
        from: DeviceStatus,
        to: DeviceStatus,
    },
    Unchanged,
}

/// Decide the liveness action for a device from its own fields and `now`.
///
/// A device is stale when it has never been heard from or has been silent for
/// at least twice its contact interval.
pub fn assess(device: &Device, now: DateTime<Utc>) -> Result<LivenessAction, LivenessError> {
    if device.active {
        if let Some(deactivate_at) = device.deactivate_at {
            if deactivate_at <= now {
                return Ok(LivenessAction::Deactivate);
            }
        }
    }

    if device.status == DeviceStatus::Maintenance {
        return Ok(LivenessAction::Frozen);
    }

    if device.contact_interval_minutes <= 0 {
        return Err(LivenessError::InvalidContactInterval(
            device.contact_interval_minutes,
        ));
    }

    let stale_window = Duration::try_minutes(device.contact_interval_minutes.saturating_mul(2))
        .ok_or(LivenessError::InvalidContactInterval(
            device.contact_interval_minutes,
        ))?;
    let stale = match device.last_contact {
        None => true,
        Some(last) => now - last >= stale_window,
    };

    let target = if stale {
        DeviceStatus::Offline
    } else {
        DeviceStatus::Online
    };

    if device.status == target {
        Ok(LivenessAction::Unchanged)
    } else {
        Ok(LivenessAction::Transition {
            from: device.status,
            to: target,
        })
    }
}

/// Counters for one liveness tick
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LivenessTickReport {
    pub devices: usize,
    pub skipped: usize,
    pub went_online: usize,
    pub went_offline: usize,
    pub deactivated: usize,
}

/// Applies liveness transitions to every active device
pub struct LivenessMonitor {
    repository: Arc<dyn Repository>,
    notifier: Arc<dyn Notifier>,
}

impl LivenessMonitor {
    pub fn new(repository: Arc<dyn Repository>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            repository,
            notifier,
        }
    }

    /// Run one liveness pass.
    ///
    /// Status changes are committed before any owner is notified, so an
    /// aborted tick never announces a change that did not persist. A change
    /// superseded at commit by a fresh sample is neither counted nor announced.
    pub async fn run_tick(&self, now: DateTime<Utc>) -> Result<LivenessTickReport, TickError> {
        let uow = self.repository.begin().await?;
        let devices = uow.list_active_devices().await?;

        let mut report = LivenessTickReport {
            devices: devices.len(),
            ..Default::default()
        };
        let mut applied = Vec::new();
        let mut announcements = Vec::new();

        for device in &devices {
            let action = match assess(device, now) {
                Ok(action) => action,
                Err(e) => {
                    tracing::warn!(device_id = device.id, error = %e, "Skipping device");
                    report.skipped += 1;
                    continue;
                }
            };

            match self.apply(uow.as_ref(), device, action).await {
                Ok(announcement) => {
                    applied.push((device.id, action));
                    announcements.extend(announcement);
                }
                Err(e) if e.is_transient() => return Err(e.into()),
                Err(e) => {
                    tracing::warn!(device_id = device.id, error = %e, "Skipping device");
                    report.skipped += 1;
                }
            }
        }

        let committed = uow.commit().await?;

        for (device_id, action) in applied {
            if committed.is_superseded(device_id) {
                tracing::debug!(device_id, "Device reported in during the tick, status kept");
                continue;
            }
            match action {
                LivenessAction::Deactivate => {
                    report.deactivated += 1;
                    tracing::info!(device_id, "Device deactivated as scheduled");
                }
                LivenessAction::Transition { to, .. } => {
                    match to {
                        DeviceStatus::Online => report.went_online += 1,
                        _ => report.went_offline += 1,
                    }
                    tracing::info!(device_id, "Device marked as {}", to);
                }
                LivenessAction::Frozen | LivenessAction::Unchanged => {}
            }
        }

        for (token, payload) in announcements {
            if committed.is_superseded(payload.data.device_id) {
                continue;
            }
            if !self.notifier.send(&token, &payload).await {
                tracing::debug!(
                    device_id = payload.data.device_id,
                    "Status change notification not delivered"
                );
            }
        }

        Ok(report)
    }

    /// Buffer the write for one device's action and prepare its announcement.
    /// Nothing is buffered when this fails.
    async fn apply(
        &self,
        uow: &dyn UnitOfWork,
        device: &Device,
        action: LivenessAction,
    ) -> Result<Option<(String, NotifyPayload)>, RepositoryError> {
        match action {
            LivenessAction::Deactivate => {
                uow.update_device_status(device.id, StatusChange::deactivate())
                    .await?;
                Ok(None)
            }
            LivenessAction::Transition { from, to } => {
                let token = self.owner_token(uow, device).await?;
                let change = StatusChange::status(to).if_last_contact(device.last_contact);
                uow.update_device_status(device.id, change).await?;

                Ok(token.map(|token| {
                    let payload =
                        NotifyPayload::status_change(device.id, &device.display_name(), from, to);
                    (token, payload)
                }))
            }
            LivenessAction::Frozen | LivenessAction::Unchanged => Ok(None),
        }
    }

    async fn owner_token(
        &self,
        uow: &dyn UnitOfWork,
        device: &Device,
    ) -> Result<Option<String>, RepositoryError> {
        match device.owner_id {
            Some(owner_id) => uow.owner_push_token(owner_id).await,
            None => Ok(None),
        }
    }
}

#[async_trait]
impl PeriodicTask for LivenessMonitor {
    fn name(&self) -> &'static str {
        "liveness"
    }

    async fn tick(&self, now: DateTime<Utc>) -> Result<(), TickError> {
        let report = self.run_tick(now).await?;
        if report.went_online + report.went_offline + report.deactivated > 0 {
            tracing::info!(?report, "Liveness tick complete");
        } else {
            tracing::debug!(?report, "Liveness tick complete");
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LivenessError {
    #[error("Invalid contact interval: {0} minutes")]
    InvalidContactInterval(i64),
}
