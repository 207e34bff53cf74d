//! Data access seam for the evaluation engines
//!
//! Every tick opens one [`UnitOfWork`], reads its device snapshot through it
//! and buffers writes in it. Writes become visible only on
//! [`UnitOfWork::commit`]; dropping the unit of work discards them.

#[cfg(test)]
pub mod faulty;
pub mod memory;
pub mod seed;

use async_trait::async_trait;

use crate::model::{
    Device, DeviceId, EventId, NewAlertEvent, OwnerId, Sample, StatusChange,
};

pub use memory::MemoryRepository;
pub use seed::Seed;

/// Source of per-tick units of work
#[async_trait]
pub trait Repository: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, RepositoryError>;
}

/// Transactional scope covering a single tick
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// Active devices that have an owner (threshold evaluation scope)
    async fn list_owned_active_devices(&self) -> Result<Vec<Device>, RepositoryError>;

    /// Every active device, owned or not (liveness scope)
    async fn list_active_devices(&self) -> Result<Vec<Device>, RepositoryError>;

    /// Most recent sample by device timestamp
    async fn latest_sample(&self, device_id: DeviceId) -> Result<Option<Sample>, RepositoryError>;

    /// Owner's cooldown override, `None` when unset
    async fn owner_cooldown_minutes(&self, owner_id: OwnerId)
        -> Result<Option<u32>, RepositoryError>;

    async fn owner_push_token(&self, owner_id: OwnerId) -> Result<Option<String>, RepositoryError>;

    async fn persist_alert_event(&self, event: NewAlertEvent) -> Result<EventId, RepositoryError>;

    /// Record the push delivery outcome on an event persisted in this unit of work
    async fn record_delivery(&self, event_id: EventId, delivered: bool)
        -> Result<(), RepositoryError>;

    async fn update_device_status(
        &self,
        device_id: DeviceId,
        change: StatusChange,
    ) -> Result<(), RepositoryError>;

    async fn commit(self: Box<Self>) -> Result<CommitReport, RepositoryError>;
}

/// What a commit did not apply
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReport {
    /// Devices whose guarded status change lost to a newer contact
    pub superseded: Vec<DeviceId>,
}

impl CommitReport {
    pub fn is_superseded(&self, device_id: DeviceId) -> bool {
        self.superseded.contains(&device_id)
    }
}

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Repository unavailable: {0}")]
    Unavailable(String),

    #[error("Device not found: {0}")]
    DeviceNotFound(DeviceId),

    #[error("Event not found: {0}")]
    EventNotFound(EventId),

    #[error("Seed error: {0}")]
    Seed(String),
}

impl RepositoryError {
    /// Infrastructure failures abort the tick; the rest are per-device data problems
    pub fn is_transient(&self) -> bool {
        matches!(self, RepositoryError::Unavailable(_))
    }
}
