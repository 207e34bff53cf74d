//! Memory repository wrapper that injects per-device and per-event failures

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;

use super::{CommitReport, MemoryRepository, Repository, RepositoryError, UnitOfWork};
use crate::model::{Device, DeviceId, EventId, NewAlertEvent, OwnerId, Sample, StatusChange};

type Ingest = Arc<Mutex<Option<(Sample, DateTime<Utc>)>>>;

pub struct FaultyRepository {
    inner: Arc<MemoryRepository>,
    status_update: Option<DeviceId>,
    delivery: Option<EventId>,
    ingest_before_commit: Ingest,
}

impl FaultyRepository {
    pub fn new(inner: Arc<MemoryRepository>) -> Self {
        Self {
            inner,
            status_update: None,
            delivery: None,
            ingest_before_commit: Arc::new(Mutex::new(None)),
        }
    }

    /// `update_device_status` for this device fails with `DeviceNotFound`
    pub fn fail_status_update(mut self, device_id: DeviceId) -> Self {
        self.status_update = Some(device_id);
        self
    }

    /// `record_delivery` for this event fails with `EventNotFound`
    pub fn fail_delivery(mut self, event_id: EventId) -> Self {
        self.delivery = Some(event_id);
        self
    }

    /// Record a sample right before the next commit, as a concurrent ingest would
    pub fn ingest_before_commit(self, sample: Sample, received_at: DateTime<Utc>) -> Self {
        *self.ingest_before_commit.lock() = Some((sample, received_at));
        self
    }
}

#[async_trait]
impl Repository for FaultyRepository {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, RepositoryError> {
        Ok(Box::new(FaultyUnitOfWork {
            inner: self.inner.begin().await?,
            repository: Arc::clone(&self.inner),
            status_update: self.status_update,
            delivery: self.delivery,
            ingest_before_commit: Arc::clone(&self.ingest_before_commit),
        }))
    }
}

struct FaultyUnitOfWork {
    inner: Box<dyn UnitOfWork>,
    repository: Arc<MemoryRepository>,
    status_update: Option<DeviceId>,
    delivery: Option<EventId>,
    ingest_before_commit: Ingest,
}

#[async_trait]
impl UnitOfWork for FaultyUnitOfWork {
    async fn list_owned_active_devices(&self) -> Result<Vec<Device>, RepositoryError> {
        self.inner.list_owned_active_devices().await
    }

    async fn list_active_devices(&self) -> Result<Vec<Device>, RepositoryError> {
        self.inner.list_active_devices().await
    }

    async fn latest_sample(&self, device_id: DeviceId) -> Result<Option<Sample>, RepositoryError> {
        self.inner.latest_sample(device_id).await
    }

    async fn owner_cooldown_minutes(
        &self,
        owner_id: OwnerId,
    ) -> Result<Option<u32>, RepositoryError> {
        self.inner.owner_cooldown_minutes(owner_id).await
    }

    async fn owner_push_token(&self, owner_id: OwnerId) -> Result<Option<String>, RepositoryError> {
        self.inner.owner_push_token(owner_id).await
    }

    async fn persist_alert_event(&self, event: NewAlertEvent) -> Result<EventId, RepositoryError> {
        self.inner.persist_alert_event(event).await
    }

    async fn record_delivery(
        &self,
        event_id: EventId,
        delivered: bool,
    ) -> Result<(), RepositoryError> {
        if self.delivery == Some(event_id) {
            return Err(RepositoryError::EventNotFound(event_id));
        }
        self.inner.record_delivery(event_id, delivered).await
    }

    async fn update_device_status(
        &self,
        device_id: DeviceId,
        change: StatusChange,
    ) -> Result<(), RepositoryError> {
        if self.status_update == Some(device_id) {
            return Err(RepositoryError::DeviceNotFound(device_id));
        }
        self.inner.update_device_status(device_id, change).await
    }

    async fn commit(self: Box<Self>) -> Result<CommitReport, RepositoryError> {
        let FaultyUnitOfWork {
            inner,
            repository,
            ingest_before_commit,
            ..
        } = *self;
        let ingest = ingest_before_commit.lock().take();
        if let Some((sample, received_at)) = ingest {
            repository.record_sample(sample, received_at)?;
        }
        inner.commit().await
    }
}
