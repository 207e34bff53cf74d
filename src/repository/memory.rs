//! In-process repository backed by lock-guarded tables

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use super::{CommitReport, Repository, RepositoryError, Seed, UnitOfWork};
use crate::model::{
    AlertEvent, Device, DeviceId, DeviceStatus, EventId, NewAlertEvent, Owner, OwnerId, Sample,
    StatusChange,
};

#[derive(Default)]
struct Tables {
    owners: HashMap<OwnerId, Owner>,
    devices: BTreeMap<DeviceId, Device>,
    samples: HashMap<DeviceId, Vec<Sample>>,
    events: Vec<AlertEvent>,
}

/// Shared between the repository and its open units of work
struct Shared {
    tables: RwLock<Tables>,
    next_event_id: AtomicU64,
    available: AtomicBool,
}

impl Shared {
    fn check_available(&self) -> Result<(), RepositoryError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RepositoryError::Unavailable(
                "memory repository is offline".to_string(),
            ))
        }
    }
}

/// In-memory repository
pub struct MemoryRepository {
    shared: Arc<Shared>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                tables: RwLock::new(Tables::default()),
                next_event_id: AtomicU64::new(1),
                available: AtomicBool::new(true),
            }),
        }
    }

    /// Create a repository pre-populated from a seed
    pub fn from_seed(seed: Seed) -> Self {
        let repo = Self::new();
        for owner in seed.owners {
            repo.insert_owner(owner);
        }
        for device in seed.devices {
            repo.insert_device(device);
        }
        {
            let mut tables = repo.shared.tables.write();
            for sample in seed.samples {
                tables.samples.entry(sample.device_id).or_default().push(sample);
            }
        }
        repo
    }

    /// Insert or replace an owner
    pub fn insert_owner(&self, owner: Owner) {
        self.shared.tables.write().owners.insert(owner.id, owner);
    }

    /// Insert or replace a device
    pub fn insert_device(&self, device: Device) {
        self.shared.tables.write().devices.insert(device.id, device);
    }

    pub fn device(&self, id: DeviceId) -> Option<Device> {
        self.shared.tables.read().devices.get(&id).cloned()
    }

    pub fn device_count(&self) -> usize {
        self.shared.tables.read().devices.len()
    }

    /// Store a sample and mark the device as heard from at `received_at`.
    /// Devices in maintenance keep their status.
    pub fn record_sample(
        &self,
        sample: Sample,
        received_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        self.shared.check_available()?;
        let mut tables = self.shared.tables.write();

        let device = tables
            .devices
            .get_mut(&sample.device_id)
            .ok_or(RepositoryError::DeviceNotFound(sample.device_id))?;
        device.last_contact = Some(received_at);
        if device.status != DeviceStatus::Maintenance {
            device.status = DeviceStatus::Online;
        }

        tables.samples.entry(sample.device_id).or_default().push(sample);
        Ok(())
    }

    /// Administrative status override, the only way out of maintenance
    pub fn set_device_status(
        &self,
        id: DeviceId,
        status: DeviceStatus,
    ) -> Result<(), RepositoryError> {
        let mut tables = self.shared.tables.write();
        let device = tables
            .devices
            .get_mut(&id)
            .ok_or(RepositoryError::DeviceNotFound(id))?;
        device.status = status;
        Ok(())
    }

    /// Committed events, oldest first
    pub fn events(&self) -> Vec<AlertEvent> {
        self.shared.tables.read().events.clone()
    }

    /// Committed events for one device, newest first
    pub fn events_for_device(&self, device_id: DeviceId) -> Vec<AlertEvent> {
        let tables = self.shared.tables.read();
        tables
            .events
            .iter()
            .rev()
            .filter(|e| e.device_id == device_id)
            .cloned()
            .collect()
    }

    /// Simulate an outage: every operation fails with `Unavailable` while false
    pub fn set_available(&self, available: bool) {
        self.shared.available.store(available, Ordering::SeqCst);
    }
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, RepositoryError> {
        self.shared.check_available()?;
        Ok(Box::new(MemoryUnitOfWork {
            shared: Arc::clone(&self.shared),
            pending: Mutex::new(Pending::default()),
        }))
    }
}

#[derive(Default)]
struct Pending {
    events: Vec<AlertEvent>,
    status_changes: Vec<(DeviceId, StatusChange)>,
}

/// Reads see committed state; writes are buffered until commit
struct MemoryUnitOfWork {
    shared: Arc<Shared>,
    pending: Mutex<Pending>,
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn list_owned_active_devices(&self) -> Result<Vec<Device>, RepositoryError> {
        self.shared.check_available()?;
        let tables = self.shared.tables.read();
        Ok(tables
            .devices
            .values()
            .filter(|d| d.active && d.owner_id.is_some())
            .cloned()
            .collect())
    }

    async fn list_active_devices(&self) -> Result<Vec<Device>, RepositoryError> {
        self.shared.check_available()?;
        let tables = self.shared.tables.read();
        Ok(tables.devices.values().filter(|d| d.active).cloned().collect())
    }

    async fn latest_sample(&self, device_id: DeviceId) -> Result<Option<Sample>, RepositoryError> {
        self.shared.check_available()?;
        let tables = self.shared.tables.read();
        Ok(tables
            .samples
            .get(&device_id)
            .and_then(|samples| samples.iter().max_by_key(|s| s.timestamp))
            .cloned())
    }

    async fn owner_cooldown_minutes(
        &self,
        owner_id: OwnerId,
    ) -> Result<Option<u32>, RepositoryError> {
        self.shared.check_available()?;
        let tables = self.shared.tables.read();
        Ok(tables.owners.get(&owner_id).and_then(|o| o.cooldown_minutes))
    }

    async fn owner_push_token(&self, owner_id: OwnerId) -> Result<Option<String>, RepositoryError> {
        self.shared.check_available()?;
        let tables = self.shared.tables.read();
        Ok(tables
            .owners
            .get(&owner_id)
            .and_then(|o| o.push_token.clone())
            .filter(|t| !t.is_empty()))
    }

    async fn persist_alert_event(&self, event: NewAlertEvent) -> Result<EventId, RepositoryError> {
        self.shared.check_available()?;
        let id = self.shared.next_event_id.fetch_add(1, Ordering::SeqCst);
        self.pending.lock().events.push(AlertEvent::from_new(id, event));
        Ok(id)
    }

    async fn record_delivery(
        &self,
        event_id: EventId,
        delivered: bool,
    ) -> Result<(), RepositoryError> {
        self.shared.check_available()?;
        let mut pending = self.pending.lock();
        let event = pending
            .events
            .iter_mut()
            .find(|e| e.id == event_id)
            .ok_or(RepositoryError::EventNotFound(event_id))?;
        event.delivered = delivered;
        Ok(())
    }

    async fn update_device_status(
        &self,
        device_id: DeviceId,
        change: StatusChange,
    ) -> Result<(), RepositoryError> {
        self.shared.check_available()?;
        if !self.shared.tables.read().devices.contains_key(&device_id) {
            return Err(RepositoryError::DeviceNotFound(device_id));
        }
        self.pending.lock().status_changes.push((device_id, change));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<CommitReport, RepositoryError> {
        self.shared.check_available()?;
        let MemoryUnitOfWork { shared, pending } = *self;
        let pending = pending.into_inner();
        let mut tables = shared.tables.write();
        let mut report = CommitReport::default();

        for (device_id, change) in pending.status_changes {
            let Some(device) = tables.devices.get_mut(&device_id) else {
                tracing::warn!(device_id, "Device removed before commit, dropping status change");
                continue;
            };
            if let Some(expected) = change.if_last_contact {
                if device.last_contact != expected {
                    report.superseded.push(device_id);
                    continue;
                }
            }
            device.status = change.status;
            if let Some(active) = change.active {
                device.active = active;
            }
            if change.clear_last_contact {
                device.last_contact = None;
            }
        }
        tables.events.extend(pending.events);

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Bound, EventKind, Parameter};
    use chrono::Duration;

    fn new_event(device_id: DeviceId) -> NewAlertEvent {
        NewAlertEvent {
            device_id,
            owner_id: 1,
            kind: EventKind::SensorAlert,
            parameter: Parameter::Ph,
            bound: Bound::Min,
            limit: 6.5,
            observed: 6.0,
            message: "ph value 6 below threshold 6.5".to_string(),
            created_at: Utc::now(),
        }
    }

    fn repo() -> MemoryRepository {
        let repo = MemoryRepository::new();
        repo.insert_owner(Owner::new(1).with_cooldown(15));
        repo.insert_device(Device::new(1).with_owner(1));
        repo.insert_device(Device::new(2));
        let mut inactive = Device::new(3).with_owner(1);
        inactive.active = false;
        repo.insert_device(inactive);
        repo
    }

    #[tokio::test]
    async fn test_device_scopes() {
        let repo = repo();
        let uow = repo.begin().await.unwrap();

        let owned: Vec<_> = uow
            .list_owned_active_devices()
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(owned, vec![1]);

        let active: Vec<_> = uow
            .list_active_devices()
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(active, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_latest_sample_by_device_timestamp() {
        let repo = repo();
        let now = Utc::now();
        let newer = Sample::new(1, now).with(Parameter::Ph, 7.5);
        let older = Sample::new(1, now - Duration::minutes(5)).with(Parameter::Ph, 6.0);
        repo.record_sample(newer.clone(), now).unwrap();
        repo.record_sample(older, now).unwrap();

        let uow = repo.begin().await.unwrap();
        assert_eq!(uow.latest_sample(1).await.unwrap(), Some(newer));
        assert_eq!(uow.latest_sample(2).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_writes_visible_only_after_commit() {
        let repo = repo();

        let uow = repo.begin().await.unwrap();
        let id = uow.persist_alert_event(new_event(1)).await.unwrap();
        uow.record_delivery(id, true).await.unwrap();
        uow.update_device_status(1, StatusChange::status(DeviceStatus::Online))
            .await
            .unwrap();
        assert!(repo.events().is_empty());
        assert_eq!(repo.device(1).unwrap().status, DeviceStatus::Offline);

        tokio_test::assert_ok!(uow.commit().await);

        let events = repo.events();
        assert_eq!(events.len(), 1);
        assert!(events[0].delivered);
        assert_eq!(repo.device(1).unwrap().status, DeviceStatus::Online);
    }

    #[tokio::test]
    async fn test_dropped_unit_of_work_rolls_back() {
        let repo = repo();
        {
            let uow = repo.begin().await.unwrap();
            uow.persist_alert_event(new_event(1)).await.unwrap();
            uow.update_device_status(1, StatusChange::deactivate())
                .await
                .unwrap();
        }
        assert!(repo.events().is_empty());
        assert!(repo.device(1).unwrap().active);
    }

    #[tokio::test]
    async fn test_unavailable() {
        let repo = repo();
        repo.set_available(false);
        assert!(matches!(
            repo.begin().await,
            Err(RepositoryError::Unavailable(_))
        ));

        repo.set_available(true);
        let uow = repo.begin().await.unwrap();
        repo.set_available(false);
        assert!(matches!(
            uow.list_active_devices().await,
            Err(RepositoryError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_owner_lookups() {
        let repo = repo();
        repo.insert_owner(Owner::new(2).with_push_token(""));
        let uow = repo.begin().await.unwrap();

        assert_eq!(uow.owner_cooldown_minutes(1).await.unwrap(), Some(15));
        assert_eq!(uow.owner_cooldown_minutes(2).await.unwrap(), None);
        assert_eq!(uow.owner_push_token(2).await.unwrap(), None);
        assert_eq!(uow.owner_push_token(99).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_guarded_status_change_loses_to_newer_contact() {
        let repo = repo();
        let now = Utc::now();

        let uow = repo.begin().await.unwrap();
        let observed = repo.device(1).unwrap().last_contact;
        uow.update_device_status(
            1,
            StatusChange::status(DeviceStatus::Offline).if_last_contact(observed),
        )
        .await
        .unwrap();
        uow.update_device_status(
            2,
            StatusChange::status(DeviceStatus::Online).if_last_contact(None),
        )
        .await
        .unwrap();
        repo.record_sample(Sample::new(1, now), now).unwrap();

        let report = tokio_test::assert_ok!(uow.commit().await);
        assert_eq!(report.superseded, vec![1]);
        assert!(report.is_superseded(1));

        let device = repo.device(1).unwrap();
        assert_eq!(device.status, DeviceStatus::Online);
        assert_eq!(device.last_contact, Some(now));
        assert_eq!(repo.device(2).unwrap().status, DeviceStatus::Online);
    }

    #[test]
    fn test_record_sample_keeps_maintenance() {
        let repo = repo();
        repo.set_device_status(1, DeviceStatus::Maintenance).unwrap();
        let now = Utc::now();
        repo.record_sample(Sample::new(1, now), now).unwrap();

        let device = repo.device(1).unwrap();
        assert_eq!(device.status, DeviceStatus::Maintenance);
        assert_eq!(device.last_contact, Some(now));

        assert!(matches!(
            repo.record_sample(Sample::new(42, now), now),
            Err(RepositoryError::DeviceNotFound(42))
        ));
    }
}
