use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type DeviceId = u64;
pub type OwnerId = u64;

/// Liveness classification of a device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Online,
    #[default]
    Offline,
    Maintenance,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::Online => "online",
            DeviceStatus::Offline => "offline",
            DeviceStatus::Maintenance => "maintenance",
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-device threshold settings. A `None` field disables that check.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub temperature_min: Option<f64>,
    pub temperature_max: Option<f64>,
    pub ph_min: Option<f64>,
    pub ph_max: Option<f64>,
    pub dissolved_oxygen_min: Option<f64>,
    pub tds_max: Option<f64>,
    pub ammonia_max: Option<f64>,
    pub salinity_min: Option<f64>,
    pub salinity_max: Option<f64>,
}

/// A remote sensor device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    #[serde(default)]
    pub name: Option<String>,
    /// Unowned devices are never evaluated for thresholds
    #[serde(default)]
    pub owner_id: Option<OwnerId>,
    #[serde(default)]
    pub status: DeviceStatus,
    #[serde(default)]
    pub last_contact: Option<DateTime<Utc>>,
    /// Expected reporting interval in minutes
    #[serde(default = "default_contact_interval")]
    pub contact_interval_minutes: i64,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub deactivate_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub thresholds: Thresholds,
}

fn default_contact_interval() -> i64 {
    5
}

fn default_active() -> bool {
    true
}

impl Device {
    /// Create an active, unowned, offline device with default contact interval
    pub fn new(id: DeviceId) -> Self {
        Self {
            id,
            name: None,
            owner_id: None,
            status: DeviceStatus::Offline,
            last_contact: None,
            contact_interval_minutes: default_contact_interval(),
            active: true,
            deactivate_at: None,
            thresholds: Thresholds::default(),
        }
    }

    pub fn with_owner(mut self, owner_id: OwnerId) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_status(mut self, status: DeviceStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_last_contact(mut self, last_contact: DateTime<Utc>) -> Self {
        self.last_contact = Some(last_contact);
        self
    }

    pub fn with_contact_interval(mut self, minutes: i64) -> Self {
        self.contact_interval_minutes = minutes;
        self
    }

    pub fn with_deactivate_at(mut self, at: DateTime<Utc>) -> Self {
        self.deactivate_at = Some(at);
        self
    }

    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Name used in human-facing messages
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => format!("#{}", self.id),
        }
    }
}

/// The account a device belongs to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Owner {
    pub id: OwnerId,
    #[serde(default)]
    pub name: Option<String>,
    /// Push destination token, if the owner registered one
    #[serde(default)]
    pub push_token: Option<String>,
    /// Alert cooldown override in minutes
    #[serde(default)]
    pub cooldown_minutes: Option<u32>,
}

impl Owner {
    pub fn new(id: OwnerId) -> Self {
        Self {
            id,
            name: None,
            push_token: None,
            cooldown_minutes: None,
        }
    }

    pub fn with_push_token(mut self, token: impl Into<String>) -> Self {
        self.push_token = Some(token.into());
        self
    }

    pub fn with_cooldown(mut self, minutes: u32) -> Self {
        self.cooldown_minutes = Some(minutes);
        self
    }
}

/// Fields written back by the liveness monitor
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub status: DeviceStatus,
    /// New value for the active flag, if it changes
    pub active: Option<bool>,
    pub clear_last_contact: bool,
    /// Apply only if the device's last contact still equals this value
    pub if_last_contact: Option<Option<DateTime<Utc>>>,
}

impl StatusChange {
    pub fn status(status: DeviceStatus) -> Self {
        Self {
            status,
            active: None,
            clear_last_contact: false,
            if_last_contact: None,
        }
    }

    /// Guard the change on the contact time it was decided from. A sample
    /// recorded in the meantime supersedes it.
    pub fn if_last_contact(mut self, observed: Option<DateTime<Utc>>) -> Self {
        self.if_last_contact = Some(observed);
        self
    }

    /// Scheduled deactivation: inactive, offline, contact forgotten
    pub fn deactivate() -> Self {
        Self {
            status: DeviceStatus::Offline,
            active: Some(false),
            clear_last_contact: true,
            if_last_contact: None,
        }
    }
}
