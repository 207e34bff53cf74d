//! Domain records read from and written to the repository

pub mod device;
pub mod event;
pub mod sample;

pub use device::{Device, DeviceId, DeviceStatus, Owner, OwnerId, StatusChange, Thresholds};
pub use event::{AlertEvent, EventId, EventKind, NewAlertEvent};
pub use sample::{Bound, Parameter, Sample};
