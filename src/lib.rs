//! Pondwatch: threshold alerting and liveness monitoring for remote
//! water-quality sensors
//!
//! Two periodic tasks run against a shared device repository:
//!
//! - **Threshold alerts**: each owned, active device's latest sample is checked
//!   against its configured limits. A per-(device, parameter) hysteresis state
//!   emits one alert when a limit is crossed, repeats it at most once per
//!   cooldown window, and emits one recovery when the value returns to range.
//! - **Liveness**: devices silent for twice their contact interval go offline,
//!   devices heard from again come back online, maintenance is left alone and
//!   scheduled deactivations are applied.
//!
//! Every alert and recovery is persisted before it is pushed; push delivery is
//! best-effort and its outcome is recorded on the event.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use chrono::Utc;
//! use pondwatch::alerts::{AlertStateStore, ThresholdAlertEngine};
//! use pondwatch::model::{Device, Owner, Parameter, Sample, Thresholds};
//! use pondwatch::notify::LogNotifier;
//! use pondwatch::repository::MemoryRepository;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let repo = Arc::new(MemoryRepository::new());
//! repo.insert_owner(Owner::new(1).with_push_token("token"));
//! repo.insert_device(Device::new(1).with_owner(1).with_thresholds(Thresholds {
//!     ph_max: Some(8.5),
//!     ..Default::default()
//! }));
//! repo.record_sample(Sample::new(1, Utc::now()).with(Parameter::Ph, 9.0), Utc::now())?;
//!
//! let engine = ThresholdAlertEngine::new(repo, Arc::new(LogNotifier), Arc::new(AlertStateStore::new()));
//! let report = engine.run_tick(Utc::now()).await?;
//! assert_eq!(report.alerts, 1);
//! # Ok(())
//! # }
//! ```

pub mod alerts;
pub mod api;
pub mod config;
pub mod liveness;
pub mod model;
pub mod notify;
pub mod repository;
pub mod scheduler;

// Re-export commonly used types
pub use alerts::{AlertStateStore, ThresholdAlertEngine};
pub use config::Config;
pub use liveness::LivenessMonitor;
pub use scheduler::Scheduler;
