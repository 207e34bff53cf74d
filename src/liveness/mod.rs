//! Device liveness monitoring
//!
//! Keeps each device's online/offline status consistent with how recently it
//! was heard from, and applies scheduled deactivations.

pub mod monitor;

pub use monitor::{assess, LivenessAction, LivenessError, LivenessMonitor, LivenessTickReport};
