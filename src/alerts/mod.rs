//! Threshold alerting
//!
//! Evaluates each owned device's latest sample against its configured
//! thresholds and emits alert/recovery events through a per-(device,
//! parameter) hysteresis state machine with a cooldown on repeat alerts.

pub mod engine;
pub mod rules;
pub mod state;

pub use engine::{AlertTickReport, EvalError, ThresholdAlertEngine};
pub use rules::{configured_rules, ThresholdRule, RULE_CATALOG};
pub use state::{AlertKey, AlertState, AlertStateStore, Transition};
