//! Threshold alert engine

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;

use super::rules::{configured_rules, ThresholdRule};
use super::state::{AlertKey, AlertState, AlertStateStore, Transition};
use crate::model::{Bound, Device, EventId, EventKind, NewAlertEvent, OwnerId, Parameter};
use crate::notify::{Notifier, NotifyPayload};
use crate::repository::{Repository, RepositoryError, UnitOfWork};
use crate::scheduler::{PeriodicTask, TickError};

pub const DEFAULT_COOLDOWN_MINUTES: u32 = 30;
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Counters for one alert tick
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AlertTickReport {
    pub devices: usize,
    pub skipped_devices: usize,
    pub skipped_parameters: usize,
    pub alerts: usize,
    pub recoveries: usize,
    pub delivered: usize,
}

/// Work done for one device, applied to the state store after commit
#[derive(Default)]
struct DeviceOutcome {
    updates: Vec<(AlertKey, AlertState)>,
    skipped_parameters: usize,
    alerts: usize,
    recoveries: usize,
    delivered: usize,
}

/// Evaluates owned, active devices against their thresholds
pub struct ThresholdAlertEngine {
    repository: Arc<dyn Repository>,
    notifier: Arc<dyn Notifier>,
    states: Arc<AlertStateStore>,
    default_cooldown_minutes: u32,
    concurrency: usize,
}

impl ThresholdAlertEngine {
    pub fn new(
        repository: Arc<dyn Repository>,
        notifier: Arc<dyn Notifier>,
        states: Arc<AlertStateStore>,
    ) -> Self {
        Self {
            repository,
            notifier,
            states,
            default_cooldown_minutes: DEFAULT_COOLDOWN_MINUTES,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Cooldown used when the owner has no override
    pub fn with_default_cooldown(mut self, minutes: u32) -> Self {
        self.default_cooldown_minutes = minutes;
        self
    }

    /// Maximum number of devices evaluated at once
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn states(&self) -> &Arc<AlertStateStore> {
        &self.states
    }

    /// Run one evaluation pass over every owned, active device.
    ///
    /// The whole pass shares one unit of work. Alert state is only updated
    /// once that unit of work has committed, so an aborted tick leaves the
    /// hysteresis state as it was.
    pub async fn run_tick(&self, now: DateTime<Utc>) -> Result<AlertTickReport, TickError> {
        let uow = self.repository.begin().await?;
        let devices = uow.list_owned_active_devices().await?;

        let mut report = AlertTickReport {
            devices: devices.len(),
            ..Default::default()
        };

        let outcomes: Vec<_> = {
            let uow = uow.as_ref();
            stream::iter(devices)
                .map(move |device| async move {
                    let mut outcome = DeviceOutcome::default();
                    let result = self.evaluate_device(uow, &device, now, &mut outcome).await;
                    (device.id, outcome, result)
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await
        };

        let mut updates = Vec::new();
        for (device_id, outcome, result) in outcomes {
            match result {
                Ok(()) => {}
                Err(EvalError::Repository(e)) if e.is_transient() => {
                    return Err(TickError::Repository(e));
                }
                Err(e) => {
                    tracing::warn!(device_id, error = %e, "Skipping device");
                    report.skipped_devices += 1;
                }
            }
            // Events persisted before a device failed still commit, and so
            // do the transitions that produced them
            report.skipped_parameters += outcome.skipped_parameters;
            report.alerts += outcome.alerts;
            report.recoveries += outcome.recoveries;
            report.delivered += outcome.delivered;
            updates.extend(outcome.updates);
        }

        uow.commit().await?;

        for (key, state) in updates {
            self.states.put(key, state);
        }

        Ok(report)
    }

    async fn evaluate_device(
        &self,
        uow: &dyn UnitOfWork,
        device: &Device,
        now: DateTime<Utc>,
        outcome: &mut DeviceOutcome,
    ) -> Result<(), EvalError> {
        let Some(owner_id) = device.owner_id else {
            return Ok(());
        };
        let rules = configured_rules(&device.thresholds);
        if rules.is_empty() {
            return Ok(());
        }
        let Some(sample) = uow.latest_sample(device.id).await? else {
            return Ok(());
        };

        let cooldown_minutes = uow
            .owner_cooldown_minutes(owner_id)
            .await?
            .unwrap_or(self.default_cooldown_minutes);
        let cooldown = Duration::minutes(i64::from(cooldown_minutes));

        for (parameter, rules) in rules {
            let Some(value) = sample.value(parameter) else {
                continue;
            };
            let violated = match check_parameter(parameter, &rules, value) {
                Ok(violated) => violated,
                Err(e) => {
                    tracing::warn!(device_id = device.id, error = %e, "Skipping parameter");
                    outcome.skipped_parameters += 1;
                    continue;
                }
            };

            let key = AlertKey::new(device.id, parameter);
            let previous = self.states.get(&key);
            let (next, transition) = previous.step(violated.map(|r| r.bound), now, cooldown);

            let emitted = match transition {
                Transition::Alert => violated.map(|rule| (EventKind::SensorAlert, rule)),
                Transition::Recovery => {
                    let rule = recovered_rule(&rules, previous.violated_bound);
                    Some((EventKind::SensorRecovery, rule))
                }
                Transition::None => None,
            };

            let Some((kind, rule)) = emitted else {
                if next != previous {
                    outcome.updates.push((key, next));
                }
                continue;
            };

            let message = match kind {
                EventKind::SensorRecovery => recovery_message(parameter, value),
                _ => alert_message(&rule, value),
            };
            let event_id = uow
                .persist_alert_event(NewAlertEvent {
                    device_id: device.id,
                    owner_id,
                    kind,
                    parameter,
                    bound: rule.bound,
                    limit: rule.limit,
                    observed: value,
                    message: message.clone(),
                    created_at: now,
                })
                .await?;

            // The event is now part of the unit of work
            outcome.updates.push((key, next));
            match kind {
                EventKind::SensorRecovery => outcome.recoveries += 1,
                _ => outcome.alerts += 1,
            }

            if self
                .deliver(uow, device, owner_id, kind, parameter, event_id, &message)
                .await?
            {
                outcome.delivered += 1;
            }
        }

        Ok(())
    }

    /// Push a persisted event to the owner and record the outcome on it.
    /// Returns whether the push was delivered.
    #[allow(clippy::too_many_arguments)]
    async fn deliver(
        &self,
        uow: &dyn UnitOfWork,
        device: &Device,
        owner_id: OwnerId,
        kind: EventKind,
        parameter: Parameter,
        event_id: EventId,
        message: &str,
    ) -> Result<bool, RepositoryError> {
        let delivered = match uow.owner_push_token(owner_id).await? {
            Some(token) => {
                let payload =
                    NotifyPayload::sensor_event(kind, event_id, device.id, parameter, message);
                self.notifier.send(&token, &payload).await
            }
            None => false,
        };
        uow.record_delivery(event_id, delivered).await?;

        tracing::info!(
            device_id = device.id,
            event_id,
            kind = kind.as_str(),
            delivered,
            "{}",
            message
        );

        Ok(delivered)
    }
}

#[async_trait]
impl PeriodicTask for ThresholdAlertEngine {
    fn name(&self) -> &'static str {
        "threshold_alerts"
    }

    async fn tick(&self, now: DateTime<Utc>) -> Result<(), TickError> {
        let report = self.run_tick(now).await?;
        if report.alerts + report.recoveries > 0 {
            tracing::info!(?report, "Alert tick complete");
        } else {
            tracing::debug!(?report, "Alert tick complete");
        }
        Ok(())
    }
}

/// First violated rule for a parameter, `None` when within limits
fn check_parameter(
    parameter: Parameter,
    rules: &[ThresholdRule],
    value: f64,
) -> Result<Option<ThresholdRule>, EvalError> {
    if !value.is_finite() {
        return Err(EvalError::MalformedValue { parameter, value });
    }

    let limit = |bound| rules.iter().find(|r| r.bound == bound).map(|r| r.limit);
    if let (Some(min), Some(max)) = (limit(Bound::Min), limit(Bound::Max)) {
        if min > max {
            return Err(EvalError::InvertedLimits {
                parameter,
                min,
                max,
            });
        }
    }

    Ok(rules.iter().copied().find(|rule| rule.is_violated(value)))
}

/// Rule reported on recovery: the bound that was violated, if still configured
fn recovered_rule(rules: &[ThresholdRule], bound: Option<Bound>) -> ThresholdRule {
    bound
        .and_then(|b| rules.iter().find(|r| r.bound == b))
        .copied()
        .unwrap_or(rules[0])
}

fn alert_message(rule: &ThresholdRule, value: f64) -> String {
    let direction = match rule.bound {
        Bound::Min => "below",
        Bound::Max => "above",
    };
    format!(
        "{} value {} {} threshold {}",
        rule.parameter, value, direction, rule.limit
    )
}

fn recovery_message(parameter: Parameter, value: f64) -> String {
    format!("{} back to normal: {}", parameter, value)
}

/// Errors evaluating a single device
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("Malformed {parameter} value: {value}")]
    MalformedValue { parameter: Parameter, value: f64 },

    #[error("{parameter} min threshold {min} exceeds max threshold {max}")]
    InvertedLimits {
        parameter: Parameter,
        min: f64,
        max: f64,
    },
}
