//! Hysteresis state per (device, parameter)

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::Serialize;

use crate::model::{Bound, DeviceId, Parameter};

/// Identifies one hysteresis state instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct AlertKey {
    pub device_id: DeviceId,
    pub parameter: Parameter,
}

impl AlertKey {
    pub fn new(device_id: DeviceId, parameter: Parameter) -> Self {
        Self {
            device_id,
            parameter,
        }
    }
}

/// Current state of one (device, parameter) pair
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AlertState {
    pub violating: bool,
    pub last_notified_at: Option<DateTime<Utc>>,
    /// Bound behind the current excursion, reported again on recovery
    pub violated_bound: Option<Bound>,
}

/// What a state step asks the engine to emit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Alert,
    Recovery,
    None,
}

impl AlertState {
    /// Advance the state for one observation.
    ///
    /// `violation` is the violated bound, or `None` when the value is within
    /// limits. Entering a violation always alerts; staying in it alerts again
    /// once `cooldown` has elapsed since the last notification; leaving it
    /// always emits a recovery.
    pub fn step(
        &self,
        violation: Option<Bound>,
        now: DateTime<Utc>,
        cooldown: Duration,
    ) -> (AlertState, Transition) {
        match violation {
            Some(bound) if !self.violating => (
                AlertState {
                    violating: true,
                    last_notified_at: Some(now),
                    violated_bound: Some(bound),
                },
                Transition::Alert,
            ),
            Some(bound) => {
                let due = self
                    .last_notified_at
                    .map(|last| now - last >= cooldown)
                    .unwrap_or(true);
                if due {
                    (
                        AlertState {
                            violating: true,
                            last_notified_at: Some(now),
                            violated_bound: Some(bound),
                        },
                        Transition::Alert,
                    )
                } else {
                    (
                        AlertState {
                            violated_bound: Some(bound),
                            ..*self
                        },
                        Transition::None,
                    )
                }
            }
            None if self.violating => (AlertState::default(), Transition::Recovery),
            None => (*self, Transition::None),
        }
    }
}

/// Process-wide alert state, created at startup and never persisted.
///
/// Sharded so per-device workers only contend on the shard holding their key.
#[derive(Debug, Default)]
pub struct AlertStateStore {
    states: DashMap<AlertKey, AlertState>,
}

impl AlertStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// State for a key, the not-violating default if never seen
    pub fn get(&self, key: &AlertKey) -> AlertState {
        self.states.get(key).map(|s| *s).unwrap_or_default()
    }

    pub fn put(&self, key: AlertKey, state: AlertState) {
        self.states.insert(key, state);
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Keys currently in violation
    pub fn violating_count(&self) -> usize {
        self.states.iter().filter(|e| e.value().violating).count()
    }

    /// All states ordered by key
    pub fn snapshot(&self) -> Vec<(AlertKey, AlertState)> {
        let mut entries: Vec<_> = self
            .states
            .iter()
            .map(|e| (*e.key(), *e.value()))
            .collect();
        entries.sort_by_key(|(k, _)| *k);
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 18, 6, 0, 0).unwrap()
    }

    const COOLDOWN: i64 = 30;

    fn step(state: &AlertState, violation: Option<Bound>, minutes: i64) -> (AlertState, Transition) {
        state.step(
            violation,
            t0() + Duration::minutes(minutes),
            Duration::minutes(COOLDOWN),
        )
    }

    #[test]
    fn test_entering_violation_alerts() {
        let (state, transition) = step(&AlertState::default(), Some(Bound::Max), 0);
        assert_eq!(transition, Transition::Alert);
        assert!(state.violating);
        assert_eq!(state.last_notified_at, Some(t0()));
        assert_eq!(state.violated_bound, Some(Bound::Max));
    }

    #[test]
    fn test_cooldown_window() {
        // t0 violation begins, t0+5 suppressed, t0+35 re-alerts
        let (s0, a0) = step(&AlertState::default(), Some(Bound::Min), 0);
        let (s1, a1) = step(&s0, Some(Bound::Min), 5);
        let (s2, a2) = step(&s1, Some(Bound::Min), 35);

        assert_eq!(a0, Transition::Alert);
        assert_eq!(a1, Transition::None);
        assert_eq!(s1, s0);
        assert_eq!(a2, Transition::Alert);
        assert_eq!(s2.last_notified_at, Some(t0() + Duration::minutes(35)));
    }

    #[test]
    fn test_cooldown_boundary_is_inclusive() {
        let (s0, _) = step(&AlertState::default(), Some(Bound::Min), 0);
        let (_, transition) = step(&s0, Some(Bound::Min), COOLDOWN);
        assert_eq!(transition, Transition::Alert);
    }

    #[test]
    fn test_violating_without_timestamp_alerts() {
        let state = AlertState {
            violating: true,
            last_notified_at: None,
            violated_bound: None,
        };
        let (next, transition) = step(&state, Some(Bound::Max), 1);
        assert_eq!(transition, Transition::Alert);
        assert!(next.last_notified_at.is_some());
    }

    #[test]
    fn test_recovery_ignores_cooldown() {
        let (s0, _) = step(&AlertState::default(), Some(Bound::Max), 0);
        let (s1, transition) = step(&s0, None, 1);

        assert_eq!(transition, Transition::Recovery);
        assert!(!s1.violating);
        assert_eq!(s1.last_notified_at, None);
    }

    #[test]
    fn test_normal_stays_quiet() {
        let (state, transition) = step(&AlertState::default(), None, 0);
        assert_eq!(transition, Transition::None);
        assert_eq!(state, AlertState::default());
    }

    #[test]
    fn test_reentry_after_recovery_alerts_immediately() {
        let (s0, _) = step(&AlertState::default(), Some(Bound::Max), 0);
        let (s1, _) = step(&s0, None, 1);
        let (_, transition) = step(&s1, Some(Bound::Max), 2);
        assert_eq!(transition, Transition::Alert);
    }

    #[test]
    fn test_store_defaults_and_snapshot() {
        let store = AlertStateStore::new();
        let key = AlertKey::new(2, Parameter::Ph);
        assert_eq!(store.get(&key), AlertState::default());
        assert!(store.is_empty());

        let (state, _) = step(&AlertState::default(), Some(Bound::Min), 0);
        store.put(key, state);
        store.put(AlertKey::new(1, Parameter::Tds), AlertState::default());

        assert_eq!(store.len(), 2);
        assert_eq!(store.violating_count(), 1);
        let snapshot = store.snapshot();
        assert_eq!(snapshot[0].0.device_id, 1);
        assert_eq!(snapshot[1].1, state);
    }
}
