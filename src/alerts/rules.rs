//! Fixed threshold rule catalog

use crate::model::{Bound, Parameter, Thresholds};

/// One entry of the rule catalog: which threshold field feeds which check
pub struct RuleSpec {
    pub parameter: Parameter,
    pub bound: Bound,
    pub limit: fn(&Thresholds) -> Option<f64>,
}

/// Every check a device can have, in evaluation order
pub const RULE_CATALOG: [RuleSpec; 9] = [
    RuleSpec {
        parameter: Parameter::Temperature,
        bound: Bound::Min,
        limit: |t| t.temperature_min,
    },
    RuleSpec {
        parameter: Parameter::Temperature,
        bound: Bound::Max,
        limit: |t| t.temperature_max,
    },
    RuleSpec {
        parameter: Parameter::Ph,
        bound: Bound::Min,
        limit: |t| t.ph_min,
    },
    RuleSpec {
        parameter: Parameter::Ph,
        bound: Bound::Max,
        limit: |t| t.ph_max,
    },
    RuleSpec {
        parameter: Parameter::DissolvedOxygen,
        bound: Bound::Min,
        limit: |t| t.dissolved_oxygen_min,
    },
    RuleSpec {
        parameter: Parameter::Tds,
        bound: Bound::Max,
        limit: |t| t.tds_max,
    },
    RuleSpec {
        parameter: Parameter::Ammonia,
        bound: Bound::Max,
        limit: |t| t.ammonia_max,
    },
    RuleSpec {
        parameter: Parameter::Salinity,
        bound: Bound::Min,
        limit: |t| t.salinity_min,
    },
    RuleSpec {
        parameter: Parameter::Salinity,
        bound: Bound::Max,
        limit: |t| t.salinity_max,
    },
];

/// A configured threshold check
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdRule {
    pub parameter: Parameter,
    pub bound: Bound,
    pub limit: f64,
}

impl ThresholdRule {
    pub fn is_violated(&self, value: f64) -> bool {
        self.bound.is_violated(value, self.limit)
    }
}

/// Rules with a non-null limit, grouped by parameter in catalog order
pub fn configured_rules(thresholds: &Thresholds) -> Vec<(Parameter, Vec<ThresholdRule>)> {
    let mut grouped: Vec<(Parameter, Vec<ThresholdRule>)> = Vec::new();

    for spec in &RULE_CATALOG {
        let Some(limit) = (spec.limit)(thresholds) else {
            continue;
        };
        let rule = ThresholdRule {
            parameter: spec.parameter,
            bound: spec.bound,
            limit,
        };
        match grouped.last_mut() {
            Some((parameter, rules)) if *parameter == spec.parameter => rules.push(rule),
            _ => grouped.push((spec.parameter, vec![rule])),
        }
    }

    grouped
}
