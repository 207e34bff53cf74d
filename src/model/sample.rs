use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::device::DeviceId;

/// Water-quality parameter reported by a sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parameter {
    Temperature,
    Ph,
    DissolvedOxygen,
    Tds,
    Ammonia,
    Salinity,
}

impl Parameter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Parameter::Temperature => "temperature",
            Parameter::Ph => "ph",
            Parameter::DissolvedOxygen => "dissolved_oxygen",
            Parameter::Tds => "tds",
            Parameter::Ammonia => "ammonia",
            Parameter::Salinity => "salinity",
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side of a limit counts as a violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bound {
    Min,
    Max,
}

impl Bound {
    pub fn is_violated(&self, value: f64, limit: f64) -> bool {
        match self {
            Bound::Min => value < limit,
            Bound::Max => value > limit,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Bound::Min => "min",
            Bound::Max => "max",
        }
    }
}

/// One telemetry reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub device_id: DeviceId,
    /// Timestamp as reported by the device
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub ph: Option<f64>,
    #[serde(default)]
    pub dissolved_oxygen: Option<f64>,
    #[serde(default)]
    pub tds: Option<f64>,
    #[serde(default)]
    pub ammonia: Option<f64>,
    #[serde(default)]
    pub salinity: Option<f64>,
}

impl Sample {
    pub fn new(device_id: DeviceId, timestamp: DateTime<Utc>) -> Self {
        Self {
            device_id,
            timestamp,
            temperature: None,
            ph: None,
            dissolved_oxygen: None,
            tds: None,
            ammonia: None,
            salinity: None,
        }
    }

    /// Set a parameter value
    pub fn with(mut self, parameter: Parameter, value: f64) -> Self {
        let slot = match parameter {
            Parameter::Temperature => &mut self.temperature,
            Parameter::Ph => &mut self.ph,
            Parameter::DissolvedOxygen => &mut self.dissolved_oxygen,
            Parameter::Tds => &mut self.tds,
            Parameter::Ammonia => &mut self.ammonia,
            Parameter::Salinity => &mut self.salinity,
        };
        *slot = Some(value);
        self
    }

    pub fn value(&self, parameter: Parameter) -> Option<f64> {
        match parameter {
            Parameter::Temperature => self.temperature,
            Parameter::Ph => self.ph,
            Parameter::DissolvedOxygen => self.dissolved_oxygen,
            Parameter::Tds => self.tds,
            Parameter::Ammonia => self.ammonia,
            Parameter::Salinity => self.salinity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bound_strict_comparison() {
        assert!(Bound::Min.is_violated(4.9, 5.0));
        assert!(!Bound::Min.is_violated(5.0, 5.0));
        assert!(Bound::Max.is_violated(8.6, 8.5));
        assert!(!Bound::Max.is_violated(8.5, 8.5));
    }

    #[test]
    fn test_sample_value_lookup() {
        let sample = Sample::new(1, Utc::now())
            .with(Parameter::Ph, 7.2)
            .with(Parameter::Salinity, 15.0);

        assert_eq!(sample.value(Parameter::Ph), Some(7.2));
        assert_eq!(sample.value(Parameter::Salinity), Some(15.0));
        assert_eq!(sample.value(Parameter::Temperature), None);
    }

    #[test]
    fn test_parameter_names() {
        let json = serde_json::to_string(&Parameter::DissolvedOxygen).unwrap();
        assert_eq!(json, "\"dissolved_oxygen\"");
        assert_eq!(Parameter::Tds.to_string(), "tds");
    }
}
