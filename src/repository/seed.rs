//! JSON fixture loading for the in-memory repository

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::RepositoryError;
use crate::model::{Device, Owner, Sample};

/// Initial repository contents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Seed {
    pub owners: Vec<Owner>,
    pub devices: Vec<Device>,
    pub samples: Vec<Sample>,
}

impl Seed {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| RepositoryError::Seed(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self, RepositoryError> {
        let seed: Seed =
            serde_json::from_str(json).map_err(|e| RepositoryError::Seed(e.to_string()))?;

        for sample in &seed.samples {
            if !seed.devices.iter().any(|d| d.id == sample.device_id) {
                return Err(RepositoryError::Seed(format!(
                    "sample references unknown device {}",
                    sample.device_id
                )));
            }
        }
        Ok(seed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryRepository;
    use std::io::Write;

    const SEED: &str = r#"{
        "owners": [{"id": 1, "push_token": "tok-1", "cooldown_minutes": 10}],
        "devices": [
            {"id": 10, "name": "Pond A", "owner_id": 1,
             "thresholds": {"ph_min": 6.5, "ph_max": 8.5}}
        ],
        "samples": [
            {"device_id": 10, "timestamp": "2025-07-18T06:00:00Z", "ph": 7.1}
        ]
    }"#;

    #[test]
    fn test_seed_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SEED.as_bytes()).unwrap();

        let seed = Seed::from_file(file.path()).unwrap();
        assert_eq!(seed.owners.len(), 1);
        assert_eq!(seed.devices[0].thresholds.ph_max, Some(8.5));

        let repo = MemoryRepository::from_seed(seed);
        assert_eq!(repo.device_count(), 1);
    }

    #[test]
    fn test_seed_rejects_orphan_sample() {
        let json = r#"{"samples": [{"device_id": 3, "timestamp": "2025-07-18T06:00:00Z"}]}"#;
        assert!(matches!(Seed::from_json(json), Err(RepositoryError::Seed(_))));
    }

    #[test]
    fn test_seed_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = Seed::from_file(dir.path().join("missing.json"));
        assert!(matches!(result, Err(RepositoryError::Seed(_))));
    }
}
