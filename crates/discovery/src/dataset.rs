//! Reference city dataset

use crate::error::{DiscoveryError, Result};
use std::path::Path;
use tracing::info;
use wayfinder_core::config::DiscoveryConfig;
use wayfinder_core::City;

const EMBEDDED_CITIES: &str = include_str!("../data/cities.json");

/// Static list of cities the curated and geographic sources filter
#[derive(Debug, Clone, Default)]
pub struct CityDataset {
    cities: Vec<City>,
}

impl CityDataset {
    pub fn from_cities(cities: Vec<City>) -> Self {
        Self { cities }
    }

    /// The sample dataset compiled into the binary
    pub fn embedded() -> Result<Self> {
        Self::from_json(EMBEDDED_CITIES)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let cities: Vec<City> = serde_json::from_str(json)
            .map_err(|e| DiscoveryError::dataset(format!("Failed to parse city dataset: {e}")))?;
        Ok(Self { cities })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            DiscoveryError::dataset(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }

    /// Dataset from `discovery.dataset_path`, or the embedded sample
    pub fn load(config: &DiscoveryConfig) -> Result<Self> {
        let dataset = match &config.dataset_path {
            Some(path) => Self::from_path(path)?,
            None => Self::embedded()?,
        };
        info!("Loaded city dataset with {} cities", dataset.len());
        Ok(dataset)
    }

    pub fn cities(&self) -> &[City] {
        &self.cities
    }

    pub fn len(&self) -> usize {
        self.cities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
    }

    /// Case-insensitive lookup by name
    pub fn find(&self, name: &str) -> Option<&City> {
        self.cities.iter().find(|c| c.matches_name(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_embedded_dataset_parses() {
        let dataset = CityDataset::embedded().unwrap();
        assert!(dataset.len() >= 20);
        assert!(dataset
            .cities()
            .iter()
            .all(|c| c.coordinates.is_some() && (0.0..=5.0).contains(&c.rating)));
    }

    #[test]
    fn test_find_is_case_insensitive() {
        let dataset = CityDataset::embedded().unwrap();
        assert_eq!(dataset.find("porto").map(|c| c.name.as_str()), Some("Porto"));
        assert!(dataset.find("Atlantis").is_none());
    }

    #[test]
    fn test_load_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"[{{"name": "Óbidos", "country": "Portugal", "rating": 4.4}}]"#).unwrap();
        let config = DiscoveryConfig {
            dataset_path: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        let dataset = CityDataset::load(&config).unwrap();
        assert_eq!(dataset.len(), 1);
        assert!(dataset.find("óbidos").is_some());
    }

    #[test]
    fn test_invalid_json_is_dataset_error() {
        assert!(matches!(
            CityDataset::from_json("{not json"),
            Err(DiscoveryError::Dataset(_))
        ));
    }
}
