//! Core types for the geocoding pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// The four pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Basic,
    Enhanced,
    Photon,
    OpenCage,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Basic, Stage::Enhanced, Stage::Photon, Stage::OpenCage];

    /// Position in the pipeline (0-based).
    pub fn index(self) -> usize {
        match self {
            Self::Basic => 0,
            Self::Enhanced => 1,
            Self::Photon => 2,
            Self::OpenCage => 3,
        }
    }

    /// The provenance tag this stage records on coordinates.
    pub fn method(self) -> &'static str {
        match self {
            Self::Basic => "nominatim_basic",
            Self::Enhanced => "nominatim_variants",
            Self::Photon => "photon",
            Self::OpenCage => "opencage",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.method())
    }
}

/// A coordinate pair with provenance: which stage resolved it, and the
/// exact query string that succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
    pub method: String,
    pub query: String,
}

/// One titled text block extracted from a scraped page.
///
/// `title` is the natural key. `coordinates` stays `None` until a stage
/// resolves the record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationRecord {
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub coordinates: Option<Coordinate>,
}

impl LocationRecord {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: String::new(),
            labels: Vec::new(),
            coordinates: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.coordinates.is_some()
    }
}

/// Default place context appended to queries: city, district, country.
/// Empty strings mean "not provided".
#[derive(Debug, Clone, Default)]
pub struct PlaceContext {
    pub city: String,
    pub district: String,
    pub country: String,
}

impl PlaceContext {
    pub fn new(city: &str, district: &str, country: &str) -> Self {
        Self {
            city: city.to_string(),
            district: district.to_string(),
            country: country.to_string(),
        }
    }
}

/// The partition a stage (or the whole pipeline) produces over its input.
#[derive(Debug, Clone, Default)]
pub struct StageResult {
    pub resolved: Vec<LocationRecord>,
    pub remaining: Vec<LocationRecord>,
}

/// Pipeline configuration — explicit, no ambient globals.
#[derive(Debug, Clone)]
pub struct GeocodeConfig {
    /// Per-lookup timeout.
    pub timeout: Duration,
    /// Politeness pause after every external lookup attempt.
    pub delay: Duration,
    /// OpenCage credential; the stage is skipped without one.
    pub opencage_key: Option<String>,
    /// Country code hint for the OpenCage stage.
    pub country_code: String,
}

impl Default for GeocodeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            delay: Duration::from_secs(1),
            opencage_key: None,
            country_code: "tr".to_string(),
        }
    }
}

impl GeocodeConfig {
    /// Default config with the OpenCage key taken from `OPENCAGE_API_KEY`.
    pub fn from_env() -> Self {
        let key = std::env::var("OPENCAGE_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());
        Self {
            opencage_key: key,
            ..Self::default()
        }
    }
}

/// Geocoding errors. Transient lookup failures never surface through
/// this type — stages downgrade them to a warned miss.
#[derive(Debug)]
pub enum GeocodeError {
    Network(String),
    InvalidResponse(String),
}

impl fmt::Display for GeocodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(msg) => write!(f, "Network error: {}", msg),
            Self::InvalidResponse(msg) => write!(f, "Invalid API response: {}", msg),
        }
    }
}

impl std::error::Error for GeocodeError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order_and_tags() {
        let tags: Vec<&str> = Stage::ALL.iter().map(|s| s.method()).collect();
        assert_eq!(
            tags,
            vec!["nominatim_basic", "nominatim_variants", "photon", "opencage"]
        );
        for (i, stage) in Stage::ALL.iter().enumerate() {
            assert_eq!(stage.index(), i);
        }
    }

    #[test]
    fn test_record_defaults_from_sparse_json() {
        let rec: LocationRecord = serde_json::from_str(r#"{"title": "Balat Kilisesi"}"#).unwrap();
        assert_eq!(rec.title, "Balat Kilisesi");
        assert!(rec.content.is_empty());
        assert!(rec.labels.is_empty());
        assert!(rec.coordinates.is_none());
    }

    #[test]
    fn test_record_serializes_null_coordinates() {
        let rec = LocationRecord::new("Fener");
        let json = serde_json::to_string(&rec).unwrap();
        assert!(json.contains("\"coordinates\":null"));
    }

    #[test]
    fn test_coordinate_roundtrip() {
        let coord = Coordinate {
            latitude: 41.0,
            longitude: 28.9,
            method: "nominatim_variants".into(),
            query: "Balat Kilisesi, İstanbul, Türkiye".into(),
        };
        let json = serde_json::to_string(&coord).unwrap();
        let back: Coordinate = serde_json::from_str(&json).unwrap();
        assert_eq!(back, coord);
    }

    #[test]
    fn test_config_defaults() {
        let config = GeocodeConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.delay, Duration::from_secs(1));
        assert!(config.opencage_key.is_none());
        assert_eq!(config.country_code, "tr");
    }
}
