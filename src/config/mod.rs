//! Configuration for snowcast
//!
//! Loaded from `snowcast.toml`. Every section is optional.
//!
//! ```toml
//! [model]
//! path = "models/snow-quality-v4.json"
//!
//! [store]
//! path = "/var/lib/snowcast/summaries.redb"
//!
//! [batch]
//! workers = 8
//! time_budget_secs = 840
//! safety_margin_secs = 30
//!
//! [fetch]
//! past_days = 14
//! forecast_days = 2
//! max_retries = 3
//!
//! [detector]
//! lookback_hours = 336
//! min_history_hours = 48
//!
//! [[locations]]
//! id = "whistler"
//! name = "Whistler Blackcomb"
//! latitude = 50.1163
//! longitude = -122.9574
//! base_elevation_m = 675
//! mid_elevation_m = 1500
//! top_elevation_m = 2284
//! ```

use crate::batch::TimeBudget;
use crate::freeze_thaw::{FreezeThawConfig, DEFAULT_LOOKBACK_HOURS, DEFAULT_MIN_HISTORY_HOURS};
use crate::models::Location;
use crate::weather::{RetryPolicy, DEFAULT_BASE_URL};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Config file looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "snowcast.toml";

/// Worker bounds for the batch pool
pub const MIN_WORKERS: usize = 1;
pub const MAX_WORKERS: usize = 64;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SnowcastConfig {
    pub model: ModelSection,
    pub store: StoreSection,
    pub batch: BatchSection,
    pub fetch: FetchSection,
    pub detector: DetectorSection,
    pub locations: Vec<Location>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ModelSection {
    /// Model artifact; heuristic scoring only when absent
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreSection {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BatchSection {
    pub workers: usize,
    pub time_budget_secs: Option<u64>,
    pub safety_margin_secs: u64,
}

impl Default for BatchSection {
    fn default() -> Self {
        Self {
            workers: 8,
            time_budget_secs: None,
            safety_margin_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FetchSection {
    pub base_url: String,
    pub past_days: u32,
    pub forecast_days: u32,
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub timeout_secs: u64,
}

impl Default for FetchSection {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            past_days: 14,
            forecast_days: 2,
            max_retries: 3,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DetectorSection {
    pub lookback_hours: usize,
    pub min_history_hours: usize,
}

impl Default for DetectorSection {
    fn default() -> Self {
        Self {
            lookback_hours: DEFAULT_LOOKBACK_HOURS,
            min_history_hours: DEFAULT_MIN_HISTORY_HOURS,
        }
    }
}

impl SnowcastConfig {
    /// Load configuration.
    ///
    /// An explicit path must exist and parse. Without one, `./snowcast.toml`
    /// is tried and a broken file only logs a warning before falling back to
    /// defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            let config = Self::load_file(path)?;
            debug!("Loaded config from {}", path.display());
            return Ok(config);
        }

        let local = Path::new(CONFIG_FILE_NAME);
        if local.exists() {
            match Self::load_file(local) {
                Ok(config) => {
                    debug!("Loaded config from {}", local.display());
                    return Ok(config);
                }
                Err(e) => warn!("Ignoring {}: {}", local.display(), e),
            }
        }

        debug!("No config found, using defaults");
        Ok(Self::default())
    }

    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: SnowcastConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_WORKERS..=MAX_WORKERS).contains(&self.batch.workers) {
            return Err(ConfigError::Invalid(format!(
                "batch.workers must be between {} and {}, got {}",
                MIN_WORKERS, MAX_WORKERS, self.batch.workers
            )));
        }
        if self.detector.lookback_hours == 0 {
            return Err(ConfigError::Invalid("detector.lookback_hours must be positive".into()));
        }
        if self.fetch.base_delay_ms > self.fetch.max_delay_ms {
            return Err(ConfigError::Invalid(
                "fetch.base_delay_ms must not exceed fetch.max_delay_ms".into(),
            ));
        }

        let mut ids = HashSet::new();
        for loc in &self.locations {
            if loc.id.trim().is_empty() {
                return Err(ConfigError::Invalid("location id must not be empty".into()));
            }
            if !ids.insert(loc.id.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate location id '{}'", loc.id)));
            }
            let coords_ok = (-90.0..=90.0).contains(&loc.latitude) && (-180.0..=180.0).contains(&loc.longitude);
            if !coords_ok {
                return Err(ConfigError::Invalid(format!("location '{}' has invalid coordinates", loc.id)));
            }
        }
        Ok(())
    }

    /// Store file: configured path, else the user data dir, else the working directory
    pub fn store_path(&self) -> PathBuf {
        self.store.path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .map(|d| d.join("snowcast").join("summaries.redb"))
                .unwrap_or_else(|| PathBuf::from("snowcast-summaries.redb"))
        })
    }

    pub fn detector_config(&self) -> FreezeThawConfig {
        FreezeThawConfig {
            lookback_hours: self.detector.lookback_hours,
            min_history_hours: self.detector.min_history_hours,
            ..FreezeThawConfig::default()
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.fetch.max_retries,
            base_delay: Duration::from_millis(self.fetch.base_delay_ms),
            max_delay: Duration::from_millis(self.fetch.max_delay_ms),
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch.timeout_secs)
    }

    pub fn time_budget(&self) -> Option<TimeBudget> {
        self.batch.time_budget_secs.map(|secs| TimeBudget {
            total: Duration::from_secs(secs),
            safety_margin: Duration::from_secs(self.batch.safety_margin_secs),
        })
    }

    pub fn location(&self, id: &str) -> Option<&Location> {
        self.locations.iter().find(|l| l.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[model]
path = "model.json"

[batch]
workers = 4
time_budget_secs = 600

[detector]
lookback_hours = 240

[[locations]]
id = "whistler"
name = "Whistler Blackcomb"
latitude = 50.1163
longitude = -122.9574
base_elevation_m = 675
mid_elevation_m = 1500
top_elevation_m = 2284
"#;

    #[test]
    fn test_defaults() {
        let config = SnowcastConfig::default();
        assert_eq!(config.batch.workers, 8);
        assert_eq!(config.fetch.past_days, 14);
        assert_eq!(config.detector.lookback_hours, 336);
        assert!(config.model.path.is_none());
        assert!(config.time_budget().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_sample() {
        let config: SnowcastConfig = toml::from_str(SAMPLE).unwrap();
        config.validate().unwrap();
        assert_eq!(config.batch.workers, 4);
        assert_eq!(config.batch.safety_margin_secs, 30);
        assert_eq!(config.detector_config().lookback_hours, 240);
        assert_eq!(config.detector_config().min_history_hours, 48);
        let budget = config.time_budget().unwrap();
        assert_eq!(budget.total, Duration::from_secs(600));
        let loc = config.location("whistler").unwrap();
        assert_eq!(loc.top_elevation_m, 2284.0);
    }

    #[test]
    fn test_rejects_out_of_range_workers() {
        let config: SnowcastConfig = toml::from_str("[batch]\nworkers = 65\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_duplicate_locations() {
        let doubled = format!("{}\n{}", SAMPLE, &SAMPLE[SAMPLE.find("[[locations]]").unwrap()..]);
        let config: SnowcastConfig = toml::from_str(&doubled).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_explicit_broken_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snowcast.toml");
        std::fs::write(&path, "[batch\nworkers = ").unwrap();
        assert!(matches!(
            SnowcastConfig::load(Some(&path)),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            SnowcastConfig::load(Some(&dir.path().join("absent.toml"))),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_retry_policy_from_fetch_section() {
        let policy = SnowcastConfig::default().retry_policy();
        assert_eq!(policy, RetryPolicy::default());
    }
}
