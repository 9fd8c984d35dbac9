//! # Configuration Management
//!
//! One immutable record carrying every parameter of a run, read from TOML.
//!
//! ```toml
//! [data]
//! data_dir = "./data"
//!
//! [cache]
//! cache_dir = "./cache"
//! compress = true
//!
//! [load]
//! category = "batting"
//! discipline = "test"
//! change_criteria = "rating"
//! window_kind = "yearly"
//!
//! [distribution]
//! stops = [0.0, 100.0, 200.0, 300.0, 400.0, 500.0, 600.0, 700.0, 800.0, 900.0, 1000.0]
//! bin_reducer = "avg"
//! percentiles = [50.0, 75.0, 90.0]
//!
//! [thresholds]
//! thresholds = [600, 650, 700, 750, 800, 850, 900]
//! reducer = "max"
//! medal_targets = [2.0, 5.0, 10.0]
//! ```

use crate::distribution::{BinningParams, DEFAULT_NORMALIZATION};
use crate::error::{EngineError, Result};
use crate::reducer::Reducer;
use crate::thresholds::ThresholdClassifier;
use rating_cache::CacheConfig;
use rating_loader::{
    AllrounderRule, Category, ChangeCriteria, ConfigError, Discipline, LoaderConfig, NaiveDate, WindowKind,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ENV_DATA_DIR: &str = "RATINGS_DATA_DIR";
pub const ENV_CACHE_DIR: &str = "RATINGS_CACHE_DIR";
pub const ENV_DATASET_SUFFIX: &str = "RATINGS_DATASET_SUFFIX";

/// Main configuration for the rating engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Location of record files
    pub data: LoaderConfig,
    /// Location and behavior of the artifact cache
    pub cache: CacheConfig,
    /// Default load parameters
    pub load: LoadSettings,
    /// Histogram layout and percentile targets
    pub distribution: DistributionSettings,
    /// Threshold list and medal targets
    pub thresholds: ThresholdSettings,
}

/// Default parameters of a load request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadSettings {
    pub category: Category,
    pub discipline: Discipline,
    pub change_criteria: ChangeCriteria,
    /// Also keep the first date of each window of this kind when filtering
    pub window_kind: Option<WindowKind>,
    pub allrounder_rule: AllrounderRule,
    /// Restrict analysis to dates on or after this one
    pub start_date: Option<NaiveDate>,
    /// Restrict analysis to dates on or before this one
    pub end_date: Option<NaiveDate>,
    /// Only consider players ranked at or above this position
    pub max_rank: Option<u32>,
}

impl Default for LoadSettings {
    fn default() -> Self {
        Self {
            category: Category::Batting,
            discipline: Discipline::Test,
            change_criteria: ChangeCriteria::None,
            window_kind: None,
            allrounder_rule: AllrounderRule::default(),
            start_date: None,
            end_date: None,
            max_rank: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributionSettings {
    pub window_kind: WindowKind,
    pub stops: Vec<f64>,
    /// Reducer levels are absent unless named, even when the section
    /// default would set one
    #[serde(default)]
    pub bin_reducer: Option<Reducer>,
    #[serde(default)]
    pub entity_reducer: Option<Reducer>,
    pub normalization: f64,
    /// Percentile cut-points to extract, in percent
    pub percentiles: Vec<f64>,
}

impl Default for DistributionSettings {
    fn default() -> Self {
        let binning = BinningParams::default();
        Self {
            window_kind: WindowKind::Yearly,
            stops: binning.stops,
            bin_reducer: binning.bin_reducer,
            entity_reducer: binning.entity_reducer,
            normalization: DEFAULT_NORMALIZATION,
            percentiles: vec![50.0, 75.0, 90.0],
        }
    }
}

impl DistributionSettings {
    pub fn binning_params(&self) -> BinningParams {
        BinningParams {
            stops: self.stops.clone(),
            bin_reducer: self.bin_reducer,
            entity_reducer: self.entity_reducer,
            normalization: self.normalization,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdSettings {
    pub window_kind: WindowKind,
    /// Ascending rating thresholds
    pub thresholds: Vec<u32>,
    /// Collapses each player's window into the value compared to thresholds
    pub reducer: Reducer,
    /// Target mean counts, best medal first
    pub medal_targets: Vec<f64>,
}

impl Default for ThresholdSettings {
    fn default() -> Self {
        Self {
            window_kind: WindowKind::Yearly,
            thresholds: (600..=900).step_by(50).collect(),
            reducer: Reducer::Max,
            medal_targets: vec![2.0, 5.0, 10.0],
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| EngineError::config_file(format!("failed to read {}: {e}", path.display())))?;
        let config: EngineConfig = toml::from_str(&content)
            .map_err(|e| EngineError::config_file(format!("failed to parse {}: {e}", path.display())))?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .map_err(|e| EngineError::config_file(format!("failed to serialize config: {e}")))?;
        std::fs::write(path, content)
            .map_err(|e| EngineError::config_file(format!("failed to write {}: {e}", path.display())))?;
        Ok(())
    }

    /// Override paths from `RATINGS_*` environment variables
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    /// Override paths from any variable source
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_DATA_DIR) {
            self.data.data_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup(ENV_CACHE_DIR) {
            self.cache.cache_dir = PathBuf::from(dir);
        }
        if let Some(suffix) = lookup(ENV_DATASET_SUFFIX) {
            self.data.dataset_suffix = Some(suffix).filter(|s| !s.is_empty());
        }
    }

    /// Check every section before any data is read
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.data.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::out_of_range("data_dir must not be empty"));
        }
        if let Some(suffix) = &self.data.dataset_suffix {
            validate_dataset_suffix(suffix)?;
        }
        self.cache.validate().map_err(ConfigError::out_of_range)?;

        if let (Some(start), Some(end)) = (self.load.start_date, self.load.end_date) {
            if start > end {
                return Err(ConfigError::inconsistent(format!("start_date {start} is after end_date {end}")));
            }
        }
        if self.load.max_rank == Some(0) {
            return Err(ConfigError::out_of_range("max_rank must be at least 1"));
        }

        self.distribution.binning_params().validate()?;
        if let Some(p) = self.distribution.percentiles.iter().find(|p| !(**p > 0.0 && **p <= 100.0)) {
            return Err(ConfigError::out_of_range(format!("percentile {p} must be within (0, 100]")));
        }

        ThresholdClassifier::new(self.thresholds.thresholds.clone())?;
        if let Some(t) = self.thresholds.medal_targets.iter().find(|t| !(t.is_finite() && **t >= 0.0)) {
            return Err(ConfigError::out_of_range(format!("medal target {t} must be a non-negative count")));
        }

        Ok(())
    }
}

/// A dataset suffix names a single directory level
pub fn validate_dataset_suffix(suffix: &str) -> std::result::Result<(), ConfigError> {
    let valid = !suffix.is_empty()
        && suffix != "."
        && suffix != ".."
        && !suffix.contains(['/', '\\'])
        && !suffix.chars().any(char::is_control);
    if valid {
        Ok(())
    } else {
        Err(ConfigError::invalid("dataset suffix", suffix))
    }
}
