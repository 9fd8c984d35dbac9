//! Configuration for the cache layer

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the cache layer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Base directory for cache artifacts
    pub cache_dir: PathBuf,

    /// Whether to gzip artifacts
    pub compress: bool,

    /// When disabled every load rebuilds and nothing is persisted
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { cache_dir: PathBuf::from("./cache"), compress: true, enabled: true }
    }
}

impl CacheConfig {
    /// Create a new configuration with custom cache directory
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self { cache_dir: cache_dir.into(), ..Default::default() }
    }

    /// Directory for one dataset; the suffix namespaces datasets side by side
    pub fn dataset_dir(&self, dataset_suffix: Option<&str>) -> PathBuf {
        match dataset_suffix.filter(|s| !s.is_empty()) {
            Some(suffix) => self.cache_dir.join(suffix),
            None => self.cache_dir.clone(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.cache_dir.as_os_str().is_empty() {
            return Err("cache_dir must not be empty".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_dir_namespacing() {
        let config = CacheConfig::new("/tmp/ratings-cache");
        assert_eq!(config.dataset_dir(None), PathBuf::from("/tmp/ratings-cache"));
        assert_eq!(config.dataset_dir(Some("")), PathBuf::from("/tmp/ratings-cache"));
        assert_eq!(config.dataset_dir(Some("_women")), PathBuf::from("/tmp/ratings-cache/_women"));
    }

    #[test]
    fn test_validate() {
        assert!(CacheConfig::default().validate().is_ok());
        assert!(CacheConfig::new("").validate().is_err());
    }
}
