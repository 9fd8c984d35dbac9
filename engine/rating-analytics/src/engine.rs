//! # Rating Engine
//!
//! Entry point used by reporting collaborators: resolves a [`LoadRequest`] to
//! a filtered [`RatingHistory`], going through the artifact cache.
//!
//! ## Flow
//!
//! 1. Build the [`CacheKey`] for the request.
//! 2. Unless a rebuild is forced, return the stored artifact on a hit.
//! 3. On a miss, load record files, apply the change filter, check that the
//!    rating and rank matrices share their keys, and persist the result.
//!
//! Cached artifacts are trusted as long as they exist; callers pass
//! `force_rebuild` after the record files changed.

use crate::change_filter::ChangeFilter;
use crate::config::{validate_dataset_suffix, EngineConfig};
use crate::error::Result;
use rating_cache::{ArtifactFileInfo, CacheBackend, CacheKey, LocalCache};
use rating_loader::{
    AllrounderRule, Category, ChangeCriteria, Discipline, LoaderConfig, RatingHistory, RecordLoader, WindowKind,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

/// Parameters of one load
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadRequest {
    pub category: Category,
    pub discipline: Discipline,
    pub change_criteria: ChangeCriteria,
    pub window_kind: Option<WindowKind>,
    pub allrounder_rule: AllrounderRule,
    pub force_rebuild: bool,
    pub dataset_suffix: Option<String>,
}

impl LoadRequest {
    pub fn new(category: Category, discipline: Discipline) -> Self {
        Self {
            category,
            discipline,
            change_criteria: ChangeCriteria::None,
            window_kind: None,
            allrounder_rule: AllrounderRule::default(),
            force_rebuild: false,
            dataset_suffix: None,
        }
    }

    /// Request built from the `[load]` and `[data]` sections
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            category: config.load.category,
            discipline: config.load.discipline,
            change_criteria: config.load.change_criteria,
            window_kind: config.load.window_kind,
            allrounder_rule: config.load.allrounder_rule,
            force_rebuild: false,
            dataset_suffix: config.data.dataset_suffix.clone(),
        }
    }

    pub fn with_change_criteria(mut self, criteria: ChangeCriteria, window_kind: Option<WindowKind>) -> Self {
        self.change_criteria = criteria;
        self.window_kind = window_kind;
        self
    }

    pub fn with_allrounder_rule(mut self, rule: AllrounderRule) -> Self {
        self.allrounder_rule = rule;
        self
    }

    pub fn with_dataset_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.dataset_suffix = Some(suffix.into());
        self
    }

    pub fn force_rebuild(mut self, force: bool) -> Self {
        self.force_rebuild = force;
        self
    }

    /// Parameters that change the result; the window kind only matters when
    /// filtering, the composite rule only for the composite category
    pub fn cache_key(&self) -> CacheKey {
        let window_kind = self.window_kind.filter(|_| self.change_criteria != ChangeCriteria::None);
        let allrounder_rule = Some(self.allrounder_rule).filter(|_| self.category.is_composite());
        CacheKey::new(self.category, self.discipline, self.change_criteria, window_kind, allrounder_rule)
            .with_dataset(self.suffix())
    }

    fn suffix(&self) -> Option<&str> {
        self.dataset_suffix.as_deref().filter(|s| !s.is_empty())
    }
}

/// Outcome counters of one load
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadReport {
    pub key: CacheKey,
    pub cache_hit: bool,
    pub days: usize,
    pub entities: usize,
    pub elapsed_ms: u64,
}

enum CacheStore {
    Disabled,
    /// One local directory per dataset, opened per request
    Local,
    Shared(Box<dyn CacheBackend>),
}

/// Loads rating histories through the cache
pub struct RatingEngine {
    config: EngineConfig,
    store: CacheStore,
}

impl RatingEngine {
    /// Engine backed by the local file cache described in `config`
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let store = if config.cache.enabled { CacheStore::Local } else { CacheStore::Disabled };
        Ok(Self { config, store })
    }

    /// Engine backed by a caller-supplied cache, shared by every dataset.
    /// Artifacts stay apart because the dataset suffix is part of the key.
    pub async fn with_backend(config: EngineConfig, mut backend: Box<dyn CacheBackend>) -> Result<Self> {
        config.validate()?;
        backend.initialize().await?;
        Ok(Self { config, store: CacheStore::Shared(backend) })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub async fn load(&self, request: &LoadRequest) -> Result<RatingHistory> {
        let (history, _) = self.load_with_report(request).await?;
        Ok(history)
    }

    pub async fn load_with_report(&self, request: &LoadRequest) -> Result<(RatingHistory, LoadReport)> {
        let started = Instant::now();
        let key = request.cache_key();
        let local = self.open_local(request.suffix()).await?;
        let backend = self.backend(local.as_ref());

        let cached = match backend {
            Some(cache) if !request.force_rebuild => cache.load(&key).await?,
            _ => None,
        };
        let cache_hit = cached.is_some();

        let history = match cached {
            Some(artifact) => {
                debug!("Cache hit for {} (artifact {})", key, artifact.header.id);
                artifact.history.validate()?;
                artifact.history
            }
            None => {
                let history = self.build(request).await?;
                history.validate()?;
                if let Some(cache) = backend {
                    let header = cache.store(&key, &history).await?;
                    debug!("Stored artifact {} for {}", header.id, key);
                }
                history
            }
        };

        let report = LoadReport {
            key,
            cache_hit,
            days: history.day_count(),
            entities: history.entity_count(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            "Loaded {}: {} days, {} entities (cache {}, {} ms)",
            report.key,
            report.days,
            report.entities,
            if cache_hit { "hit" } else { "miss" },
            report.elapsed_ms
        );

        Ok((history, report))
    }

    /// Every artifact stored for a dataset
    pub async fn cache_entries(&self, dataset_suffix: Option<&str>) -> Result<Vec<ArtifactFileInfo>> {
        let local = self.open_local(dataset_suffix).await?;
        let Some(cache) = self.backend(local.as_ref()) else {
            return Ok(Vec::new());
        };

        let dataset = dataset_suffix.filter(|s| !s.is_empty());
        let mut entries = cache.list().await?;
        entries.retain(|entry| entry.header.key.dataset.as_deref() == dataset);
        Ok(entries)
    }

    /// Remove every artifact stored for a dataset; returns how many were removed
    pub async fn clear_cache(&self, dataset_suffix: Option<&str>) -> Result<usize> {
        let local = self.open_local(dataset_suffix).await?;
        let Some(cache) = self.backend(local.as_ref()) else {
            return Ok(0);
        };

        let dataset = dataset_suffix.filter(|s| !s.is_empty());
        let mut removed = 0;
        for entry in cache.list().await?.into_iter().filter(|e| e.header.key.dataset.as_deref() == dataset) {
            if cache.invalidate(&entry.header.key).await? {
                removed += 1;
            }
        }

        info!("Removed {} cached artifacts", removed);
        Ok(removed)
    }

    async fn build(&self, request: &LoadRequest) -> Result<RatingHistory> {
        let loader_config = LoaderConfig::new(self.config.data.data_dir.clone())
            .with_suffix(request.dataset_suffix.clone());
        let loader = RecordLoader::new(loader_config);

        let history = loader.load(request.category, request.discipline, request.allrounder_rule).await?;
        let filter = ChangeFilter::new(request.change_criteria, request.window_kind);
        Ok(filter.apply(history))
    }

    async fn open_local(&self, dataset_suffix: Option<&str>) -> Result<Option<LocalCache>> {
        if let Some(suffix) = dataset_suffix.filter(|s| !s.is_empty()) {
            validate_dataset_suffix(suffix)?;
        }
        if !matches!(self.store, CacheStore::Local) {
            return Ok(None);
        }

        let mut cache = LocalCache::new(self.config.cache.clone(), dataset_suffix)?;
        cache.initialize().await?;
        Ok(Some(cache))
    }

    fn backend<'a>(&'a self, local: Option<&'a LocalCache>) -> Option<&'a dyn CacheBackend> {
        match &self.store {
            CacheStore::Disabled => None,
            CacheStore::Local => local.map(|cache| cache as &dyn CacheBackend),
            CacheStore::Shared(backend) => Some(backend.as_ref()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_ignores_irrelevant_parameters() {
        let plain = LoadRequest::new(Category::Batting, Discipline::Test)
            .with_change_criteria(ChangeCriteria::None, Some(WindowKind::Yearly))
            .with_allrounder_rule(AllrounderRule::GeometricMean);
        assert_eq!(plain.cache_key().as_file_stem(), "batting_test_none_none_none_none");

        let composite = LoadRequest::new(Category::Allrounder, Discipline::Odi)
            .with_change_criteria(ChangeCriteria::Rating, Some(WindowKind::Quarterly));
        assert_eq!(composite.cache_key().as_file_stem(), "allrounder_odi_rating_quarterly_product_none");
    }

    #[test]
    fn test_request_from_config() {
        let mut config = EngineConfig::default();
        config.load.discipline = Discipline::T20;
        config.data.dataset_suffix = Some("_women".to_string());

        let request = LoadRequest::from_config(&config);
        assert_eq!(request.discipline, Discipline::T20);
        assert_eq!(request.suffix(), Some("_women"));
        assert!(!request.force_rebuild);
    }

    #[test]
    fn test_engine_rejects_invalid_config() {
        let mut config = EngineConfig::default();
        config.thresholds.thresholds = vec![];
        assert!(RatingEngine::new(config).is_err());
    }

    #[test]
    fn test_disabled_cache_lists_nothing() {
        let mut config = EngineConfig::default();
        config.cache.enabled = false;
        let engine = RatingEngine::new(config).unwrap();
        assert!(tokio_test::block_on(engine.cache_entries(None)).unwrap().is_empty());
        assert_eq!(tokio_test::block_on(engine.clear_cache(Some("_women"))).unwrap(), 0);
    }
}
