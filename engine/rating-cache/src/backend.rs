//! Cache backend trait and implementations

use crate::artifact::{ArtifactFileInfo, ArtifactHeader, CacheArtifact};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::key::CacheKey;
use rating_loader::RatingHistory;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

const ARTIFACT_EXTENSION: &str = "ratings";
const HEADER_EXTENSION: &str = "json";

/// Abstract trait for cache backends
#[async_trait::async_trait]
pub trait CacheBackend: Send + Sync {
    /// Initialize the cache backend
    async fn initialize(&mut self) -> Result<()>;

    /// Load the artifact stored under `key`, if any
    async fn load(&self, key: &CacheKey) -> Result<Option<CacheArtifact>>;

    /// Persist `history` under `key`, replacing any previous artifact
    async fn store(&self, key: &CacheKey, history: &RatingHistory) -> Result<ArtifactHeader>;

    /// Remove the artifact stored under `key`; returns whether one existed
    async fn invalidate(&self, key: &CacheKey) -> Result<bool>;

    /// Headers of every stored artifact, ordered by key
    async fn list(&self) -> Result<Vec<ArtifactFileInfo>>;

    /// Get the configuration
    fn config(&self) -> &CacheConfig;
}

/// Local file-based cache backend.
///
/// Artifacts for one dataset live in a single directory, one
/// `<key>.ratings` file plus a `<key>.json` header sidecar per key.
pub struct LocalCache {
    config: CacheConfig,
    dir: PathBuf,
    initialized: bool,
}

impl LocalCache {
    /// Create a new local cache for one dataset
    pub fn new(config: CacheConfig, dataset_suffix: Option<&str>) -> Result<Self> {
        // Validate configuration
        config.validate().map_err(CacheError::config)?;

        let dir = config.dataset_dir(dataset_suffix);
        Ok(Self { config, dir, initialized: false })
    }

    /// Create a new local cache with default config
    pub fn with_default_config(cache_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::new(CacheConfig::new(cache_dir), None)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn artifact_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{}.{}", key.as_file_stem(), ARTIFACT_EXTENSION))
    }

    fn header_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{}.{}", key.as_file_stem(), HEADER_EXTENSION))
    }

    fn ensure_initialized(&self) -> Result<()> {
        if !self.initialized {
            return Err(CacheError::invalid_operation("Cache backend not initialized"));
        }
        Ok(())
    }
}

/// Write through a temporary file so readers never see a half-written file
async fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

async fn remove_if_exists(path: &Path) -> Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[async_trait::async_trait]
impl CacheBackend for LocalCache {
    async fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }

        tokio::fs::create_dir_all(&self.dir).await?;
        self.initialized = true;

        tracing::info!("Local cache initialized at: {:?}", self.dir);

        Ok(())
    }

    async fn load(&self, key: &CacheKey) -> Result<Option<CacheArtifact>> {
        self.ensure_initialized()?;

        let path = self.artifact_path(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let artifact = CacheArtifact::decode(&bytes)?;
        if artifact.header.key != *key {
            return Err(CacheError::corruption(format!(
                "artifact {:?} holds key {} instead of {}",
                path, artifact.header.key, key
            )));
        }

        tracing::debug!("Read artifact {} ({} bytes) from {:?}", artifact.header.id, bytes.len(), path);

        Ok(Some(artifact))
    }

    async fn store(&self, key: &CacheKey, history: &RatingHistory) -> Result<ArtifactHeader> {
        self.ensure_initialized()?;

        let start_time = std::time::Instant::now();
        let artifact = CacheArtifact::new(key.clone(), history.clone());
        let bytes = artifact.encode(self.config.compress)?;

        let path = self.artifact_path(key);
        write_atomically(&path, &bytes).await?;
        let header_json = serde_json::to_vec_pretty(&artifact.header)?;
        write_atomically(&self.header_path(key), &header_json).await?;

        tracing::info!(
            "Stored artifact {} for {} ({}ms, {} bytes)",
            artifact.header.id,
            key,
            start_time.elapsed().as_millis(),
            bytes.len()
        );

        Ok(artifact.header)
    }

    async fn invalidate(&self, key: &CacheKey) -> Result<bool> {
        self.ensure_initialized()?;

        let removed = remove_if_exists(&self.artifact_path(key)).await?;
        remove_if_exists(&self.header_path(key)).await?;
        if removed {
            tracing::info!("Invalidated cache artifact for {}", key);
        }
        Ok(removed)
    }

    async fn list(&self) -> Result<Vec<ArtifactFileInfo>> {
        self.ensure_initialized()?;

        let mut artifacts = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some(ARTIFACT_EXTENSION) {
                continue;
            }

            let size = entry.metadata().await?.len();
            let header_bytes = match tokio::fs::read(path.with_extension(HEADER_EXTENSION)).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!("Artifact {:?} has no readable header: {}", path, e);
                    continue;
                }
            };
            let header: ArtifactHeader = serde_json::from_slice(&header_bytes)?;
            artifacts.push(ArtifactFileInfo { path, size, header });
        }

        artifacts.sort_by_key(|a| a.header.key.as_file_stem());
        Ok(artifacts)
    }

    fn config(&self) -> &CacheConfig {
        &self.config
    }
}

/// In-memory cache backend (for testing)
pub struct InMemoryCache {
    config: CacheConfig,
    artifacts: Arc<Mutex<HashMap<CacheKey, CacheArtifact>>>,
    initialized: bool,
}

impl InMemoryCache {
    /// Create a new in-memory cache backend
    pub fn new(config: CacheConfig) -> Self {
        Self { config, artifacts: Arc::new(Mutex::new(HashMap::new())), initialized: false }
    }

    /// Create a new in-memory cache backend with default config
    pub fn with_default_config() -> Self {
        Self::new(CacheConfig::default())
    }
}

#[async_trait::async_trait]
impl CacheBackend for InMemoryCache {
    async fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }

        self.initialized = true;

        tracing::info!("In-memory cache initialized");

        Ok(())
    }

    async fn load(&self, key: &CacheKey) -> Result<Option<CacheArtifact>> {
        if !self.initialized {
            return Err(CacheError::invalid_operation("Cache backend not initialized"));
        }

        let artifacts = self.artifacts.lock().await;
        Ok(artifacts.get(key).cloned())
    }

    async fn store(&self, key: &CacheKey, history: &RatingHistory) -> Result<ArtifactHeader> {
        if !self.initialized {
            return Err(CacheError::invalid_operation("Cache backend not initialized"));
        }

        let artifact = CacheArtifact::new(key.clone(), history.clone());
        let header = artifact.header.clone();
        let mut artifacts = self.artifacts.lock().await;
        artifacts.insert(key.clone(), artifact);

        Ok(header)
    }

    async fn invalidate(&self, key: &CacheKey) -> Result<bool> {
        if !self.initialized {
            return Err(CacheError::invalid_operation("Cache backend not initialized"));
        }

        let mut artifacts = self.artifacts.lock().await;
        Ok(artifacts.remove(key).is_some())
    }

    async fn list(&self) -> Result<Vec<ArtifactFileInfo>> {
        if !self.initialized {
            return Err(CacheError::invalid_operation("Cache backend not initialized"));
        }

        let artifacts = self.artifacts.lock().await;
        let mut infos: Vec<ArtifactFileInfo> = artifacts
            .iter()
            .map(|(key, artifact)| ArtifactFileInfo {
                path: PathBuf::from(key.as_file_stem()),
                size: 0,
                header: artifact.header.clone(),
            })
            .collect();
        infos.sort_by_key(|a| a.header.key.as_file_stem());
        Ok(infos)
    }

    fn config(&self) -> &CacheConfig {
        &self.config
    }
}
