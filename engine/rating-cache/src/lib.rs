//! # Rating Cache
//!
//! Persists loaded rating histories so repeat runs skip re-parsing the
//! record tree.
//!
//! ## Architecture
//!
//! - **CacheKey**: the full parameter tuple a history was built with
//! - **CacheArtifact**: bincode-encoded history plus header, optionally gzipped
//! - **CacheBackend**: abstract trait over storage
//! - **LocalCache** / **InMemoryCache**: file-based and test implementations
//!
//! There is no automatic invalidation when record files change; callers
//! rebuild explicitly or delete the artifact.
//!
//! ## Usage
//!
//! ```rust
//! use rating_cache::{CacheBackend, CacheKey, LocalCache};
//! use rating_loader::{Category, ChangeCriteria, Discipline, RatingHistory};
//! use tempfile::TempDir;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let temp_dir = TempDir::new()?;
//!     let mut cache = LocalCache::with_default_config(temp_dir.path())?;
//!     cache.initialize().await?;
//!
//!     let key = CacheKey::new(Category::Batting, Discipline::Test, ChangeCriteria::None, None, None);
//!     cache.store(&key, &RatingHistory::default()).await?;
//!     assert!(cache.load(&key).await?.is_some());
//!
//!     Ok(())
//! }
//! ```

pub mod artifact;
pub mod backend;
pub mod config;
pub mod error;
pub mod key;

pub use artifact::{ArtifactFileInfo, ArtifactHeader, CacheArtifact};
pub use backend::{CacheBackend, InMemoryCache, LocalCache};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use key::CacheKey;
