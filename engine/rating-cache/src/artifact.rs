//! Cache artifact format
//!
//! An artifact is a captured [`RatingHistory`] plus a small header. On disk
//! it is `MAGIC | codec tag | bincode payload`, the payload optionally
//! gzip-compressed. The header is also written as a JSON sidecar so artifacts
//! can be listed without decoding the matrices.

use crate::error::{CacheError, Result};
use crate::key::CacheKey;
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use rating_loader::RatingHistory;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::PathBuf;
use uuid::Uuid;

/// Current artifact format version
pub const ARTIFACT_VERSION: u32 = 2;

const MAGIC: &[u8; 4] = b"RTGC";
const TAG_PLAIN: u8 = 0;
const TAG_GZIP: u8 = 1;

/// Descriptive header stored alongside the matrices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactHeader {
    /// Unique identifier for this artifact
    pub id: Uuid,

    /// Format version
    pub version: u32,

    /// Parameters the history was built with
    pub key: CacheKey,

    /// Timestamp when the artifact was created
    pub created_at: DateTime<Utc>,

    /// Number of dates in the history
    pub days: usize,

    /// Number of distinct players in the history
    pub entities: usize,
}

impl ArtifactHeader {
    pub fn describe(key: CacheKey, history: &RatingHistory) -> Self {
        Self {
            id: Uuid::new_v4(),
            version: ARTIFACT_VERSION,
            key,
            created_at: Utc::now(),
            days: history.day_count(),
            entities: history.entity_count(),
        }
    }
}

/// A persisted rating history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheArtifact {
    pub header: ArtifactHeader,
    pub history: RatingHistory,
}

impl CacheArtifact {
    pub fn new(key: CacheKey, history: RatingHistory) -> Self {
        Self { header: ArtifactHeader::describe(key, &history), history }
    }

    /// Serialize to artifact bytes
    pub fn encode(&self, compress: bool) -> Result<Vec<u8>> {
        let payload = bincode::serialize(self)?;

        let mut bytes = Vec::with_capacity(payload.len() / 2 + MAGIC.len() + 1);
        bytes.extend_from_slice(MAGIC);
        if compress {
            bytes.push(TAG_GZIP);
            let mut encoder = GzEncoder::new(bytes, Compression::default());
            encoder.write_all(&payload)?;
            bytes = encoder.finish()?;
        } else {
            bytes.push(TAG_PLAIN);
            bytes.extend_from_slice(&payload);
        }

        Ok(bytes)
    }

    /// Deserialize artifact bytes written by [`CacheArtifact::encode`]
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < MAGIC.len() + 1 || &bytes[..MAGIC.len()] != MAGIC {
            return Err(CacheError::corruption("missing artifact magic"));
        }

        let body = &bytes[MAGIC.len() + 1..];
        let artifact: CacheArtifact = match bytes[MAGIC.len()] {
            TAG_PLAIN => bincode::deserialize(body)
                .map_err(|e| CacheError::corruption(format!("undecodable payload: {e}")))?,
            TAG_GZIP => {
                let mut payload = Vec::new();
                GzDecoder::new(body)
                    .read_to_end(&mut payload)
                    .map_err(|e| CacheError::corruption(format!("bad gzip stream: {e}")))?;
                bincode::deserialize(&payload)
                    .map_err(|e| CacheError::corruption(format!("undecodable payload: {e}")))?
            }
            tag => return Err(CacheError::corruption(format!("unknown codec tag {tag}"))),
        };

        if artifact.header.version != ARTIFACT_VERSION {
            return Err(CacheError::corruption(format!(
                "artifact version {} is not supported (expected {})",
                artifact.header.version, ARTIFACT_VERSION
            )));
        }

        Ok(artifact)
    }
}

/// Artifact file information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactFileInfo {
    /// File path
    pub path: PathBuf,

    /// File size in bytes
    pub size: u64,

    /// Header read from the sidecar
    pub header: ArtifactHeader,
}
