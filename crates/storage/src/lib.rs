//! Storage layer: per-collection cache documents on disk.
//!
//! One JSON file per collection under the cache directory. Loads never fail:
//! a missing or unparseable document is treated as an empty cache so the
//! caller rebuilds from a fresh scan. Saves replace the prior document via
//! write-to-temp-then-rename so a concurrent loader never sees a partial
//! file.

use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

pub mod models;

pub use models::{AssetRecord, Cache, FALLBACK_COLOR, UNKNOWN_RESOLUTION};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to persist cache for collection '{collection}': {source}")]
    Persist {
        collection: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode cache for collection '{collection}': {source}")]
    Encode {
        collection: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn document_path(&self, collection: &str) -> PathBuf {
        self.dir.join(format!("{collection}.json"))
    }

    /// Loads the persisted cache for a collection. Missing or corrupt state
    /// is an empty cache, never an error.
    pub fn load(&self, collection: &str) -> Cache {
        let path = self.document_path(collection);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(_) => {
                debug!(collection, "no persisted cache, starting empty");
                return Cache::default();
            }
        };
        match serde_json::from_slice::<Cache>(&bytes) {
            Ok(mut cache) => {
                cache.rekey();
                cache
            }
            Err(err) => {
                warn!(collection, %err, "persisted cache unreadable, rebuilding");
                Cache::default()
            }
        }
    }

    /// Durably replaces the persisted cache for a collection.
    pub fn save(&self, collection: &str, cache: &Cache) -> Result<(), StoreError> {
        let persist = |source| StoreError::Persist {
            collection: collection.to_string(),
            source,
        };
        fs::create_dir_all(&self.dir).map_err(persist)?;

        let json = serde_json::to_vec_pretty(cache).map_err(|source| StoreError::Encode {
            collection: collection.to_string(),
            source,
        })?;

        let path = self.document_path(collection);
        let tmp = self.dir.join(format!("{collection}.json.tmp"));
        fs::write(&tmp, json).map_err(persist)?;
        fs::rename(&tmp, &path).map_err(persist)?;
        debug!(collection, entries = cache.records.len(), "cache persisted");
        Ok(())
    }
}
