//! Reconciliation engine: diffs the filesystem against each collection's
//! cached listing, recomputes only what changed, and persists the merge.
//!
//! Each collection carries its own invalidation strategy ([`Strategy`]): the
//! bookkeeping cost scales with what a rebuild would cost. Image collections
//! invalidate per file because extraction is expensive; classification-only
//! collections invalidate per directory or on a single root timestamp because
//! their listings rebuild without any decoding.

use crate::config::{AppConfig, CollectionDescriptor, Strategy};
use crate::extractor::{Extraction, MetadataExtractor};
use crate::scanner::{self, ScannedAsset};
use anyhow::Context;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use storage::{AssetRecord, Cache, CacheStore, FALLBACK_COLOR, UNKNOWN_RESOLUTION};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("unknown collection '{0}'")]
    UnknownCollection(String),
    #[error("no assets in category '{category}' of collection '{collection}'")]
    CategoryNotFound {
        collection: String,
        category: String,
    },
    #[error(transparent)]
    Store(#[from] storage::StoreError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Owns the in-memory cache for every configured collection. Constructed once
/// at startup and shared by reference with whatever query layer sits on top.
pub struct AssetService {
    collections: HashMap<String, Collection>,
}

struct Collection {
    descriptor: CollectionDescriptor,
    store: CacheStore,
    extractor: Arc<dyn MetadataExtractor>,
    decode_slots: Arc<Semaphore>,
    state: Mutex<Cache>,
}

impl AssetService {
    /// Builds one handle per configured collection and primes each in-memory
    /// cache from the persisted store.
    pub fn new(
        config: &AppConfig,
        store: CacheStore,
        extractor: Arc<dyn MetadataExtractor>,
    ) -> anyhow::Result<Self> {
        let decode_slots = Arc::new(Semaphore::new(config.extraction.parallelism.max(1)));
        let mut collections = HashMap::new();
        for collection in &config.collections {
            let descriptor = collection.descriptor()?;
            if collections.contains_key(&descriptor.name) {
                anyhow::bail!("duplicate collection '{}' in configuration", descriptor.name);
            }
            let state = Mutex::new(store.load(&descriptor.name));
            collections.insert(
                descriptor.name.clone(),
                Collection {
                    descriptor,
                    store: store.clone(),
                    extractor: Arc::clone(&extractor),
                    decode_slots: Arc::clone(&decode_slots),
                    state,
                },
            );
        }
        Ok(Self { collections })
    }

    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.keys().cloned().collect();
        names.sort();
        names
    }

    /// Reconciles one collection against the filesystem and returns its
    /// refreshed listing sorted by name, optionally filtered to a single
    /// category. Repeated calls with no filesystem change return the same
    /// records without re-extracting anything.
    pub async fn reconcile_and_list(
        &self,
        collection: &str,
        category: Option<&str>,
    ) -> Result<Vec<AssetRecord>, ServiceError> {
        let handle = self
            .collections
            .get(collection)
            .ok_or_else(|| ServiceError::UnknownCollection(collection.to_string()))?;
        let mut records = handle.reconcile().await?;
        if let Some(category) = category {
            records.retain(|r| r.category == category);
            if records.is_empty() {
                return Err(ServiceError::CategoryNotFound {
                    collection: collection.to_string(),
                    category: category.to_string(),
                });
            }
        }
        records.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.key.cmp(&b.key)));
        Ok(records)
    }
}

impl Collection {
    async fn reconcile(&self) -> Result<Vec<AssetRecord>, ServiceError> {
        // Holding the cache lock across the whole pass serializes
        // reconciliation per collection: overlapping queries share one pass
        // instead of extracting the same files twice.
        let mut cache = self.state.lock().await;
        let changed = match self.descriptor.strategy {
            Strategy::PerFile => self.reconcile_per_file(&mut cache).await?,
            Strategy::PerDirectory => self.reconcile_per_directory(&mut cache),
            Strategy::WholeCollection => self.reconcile_whole_collection(&mut cache),
        };
        if changed {
            self.store.save(&self.descriptor.name, &cache)?;
        }
        Ok(cache.records.values().cloned().collect())
    }

    /// Fine-grained strategy: unchanged mtime keeps the cached record, new or
    /// changed files are re-extracted concurrently, and keys absent from the
    /// scan drop out of the next map.
    async fn reconcile_per_file(&self, cache: &mut Cache) -> Result<bool, ServiceError> {
        let scanned = scanner::scan_collection(&self.descriptor);
        let mut next = BTreeMap::new();
        let mut stale = Vec::new();
        for asset in scanned {
            let key = record_key(&self.descriptor.name, &asset.rel_path);
            match cache.records.get(&key) {
                Some(record) if record.last_modified == asset.mtime => {
                    next.insert(key, record.clone());
                }
                _ => stale.push((key, asset)),
            }
        }
        let changed = !stale.is_empty() || next.len() != cache.records.len();
        if stale.is_empty() {
            debug!(collection = %self.descriptor.name, "no stale assets");
        } else {
            info!(
                collection = %self.descriptor.name,
                stale = stale.len(),
                kept = next.len(),
                "extracting metadata for changed assets"
            );
        }

        let mut tasks = JoinSet::new();
        for (key, asset) in stale {
            let extractor = Arc::clone(&self.extractor);
            let slots = Arc::clone(&self.decode_slots);
            let folder_type = self.descriptor.name.clone();
            tasks.spawn(async move {
                let extraction = match slots.acquire_owned().await {
                    Ok(_permit) => extractor.extract(&asset.abs_path).await,
                    Err(_) => Extraction::Degraded,
                };
                extracted_record(key, &asset, &folder_type, extraction)
            });
        }
        while let Some(joined) = tasks.join_next().await {
            let record = joined.context("metadata extraction task panicked")?;
            next.insert(record.key.clone(), record);
        }

        cache.records = next;
        Ok(changed)
    }

    /// Directory-granular strategy: if every directory's newest-entry
    /// timestamp is unchanged the cached listing is reused verbatim without a
    /// single file read; otherwise the complete listing is rebuilt (cheap,
    /// classification only).
    fn reconcile_per_directory(&self, cache: &mut Cache) -> bool {
        let current = scanner::directory_mtimes(&self.descriptor.base_dir);
        if current == cache.dir_mtimes {
            debug!(collection = %self.descriptor.name, "directory timestamps unchanged, reusing listing");
            return false;
        }
        let records = self.classified_listing();
        info!(
            collection = %self.descriptor.name,
            entries = records.len(),
            "directory change detected, listing rebuilt"
        );
        cache.records = records;
        cache.dir_mtimes = current;
        true
    }

    /// Coarsest strategy: one timestamp on the collection root decides
    /// between wholesale reuse and a full rebuild.
    fn reconcile_whole_collection(&self, cache: &mut Cache) -> bool {
        let current = scanner::root_mtime(&self.descriptor.base_dir);
        if cache.root_mtime == Some(current) {
            debug!(collection = %self.descriptor.name, "root timestamp unchanged, reusing listing");
            return false;
        }
        let records = self.classified_listing();
        info!(
            collection = %self.descriptor.name,
            entries = records.len(),
            "root change detected, listing rebuilt"
        );
        cache.records = records;
        cache.root_mtime = Some(current);
        true
    }

    /// Fresh listing without image decoding, for collections whose records
    /// carry classification fields only.
    fn classified_listing(&self) -> BTreeMap<String, AssetRecord> {
        scanner::scan_collection(&self.descriptor)
            .into_iter()
            .map(|asset| {
                let key = record_key(&self.descriptor.name, &asset.rel_path);
                let record = classified_record(key, &asset, &self.descriptor.name);
                (record.key.clone(), record)
            })
            .collect()
    }
}

/// Stable cache key for a file: collection name plus relative path.
fn record_key(collection: &str, rel_path: &str) -> String {
    format!("{collection}:{rel_path}")
}

/// Category is the directory portion of the relative path; files at the
/// collection root fall into "uncategorized".
fn category_of(rel_path: &str) -> String {
    match rel_path.rsplit_once('/') {
        Some((dirs, _)) => dirs.to_string(),
        None => "uncategorized".to_string(),
    }
}

/// Splits a file stem on the first `@` into display name and author, the
/// `<name>@<author>.<ext>` convention the asset folders use.
fn split_stem(rel_path: &str) -> (String, Option<String>) {
    let file_name = rel_path.rsplit('/').next().unwrap_or(rel_path);
    let stem = file_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(file_name);
    match stem.split_once('@') {
        Some((name, author)) if !name.is_empty() && !author.is_empty() => {
            (name.to_string(), Some(author.to_string()))
        }
        _ => (stem.to_string(), None),
    }
}

fn classified_record(key: String, asset: &ScannedAsset, folder_type: &str) -> AssetRecord {
    let (name, author) = split_stem(&asset.rel_path);
    AssetRecord {
        key,
        name,
        author,
        category: category_of(&asset.rel_path),
        resolution: UNKNOWN_RESOLUTION.to_string(),
        size: asset.size,
        colors: vec![FALLBACK_COLOR.to_string()],
        last_modified: asset.mtime,
        folder_type: folder_type.to_string(),
    }
}

fn extracted_record(
    key: String,
    asset: &ScannedAsset,
    folder_type: &str,
    extraction: Extraction,
) -> AssetRecord {
    let mut record = classified_record(key, asset, folder_type);
    if let Extraction::Decoded { resolution, colors } = extraction {
        record.resolution = resolution;
        record.colors = colors;
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn asset(rel: &str) -> ScannedAsset {
        ScannedAsset {
            rel_path: rel.to_string(),
            abs_path: PathBuf::from(rel),
            size: 10,
            mtime: 100,
        }
    }

    #[test]
    fn record_key_is_collection_scoped() {
        assert_eq!(record_key("wallpapers", "a/1.png"), "wallpapers:a/1.png");
    }

    #[test]
    fn category_comes_from_parent_directories() {
        assert_eq!(category_of("a/1.png"), "a");
        assert_eq!(category_of("a/b/1.png"), "a/b");
        assert_eq!(category_of("1.png"), "uncategorized");
    }

    #[test]
    fn stem_splits_name_and_author() {
        assert_eq!(
            split_stem("a/Sunset@Ada.png"),
            ("Sunset".to_string(), Some("Ada".to_string()))
        );
        assert_eq!(split_stem("a/plain.png"), ("plain".to_string(), None));
        assert_eq!(split_stem("a/odd@.png"), ("odd@".to_string(), None));
    }

    #[test]
    fn degraded_extraction_keeps_fallback_fields() {
        let record = extracted_record(
            "w:a/1.png".to_string(),
            &asset("a/1.png"),
            "wallpapers",
            Extraction::Degraded,
        );
        assert_eq!(record.resolution, UNKNOWN_RESOLUTION);
        assert_eq!(record.colors, vec![FALLBACK_COLOR.to_string()]);
        assert_eq!(record.last_modified, 100);
    }

    #[test]
    fn decoded_extraction_overrides_fallback_fields() {
        let record = extracted_record(
            "w:a/1.png".to_string(),
            &asset("a/1.png"),
            "wallpapers",
            Extraction::Decoded {
                resolution: "100x50".to_string(),
                colors: vec!["#ff0000".to_string()],
            },
        );
        assert_eq!(record.resolution, "100x50");
        assert_eq!(record.colors, vec!["#ff0000".to_string()]);
        assert_eq!(record.folder_type, "wallpapers");
    }
}
