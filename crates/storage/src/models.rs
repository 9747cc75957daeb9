use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Resolution value for assets that were not (or could not be) decoded.
pub const UNKNOWN_RESOLUTION: &str = "Unknown";

/// Single color substituted when color extraction is skipped or fails.
pub const FALLBACK_COLOR: &str = "#000000";

/// One indexed asset. The `key` is derived from the collection name and the
/// file's relative path; it is the map key in the persisted document, not a
/// serialized field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRecord {
    #[serde(skip)]
    pub key: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub category: String,
    pub resolution: String,
    pub size: u64,
    pub colors: Vec<String>,
    pub last_modified: i64,
    pub folder_type: String,
}

/// In-memory and persisted cache state for one collection.
///
/// `records` is the listing itself. The other fields are invalidation state
/// and only populated for the strategy that uses them: `dir_mtimes` maps each
/// directory (relative to the collection root, `"."` for the root itself) to
/// the newest mtime among its immediate files, and `root_mtime` holds the
/// single timestamp of the collection root.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cache {
    #[serde(default)]
    pub records: BTreeMap<String, AssetRecord>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dir_mtimes: BTreeMap<String, i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_mtime: Option<i64>,
}

impl Cache {
    /// Restores the `key` field on every record after deserialization.
    pub fn rekey(&mut self) {
        for (key, record) in self.records.iter_mut() {
            record.key = key.clone();
        }
    }
}
