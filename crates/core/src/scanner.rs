//! Read-only filesystem traversal for asset collections.

use crate::config::CollectionDescriptor;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Timestamp substitute when a path is missing or unreadable. A pre-epoch or
/// unreadable mtime collapses to the same value (see [`mtime_secs`]), so the
/// two cases are indistinguishable; both mean "treat as changed once a real
/// timestamp appears".
pub const MISSING_MTIME: i64 = 0;

#[derive(Debug, Clone)]
pub struct ScannedAsset {
    /// Path relative to the collection root, `/`-separated.
    pub rel_path: String,
    pub abs_path: PathBuf,
    pub size: u64,
    pub mtime: i64,
}

/// Walks a collection's base directory and returns every accepted file as a
/// candidate. A missing base directory is an empty collection; unreadable
/// entries are skipped. No ordering guarantee.
pub fn scan_collection(descriptor: &CollectionDescriptor) -> Vec<ScannedAsset> {
    let base = &descriptor.base_dir;
    if !base.is_dir() {
        return Vec::new();
    }
    let mut assets = Vec::new();
    for entry in WalkDir::new(base).follow_links(true) {
        let entry = match entry {
            Ok(e) => e,
            Err(_) => continue,
        };
        if entry.file_type().is_dir() {
            continue;
        }
        let path = entry.path();
        let accepted = path
            .file_name()
            .map(|name| descriptor.extensions.is_match(name))
            .unwrap_or(false);
        if !accepted {
            continue;
        }
        let meta = match entry.metadata() {
            Ok(m) => m,
            Err(_) => continue,
        };
        let rel = match path.strip_prefix(base) {
            Ok(r) => r,
            Err(_) => continue,
        };
        assets.push(ScannedAsset {
            rel_path: join_components(rel),
            abs_path: path.to_path_buf(),
            size: meta.len(),
            mtime: mtime_secs(&meta),
        });
    }
    assets
}

/// Timestamp per directory under `base` (key relative to `base`, `"."` for
/// the base itself): the newest mtime among the directory itself and its
/// immediate files. Deleting or adding a file bumps the directory's own
/// mtime, so the map changes even when the removed file was not the newest.
/// Missing base yields an empty map.
pub fn directory_mtimes(base: &Path) -> BTreeMap<String, i64> {
    let mut map = BTreeMap::new();
    if !base.is_dir() {
        return map;
    }
    for entry in WalkDir::new(base).follow_links(true) {
        let entry = match entry {
            Ok(e) => e,
            Err(_) => continue,
        };
        if !entry.file_type().is_dir() {
            continue;
        }
        let key = match entry.path().strip_prefix(base) {
            Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
            Ok(rel) => join_components(rel),
            Err(_) => continue,
        };
        map.insert(key, newest_entry_mtime(entry.path()));
    }
    map
}

/// Modification time of the collection root itself.
pub fn root_mtime(base: &Path) -> i64 {
    fs::metadata(base)
        .map(|meta| mtime_secs(&meta))
        .unwrap_or(MISSING_MTIME)
}

pub fn mtime_secs(meta: &fs::Metadata) -> i64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

fn newest_entry_mtime(dir: &Path) -> i64 {
    let mut newest = root_mtime(dir);
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return newest,
    };
    for entry in entries.flatten() {
        let meta = match entry.metadata() {
            Ok(m) => m,
            Err(_) => continue,
        };
        if meta.is_file() {
            newest = newest.max(mtime_secs(&meta));
        }
    }
    newest
}

fn join_components(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CollectionConfig, Strategy};
    use std::fs;
    use tempfile::tempdir;

    fn descriptor(base: &Path) -> CollectionDescriptor {
        CollectionConfig {
            name: "wallpapers".to_string(),
            base_dir: base.to_string_lossy().into_owned(),
            strategy: Strategy::PerFile,
            extensions: vec!["png".to_string(), "jpg".to_string()],
        }
        .descriptor()
        .unwrap()
    }

    #[test]
    fn missing_base_yields_empty_scan() {
        let dir = tempdir().unwrap();
        let descriptor = descriptor(&dir.path().join("nope"));
        assert!(scan_collection(&descriptor).is_empty());
    }

    #[test]
    fn scan_recurses_and_filters_extensions() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a/deep")).unwrap();
        fs::write(dir.path().join("a/one.png"), b"x").unwrap();
        fs::write(dir.path().join("a/deep/two.JPG"), b"xy").unwrap();
        fs::write(dir.path().join("a/notes.txt"), b"skip").unwrap();
        fs::write(dir.path().join("top.png"), b"xyz").unwrap();

        let mut rels: Vec<String> = scan_collection(&descriptor(dir.path()))
            .into_iter()
            .map(|a| a.rel_path)
            .collect();
        rels.sort();
        assert_eq!(rels, vec!["a/deep/two.JPG", "a/one.png", "top.png"]);
    }

    #[test]
    fn scan_reports_size_and_mtime() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("one.png"), b"12345").unwrap();
        let assets = scan_collection(&descriptor(dir.path()));
        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].size, 5);
        assert!(assets[0].mtime > 0);
    }

    #[test]
    fn directory_mtimes_keys_every_directory() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a/empty")).unwrap();
        fs::write(dir.path().join("a/one.png"), b"x").unwrap();
        let map = directory_mtimes(dir.path());
        let mut keys: Vec<&str> = map.keys().map(String::as_str).collect();
        keys.sort();
        assert_eq!(keys, vec![".", "a", "a/empty"]);
        assert!(map["a"] > MISSING_MTIME);
    }

    #[test]
    fn directory_mtimes_of_missing_base_is_empty() {
        let dir = tempdir().unwrap();
        assert!(directory_mtimes(&dir.path().join("nope")).is_empty());
    }

    #[test]
    fn pre_epoch_mtime_collapses_to_sentinel() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("old.png");
        fs::write(&path, b"x").unwrap();
        let before_epoch = std::time::UNIX_EPOCH - std::time::Duration::from_secs(1_000);
        fs::File::open(&path)
            .unwrap()
            .set_modified(before_epoch)
            .unwrap();
        let meta = fs::metadata(&path).unwrap();
        assert_eq!(mtime_secs(&meta), MISSING_MTIME);
    }

    #[test]
    fn root_mtime_of_missing_base_is_sentinel() {
        let dir = tempdir().unwrap();
        assert_eq!(root_mtime(&dir.path().join("nope")), MISSING_MTIME);
        assert!(root_mtime(dir.path()) > MISSING_MTIME);
    }
}
