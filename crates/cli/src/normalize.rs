//! Renames a collection's files to the sequential `<prefix> N@<author>.<ext>`
//! scheme the asset folders use, so freshly dropped-in files pick up the
//! name/author convention.

use anyhow::{Context, Result};
use mural_core::config::AppConfig;
use mural_core::scanner;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub fn run(
    cfg: &AppConfig,
    collection: &str,
    prefix: &str,
    author: &str,
    dry_run: bool,
) -> Result<()> {
    let collection_cfg = cfg
        .collections
        .iter()
        .find(|c| c.name == collection)
        .with_context(|| format!("unknown collection '{collection}'"))?;
    let descriptor = collection_cfg.descriptor()?;

    let mut assets = scanner::scan_collection(&descriptor);
    // Scan order is unspecified; sort so numbering is deterministic.
    assets.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));

    let mut renamed = 0usize;
    for (index, asset) in assets.iter().enumerate() {
        let ext = asset
            .abs_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("jpeg");
        let new_name = format!("{prefix} {}@{author}.{ext}", index + 1);
        let mut target = asset.abs_path.with_file_name(&new_name);
        if target == asset.abs_path {
            continue;
        }
        // The computed name can collide with a file still waiting its turn;
        // never rename over an existing file.
        if target.exists() {
            target = resolve_conflict(&target)?;
        }
        let target_name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or(new_name);
        if dry_run {
            println!("{} -> {target_name}", asset.rel_path);
            continue;
        }
        fs::rename(&asset.abs_path, &target)
            .with_context(|| format!("failed to rename '{}'", asset.rel_path))?;
        info!(from = %asset.rel_path, to = %target_name, "renamed");
        renamed += 1;
    }
    if !dry_run {
        println!("Renamed {renamed} file(s) in '{collection}'.");
    }
    Ok(())
}

fn resolve_conflict(dest: &Path) -> Result<PathBuf> {
    let stem = dest
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("file")
        .to_string();
    let ext = dest
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_string();
    let parent = dest.parent().unwrap_or_else(|| Path::new("."));
    let mut counter = 1;
    loop {
        let name = if ext.is_empty() {
            format!("{}_{}", stem, counter)
        } else {
            format!("{}_{}.{}", stem, counter, ext)
        };
        let candidate = parent.join(name);
        if !candidate.exists() {
            return Ok(candidate);
        }
        counter += 1;
    }
}
