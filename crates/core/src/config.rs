use anyhow::Context;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub cache: CacheConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    pub collections: Vec<CollectionConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Upper bound on concurrent image decodes.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    /// How many dominant colors to keep per asset.
    #[serde(default = "default_color_count")]
    pub color_count: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            parallelism: default_parallelism(),
            color_count: default_color_count(),
        }
    }
}

fn default_parallelism() -> usize {
    4
}

fn default_color_count() -> usize {
    crate::colors::DEFAULT_COLOR_COUNT
}

/// How staleness is detected for a collection. Chosen once per collection in
/// configuration; the engine never branches on collection names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Per-file mtime comparison with metadata extraction for changed files.
    PerFile,
    /// Per-directory newest-entry timestamps; any change rebuilds the whole
    /// listing without decoding.
    PerDirectory,
    /// One timestamp on the collection root.
    WholeCollection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Collection slug; doubles as the record `folder_type` and the persisted
    /// document name.
    pub name: String,
    pub base_dir: String,
    pub strategy: Strategy,
    /// Accepted file extensions, without the leading dot.
    pub extensions: Vec<String>,
}

impl CollectionConfig {
    /// Compiles the static per-collection configuration into the descriptor
    /// the scanner and engine work with.
    pub fn descriptor(&self) -> anyhow::Result<CollectionDescriptor> {
        let mut builder = GlobSetBuilder::new();
        for ext in &self.extensions {
            let pattern = format!("*.{}", ext.trim_start_matches('.'));
            let glob = GlobBuilder::new(&pattern)
                .case_insensitive(true)
                .build()
                .with_context(|| format!("invalid extension '{ext}' in collection '{}'", self.name))?;
            builder.add(glob);
        }
        Ok(CollectionDescriptor {
            name: self.name.clone(),
            base_dir: PathBuf::from(&self.base_dir),
            strategy: self.strategy,
            extensions: builder.build()?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct CollectionDescriptor {
    pub name: String,
    pub base_dir: PathBuf,
    pub strategy: Strategy,
    pub extensions: GlobSet,
}

pub fn load(path: Option<&str>) -> anyhow::Result<AppConfig> {
    let mut settings = config::Config::builder();
    if let Some(p) = path {
        settings = settings.add_source(config::File::with_name(p));
    } else {
        settings = settings.add_source(config::File::with_name("config/default").required(false));
    }
    let cfg = settings.build()?;
    Ok(cfg.try_deserialize()?)
}
