//! Per-file metadata extraction: decode, measure, sample dominant colors.

use crate::colors::{dominant_colors, SAMPLE_DIM};
use async_trait::async_trait;
use image::imageops::FilterType;
use std::path::{Path, PathBuf};
use tokio::task;
use tracing::warn;

/// Outcome of metadata extraction for one file.
///
/// `Degraded` is the explicit fallback variant: the file exists but could not
/// be decoded. Its record materializes with `Unknown` resolution and the
/// single fallback color; extraction never aborts a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Decoded {
        resolution: String,
        colors: Vec<String>,
    },
    Degraded,
}

#[async_trait]
pub trait MetadataExtractor: Send + Sync {
    async fn extract(&self, path: &Path) -> Extraction;
}

/// Production extractor backed by the `image` crate. Decoding runs on the
/// blocking pool; the reconciliation engine bounds how many run at once.
#[derive(Debug, Clone)]
pub struct ImageExtractor {
    pub color_count: usize,
}

#[async_trait]
impl MetadataExtractor for ImageExtractor {
    async fn extract(&self, path: &Path) -> Extraction {
        let path = path.to_path_buf();
        let color_count = self.color_count;
        match task::spawn_blocking(move || decode_file(&path, color_count)).await {
            Ok(extraction) => extraction,
            Err(err) => {
                warn!(%err, "metadata extraction task failed");
                Extraction::Degraded
            }
        }
    }
}

fn decode_file(path: &PathBuf, color_count: usize) -> Extraction {
    let decoded = match image::open(path) {
        Ok(img) => img,
        Err(err) => {
            warn!(path = %path.display(), %err, "decode failed, keeping fallback metadata");
            return Extraction::Degraded;
        }
    };
    let (width, height) = (decoded.width(), decoded.height());
    let sample = image::imageops::resize(
        &decoded.to_rgb8(),
        SAMPLE_DIM,
        SAMPLE_DIM,
        FilterType::Nearest,
    );
    Extraction::Decoded {
        resolution: format!("{width}x{height}"),
        colors: dominant_colors(&sample, color_count),
    }
}
