//! Dominant-color sampling.
//!
//! Images are downsampled to a fixed small resolution before counting, so the
//! cost is bounded regardless of source size. Ranking is by exact pixel-value
//! frequency; ties break toward the color seen first.

use image::RgbImage;
use std::collections::HashMap;
use storage::FALLBACK_COLOR;

/// Square edge of the downsampled image fed to the frequency count.
pub const SAMPLE_DIM: u32 = 100;

/// Default number of dominant colors kept per asset.
pub const DEFAULT_COLOR_COUNT: usize = 5;

/// Returns the `count` most frequent colors as lowercase `#rrggbb` strings.
/// Never returns an empty list: degenerate input falls back to
/// `["#000000"]`.
pub fn dominant_colors(image: &RgbImage, count: usize) -> Vec<String> {
    let mut freq: HashMap<[u8; 3], (usize, usize)> = HashMap::new();
    for (index, pixel) in image.pixels().enumerate() {
        let entry = freq.entry(pixel.0).or_insert((0, index));
        entry.0 += 1;
    }
    if freq.is_empty() || count == 0 {
        return vec![FALLBACK_COLOR.to_string()];
    }
    let mut ranked: Vec<([u8; 3], (usize, usize))> = freq.into_iter().collect();
    ranked.sort_by(|(_, a), (_, b)| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    ranked
        .into_iter()
        .take(count)
        .map(|(rgb, _)| hex(rgb))
        .collect()
}

fn hex([r, g, b]: [u8; 3]) -> String {
    format!("#{r:02x}{g:02x}{b:02x}")
}
