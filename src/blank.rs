//! Blank-page detection via pixel statistics
//!
//! A rendered page is considered blank when almost no pixel differs from the
//! first one, or when the grayscale distribution is near-uniform. Flags are
//! cached per page and recomputed when the page re-renders at a new scale.

use std::collections::HashMap;

use crate::engine::Raster;

/// Per-channel difference beyond which a pixel counts as differing
pub const CHANNEL_DIFF_THRESHOLD: u8 = 5;
/// Differing-pixel count at or below which a page is flagged blank
pub const MAX_DIFFERING_PIXELS: u32 = 10;
/// Grayscale standard deviation below which a page is flagged blank
pub const MIN_STDDEV: f32 = 5.0;

/// Pixel statistics for one rendered raster
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelStats {
    /// Pixels differing from the first pixel, counted up to
    /// [`MAX_DIFFERING_PIXELS`] + 1
    pub differing: u32,
    /// Mean of per-pixel grayscale averages
    pub mean: f32,
    /// Standard deviation of per-pixel grayscale averages
    pub stddev: f32,
}

impl PixelStats {
    #[must_use]
    pub fn looks_blank(&self) -> bool {
        self.differing <= MAX_DIFFERING_PIXELS || self.stddev < MIN_STDDEV
    }
}

/// Compute pixel statistics over an RGBA raster.
///
/// Differing-pixel counting early-exits once the count can no longer flag
/// the page; the grayscale moments always cover the full buffer.
#[must_use]
pub fn analyze(raster: &Raster) -> PixelStats {
    let mut pixels = raster.pixels.chunks_exact(4);
    let Some(first) = pixels.next() else {
        return PixelStats {
            differing: 0,
            mean: 0.0,
            stddev: 0.0,
        };
    };

    let reference: [u8; 4] = [first[0], first[1], first[2], first[3]];
    let mut differing: u32 = 0;

    let first_gray = f64::from(u32::from(first[0]) + u32::from(first[1]) + u32::from(first[2])) / 3.0;
    let mut sum = first_gray;
    let mut sum_sq = first_gray * first_gray;

    for px in pixels {
        if differing <= MAX_DIFFERING_PIXELS
            && px
                .iter()
                .zip(reference.iter())
                .any(|(&a, &b)| a.abs_diff(b) > CHANNEL_DIFF_THRESHOLD)
        {
            differing += 1;
        }

        let gray = f64::from(u32::from(px[0]) + u32::from(px[1]) + u32::from(px[2])) / 3.0;
        sum += gray;
        sum_sq += gray * gray;
    }

    let count = raster.pixel_count() as f64;
    let mean = sum / count;
    let variance = (sum_sq / count - mean * mean).max(0.0);

    PixelStats {
        differing,
        mean: mean as f32,
        stddev: variance.sqrt() as f32,
    }
}

#[derive(Clone, Copy, Debug)]
struct FlagEntry {
    blank: bool,
    scale_millionths: u32,
}

/// Lazily populated blank flags, keyed by page number
#[derive(Debug, Default)]
pub struct BlankFlags {
    flags: HashMap<usize, FlagEntry>,
}

impl BlankFlags {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Analyze a freshly rendered raster for `page`, reusing the cached flag
    /// when the raster scale is unchanged. Returns whether the page is blank.
    pub fn record(&mut self, page: usize, scale: f32, raster: &Raster) -> bool {
        let scale_millionths = (scale * 1_000_000.0) as u32;

        if let Some(entry) = self.flags.get(&page) {
            if entry.scale_millionths == scale_millionths {
                return entry.blank;
            }
        }

        let blank = analyze(raster).looks_blank();
        self.flags.insert(
            page,
            FlagEntry {
                blank,
                scale_millionths,
            },
        );
        blank
    }

    /// Cached flag for a page, if it was ever analyzed
    #[must_use]
    pub fn get(&self, page: usize) -> Option<bool> {
        self.flags.get(&page).map(|entry| entry.blank)
    }

    pub fn clear(&mut self) {
        self.flags.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_white_raster_is_blank() {
        let raster = Raster::filled(64, 64, [0xFF, 0xFF, 0xFF, 0xFF]);
        let stats = analyze(&raster);

        assert_eq!(stats.differing, 0);
        assert_eq!(stats.stddev, 0.0);
        assert!(stats.looks_blank());
    }

    #[test]
    fn all_black_raster_is_blank() {
        let raster = Raster::filled(32, 32, [0, 0, 0, 0xFF]);
        assert!(analyze(&raster).looks_blank());
    }

    #[test]
    fn near_uniform_raster_is_blank() {
        // A handful of outliers is below the differing-pixel threshold
        let mut raster = Raster::filled(64, 64, [0xF8, 0xF8, 0xF8, 0xFF]);
        for i in 0..8 {
            let at = i * 97 * 4;
            raster.pixels[at] = 0x00;
        }

        let stats = analyze(&raster);
        assert!(stats.differing <= MAX_DIFFERING_PIXELS);
        assert!(stats.looks_blank());
    }

    #[test]
    fn randomized_raster_is_not_blank() {
        use rand::{RngCore, SeedableRng};

        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let mut raster = Raster::new(64, 64);
        rng.fill_bytes(&mut raster.pixels);
        for px in raster.pixels.chunks_exact_mut(4) {
            px[3] = 0xFF;
        }

        let stats = analyze(&raster);
        assert!(stats.differing > MAX_DIFFERING_PIXELS);
        assert!(stats.stddev >= MIN_STDDEV);
        assert!(!stats.looks_blank());
    }

    #[test]
    fn flags_cache_per_page_and_scale() {
        let mut flags = BlankFlags::new();
        let blank = Raster::filled(16, 16, [0xFF, 0xFF, 0xFF, 0xFF]);

        assert!(flags.record(3, 1.0, &blank));
        assert_eq!(flags.get(3), Some(true));
        assert_eq!(flags.get(4), None);

        // Same scale reuses the cached verdict even for different pixels
        let textured = checkerboard();
        assert!(flags.record(3, 1.0, &textured));

        // A new scale forces re-analysis
        assert!(!flags.record(3, 1.5, &textured));
        assert_eq!(flags.get(3), Some(false));
    }

    fn checkerboard() -> Raster {
        let mut raster = Raster::new(16, 16);
        for y in 0..16u32 {
            for x in 0..16u32 {
                let v = if (x + y) % 2 == 0 { 0x00 } else { 0xFF };
                let at = ((y * 16 + x) * 4) as usize;
                raster.pixels[at..at + 4].copy_from_slice(&[v, v, v, 0xFF]);
            }
        }
        raster
    }
}
