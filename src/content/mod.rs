//! Content detection module
//!
//! Finds the bounding box of the most significant foreground region in a
//! tile, separating it from padding, borders and background.
//!
//! # Algorithm
//!
//! 1. Convert the tile to BT.601 luminance
//! 2. Binarize (fixed, Otsu or adaptive local-mean threshold) with the
//!    configured polarity
//! 3. Trace external contours of the foreground components
//! 4. Keep the axis-aligned bounding box of maximum area
//!
//! Detection never fails: a tile without foreground yields the full-tile box.
//!
//! # Example
//!
//! ```rust
//! use image::{Rgb, RgbImage};
//! use scantile::{ContentDetector, DetectOptions};
//!
//! let mut tile = RgbImage::from_pixel(64, 64, Rgb([0, 0, 0]));
//! for y in 10..30 {
//!     for x in 20..50 {
//!         tile.put_pixel(x, y, Rgb([200, 200, 200]));
//!     }
//! }
//!
//! let result = ContentDetector::detect(&tile, &DetectOptions::black_border(10));
//! assert_eq!((result.content_box.x1, result.content_box.y1), (20, 10));
//! assert_eq!((result.content_box.x2, result.content_box.y2), (50, 30));
//! ```

mod detector;
pub mod threshold;

pub use detector::{ContentDetector, DetectionResult};

// ============================================================
// Constants
// ============================================================

/// Default fixed threshold for near-black borders
const DEFAULT_BORDER_THRESHOLD: u8 = 10;

/// Default adaptive block size
const DEFAULT_ADAPTIVE_BLOCK_SIZE: u32 = 501;

/// Default adaptive bias (negative raises the local threshold)
const DEFAULT_ADAPTIVE_BIAS: i32 = -10;

// ============================================================
// Options
// ============================================================

/// Binarization strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdMode {
    /// Global fixed threshold
    Fixed(u8),
    /// Global threshold chosen by Otsu's method
    Otsu,
    /// Local mean over a `block_size` window, minus `bias`
    Adaptive { block_size: u32, bias: i32 },
}

impl ThresholdMode {
    pub fn name(&self) -> &'static str {
        match self {
            ThresholdMode::Fixed(_) => "fixed",
            ThresholdMode::Otsu => "otsu",
            ThresholdMode::Adaptive { .. } => "adaptive",
        }
    }
}

/// Which side of the threshold counts as content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Polarity {
    /// Content is brighter than the threshold (`p > t`), e.g. a scan on a black border
    #[default]
    BrightForeground,
    /// Content is at or below the threshold (`p <= t`), e.g. ink on white paper
    DarkForeground,
}

impl Polarity {
    /// Classify a pixel value against a threshold
    pub fn is_foreground(&self, value: i32, threshold: i32) -> bool {
        match self {
            Polarity::BrightForeground => value > threshold,
            Polarity::DarkForeground => value <= threshold,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Polarity::BrightForeground => "bright",
            Polarity::DarkForeground => "dark",
        }
    }
}

/// Content detection options
#[derive(Debug, Clone)]
pub struct DetectOptions {
    /// Binarization strategy
    pub mode: ThresholdMode,
    /// Foreground polarity
    pub polarity: Polarity,
    /// Regions whose box is narrower or shorter than this are ignored
    pub min_region_size: u32,
}

impl Default for DetectOptions {
    fn default() -> Self {
        Self::black_border(DEFAULT_BORDER_THRESHOLD)
    }
}

impl DetectOptions {
    /// Create a new options builder
    pub fn builder() -> DetectOptionsBuilder {
        DetectOptionsBuilder::default()
    }

    /// Content brighter than a near-black border
    pub fn black_border(threshold: u8) -> Self {
        Self {
            mode: ThresholdMode::Fixed(threshold),
            polarity: Polarity::BrightForeground,
            min_region_size: 1,
        }
    }

    /// Dark content on a light background, adaptive local threshold
    pub fn adaptive_dark_content() -> Self {
        Self {
            mode: ThresholdMode::Adaptive {
                block_size: DEFAULT_ADAPTIVE_BLOCK_SIZE,
                bias: DEFAULT_ADAPTIVE_BIAS,
            },
            polarity: Polarity::DarkForeground,
            min_region_size: 1,
        }
    }
}

/// Builder for DetectOptions
#[derive(Debug, Default)]
pub struct DetectOptionsBuilder {
    options: DetectOptions,
}

impl DetectOptionsBuilder {
    /// Use a fixed global threshold
    #[must_use]
    pub fn threshold(mut self, threshold: u8) -> Self {
        self.options.mode = ThresholdMode::Fixed(threshold);
        self
    }

    /// Use Otsu's automatic threshold
    #[must_use]
    pub fn otsu(mut self) -> Self {
        self.options.mode = ThresholdMode::Otsu;
        self
    }

    /// Use an adaptive local-mean threshold
    #[must_use]
    pub fn adaptive(mut self, block_size: u32, bias: i32) -> Self {
        self.options.mode = ThresholdMode::Adaptive {
            block_size: threshold::normalize_block_size(block_size),
            bias,
        };
        self
    }

    /// Set foreground polarity
    #[must_use]
    pub fn polarity(mut self, polarity: Polarity) -> Self {
        self.options.polarity = polarity;
        self
    }

    /// Set the minimum region size in pixels
    #[must_use]
    pub fn min_region_size(mut self, size: u32) -> Self {
        self.options.min_region_size = size.max(1);
        self
    }

    /// Build the options
    #[must_use]
    pub fn build(self) -> DetectOptions {
        self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let opts = DetectOptions::default();
        assert_eq!(opts.mode, ThresholdMode::Fixed(10));
        assert_eq!(opts.polarity, Polarity::BrightForeground);
        assert_eq!(opts.min_region_size, 1);
    }

    #[test]
    fn test_adaptive_preset() {
        let opts = DetectOptions::adaptive_dark_content();
        assert_eq!(
            opts.mode,
            ThresholdMode::Adaptive {
                block_size: 501,
                bias: -10
            }
        );
        assert_eq!(opts.polarity, Polarity::DarkForeground);
    }

    #[test]
    fn test_builder() {
        let opts = DetectOptions::builder()
            .adaptive(50, 5)
            .polarity(Polarity::DarkForeground)
            .min_region_size(0)
            .build();

        assert_eq!(
            opts.mode,
            ThresholdMode::Adaptive {
                block_size: 51,
                bias: 5
            }
        );
        assert_eq!(opts.min_region_size, 1);
    }

    #[test]
    fn test_polarity_classification() {
        assert!(Polarity::BrightForeground.is_foreground(11, 10));
        assert!(!Polarity::BrightForeground.is_foreground(10, 10));
        assert!(Polarity::DarkForeground.is_foreground(10, 10));
        assert!(!Polarity::DarkForeground.is_foreground(11, 10));
    }

    #[test]
    fn test_mode_names() {
        assert_eq!(ThresholdMode::Fixed(0).name(), "fixed");
        assert_eq!(ThresholdMode::Otsu.name(), "otsu");
        assert_eq!(
            ThresholdMode::Adaptive {
                block_size: 3,
                bias: 0
            }
            .name(),
            "adaptive"
        );
    }
}
