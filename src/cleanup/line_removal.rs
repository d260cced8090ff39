//! Horizontal Line Artifact Removal module
//!
//! Erases thin horizontal bands (scan-line artifacts, ruling lines) by
//! painting them over with a fill color.
//!
//! # Algorithm
//!
//! 1. Mark pixels that differ from the fill color beyond a tolerance
//! 2. Open the mask with a wide, one-pixel-tall structuring element so only
//!    long horizontal runs survive
//! 3. Trace external contours of what is left
//! 4. Paint every box wider than `min_aspect_ratio` times its height with
//!    the fill color
//!
//! Running the remover on an already cleaned tile finds nothing to paint.

use image::{GrayImage, Luma, Rgb};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::morphology::{grayscale_open, Mask};
use tracing::debug;

use crate::content::ContentDetector;
use crate::raster::RasterBuffer;
use crate::tiling::Rectangle;

// ============================================================
// Constants
// ============================================================

/// Default expected stroke thickness in pixels
const DEFAULT_THICKNESS_HINT: u32 = 2;

/// Default kernel width as a multiple of the thickness hint
const DEFAULT_KERNEL_MULTIPLIER: u32 = 10;

/// Default per-channel tolerance against the fill color
const DEFAULT_COLOR_TOLERANCE: u8 = 32;

/// Width/height ratio separating lines from blobs
const DEFAULT_MIN_ASPECT_RATIO: f32 = 1.5;

/// Largest structuring element the morphology mask accepts
const MAX_KERNEL_WIDTH: u32 = 511;

/// Smallest useful structuring element
const MIN_KERNEL_WIDTH: u32 = 3;

// ============================================================
// Types
// ============================================================

/// Options for horizontal line removal
#[derive(Debug, Clone, PartialEq)]
pub struct LineRemovalOptions {
    /// Background color lines are painted with
    pub fill_color: Rgb<u8>,

    /// Expected line thickness in pixels
    pub thickness_hint: u32,

    /// Structuring element width ~ `thickness_hint * kernel_multiplier`
    pub kernel_multiplier: u32,

    /// Max per-channel difference still treated as background
    pub color_tolerance: u8,

    /// A box is a line when `width > min_aspect_ratio * height`
    pub min_aspect_ratio: f32,
}

impl Default for LineRemovalOptions {
    fn default() -> Self {
        Self {
            fill_color: Rgb([255, 255, 255]),
            thickness_hint: DEFAULT_THICKNESS_HINT,
            kernel_multiplier: DEFAULT_KERNEL_MULTIPLIER,
            color_tolerance: DEFAULT_COLOR_TOLERANCE,
            min_aspect_ratio: DEFAULT_MIN_ASPECT_RATIO,
        }
    }
}

impl LineRemovalOptions {
    /// Create a builder
    pub fn builder() -> LineRemovalOptionsBuilder {
        LineRemovalOptionsBuilder::default()
    }

    /// Lines on a black background
    pub fn on_black() -> Self {
        Self {
            fill_color: Rgb([0, 0, 0]),
            ..Default::default()
        }
    }

    /// Structuring element width in pixels (always odd, so the element is centered)
    pub fn kernel_width(&self) -> u32 {
        (self.thickness_hint.max(1) * self.kernel_multiplier.max(1))
            .clamp(MIN_KERNEL_WIDTH, MAX_KERNEL_WIDTH)
            | 1
    }
}

/// Builder for LineRemovalOptions
#[derive(Debug, Default)]
pub struct LineRemovalOptionsBuilder {
    options: LineRemovalOptions,
}

impl LineRemovalOptionsBuilder {
    /// Set fill color
    #[must_use]
    pub fn fill_color(mut self, color: Rgb<u8>) -> Self {
        self.options.fill_color = color;
        self
    }

    /// Set thickness hint
    #[must_use]
    pub fn thickness_hint(mut self, pixels: u32) -> Self {
        self.options.thickness_hint = pixels.max(1);
        self
    }

    /// Set kernel multiplier
    #[must_use]
    pub fn kernel_multiplier(mut self, multiplier: u32) -> Self {
        self.options.kernel_multiplier = multiplier.max(1);
        self
    }

    /// Set color tolerance
    #[must_use]
    pub fn color_tolerance(mut self, tolerance: u8) -> Self {
        self.options.color_tolerance = tolerance;
        self
    }

    /// Set minimum aspect ratio
    #[must_use]
    pub fn min_aspect_ratio(mut self, ratio: f32) -> Self {
        self.options.min_aspect_ratio = ratio.max(1.0);
        self
    }

    /// Build the options
    #[must_use]
    pub fn build(self) -> LineRemovalOptions {
        self.options
    }
}

/// Line removal outcome
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineRemovalReport {
    /// Boxes painted with the fill color, in discovery order
    pub painted: Vec<Rectangle>,
}

impl LineRemovalReport {
    pub fn lines_removed(&self) -> usize {
        self.painted.len()
    }

    pub fn is_clean(&self) -> bool {
        self.painted.is_empty()
    }
}

// ============================================================
// Line Artifact Remover
// ============================================================

/// Horizontal line artifact remover
pub struct LineArtifactRemover;

impl LineArtifactRemover {
    /// Remove horizontal lines from a tile in place
    pub fn remove_horizontal_lines(
        tile: &mut RasterBuffer,
        options: &LineRemovalOptions,
    ) -> LineRemovalReport {
        let mask = Self::difference_mask(tile, options.fill_color, options.color_tolerance);
        let opened = grayscale_open(&mask, &Self::horizontal_kernel(options.kernel_width()));

        let painted: Vec<Rectangle> = ContentDetector::external_boxes(&opened)
            .into_iter()
            .filter(|b| Self::is_line(b, options.min_aspect_ratio))
            .collect();

        for rect in &painted {
            draw_filled_rect_mut(tile, rect.to_rect(), options.fill_color);
        }

        if !painted.is_empty() {
            debug!(lines = painted.len(), "removed horizontal line artifacts");
        }

        LineRemovalReport { painted }
    }

    /// Shape heuristic separating lines from blobs
    fn is_line(rect: &Rectangle, min_aspect_ratio: f32) -> bool {
        rect.width() as f32 > min_aspect_ratio * rect.height() as f32
    }

    /// Foreground where any channel differs from `fill` by more than `tolerance`
    fn difference_mask(tile: &RasterBuffer, fill: Rgb<u8>, tolerance: u8) -> GrayImage {
        let (width, height) = tile.dimensions();
        let mut mask = GrayImage::new(width, height);
        for (x, y, pixel) in tile.enumerate_pixels() {
            let differs = pixel
                .0
                .iter()
                .zip(fill.0.iter())
                .any(|(&a, &b)| a.abs_diff(b) > tolerance);
            if differs {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        mask
    }

    /// `width x 1` structuring element centered horizontally
    fn horizontal_kernel(width: u32) -> Mask {
        let element = GrayImage::from_pixel(width, 1, Luma([255]));
        Mask::from_image(&element, (width / 2) as u8, 0)
    }
}

// ============================================================
// Tests
// ============================================================
