//! Largest-region content detector

use image::imageops::replace;
use image::GrayImage;
use imageproc::contours::{find_contours, BorderType, Contour};
use tracing::trace;

use super::threshold::binarize;
use super::{DetectOptions, ThresholdMode};
use crate::raster::{to_luminance, RasterBuffer};
use crate::tiling::Rectangle;

/// Detection outcome for one tile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionResult {
    /// Content box in tile-local coordinates
    pub content_box: Rectangle,
    /// Binarization strategy that produced the box
    pub mode: ThresholdMode,
    /// Global threshold applied (None for adaptive)
    pub threshold: Option<u8>,
    /// Number of external regions that passed the size filter
    pub region_count: usize,
    /// True when no region qualified and the full tile was returned
    pub fallback: bool,
}

/// Content detector
pub struct ContentDetector;

impl ContentDetector {
    /// Detect the content box of an RGB tile
    pub fn detect(tile: &RasterBuffer, options: &DetectOptions) -> DetectionResult {
        Self::detect_from_gray(&to_luminance(tile), options)
    }

    /// Detect the content box of a luminance tile
    pub fn detect_from_gray(gray: &GrayImage, options: &DetectOptions) -> DetectionResult {
        let (width, height) = gray.dimensions();
        let (binary, threshold) = binarize(gray, options.mode, options.polarity);

        let boxes: Vec<Rectangle> = Self::external_boxes(&binary)
            .into_iter()
            .filter(|b| b.width() >= options.min_region_size && b.height() >= options.min_region_size)
            .collect();

        let best = Self::largest_box(&boxes);
        let (content_box, fallback) = match (best, Rectangle::full(width, height)) {
            (Some(found), _) => (found, false),
            (None, Ok(full)) => (full, true),
            // Zero-sized tiles cannot reach here from the pipeline; keep a 1x1 box
            (None, Err(_)) => (Rectangle { x1: 0, y1: 0, x2: 1, y2: 1 }, true),
        };

        trace!(
            regions = boxes.len(),
            fallback,
            x1 = content_box.x1,
            y1 = content_box.y1,
            x2 = content_box.x2,
            y2 = content_box.y2,
            "content detection"
        );

        DetectionResult {
            content_box,
            mode: options.mode,
            threshold,
            region_count: boxes.len(),
            fallback,
        }
    }

    /// Bounding boxes of the external contours of a binary mask, in discovery order
    ///
    /// The mask is framed with one pixel of background first so regions
    /// touching the border still trace as outer contours.
    pub fn external_boxes(binary: &GrayImage) -> Vec<Rectangle> {
        let (width, height) = binary.dimensions();
        let mut framed = GrayImage::new(width + 2, height + 2);
        replace(&mut framed, binary, 1, 1);

        find_contours::<u32>(&framed)
            .iter()
            .filter(|c| matches!(c.border_type, BorderType::Outer) && c.parent.is_none())
            .filter_map(Self::bounding_box)
            .collect()
    }

    /// Box of maximum area; the first maximum wins
    pub fn largest_box(boxes: &[Rectangle]) -> Option<Rectangle> {
        let mut best: Option<Rectangle> = None;
        for candidate in boxes {
            match best {
                Some(current) if candidate.area() <= current.area() => {}
                _ => best = Some(*candidate),
            }
        }
        best
    }

    fn bounding_box(contour: &Contour<u32>) -> Option<Rectangle> {
        let first = contour.points.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for point in &contour.points {
            min_x = min_x.min(point.x);
            min_y = min_y.min(point.y);
            max_x = max_x.max(point.x);
            max_y = max_y.max(point.y);
        }
        // Undo the one-pixel frame
        Rectangle::new(min_x.saturating_sub(1), min_y.saturating_sub(1), max_x, max_y).ok()
    }
}
