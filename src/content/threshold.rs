//! Binarization
//!
//! Fixed, Otsu and adaptive local-mean thresholding. Foreground pixels are
//! written as 255, background as 0.

use image::imageops::{resize, FilterType};
use image::{GrayImage, Luma};
use imageproc::contrast::otsu_level;
use imageproc::integral_image::{integral_image, sum_image_pixels};

use super::{Polarity, ThresholdMode};

/// Foreground value in binary masks
pub(crate) const FOREGROUND: u8 = 255;

/// Smallest adaptive block size
const MIN_BLOCK_SIZE: u32 = 3;

/// Largest image whose weighted histogram sum fits in u32
const MAX_OTSU_PIXELS: u64 = u32::MAX as u64 / 255;

/// Binarize a luminance image
///
/// Returns the mask and, for global modes, the threshold that was applied.
pub fn binarize(
    gray: &GrayImage,
    mode: ThresholdMode,
    polarity: Polarity,
) -> (GrayImage, Option<u8>) {
    match mode {
        ThresholdMode::Fixed(threshold) => (apply_global(gray, threshold, polarity), Some(threshold)),
        ThresholdMode::Otsu => {
            let threshold = otsu_threshold(gray);
            (apply_global(gray, threshold, polarity), Some(threshold))
        }
        ThresholdMode::Adaptive { block_size, bias } => {
            (adaptive_mean(gray, block_size, bias, polarity), None)
        }
    }
}

/// Normalize an adaptive block size to an odd value >= 3
pub fn normalize_block_size(block_size: u32) -> u32 {
    block_size.max(MIN_BLOCK_SIZE) | 1
}

fn apply_global(gray: &GrayImage, threshold: u8, polarity: Polarity) -> GrayImage {
    let mut binary = GrayImage::new(gray.width(), gray.height());
    for (x, y, pixel) in gray.enumerate_pixels() {
        if polarity.is_foreground(pixel.0[0] as i32, threshold as i32) {
            binary.put_pixel(x, y, Luma([FOREGROUND]));
        }
    }
    binary
}

/// Otsu threshold: maximizes between-class variance over the histogram
///
/// A single-valued image has no split; its value is returned so nothing
/// lies above the threshold.
pub fn otsu_threshold(gray: &GrayImage) -> u8 {
    let mut values = gray.pixels().map(|p| p.0[0]);
    let Some(first) = values.next() else {
        return 0;
    };
    if values.all(|v| v == first) {
        return first;
    }

    let (width, height) = gray.dimensions();
    let pixels = width as u64 * height as u64;
    if pixels <= MAX_OTSU_PIXELS {
        return otsu_level(gray);
    }

    // otsu_level accumulates in u32; estimate from an evenly sampled copy
    let scale = (MAX_OTSU_PIXELS as f64 / pixels as f64).sqrt();
    let sample_width = ((width as f64 * scale) as u32).max(1);
    let sample_height = ((height as f64 * scale) as u32).max(1);
    otsu_level(&resize(gray, sample_width, sample_height, FilterType::Nearest))
}

/// Local-mean adaptive threshold
///
/// Each pixel is compared against the rounded mean of its `block_size` window
/// minus `bias`. The window is clamped at the image border.
fn adaptive_mean(gray: &GrayImage, block_size: u32, bias: i32, polarity: Polarity) -> GrayImage {
    let (width, height) = gray.dimensions();
    let radius = normalize_block_size(block_size) / 2;
    let integral = integral_image::<_, u64>(gray);

    let mut binary = GrayImage::new(width, height);
    for y in 0..height {
        let top = y.saturating_sub(radius);
        let bottom = (y + radius).min(height - 1);
        for x in 0..width {
            let left = x.saturating_sub(radius);
            let right = (x + radius).min(width - 1);

            let sum = sum_image_pixels(&integral, left, top, right, bottom)[0];
            let count = ((right - left + 1) as u64) * ((bottom - top + 1) as u64);
            let mean = ((sum + count / 2) / count) as i32;

            let value = gray.get_pixel(x, y).0[0] as i32;
            if polarity.is_foreground(value, mean - bias) {
                binary.put_pixel(x, y, Luma([FOREGROUND]));
            }
        }
    }
    binary
}
