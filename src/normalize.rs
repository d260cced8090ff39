//! Tile normalization
//!
//! Crops a tile out of the source, trims it to its detected content, resizes
//! it to the canonical output resolution and optionally removes horizontal
//! line artifacts.
//!
//! # Steps
//!
//! 1. Copy the tile rectangle out of the source (owned buffer)
//! 2. Detect the content box
//! 3. Crop to the content box (an unusable box keeps the uncropped tile)
//! 4. Resize to the output resolution (stretch or letterbox)
//! 5. Remove line artifacts on the resized buffer, so the thickness hint is
//!    measured at output scale

use image::imageops::{self, FilterType};
use image::Rgb;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::cleanup::{LineArtifactRemover, LineRemovalOptions, LineRemovalReport};
use crate::content::{ContentDetector, DetectOptions, DetectionResult};
use crate::raster::{crop_owned, RasterBuffer};
use crate::tiling::{GridTile, Rectangle, TilingError};

// ============================================================
// Constants
// ============================================================

/// Default output width (1080p)
const DEFAULT_OUTPUT_WIDTH: u32 = 1920;

/// Default output height (1080p)
const DEFAULT_OUTPUT_HEIGHT: u32 = 1080;

// ============================================================
// Types
// ============================================================

/// Output tile resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutputResolution {
    pub width: u32,
    pub height: u32,
}

impl OutputResolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

impl Default for OutputResolution {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT_WIDTH, DEFAULT_OUTPUT_HEIGHT)
    }
}

impl fmt::Display for OutputResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for OutputResolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", s))?;
        let width = w
            .trim()
            .parse::<u32>()
            .map_err(|e| format!("invalid width '{}': {}", w, e))?;
        let height = h
            .trim()
            .parse::<u32>()
            .map_err(|e| format!("invalid height '{}': {}", h, e))?;
        let resolution = Self::new(width, height);
        if !resolution.is_valid() {
            return Err(format!("resolution must be non-zero, got '{}'", s));
        }
        Ok(resolution)
    }
}

/// Resize strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResizeMode {
    /// Direct stretch to the target, aspect ratio not preserved
    #[default]
    Stretch,
    /// Aspect-preserving resize centered on a padded canvas
    Letterbox { fill: Rgb<u8> },
}

/// Resampling filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResampleFilter {
    Nearest,
    /// Bilinear
    #[default]
    Triangle,
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl ResampleFilter {
    pub fn filter_type(&self) -> FilterType {
        match self {
            ResampleFilter::Nearest => FilterType::Nearest,
            ResampleFilter::Triangle => FilterType::Triangle,
            ResampleFilter::CatmullRom => FilterType::CatmullRom,
            ResampleFilter::Gaussian => FilterType::Gaussian,
            ResampleFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ResampleFilter::Nearest => "nearest",
            ResampleFilter::Triangle => "triangle",
            ResampleFilter::CatmullRom => "catmull-rom",
            ResampleFilter::Gaussian => "gaussian",
            ResampleFilter::Lanczos3 => "lanczos3",
        }
    }
}

impl FromStr for ResampleFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nearest" => Ok(ResampleFilter::Nearest),
            "triangle" | "bilinear" | "linear" => Ok(ResampleFilter::Triangle),
            "catmull-rom" | "catmullrom" | "cubic" => Ok(ResampleFilter::CatmullRom),
            "gaussian" => Ok(ResampleFilter::Gaussian),
            "lanczos3" | "lanczos" => Ok(ResampleFilter::Lanczos3),
            other => Err(format!("unknown resample filter '{}'", other)),
        }
    }
}

/// Normalization options
#[derive(Debug, Clone)]
pub struct NormalizeOptions {
    /// Output resolution
    pub resolution: OutputResolution,
    /// Stretch or letterbox
    pub resize_mode: ResizeMode,
    /// Resampling filter
    pub filter: ResampleFilter,
    /// Content detection
    pub detect: DetectOptions,
    /// Line removal, if enabled
    pub line_removal: Option<LineRemovalOptions>,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            resolution: OutputResolution::default(),
            resize_mode: ResizeMode::Stretch,
            filter: ResampleFilter::default(),
            detect: DetectOptions::default(),
            line_removal: None,
        }
    }
}

impl NormalizeOptions {
    /// Create a builder
    pub fn builder() -> NormalizeOptionsBuilder {
        NormalizeOptionsBuilder::default()
    }
}

/// Builder for NormalizeOptions
#[derive(Debug, Default)]
pub struct NormalizeOptionsBuilder {
    options: NormalizeOptions,
}

impl NormalizeOptionsBuilder {
    /// Set output resolution
    #[must_use]
    pub fn resolution(mut self, width: u32, height: u32) -> Self {
        self.options.resolution = OutputResolution::new(width, height);
        self
    }

    /// Set resize mode
    #[must_use]
    pub fn resize_mode(mut self, mode: ResizeMode) -> Self {
        self.options.resize_mode = mode;
        self
    }

    /// Set resampling filter
    #[must_use]
    pub fn filter(mut self, filter: ResampleFilter) -> Self {
        self.options.filter = filter;
        self
    }

    /// Set detection options
    #[must_use]
    pub fn detect(mut self, detect: DetectOptions) -> Self {
        self.options.detect = detect;
        self
    }

    /// Enable or disable line removal
    #[must_use]
    pub fn line_removal(mut self, options: Option<LineRemovalOptions>) -> Self {
        self.options.line_removal = options;
        self
    }

    /// Build the options
    #[must_use]
    pub fn build(self) -> NormalizeOptions {
        self.options
    }
}

/// Where a tile came from and where its content was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileRecord {
    /// Emission index (0-based)
    pub index: usize,
    pub row: u32,
    pub col: u32,
    /// Tile rectangle in source coordinates
    pub source_rect: Rectangle,
    /// Content box relative to the tile
    pub local_content_box: Rectangle,
    /// Content box in source coordinates
    pub global_content_box: Rectangle,
}

impl TileRecord {
    /// Build a record, translating the local box by the tile origin
    pub fn new(tile: &GridTile, local_content_box: Rectangle) -> Self {
        Self {
            index: tile.index,
            row: tile.row,
            col: tile.col,
            source_rect: tile.rect,
            local_content_box,
            global_content_box: local_content_box.translate(tile.rect.x1, tile.rect.y1),
        }
    }
}

/// A normalized tile
#[derive(Debug, Clone)]
pub struct NormalizedTile {
    /// Pixels at the output resolution
    pub image: RasterBuffer,
    pub record: TileRecord,
    pub detection: DetectionResult,
    /// Present when line removal ran
    pub lines: Option<LineRemovalReport>,
}

// ============================================================
// Tile Normalizer
// ============================================================

/// Tile normalizer
pub struct TileNormalizer;

impl TileNormalizer {
    /// Normalize one tile of a partition
    pub fn normalize(
        source: &RasterBuffer,
        tile: &GridTile,
        options: &NormalizeOptions,
    ) -> Result<NormalizedTile, TilingError> {
        let resolution = options.resolution;
        if !resolution.is_valid() {
            return Err(TilingError::InvalidGeometry(format!(
                "output resolution {} must be non-zero",
                resolution
            )));
        }
        let (src_w, src_h) = source.dimensions();
        if !tile.rect.fits_within(src_w, src_h) {
            return Err(TilingError::InvalidGeometry(format!(
                "tile {:?} exceeds source {}x{}",
                tile.rect, src_w, src_h
            )));
        }

        let owned = crop_owned(source, tile.rect);
        let detection = ContentDetector::detect(&owned, &options.detect);
        let cropped = Self::crop_to_content(owned, detection.content_box);

        let mut image = match options.resize_mode {
            ResizeMode::Stretch => Self::stretch(&cropped, resolution, options.filter),
            ResizeMode::Letterbox { fill } => {
                Self::letterbox(&cropped, resolution, fill, options.filter)
            }
        };

        let lines = options
            .line_removal
            .as_ref()
            .map(|line_options| LineArtifactRemover::remove_horizontal_lines(&mut image, line_options));

        let record = TileRecord::new(tile, detection.content_box);
        debug!(
            index = tile.index,
            fallback = detection.fallback,
            content = ?record.global_content_box,
            "normalized tile"
        );

        Ok(NormalizedTile {
            image,
            record,
            detection,
            lines,
        })
    }

    /// Normalize an arbitrary region of the source
    pub fn normalize_region(
        source: &RasterBuffer,
        rect: Rectangle,
        options: &NormalizeOptions,
    ) -> Result<NormalizedTile, TilingError> {
        let tile = GridTile {
            index: 0,
            row: 0,
            col: 0,
            rect,
        };
        Self::normalize(source, &tile, options)
    }

    /// Crop to the content box, keeping the tile when the box is unusable
    pub fn crop_to_content(tile: RasterBuffer, content_box: Rectangle) -> RasterBuffer {
        let (width, height) = tile.dimensions();
        if content_box.area() == 0 || !content_box.fits_within(width, height) {
            debug!(?content_box, width, height, "degenerate crop, keeping uncropped tile");
            return tile;
        }
        if content_box.width() == width && content_box.height() == height {
            return tile;
        }
        crop_owned(&tile, content_box)
    }

    /// Stretch to the exact resolution
    pub fn stretch(
        image: &RasterBuffer,
        resolution: OutputResolution,
        filter: ResampleFilter,
    ) -> RasterBuffer {
        if image.dimensions() == (resolution.width, resolution.height) {
            return image.clone();
        }
        imageops::resize(image, resolution.width, resolution.height, filter.filter_type())
    }

    /// Aspect-preserving resize, centered on a `fill` canvas of the exact resolution
    pub fn letterbox(
        image: &RasterBuffer,
        resolution: OutputResolution,
        fill: Rgb<u8>,
        filter: ResampleFilter,
    ) -> RasterBuffer {
        let (target_w, target_h) = (resolution.width, resolution.height);
        let (scaled_w, scaled_h) = Self::letterbox_size(image.dimensions(), resolution);

        let scaled = if (scaled_w, scaled_h) == image.dimensions() {
            image.clone()
        } else {
            imageops::resize(image, scaled_w, scaled_h, filter.filter_type())
        };
        if (scaled_w, scaled_h) == (target_w, target_h) {
            return scaled;
        }

        let x_offset = (target_w - scaled_w) / 2;
        let y_offset = (target_h - scaled_h) / 2;
        let mut canvas = RasterBuffer::from_pixel(target_w, target_h, fill);
        imageops::overlay(&mut canvas, &scaled, x_offset as i64, y_offset as i64);
        canvas
    }

    /// Scaled size for a letterbox resize: `min(tw/cw, th/ch)` applied to both axes
    pub fn letterbox_size(size: (u32, u32), resolution: OutputResolution) -> (u32, u32) {
        let (crop_w, crop_h) = (size.0.max(1) as f64, size.1.max(1) as f64);
        let scale = (resolution.width as f64 / crop_w).min(resolution.height as f64 / crop_h);
        let scaled_w = ((crop_w * scale).round() as u32).clamp(1, resolution.width);
        let scaled_h = ((crop_h * scale).round() as u32).clamp(1, resolution.height);
        (scaled_w, scaled_h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn paint(img: &mut RgbImage, rect: (u32, u32, u32, u32), color: Rgb<u8>) {
        for y in rect.1..rect.3 {
            for x in rect.0..rect.2 {
                img.put_pixel(x, y, color);
            }
        }
    }

    fn options(width: u32, height: u32) -> NormalizeOptions {
        NormalizeOptions::builder().resolution(width, height).build()
    }

    #[test]
    fn test_resolution_parse() {
        assert_eq!(
            "1920x1080".parse::<OutputResolution>().unwrap(),
            OutputResolution::new(1920, 1080)
        );
        assert_eq!(
            " 256X128 ".parse::<OutputResolution>().unwrap(),
            OutputResolution::new(256, 128)
        );
        assert!("1920".parse::<OutputResolution>().is_err());
        assert!("0x10".parse::<OutputResolution>().is_err());
        assert!("axb".parse::<OutputResolution>().is_err());
        assert_eq!(OutputResolution::new(640, 480).to_string(), "640x480");
    }

    #[test]
    fn test_filter_parse() {
        assert_eq!("bilinear".parse::<ResampleFilter>().unwrap(), ResampleFilter::Triangle);
        assert_eq!("Lanczos3".parse::<ResampleFilter>().unwrap(), ResampleFilter::Lanczos3);
        assert!("box".parse::<ResampleFilter>().is_err());
    }

    #[test]
    fn test_output_is_exact_resolution() {
        let mut source = RgbImage::from_pixel(500, 400, Rgb([0, 0, 0]));
        paint(&mut source, (120, 130, 170, 190), Rgb([200, 180, 160]));

        for (w, h) in [(64, 64), (1920, 1080), (7, 300)] {
            let tile = TileNormalizer::normalize_region(
                &source,
                Rectangle::new(100, 100, 300, 300).unwrap(),
                &options(w, h),
            )
            .unwrap();
            assert_eq!(tile.image.dimensions(), (w, h));
        }
    }

    #[test]
    fn test_record_translates_content_box() {
        let mut source = RgbImage::from_pixel(400, 300, Rgb([0, 0, 0]));
        paint(&mut source, (220, 130, 260, 170), Rgb([255, 255, 255]));

        let tile = GridTile {
            index: 3,
            row: 1,
            col: 1,
            rect: Rectangle::new(200, 100, 400, 300).unwrap(),
        };
        let result = TileNormalizer::normalize(&source, &tile, &options(32, 32)).unwrap();

        assert_eq!(
            result.record.local_content_box,
            Rectangle::new(20, 30, 60, 70).unwrap()
        );
        assert_eq!(
            result.record.global_content_box,
            Rectangle::new(220, 130, 260, 170).unwrap()
        );
        assert_eq!(result.record.index, 3);
        // Cropped to pure content, so the output is uniformly white
        assert!(result.image.pixels().all(|p| *p == Rgb([255, 255, 255])));
    }

    #[test]
    fn test_no_content_keeps_full_tile() {
        let source = RgbImage::from_pixel(320, 243, Rgb([0, 0, 0]));
        let result = TileNormalizer::normalize_region(
            &source,
            Rectangle::full(320, 243).unwrap(),
            &options(320, 243),
        )
        .unwrap();

        assert!(result.detection.fallback);
        assert_eq!(result.record.local_content_box, Rectangle::full(320, 243).unwrap());
        assert_eq!(result.image, source);
    }

    #[test]
    fn test_crop_to_content_degenerate_box() {
        let tile = RgbImage::from_pixel(10, 10, Rgb([1, 2, 3]));
        let outside = Rectangle::new(5, 5, 20, 20).unwrap();
        let kept = TileNormalizer::crop_to_content(tile.clone(), outside);
        assert_eq!(kept, tile);

        let inside = Rectangle::new(2, 3, 6, 9).unwrap();
        let cropped = TileNormalizer::crop_to_content(tile, inside);
        assert_eq!(cropped.dimensions(), (4, 6));
    }

    #[test]
    fn test_invalid_geometry() {
        let source = RgbImage::from_pixel(100, 100, Rgb([0, 0, 0]));
        let rect = Rectangle::new(50, 50, 150, 100).unwrap();
        assert!(matches!(
            TileNormalizer::normalize_region(&source, rect, &options(10, 10)),
            Err(TilingError::InvalidGeometry(_))
        ));

        let rect = Rectangle::full(100, 100).unwrap();
        assert!(matches!(
            TileNormalizer::normalize_region(&source, rect, &options(0, 10)),
            Err(TilingError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn test_letterbox_size() {
        let target = OutputResolution::new(1920, 1080);
        assert_eq!(TileNormalizer::letterbox_size((100, 100), target), (1080, 1080));
        assert_eq!(TileNormalizer::letterbox_size((400, 100), target), (1920, 480));
        assert_eq!(TileNormalizer::letterbox_size((1920, 1080), target), (1920, 1080));
    }

    #[test]
    fn test_letterbox_pads_with_fill() {
        let image = RgbImage::from_pixel(50, 50, Rgb([200, 0, 0]));
        let fill = Rgb([0, 0, 255]);
        let out = TileNormalizer::letterbox(
            &image,
            OutputResolution::new(200, 100),
            fill,
            ResampleFilter::Nearest,
        );

        assert_eq!(out.dimensions(), (200, 100));
        // Scaled to 100x100 at x offset 50
        assert_eq!(out.get_pixel(10, 50), &fill);
        assert_eq!(out.get_pixel(190, 50), &fill);
        assert_eq!(out.get_pixel(100, 50), &Rgb([200, 0, 0]));
        assert_eq!(out.get_pixel(50, 0), &Rgb([200, 0, 0]));
    }

    #[test]
    fn test_letterbox_odd_padding() {
        let image = RgbImage::from_pixel(10, 10, Rgb([9, 9, 9]));
        let out = TileNormalizer::letterbox(
            &image,
            OutputResolution::new(15, 10),
            Rgb([0, 0, 0]),
            ResampleFilter::Nearest,
        );
        // 5 px of padding split 2 left / 3 right
        assert_eq!(out.get_pixel(1, 5), &Rgb([0, 0, 0]));
        assert_eq!(out.get_pixel(2, 5), &Rgb([9, 9, 9]));
        assert_eq!(out.get_pixel(11, 5), &Rgb([9, 9, 9]));
        assert_eq!(out.get_pixel(12, 5), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_line_removal_runs_after_resize() {
        // 100x50 white tile with a 1px line; at 2x scale the line is 2px thick
        let mut source = RgbImage::from_pixel(100, 50, Rgb([255, 255, 255]));
        paint(&mut source, (5, 20, 95, 21), Rgb([0, 0, 0]));

        let opts = NormalizeOptions::builder()
            .resolution(200, 100)
            .filter(ResampleFilter::Nearest)
            .detect(DetectOptions::black_border(255))
            .line_removal(Some(LineRemovalOptions::default()))
            .build();
        let result =
            TileNormalizer::normalize_region(&source, Rectangle::full(100, 50).unwrap(), &opts)
                .unwrap();

        let report = result.lines.unwrap();
        assert_eq!(report.lines_removed(), 1);
        assert_eq!(report.painted[0].height(), 2);
        assert!(result.image.pixels().all(|p| *p == Rgb([255, 255, 255])));
    }
}
