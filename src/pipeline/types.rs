//! Pipeline configuration, errors and report types

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::normalize::{NormalizeOptions, OutputResolution, ResizeMode, TileRecord};
use crate::overlay::{OverlayMode, OverlayOptions};
use crate::raster::RasterError;
use crate::tiling::{CoverageShortfall, GridSpec, TilingError, WindowCoverage};

// ============================================================
// Error
// ============================================================

/// Pipeline error
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Tiling(#[from] TilingError),

    #[error("Image not found: {0}")]
    ImageNotFound(PathBuf),

    #[error("Failed to load {path}: {message}")]
    ImageLoad { path: PathBuf, message: String },

    #[error("Failed to save {path}: {message}")]
    ImageSave { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Manifest serialization failed: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("Thread pool error: {0}")]
    ThreadPool(String),

    #[error("Processing cancelled")]
    Cancelled,
}

impl From<RasterError> for PipelineError {
    fn from(err: RasterError) -> Self {
        match err {
            RasterError::ImageNotFound(path) => PipelineError::ImageNotFound(path),
            RasterError::Load { path, message } => PipelineError::ImageLoad { path, message },
            RasterError::Save { path, message } => PipelineError::ImageSave { path, message },
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

// ============================================================
// Output format
// ============================================================

/// Encoded format of tile and overlay files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Png,
    Jpeg,
    Bmp,
    Tiff,
}

impl OutputFormat {
    /// File extension, which also selects the encoder
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Bmp => "bmp",
            OutputFormat::Tiff => "tiff",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(OutputFormat::Png),
            "jpg" | "jpeg" => Ok(OutputFormat::Jpeg),
            "bmp" => Ok(OutputFormat::Bmp),
            "tif" | "tiff" => Ok(OutputFormat::Tiff),
            other => Err(format!("unsupported output format '{}'", other)),
        }
    }
}

/// Deterministic tile file name: `{w}x{h}_{index+1}.{ext}`
pub fn tile_file_name(resolution: OutputResolution, index: usize, extension: &str) -> String {
    format!("{}_{}.{}", resolution, index + 1, extension)
}

// ============================================================
// Config
// ============================================================

/// Complete, validated pipeline configuration
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// Partition strategy
    pub grid: GridSpec,
    /// Trailing-tile policy for fixed-size grids
    pub coverage: WindowCoverage,
    /// Per-tile detection, cleanup and resize
    pub normalize: NormalizeOptions,
    /// QA overlay, if requested
    pub overlay: Option<OverlayOptions>,
    /// Worker threads (None = all cores)
    pub threads: Option<usize>,
    /// Output encoding
    pub format: OutputFormat,
}

impl PipelineConfig {
    /// Create a builder
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Effective worker count
    pub fn effective_threads(&self) -> usize {
        self.threads.filter(|&n| n > 0).unwrap_or_else(num_cpus::get)
    }

    /// JSON rendering of the configuration (dry-run plans, logs)
    pub fn to_json(&self) -> String {
        let grid = match self.grid {
            GridSpec::FixedCount { rows, cols } => serde_json::json!({
                "mode": "count",
                "rows": rows,
                "cols": cols,
            }),
            GridSpec::FixedSize {
                tile_width,
                tile_height,
                stride_x,
                stride_y,
            } => serde_json::json!({
                "mode": "size",
                "tile_width": tile_width,
                "tile_height": tile_height,
                "stride_x": stride_x,
                "stride_y": stride_y,
            }),
        };

        let normalize = &self.normalize;
        let resize = match normalize.resize_mode {
            ResizeMode::Stretch => serde_json::json!({ "mode": "stretch" }),
            ResizeMode::Letterbox { fill } => serde_json::json!({
                "mode": "letterbox",
                "fill": hex(fill.0),
            }),
        };
        let lines = normalize.line_removal.as_ref().map(|l| {
            serde_json::json!({
                "fill": hex(l.fill_color.0),
                "thickness_hint": l.thickness_hint,
                "kernel_width": l.kernel_width(),
                "color_tolerance": l.color_tolerance,
                "min_aspect_ratio": l.min_aspect_ratio,
            })
        });
        let overlay = self.overlay.as_ref().map(|o| match o.mode {
            OverlayMode::Grid { line_thickness } => serde_json::json!({
                "mode": "grid",
                "line_thickness": line_thickness,
                "palette_size": o.palette.len(),
            }),
            OverlayMode::Overlap { opacity } => serde_json::json!({
                "mode": "overlap",
                "opacity": opacity,
                "palette_size": o.palette.len(),
            }),
        });

        let value = serde_json::json!({
            "grid": grid,
            "coverage": self.coverage,
            "detect": {
                "mode": normalize.detect.mode.name(),
                "polarity": normalize.detect.polarity.name(),
                "min_region_size": normalize.detect.min_region_size,
            },
            "lines": lines,
            "output": {
                "resolution": normalize.resolution.to_string(),
                "resize": resize,
                "filter": normalize.filter.name(),
                "format": self.format.extension(),
            },
            "overlay": overlay,
            "threads": self.effective_threads(),
        });
        serde_json::to_string_pretty(&value).unwrap_or_default()
    }
}

fn hex(rgb: [u8; 3]) -> String {
    format!("#{:02X}{:02X}{:02X}", rgb[0], rgb[1], rgb[2])
}

/// Builder for PipelineConfig
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// Set partition strategy
    #[must_use]
    pub fn grid(mut self, grid: GridSpec) -> Self {
        self.config.grid = grid;
        self
    }

    /// Set coverage policy
    #[must_use]
    pub fn coverage(mut self, coverage: WindowCoverage) -> Self {
        self.config.coverage = coverage;
        self
    }

    /// Set normalization options
    #[must_use]
    pub fn normalize(mut self, normalize: NormalizeOptions) -> Self {
        self.config.normalize = normalize;
        self
    }

    /// Enable or disable the overlay
    #[must_use]
    pub fn overlay(mut self, overlay: Option<OverlayOptions>) -> Self {
        self.config.overlay = overlay;
        self
    }

    /// Set worker threads
    #[must_use]
    pub fn threads(mut self, threads: usize) -> Self {
        self.config.threads = Some(threads.max(1));
        self
    }

    /// Set output format
    #[must_use]
    pub fn format(mut self, format: OutputFormat) -> Self {
        self.config.format = format;
        self
    }

    /// Build the configuration
    #[must_use]
    pub fn build(self) -> PipelineConfig {
        self.config
    }
}

// ============================================================
// Cancellation
// ============================================================

/// Shared cancellation flag, checked between tiles
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

// ============================================================
// Report
// ============================================================

/// Outcome of a pipeline run
#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// Records in emission order
    pub records: Vec<TileRecord>,
    pub columns: u32,
    pub rows: u32,
    pub shortfall: CoverageShortfall,
    /// Tiles whose detection fell back to the full tile
    pub fallback_count: usize,
    /// Line artifacts painted over, summed across tiles
    pub lines_removed: usize,
    pub overlay_written: bool,
    pub elapsed: Duration,
}

impl PipelineReport {
    pub fn tile_count(&self) -> usize {
        self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::ResampleFilter;

    #[test]
    fn test_tile_file_name() {
        let res = OutputResolution::new(1920, 1080);
        assert_eq!(tile_file_name(res, 0, "png"), "1920x1080_1.png");
        assert_eq!(tile_file_name(res, 11, "jpg"), "1920x1080_12.jpg");
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("PNG".parse::<OutputFormat>().unwrap(), OutputFormat::Png);
        assert_eq!("jpeg".parse::<OutputFormat>().unwrap(), OutputFormat::Jpeg);
        assert_eq!("tif".parse::<OutputFormat>().unwrap().extension(), "tiff");
        assert!("gif".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_raster_error_mapping() {
        let err: PipelineError = RasterError::ImageNotFound(PathBuf::from("a.png")).into();
        assert!(matches!(err, PipelineError::ImageNotFound(_)));

        let err: PipelineError = RasterError::Save {
            path: PathBuf::from("b.png"),
            message: "disk full".into(),
        }
        .into();
        assert!(matches!(err, PipelineError::ImageSave { .. }));
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn test_cancel_token_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_effective_threads() {
        let config = PipelineConfig::builder().threads(3).build();
        assert_eq!(config.effective_threads(), 3);

        let config = PipelineConfig::default();
        assert_eq!(config.effective_threads(), num_cpus::get());
    }

    #[test]
    fn test_to_json() {
        let config = PipelineConfig::builder()
            .grid(GridSpec::FixedCount { rows: 3, cols: 4 })
            .normalize(
                NormalizeOptions::builder()
                    .resolution(640, 480)
                    .filter(ResampleFilter::Lanczos3)
                    .build(),
            )
            .overlay(Some(OverlayOptions::builder().overlap(0.5).build()))
            .threads(2)
            .build();

        let value: serde_json::Value = serde_json::from_str(&config.to_json()).unwrap();
        assert_eq!(value["grid"]["mode"], "count");
        assert_eq!(value["grid"]["cols"], 4);
        assert_eq!(value["coverage"], "full");
        assert_eq!(value["output"]["resolution"], "640x480");
        assert_eq!(value["output"]["filter"], "lanczos3");
        assert_eq!(value["overlay"]["mode"], "overlap");
        assert!(value["lines"].is_null());
        assert_eq!(value["threads"], 2);
    }
}
