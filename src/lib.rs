//! scantile - tile oversized scans into uniform assets
//!
//! Partitions a large raster image into a grid of tiles, finds the
//! meaningful content of every tile, normalizes tiles to one output
//! resolution and renders a QA overlay of the tiling.
//!
//! # Modules
//!
//! - [`tiling`] - Fixed-count and sliding-window partitioning
//! - [`content`] - Threshold + contour content box detection
//! - [`cleanup`] - Horizontal line artifact removal
//! - [`normalize`] - Crop, resize and letterbox
//! - [`overlay`] - Grid and overlap QA overlays
//! - [`pipeline`] - Parallel orchestration and output sinks
//! - [`config`] - TOML configuration and CLI overrides
//!
//! # Example
//!
//! ```rust,no_run
//! use scantile::{PipelineConfig, GridSpec, SilentProgress, TilePipeline};
//! use std::path::Path;
//!
//! let config = PipelineConfig::builder()
//!     .grid(GridSpec::sliding(256, 256, 128, 128))
//!     .build();
//! let report = TilePipeline::new(config)
//!     .process_file(Path::new("scan.png"), Path::new("tiles"), &SilentProgress)
//!     .unwrap();
//! println!("{} tiles", report.tile_count());
//! ```

pub mod cleanup;
pub mod cli;
pub mod config;
pub mod content;
pub mod normalize;
pub mod overlay;
pub mod pipeline;
pub mod progress;
pub mod raster;
pub mod tiling;

// Cleanup
pub use cleanup::{LineArtifactRemover, LineRemovalOptions, LineRemovalReport};

// CLI
pub use cli::{Cli, Commands, TileArgs};

// Config
pub use config::{CliOverrides, Config, ConfigError};

// Content detection
pub use content::{ContentDetector, DetectOptions, DetectionResult, Polarity, ThresholdMode};

// Normalization
pub use normalize::{
    NormalizeOptions, NormalizedTile, OutputResolution, ResampleFilter, ResizeMode,
    TileNormalizer, TileRecord,
};

// Overlay
pub use overlay::{OverlayMode, OverlayOptions, OverlayRenderer, Palette};

// Pipeline
pub use pipeline::{
    tile_file_name, CancelToken, FileSink, MemorySink, OutputFormat, PipelineConfig,
    PipelineError, PipelineReport, TileManifest, TilePipeline, TileSink,
};

// Progress
pub use progress::{OutputMode, ProcessingStage, ProgressCallback, SilentProgress};

// Raster
pub use raster::{load_image, load_image_with_limits, save_image, RasterBuffer, RasterError};

// Tiling
pub use tiling::{
    CoverageShortfall, GridPartitioner, GridSpec, GridTile, Partition, Rectangle, TilingError,
    WindowCoverage,
};

/// Process exit codes
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const INVALID_ARGS: i32 = 2;
    pub const INPUT_NOT_FOUND: i32 = 3;
    pub const OUTPUT_ERROR: i32 = 4;
    pub const CONFIG_ERROR: i32 = 5;
}
