//! Configuration file support
//!
//! Settings come from a TOML file and are overridden by command-line flags.
//!
//! # Search order
//!
//! 1. `--config <PATH>` (explicit)
//! 2. `./scantile.toml`
//! 3. `<config dir>/scantile/config.toml` (e.g. `~/.config/scantile/config.toml`)
//!
//! # Example
//!
//! ```toml
//! threads = 8
//!
//! [grid]
//! mode = "size"
//! tile_width = 256
//! tile_height = 256
//! stride_x = 128
//! stride_y = 128
//! coverage = "full"
//!
//! [detect]
//! mode = "fixed"
//! threshold = 10
//! polarity = "bright"
//!
//! [lines]
//! enabled = true
//! fill = "#FFFFFF"
//! thickness_hint = 2
//!
//! [output]
//! resolution = "1920x1080"
//! resize = "letterbox"
//! letterbox_fill = "#000000"
//! format = "png"
//!
//! [overlay]
//! enabled = true
//! mode = "overlap"
//! opacity = 0.4
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::cleanup::LineRemovalOptions;
use crate::content::{DetectOptions, Polarity, ThresholdMode};
use crate::normalize::{NormalizeOptions, OutputResolution, ResampleFilter, ResizeMode};
use crate::overlay::{parse_hex_color, OverlayMode, OverlayOptions, Palette};
use crate::pipeline::{OutputFormat, PipelineConfig};
use crate::tiling::{GridSpec, WindowCoverage};

/// Local config file name
pub const LOCAL_CONFIG_FILE: &str = "scantile.toml";

/// Config directory name under the user config dir
pub const CONFIG_DIR_NAME: &str = "scantile";

// ============================================================
// Error
// ============================================================

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },
}

fn invalid(key: &'static str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        message: message.into(),
    }
}

// ============================================================
// File sections
// ============================================================

/// `[grid]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSection {
    /// "size" (default) or "count"
    pub mode: Option<String>,
    pub rows: Option<u32>,
    pub cols: Option<u32>,
    pub tile_width: Option<u32>,
    pub tile_height: Option<u32>,
    /// Defaults to `tile_width`
    pub stride_x: Option<u32>,
    /// Defaults to `tile_height`
    pub stride_y: Option<u32>,
    /// "full" (default) or "fit-only"
    pub coverage: Option<WindowCoverage>,
}

/// `[detect]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectSection {
    /// "fixed" (default), "otsu" or "adaptive"
    pub mode: Option<String>,
    pub threshold: Option<u8>,
    pub block_size: Option<u32>,
    pub bias: Option<i32>,
    /// "bright" (default) or "dark"
    pub polarity: Option<String>,
    pub min_region_size: Option<u32>,
}

/// `[lines]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinesSection {
    pub enabled: Option<bool>,
    /// `#RRGGBB`
    pub fill: Option<String>,
    pub thickness_hint: Option<u32>,
    pub kernel_multiplier: Option<u32>,
    pub tolerance: Option<u8>,
    pub min_aspect_ratio: Option<f32>,
}

/// `[output]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSection {
    /// `WIDTHxHEIGHT`
    pub resolution: Option<String>,
    /// "stretch" (default) or "letterbox"
    pub resize: Option<String>,
    /// `#RRGGBB`
    pub letterbox_fill: Option<String>,
    pub filter: Option<String>,
    pub format: Option<String>,
}

/// `[overlay]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlaySection {
    pub enabled: Option<bool>,
    /// "grid" (default) or "overlap"
    pub mode: Option<String>,
    pub line_thickness: Option<u32>,
    pub opacity: Option<f32>,
    /// `#RRGGBB` list replacing the default palette
    pub palette: Option<Vec<String>>,
}

/// Configuration file contents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub threads: Option<usize>,
    pub grid: GridSection,
    pub detect: DetectSection,
    pub lines: LinesSection,
    pub output: OutputSection,
    pub overlay: OverlaySection,
}

/// Command-line overrides; `Some` wins over the file
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub rows: Option<u32>,
    pub cols: Option<u32>,
    pub tile_width: Option<u32>,
    pub tile_height: Option<u32>,
    pub stride_x: Option<u32>,
    pub stride_y: Option<u32>,
    pub coverage: Option<WindowCoverage>,
    pub detect_mode: Option<String>,
    pub threshold: Option<u8>,
    pub block_size: Option<u32>,
    pub bias: Option<i32>,
    pub polarity: Option<String>,
    pub min_region_size: Option<u32>,
    pub remove_lines: Option<bool>,
    pub line_fill: Option<String>,
    pub line_thickness: Option<u32>,
    pub resolution: Option<String>,
    pub resize: Option<String>,
    pub letterbox_fill: Option<String>,
    pub filter: Option<String>,
    pub format: Option<String>,
    pub overlay: Option<bool>,
    pub overlay_mode: Option<String>,
    pub opacity: Option<f32>,
    pub threads: Option<usize>,
}

impl CliOverrides {
    pub fn new() -> Self {
        Self::default()
    }
}

// ============================================================
// Loading
// ============================================================

impl Config {
    /// Candidate config paths, in priority order
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join(CONFIG_DIR_NAME).join("config.toml"));
        }
        paths
    }

    /// Load the first config file found; defaults when none exists
    pub fn load() -> Result<Self, ConfigError> {
        match Self::search_paths().into_iter().find(|p| p.is_file()) {
            Some(path) => Self::load_from_path(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load a specific config file
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Merge with CLI overrides and validate
    pub fn merge_with_cli(&self, cli: &CliOverrides) -> Result<PipelineConfig, ConfigError> {
        let grid = self.merge_grid(cli)?;
        let coverage = cli.coverage.or(self.grid.coverage).unwrap_or_default();
        let normalize = NormalizeOptions {
            resolution: self.merge_resolution(cli)?,
            resize_mode: self.merge_resize(cli)?,
            filter: match cli.filter.as_ref().or(self.output.filter.as_ref()) {
                Some(name) => name.parse().map_err(|e| invalid("output.filter", e))?,
                None => ResampleFilter::default(),
            },
            detect: self.merge_detect(cli)?,
            line_removal: self.merge_lines(cli)?,
        };
        let format = match cli.format.as_ref().or(self.output.format.as_ref()) {
            Some(name) => name
                .parse::<OutputFormat>()
                .map_err(|e| invalid("output.format", e))?,
            None => OutputFormat::default(),
        };
        let threads = match cli.threads.or(self.threads) {
            Some(0) => return Err(invalid("threads", "must be at least 1")),
            other => other,
        };

        Ok(PipelineConfig {
            grid,
            coverage,
            normalize,
            overlay: self.merge_overlay(cli)?,
            threads,
            format,
        })
    }

    fn merge_grid(&self, cli: &CliOverrides) -> Result<GridSpec, ConfigError> {
        let file = &self.grid;
        let cli_count = cli.rows.is_some() || cli.cols.is_some();
        let cli_size = cli.tile_width.is_some() || cli.tile_height.is_some();
        if cli_count && cli_size {
            return Err(invalid(
                "grid",
                "rows/cols and tile size are mutually exclusive",
            ));
        }

        let mode = if cli_count {
            "count".to_string()
        } else if cli_size {
            "size".to_string()
        } else {
            file.mode.clone().unwrap_or_else(|| "size".to_string())
        };

        match mode.to_ascii_lowercase().as_str() {
            "count" => {
                let rows = cli.rows.or(file.rows).unwrap_or(1);
                let cols = cli.cols.or(file.cols).unwrap_or(1);
                if rows == 0 || cols == 0 {
                    return Err(invalid("grid", "rows and cols must be non-zero"));
                }
                Ok(GridSpec::FixedCount { rows, cols })
            }
            "size" => {
                let default = GridSpec::default();
                let (default_w, default_h) = match default {
                    GridSpec::FixedSize {
                        tile_width,
                        tile_height,
                        ..
                    } => (tile_width, tile_height),
                    GridSpec::FixedCount { .. } => (1, 1),
                };
                let tile_width = cli.tile_width.or(file.tile_width).unwrap_or(default_w);
                let tile_height = cli.tile_height.or(file.tile_height).unwrap_or(default_h);
                let stride_x = cli.stride_x.or(file.stride_x).unwrap_or(tile_width);
                let stride_y = cli.stride_y.or(file.stride_y).unwrap_or(tile_height);
                if tile_width == 0 || tile_height == 0 || stride_x == 0 || stride_y == 0 {
                    return Err(invalid("grid", "tile size and stride must be non-zero"));
                }
                if stride_x > tile_width || stride_y > tile_height {
                    return Err(invalid("grid", "stride must not exceed tile size"));
                }
                Ok(GridSpec::sliding(tile_width, tile_height, stride_x, stride_y))
            }
            other => Err(invalid(
                "grid.mode",
                format!("unknown mode '{}' (expected size or count)", other),
            )),
        }
    }

    fn merge_detect(&self, cli: &CliOverrides) -> Result<DetectOptions, ConfigError> {
        let file = &self.detect;
        let defaults = DetectOptions::default();
        let adaptive_defaults = DetectOptions::adaptive_dark_content();

        let mode_name = cli
            .detect_mode
            .clone()
            .or_else(|| file.mode.clone())
            .unwrap_or_else(|| defaults.mode.name().to_string());

        let (mode, default_polarity) = match mode_name.to_ascii_lowercase().as_str() {
            "fixed" => {
                let fallback = match defaults.mode {
                    ThresholdMode::Fixed(t) => t,
                    _ => 0,
                };
                let threshold = cli.threshold.or(file.threshold).unwrap_or(fallback);
                (ThresholdMode::Fixed(threshold), defaults.polarity)
            }
            "otsu" => (ThresholdMode::Otsu, defaults.polarity),
            "adaptive" => {
                let (default_block, default_bias) = match adaptive_defaults.mode {
                    ThresholdMode::Adaptive { block_size, bias } => (block_size, bias),
                    _ => (3, 0),
                };
                let block_size = cli.block_size.or(file.block_size).unwrap_or(default_block);
                if block_size < 3 || block_size % 2 == 0 {
                    return Err(invalid(
                        "detect.block_size",
                        format!("must be odd and at least 3, got {}", block_size),
                    ));
                }
                let bias = cli.bias.or(file.bias).unwrap_or(default_bias);
                (
                    ThresholdMode::Adaptive { block_size, bias },
                    adaptive_defaults.polarity,
                )
            }
            other => {
                return Err(invalid(
                    "detect.mode",
                    format!("unknown mode '{}' (expected fixed, otsu or adaptive)", other),
                ))
            }
        };

        let polarity = match cli.polarity.as_ref().or(file.polarity.as_ref()) {
            Some(name) => parse_polarity(name)?,
            None => default_polarity,
        };

        let mut builder = DetectOptions::builder().polarity(polarity);
        builder = match mode {
            ThresholdMode::Fixed(t) => builder.threshold(t),
            ThresholdMode::Otsu => builder.otsu(),
            ThresholdMode::Adaptive { block_size, bias } => builder.adaptive(block_size, bias),
        };
        if let Some(size) = cli.min_region_size.or(file.min_region_size) {
            builder = builder.min_region_size(size);
        }
        Ok(builder.build())
    }

    fn merge_lines(&self, cli: &CliOverrides) -> Result<Option<LineRemovalOptions>, ConfigError> {
        let file = &self.lines;
        if !cli.remove_lines.or(file.enabled).unwrap_or(false) {
            return Ok(None);
        }

        let mut builder = LineRemovalOptions::builder();
        if let Some(fill) = cli.line_fill.as_ref().or(file.fill.as_ref()) {
            builder = builder.fill_color(parse_hex_color(fill).map_err(|e| invalid("lines.fill", e))?);
        }
        if let Some(hint) = cli.line_thickness.or(file.thickness_hint) {
            if hint == 0 {
                return Err(invalid("lines.thickness_hint", "must be at least 1"));
            }
            builder = builder.thickness_hint(hint);
        }
        if let Some(multiplier) = file.kernel_multiplier {
            builder = builder.kernel_multiplier(multiplier);
        }
        if let Some(tolerance) = file.tolerance {
            builder = builder.color_tolerance(tolerance);
        }
        if let Some(ratio) = file.min_aspect_ratio {
            if !ratio.is_finite() || ratio < 1.0 {
                return Err(invalid("lines.min_aspect_ratio", "must be at least 1.0"));
            }
            builder = builder.min_aspect_ratio(ratio);
        }
        Ok(Some(builder.build()))
    }

    fn merge_resolution(&self, cli: &CliOverrides) -> Result<OutputResolution, ConfigError> {
        match cli.resolution.as_ref().or(self.output.resolution.as_ref()) {
            Some(text) => text.parse().map_err(|e| invalid("output.resolution", e)),
            None => Ok(OutputResolution::default()),
        }
    }

    fn merge_resize(&self, cli: &CliOverrides) -> Result<ResizeMode, ConfigError> {
        let mode = cli
            .resize
            .as_ref()
            .or(self.output.resize.as_ref())
            .map(|m| m.to_ascii_lowercase());
        match mode.as_deref() {
            None | Some("stretch") => Ok(ResizeMode::Stretch),
            Some("letterbox") => {
                let fill = match cli
                    .letterbox_fill
                    .as_ref()
                    .or(self.output.letterbox_fill.as_ref())
                {
                    Some(text) => {
                        parse_hex_color(text).map_err(|e| invalid("output.letterbox_fill", e))?
                    }
                    None => image::Rgb([0, 0, 0]),
                };
                Ok(ResizeMode::Letterbox { fill })
            }
            Some(other) => Err(invalid(
                "output.resize",
                format!("unknown mode '{}' (expected stretch or letterbox)", other),
            )),
        }
    }

    fn merge_overlay(&self, cli: &CliOverrides) -> Result<Option<OverlayOptions>, ConfigError> {
        let file = &self.overlay;
        let mode_name = cli.overlay_mode.as_ref().or(file.mode.as_ref());
        // Naming a mode on the command line implies the overlay
        let enabled = cli
            .overlay
            .or(cli.overlay_mode.as_ref().map(|_| true))
            .or(file.enabled)
            .unwrap_or(false);
        if !enabled {
            return Ok(None);
        }

        let mode = match mode_name {
            Some(name) => name
                .parse::<OverlayMode>()
                .map_err(|e| invalid("overlay.mode", e))?,
            None => OverlayMode::default(),
        };

        let mut builder = OverlayOptions::builder();
        builder = match mode {
            OverlayMode::Grid { line_thickness } => {
                builder.grid(file.line_thickness.unwrap_or(line_thickness))
            }
            OverlayMode::Overlap { opacity } => {
                let opacity = cli.opacity.or(file.opacity).unwrap_or(opacity);
                if !(0.0..=1.0).contains(&opacity) {
                    return Err(invalid(
                        "overlay.opacity",
                        format!("must be within 0.0..=1.0, got {}", opacity),
                    ));
                }
                builder.overlap(opacity)
            }
        };
        if let Some(colors) = &file.palette {
            let colors = colors
                .iter()
                .map(|c| parse_hex_color(c))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| invalid("overlay.palette", e))?;
            builder = builder.palette(Palette::new(colors));
        }
        Ok(Some(builder.build()))
    }
}

fn parse_polarity(name: &str) -> Result<Polarity, ConfigError> {
    match name.trim().to_ascii_lowercase().as_str() {
        "bright" => Ok(Polarity::BrightForeground),
        "dark" => Ok(Polarity::DarkForeground),
        other => Err(invalid(
            "detect.polarity",
            format!("unknown polarity '{}' (expected bright or dark)", other),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default().merge_with_cli(&CliOverrides::new()).unwrap();
        assert_eq!(config.grid, GridSpec::tiles(256, 256));
        assert_eq!(config.coverage, WindowCoverage::Full);
        assert_eq!(config.normalize.resolution, OutputResolution::new(1920, 1080));
        assert_eq!(config.normalize.resize_mode, ResizeMode::Stretch);
        assert_eq!(config.normalize.detect.mode, ThresholdMode::Fixed(10));
        assert!(config.normalize.line_removal.is_none());
        assert!(config.overlay.is_none());
        assert_eq!(config.threads, None);
        assert_eq!(config.format, OutputFormat::Png);
    }

    #[test]
    fn test_parse_full_file() {
        let toml = r##"
            threads = 4

            [grid]
            mode = "size"
            tile_width = 256
            tile_height = 128
            stride_x = 128
            coverage = "fit-only"

            [detect]
            mode = "adaptive"
            block_size = 31
            bias = 5

            [lines]
            enabled = true
            fill = "#000000"
            thickness_hint = 3

            [output]
            resolution = "640x480"
            resize = "letterbox"
            letterbox_fill = "#102030"
            filter = "lanczos3"
            format = "jpeg"

            [overlay]
            enabled = true
            mode = "overlap"
            opacity = 0.25
            palette = ["#FF0000", "#00FF00"]
        "##;
        let config = Config::from_toml_str(toml)
            .unwrap()
            .merge_with_cli(&CliOverrides::new())
            .unwrap();

        assert_eq!(config.grid, GridSpec::sliding(256, 128, 128, 128));
        assert_eq!(config.coverage, WindowCoverage::FitOnly);
        assert_eq!(
            config.normalize.detect.mode,
            ThresholdMode::Adaptive {
                block_size: 31,
                bias: 5
            }
        );
        assert_eq!(config.normalize.detect.polarity, Polarity::DarkForeground);
        let lines = config.normalize.line_removal.unwrap();
        assert_eq!(lines.fill_color, Rgb([0, 0, 0]));
        assert_eq!(lines.thickness_hint, 3);
        assert_eq!(config.normalize.resolution, OutputResolution::new(640, 480));
        assert_eq!(
            config.normalize.resize_mode,
            ResizeMode::Letterbox {
                fill: Rgb([0x10, 0x20, 0x30])
            }
        );
        assert_eq!(config.normalize.filter, ResampleFilter::Lanczos3);
        assert_eq!(config.format, OutputFormat::Jpeg);
        let overlay = config.overlay.unwrap();
        assert_eq!(overlay.mode, OverlayMode::Overlap { opacity: 0.25 });
        assert_eq!(overlay.palette.len(), 2);
        assert_eq!(config.threads, Some(4));
    }

    #[test]
    fn test_cli_overrides_file() {
        let file = Config::from_toml_str(
            r#"
            [grid]
            mode = "size"
            tile_width = 512
            tile_height = 512

            [output]
            resolution = "100x100"
            "#,
        )
        .unwrap();

        let cli = CliOverrides {
            rows: Some(3),
            cols: Some(4),
            resolution: Some("320x243".into()),
            threshold: Some(255),
            ..Default::default()
        };
        let config = file.merge_with_cli(&cli).unwrap();
        assert_eq!(config.grid, GridSpec::FixedCount { rows: 3, cols: 4 });
        assert_eq!(config.normalize.resolution, OutputResolution::new(320, 243));
        assert_eq!(config.normalize.detect.mode, ThresholdMode::Fixed(255));
    }

    #[test]
    fn test_overlay_mode_on_cli_enables_overlay() {
        let cli = CliOverrides {
            overlay_mode: Some("grid".into()),
            ..Default::default()
        };
        let config = Config::default().merge_with_cli(&cli).unwrap();
        assert_eq!(
            config.overlay.unwrap().mode,
            OverlayMode::Grid { line_thickness: 2 }
        );
    }

    #[test]
    fn test_invalid_values() {
        let cases = [
            CliOverrides {
                resolution: Some("1920".into()),
                ..Default::default()
            },
            CliOverrides {
                detect_mode: Some("saliency".into()),
                ..Default::default()
            },
            CliOverrides {
                polarity: Some("inverted".into()),
                ..Default::default()
            },
            CliOverrides {
                tile_width: Some(64),
                stride_x: Some(128),
                ..Default::default()
            },
            CliOverrides {
                rows: Some(2),
                tile_width: Some(64),
                ..Default::default()
            },
            CliOverrides {
                overlay: Some(true),
                overlay_mode: Some("overlap".into()),
                opacity: Some(1.5),
                ..Default::default()
            },
            CliOverrides {
                remove_lines: Some(true),
                line_fill: Some("white".into()),
                ..Default::default()
            },
            CliOverrides {
                detect_mode: Some("adaptive".into()),
                block_size: Some(10),
                ..Default::default()
            },
            CliOverrides {
                threads: Some(0),
                ..Default::default()
            },
        ];

        for cli in cases {
            let result = Config::default().merge_with_cli(&cli);
            assert!(
                matches!(result, Err(ConfigError::InvalidValue { .. })),
                "expected invalid value for {:?}",
                cli
            );
        }
    }

    #[test]
    fn test_parse_error() {
        let result = Config::from_toml_str("[grid]\ntile_width = \"wide\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_from_path() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[grid]\nmode = \"count\"\nrows = 2\ncols = 5").unwrap();

        let config = Config::load_from_path(file.path()).unwrap();
        assert_eq!(config.grid.rows, Some(2));
        assert_eq!(config.grid.cols, Some(5));
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load_from_path(Path::new("/nonexistent/scantile.toml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_search_paths() {
        let paths = Config::search_paths();
        assert_eq!(paths[0], PathBuf::from("scantile.toml"));
    }
}
