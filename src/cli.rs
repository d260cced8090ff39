//! CLI argument definitions

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::CliOverrides;
use crate::tiling::WindowCoverage;

/// Tile oversized scans into uniform assets
#[derive(Debug, Parser)]
#[command(name = "scantile", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only print errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Split an image into normalized tiles
    Tile(TileArgs),
    /// Show build, system and config information
    Info,
}

/// Arguments for `scantile tile`
#[derive(Debug, Args)]
pub struct TileArgs {
    /// Source image
    pub input: PathBuf,

    /// Output directory
    #[arg(short, long, default_value = "./tiles")]
    pub output: PathBuf,

    /// Config file (default: ./scantile.toml, then the user config dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    // Grid
    /// Fixed grid row count
    #[arg(long, help_heading = "Grid")]
    pub rows: Option<u32>,

    /// Fixed grid column count
    #[arg(long, help_heading = "Grid")]
    pub cols: Option<u32>,

    /// Fixed tile size, `WxH` or a single edge length
    #[arg(long, value_parser = parse_pair, help_heading = "Grid")]
    pub tile: Option<(u32, u32)>,

    /// Window stride, `XxY` or a single step (default: tile size)
    #[arg(long, value_parser = parse_pair, help_heading = "Grid")]
    pub stride: Option<(u32, u32)>,

    /// Trailing tile policy: full or fit-only
    #[arg(long, value_parser = parse_coverage, help_heading = "Grid")]
    pub coverage: Option<WindowCoverage>,

    // Detection
    /// Threshold mode: fixed, otsu or adaptive
    #[arg(long = "detect", help_heading = "Detection")]
    pub detect_mode: Option<String>,

    /// Fixed threshold (0-255)
    #[arg(long, help_heading = "Detection")]
    pub threshold: Option<u8>,

    /// Adaptive window size (odd)
    #[arg(long, help_heading = "Detection")]
    pub block_size: Option<u32>,

    /// Adaptive bias subtracted from the local mean
    #[arg(long, allow_hyphen_values = true, help_heading = "Detection")]
    pub bias: Option<i32>,

    /// Foreground polarity: bright or dark
    #[arg(long, help_heading = "Detection")]
    pub polarity: Option<String>,

    /// Ignore regions smaller than this many pixels per side
    #[arg(long, help_heading = "Detection")]
    pub min_region: Option<u32>,

    // Line removal
    /// Remove horizontal line artifacts
    #[arg(long, help_heading = "Line removal")]
    pub remove_lines: bool,

    /// Fill color for removed lines (#RRGGBB)
    #[arg(long, help_heading = "Line removal")]
    pub line_fill: Option<String>,

    /// Expected line thickness in pixels
    #[arg(long, help_heading = "Line removal")]
    pub line_thickness: Option<u32>,

    // Output
    /// Output tile resolution (WxH)
    #[arg(short, long, help_heading = "Output")]
    pub resolution: Option<String>,

    /// Preserve aspect ratio and pad instead of stretching
    #[arg(long, help_heading = "Output")]
    pub letterbox: bool,

    /// Letterbox padding color (#RRGGBB)
    #[arg(long, help_heading = "Output")]
    pub letterbox_fill: Option<String>,

    /// Resampling filter: nearest, triangle, catmull-rom, gaussian, lanczos3
    #[arg(long, help_heading = "Output")]
    pub filter: Option<String>,

    /// Output format: png, jpg, bmp, tiff
    #[arg(short, long, help_heading = "Output")]
    pub format: Option<String>,

    // Overlay
    /// Render a QA overlay: grid or overlap
    #[arg(long, help_heading = "Overlay")]
    pub overlay: Option<String>,

    /// Overlap overlay opacity (0.0-1.0)
    #[arg(long, help_heading = "Overlay")]
    pub opacity: Option<f32>,

    // Execution
    /// Worker threads (default: all cores)
    #[arg(short = 'j', long, help_heading = "Execution")]
    pub threads: Option<usize>,

    /// Print the execution plan without writing files
    #[arg(long, help_heading = "Execution")]
    pub dry_run: bool,
}

impl TileArgs {
    /// Overrides for values given on the command line
    pub fn to_overrides(&self) -> CliOverrides {
        CliOverrides {
            rows: self.rows,
            cols: self.cols,
            tile_width: self.tile.map(|(w, _)| w),
            tile_height: self.tile.map(|(_, h)| h),
            stride_x: self.stride.map(|(x, _)| x),
            stride_y: self.stride.map(|(_, y)| y),
            coverage: self.coverage,
            detect_mode: self.detect_mode.clone(),
            threshold: self.threshold,
            block_size: self.block_size,
            bias: self.bias,
            polarity: self.polarity.clone(),
            min_region_size: self.min_region,
            remove_lines: self.remove_lines.then_some(true),
            line_fill: self.line_fill.clone(),
            line_thickness: self.line_thickness,
            resolution: self.resolution.clone(),
            resize: self.letterbox.then(|| "letterbox".to_string()),
            letterbox_fill: self.letterbox_fill.clone(),
            filter: self.filter.clone(),
            format: self.format.clone(),
            overlay: self.overlay.as_ref().map(|_| true),
            overlay_mode: self.overlay.clone(),
            opacity: self.opacity,
            threads: self.threads,
        }
    }
}

/// Parse `AxB` or a single number meaning `AxA`
fn parse_pair(s: &str) -> Result<(u32, u32), String> {
    let parse = |v: &str| {
        v.trim()
            .parse::<u32>()
            .map_err(|e| format!("invalid number '{}': {}", v, e))
    };
    match s.split_once(['x', 'X']) {
        Some((a, b)) => Ok((parse(a)?, parse(b)?)),
        None => {
            let v = parse(s)?;
            Ok((v, v))
        }
    }
}

fn parse_coverage(s: &str) -> Result<WindowCoverage, String> {
    match s.trim().to_ascii_lowercase().as_str() {
        "full" => Ok(WindowCoverage::Full),
        "fit-only" | "fit" => Ok(WindowCoverage::FitOnly),
        other => Err(format!("unknown coverage '{}' (expected full or fit-only)", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn tile_args(args: &[&str]) -> TileArgs {
        let mut argv = vec!["scantile", "tile"];
        argv.extend_from_slice(args);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Tile(args) => args,
            Commands::Info => panic!("expected tile command"),
        }
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_minimal_tile_args() {
        let args = tile_args(&["scan.png"]);
        assert_eq!(args.input, PathBuf::from("scan.png"));
        assert_eq!(args.output, PathBuf::from("./tiles"));
        assert!(!args.dry_run);

        let overrides = args.to_overrides();
        assert!(overrides.rows.is_none());
        assert!(overrides.remove_lines.is_none());
        assert!(overrides.overlay.is_none());
    }

    #[test]
    fn test_grid_and_overlay_args() {
        let args = tile_args(&[
            "scan.png", "-o", "out", "--tile", "256x128", "--stride", "64", "--coverage",
            "fit-only", "--overlay", "overlap", "--opacity", "0.3", "--bias", "-10", "-j", "4",
        ]);
        let overrides = args.to_overrides();
        assert_eq!(overrides.tile_width, Some(256));
        assert_eq!(overrides.tile_height, Some(128));
        assert_eq!(overrides.stride_x, Some(64));
        assert_eq!(overrides.stride_y, Some(64));
        assert_eq!(overrides.coverage, Some(WindowCoverage::FitOnly));
        assert_eq!(overrides.overlay, Some(true));
        assert_eq!(overrides.overlay_mode.as_deref(), Some("overlap"));
        assert_eq!(overrides.opacity, Some(0.3));
        assert_eq!(overrides.bias, Some(-10));
        assert_eq!(overrides.threads, Some(4));
    }

    #[test]
    fn test_letterbox_flag() {
        let overrides = tile_args(&["scan.png", "--letterbox", "--remove-lines"]).to_overrides();
        assert_eq!(overrides.resize.as_deref(), Some("letterbox"));
        assert_eq!(overrides.remove_lines, Some(true));
    }

    #[test]
    fn test_global_verbosity() {
        let cli = Cli::try_parse_from(["scantile", "-vv", "info"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(Cli::try_parse_from(["scantile", "-v", "-q", "info"]).is_err());
    }

    #[test]
    fn test_parse_pair() {
        assert_eq!(parse_pair("256x128"), Ok((256, 128)));
        assert_eq!(parse_pair("64"), Ok((64, 64)));
        assert!(parse_pair("ax1").is_err());
    }
}
