//! QA overlay rendering
//!
//! Draws the tiling of a source image onto an annotated copy for visual
//! verification. The source is never mutated.
//!
//! # Modes
//!
//! - **Grid**: outline every tile's content box (source coordinates), one
//!   palette color per tile in emission order
//! - **Overlap**: fill every raw tile rectangle with a palette color picked by
//!   `(row + col) % palette.len()`, alpha-blended over the source
//!
//! # Example
//!
//! ```rust
//! use image::{Rgb, RgbImage};
//! use scantile::{OverlayOptions, OverlayRenderer};
//!
//! let source = RgbImage::from_pixel(32, 32, Rgb([0, 0, 0]));
//! let overlay = OverlayRenderer::render(&source, &[], &OverlayOptions::default());
//! assert_eq!(overlay, source);
//! ```

use image::Rgb;
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;
use std::str::FromStr;
use tracing::debug;

use crate::normalize::TileRecord;
use crate::raster::RasterBuffer;
use crate::tiling::Rectangle;

// ============================================================
// Constants
// ============================================================

/// Default palette: normal then light variants of red, green, yellow, blue, magenta, cyan
const DEFAULT_PALETTE: [[u8; 3]; 12] = [
    [0xC5, 0x1E, 0x14],
    [0x1D, 0xC1, 0x21],
    [0xC7, 0xC3, 0x29],
    [0x0A, 0x2F, 0xC4],
    [0xC8, 0x39, 0xC5],
    [0x20, 0xC5, 0xC6],
    [0xFD, 0x6F, 0x6B],
    [0x67, 0xF8, 0x6F],
    [0xFF, 0xFA, 0x72],
    [0x6A, 0x76, 0xFB],
    [0xFD, 0x7C, 0xFC],
    [0x68, 0xFD, 0xFE],
];

/// Default grid line thickness in pixels
const DEFAULT_LINE_THICKNESS: u32 = 2;

/// Default overlap opacity
const DEFAULT_OPACITY: f32 = 0.4;

// ============================================================
// Palette
// ============================================================

/// Ordered color cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<Rgb<u8>>,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            colors: DEFAULT_PALETTE.iter().map(|c| Rgb(*c)).collect(),
        }
    }
}

impl Palette {
    /// Create a palette; an empty list falls back to the default colors
    pub fn new(colors: Vec<Rgb<u8>>) -> Self {
        if colors.is_empty() {
            return Self::default();
        }
        Self { colors }
    }

    /// Color for an index, cycling
    pub fn color(&self, index: usize) -> Rgb<u8> {
        self.colors[index % self.colors.len()]
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn colors(&self) -> &[Rgb<u8>] {
        &self.colors
    }
}

/// Parse `#RRGGBB` (leading `#` optional)
pub fn parse_hex_color(s: &str) -> Result<Rgb<u8>, String> {
    let hex = s.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("expected #RRGGBB, got '{}'", s));
    }
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&hex[range], 16).map_err(|e| format!("invalid color '{}': {}", s, e))
    };
    Ok(Rgb([channel(0..2)?, channel(2..4)?, channel(4..6)?]))
}

// ============================================================
// Options
// ============================================================

/// Overlay style
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OverlayMode {
    /// Outline content boxes
    Grid { line_thickness: u32 },
    /// Blend raw tile rectangles over the source
    Overlap { opacity: f32 },
}

impl Default for OverlayMode {
    fn default() -> Self {
        OverlayMode::Grid {
            line_thickness: DEFAULT_LINE_THICKNESS,
        }
    }
}

impl OverlayMode {
    pub fn name(&self) -> &'static str {
        match self {
            OverlayMode::Grid { .. } => "grid",
            OverlayMode::Overlap { .. } => "overlap",
        }
    }

    /// Overlap mode with the default opacity
    pub fn overlap() -> Self {
        OverlayMode::Overlap {
            opacity: DEFAULT_OPACITY,
        }
    }
}

impl FromStr for OverlayMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "grid" => Ok(OverlayMode::default()),
            "overlap" => Ok(OverlayMode::overlap()),
            other => Err(format!("unknown overlay mode '{}' (expected grid or overlap)", other)),
        }
    }
}

/// Overlay options
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverlayOptions {
    pub mode: OverlayMode,
    pub palette: Palette,
}

impl OverlayOptions {
    /// Create a builder
    pub fn builder() -> OverlayOptionsBuilder {
        OverlayOptionsBuilder::default()
    }
}

/// Builder for OverlayOptions
#[derive(Debug, Default)]
pub struct OverlayOptionsBuilder {
    options: OverlayOptions,
}

impl OverlayOptionsBuilder {
    /// Grid mode with the given line thickness
    #[must_use]
    pub fn grid(mut self, line_thickness: u32) -> Self {
        self.options.mode = OverlayMode::Grid {
            line_thickness: line_thickness.max(1),
        };
        self
    }

    /// Overlap mode with the given opacity (clamped to 0..=1)
    #[must_use]
    pub fn overlap(mut self, opacity: f32) -> Self {
        self.options.mode = OverlayMode::Overlap {
            opacity: opacity.clamp(0.0, 1.0),
        };
        self
    }

    /// Set palette
    #[must_use]
    pub fn palette(mut self, palette: Palette) -> Self {
        self.options.palette = palette;
        self
    }

    /// Build the options
    #[must_use]
    pub fn build(self) -> OverlayOptions {
        self.options
    }
}

// ============================================================
// Overlay Renderer
// ============================================================

/// Overlay renderer
pub struct OverlayRenderer;

impl OverlayRenderer {
    /// Render an annotated copy of `source`
    pub fn render(
        source: &RasterBuffer,
        records: &[TileRecord],
        options: &OverlayOptions,
    ) -> RasterBuffer {
        debug!(
            mode = options.mode.name(),
            tiles = records.len(),
            "rendering overlay"
        );
        match options.mode {
            OverlayMode::Grid { line_thickness } => {
                Self::render_grid(source, records, line_thickness, &options.palette)
            }
            OverlayMode::Overlap { opacity } => {
                Self::render_overlap(source, records, opacity, &options.palette)
            }
        }
    }

    fn render_grid(
        source: &RasterBuffer,
        records: &[TileRecord],
        line_thickness: u32,
        palette: &Palette,
    ) -> RasterBuffer {
        let mut canvas = source.clone();
        for record in records {
            let color = palette.color(record.index);
            for inset in 0..line_thickness.max(1) {
                match Self::inset(&record.global_content_box, inset) {
                    Some(rect) => draw_hollow_rect_mut(&mut canvas, rect, color),
                    None => break,
                }
            }
        }
        canvas
    }

    fn render_overlap(
        source: &RasterBuffer,
        records: &[TileRecord],
        opacity: f32,
        palette: &Palette,
    ) -> RasterBuffer {
        let opacity = opacity.clamp(0.0, 1.0);
        let mut layer = source.clone();
        for record in records {
            let color = palette.color((record.row + record.col) as usize);
            draw_filled_rect_mut(&mut layer, record.source_rect.to_rect(), color);
        }

        for (painted, original) in layer.pixels_mut().zip(source.pixels()) {
            for (p, &s) in painted.0.iter_mut().zip(original.0.iter()) {
                let blended = opacity * f32::from(*p) + (1.0 - opacity) * f32::from(s);
                *p = blended.round().clamp(0.0, 255.0) as u8;
            }
        }
        layer
    }

    /// Rectangle shrunk by `inset` on every side; None once it would vanish
    fn inset(rect: &Rectangle, inset: u32) -> Option<Rect> {
        let width = rect.width().checked_sub(2 * inset)?;
        let height = rect.height().checked_sub(2 * inset)?;
        if width == 0 || height == 0 {
            return None;
        }
        Some(Rect::at((rect.x1 + inset) as i32, (rect.y1 + inset) as i32).of_size(width, height))
    }
}
