//! Common types for the tiling module

use imageproc::rect::Rect;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tiling error types
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TilingError {
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),
}

pub type Result<T> = std::result::Result<T, TilingError>;

/// Default edge length of fixed-size tiles
const DEFAULT_TILE_SIZE: u32 = 256;

// ============================================================
// Rectangle
// ============================================================

/// Unchecked serialized form, validated through `Rectangle::new`
#[derive(Deserialize)]
struct RawRectangle {
    x1: u32,
    y1: u32,
    x2: u32,
    y2: u32,
}

impl TryFrom<RawRectangle> for Rectangle {
    type Error = TilingError;

    fn try_from(raw: RawRectangle) -> Result<Self> {
        Rectangle::new(raw.x1, raw.y1, raw.x2, raw.y2)
    }
}

/// Axis-aligned rectangle, half-open on the high end.
///
/// Always non-empty: `x1 < x2` and `y1 < y2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawRectangle")]
pub struct Rectangle {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl Rectangle {
    /// Create a rectangle, rejecting empty extents
    pub fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> Result<Self> {
        if x1 >= x2 || y1 >= y2 {
            return Err(TilingError::InvalidGeometry(format!(
                "empty rectangle ({}, {}, {}, {})",
                x1, y1, x2, y2
            )));
        }
        Ok(Self { x1, y1, x2, y2 })
    }

    /// Create a rectangle from an origin and a size
    pub fn from_origin_size(x: u32, y: u32, width: u32, height: u32) -> Result<Self> {
        Self::new(x, y, x.saturating_add(width), y.saturating_add(height))
    }

    /// Rectangle covering a whole `width x height` image
    pub fn full(width: u32, height: u32) -> Result<Self> {
        Self::new(0, 0, width, height)
    }

    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> u32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    /// Shift by `(dx, dy)`
    pub fn translate(&self, dx: u32, dy: u32) -> Self {
        Self {
            x1: self.x1 + dx,
            y1: self.y1 + dy,
            x2: self.x2 + dx,
            y2: self.y2 + dy,
        }
    }

    /// Check the rectangle lies inside a `width x height` image
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.x2 <= width && self.y2 <= height
    }

    /// Overlap with another rectangle, if any
    pub fn intersection(&self, other: &Rectangle) -> Option<Rectangle> {
        Rectangle::new(
            self.x1.max(other.x1),
            self.y1.max(other.y1),
            self.x2.min(other.x2),
            self.y2.min(other.y2),
        )
        .ok()
    }

    /// Convert to an imageproc drawing rectangle
    pub fn to_rect(&self) -> Rect {
        Rect::at(self.x1 as i32, self.y1 as i32).of_size(self.width(), self.height())
    }
}

// ============================================================
// Grid specification
// ============================================================

/// Partition strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridSpec {
    /// Fixed tile count; tile size is the integer division of the image size
    FixedCount { rows: u32, cols: u32 },
    /// Fixed tile size stepping by a stride (stride < tile size overlaps)
    FixedSize {
        tile_width: u32,
        tile_height: u32,
        stride_x: u32,
        stride_y: u32,
    },
}

impl GridSpec {
    /// Non-overlapping fixed-size tiles
    pub fn tiles(tile_width: u32, tile_height: u32) -> Self {
        GridSpec::FixedSize {
            tile_width,
            tile_height,
            stride_x: tile_width,
            stride_y: tile_height,
        }
    }

    /// Sliding window with explicit stride
    pub fn sliding(tile_width: u32, tile_height: u32, stride_x: u32, stride_y: u32) -> Self {
        GridSpec::FixedSize {
            tile_width,
            tile_height,
            stride_x,
            stride_y,
        }
    }

    /// Check if tiles overlap along either axis
    pub fn is_overlapping(&self) -> bool {
        match *self {
            GridSpec::FixedCount { .. } => false,
            GridSpec::FixedSize {
                tile_width,
                tile_height,
                stride_x,
                stride_y,
            } => stride_x < tile_width || stride_y < tile_height,
        }
    }
}

impl Default for GridSpec {
    fn default() -> Self {
        GridSpec::tiles(DEFAULT_TILE_SIZE, DEFAULT_TILE_SIZE)
    }
}

/// Loop termination policy for fixed-size partitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WindowCoverage {
    /// Cover the whole image; the trailing tile is shifted back flush with the edge
    #[default]
    Full,
    /// Emit only tiles that fit without adjustment; trailing content may be omitted
    FitOnly,
}

impl WindowCoverage {
    pub fn name(&self) -> &'static str {
        match self {
            WindowCoverage::Full => "full",
            WindowCoverage::FitOnly => "fit-only",
        }
    }
}

/// One tile of a partition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridTile {
    /// Emission index (0-based, row-major)
    pub index: usize,
    pub row: u32,
    pub col: u32,
    pub rect: Rectangle,
}

/// Pixels of the image left uncovered by a partition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageShortfall {
    /// Width of the uncovered strip along the right edge
    pub uncovered_right: u32,
    /// Height of the uncovered strip along the bottom edge
    pub uncovered_bottom: u32,
}

impl CoverageShortfall {
    pub fn is_complete(&self) -> bool {
        self.uncovered_right == 0 && self.uncovered_bottom == 0
    }
}

/// Result of partitioning an image
#[derive(Debug, Clone)]
pub struct Partition {
    pub image_size: (u32, u32),
    pub columns: u32,
    pub rows: u32,
    pub tiles: Vec<GridTile>,
    pub shortfall: CoverageShortfall,
}

impl Partition {
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn rects(&self) -> impl Iterator<Item = Rectangle> + '_ {
        self.tiles.iter().map(|t| t.rect)
    }
}
