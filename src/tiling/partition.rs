//! Grid partitioning
//!
//! Turns an image size and a [`GridSpec`] into an ordered list of tile
//! rectangles (row-major).

use tracing::{debug, warn};

use super::types::{
    CoverageShortfall, GridSpec, GridTile, Partition, Rectangle, Result, TilingError,
    WindowCoverage,
};

/// Grid partitioner
pub struct GridPartitioner;

impl GridPartitioner {
    /// Partition a `width x height` image
    ///
    /// `coverage` only affects [`GridSpec::FixedSize`]; fixed-count grids always
    /// use integer division and report the truncated strip as a shortfall.
    pub fn partition(
        image_size: (u32, u32),
        spec: &GridSpec,
        coverage: WindowCoverage,
    ) -> Result<Partition> {
        let (width, height) = image_size;
        if width == 0 || height == 0 {
            return Err(TilingError::InvalidGeometry(format!(
                "empty image {}x{}",
                width, height
            )));
        }

        let (xs, ys, tile_width, tile_height) = match *spec {
            GridSpec::FixedCount { rows, cols } => {
                let (xs, tw) = Self::count_origins(width, cols, "cols")?;
                let (ys, th) = Self::count_origins(height, rows, "rows")?;
                (xs, ys, tw, th)
            }
            GridSpec::FixedSize {
                tile_width,
                tile_height,
                stride_x,
                stride_y,
            } => {
                let xs = Self::window_origins(width, tile_width, stride_x, coverage, "x")?;
                let ys = Self::window_origins(height, tile_height, stride_y, coverage, "y")?;
                (xs, ys, tile_width, tile_height)
            }
        };

        let shortfall = CoverageShortfall {
            uncovered_right: xs.last().map_or(width, |x| width - (x + tile_width)),
            uncovered_bottom: ys.last().map_or(height, |y| height - (y + tile_height)),
        };

        let mut tiles = Vec::with_capacity(xs.len() * ys.len());
        for (row, &y) in ys.iter().enumerate() {
            for (col, &x) in xs.iter().enumerate() {
                tiles.push(GridTile {
                    index: tiles.len(),
                    row: row as u32,
                    col: col as u32,
                    rect: Rectangle::from_origin_size(x, y, tile_width, tile_height)?,
                });
            }
        }

        if !shortfall.is_complete() {
            warn!(
                uncovered_right = shortfall.uncovered_right,
                uncovered_bottom = shortfall.uncovered_bottom,
                "partition does not cover the full {}x{} image",
                width,
                height
            );
        }
        debug!(
            columns = xs.len(),
            rows = ys.len(),
            tile_width,
            tile_height,
            "partitioned image"
        );

        Ok(Partition {
            image_size,
            columns: xs.len() as u32,
            rows: ys.len() as u32,
            tiles,
            shortfall,
        })
    }

    /// Origins for a fixed tile count along one axis
    fn count_origins(extent: u32, count: u32, axis: &str) -> Result<(Vec<u32>, u32)> {
        if count == 0 {
            return Err(TilingError::InvalidGeometry(format!("{} must be > 0", axis)));
        }
        let tile = extent / count;
        if tile == 0 {
            return Err(TilingError::InvalidGeometry(format!(
                "{} {} exceeds image extent {}",
                axis, count, extent
            )));
        }
        Ok(((0..count).map(|i| i * tile).collect(), tile))
    }

    /// Origins for a sliding window along one axis
    fn window_origins(
        extent: u32,
        tile: u32,
        stride: u32,
        coverage: WindowCoverage,
        axis: &str,
    ) -> Result<Vec<u32>> {
        if tile == 0 || stride == 0 {
            return Err(TilingError::InvalidGeometry(format!(
                "tile size and stride along {} must be > 0",
                axis
            )));
        }
        if stride > tile {
            return Err(TilingError::InvalidGeometry(format!(
                "stride {} exceeds tile size {} along {} (tiles would leave gaps)",
                stride, tile, axis
            )));
        }
        if tile > extent {
            return Err(TilingError::InvalidGeometry(format!(
                "tile size {} exceeds image extent {} along {}",
                tile, extent, axis
            )));
        }

        let last_start = extent - tile;
        let mut origins = Vec::new();
        match coverage {
            WindowCoverage::Full => {
                let mut pos = 0u32;
                loop {
                    // Shift back so the trailing tile ends flush with the edge
                    let start = pos.min(last_start);
                    origins.push(start);
                    if start + tile >= extent {
                        break;
                    }
                    pos += stride;
                }
            }
            WindowCoverage::FitOnly => {
                let mut pos = 0u32;
                while pos < last_start + 1 {
                    origins.push(pos);
                    pos += stride;
                }
            }
        }
        Ok(origins)
    }
}
