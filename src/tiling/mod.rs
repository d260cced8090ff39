//! Tiling module
//!
//! Partitions a source image into an ordered grid of tile rectangles.
//!
//! # Features
//!
//! - Fixed-count grids (`rows x cols`, tile size by integer division)
//! - Fixed-size tiles with optional overlap (sliding window)
//! - Explicit coverage policy for the trailing row/column
//! - Coverage shortfall reporting instead of silent truncation
//!
//! # Example
//!
//! ```rust
//! use scantile::{GridPartitioner, GridSpec, WindowCoverage};
//!
//! let partition = GridPartitioner::partition(
//!     (3120, 1440),
//!     &GridSpec::sliding(256, 256, 128, 128),
//!     WindowCoverage::Full,
//! ).unwrap();
//!
//! assert_eq!(partition.columns, 24);
//! assert_eq!(partition.rows, 11);
//! ```

mod partition;
mod types;

pub use partition::GridPartitioner;
pub use types::{
    CoverageShortfall, GridSpec, GridTile, Partition, Rectangle, Result, TilingError,
    WindowCoverage,
};
