//! Cleanup module for tile post-processing
//!
//! Provides functionality for removing artifacts from scanned tiles:
//!
//! # Features
//!
//! - **Line Removal** ([`line_removal`]) - Erase thin horizontal scan-line
//!   artifacts with directional morphology

pub mod line_removal;

// Re-export public API
pub use line_removal::{
    LineArtifactRemover, LineRemovalOptions, LineRemovalOptionsBuilder, LineRemovalReport,
};
