//! Output sinks
//!
//! A sink receives normalized tiles as workers finish them, then the overlay,
//! then the manifest describing the whole run.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

use super::types::{OutputFormat, Result};
use crate::normalize::{OutputResolution, TileRecord};
use crate::raster::{save_image, RasterBuffer};
use crate::tiling::{CoverageShortfall, WindowCoverage};

/// Manifest file name
pub const MANIFEST_FILE: &str = "manifest.json";

/// Overlay file stem
pub const OVERLAY_STEM: &str = "overlay";

/// One tile entry of a manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Output file name
    pub file: String,
    #[serde(flatten)]
    pub record: TileRecord,
}

/// Description of a completed run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileManifest {
    pub source_width: u32,
    pub source_height: u32,
    /// `WxH` of every tile
    pub resolution: String,
    pub coverage: WindowCoverage,
    pub columns: u32,
    pub rows: u32,
    pub shortfall: CoverageShortfall,
    /// Overlay file name, when one was written
    pub overlay: Option<String>,
    pub tiles: Vec<ManifestEntry>,
}

impl TileManifest {
    pub fn resolution(&self) -> Option<OutputResolution> {
        self.resolution.parse().ok()
    }
}

/// Destination for pipeline outputs
///
/// `write_tile` is called concurrently from worker threads.
pub trait TileSink: Send + Sync {
    /// Accept one normalized tile
    fn write_tile(&self, name: &str, record: &TileRecord, image: &RasterBuffer) -> Result<()>;

    /// Accept the QA overlay
    fn write_overlay(&self, name: &str, image: &RasterBuffer) -> Result<()>;

    /// Accept the run manifest (always last)
    fn write_manifest(&self, manifest: &TileManifest) -> Result<()>;
}

// ============================================================
// File Sink
// ============================================================

/// Writes tiles, overlay and manifest into a directory
#[derive(Debug, Clone)]
pub struct FileSink {
    output_dir: PathBuf,
    format: OutputFormat,
}

impl FileSink {
    /// Create the sink, creating `output_dir` if needed
    pub fn create(output_dir: &Path, format: OutputFormat) -> Result<Self> {
        fs::create_dir_all(output_dir)?;
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            format,
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Path a file with this name lands at
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.output_dir.join(name)
    }
}

impl TileSink for FileSink {
    fn write_tile(&self, name: &str, _record: &TileRecord, image: &RasterBuffer) -> Result<()> {
        let path = self.path_for(name);
        save_image(&path, image)?;
        debug!(path = %path.display(), "wrote tile");
        Ok(())
    }

    fn write_overlay(&self, name: &str, image: &RasterBuffer) -> Result<()> {
        let path = self.path_for(name);
        save_image(&path, image)?;
        debug!(path = %path.display(), "wrote overlay");
        Ok(())
    }

    fn write_manifest(&self, manifest: &TileManifest) -> Result<()> {
        let path = self.path_for(MANIFEST_FILE);
        let json = serde_json::to_string_pretty(manifest)?;
        fs::write(&path, json)?;
        debug!(path = %path.display(), "wrote manifest");
        Ok(())
    }
}

// ============================================================
// Memory Sink
// ============================================================

/// A tile kept in memory
#[derive(Debug, Clone)]
pub struct StoredTile {
    pub name: String,
    pub record: TileRecord,
    pub image: RasterBuffer,
}

/// Keeps every output in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    tiles: Mutex<Vec<StoredTile>>,
    overlay: Mutex<Option<(String, RasterBuffer)>>,
    manifest: Mutex<Option<TileManifest>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Received tiles, sorted by emission index
    pub fn tiles(&self) -> Vec<StoredTile> {
        let mut tiles = self
            .tiles
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        tiles.sort_by_key(|t| t.record.index);
        tiles
    }

    pub fn overlay(&self) -> Option<(String, RasterBuffer)> {
        self.overlay
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn manifest(&self) -> Option<TileManifest> {
        self.manifest
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl TileSink for MemorySink {
    fn write_tile(&self, name: &str, record: &TileRecord, image: &RasterBuffer) -> Result<()> {
        self.tiles
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(StoredTile {
                name: name.to_string(),
                record: *record,
                image: image.clone(),
            });
        Ok(())
    }

    fn write_overlay(&self, name: &str, image: &RasterBuffer) -> Result<()> {
        *self
            .overlay
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some((name.to_string(), image.clone()));
        Ok(())
    }

    fn write_manifest(&self, manifest: &TileManifest) -> Result<()> {
        *self
            .manifest
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(manifest.clone());
        Ok(())
    }
}
