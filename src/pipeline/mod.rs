//! Tiling pipeline
//!
//! Orchestrates partitioning, per-tile normalization, overlay rendering and
//! output dispatch.
//!
//! # Flow
//!
//! 1. Partition the source with the configured [`GridSpec`](crate::GridSpec)
//! 2. Normalize every tile on a rayon pool; each finished tile goes straight
//!    to the sink, records are collected in emission order
//! 3. Render the QA overlay from the collected records (optional)
//! 4. Hand the manifest to the sink
//!
//! The first error (including a sink write failure) aborts the run; tiles not
//! yet started are skipped.
//!
//! # Example
//!
//! ```rust
//! use image::{Rgb, RgbImage};
//! use scantile::{GridSpec, MemorySink, PipelineConfig, SilentProgress, TilePipeline};
//!
//! let source = RgbImage::from_pixel(512, 256, Rgb([0, 0, 0]));
//! let config = PipelineConfig::builder()
//!     .grid(GridSpec::FixedCount { rows: 1, cols: 2 })
//!     .threads(2)
//!     .build();
//!
//! let sink = MemorySink::new();
//! let report = TilePipeline::new(config).run(&source, &sink, &SilentProgress).unwrap();
//! assert_eq!(report.tile_count(), 2);
//! assert_eq!(sink.tiles()[1].name, "1920x1080_2.png");
//! ```

mod sink;
mod types;

pub use sink::{
    FileSink, ManifestEntry, MemorySink, StoredTile, TileManifest, TileSink, MANIFEST_FILE,
    OVERLAY_STEM,
};
pub use types::{
    tile_file_name, CancelToken, OutputFormat, PipelineConfig, PipelineConfigBuilder,
    PipelineError, PipelineReport, Result,
};

use rayon::prelude::*;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::normalize::{TileNormalizer, TileRecord};
use crate::overlay::OverlayRenderer;
use crate::progress::{ProcessingStage, ProgressCallback};
use crate::raster::{load_image, RasterBuffer};
use crate::tiling::{GridPartitioner, Partition};

/// Per-tile outcome kept after the image has been handed to the sink
struct TileOutcome {
    record: TileRecord,
    fallback: bool,
    lines_removed: usize,
}

/// Tiling pipeline
pub struct TilePipeline {
    config: PipelineConfig,
}

impl TilePipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Partition an image of the given size without processing it
    pub fn plan(&self, image_size: (u32, u32)) -> Result<Partition> {
        Ok(GridPartitioner::partition(
            image_size,
            &self.config.grid,
            self.config.coverage,
        )?)
    }

    /// Output file names for a partition, in emission order
    pub fn output_names(&self, partition: &Partition) -> Vec<String> {
        let extension = self.config.format.extension();
        partition
            .tiles
            .iter()
            .map(|tile| tile_file_name(self.config.normalize.resolution, tile.index, extension))
            .collect()
    }

    /// Load `input`, run the pipeline and write everything into `output_dir`
    pub fn process_file(
        &self,
        input: &Path,
        output_dir: &Path,
        progress: &dyn ProgressCallback,
    ) -> Result<PipelineReport> {
        self.process_file_with_cancel(input, output_dir, progress, &CancelToken::new())
    }

    /// [`process_file`](Self::process_file) with cancellation
    pub fn process_file_with_cancel(
        &self,
        input: &Path,
        output_dir: &Path,
        progress: &dyn ProgressCallback,
        cancel: &CancelToken,
    ) -> Result<PipelineReport> {
        progress.on_step_start(ProcessingStage::Loading);
        let source = load_image(input)?;
        let (width, height) = source.dimensions();
        info!(input = %input.display(), width, height, "loaded source image");
        progress.on_step_complete(ProcessingStage::Loading, &format!("{}x{}", width, height));

        let sink = FileSink::create(output_dir, self.config.format)?;
        self.run_with_cancel(&source, &sink, progress, cancel)
    }

    /// Run on an in-memory source
    pub fn run(
        &self,
        source: &RasterBuffer,
        sink: &dyn TileSink,
        progress: &dyn ProgressCallback,
    ) -> Result<PipelineReport> {
        self.run_with_cancel(source, sink, progress, &CancelToken::new())
    }

    /// Run on an in-memory source, checking `cancel` between tiles
    pub fn run_with_cancel(
        &self,
        source: &RasterBuffer,
        sink: &dyn TileSink,
        progress: &dyn ProgressCallback,
        cancel: &CancelToken,
    ) -> Result<PipelineReport> {
        let start = Instant::now();
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        // Partition
        progress.on_step_start(ProcessingStage::Partitioning);
        let partition = self.plan(source.dimensions())?;
        progress.on_step_complete(
            ProcessingStage::Partitioning,
            &format!("{} x {} tiles", partition.columns, partition.rows),
        );
        info!(
            tiles = partition.len(),
            columns = partition.columns,
            rows = partition.rows,
            "partitioned source"
        );

        // Normalize
        progress.on_step_start(ProcessingStage::Normalizing);
        let outcomes = self.normalize_all(source, &partition, sink, progress, cancel)?;
        let records: Vec<TileRecord> = outcomes.iter().map(|o| o.record).collect();
        let fallback_count = outcomes.iter().filter(|o| o.fallback).count();
        let lines_removed = outcomes.iter().map(|o| o.lines_removed).sum();
        if fallback_count > 0 {
            warn!(
                fallback_count,
                total = records.len(),
                "no content found in some tiles, kept full tile"
            );
        }
        progress.on_step_complete(
            ProcessingStage::Normalizing,
            &format!("{} tiles", records.len()),
        );

        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        // Overlay
        let extension = self.config.format.extension();
        let overlay_name = match &self.config.overlay {
            Some(options) => {
                progress.on_step_start(ProcessingStage::RenderingOverlay);
                let overlay = OverlayRenderer::render(source, &records, options);
                let name = format!("{}.{}", OVERLAY_STEM, extension);
                sink.write_overlay(&name, &overlay)?;
                progress.on_step_complete(ProcessingStage::RenderingOverlay, &name);
                Some(name)
            }
            None => None,
        };

        // Manifest
        progress.on_step_start(ProcessingStage::Writing);
        let manifest = self.manifest(source, &partition, &records, overlay_name.clone());
        sink.write_manifest(&manifest)?;
        progress.on_step_complete(ProcessingStage::Writing, MANIFEST_FILE);

        let elapsed = start.elapsed();
        info!(
            tiles = records.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "pipeline complete"
        );
        progress.on_step_complete(
            ProcessingStage::Completed,
            &format!("{} tiles in {:.2}s", records.len(), elapsed.as_secs_f64()),
        );

        Ok(PipelineReport {
            records,
            columns: partition.columns,
            rows: partition.rows,
            shortfall: partition.shortfall,
            fallback_count,
            lines_removed,
            overlay_written: overlay_name.is_some(),
            elapsed,
        })
    }

    /// Normalize every tile in parallel; results come back in emission order
    fn normalize_all(
        &self,
        source: &RasterBuffer,
        partition: &Partition,
        sink: &dyn TileSink,
        progress: &dyn ProgressCallback,
        cancel: &CancelToken,
    ) -> Result<Vec<TileOutcome>> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.effective_threads())
            .build()
            .map_err(|e| PipelineError::ThreadPool(e.to_string()))?;

        let total = partition.len();
        let done = AtomicUsize::new(0);
        let options = &self.config.normalize;
        let extension = self.config.format.extension();

        pool.install(|| {
            partition
                .tiles
                .par_iter()
                .map(|tile| {
                    if cancel.is_cancelled() {
                        return Err(PipelineError::Cancelled);
                    }

                    let normalized = TileNormalizer::normalize(source, tile, options)?;
                    let name = tile_file_name(options.resolution, tile.index, extension);
                    sink.write_tile(&name, &normalized.record, &normalized.image)?;

                    let current = done.fetch_add(1, Ordering::SeqCst) + 1;
                    progress.on_step_progress(current, total);
                    progress.on_debug(&format!(
                        "{} <- {:?}, content {:?}",
                        name, tile.rect, normalized.record.global_content_box
                    ));
                    debug!(index = tile.index, name = %name, "tile done");

                    Ok(TileOutcome {
                        record: normalized.record,
                        fallback: normalized.detection.fallback,
                        lines_removed: normalized.lines.map_or(0, |r| r.lines_removed()),
                    })
                })
                .collect::<Result<Vec<_>>>()
        })
    }

    fn manifest(
        &self,
        source: &RasterBuffer,
        partition: &Partition,
        records: &[TileRecord],
        overlay: Option<String>,
    ) -> TileManifest {
        let resolution = self.config.normalize.resolution;
        let extension = self.config.format.extension();
        TileManifest {
            source_width: source.width(),
            source_height: source.height(),
            resolution: resolution.to_string(),
            coverage: self.config.coverage,
            columns: partition.columns,
            rows: partition.rows,
            shortfall: partition.shortfall,
            overlay,
            tiles: records
                .iter()
                .map(|record| ManifestEntry {
                    file: tile_file_name(resolution, record.index, extension),
                    record: *record,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::NormalizeOptions;
    use crate::overlay::OverlayOptions;
    use crate::progress::SilentProgress;
    use crate::tiling::{GridSpec, Rectangle, TilingError};
    use image::{Rgb, RgbImage};

    fn small_config(grid: GridSpec) -> PipelineConfig {
        PipelineConfig::builder()
            .grid(grid)
            .normalize(NormalizeOptions::builder().resolution(16, 16).build())
            .threads(2)
            .build()
    }

    /// Sink that fails on a given tile
    struct FailingSink {
        fail_index: usize,
    }

    impl TileSink for FailingSink {
        fn write_tile(&self, name: &str, record: &TileRecord, _image: &RasterBuffer) -> Result<()> {
            if record.index == self.fail_index {
                return Err(PipelineError::ImageSave {
                    path: name.into(),
                    message: "disk full".into(),
                });
            }
            Ok(())
        }

        fn write_overlay(&self, _name: &str, _image: &RasterBuffer) -> Result<()> {
            Ok(())
        }

        fn write_manifest(&self, _manifest: &TileManifest) -> Result<()> {
            panic!("manifest must not be written after a failure");
        }
    }

    #[test]
    fn test_records_in_emission_order() {
        let source = RgbImage::from_pixel(64, 48, Rgb([0, 0, 0]));
        let pipeline = TilePipeline::new(small_config(GridSpec::tiles(16, 16)));
        let sink = MemorySink::new();
        let report = pipeline.run(&source, &sink, &SilentProgress).unwrap();

        assert_eq!(report.tile_count(), 12);
        assert_eq!((report.columns, report.rows), (4, 3));
        for (i, record) in report.records.iter().enumerate() {
            assert_eq!(record.index, i);
        }
        assert_eq!(report.fallback_count, 12);
        assert!(!report.overlay_written);
        assert_eq!(sink.tiles().len(), 12);
    }

    #[test]
    fn test_content_box_reported_globally() {
        let mut source = RgbImage::from_pixel(64, 32, Rgb([0, 0, 0]));
        for y in 4..12 {
            for x in 40..50 {
                source.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }
        let pipeline = TilePipeline::new(small_config(GridSpec::FixedCount { rows: 1, cols: 2 }));
        let report = pipeline.run(&source, &MemorySink::new(), &SilentProgress).unwrap();

        assert_eq!(report.fallback_count, 1);
        assert_eq!(
            report.records[1].global_content_box,
            Rectangle::new(40, 4, 50, 12).unwrap()
        );
        assert_eq!(
            report.records[1].local_content_box,
            Rectangle::new(8, 4, 18, 12).unwrap()
        );
    }

    #[test]
    fn test_overlay_and_manifest_delivered() {
        let source = RgbImage::from_pixel(32, 32, Rgb([0, 0, 0]));
        let config = PipelineConfig::builder()
            .grid(GridSpec::tiles(16, 16))
            .overlay(Some(OverlayOptions::default()))
            .threads(1)
            .build();
        let sink = MemorySink::new();
        let report = TilePipeline::new(config).run(&source, &sink, &SilentProgress).unwrap();

        assert!(report.overlay_written);
        let (name, overlay) = sink.overlay().unwrap();
        assert_eq!(name, "overlay.png");
        assert_eq!(overlay.dimensions(), (32, 32));

        let manifest = sink.manifest().unwrap();
        assert_eq!(manifest.tiles.len(), 4);
        assert_eq!(manifest.tiles[3].file, "1920x1080_4.png");
        assert_eq!(manifest.overlay.as_deref(), Some("overlay.png"));
    }

    #[test]
    fn test_sink_failure_aborts() {
        let source = RgbImage::from_pixel(64, 64, Rgb([0, 0, 0]));
        let pipeline = TilePipeline::new(small_config(GridSpec::tiles(16, 16)));
        let result = pipeline.run(&source, &FailingSink { fail_index: 5 }, &SilentProgress);
        assert!(matches!(result, Err(PipelineError::ImageSave { .. })));
    }

    #[test]
    fn test_cancelled_before_start() {
        let source = RgbImage::from_pixel(32, 32, Rgb([0, 0, 0]));
        let pipeline = TilePipeline::new(small_config(GridSpec::tiles(16, 16)));
        let sink = MemorySink::new();
        let cancel = CancelToken::new();
        cancel.cancel();

        let result = pipeline.run_with_cancel(&source, &sink, &SilentProgress, &cancel);
        assert!(matches!(result, Err(PipelineError::Cancelled)));
        assert!(sink.tiles().is_empty());
    }

    #[test]
    fn test_invalid_geometry_propagates() {
        let source = RgbImage::from_pixel(32, 32, Rgb([0, 0, 0]));
        let pipeline = TilePipeline::new(small_config(GridSpec::sliding(16, 16, 32, 16)));
        let result = pipeline.run(&source, &MemorySink::new(), &SilentProgress);
        assert!(matches!(
            result,
            Err(PipelineError::Tiling(TilingError::InvalidGeometry(_)))
        ));
    }

    #[test]
    fn test_output_names() {
        let pipeline = TilePipeline::new(small_config(GridSpec::FixedCount { rows: 1, cols: 3 }));
        let partition = pipeline.plan((90, 30)).unwrap();
        assert_eq!(
            pipeline.output_names(&partition),
            vec!["16x16_1.png", "16x16_2.png", "16x16_3.png"]
        );
    }
}
