//! Progress reporting for tiling runs.
//!
//! The pipeline reports through [`ProgressCallback`]; the CLI renders it with
//! `indicatif`, library users can plug in their own sink or use
//! [`SilentProgress`].

use std::fmt;

/// Processing stages of a tiling run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessingStage {
    /// Decoding the source image
    #[default]
    Loading,
    /// Computing tile rectangles
    Partitioning,
    /// Detecting content and normalizing tiles
    Normalizing,
    /// Drawing the QA overlay
    RenderingOverlay,
    /// Writing overlay and manifest
    Writing,
    /// Completed
    Completed,
}

impl ProcessingStage {
    /// Stage name
    pub fn name(&self) -> &'static str {
        match self {
            ProcessingStage::Loading => "Loading",
            ProcessingStage::Partitioning => "Partitioning",
            ProcessingStage::Normalizing => "Normalizing",
            ProcessingStage::RenderingOverlay => "RenderingOverlay",
            ProcessingStage::Writing => "Writing",
            ProcessingStage::Completed => "Completed",
        }
    }

    /// Human readable description
    pub fn description(&self) -> &'static str {
        match self {
            ProcessingStage::Loading => "loading source image",
            ProcessingStage::Partitioning => "computing tile grid",
            ProcessingStage::Normalizing => "normalizing tiles",
            ProcessingStage::RenderingOverlay => "rendering overlay",
            ProcessingStage::Writing => "writing outputs",
            ProcessingStage::Completed => "done",
        }
    }
}

impl fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.description())
    }
}

/// Output verbosity mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// No output
    Quiet,
    /// Normal output (stage display only)
    #[default]
    Normal,
    /// Verbose output (per-tile progress)
    Verbose,
    /// Very verbose (debug messages)
    VeryVerbose,
}

impl OutputMode {
    /// Create OutputMode from CLI flags
    pub fn from_flags(verbose: u8, quiet: bool) -> Self {
        if quiet {
            return OutputMode::Quiet;
        }
        match verbose {
            0 => OutputMode::Normal,
            1 => OutputMode::Verbose,
            _ => OutputMode::VeryVerbose,
        }
    }

    /// Check if output should be shown at this mode
    pub fn should_show(&self, required: OutputMode) -> bool {
        use OutputMode::*;
        match (self, required) {
            (Quiet, _) => false,
            (Normal, Quiet | Normal) => true,
            (Verbose, Quiet | Normal | Verbose) => true,
            (VeryVerbose, _) => true,
            _ => false,
        }
    }
}

/// Progress sink for pipeline runs
///
/// `on_step_progress` is called from worker threads, in completion order.
pub trait ProgressCallback: Send + Sync {
    /// A stage started
    fn on_step_start(&self, stage: ProcessingStage);

    /// `current` of `total` items of the running stage are done
    fn on_step_progress(&self, current: usize, total: usize);

    /// A stage finished
    fn on_step_complete(&self, stage: ProcessingStage, message: &str);

    /// Diagnostic message
    fn on_debug(&self, _message: &str) {}
}

/// Progress callback that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentProgress;

impl ProgressCallback for SilentProgress {
    fn on_step_start(&self, _stage: ProcessingStage) {}

    fn on_step_progress(&self, _current: usize, _total: usize) {}

    fn on_step_complete(&self, _stage: ProcessingStage, _message: &str) {}
}
