//! scantile - tile oversized scans into uniform assets
//!
//! CLI entry point

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use scantile::{
    exit_codes,
    // CLI
    Cli, Commands, TileArgs,
    // Config
    Config, ConfigError,
    // Pipeline
    PipelineError, PipelineReport, TilePipeline,
    // Progress
    OutputMode, ProcessingStage, ProgressCallback,
    // Types
    GridSpec, ResizeMode,
};
use tracing::{debug, warn, Level};

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);
    let mode = OutputMode::from_flags(cli.verbose, cli.quiet);

    let result = match &cli.command {
        Commands::Tile(args) => run_tile(args, mode),
        Commands::Info => run_info(),
    };

    std::process::exit(match result {
        Ok(()) => exit_codes::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            exit_code_for(&e)
        }
    });
}

/// Install the fmt subscriber; `-v` debug, `-vv` trace, `-q` errors only
fn init_tracing(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::WARN,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn exit_code_for(error: &anyhow::Error) -> i32 {
    if let Some(err) = error.downcast_ref::<PipelineError>() {
        return match err {
            PipelineError::ImageNotFound(_) => exit_codes::INPUT_NOT_FOUND,
            PipelineError::ImageSave { .. } | PipelineError::Io(_) => exit_codes::OUTPUT_ERROR,
            PipelineError::Tiling(_) => exit_codes::INVALID_ARGS,
            _ => exit_codes::GENERAL_ERROR,
        };
    }
    if error.downcast_ref::<ConfigError>().is_some() {
        return exit_codes::CONFIG_ERROR;
    }
    exit_codes::GENERAL_ERROR
}

// ============ Progress Callback Implementation ============

/// indicatif-backed progress for the CLI
struct CliProgress {
    mode: OutputMode,
    bar: ProgressBar,
}

impl CliProgress {
    fn new(mode: OutputMode) -> Self {
        let bar = if mode.should_show(OutputMode::Normal) {
            let style = ProgressStyle::with_template(
                "  {spinner} [{bar:40}] {pos}/{len} tiles ({elapsed}, eta {eta})",
            )
            .map(|s| s.progress_chars("=>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
            let bar = ProgressBar::new(0);
            bar.set_style(style);
            bar
        } else {
            ProgressBar::hidden()
        };
        Self { mode, bar }
    }
}

impl ProgressCallback for CliProgress {
    fn on_step_start(&self, stage: ProcessingStage) {
        if self.mode.should_show(OutputMode::Verbose) {
            eprintln!("  {}", stage);
        }
    }

    fn on_step_progress(&self, _current: usize, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.inc(1);
    }

    fn on_step_complete(&self, stage: ProcessingStage, message: &str) {
        if stage == ProcessingStage::Normalizing {
            self.bar.finish_and_clear();
        }
        if self.mode.should_show(OutputMode::Normal) {
            eprintln!("  {}: {}", stage.name(), message);
        }
    }

    fn on_debug(&self, message: &str) {
        if self.mode.should_show(OutputMode::VeryVerbose) {
            eprintln!("    [DEBUG] {}", message);
        }
    }
}

// ============ Tile Command ============

fn run_tile(args: &TileArgs, mode: OutputMode) -> Result<()> {
    if !args.input.exists() {
        return Err(PipelineError::ImageNotFound(args.input.clone()).into());
    }

    // An explicit config file must load; a discovered one falls back to defaults
    let file_config = match &args.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load().unwrap_or_else(|e| {
            warn!("failed to load config file: {}", e);
            Config::default()
        }),
    };

    // CLI takes precedence over the file
    let pipeline_config = file_config.merge_with_cli(&args.to_overrides())?;
    debug!(config = %pipeline_config.to_json(), "effective configuration");
    let pipeline = TilePipeline::new(pipeline_config);

    if args.dry_run {
        let size = image::image_dimensions(&args.input)
            .with_context(|| format!("failed to read {}", args.input.display()))?;
        print_execution_plan(args, &pipeline, size, mode)?;
        return Ok(());
    }

    if mode.should_show(OutputMode::Normal) {
        eprintln!("Processing: {}", args.input.display());
    }

    let progress = CliProgress::new(mode);
    let report = pipeline.process_file(&args.input, &args.output, &progress)?;

    if mode.should_show(OutputMode::Normal) {
        print_summary(args, &pipeline, &report);
    }
    Ok(())
}

// ============ Helper Functions ============

/// Print execution plan for dry-run mode
fn print_execution_plan(
    args: &TileArgs,
    pipeline: &TilePipeline,
    size: (u32, u32),
    mode: OutputMode,
) -> Result<()> {
    let config = pipeline.config();
    let partition = pipeline.plan(size)?;
    let normalize = &config.normalize;

    println!("=== Dry Run - Execution Plan ===");
    println!();
    println!("Input: {} ({}x{})", args.input.display(), size.0, size.1);
    println!("Output: {}", args.output.display());
    println!();
    println!("Pipeline Configuration:");
    match config.grid {
        GridSpec::FixedCount { rows, cols } => {
            println!("  1. Grid: {} rows x {} cols (fixed count)", rows, cols)
        }
        GridSpec::FixedSize {
            tile_width,
            tile_height,
            stride_x,
            stride_y,
        } => println!(
            "  1. Grid: {}x{} tiles, stride {}x{}, coverage {}",
            tile_width,
            tile_height,
            stride_x,
            stride_y,
            config.coverage.name()
        ),
    }
    println!(
        "  2. Content Detection: {} ({} foreground)",
        normalize.detect.mode.name(),
        normalize.detect.polarity.name()
    );
    match &normalize.line_removal {
        Some(lines) => println!(
            "  3. Line Removal: ENABLED (thickness {}, kernel {}px)",
            lines.thickness_hint,
            lines.kernel_width()
        ),
        None => println!("  3. Line Removal: DISABLED"),
    }
    let resize = match normalize.resize_mode {
        ResizeMode::Stretch => "stretch",
        ResizeMode::Letterbox { .. } => "letterbox",
    };
    println!(
        "  4. Resize: {} ({}, {})",
        normalize.resolution,
        resize,
        normalize.filter.name()
    );
    match &config.overlay {
        Some(overlay) => println!("  5. Overlay: {}", overlay.mode.name()),
        None => println!("  5. Overlay: DISABLED"),
    }
    println!();
    println!("Partition:");
    println!(
        "  Tiles: {} ({} cols x {} rows)",
        partition.len(),
        partition.columns,
        partition.rows
    );
    if partition.shortfall.is_complete() {
        println!("  Coverage: complete");
    } else {
        println!(
            "  Coverage: {}px uncovered right, {}px uncovered bottom",
            partition.shortfall.uncovered_right, partition.shortfall.uncovered_bottom
        );
    }
    println!("  Threads: {}", config.effective_threads());
    println!();
    println!("Files:");
    let names = pipeline.output_names(&partition);
    let shown = if mode.should_show(OutputMode::Verbose) {
        names.len()
    } else {
        names.len().min(5)
    };
    for name in names.iter().take(shown) {
        println!("  {}", name);
    }
    if shown < names.len() {
        println!("  ... and {} more", names.len() - shown);
    }
    if config.overlay.is_some() {
        println!("  overlay.{}", config.format.extension());
    }
    println!("  {}", scantile::pipeline::MANIFEST_FILE);

    if mode.should_show(OutputMode::VeryVerbose) {
        println!();
        println!("Effective configuration:");
        println!("{}", config.to_json());
    }
    Ok(())
}

fn print_summary(args: &TileArgs, pipeline: &TilePipeline, report: &PipelineReport) {
    println!();
    println!("{}", "=".repeat(60));
    println!("Tiling Summary");
    println!("{}", "=".repeat(60));
    println!(
        "  Tiles:          {} ({} cols x {} rows)",
        report.tile_count(),
        report.columns,
        report.rows
    );
    println!("  Resolution:     {}", pipeline.config().normalize.resolution);
    println!("  No content:     {}", report.fallback_count);
    println!("  Lines removed:  {}", report.lines_removed);
    if !report.shortfall.is_complete() {
        println!(
            "  Uncovered:      {}px right, {}px bottom",
            report.shortfall.uncovered_right, report.shortfall.uncovered_bottom
        );
    }
    println!(
        "  Overlay:        {}",
        if report.overlay_written { "YES" } else { "NO" }
    );
    println!("  Output:         {}", args.output.display());
    println!("  Time:           {:.2}s", report.elapsed.as_secs_f64());
    println!("{}", "=".repeat(60));
}

// ============ Info Command ============

fn run_info() -> Result<()> {
    println!("scantile v{}", env!("CARGO_PKG_VERSION"));
    println!();

    // System Information
    println!("System Information:");
    println!("  Platform: {}", std::env::consts::OS);
    println!("  Arch: {}", std::env::consts::ARCH);
    println!("  CPUs: {}", num_cpus::get());

    // Memory info (Linux)
    if let Ok(meminfo) = std::fs::read_to_string("/proc/meminfo") {
        if let Some(line) = meminfo.lines().find(|l| l.starts_with("MemTotal:")) {
            if let Some(kb) = line.split_whitespace().nth(1) {
                if let Ok(kb_val) = kb.parse::<u64>() {
                    println!("  Memory: {:.1} GB", kb_val as f64 / 1_048_576.0);
                }
            }
        }
    }

    println!();
    println!("Output Formats: png, jpg, bmp, tiff");
    println!("Resample Filters: nearest, triangle, catmull-rom, gaussian, lanczos3");

    // Config File Locations
    println!();
    println!("Config File Locations:");
    for path in Config::search_paths() {
        let status = if path.is_file() { "found" } else { "not found" };
        println!("  {} ({})", path.display(), status);
    }

    println!();
    println!("Default Configuration:");
    let defaults = Config::default().merge_with_cli(&Default::default())?;
    println!("{}", defaults.to_json());

    Ok(())
}
