//! CLI binary for bgstrip.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `PipelineConfig` and prints the report.

use anyhow::{Context, Result};
use bgstrip::pipeline::scan::check_source_dir;
use bgstrip::{
    run_pipeline, BackgroundRemover, OutputLayout, PipelineConfig, PipelineProgressCallback,
    ProgressCallback, ResizeFilter, Stage, StageSelection, DEFAULT_TARGET_HEIGHT,
};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar reused for every stage, plus a log
/// line per file above it.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {pos:>3}/{len} files  \
                 ⏱ {elapsed_precise}  {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS),
        );
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage, total_files: usize) {
        self.bar.reset();
        self.bar.set_length(total_files as u64);
        self.bar.set_prefix(stage.to_string());
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("{stage}: {total_files} file(s)"))
        ));
    }

    fn on_file_start(&self, _stage: Stage, file_name: &str, _index: usize, _total: usize) {
        self.bar.set_message(file_name.to_string());
    }

    fn on_file_complete(&self, _stage: Stage, file_name: &str, index: usize, total: usize) {
        self.bar.println(format!(
            "  {} {:>4}/{:<4} {}",
            green("✓"),
            index,
            total,
            dim(file_name)
        ));
        self.bar.inc(1);
    }

    fn on_file_error(&self, _stage: Stage, file_name: &str, index: usize, total: usize, error: &str) {
        // Truncate very long error messages to keep output tidy.
        let msg = match error.char_indices().nth(79) {
            Some((cut, _)) => format!("{}\u{2026}", &error[..cut]),
            None => error.to_string(),
        };

        self.bar.println(format!(
            "  {} {:>4}/{:<4} {}  {}",
            red("✗"),
            index,
            total,
            file_name,
            red(&msg)
        ));
        self.bar.inc(1);
    }

    fn on_stage_complete(&self, stage: Stage, total_files: usize, success_count: usize) {
        let failed = total_files.saturating_sub(success_count);
        let mark = if failed == 0 { green("✔") } else { cyan("⚠") };
        self.bar.println(format!(
            "{} {stage}: {}/{} written{}",
            mark,
            bold(&success_count.to_string()),
            total_files,
            if failed > 0 {
                format!("  ({} failed)", red(&failed.to_string()))
            } else {
                String::new()
            }
        ));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Full pipeline, results in ./img/converted/no_background/resized
  bgstrip ./img

  # Sibling output directories and a 512 px target height
  bgstrip --layout flat --height 512 ./img

  # Only resize PNGs that already have transparent backgrounds
  bgstrip --stages resize ./cutouts

  # Smaller, faster model; white background instead of transparency
  bgstrip --model u2netp --background ffffff ./img

  # Machine-readable report, non-zero exit if any file failed
  bgstrip --json --strict ./img > report.json

MODELS:
  Name               Size     Input   Notes
  ─────────────────  ───────  ──────  ────────────────────────────
  u2net (default)    176 MB   320 px  general purpose
  u2netp             4.7 MB   320 px  lightweight
  u2net-human-seg    176 MB   320 px  people
  silueta            43 MB    320 px  pruned u2net
  isnet-general-use  179 MB   1024 px sharper edges, slower

ENVIRONMENT VARIABLES:
  BGSTRIP_HEIGHT     Default for --height
  U2NET_HOME         Model cache directory (default ~/.u2net)
  U2NET_MODEL_PATH   Path to an existing .onnx model, skips auto-download
  RUST_LOG           Override the log filter (e.g. bgstrip=debug)

SETUP:
  The selected model is downloaded on first use of the strip stage and
  cached in ~/.u2net. No manual setup is required.
"#;

/// Normalise, background-strip and resize a directory of images.
#[derive(Parser, Debug)]
#[command(
    name = "bgstrip",
    version,
    about = "Normalise, background-strip and resize a directory of images",
    long_about = "Batch image preparation. Every image in DIR is converted to RGB PNG, its \
background is removed with a U²-Net segmentation model, and the result is resized to a fixed \
height with the aspect ratio preserved. A file that fails is reported and skipped; the rest of \
the batch carries on.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Directory holding the source images.
    dir: PathBuf,

    /// Target height in pixels for the resize stage.
    #[arg(long, env = "BGSTRIP_HEIGHT", default_value_t = DEFAULT_TARGET_HEIGHT,
          value_parser = clap::value_parser!(u32).range(1..))]
    height: u32,

    /// Stages to run (repeatable or comma-separated).
    #[arg(long, env = "BGSTRIP_STAGES", value_enum, value_delimiter = ',', default_value = "all")]
    stages: Vec<StageArg>,

    /// Where each stage writes: nested inside its input, or flat under DIR.
    #[arg(long, env = "BGSTRIP_LAYOUT", value_enum, default_value = "nested")]
    layout: LayoutArg,

    /// Segmentation model for the strip stage.
    #[arg(long, env = "BGSTRIP_MODEL", default_value = "u2net")]
    model: String,

    /// Use this .onnx file instead of the cached model.
    #[arg(long, env = "BGSTRIP_MODEL_PATH")]
    model_path: Option<PathBuf>,

    /// Resampling filter for the resize stage.
    #[arg(long, env = "BGSTRIP_FILTER", value_enum, default_value = "catmull-rom")]
    filter: FilterArg,

    /// Write the alpha mask instead of the cutout.
    #[arg(long)]
    mask_only: bool,

    /// Composite cutouts over this colour (RRGGBB or RRGGBBAA) instead of transparency.
    #[arg(long, value_parser = parse_color)]
    background: Option<[u8; 4]>,

    /// Print the pipeline report as JSON on stdout.
    #[arg(long, env = "BGSTRIP_JSON")]
    json: bool,

    /// Exit with status 1 if any file failed.
    #[arg(long, env = "BGSTRIP_STRICT")]
    strict: bool,

    /// Disable progress bar.
    #[arg(long, env = "BGSTRIP_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "BGSTRIP_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "BGSTRIP_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum StageArg {
    All,
    Normalize,
    Strip,
    Resize,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LayoutArg {
    Nested,
    Flat,
}

impl From<LayoutArg> for OutputLayout {
    fn from(v: LayoutArg) -> Self {
        match v {
            LayoutArg::Nested => OutputLayout::Nested,
            LayoutArg::Flat => OutputLayout::Flat,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FilterArg {
    Nearest,
    Triangle,
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl From<FilterArg> for ResizeFilter {
    fn from(v: FilterArg) -> Self {
        match v {
            FilterArg::Nearest => ResizeFilter::Nearest,
            FilterArg::Triangle => ResizeFilter::Triangle,
            FilterArg::CatmullRom => ResizeFilter::CatmullRom,
            FilterArg::Gaussian => ResizeFilter::Gaussian,
            FilterArg::Lanczos3 => ResizeFilter::Lanczos3,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar already shows every file.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let stages = stage_selection(&cli.stages);

    // ── Background remover ───────────────────────────────────────────────
    let remover = resolve_remover(&cli, stages).await?;

    // ── Build config ─────────────────────────────────────────────────────
    let cli_progress = show_progress.then(CliProgressCallback::new);
    let progress_cb: Option<ProgressCallback> = cli_progress
        .clone()
        .map(|cb| cb as Arc<dyn PipelineProgressCallback>);

    let mut builder = PipelineConfig::builder(&cli.dir)
        .target_height(cli.height)
        .stages(stages)
        .layout(cli.layout.into())
        .resize_filter(cli.filter.into());
    if let Some(r) = remover {
        builder = builder.remover(r);
    }
    if let Some(cb) = progress_cb {
        builder = builder.progress_callback(cb);
    }
    let config = builder.build().context("Invalid configuration")?;

    // ── Run ──────────────────────────────────────────────────────────────
    let result = run_pipeline(&config).await;
    if let Some(ref cb) = cli_progress {
        cb.bar.finish_and_clear();
    }
    let report = result.context("Pipeline failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
    } else if !cli.quiet {
        // The progress callback already listed failures as they happened.
        if !show_progress {
            for f in report.stages.iter().flat_map(|s| s.failures()) {
                if let Some(e) = f.error() {
                    eprintln!("  {} {}: {}", red("✗"), f.file_name, e);
                }
            }
        }
        let failed = report.failed();
        eprintln!(
            "{}  {} stage(s)  {} failed file(s)  {}ms  →  {}",
            if failed == 0 { green("✔") } else { cyan("⚠") },
            report.stages.len(),
            failed,
            report.total_duration_ms,
            bold(
                &report
                    .final_output_dir()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default()
            ),
        );
    }

    if cli.strict {
        report.into_result().context("Some files failed")?;
    }

    Ok(())
}

/// Collapse `--stages` values into a selection; `all` wins.
fn stage_selection(args: &[StageArg]) -> StageSelection {
    if args.is_empty() || args.contains(&StageArg::All) {
        return StageSelection::all();
    }
    args.iter()
        .filter_map(|a| match a {
            StageArg::All => None,
            StageArg::Normalize => Some(Stage::Normalize),
            StageArg::Strip => Some(Stage::Strip),
            StageArg::Resize => Some(Stage::Resize),
        })
        .collect()
}

/// Parse `RRGGBB` or `RRGGBBAA` (leading `#` optional).
fn parse_color(s: &str) -> Result<[u8; 4], String> {
    let hex = s.trim().trim_start_matches('#');
    if !(hex.len() == 6 || hex.len() == 8) || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("expected RRGGBB or RRGGBBAA, got '{s}'"));
    }
    let mut rgba = [0, 0, 0, 255];
    for (i, slot) in rgba.iter_mut().enumerate().take(hex.len() / 2) {
        *slot = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).map_err(|e| e.to_string())?;
    }
    Ok(rgba)
}

/// Build the remover when the strip stage is selected.
///
/// The source directory is checked first so a typo in DIR never triggers a
/// model download.
async fn resolve_remover(
    cli: &Cli,
    stages: StageSelection,
) -> Result<Option<Arc<dyn BackgroundRemover>>> {
    if !stages.contains(Stage::Strip) {
        return Ok(None);
    }
    check_source_dir(&cli.dir)?;
    Ok(Some(build_remover(cli).await?))
}

/// Resolve, download if needed, and load the segmentation model.
#[cfg(feature = "onnx")]
async fn build_remover(cli: &Cli) -> Result<Arc<dyn BackgroundRemover>> {
    use bgstrip::{ModelKind, RemovalOptions, U2NetRemover};

    let kind = ModelKind::from_name(&cli.model).with_context(|| {
        let names: Vec<_> = ModelKind::ALL.iter().map(|k| k.name()).collect();
        format!("Unknown model '{}'. Choose one of: {}", cli.model, names.join(", "))
    })?;
    let options = RemovalOptions {
        mask_only: cli.mask_only,
        background: cli.background,
    };

    let path = match cli.model_path {
        Some(ref p) => p.clone(),
        None => fetch_model(kind, cli.quiet)?,
    };

    let remover = U2NetRemover::from_path(kind, path, options);
    tokio::task::block_in_place(|| remover.load()).context("Failed to load segmentation model")?;
    Ok(Arc::new(remover))
}

#[cfg(not(feature = "onnx"))]
async fn build_remover(_cli: &Cli) -> Result<Arc<dyn BackgroundRemover>> {
    anyhow::bail!(
        "bgstrip was built without the `onnx` feature; run with --stages normalize,resize"
    )
}

/// Ensure the model is cached, drawing a download bar on first run.
#[cfg(feature = "onnx")]
fn fetch_model(kind: bgstrip::ModelKind, quiet: bool) -> Result<PathBuf> {
    if quiet || u2net_auto::is_model_cached(kind) {
        return tokio::task::block_in_place(|| u2net_auto::ensure_model(kind, None))
            .context("Failed to download segmentation model");
    }

    let dl_bar = ProgressBar::new(0);
    dl_bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {bytes}/{total_bytes}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS),
    );
    dl_bar.set_prefix(kind.name());
    dl_bar.set_message("Connecting…");
    dl_bar.enable_steady_tick(Duration::from_millis(80));

    let bar = dl_bar.clone();
    // block_in_place keeps the borrowed callback valid without a 'static bound.
    let path = tokio::task::block_in_place(|| {
        u2net_auto::ensure_model(
            kind,
            Some(&|downloaded, total| {
                if let Some(t) = total {
                    if bar.length().unwrap_or(0) != t {
                        bar.set_length(t);
                    }
                }
                bar.set_position(downloaded);
            }),
        )
    })
    .context("Failed to download segmentation model")?;

    dl_bar.finish_with_message("ready ✓");
    Ok(path)
}
