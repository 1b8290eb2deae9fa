//! Stage and pipeline entry points.
//!
//! Every stage follows the same loop: check the input directory, create the
//! output directory, list candidates in name order, then for each file read,
//! transform (in `spawn_blocking`) and write. A failing file is logged and
//! recorded in the [`StageReport`]; it never stops the batch.
//!
//! The `*_dir` functions write into the stage's conventional subdirectory of
//! the input. The `*_into` variants take an explicit output directory and
//! are what [`run_pipeline`] uses to honour [`crate::OutputLayout`].

use crate::config::PipelineConfig;
use crate::error::{BgStripError, FileError};
use crate::output::{FileOutcome, FileStatus, PipelineReport, Stage, StageReport};
use crate::pipeline::scan::{self, EntryFilter};
use crate::pipeline::{normalize, resize, strip, write, Transformed};
use std::collections::HashSet;
use std::ffi::{OsStr, OsString};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

type Transform = Arc<dyn Fn(&[u8]) -> Result<Transformed, FileError> + Send + Sync>;

// ── Normalize ────────────────────────────────────────────────────────────

/// Convert every regular file in `dir` to RGB PNG under `dir/converted`.
///
/// # Errors
/// Fatal only: `dir` missing or not a directory, or the output directory
/// cannot be created. Undecodable files are recorded in the report.
pub async fn normalize_dir(
    dir: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<StageReport, BgStripError> {
    let dir = dir.as_ref();
    normalize_into(dir, &dir.join(Stage::Normalize.output_dir_name()), config).await
}

/// [`normalize_dir`] with an explicit output directory.
pub async fn normalize_into(
    input_dir: &Path,
    output_dir: &Path,
    config: &PipelineConfig,
) -> Result<StageReport, BgStripError> {
    let codec = Arc::clone(&config.codec);
    let transform: Transform =
        Arc::new(move |bytes: &[u8]| normalize::normalize_bytes(codec.as_ref(), bytes));

    run_stage(
        Stage::Normalize,
        input_dir,
        output_dir,
        EntryFilter::AnyFile,
        normalize::output_name,
        transform,
        config,
    )
    .await
}

// ── Strip ────────────────────────────────────────────────────────────────

/// Remove the background of every `.png` in `dir` into `dir/no_background`.
///
/// # Errors
/// [`BgStripError::RemoverUnavailable`] when `config.remover` is unset,
/// checked before anything touches the filesystem.
pub async fn strip_dir(
    dir: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<StageReport, BgStripError> {
    let dir = dir.as_ref();
    strip_into(dir, &dir.join(Stage::Strip.output_dir_name()), config).await
}

/// [`strip_dir`] with an explicit output directory.
pub async fn strip_into(
    input_dir: &Path,
    output_dir: &Path,
    config: &PipelineConfig,
) -> Result<StageReport, BgStripError> {
    let remover = config.remover.clone().ok_or_else(|| {
        BgStripError::RemoverUnavailable("no background remover configured".into())
    })?;
    debug!("Using background remover '{}'", remover.name());
    let transform: Transform =
        Arc::new(move |bytes: &[u8]| strip::strip_bytes(remover.as_ref(), bytes));

    run_stage(
        Stage::Strip,
        input_dir,
        output_dir,
        EntryFilter::PngOnly,
        keep_name,
        transform,
        config,
    )
    .await
}

// ── Resize ───────────────────────────────────────────────────────────────

/// Resize every `.png` in `dir` to `target_height` under `dir/resized`.
///
/// `target_height` overrides `config.target_height` so a single config can
/// drive several sizes.
pub async fn resize_dir(
    dir: impl AsRef<Path>,
    target_height: u32,
    config: &PipelineConfig,
) -> Result<StageReport, BgStripError> {
    let dir = dir.as_ref();
    resize_into(
        dir,
        &dir.join(Stage::Resize.output_dir_name()),
        target_height,
        config,
    )
    .await
}

/// [`resize_dir`] with an explicit output directory.
pub async fn resize_into(
    input_dir: &Path,
    output_dir: &Path,
    target_height: u32,
    config: &PipelineConfig,
) -> Result<StageReport, BgStripError> {
    if target_height == 0 {
        return Err(BgStripError::InvalidConfig(
            "Target height must be ≥ 1".into(),
        ));
    }
    let codec = Arc::clone(&config.codec);
    let filter = config.resize_filter;
    let transform: Transform = Arc::new(move |bytes: &[u8]| {
        resize::resize_bytes(codec.as_ref(), bytes, target_height, filter)
    });

    run_stage(
        Stage::Resize,
        input_dir,
        output_dir,
        EntryFilter::PngOnly,
        keep_name,
        transform,
        config,
    )
    .await
}

// ── Pipeline ─────────────────────────────────────────────────────────────

/// Run every selected stage in order, chaining directories per
/// `config.layout`.
///
/// Returns `Ok` even when individual files failed; use
/// [`PipelineReport::into_result`] to treat those as an error.
///
/// # Errors
/// The first fatal stage error. Stages already run keep their output.
pub async fn run_pipeline(config: &PipelineConfig) -> Result<PipelineReport, BgStripError> {
    let start = Instant::now();
    info!(
        "Starting pipeline on {} ({:?} layout)",
        config.source_dir.display(),
        config.layout
    );

    if config.stages.contains(Stage::Strip) && config.remover.is_none() {
        return Err(BgStripError::RemoverUnavailable(
            "strip stage selected but no background remover configured".into(),
        ));
    }
    scan::check_source_dir(&config.source_dir)?;

    let mut report = PipelineReport::default();
    for plan in config.layout.plan(&config.source_dir, config.stages) {
        let stage_report = match plan.stage {
            Stage::Normalize => normalize_into(&plan.input_dir, &plan.output_dir, config).await?,
            Stage::Strip => strip_into(&plan.input_dir, &plan.output_dir, config).await?,
            Stage::Resize => {
                resize_into(
                    &plan.input_dir,
                    &plan.output_dir,
                    config.target_height,
                    config,
                )
                .await?
            }
        };
        report.stages.push(stage_report);
    }

    report.total_duration_ms = start.elapsed().as_millis() as u64;
    info!(
        "Pipeline complete: {} stage(s), {} failed file(s), {}ms total",
        report.stages.len(),
        report.failed(),
        report.total_duration_ms
    );
    Ok(report)
}

/// Synchronous wrapper around [`run_pipeline`].
///
/// Creates a temporary tokio runtime internally; do not call from inside
/// an async context.
pub fn run_pipeline_sync(config: &PipelineConfig) -> Result<PipelineReport, BgStripError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| BgStripError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(run_pipeline(config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn keep_name(name: &OsStr) -> OsString {
    name.to_os_string()
}

async fn run_stage(
    stage: Stage,
    input_dir: &Path,
    output_dir: &Path,
    filter: EntryFilter,
    output_name: fn(&OsStr) -> OsString,
    transform: Transform,
    config: &PipelineConfig,
) -> Result<StageReport, BgStripError> {
    let start = Instant::now();

    scan::check_source_dir(input_dir)?;
    scan::prepare_output_dir(output_dir).await?;
    let listing = scan::list_candidates(input_dir, filter).await?;

    let total = listing.files.len();
    info!(
        "{}: {} file(s) in {} → {}",
        stage,
        total,
        input_dir.display(),
        output_dir.display()
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_start(stage, total);
    }

    let mut written: HashSet<OsString> = HashSet::with_capacity(total);
    let mut files = Vec::with_capacity(total);

    for (i, candidate) in listing.files.into_iter().enumerate() {
        let index = i + 1;
        let name = candidate.display_name;
        let out_name = output_name(&candidate.file_name);
        if !written.insert(out_name.clone()) {
            warn!(
                "{}: '{}' overwrites an earlier output named '{}'",
                stage,
                name,
                out_name.to_string_lossy()
            );
        }
        let output = output_dir.join(&out_name);

        if let Some(ref cb) = config.progress_callback {
            cb.on_file_start(stage, &name, index, total);
        }

        let file_start = Instant::now();
        let result = process_file(&candidate.path, &output, Arc::clone(&transform)).await;
        let duration_ms = file_start.elapsed().as_millis() as u64;

        let outcome = match result {
            Ok(t) => {
                debug!("{}: {} → {} ({}ms)", stage, name, output.display(), duration_ms);
                if let Some(ref cb) = config.progress_callback {
                    cb.on_file_complete(stage, &name, index, total);
                }
                FileOutcome {
                    file_name: name,
                    input: candidate.path,
                    output,
                    status: FileStatus::Converted,
                    width: t.width,
                    height: t.height,
                    duration_ms,
                }
            }
            Err(e) => {
                error!("{}: failed to process '{}': {}", stage, name, e);
                if let Some(ref cb) = config.progress_callback {
                    cb.on_file_error(stage, &name, index, total, &e.to_string());
                }
                FileOutcome {
                    file_name: name,
                    input: candidate.path,
                    output,
                    status: FileStatus::Failed { error: e },
                    width: None,
                    height: None,
                    duration_ms,
                }
            }
        };
        files.push(outcome);
    }

    let report = StageReport {
        stage,
        input_dir: input_dir.to_path_buf(),
        output_dir: output_dir.to_path_buf(),
        files,
        skipped: listing.skipped,
        duration_ms: start.elapsed().as_millis() as u64,
    };

    info!(
        "{}: {}/{} file(s) written, {} skipped, {}ms",
        stage,
        report.succeeded(),
        total,
        report.skipped,
        report.duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_complete(stage, total, report.succeeded());
    }

    Ok(report)
}

/// Read one file, transform it off the async executor and write the result.
async fn process_file(
    input: &Path,
    output: &Path,
    transform: Transform,
) -> Result<Transformed, FileError> {
    let bytes = tokio::fs::read(input)
        .await
        .map_err(|e| FileError::Read {
            detail: e.to_string(),
        })?;

    let transformed = tokio::task::spawn_blocking(move || transform(&bytes))
        .await
        .map_err(|e| FileError::Internal {
            detail: format!("worker task failed: {e}"),
        })??;

    write::write_atomic(output, &transformed.bytes).await?;
    Ok(transformed)
}
