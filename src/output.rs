//! Result types: per-file outcomes, per-stage reports, pipeline report.
//!
//! A stage never aborts on a single bad file. Instead every file gets a
//! [`FileOutcome`], and the outcomes of one directory scan are collected
//! into a [`StageReport`]. Callers decide how strict to be: ignore
//! failures, log them, or turn them into an error with
//! [`PipelineReport::into_result`].

use crate::error::{BgStripError, FileError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// One of the three processing stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Any image → RGB PNG.
    Normalize,
    /// PNG → PNG with the background removed.
    Strip,
    /// PNG → PNG at a fixed height.
    Resize,
}

impl Stage {
    /// All stages in pipeline order.
    pub const ALL: [Stage; 3] = [Stage::Normalize, Stage::Strip, Stage::Resize];

    /// Name of the subdirectory this stage writes into.
    pub fn output_dir_name(self) -> &'static str {
        match self {
            Stage::Normalize => "converted",
            Stage::Strip => "no_background",
            Stage::Resize => "resized",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Normalize => "normalize",
            Stage::Strip => "strip",
            Stage::Resize => "resize",
        })
    }
}

/// What happened to one directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum FileStatus {
    /// Output written.
    Converted,
    /// Failed; the batch continued.
    Failed { error: FileError },
}

/// Outcome of processing one input file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileOutcome {
    /// Entry name inside the input directory.
    pub file_name: String,
    /// Full input path.
    pub input: PathBuf,
    /// Output path; set even on failure so callers can see where it would have gone.
    pub output: PathBuf,
    #[serde(flatten)]
    pub status: FileStatus,
    /// Output width in pixels, when known.
    pub width: Option<u32>,
    /// Output height in pixels, when known.
    pub height: Option<u32>,
    pub duration_ms: u64,
}

impl FileOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, FileStatus::Converted)
    }

    pub fn error(&self) -> Option<&FileError> {
        match &self.status {
            FileStatus::Failed { error } => Some(error),
            FileStatus::Converted => None,
        }
    }
}

/// Summary of one stage run over one directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: Stage,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// One entry per candidate file, in processing order.
    pub files: Vec<FileOutcome>,
    /// Entries filtered out before processing (non-regular files, wrong extension).
    pub skipped: usize,
    pub duration_ms: u64,
}

impl StageReport {
    /// Number of files written successfully.
    pub fn succeeded(&self) -> usize {
        self.files.iter().filter(|f| f.is_success()).count()
    }

    /// Number of files that failed.
    pub fn failed(&self) -> usize {
        self.files.len() - self.succeeded()
    }

    /// The failed outcomes, in processing order.
    pub fn failures(&self) -> impl Iterator<Item = &FileOutcome> {
        self.files.iter().filter(|f| !f.is_success())
    }
}

/// Reports of every stage a pipeline run executed, in order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineReport {
    pub stages: Vec<StageReport>,
    pub total_duration_ms: u64,
}

impl PipelineReport {
    /// Report for a given stage, if it ran.
    pub fn stage(&self, stage: Stage) -> Option<&StageReport> {
        self.stages.iter().find(|r| r.stage == stage)
    }

    /// Total failed files across all stages.
    pub fn failed(&self) -> usize {
        self.stages.iter().map(StageReport::failed).sum()
    }

    /// Directory holding the final stage's output, if any stage ran.
    pub fn final_output_dir(&self) -> Option<&PathBuf> {
        self.stages.last().map(|r| &r.output_dir)
    }

    /// Convert to `Err(PartialFailure)` for the first stage with a failed file.
    pub fn into_result(self) -> Result<Self, BgStripError> {
        if let Some(r) = self.stages.iter().find(|r| r.failed() > 0) {
            return Err(BgStripError::PartialFailure {
                stage: r.stage,
                failed: r.failed(),
                total: r.files.len(),
            });
        }
        Ok(self)
    }
}
