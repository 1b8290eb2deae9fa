//! Error types for the bgstrip library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`BgStripError`]: **fatal**, a stage cannot run at all (source
//!   directory missing, output directory not creatable, remover not
//!   available). Returned as `Err(BgStripError)` from the stage and
//!   pipeline entry points.
//!
//! * [`FileError`]: **non-fatal**, a single file failed (not an image,
//!   model error, write error) but every other file in the batch is fine.
//!   Stored inside [`crate::output::FileOutcome`] so callers can inspect
//!   partial success instead of losing the batch to one bad file.

use std::path::PathBuf;
use thiserror::Error;

use crate::output::Stage;

/// All fatal errors returned by the bgstrip library.
///
/// File-level failures use [`FileError`] and are stored in
/// [`crate::output::FileOutcome`] rather than propagated here.
#[derive(Debug, Error)]
pub enum BgStripError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Source directory does not exist.
    #[error("Directory not found: '{path}'")]
    DirectoryNotFound { path: PathBuf },

    /// Source path exists but is a file, not a directory.
    #[error("Not a directory: '{path}'")]
    NotADirectory { path: PathBuf },

    /// Source directory exists but its entries could not be listed.
    #[error("Failed to list directory '{path}': {source}")]
    ListFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Output errors ─────────────────────────────────────────────────────
    /// The stage output directory could not be created.
    #[error("Failed to create output directory '{path}': {source}")]
    OutputDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Remover errors ────────────────────────────────────────────────────
    /// No background remover is configured or it failed to initialise.
    #[error("Background remover unavailable: {0}")]
    RemoverUnavailable(String),

    // ── Batch outcome ─────────────────────────────────────────────────────
    /// Some files succeeded but at least one failed.
    ///
    /// Returned by [`crate::output::PipelineReport::into_result`] when the
    /// caller wants to treat any file failure as an error.
    #[error("{failed}/{total} files failed during the {stage} stage")]
    PartialFailure {
        stage: Stage,
        failed: usize,
        total: usize,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single file.
///
/// Stored in [`crate::output::FileOutcome`] when a file fails. The batch
/// continues with the next file.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum FileError {
    /// The input bytes could not be read.
    #[error("read failed: {detail}")]
    Read { detail: String },

    /// The bytes are not a decodable image.
    #[error("decode failed: {detail}")]
    Decode { detail: String },

    /// Re-encoding the transformed image failed.
    #[error("encode failed: {detail}")]
    Encode { detail: String },

    /// The background remover rejected the image.
    #[error("background removal failed: {detail}")]
    Removal { detail: String },

    /// The output file could not be written.
    #[error("write to '{path}' failed: {detail}")]
    Write { path: PathBuf, detail: String },

    /// The computed output size has a zero edge.
    #[error("invalid output dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// The worker processing the file panicked.
    #[error("internal error: {detail}")]
    Internal { detail: String },
}

impl From<image::ImageError> for FileError {
    fn from(e: image::ImageError) -> Self {
        match e {
            image::ImageError::Encoding(_) | image::ImageError::Parameter(_) => {
                FileError::Encode {
                    detail: e.to_string(),
                }
            }
            _ => FileError::Decode {
                detail: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_failure_display() {
        let e = BgStripError::PartialFailure {
            stage: Stage::Strip,
            failed: 1,
            total: 10,
        };
        let msg = e.to_string();
        assert!(msg.contains("1/10"), "got: {msg}");
        assert!(msg.contains("strip"), "got: {msg}");
    }

    #[test]
    fn directory_not_found_display() {
        let e = BgStripError::DirectoryNotFound {
            path: PathBuf::from("/nope/img"),
        };
        assert!(e.to_string().contains("/nope/img"));
    }

    #[test]
    fn file_error_serialises() {
        let e = FileError::InvalidDimensions {
            width: 0,
            height: 700,
        };
        let json = serde_json::to_string(&e).unwrap();
        assert!(json.contains("InvalidDimensions"));
        assert_eq!(e.to_string(), "invalid output dimensions 0x700");
    }

    #[test]
    fn unsupported_image_maps_to_decode() {
        let err = image::load_from_memory(b"definitely not an image").unwrap_err();
        assert!(matches!(FileError::from(err), FileError::Decode { .. }));
    }
}
