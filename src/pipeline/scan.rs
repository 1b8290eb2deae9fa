//! Directory scanning: validate a stage's input directory and list the
//! entries the stage should attempt.
//!
//! Symlinks are followed, so a link to a regular file counts as a regular
//! file. Entries are returned sorted by file name so logs and reports come
//! out in the same order on every filesystem.

use crate::error::BgStripError;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Which directory entries a stage considers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryFilter {
    /// Every regular file, whatever its name.
    AnyFile,
    /// Regular files whose name ends in `.png`, case-insensitively.
    PngOnly,
}

impl EntryFilter {
    fn accepts(self, name: &str) -> bool {
        match self {
            EntryFilter::AnyFile => true,
            EntryFilter::PngOnly => has_png_extension(name),
        }
    }
}

/// A file a stage will attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Raw entry name, used to derive the output name.
    pub file_name: OsString,
    /// Lossy UTF-8 rendering for logs and reports.
    pub display_name: String,
    pub path: PathBuf,
}

/// Result of scanning one directory.
#[derive(Debug, Default)]
pub struct Listing {
    pub files: Vec<Candidate>,
    /// Entries rejected by the filter or not regular files.
    pub skipped: usize,
}

/// `true` if `name` ends in `.png`, ignoring case.
pub fn has_png_extension(name: &str) -> bool {
    name.to_lowercase().ends_with(".png")
}

/// Check that `dir` exists and is a directory.
pub fn check_source_dir(dir: &Path) -> Result<(), BgStripError> {
    match std::fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => {
            warn!("Not a directory: '{}'", dir.display());
            Err(BgStripError::NotADirectory {
                path: dir.to_path_buf(),
            })
        }
        Err(_) => {
            warn!("Directory '{}' does not exist", dir.display());
            Err(BgStripError::DirectoryNotFound {
                path: dir.to_path_buf(),
            })
        }
    }
}

/// Create `dir` and any missing parents. Succeeds if it already exists.
pub async fn prepare_output_dir(dir: &Path) -> Result<(), BgStripError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| BgStripError::OutputDirFailed {
            path: dir.to_path_buf(),
            source: e,
        })?;
    debug!("Output directory ready: {}", dir.display());
    Ok(())
}

/// List the entries of `dir` accepted by `filter`.
pub async fn list_candidates(dir: &Path, filter: EntryFilter) -> Result<Listing, BgStripError> {
    let list_err = |e: std::io::Error| BgStripError::ListFailed {
        path: dir.to_path_buf(),
        source: e,
    };

    let mut entries = tokio::fs::read_dir(dir).await.map_err(list_err)?;
    let mut listing = Listing::default();

    while let Some(entry) = entries.next_entry().await.map_err(list_err)? {
        let file_name = entry.file_name();
        let display_name = file_name.to_string_lossy().into_owned();
        let path = entry.path();

        // `fs::metadata` follows symlinks; a dangling link is not a regular file.
        let is_file = tokio::fs::metadata(&path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);

        if !is_file || !filter.accepts(&display_name) {
            listing.skipped += 1;
            continue;
        }

        listing.files.push(Candidate {
            file_name,
            display_name,
            path,
        });
    }

    listing.files.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    debug!(
        "Scanned {}: {} candidates, {} skipped",
        dir.display(),
        listing.files.len(),
        listing.skipped
    );
    Ok(listing)
}
