//! Progress-callback trait for per-file pipeline events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events as each stage works through its directory.
//!
//! # Example
//!
//! ```rust
//! use bgstrip::{PipelineConfig, PipelineProgressCallback, Stage};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     written: AtomicUsize,
//! }
//!
//! impl PipelineProgressCallback for CountingCallback {
//!     fn on_file_complete(&self, stage: Stage, file_name: &str, index: usize, total: usize) {
//!         self.written.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("[{stage}] {index}/{total} {file_name}");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { written: AtomicUsize::new(0) });
//!
//! let config = PipelineConfig::builder("./img")
//!     .progress_callback(counter as Arc<dyn PipelineProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::Stage;
use std::sync::Arc;

/// Called by the stages as they process each file.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. `index` is 1-based; `total` counts only the files
/// the stage will actually attempt (filtered entries are excluded).
pub trait PipelineProgressCallback: Send + Sync {
    /// Called once per stage, after the directory scan and before any file.
    fn on_stage_start(&self, stage: Stage, total_files: usize) {
        let _ = (stage, total_files);
    }

    /// Called just before a file is read.
    fn on_file_start(&self, stage: Stage, file_name: &str, index: usize, total: usize) {
        let _ = (stage, file_name, index, total);
    }

    /// Called when a file's output has been written.
    fn on_file_complete(&self, stage: Stage, file_name: &str, index: usize, total: usize) {
        let _ = (stage, file_name, index, total);
    }

    /// Called when a file fails; the stage continues with the next one.
    fn on_file_error(&self, stage: Stage, file_name: &str, index: usize, total: usize, error: &str) {
        let _ = (stage, file_name, index, total, error);
    }

    /// Called once per stage after every file has been attempted.
    fn on_stage_complete(&self, stage: Stage, total_files: usize, success_count: usize) {
        let _ = (stage, total_files, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;
