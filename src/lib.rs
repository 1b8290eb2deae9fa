//! # bgstrip
//!
//! Batch image preparation: normalise a folder of images to PNG, strip
//! their backgrounds, and resize them to a common height.
//!
//! ## Pipeline Overview
//!
//! ```text
//! <root>
//!  │
//!  ├─ 1. Normalize  any decodable image → 8-bit RGB PNG     → converted/
//!  ├─ 2. Strip      .png → background removed (U²-Net)      → no_background/
//!  └─ 3. Resize     .png → fixed height, aspect preserved   → resized/
//! ```
//!
//! Each stage works on one directory and writes to a named subdirectory.
//! A file that fails is logged and recorded in the [`StageReport`]; the
//! rest of the batch carries on. Only a missing input directory or an
//! uncreatable output directory stops a stage.
//!
//! ## Quick Start
//!
#![cfg_attr(feature = "onnx", doc = "```rust,no_run")]
#![cfg_attr(not(feature = "onnx"), doc = "```rust,ignore")]
//! use std::sync::Arc;
//! use bgstrip::{run_pipeline, ModelKind, PipelineConfig, RemovalOptions, U2NetRemover};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Downloads the model to ~/.u2net on first use.
//!     let remover = U2NetRemover::new(ModelKind::U2Net, RemovalOptions::default())?;
//!     let config = PipelineConfig::builder("./img")
//!         .remover(Arc::new(remover))
//!         .build()?;
//!
//!     let report = run_pipeline(&config).await?;
//!     for stage in &report.stages {
//!         eprintln!("{}: {}/{} ok", stage.stage, stage.succeeded(), stage.files.len());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `bgstrip` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `onnx`  | on      | Built-in [`U2NetRemover`] via ONNX Runtime, with model auto-download |
//!
//! Without `onnx` the strip stage needs a caller-supplied
//! [`BackgroundRemover`]:
//! ```toml
//! bgstrip = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod codec;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod run;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use codec::{ImageCodec, StandardCodec};
pub use config::{
    OutputLayout, PipelineConfig, PipelineConfigBuilder, ResizeFilter, StagePlan, StageSelection,
    DEFAULT_TARGET_HEIGHT,
};
pub use error::{BgStripError, FileError};
pub use output::{FileOutcome, FileStatus, PipelineReport, Stage, StageReport};
pub use pipeline::resize::target_width;
pub use pipeline::strip::{BackgroundRemover, RemovalError};
#[cfg(feature = "onnx")]
pub use pipeline::u2net::{ModelKind, RemovalOptions, U2NetRemover};
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};
pub use run::{
    normalize_dir, normalize_into, resize_dir, resize_into, run_pipeline, run_pipeline_sync,
    strip_dir, strip_into,
};
