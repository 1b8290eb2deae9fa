//! Per-file building blocks for the three batch stages.
//!
//! Each submodule owns one concern. The stage runners in [`crate::run`]
//! glue them together: list, read, transform, write.
//!
//! ## Data Flow
//!
//! ```text
//! root ──▶ normalize ──▶ strip ──▶ resize
//!          (any → RGB PNG) (remover) (fixed height)
//! ```
//!
//! 1. [`scan`]      validate the source directory and list candidates
//! 2. [`normalize`] decode anything, write 8-bit RGB PNG
//! 3. [`strip`]     hand the bytes to a [`strip::BackgroundRemover`]
//! 4. [`resize`]    proportional resize to the target height
//! 5. [`write`]     temp file + rename for every output
//!
//! The transforms are synchronous and CPU-bound; the runners call them
//! inside `spawn_blocking`.

pub mod normalize;
pub mod resize;
pub mod scan;
pub mod strip;
#[cfg(feature = "onnx")]
pub mod u2net;
pub mod write;

/// Encoded output of one per-file transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transformed {
    pub bytes: Vec<u8>,
    /// Output width, when known.
    pub width: Option<u32>,
    /// Output height, when known.
    pub height: Option<u32>,
}
