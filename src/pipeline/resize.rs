//! Proportional resize to a fixed height.
//!
//! ## Width rounding
//!
//! The new width is `target_height * (width / height)` computed in `f64` and
//! **truncated**, never rounded to nearest. A 400×300 image at height 700 is
//! therefore 933 px wide, not 934. Downstream consumers depend on that exact
//! width, so do not "fix" it.
//!
//! The output is always PNG. Inputs are selected by their `.png` name and
//! outputs keep that name, so mislabelled data (a JPEG saved as `.png`) is
//! re-encoded rather than passed through in its original format.

use crate::codec::ImageCodec;
use crate::config::ResizeFilter;
use crate::error::FileError;
use crate::pipeline::Transformed;
use image::ImageFormat;
use tracing::debug;

/// Width that keeps the aspect ratio of `width`×`height` at `target_height`.
pub fn target_width(width: u32, height: u32, target_height: u32) -> u32 {
    let aspect_ratio = width as f64 / height as f64;
    (target_height as f64 * aspect_ratio) as u32
}

/// Decode `bytes`, resize to `target_height` and encode as PNG.
pub fn resize_bytes(
    codec: &dyn ImageCodec,
    bytes: &[u8],
    target_height: u32,
    filter: ResizeFilter,
) -> Result<Transformed, FileError> {
    let img = codec.decode(bytes)?;

    let width = target_width(img.width(), img.height(), target_height);
    if width == 0 || target_height == 0 {
        return Err(FileError::InvalidDimensions {
            width,
            height: target_height,
        });
    }

    debug!(
        "Resizing {}x{} → {}x{}",
        img.width(),
        img.height(),
        width,
        target_height
    );
    let resized = img.resize_exact(width, target_height, filter.into());
    let out = codec.encode(&resized, ImageFormat::Png)?;

    Ok(Transformed {
        bytes: out,
        width: Some(width),
        height: Some(target_height),
    })
}
