//! Background removal seam.
//!
//! The strip stage treats the remover as a pure byte-to-byte mapping: encoded
//! image in, encoded image (normally an RGBA PNG) out. Whatever the remover
//! returns is written verbatim. The built-in ONNX remover lives in
//! [`crate::pipeline::u2net`]; tests plug in fakes.

use crate::error::FileError;
use crate::pipeline::Transformed;
use std::io::Cursor;
use thiserror::Error;

/// Error raised by a [`BackgroundRemover`].
#[derive(Debug, Error)]
pub enum RemovalError {
    /// Input bytes are not an image the remover understands.
    #[error("unsupported input image: {0}")]
    Input(String),

    /// The model could not be loaded or failed during inference.
    #[error("model error: {0}")]
    Model(String),

    /// Building the output image failed.
    #[error("output error: {0}")]
    Output(String),
}

/// Strip the background from an encoded image.
///
/// Implementations must be `Send + Sync`: the strip stage shares one remover
/// across blocking tasks.
pub trait BackgroundRemover: Send + Sync {
    /// Short identifier for logs, e.g. `"u2net"`.
    fn name(&self) -> &str;

    /// Return the encoded image with its background removed.
    fn remove(&self, image: &[u8]) -> Result<Vec<u8>, RemovalError>;
}

/// Run `remover` over `bytes`.
///
/// Dimensions are read from the output header when it is a recognisable
/// image; a remover that returns something else still succeeds.
pub fn strip_bytes(remover: &dyn BackgroundRemover, bytes: &[u8]) -> Result<Transformed, FileError> {
    let out = remover.remove(bytes).map_err(|e| FileError::Removal {
        detail: e.to_string(),
    })?;

    let dims = image::ImageReader::new(Cursor::new(&out))
        .with_guessed_format()
        .ok()
        .and_then(|r| r.into_dimensions().ok());

    Ok(Transformed {
        bytes: out,
        width: dims.map(|d| d.0),
        height: dims.map(|d| d.1),
    })
}
