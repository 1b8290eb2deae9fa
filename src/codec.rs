//! Image codec seam: bytes ↔ `DynamicImage`.
//!
//! Stages never call the `image` crate's I/O directly; they go through
//! [`ImageCodec`] so tests (or callers with exotic formats) can swap the
//! decoder without touching stage logic.

use crate::error::FileError;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use tracing::debug;

/// Decode and encode images in memory.
///
/// Implementations must be `Send + Sync`: stages move the codec into a
/// blocking task for each file.
pub trait ImageCodec: Send + Sync {
    /// Decode `bytes`, detecting the format from the content.
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, FileError>;

    /// Detect the encoded format of `bytes`, if recognisable.
    fn detect_format(&self, bytes: &[u8]) -> Option<ImageFormat>;

    /// Encode `img` as `format`.
    fn encode(&self, img: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>, FileError>;
}

/// Codec backed by the `image` crate (PNG, JPEG, WebP, GIF, BMP, TIFF).
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardCodec;

impl ImageCodec for StandardCodec {
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, FileError> {
        if bytes.is_empty() {
            return Err(FileError::Decode {
                detail: "file is empty".into(),
            });
        }
        let img = image::load_from_memory(bytes)?;
        debug!("Decoded {}x{} {:?}", img.width(), img.height(), img.color());
        Ok(img)
    }

    fn detect_format(&self, bytes: &[u8]) -> Option<ImageFormat> {
        image::guess_format(bytes).ok()
    }

    fn encode(&self, img: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>, FileError> {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), format)
            .map_err(|e| FileError::Encode {
                detail: e.to_string(),
            })?;
        debug!("Encoded {:?} → {} bytes", format, buf.len());
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn png_survives_encode_decode() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 6, Rgba([255, 0, 0, 128])));
        let bytes = StandardCodec.encode(&img, ImageFormat::Png).unwrap();
        assert_eq!(StandardCodec.detect_format(&bytes), Some(ImageFormat::Png));

        let back = StandardCodec.decode(&bytes).unwrap();
        assert_eq!((back.width(), back.height()), (10, 6));
        assert_eq!(back.to_rgba8().get_pixel(3, 3), &Rgba([255, 0, 0, 128]));
    }

    #[test]
    fn text_is_not_an_image() {
        let err = StandardCodec.decode(b"hello, world\n").unwrap_err();
        assert!(matches!(err, FileError::Decode { .. }), "got {err:?}");
        assert_eq!(StandardCodec.detect_format(b"hello, world\n"), None);
    }

    #[test]
    fn empty_input_is_a_decode_error() {
        assert!(matches!(
            StandardCodec.decode(&[]),
            Err(FileError::Decode { .. })
        ));
    }
}
