//! Format normalisation: any decodable image → 8-bit RGB PNG.
//!
//! The format is detected from the file content, not its extension, so a
//! mislabelled `photo.png` that is really a JPEG is still converted. Alpha
//! is dropped, not composited.

use crate::codec::ImageCodec;
use crate::error::FileError;
use crate::pipeline::Transformed;
use image::{DynamicImage, ImageFormat};
use std::ffi::{OsStr, OsString};
use std::path::Path;

/// Output file name for `file_name`: same stem, `.png` extension.
///
/// Only the last extension is replaced (`archive.tar.gz` → `archive.tar.png`).
pub fn output_name(file_name: &OsStr) -> OsString {
    let mut name = Path::new(file_name)
        .file_stem()
        .map(OsStr::to_os_string)
        .unwrap_or_else(|| file_name.to_os_string());
    name.push(".png");
    name
}

/// Decode `bytes`, convert to RGB and re-encode as PNG.
pub fn normalize_bytes(codec: &dyn ImageCodec, bytes: &[u8]) -> Result<Transformed, FileError> {
    let img = codec.decode(bytes)?;
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let (width, height) = (rgb.width(), rgb.height());
    let png = codec.encode(&rgb, ImageFormat::Png)?;
    Ok(Transformed {
        bytes: png,
        width: Some(width),
        height: Some(height),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::StandardCodec;
    use image::{ColorType, Rgba, RgbaImage};

    #[test]
    fn output_name_swaps_last_extension() {
        assert_eq!(output_name(OsStr::new("a.jpg")), OsString::from("a.png"));
        assert_eq!(output_name(OsStr::new("b.png")), OsString::from("b.png"));
        assert_eq!(
            output_name(OsStr::new("archive.tar.gz")),
            OsString::from("archive.tar.png")
        );
        assert_eq!(output_name(OsStr::new("README")), OsString::from("README.png"));
        assert_eq!(output_name(OsStr::new(".hidden")), OsString::from(".hidden.png"));
    }

    #[test]
    fn rgba_becomes_rgb_png() {
        let src = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 3, Rgba([10, 20, 30, 0])));
        let bytes = StandardCodec.encode(&src, ImageFormat::Png).unwrap();

        let out = normalize_bytes(&StandardCodec, &bytes).unwrap();
        assert_eq!((out.width, out.height), (Some(4), Some(3)));

        let decoded = image::load_from_memory(&out.bytes).unwrap();
        assert_eq!(decoded.color(), ColorType::Rgb8);
        assert_eq!(decoded.to_rgb8().get_pixel(0, 0).0, [10, 20, 30]);
    }

    #[test]
    fn jpeg_is_converted_to_png() {
        let src = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(8, 5, image::Rgb([200, 100, 50])));
        let jpeg = StandardCodec.encode(&src, ImageFormat::Jpeg).unwrap();

        let out = normalize_bytes(&StandardCodec, &jpeg).unwrap();
        assert_eq!(
            image::guess_format(&out.bytes).unwrap(),
            ImageFormat::Png
        );
        assert_eq!((out.width, out.height), (Some(8), Some(5)));
    }

    #[test]
    fn text_fails_to_decode() {
        let err = normalize_bytes(&StandardCodec, b"not an image").unwrap_err();
        assert!(matches!(err, FileError::Decode { .. }));
    }
}
