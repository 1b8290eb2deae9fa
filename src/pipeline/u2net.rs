//! Built-in background remover: U²-Net salient-object segmentation via ONNX Runtime.
//!
//! ## Inference
//!
//! 1. Decode, convert to RGB and resize to the model's square input
//!    (320 px, or 1024 px for ISNet) with Lanczos3.
//! 2. Scale by the brightest channel value, then normalise per channel with
//!    the model's mean/std. Layout is NCHW, batch of one.
//! 3. Take channel 0 of the first output, min-max normalise to `0..=255`.
//! 4. Resize that mask back to the original size with Lanczos3.
//! 5. Multiply every RGBA channel of the original by `mask / 255`.
//!
//! The session is created on first use and shared behind a mutex; `ort`
//! sessions need `&mut` to run.

use crate::error::BgStripError;
use crate::pipeline::strip::{BackgroundRemover, RemovalError};
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgba, RgbaImage, RgbImage};
use ndarray::Array4;
use once_cell::sync::OnceCell;
use ort::session::Session;
use ort::value::Value;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

pub use u2net_auto::ModelKind;

/// Options for what the remover emits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemovalOptions {
    /// Emit the grayscale alpha mask instead of the cutout.
    pub mask_only: bool,
    /// Composite the cutout over this RGBA colour instead of transparency.
    pub background: Option<[u8; 4]>,
}

/// [`BackgroundRemover`] backed by a U²-Net family ONNX model.
pub struct U2NetRemover {
    kind: ModelKind,
    model_path: PathBuf,
    options: RemovalOptions,
    session: OnceCell<Mutex<Session>>,
}

impl std::fmt::Debug for U2NetRemover {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("U2NetRemover")
            .field("kind", &self.kind)
            .field("model_path", &self.model_path)
            .field("options", &self.options)
            .field("loaded", &self.session.get().is_some())
            .finish()
    }
}

impl U2NetRemover {
    /// Resolve `kind` through the model cache (downloading it if needed).
    ///
    /// Blocks while downloading; call from a blocking context.
    pub fn new(kind: ModelKind, options: RemovalOptions) -> Result<Self, BgStripError> {
        let path = u2net_auto::ensure_model(kind, None)
            .map_err(|e| BgStripError::RemoverUnavailable(e.to_string()))?;
        Ok(Self::from_path(kind, path, options))
    }

    /// Use a model file already on disk. Nothing is loaded until first use.
    pub fn from_path(kind: ModelKind, model_path: impl Into<PathBuf>, options: RemovalOptions) -> Self {
        Self {
            kind,
            model_path: model_path.into(),
            options,
            session: OnceCell::new(),
        }
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// Load the ONNX session now instead of on the first image.
    pub fn load(&self) -> Result<(), BgStripError> {
        self.session()
            .map(|_| ())
            .map_err(|e| BgStripError::RemoverUnavailable(e.to_string()))
    }

    fn session(&self) -> Result<&Mutex<Session>, RemovalError> {
        self.session.get_or_try_init(|| {
            info!(
                "Loading {} model from {}",
                self.kind.name(),
                self.model_path.display()
            );
            let session = Session::builder()
                .and_then(|b| b.commit_from_file(&self.model_path))
                .map_err(|e| {
                    RemovalError::Model(format!(
                        "failed to load '{}': {e}",
                        self.model_path.display()
                    ))
                })?;
            Ok(Mutex::new(session))
        })
    }

    fn predict_mask(&self, rgb: &RgbImage) -> Result<GrayImage, RemovalError> {
        let side = self.kind.input_size();
        let input = preprocess(rgb, side, self.kind.mean(), self.kind.std());
        let value = Value::from_array(input).map_err(|e| RemovalError::Model(e.to_string()))?;

        let mut session = self
            .session()?
            .lock()
            .map_err(|_| RemovalError::Model("session mutex poisoned".into()))?;
        let outputs = session
            .run(ort::inputs![value])
            .map_err(|e| RemovalError::Model(format!("inference failed: {e}")))?;
        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| RemovalError::Model(e.to_string()))?;

        let plane = (side * side) as usize;
        if data.len() < plane {
            return Err(RemovalError::Model(format!(
                "unexpected output shape {:?}",
                shape.iter().collect::<Vec<_>>()
            )));
        }
        postprocess_mask(&data[..plane], side)
    }
}

impl BackgroundRemover for U2NetRemover {
    fn name(&self) -> &str {
        self.kind.name()
    }

    fn remove(&self, image: &[u8]) -> Result<Vec<u8>, RemovalError> {
        let img = image::load_from_memory(image).map_err(|e| RemovalError::Input(e.to_string()))?;
        let (w, h) = (img.width(), img.height());
        debug!("{}: segmenting {}x{}", self.kind.name(), w, h);

        let mask = self.predict_mask(&img.to_rgb8())?;
        let mask = image::imageops::resize(&mask, w, h, FilterType::Lanczos3);

        let out = if self.options.mask_only {
            DynamicImage::ImageLuma8(mask)
        } else {
            let mut cut = cutout(&img.to_rgba8(), &mask);
            if let Some(bg) = self.options.background {
                composite_over(&mut cut, bg);
            }
            DynamicImage::ImageRgba8(cut)
        };

        let mut buf = Vec::new();
        out.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .map_err(|e| RemovalError::Output(e.to_string()))?;
        Ok(buf)
    }
}

// ── Pure image math ──────────────────────────────────────────────────────

/// Build the `[1, 3, side, side]` model input from an RGB image.
pub(crate) fn preprocess(rgb: &RgbImage, side: u32, mean: [f32; 3], std: [f32; 3]) -> Array4<f32> {
    let resized = image::imageops::resize(rgb, side, side, FilterType::Lanczos3);
    let max = resized
        .as_raw()
        .iter()
        .copied()
        .max()
        .map(f32::from)
        .unwrap_or(0.0)
        .max(1e-6);

    let s = side as usize;
    let mut input = Array4::<f32>::zeros((1, 3, s, s));
    for (x, y, px) in resized.enumerate_pixels() {
        for c in 0..3 {
            let v = f32::from(px[c]) / max;
            input[[0, c, y as usize, x as usize]] = (v - mean[c]) / std[c];
        }
    }
    input
}

/// Min-max normalise a `side × side` prediction into an 8-bit mask.
pub(crate) fn postprocess_mask(pred: &[f32], side: u32) -> Result<GrayImage, RemovalError> {
    let (lo, hi) = pred
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let range = hi - lo;

    let pixels: Vec<u8> = pred
        .iter()
        .map(|&v| {
            if range > 0.0 {
                ((v - lo) / range * 255.0).clamp(0.0, 255.0) as u8
            } else {
                0
            }
        })
        .collect();

    GrayImage::from_raw(side, side, pixels)
        .ok_or_else(|| RemovalError::Output("mask buffer size mismatch".into()))
}

/// Scale every channel of `img` by the matching mask value.
pub(crate) fn cutout(img: &RgbaImage, mask: &GrayImage) -> RgbaImage {
    RgbaImage::from_fn(img.width(), img.height(), |x, y| {
        let Luma([m]) = *mask.get_pixel(x, y);
        let Rgba(p) = *img.get_pixel(x, y);
        Rgba(p.map(|c| ((u16::from(c) * u16::from(m)) / 255) as u8))
    })
}

/// Alpha-composite `img` over a solid `bg` colour in place.
pub(crate) fn composite_over(img: &mut RgbaImage, bg: [u8; 4]) {
    let bg_a = f32::from(bg[3]) / 255.0;
    for px in img.pixels_mut() {
        let a = f32::from(px[3]) / 255.0;
        let out_a = a + bg_a * (1.0 - a);
        if out_a <= 0.0 {
            *px = Rgba([0, 0, 0, 0]);
            continue;
        }
        for c in 0..3 {
            let fg = f32::from(px[c]) * a;
            let back = f32::from(bg[c]) * bg_a * (1.0 - a);
            px[c] = ((fg + back) / out_a).round().clamp(0.0, 255.0) as u8;
        }
        px[3] = (out_a * 255.0).round() as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preprocess_shape_and_normalisation() {
        let img = RgbImage::from_pixel(8, 4, image::Rgb([255, 255, 255]));
        let input = preprocess(&img, 16, [0.5, 0.5, 0.5], [0.5, 0.5, 0.5]);
        assert_eq!(input.shape(), &[1, 3, 16, 16]);
        // white / max == 1.0 → (1.0 - 0.5) / 0.5
        assert!((input[[0, 0, 3, 7]] - 1.0).abs() < 1e-2);
    }

    #[test]
    fn preprocess_black_image_does_not_divide_by_zero() {
        let img = RgbImage::new(4, 4);
        let input = preprocess(&img, 4, [0.485, 0.456, 0.406], [0.229, 0.224, 0.225]);
        assert!(input.iter().all(|v| v.is_finite()));
        assert!((input[[0, 0, 0, 0]] - (-0.485 / 0.229)).abs() < 1e-5);
    }

    #[test]
    fn mask_is_min_max_scaled() {
        let mask = postprocess_mask(&[-1.0, 0.0, 0.5, 1.0], 2).unwrap();
        assert_eq!(mask.as_raw(), &vec![0, 127, 191, 255]);
    }

    #[test]
    fn flat_prediction_gives_empty_mask() {
        let mask = postprocess_mask(&[0.3; 4], 2).unwrap();
        assert!(mask.as_raw().iter().all(|&m| m == 0));
    }

    #[test]
    fn wrong_length_is_an_error() {
        assert!(postprocess_mask(&[0.0; 3], 2).is_err());
    }

    #[test]
    fn cutout_scales_all_channels() {
        let img = RgbaImage::from_pixel(2, 1, Rgba([200, 100, 50, 255]));
        let mask = GrayImage::from_raw(2, 1, vec![255, 0]).unwrap();
        let out = cutout(&img, &mask);
        assert_eq!(out.get_pixel(0, 0).0, [200, 100, 50, 255]);
        assert_eq!(out.get_pixel(1, 0).0, [0, 0, 0, 0]);

        let half = GrayImage::from_raw(2, 1, vec![128, 128]).unwrap();
        assert_eq!(cutout(&img, &half).get_pixel(0, 0).0, [100, 50, 25, 128]);
    }

    #[test]
    fn composite_fills_transparent_pixels() {
        let mut img = RgbaImage::from_raw(2, 1, vec![10, 20, 30, 255, 0, 0, 0, 0]).unwrap();
        composite_over(&mut img, [255, 255, 255, 255]);
        assert_eq!(img.get_pixel(0, 0).0, [10, 20, 30, 255]);
        assert_eq!(img.get_pixel(1, 0).0, [255, 255, 255, 255]);
    }

    #[test]
    fn missing_model_file_fails_on_load() {
        let remover = U2NetRemover::from_path(
            ModelKind::U2NetP,
            "/definitely/not/here.onnx",
            RemovalOptions::default(),
        );
        assert_eq!(remover.name(), "u2netp");
        assert!(matches!(
            remover.load(),
            Err(BgStripError::RemoverUnavailable(_))
        ));
    }
}
