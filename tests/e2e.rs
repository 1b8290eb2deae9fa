//! End-to-end tests against a real U²-Net model.
//!
//! These download the model (4.7 MB `u2netp` by default) into the normal
//! cache on first run and run ONNX inference. They are gated behind the
//! `E2E_ENABLED` environment variable so they do not run in CI unless
//! explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 cargo test --test e2e -- --nocapture
//!
//! To use a different model:
//!   E2E_ENABLED=1 E2E_MODEL=u2net cargo test --test e2e

#![cfg(feature = "onnx")]

use bgstrip::{
    run_pipeline, BackgroundRemover, ModelKind, PipelineConfig, RemovalOptions, Stage,
    U2NetRemover,
};
use image::{ColorType, DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::sync::Arc;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Skip this test if E2E_ENABLED is not set.
macro_rules! e2e_skip_unless_enabled {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
            return;
        }
    }};
}

fn model_kind() -> ModelKind {
    std::env::var("E2E_MODEL")
        .ok()
        .and_then(|n| ModelKind::from_name(&n))
        .unwrap_or(ModelKind::U2NetP)
}

fn remover(options: RemovalOptions) -> U2NetRemover {
    U2NetRemover::new(model_kind(), options).expect("model should download and resolve")
}

/// A dark disc on a flat light background: an easy salient object.
fn disc_image(w: u32, h: u32) -> RgbImage {
    let (cx, cy) = (w as f32 / 2.0, h as f32 / 2.0);
    let r = w.min(h) as f32 / 3.0;
    RgbImage::from_fn(w, h, |x, y| {
        let (dx, dy) = (x as f32 - cx, y as f32 - cy);
        if dx * dx + dy * dy < r * r {
            Rgb([200, 30, 30])
        } else {
            Rgb([245, 245, 245])
        }
    })
}

fn encode(img: RgbImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), format)
        .unwrap();
    buf
}

fn assert_alpha_separates(png: &[u8], w: u32, h: u32, context: &str) {
    let img = image::load_from_memory(png).unwrap();
    assert_eq!((img.width(), img.height()), (w, h), "[{context}] size changed");
    assert!(img.color().has_alpha(), "[{context}] expected an alpha channel");

    let rgba = img.to_rgba8();
    let centre = rgba.get_pixel(w / 2, h / 2)[3];
    let corner = rgba.get_pixel(1, 1)[3];
    assert!(
        centre > corner,
        "[{context}] centre alpha {centre} should exceed corner alpha {corner}"
    );
    println!("[{context}] ✓  centre α={centre} corner α={corner}");
}

// ── Remover ──────────────────────────────────────────────────────────────────

#[test]
fn test_remove_disc_background() {
    e2e_skip_unless_enabled!();

    let r = remover(RemovalOptions::default());
    let out = r
        .remove(&encode(disc_image(240, 180), ImageFormat::Png))
        .expect("removal should succeed");
    assert_eq!(image::guess_format(&out).unwrap(), ImageFormat::Png);
    assert_alpha_separates(&out, 240, 180, r.name());
}

#[test]
fn test_mask_only_is_grayscale() {
    e2e_skip_unless_enabled!();

    let r = remover(RemovalOptions {
        mask_only: true,
        ..Default::default()
    });
    let out = r
        .remove(&encode(disc_image(64, 64), ImageFormat::Jpeg))
        .unwrap();
    let mask = image::load_from_memory(&out).unwrap();
    assert_eq!(mask.color(), ColorType::L8);
    let mask = mask.to_luma8();
    assert!(mask.get_pixel(32, 32)[0] > mask.get_pixel(1, 1)[0]);
}

#[test]
fn test_solid_background_is_opaque() {
    e2e_skip_unless_enabled!();

    let r = remover(RemovalOptions {
        background: Some([0, 0, 255, 255]),
        ..Default::default()
    });
    let out = r
        .remove(&encode(disc_image(64, 64), ImageFormat::Png))
        .unwrap();
    let img = image::load_from_memory(&out).unwrap().to_rgba8();
    assert!(img.pixels().all(|p| p[3] == 255));
}

#[test]
fn test_garbage_input_is_removal_error() {
    e2e_skip_unless_enabled!();

    let r = remover(RemovalOptions::default());
    assert!(r.remove(b"definitely not an image").is_err());
}

// ── Full pipeline ────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_pipeline_with_real_model() {
    e2e_skip_unless_enabled!();

    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    std::fs::write(root.join("disc.jpg"), encode(disc_image(400, 300), ImageFormat::Jpeg))
        .unwrap();
    std::fs::write(root.join("readme.txt"), "skip me").unwrap();

    let r = tokio::task::spawn_blocking(|| remover(RemovalOptions::default()))
        .await
        .unwrap();
    let config = PipelineConfig::builder(root)
        .remover(Arc::new(r))
        .build()
        .unwrap();

    let report = run_pipeline(&config).await.expect("pipeline should run");
    let strip = report.stage(Stage::Strip).unwrap();
    assert_eq!(strip.failed(), 0, "strip failures: {:?}", strip.files);

    let final_png = root.join("converted/no_background/resized/disc.png");
    let bytes = std::fs::read(&final_png).unwrap();
    assert_alpha_separates(&bytes, 933, 700, "pipeline");

    println!(
        "{}",
        serde_json::to_string_pretty(&report).unwrap_or_default()
    );
}

// ── Model cache ──────────────────────────────────────────────────────────────

#[test]
fn test_model_is_cached_after_download() {
    e2e_skip_unless_enabled!();

    let kind = model_kind();
    let path = u2net_auto::ensure_model(kind, None).unwrap();
    assert!(path.is_file());
    assert!(u2net_auto::is_model_cached(kind));
    assert_eq!(path.extension().and_then(|e| e.to_str()), Some("onnx"));
}
