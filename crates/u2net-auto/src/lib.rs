//! # u2net-auto
//!
//! Auto-download and cache U²-Net family ONNX models at runtime, so users of
//! a background remover never have to fetch `u2net.onnx` by hand.
//!
//! ## How it works
//!
//! On first call to [`ensure_model`]:
//!
//! 1. Checks `U2NET_MODEL_PATH` for an explicit model file.
//! 2. Checks `~/.u2net/{model}.onnx` (or `$U2NET_HOME/{model}.onnx`).
//! 3. If absent, downloads the file from the rembg model release and moves
//!    it into the cache directory in one rename.
//!
//! Subsequent calls skip the network entirely since the model is already cached.
//! The cache location is shared with rembg, so a machine that already ran
//! rembg needs no download at all.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use u2net_auto::{ensure_model, ModelKind};
//!
//! let path = ensure_model(ModelKind::U2Net, Some(&|downloaded, total| {
//!     if let Some(t) = total {
//!         eprint!("\rDownloading u2net: {}/{} bytes", downloaded, t);
//!     }
//! })).expect("download failed");
//! println!("model at {}", path.display());
//! ```
//!
//! ## Environment variable overrides
//!
//! - `U2NET_MODEL_PATH`: path to an existing `.onnx` file; skips download.
//! - `U2NET_HOME`: override the default cache directory.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use thiserror::Error;

// ── Constants ────────────────────────────────────────────────────────────────

/// Release that hosts every supported model file.
const BASE_URL: &str = "https://github.com/danielgatis/rembg/releases/download/v0.0.0";

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned by u2net-auto operations.
#[derive(Error, Debug)]
pub enum ModelFetchError {
    /// Could not create or write into the local cache directory.
    #[error("Model cache directory error: {0}")]
    CacheDir(#[source] std::io::Error),

    /// Network download failed.
    #[error("Download failed: {0}")]
    Download(String),

    /// The downloaded file is empty or truncated.
    #[error("Downloaded model '{name}' is incomplete: got {got} of {expected} bytes")]
    Incomplete {
        name: &'static str,
        got: u64,
        expected: u64,
    },
}

// ── Model catalogue ──────────────────────────────────────────────────────────

/// The segmentation models that can back a background remover.
///
/// All of them take a single NCHW `f32` tensor and emit a saliency map as
/// their first output; they differ in file, input size and normalisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ModelKind {
    /// General purpose U²-Net (176 MB). (default)
    #[default]
    U2Net,
    /// Lightweight U²-Net (4.7 MB), lower quality.
    U2NetP,
    /// U²-Net trained for human segmentation.
    U2NetHumanSeg,
    /// Pruned U²-Net (43 MB), close to `U2Net` quality.
    Silueta,
    /// IS-Net general use model, 1024 px input.
    IsNetGeneralUse,
}

impl ModelKind {
    /// Every supported model, in catalogue order.
    pub const ALL: [ModelKind; 5] = [
        ModelKind::U2Net,
        ModelKind::U2NetP,
        ModelKind::U2NetHumanSeg,
        ModelKind::Silueta,
        ModelKind::IsNetGeneralUse,
    ];

    /// Short identifier, also the file stem on disk.
    pub fn name(self) -> &'static str {
        match self {
            ModelKind::U2Net => "u2net",
            ModelKind::U2NetP => "u2netp",
            ModelKind::U2NetHumanSeg => "u2net_human_seg",
            ModelKind::Silueta => "silueta",
            ModelKind::IsNetGeneralUse => "isnet-general-use",
        }
    }

    /// File name of the model inside the cache directory.
    pub fn file_name(self) -> String {
        format!("{}.onnx", self.name())
    }

    /// Download URL for the model file.
    pub fn url(self) -> String {
        format!("{}/{}", BASE_URL, self.file_name())
    }

    /// Square input edge the network expects, in pixels.
    pub fn input_size(self) -> u32 {
        match self {
            ModelKind::IsNetGeneralUse => 1024,
            _ => 320,
        }
    }

    /// Per-channel normalisation mean (RGB).
    pub fn mean(self) -> [f32; 3] {
        match self {
            ModelKind::IsNetGeneralUse => [0.5, 0.5, 0.5],
            _ => [0.485, 0.456, 0.406],
        }
    }

    /// Per-channel normalisation standard deviation (RGB).
    pub fn std(self) -> [f32; 3] {
        match self {
            ModelKind::IsNetGeneralUse => [1.0, 1.0, 1.0],
            _ => [0.229, 0.224, 0.225],
        }
    }

    /// Parse an identifier as produced by [`ModelKind::name`].
    ///
    /// Dashes and underscores are interchangeable.
    pub fn from_name(name: &str) -> Option<Self> {
        let wanted = name.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|k| k.name().replace('_', "-") == wanted)
    }
}

// ── Cache directory resolution ───────────────────────────────────────────────

/// Returns the model cache directory.
///
/// Default location is `~/.u2net/` on every platform (the directory rembg
/// uses). Override by setting `U2NET_HOME`.
pub fn model_cache_dir() -> PathBuf {
    if let Ok(override_dir) = std::env::var("U2NET_HOME") {
        if !override_dir.is_empty() {
            return PathBuf::from(override_dir);
        }
    }

    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".u2net")
}

// ── Per-process resolution cache ─────────────────────────────────────────────

fn resolved_paths() -> &'static Mutex<HashMap<ModelKind, PathBuf>> {
    static RESOLVED: OnceLock<Mutex<HashMap<ModelKind, PathBuf>>> = OnceLock::new();
    RESOLVED.get_or_init(|| Mutex::new(HashMap::new()))
}

// ── Public API ───────────────────────────────────────────────────────────────

/// Returns `true` if the model is already on disk (no network access needed
/// on the next call to [`ensure_model`]).
///
/// Also returns `true` when `U2NET_MODEL_PATH` points to an existing file.
pub fn is_model_cached(kind: ModelKind) -> bool {
    cached_model_path(kind).is_some()
}

/// Returns the on-disk path to the model, or `None` if not cached.
pub fn cached_model_path(kind: ModelKind) -> Option<PathBuf> {
    if let Some(p) = env_model_path() {
        return Some(p);
    }
    let p = model_cache_dir().join(kind.file_name());
    if p.is_file() {
        Some(p)
    } else {
        None
    }
}

/// Ensures the model file is present in the local cache.
///
/// - If `U2NET_MODEL_PATH` is set (and the file exists), that path is used.
/// - Otherwise, checks [`model_cache_dir`] for an existing file.
/// - If absent, downloads the model and renames it into the cache.
///
/// `on_progress` receives `(bytes_downloaded, total_size_option)` during
/// the download.  Pass `None` to suppress progress callbacks.
///
/// # Thread safety
///
/// Safe to call from multiple threads; a path resolved once is reused for
/// the rest of the process lifetime.
pub fn ensure_model(
    kind: ModelKind,
    on_progress: Option<&dyn Fn(u64, Option<u64>)>,
) -> Result<PathBuf, ModelFetchError> {
    if let Some(path) = resolved_paths()
        .lock()
        .ok()
        .and_then(|m| m.get(&kind).cloned())
    {
        return Ok(path);
    }

    let path = resolve_or_download(kind, on_progress)?;

    if let Ok(mut m) = resolved_paths().lock() {
        m.insert(kind, path.clone());
    }

    Ok(path)
}

// ── Internal helpers ─────────────────────────────────────────────────────────

fn env_model_path() -> Option<PathBuf> {
    let p = PathBuf::from(std::env::var("U2NET_MODEL_PATH").ok()?);
    if p.is_file() {
        Some(p)
    } else {
        None
    }
}

fn resolve_or_download(
    kind: ModelKind,
    on_progress: Option<&dyn Fn(u64, Option<u64>)>,
) -> Result<PathBuf, ModelFetchError> {
    // 1. Environment variable override.
    if let Ok(env_path) = std::env::var("U2NET_MODEL_PATH") {
        let p = PathBuf::from(&env_path);
        if p.is_file() {
            return Ok(p);
        }
        // Fall through: env var set but file missing → still auto-download.
        eprintln!(
            "u2net-auto: U2NET_MODEL_PATH '{}' not found; downloading …",
            p.display()
        );
    }

    let cache_dir = model_cache_dir();
    let model_path = cache_dir.join(kind.file_name());

    // 2. Already cached on disk.
    if model_path.is_file() {
        return Ok(model_path);
    }

    // 3. Download.
    std::fs::create_dir_all(&cache_dir).map_err(ModelFetchError::CacheDir)?;
    download_to(&kind.url(), kind.name(), &cache_dir, &model_path, on_progress)?;

    Ok(model_path)
}

/// Streams a URL into a temp file inside `dir`, calling `on_progress` every
/// 64 KiB, then renames it to `dest`.
fn download_to(
    url: &str,
    name: &'static str,
    dir: &Path,
    dest: &Path,
    on_progress: Option<&dyn Fn(u64, Option<u64>)>,
) -> Result<(), ModelFetchError> {
    let client = reqwest::blocking::Client::builder()
        .user_agent(concat!("u2net-auto/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(5))
        .timeout(None)
        .build()
        .map_err(|e| ModelFetchError::Download(e.to_string()))?;

    let mut response = client
        .get(url)
        .send()
        .map_err(|e| ModelFetchError::Download(format!("GET {url}: {e}")))?;

    if !response.status().is_success() {
        return Err(ModelFetchError::Download(format!(
            "HTTP {} for {url}",
            response.status()
        )));
    }

    let total = response.content_length();
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(ModelFetchError::CacheDir)?;

    let mut chunk = vec![0u8; 64 * 1024]; // 64 KiB
    let mut downloaded: u64 = 0;

    loop {
        match response.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                tmp.write_all(&chunk[..n])
                    .map_err(ModelFetchError::CacheDir)?;
                downloaded += n as u64;
                if let Some(cb) = on_progress {
                    cb(downloaded, total);
                }
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(ModelFetchError::Download(format!("Read error: {e}")));
            }
        }
    }

    check_complete(name, downloaded, total)?;

    tmp.persist(dest)
        .map_err(|e| ModelFetchError::CacheDir(e.error))?;
    Ok(())
}

fn check_complete(
    name: &'static str,
    got: u64,
    expected: Option<u64>,
) -> Result<(), ModelFetchError> {
    match expected {
        Some(expected) if got != expected => Err(ModelFetchError::Incomplete {
            name,
            got,
            expected,
        }),
        None if got == 0 => Err(ModelFetchError::Incomplete {
            name,
            got,
            expected: 0,
        }),
        _ => Ok(()),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_names_round_trip() {
        for kind in ModelKind::ALL {
            assert_eq!(ModelKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(
            ModelKind::from_name("u2net-human-seg"),
            Some(ModelKind::U2NetHumanSeg)
        );
        assert_eq!(ModelKind::from_name(" U2NETP "), Some(ModelKind::U2NetP));
        assert_eq!(ModelKind::from_name("resnet"), None);
    }

    #[test]
    fn urls_point_at_onnx_files() {
        let url = ModelKind::U2Net.url();
        assert!(url.starts_with("https://"));
        assert!(url.ends_with("/u2net.onnx"));
        assert!(ModelKind::IsNetGeneralUse
            .url()
            .ends_with("/isnet-general-use.onnx"));
    }

    #[test]
    fn isnet_uses_its_own_normalisation() {
        assert_eq!(ModelKind::IsNetGeneralUse.input_size(), 1024);
        assert_eq!(ModelKind::IsNetGeneralUse.std(), [1.0, 1.0, 1.0]);
        assert_eq!(ModelKind::Silueta.input_size(), 320);
        assert_eq!(ModelKind::U2NetP.mean(), [0.485, 0.456, 0.406]);
    }

    #[test]
    fn cache_dir_is_deterministic() {
        let d1 = model_cache_dir();
        let d2 = model_cache_dir();
        assert_eq!(d1, d2);
    }

    #[test]
    fn incomplete_download_detected() {
        assert!(check_complete("u2net", 10, Some(10)).is_ok());
        assert!(check_complete("u2net", 10, None).is_ok());
        assert!(matches!(
            check_complete("u2net", 9, Some(10)),
            Err(ModelFetchError::Incomplete { got: 9, expected: 10, .. })
        ));
        assert!(check_complete("u2net", 0, None).is_err());
    }
}
