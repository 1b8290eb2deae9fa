//! Output writes: temp file + rename so a crash never leaves a truncated
//! image under its final name.

use crate::error::FileError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Temp path used while `path` is being written: `<name>.tmp` next to it.
fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write `bytes` to `path`, replacing any existing file.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), FileError> {
    let write_err = |e: std::io::Error| FileError::Write {
        path: path.to_path_buf(),
        detail: e.to_string(),
    };

    let tmp = tmp_path(path);
    let result = match tokio::fs::write(&tmp, bytes).await {
        Ok(()) => tokio::fs::rename(&tmp, path).await,
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(write_err(e));
    }

    debug!("Wrote {} bytes → {}", bytes.len(), path.display());
    Ok(())
}
