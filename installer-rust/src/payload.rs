use std::path::{Path, PathBuf};

use tokio::fs;

use crate::{error::InstallError, fs_ops};

const COPY_ATTEMPTS: usize = 5;

pub async fn ensure_payload(source_dir: &Path) -> Result<(), InstallError> {
    let is_dir = fs::metadata(source_dir)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false);
    if is_dir {
        return Ok(());
    }
    let name = source_dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "payload".to_string());
    Err(InstallError::PayloadMissing {
        name,
        path: source_dir.to_path_buf(),
    })
}

/// Top-level regular files of `source_dir`, sorted by name. Directories and
/// other non-file entries are left out.
pub async fn payload_files(source_dir: &Path) -> Result<Vec<PathBuf>, InstallError> {
    ensure_payload(source_dir).await?;
    let read_err = |source| InstallError::PayloadRead {
        path: source_dir.to_path_buf(),
        source,
    };
    let mut entries = fs::read_dir(source_dir).await.map_err(read_err)?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(read_err)? {
        let path = entry.path();
        let meta = fs::metadata(&path)
            .await
            .map_err(|source| InstallError::PayloadRead {
                path: path.clone(),
                source,
            })?;
        if meta.is_file() {
            files.push(path);
        } else {
            tracing::debug!("Skipping non-file payload entry: {}", path.display());
        }
    }
    files.sort();
    Ok(files)
}

/// Copies every top-level file of `source_dir` into `install_dir`,
/// overwriting same-named files. Files copied before a failure stay in place.
/// Returns the destination paths in copy order.
pub async fn copy_payload(
    source_dir: &Path,
    install_dir: &Path,
) -> Result<Vec<PathBuf>, InstallError> {
    let files = payload_files(source_dir).await?;
    tracing::info!("Files to copy: {}", files.len());

    let mut copied = Vec::with_capacity(files.len());
    for src in files {
        let Some(name) = src.file_name() else {
            continue;
        };
        let dest = install_dir.join(name);
        fs_ops::copy_file_with_retry(&src, &dest, COPY_ATTEMPTS)
            .await
            .map_err(|source| InstallError::CopyFailed {
                src: src.clone(),
                dest: dest.clone(),
                source,
            })?;
        tracing::info!("Copied: {}", name.to_string_lossy());
        copied.push(dest);
    }
    Ok(copied)
}
