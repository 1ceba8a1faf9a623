use std::{
    future::Future,
    io,
    path::{Path, PathBuf},
    time::Duration,
};

use tokio::fs;

async fn retry<F, Fut>(mut op: F, attempts: usize) -> io::Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<()>>,
{
    let mut delay = Duration::from_millis(200);
    let attempts = attempts.max(1);
    for i in 0..attempts {
        match op().await {
            Ok(()) => return Ok(()),
            Err(err) => {
                if i + 1 == attempts || !is_transient(&err) {
                    return Err(err);
                }
                tracing::warn!("attempt {} of {attempts} failed: {err}", i + 1);
            }
        }
        tokio::time::sleep(delay).await;
        delay = std::cmp::min(delay * 2, Duration::from_secs(2));
    }
    Ok(())
}

/// Errors worth waiting out: a file held open by a running copy of the app
/// or a scanner. Anything else fails on the first attempt.
fn is_transient(err: &io::Error) -> bool {
    // ERROR_SHARING_VIOLATION, ERROR_LOCK_VIOLATION
    const SHARING_VIOLATION: i32 = 32;
    const LOCK_VIOLATION: i32 = 33;
    if err.kind() == io::ErrorKind::PermissionDenied {
        return true;
    }
    cfg!(windows) && matches!(err.raw_os_error(), Some(SHARING_VIOLATION | LOCK_VIOLATION))
}

fn temp_path_for(dest: &Path) -> io::Result<PathBuf> {
    let parent = dest
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "dest has no parent"))?;
    let name = dest
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "dest has no filename"))?
        .to_string_lossy();
    let nonce = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or(Duration::from_millis(0))
        .as_nanos();
    Ok(parent.join(format!("{name}.tmp-{nonce}")))
}

/// Copies through a sibling temp file so `dest` is either the old or the new
/// contents, never a torn write.
async fn copy_file_atomic(src: &Path, dest: &Path) -> io::Result<()> {
    let tmp = temp_path_for(dest)?;
    if let Err(err) = fs::copy(src, &tmp).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(err);
    }
    // rename replaces an existing file on both unix and Windows.
    if let Err(err) = fs::rename(&tmp, dest).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(err);
    }
    Ok(())
}

pub async fn copy_file_with_retry(src: &Path, dest: &Path, attempts: usize) -> io::Result<()> {
    retry(|| copy_file_atomic(src, dest), attempts).await
}

/// Idempotent `create_dir_all`; an existing directory is success.
pub async fn ensure_dir(path: &Path) -> io::Result<()> {
    if fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false) {
        return Ok(());
    }
    fs::create_dir_all(path).await
}
