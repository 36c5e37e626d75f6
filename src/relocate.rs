//! Moving processed originals into the archive directory

use crate::error::{BgWatchError, Result};
use std::path::{Path, PathBuf};

/// Move `source` into `dest_dir`, keeping its base name
///
/// An existing file of the same name in `dest_dir` is never overwritten.
/// When source and destination live on different devices the file is copied
/// and the source removed afterwards.
///
/// # Returns
/// The new location of the file
pub async fn relocate(source: &Path, dest_dir: &Path) -> Result<PathBuf> {
    let file_name = source.file_name().ok_or_else(|| {
        BgWatchError::relocation(format!(
            "'{}' has no file name to move",
            source.display()
        ))
    })?;
    let target = dest_dir.join(file_name);

    let exists = tokio::fs::try_exists(&target)
        .await
        .map_err(|e| BgWatchError::relocation_error(source, &target, &e))?;
    if exists {
        return Err(BgWatchError::relocation_error(
            source,
            &target,
            &std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                "destination already contains a file with this name",
            ),
        ));
    }

    match tokio::fs::rename(source, &target).await {
        Ok(()) => {},
        Err(e) if is_cross_device(&e) => {
            tracing::debug!(
                source = %source.display(),
                target = %target.display(),
                "Rename crosses devices, falling back to copy"
            );
            copy_then_remove(source, &target).await?;
        },
        Err(e) => return Err(BgWatchError::relocation_error(source, &target, &e)),
    }

    tracing::info!(
        file = %file_name.to_string_lossy(),
        destination = %dest_dir.display(),
        "File moved"
    );
    Ok(target)
}

async fn copy_then_remove(source: &Path, target: &Path) -> Result<()> {
    if let Err(e) = tokio::fs::copy(source, target).await {
        if let Err(cleanup_err) = tokio::fs::remove_file(target).await {
            tracing::warn!("Failed to remove partial copy {}: {}", target.display(), cleanup_err);
        }
        return Err(BgWatchError::relocation_error(source, target, &e));
    }

    tokio::fs::remove_file(source).await.map_err(|e| {
        BgWatchError::relocation(format!(
            "copied '{}' to '{}' but could not remove the original: {e}",
            source.display(),
            target.display()
        ))
    })
}

fn is_cross_device(error: &std::io::Error) -> bool {
    // EXDEV on Unix, ERROR_NOT_SAME_DEVICE on Windows
    #[cfg(unix)]
    const CROSS_DEVICE: Option<i32> = Some(18);
    #[cfg(windows)]
    const CROSS_DEVICE: Option<i32> = Some(17);
    #[cfg(not(any(unix, windows)))]
    const CROSS_DEVICE: Option<i32> = None;

    CROSS_DEVICE.is_some() && error.raw_os_error() == CROSS_DEVICE
}
