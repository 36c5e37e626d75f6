//! Directory bootstrapping

use crate::config::DirectoryLayout;
use crate::error::{BgWatchError, Result};

/// Create the source, destination and processed directories if they are missing
pub fn ensure_directories(layout: &DirectoryLayout) -> Result<()> {
    for dir in layout.all() {
        if dir.is_dir() {
            continue;
        }
        std::fs::create_dir_all(dir)
            .map_err(|e| BgWatchError::file_io_error("create directory", dir, &e))?;
        tracing::info!(dir = %dir.display(), "Created directory");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_creates_missing_directories() {
        let temp_dir = TempDir::new().unwrap();
        let layout = DirectoryLayout::under(temp_dir.path().join("nested"));

        ensure_directories(&layout).unwrap();
        for dir in layout.all() {
            assert!(dir.is_dir(), "{} should exist", dir.display());
        }

        // Second run is a no-op
        ensure_directories(&layout).unwrap();
    }

    #[test]
    fn test_keeps_existing_content() {
        let temp_dir = TempDir::new().unwrap();
        let layout = DirectoryLayout::under(temp_dir.path());
        std::fs::create_dir_all(&layout.source).unwrap();
        std::fs::write(layout.source.join("keep.png"), b"data").unwrap();

        ensure_directories(&layout).unwrap();
        assert!(layout.source.join("keep.png").exists());
    }

    #[test]
    fn test_file_in_the_way_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let layout = DirectoryLayout::under(temp_dir.path());
        std::fs::write(&layout.destination, b"not a directory").unwrap();

        let err = ensure_directories(&layout).unwrap_err();
        assert!(err.to_string().contains("create directory"));
    }
}
