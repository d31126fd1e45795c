//! Native filesystem implementation using tokio::fs.

use async_trait::async_trait;
use inventory_core::fs::{FileSystem, FsError, Result};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

/// Filesystem rooted at the application-private data directory
pub struct NativeFs {
    base_path: PathBuf,
}

impl NativeFs {
    /// A relative `base_path` is anchored at the current directory so the
    /// locators handed out by `write_file` resolve back to the same files.
    pub fn new(base_path: PathBuf) -> Self {
        let base_path = std::path::absolute(&base_path).unwrap_or(base_path);
        Self { base_path }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Resolve a relative path (or a locator this filesystem handed out) to a
    /// location inside the base directory.
    fn full_path(&self, path: &str) -> Result<PathBuf> {
        let candidate = Path::new(path);
        let relative = if candidate.is_absolute() {
            candidate
                .strip_prefix(&self.base_path)
                .map_err(|_| FsError::InvalidPath(path.to_string()))?
        } else {
            candidate
        };

        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(FsError::InvalidPath(path.to_string()));
        }
        if relative.as_os_str().is_empty() {
            return Err(FsError::InvalidPath(path.to_string()));
        }
        Ok(self.base_path.join(relative))
    }
}

fn io_err(path: &Path, e: std::io::Error) -> FsError {
    if e.kind() == ErrorKind::NotFound {
        FsError::NotFound(path.display().to_string())
    } else {
        FsError::Io(format!("{}: {}", path.display(), e))
    }
}

#[async_trait]
impl FileSystem for NativeFs {
    async fn write_file(&self, path: &str, data: &str, recursive: bool) -> Result<String> {
        let full_path = self.full_path(path)?;

        // Create parent directories if requested
        if recursive {
            if let Some(parent) = full_path.parent() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| io_err(parent, e))?;
            }
        }

        fs::write(&full_path, data)
            .await
            .map_err(|e| io_err(&full_path, e))?;
        Ok(full_path.to_string_lossy().to_string())
    }

    async fn read_file(&self, path: &str) -> Result<String> {
        let full_path = self.full_path(path)?;
        fs::read_to_string(&full_path)
            .await
            .map_err(|e| io_err(&full_path, e))
    }

    async fn delete_file(&self, path: &str) -> Result<()> {
        let full_path = self.full_path(path)?;
        fs::remove_file(&full_path)
            .await
            .map_err(|e| io_err(&full_path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_returns_absolute_locator() {
        let dir = TempDir::new().unwrap();
        let fs = NativeFs::new(dir.path().to_path_buf());

        let uri = fs.write_file("inventory/a/b.txt", "aGk=", true).await.unwrap();
        assert_eq!(PathBuf::from(&uri), dir.path().join("inventory/a/b.txt"));

        // Both the locator and the relative path read back
        assert_eq!(fs.read_file(&uri).await.unwrap(), "aGk=");
        assert_eq!(fs.read_file("inventory/a/b.txt").await.unwrap(), "aGk=");
    }

    #[test]
    fn test_relative_base_is_anchored() {
        let fs = NativeFs::new(PathBuf::from("data"));

        assert!(fs.base_path().is_absolute());
        assert_eq!(fs.base_path(), std::env::current_dir().unwrap().join("data"));
    }

    #[tokio::test]
    async fn test_non_recursive_write_needs_parent() {
        let dir = TempDir::new().unwrap();
        let fs = NativeFs::new(dir.path().to_path_buf());

        let err = fs.write_file("missing/file.txt", "x", false).await.unwrap_err();
        assert!(matches!(err, FsError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let fs = NativeFs::new(dir.path().to_path_buf());

        let err = fs.delete_file("nope.txt").await.unwrap_err();
        assert!(matches!(err, FsError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_paths_cannot_leave_base() {
        let dir = TempDir::new().unwrap();
        let fs = NativeFs::new(dir.path().join("data"));

        for path in ["../outside.txt", "/etc/passwd", "a/../../b", ""] {
            assert!(
                matches!(fs.read_file(path).await, Err(FsError::InvalidPath(_))),
                "{:?} should be rejected",
                path
            );
        }
    }
}
