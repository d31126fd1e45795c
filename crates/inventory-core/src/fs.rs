//! FileSystem trait abstraction for the device blob backend.
//!
//! Models the native bridge's filesystem plugin: every path is relative to the
//! application-private data directory and payloads are text (base64 for binary).
//!
//! Implementations:
//! - `InMemoryFs` - For testing
//! - `NativeFs` (in inventory-native) - Uses tokio::fs
//! - `JsFileSystemBridge` (in inventory-wasm) - Host filesystem plugin via JS callbacks
//!
//! Uses `target_arch = "wasm32"` for conditional compilation instead of feature flags
//! to avoid Cargo's feature unification issues when building the workspace.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FsError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("IO error: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, FsError>;

/// Platform-independent text filesystem.
///
/// On native platforms, implementations must be `Send + Sync` for use across threads.
/// On WASM (wasm32), these bounds are relaxed since WASM is single-threaded.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg(not(target_arch = "wasm32"))]
pub trait FileSystem: Send + Sync {
    /// Write `data` to `path`, returning a locator that `read_file`/`delete_file` accept.
    ///
    /// With `recursive` set, missing parent directories are created.
    async fn write_file(&self, path: &str, data: &str, recursive: bool) -> Result<String>;

    /// Read file contents
    async fn read_file(&self, path: &str) -> Result<String>;

    /// Delete a file. Fails with `NotFound` if it does not exist.
    async fn delete_file(&self, path: &str) -> Result<()>;
}

/// Platform-independent text filesystem (WASM version without Send + Sync).
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg(target_arch = "wasm32")]
pub trait FileSystem {
    /// Write `data` to `path`, returning a locator that `read_file`/`delete_file` accept.
    ///
    /// With `recursive` set, missing parent directories are created.
    async fn write_file(&self, path: &str, data: &str, recursive: bool) -> Result<String>;

    /// Read file contents
    async fn read_file(&self, path: &str) -> Result<String>;

    /// Delete a file. Fails with `NotFound` if it does not exist.
    async fn delete_file(&self, path: &str) -> Result<()>;
}

/// In-memory filesystem for testing
pub struct InMemoryFs {
    files: RwLock<HashMap<String, String>>,
    dirs: RwLock<HashSet<String>>,
}

impl InMemoryFs {
    pub fn new() -> Self {
        let mut dirs = HashSet::new();
        dirs.insert(String::new()); // Root directory
        Self {
            files: RwLock::new(HashMap::new()),
            dirs: RwLock::new(dirs),
        }
    }

    /// Create a directory and its parents
    pub fn mkdir(&self, path: &str) {
        let mut dirs = self.dirs.write().unwrap();
        let mut current = Self::normalize_path(path);
        while !current.is_empty() {
            let parent = Self::parent_path(&current);
            dirs.insert(current);
            current = parent;
        }
    }

    /// Number of stored files
    pub fn file_count(&self) -> usize {
        self.files.read().unwrap().len()
    }

    fn normalize_path(path: &str) -> String {
        path.trim_matches('/').to_string()
    }

    fn parent_path(path: &str) -> String {
        match path.rfind('/') {
            Some(pos) => path[..pos].to_string(),
            None => String::new(),
        }
    }
}

impl Default for InMemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl FileSystem for InMemoryFs {
    async fn write_file(&self, path: &str, data: &str, recursive: bool) -> Result<String> {
        let path = Self::normalize_path(path);
        if path.is_empty() {
            return Err(FsError::InvalidPath("empty path".into()));
        }

        let parent = Self::parent_path(&path);
        if recursive {
            self.mkdir(&parent);
        } else if !self.dirs.read().unwrap().contains(&parent) {
            return Err(FsError::NotFound(parent));
        }

        self.files
            .write()
            .unwrap()
            .insert(path.clone(), data.to_string());
        Ok(path)
    }

    async fn read_file(&self, path: &str) -> Result<String> {
        let path = Self::normalize_path(path);
        let files = self.files.read().unwrap();
        files
            .get(&path)
            .cloned()
            .ok_or_else(|| FsError::NotFound(path))
    }

    async fn delete_file(&self, path: &str) -> Result<()> {
        let path = Self::normalize_path(path);
        let mut files = self.files.write().unwrap();
        match files.remove(&path) {
            Some(_) => Ok(()),
            None => Err(FsError::NotFound(path)),
        }
    }
}

// Implement FileSystem for Arc<T> where T: FileSystem
// This allows tests to inspect a filesystem that a BlobStore owns
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg(not(target_arch = "wasm32"))]
impl<T: FileSystem + Send + Sync> FileSystem for std::sync::Arc<T> {
    async fn write_file(&self, path: &str, data: &str, recursive: bool) -> Result<String> {
        (**self).write_file(path, data, recursive).await
    }

    async fn read_file(&self, path: &str) -> Result<String> {
        (**self).read_file(path).await
    }

    async fn delete_file(&self, path: &str) -> Result<()> {
        (**self).delete_file(path).await
    }
}
