//! Key-value collaborator backed by JSON files.
//!
//! Each key is stored as `<dir>/<key>.json`. Writes go to a temporary file
//! first and are renamed into place, so a crash never leaves half a document.

use async_trait::async_trait;
use inventory_core::kv::{KeyValueStore, KvError, Result};
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Storage for persisted documents.
pub struct JsonFileKv {
    /// Directory holding one file per key.
    dir: PathBuf,
}

impl JsonFileKv {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
            && !key.starts_with('.');
        if !valid {
            return Err(KvError::Codec(format!("unsupported key {:?}", key)));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

fn unavailable(path: &Path, e: std::io::Error) -> KvError {
    KvError::Unavailable(format!("{}: {}", path.display(), e))
}

#[async_trait]
impl KeyValueStore for JsonFileKv {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let path = self.path_for(key)?;
        let contents = match fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(unavailable(&path, e)),
        };
        let value = serde_json::from_str(&contents)
            .map_err(|e| KvError::Codec(format!("{}: {}", path.display(), e)))?;
        Ok(Some(value))
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let path = self.path_for(key)?;

        // Ensure directory exists
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| unavailable(&self.dir, e))?;

        let contents =
            serde_json::to_string_pretty(&value).map_err(|e| KvError::Codec(e.to_string()))?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, contents)
            .await
            .map_err(|e| unavailable(&tmp, e))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| unavailable(&path, e))?;

        debug!("Persisted {}", path.display());
        Ok(())
    }
}
