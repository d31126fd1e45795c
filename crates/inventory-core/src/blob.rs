//! BlobStore: where attachment bodies live.
//!
//! Two backends, chosen once at startup:
//! - `Embedded` (web runtime) - bytes are handed back to the caller to inline into
//!   its own persisted record. Reading and removing are the caller's job.
//! - `Device` (native runtime) - bytes are base64 encoded and written through the
//!   native bridge filesystem under `inventory/{itemId}/{fileId}__{name}`.
//!
//! The bridge only carries strings reliably, so payloads cross it as base64 text.

use crate::fs::{FileSystem, FsError};
use crate::node::NodeId;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;
use tracing::{debug, info};

/// Directory (relative to the app-private data dir) holding attachment files.
pub const BLOB_ROOT: &str = "inventory";

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("{0} is not supported by the embedded blob backend")]
    Unsupported(&'static str),

    #[error("Blob filesystem error: {0}")]
    Fs(#[from] FsError),

    #[error("Stored blob is not valid base64: {0}")]
    Decode(String),
}

pub type Result<T> = std::result::Result<T, BlobError>;

/// Which backend a `BlobStore` routes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobBackend {
    Embedded,
    Device,
}

/// A request to store one attachment body.
#[derive(Debug, Clone)]
pub struct BlobWrite {
    pub item_id: NodeId,
    pub file_id: String,
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Where a written attachment ended up.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredBlob {
    /// The caller embeds these bytes itself
    Embedded {
        bytes: Vec<u8>,
        mime: String,
        size: u64,
    },
    /// Written to the device; `uri` is accepted by `read` and `remove`
    OnDevice { uri: String, mime: String, size: u64 },
}

impl StoredBlob {
    pub fn size(&self) -> u64 {
        match self {
            StoredBlob::Embedded { size, .. } | StoredBlob::OnDevice { size, .. } => *size,
        }
    }

    pub fn mime(&self) -> &str {
        match self {
            StoredBlob::Embedded { mime, .. } | StoredBlob::OnDevice { mime, .. } => mime,
        }
    }

    pub fn uri(&self) -> Option<&str> {
        match self {
            StoredBlob::OnDevice { uri, .. } => Some(uri),
            StoredBlob::Embedded { .. } => None,
        }
    }
}

/// Attachment body read back from the device.
#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    pub bytes: Vec<u8>,
    pub mime: String,
}

/// Stores, reads, and removes attachment bodies.
pub enum BlobStore<F: FileSystem> {
    Embedded,
    Device(F),
}

impl<F: FileSystem> BlobStore<F> {
    /// Pick the backend from what the runtime offers: a native filesystem
    /// bridge means device storage, otherwise bodies are embedded.
    pub fn detect(fs: Option<F>) -> Self {
        match fs {
            Some(fs) => {
                info!("Blob store using device filesystem backend");
                BlobStore::Device(fs)
            }
            None => {
                info!("Blob store using embedded backend");
                BlobStore::Embedded
            }
        }
    }

    pub fn backend(&self) -> BlobBackend {
        match self {
            BlobStore::Embedded => BlobBackend::Embedded,
            BlobStore::Device(_) => BlobBackend::Device,
        }
    }

    pub async fn write(&self, request: BlobWrite) -> Result<StoredBlob> {
        let size = request.bytes.len() as u64;
        match self {
            BlobStore::Embedded => Ok(StoredBlob::Embedded {
                bytes: request.bytes,
                mime: request.mime,
                size,
            }),
            BlobStore::Device(fs) => {
                let path = blob_path(&request.item_id, &request.file_id, &request.name);
                let encoded = STANDARD.encode(&request.bytes);
                let uri = fs.write_file(&path, &encoded, true).await?;
                debug!("Wrote blob {} ({} bytes)", uri, size);
                Ok(StoredBlob::OnDevice {
                    uri,
                    mime: request.mime,
                    size,
                })
            }
        }
    }

    pub async fn read(&self, uri: &str, mime: &str) -> Result<Blob> {
        let BlobStore::Device(fs) = self else {
            return Err(BlobError::Unsupported("read"));
        };
        let encoded = fs.read_file(uri).await?;
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| BlobError::Decode(e.to_string()))?;
        Ok(Blob {
            bytes,
            mime: mime.to_string(),
        })
    }

    /// Delete a stored body. Already-absent files count as removed.
    pub async fn remove(&self, uri: &str) -> Result<()> {
        let BlobStore::Device(fs) = self else {
            return Err(BlobError::Unsupported("remove"));
        };
        match fs.delete_file(uri).await {
            Ok(()) => {
                debug!("Removed blob {}", uri);
                Ok(())
            }
            Err(FsError::NotFound(_)) => {
                debug!("Blob {} already absent", uri);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Relative path of an attachment body: `inventory/{itemId}/{fileId}__{name}`.
pub fn blob_path(item_id: &NodeId, file_id: &str, name: &str) -> String {
    format!(
        "{}/{}/{}__{}",
        BLOB_ROOT,
        path_segment(item_id.as_str()),
        path_segment(file_id),
        path_segment(name)
    )
}

/// Keep a component inside its directory: no separators, no `..`.
fn path_segment(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}
