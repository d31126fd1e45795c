//! inventory-core: Shared Rust library for the inventory catalog engine.
//!
//! This crate provides the core functionality for:
//! - The folder/item tree and its persistence (`NodeStore`)
//! - Attachment body storage across web and native runtimes (`BlobStore`)
//! - Bounded-size preview generation (`generate_thumbnail`)
//! - KeyValueStore and FileSystem trait abstractions for the host collaborators

pub mod blob;
pub mod content_hash;
pub mod fs;
pub mod kv;
pub mod node;
pub mod store;
pub mod thumbnail;

pub use blob::{Blob, BlobBackend, BlobError, BlobStore, BlobWrite, StoredBlob, blob_path};
pub use content_hash::ContentHash;
pub use fs::{FileSystem, FsError, InMemoryFs};
pub use kv::{InMemoryKv, KeyValueStore, KvError};
pub use node::{
    Folder, ImageRef, InventoryState, Item, Node, NodeId, NodeKind, ROOT_ID, SCHEMA_VERSION,
    Thumb, Violation,
};
pub use store::{ItemUpdate, NodeStore, STATE_KEY, StoreError};
pub use thumbnail::{
    ThumbnailError, ThumbnailOptions, fit_within, generate_thumbnail, source_dimensions,
};
