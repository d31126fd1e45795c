//! inventory-native: Native host for the inventory catalog.
//!
//! Wires the core node and blob stores to local storage and exposes the
//! pieces the `inventory` binary and integration tests build on.

pub mod catalog;
pub mod config;
pub mod json_kv;
pub mod native_fs;

pub use catalog::{Catalog, CatalogError, NewAttachment, NewItem};
pub use config::{Config, ConfigError};
pub use json_kv::JsonFileKv;
pub use native_fs::NativeFs;
