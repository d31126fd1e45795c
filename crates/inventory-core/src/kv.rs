//! Key-value storage port.
//!
//! The inventory document lives under a single key in a generic asynchronous
//! key-value collaborator. Implementations:
//! - `InMemoryKv` - For testing
//! - `JsonFileKv` (in inventory-native) - One JSON file per key
//! - `JsKeyValueBridge` (in inventory-wasm) - Host preferences/storage via JS callbacks
//!
//! Uses `target_arch = "wasm32"` for conditional compilation instead of feature flags
//! to avoid Cargo's feature unification issues when building the workspace.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KvError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Storage codec error: {0}")]
    Codec(String),
}

pub type Result<T> = std::result::Result<T, KvError>;

/// Asynchronous get/set-by-key storage.
///
/// On native platforms, implementations must be `Send + Sync` for use across threads.
/// On WASM (wasm32), these bounds are relaxed since WASM is single-threaded.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg(not(target_arch = "wasm32"))]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, or `None` if nothing is stored
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Replace the value stored under `key`
    async fn set(&self, key: &str, value: Value) -> Result<()>;
}

/// Asynchronous get/set-by-key storage (WASM version without Send + Sync).
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg(target_arch = "wasm32")]
pub trait KeyValueStore {
    /// Read the value stored under `key`, or `None` if nothing is stored
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Replace the value stored under `key`
    async fn set(&self, key: &str, value: Value) -> Result<()>;
}

/// In-memory key-value store for testing
#[derive(Default)]
pub struct InMemoryKv {
    values: RwLock<HashMap<String, Value>>,
    offline: AtomicBool,
}

impl InMemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an unreachable collaborator. Every call fails with `Unavailable` while set.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Read a raw value without going through the async API
    pub fn peek(&self, key: &str) -> Option<Value> {
        self.values.read().unwrap().get(key).cloned()
    }

    /// Seed a raw value without going through the async API
    pub fn insert(&self, key: &str, value: Value) {
        self.values.write().unwrap().insert(key.to_string(), value);
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(KvError::Unavailable("in-memory store is offline".into()));
        }
        Ok(())
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl KeyValueStore for InMemoryKv {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        self.check_online()?;
        Ok(self.peek(key))
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.check_online()?;
        self.insert(key, value);
        Ok(())
    }
}

// Lets several stores share one collaborator (tests, multiple handles in one process)
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg(not(target_arch = "wasm32"))]
impl<T: KeyValueStore + Send + Sync> KeyValueStore for std::sync::Arc<T> {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        (**self).set(key, value).await
    }
}
