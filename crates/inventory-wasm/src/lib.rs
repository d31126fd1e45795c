//! WASM bindings for inventory-core.
//!
//! Provides the bridge between the TypeScript UI and the Rust catalog engine.
//!
//! # Architecture
//!
//! The UI hands in a `JsKeyValueBridge` over its preferences storage and, on
//! native shells only, a `JsFileSystemBridge` over the device filesystem. The
//! filesystem's presence decides the blob backend.
//!
//! ```text
//! TypeScript                      WASM (Rust)
//! ──────────                      ───────────
//! preferences ──callbacks──> JsKeyValueBridge ──> NodeStore
//! filesystem? ──callbacks──> JsFileSystemBridge ──> BlobStore (device | embedded)
//!                                                      │
//!                                                      ▼
//!                                             WasmInventory (exposed to JS)
//! ```
//!
//! **Note**: This crate only compiles for `wasm32` targets. When building for native
//! targets (e.g., during `cargo check --workspace`), this crate provides no exports.

#[cfg(target_arch = "wasm32")]
mod fs_bridge;
#[cfg(target_arch = "wasm32")]
mod kv_bridge;

#[cfg(target_arch = "wasm32")]
pub use fs_bridge::JsFileSystemBridge;
#[cfg(target_arch = "wasm32")]
pub use kv_bridge::JsKeyValueBridge;

#[cfg(target_arch = "wasm32")]
mod wasm_impl {
    use super::*;
    use inventory_core::{
        BlobBackend, BlobStore, BlobWrite, ImageRef, ItemUpdate, NodeId, NodeStore, StoredBlob,
        ThumbnailOptions, generate_thumbnail,
    };
    use serde::Serialize;
    use std::cell::RefCell;
    use tracing::info;
    use tracing_subscriber::layer::SubscriberExt;
    use wasm_bindgen::prelude::*;

    // ========== Callback Logger Layer ==========

    // WASM is single-threaded, so the callback lives in thread-local storage
    thread_local! {
        static LOGGER_CALLBACK: RefCell<Option<js_sys::Function>> = const { RefCell::new(None) };
    }

    /// Forwards each tracing event to the JavaScript logger callback.
    struct JsCallbackLayer;

    impl<S> tracing_subscriber::Layer<S> for JsCallbackLayer
    where
        S: tracing::Subscriber,
    {
        fn on_event(
            &self,
            event: &tracing::Event<'_>,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            LOGGER_CALLBACK.with(|cb| {
                let Some(callback) = cb.borrow().clone() else {
                    return;
                };
                let metadata = event.metadata();

                let mut visitor = MessageVisitor::default();
                event.record(&mut visitor);

                let timestamp = web_time::SystemTime::now()
                    .duration_since(web_time::UNIX_EPOCH)
                    .map(|d| d.as_millis() as f64)
                    .unwrap_or(0.0);

                let js_event = js_sys::Object::new();
                let _ = set(&js_event, "level", &metadata.level().as_str().into());
                let _ = set(&js_event, "target", &metadata.target().into());
                let _ = set(&js_event, "message", &visitor.message.into());
                let _ = set(&js_event, "timestamp", &timestamp.into());

                let _ = callback.call1(&JsValue::NULL, &js_event);
            });
        }
    }

    /// Flattens an event's fields into one line, `message` first.
    #[derive(Default)]
    struct MessageVisitor {
        message: String,
    }

    impl MessageVisitor {
        fn push(&mut self, field: &tracing::field::Field, value: String) {
            if field.name() == "message" {
                if !self.message.is_empty() {
                    self.message.insert(0, ' ');
                }
                self.message.insert_str(0, &value);
            } else {
                if !self.message.is_empty() {
                    self.message.push(' ');
                }
                self.message.push_str(&format!("{}={}", field.name(), value));
            }
        }
    }

    impl tracing::field::Visit for MessageVisitor {
        fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
            self.push(field, format!("{:?}", value));
        }

        fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
            self.push(field, value.to_string());
        }
    }

    fn set(target: &js_sys::Object, key: &str, value: &JsValue) -> Result<bool, JsValue> {
        js_sys::Reflect::set(target, &key.into(), value)
    }

    fn js_err(e: impl std::fmt::Display) -> JsError {
        JsError::new(&e.to_string())
    }

    /// Serialize with plain objects for maps so the UI sees ordinary JSON shapes.
    fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsError> {
        value
            .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
            .map_err(js_err)
    }

    /// Initialize the WASM module (sets up panic hook and tracing).
    ///
    /// - `init()` - console-only logging
    /// - `init({ logger: (event) => {...} })` - callback + console logging
    ///
    /// The logger callback receives events with: `{ level, target, message, timestamp }`
    #[wasm_bindgen]
    pub fn init(config: Option<js_sys::Object>) {
        console_error_panic_hook::set_once();

        let callback = config
            .as_ref()
            .and_then(|cfg| js_sys::Reflect::get(cfg, &"logger".into()).ok())
            .and_then(|v| v.dyn_into::<js_sys::Function>().ok());

        let console_config = tracing_wasm::WASMLayerConfigBuilder::new()
            .set_max_level(tracing::Level::DEBUG)
            .build();

        match callback {
            Some(cb) => {
                LOGGER_CALLBACK.with(|cell| *cell.borrow_mut() = Some(cb));
                let subscriber = tracing_subscriber::registry()
                    .with(JsCallbackLayer)
                    .with(tracing_wasm::WASMLayer::new(console_config));
                tracing::subscriber::set_global_default(subscriber).ok();
            }
            None => tracing_wasm::set_as_global_default_with_config(console_config),
        }

        info!("inventory-wasm {} initialized", env!("CARGO_PKG_VERSION"));
    }

    /// Get version string
    #[wasm_bindgen]
    pub fn version() -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    /// Render a bounded-size JPEG preview of an encoded image.
    ///
    /// Returns `{ width, height, dataUrl }`. Defaults: 320px, quality 0.82.
    #[wasm_bindgen(js_name = createThumbnail)]
    pub fn create_thumbnail(
        bytes: &[u8],
        max_dimension: Option<u32>,
        quality: Option<f32>,
    ) -> Result<JsValue, JsError> {
        let defaults = ThumbnailOptions::default();
        let options = ThumbnailOptions {
            max_dimension: max_dimension.unwrap_or(defaults.max_dimension),
            quality: quality.unwrap_or(defaults.quality),
        };
        let thumb = generate_thumbnail(bytes, options).map_err(js_err)?;
        to_js(&thumb)
    }

    /// Build the metadata record for an attachment body (hash, size, dimensions).
    #[wasm_bindgen(js_name = describeImage)]
    pub fn describe_image(
        id: String,
        mime: String,
        bytes: &[u8],
        width: Option<u32>,
        height: Option<u32>,
        uri: Option<String>,
    ) -> Result<JsValue, JsError> {
        to_js(&ImageRef::describe(id, mime, bytes, width, height).with_uri(uri))
    }

    /// Catalog engine exposed to TypeScript.
    ///
    /// Every method returns a Promise; tree edits are serialized internally so
    /// overlapping calls from the UI never lose updates.
    #[wasm_bindgen]
    pub struct WasmInventory {
        nodes: NodeStore<JsKeyValueBridge>,
        blobs: BlobStore<JsFileSystemBridge>,
    }

    #[wasm_bindgen]
    impl WasmInventory {
        /// Open the catalog. Pass a filesystem bridge only on native shells.
        #[wasm_bindgen]
        pub async fn create(
            kv: JsKeyValueBridge,
            fs: Option<JsFileSystemBridge>,
        ) -> Result<WasmInventory, JsError> {
            let inventory = WasmInventory {
                nodes: NodeStore::new(kv),
                blobs: BlobStore::detect(fs),
            };
            inventory.nodes.ensure_ready().await.map_err(js_err)?;
            Ok(inventory)
        }

        /// Load the tree, creating and persisting a fresh one if none exists.
        #[wasm_bindgen(js_name = ensureReady)]
        pub async fn ensure_ready(&self) -> Result<JsValue, JsError> {
            let state = self.nodes.ensure_ready().await.map_err(js_err)?;
            to_js(&state)
        }

        /// Get a node by id, or `null`.
        #[wasm_bindgen(js_name = getNode)]
        pub async fn get_node(&self, id: String) -> Result<JsValue, JsError> {
            let node = self.nodes.get_node(&id.into()).await.map_err(js_err)?;
            to_js(&node)
        }

        /// Children of a folder in display order; empty for unknown ids and items.
        #[wasm_bindgen(js_name = getChildren)]
        pub async fn get_children(&self, parent_id: String) -> Result<JsValue, JsError> {
            let children = self
                .nodes
                .get_children(&parent_id.into())
                .await
                .map_err(js_err)?;
            to_js(&children)
        }

        #[wasm_bindgen(js_name = createFolder)]
        pub async fn create_folder(&self, parent_id: String, name: String) -> Result<JsValue, JsError> {
            let folder = self
                .nodes
                .create_folder(&parent_id.into(), &name)
                .await
                .map_err(js_err)?;
            to_js(&folder)
        }

        #[wasm_bindgen(js_name = createItem)]
        pub async fn create_item(&self, parent_id: String, name: String) -> Result<JsValue, JsError> {
            let item = self
                .nodes
                .create_item(&parent_id.into(), &name)
                .await
                .map_err(js_err)?;
            to_js(&item)
        }

        #[wasm_bindgen(js_name = renameNode)]
        pub async fn rename_node(&self, id: String, name: String) -> Result<(), JsError> {
            self.nodes
                .rename_node(&id.into(), &name)
                .await
                .map_err(js_err)
        }

        /// Patch an item's `{ tags, notes, thumbs, images }`. Omitted fields stay
        /// as they are; empty values clear them. Resolves to the item or `null`.
        #[wasm_bindgen(js_name = updateItem)]
        pub async fn update_item(&self, id: String, update: JsValue) -> Result<JsValue, JsError> {
            let update: ItemUpdate = serde_wasm_bindgen::from_value(update).map_err(js_err)?;
            let item = self
                .nodes
                .update_item(&id.into(), update)
                .await
                .map_err(js_err)?;
            to_js(&item)
        }

        /// Delete a node and its descendants. Resolves to the removed nodes,
        /// descendants first, so callers can release their attachments.
        #[wasm_bindgen(js_name = deleteNode)]
        pub async fn delete_node(&self, id: String) -> Result<JsValue, JsError> {
            let removed = self.nodes.delete_node(&id.into()).await.map_err(js_err)?;
            to_js(&removed)
        }

        #[wasm_bindgen(js_name = moveNode)]
        pub async fn move_node(
            &self,
            id: String,
            new_parent_id: String,
            index: Option<u32>,
        ) -> Result<(), JsError> {
            self.nodes
                .move_node(&id.into(), &new_parent_id.into(), index.map(|i| i as usize))
                .await
                .map_err(js_err)
        }

        /// `"embedded"` or `"device"`.
        #[wasm_bindgen(js_name = blobBackend)]
        pub fn blob_backend(&self) -> String {
            match self.blobs.backend() {
                BlobBackend::Embedded => "embedded".to_string(),
                BlobBackend::Device => "device".to_string(),
            }
        }

        /// Store an attachment body.
        ///
        /// Resolves to `{ backend: "embedded", bytes, mime, size }` (the caller
        /// inlines `bytes`) or `{ backend: "device", uri, mime, size }`.
        #[wasm_bindgen(js_name = writeBlob)]
        pub async fn write_blob(
            &self,
            item_id: String,
            file_id: String,
            name: String,
            mime: String,
            bytes: Vec<u8>,
        ) -> Result<JsValue, JsError> {
            let stored = self
                .blobs
                .write(BlobWrite {
                    item_id: NodeId::from(item_id),
                    file_id,
                    name,
                    mime,
                    bytes,
                })
                .await
                .map_err(js_err)?;

            let result = js_sys::Object::new();
            let location = match &stored {
                StoredBlob::Embedded { bytes, .. } => set(&result, "backend", &"embedded".into())
                    .and_then(|_| set(&result, "bytes", &js_sys::Uint8Array::from(bytes.as_slice()))),
                StoredBlob::OnDevice { uri, .. } => set(&result, "backend", &"device".into())
                    .and_then(|_| set(&result, "uri", &uri.as_str().into())),
            };
            location
                .and_then(|_| set(&result, "mime", &stored.mime().into()))
                .and_then(|_| set(&result, "size", &(stored.size() as f64).into()))
                .map_err(|_| JsError::new("could not build blob result"))?;
            Ok(result.into())
        }

        /// Read a device-stored body back as `{ bytes, mime }`.
        #[wasm_bindgen(js_name = readBlob)]
        pub async fn read_blob(&self, uri: String, mime: String) -> Result<JsValue, JsError> {
            let blob = self.blobs.read(&uri, &mime).await.map_err(js_err)?;

            let result = js_sys::Object::new();
            set(&result, "bytes", &js_sys::Uint8Array::from(blob.bytes.as_slice()))
                .and_then(|_| set(&result, "mime", &blob.mime.as_str().into()))
                .map_err(|_| JsError::new("could not build blob result"))?;
            Ok(result.into())
        }

        /// Remove a device-stored body. Missing files count as removed.
        #[wasm_bindgen(js_name = removeBlob)]
        pub async fn remove_blob(&self, uri: String) -> Result<(), JsError> {
            self.blobs.remove(&uri).await.map_err(js_err)
        }
    }
}

#[cfg(target_arch = "wasm32")]
pub use wasm_impl::*;
