//! JavaScript key-value bridge for WASM.
//!
//! Implements `KeyValueStore` over host storage (e.g. `localStorage` or a
//! preferences plugin) supplied as async JS callbacks.

use crate::fs_bridge::{call_js_async, js_err_message};

use async_trait::async_trait;
use inventory_core::kv::{KeyValueStore, KvError, Result};
use serde::Serialize;
use serde_json::Value;
use wasm_bindgen::prelude::*;

/// JavaScript key-value bridge.
///
/// `get(key)` resolves to the stored value or `null`/`undefined`. A string
/// result is parsed as JSON text, so `localStorage` can back it directly.
/// `set(key, value)` receives a plain JSON-compatible object.
#[wasm_bindgen]
pub struct JsKeyValueBridge {
    get_fn: js_sys::Function,
    set_fn: js_sys::Function,
}

#[wasm_bindgen]
impl JsKeyValueBridge {
    #[wasm_bindgen(constructor)]
    pub fn new(get_fn: js_sys::Function, set_fn: js_sys::Function) -> Self {
        Self { get_fn, set_fn }
    }
}

fn unavailable(err: JsValue) -> KvError {
    KvError::Unavailable(js_err_message(&err))
}

#[async_trait(?Send)]
impl KeyValueStore for JsKeyValueBridge {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let result = call_js_async(&self.get_fn, &[key.into()])
            .await
            .map_err(unavailable)?;

        if result.is_null() || result.is_undefined() {
            return Ok(None);
        }
        if let Some(text) = result.as_string() {
            return serde_json::from_str(&text)
                .map(Some)
                .map_err(|e| KvError::Codec(e.to_string()));
        }
        serde_wasm_bindgen::from_value(result)
            .map(Some)
            .map_err(|e| KvError::Codec(e.to_string()))
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let js_value = value
            .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
            .map_err(|e| KvError::Codec(e.to_string()))?;

        call_js_async(&self.set_fn, &[key.into(), js_value])
            .await
            .map_err(unavailable)?;
        Ok(())
    }
}
