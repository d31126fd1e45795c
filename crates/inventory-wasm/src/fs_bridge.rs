//! JavaScript filesystem bridge for WASM.
//!
//! Implements the `FileSystem` trait by calling JavaScript callback functions
//! provided by the native shell (e.g. a Capacitor `Filesystem` plugin rooted at
//! the app-private data directory). Each callback is an async JS function that
//! returns a Promise, which we convert to a Rust Future.

use async_trait::async_trait;
use inventory_core::fs::{FileSystem, FsError, Result};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

/// JavaScript filesystem bridge.
///
/// File contents cross the bridge as strings (base64 text for attachment bodies).
///
/// # Example (TypeScript side)
///
/// ```typescript
/// const bridge = new JsFileSystemBridge(
///   async (path, data, recursive) =>
///     (await Filesystem.writeFile({ path, data, recursive, directory: Directory.Data })).uri,
///   async (path) => (await Filesystem.readFile({ path, directory: Directory.Data })).data,
///   (path) => Filesystem.deleteFile({ path, directory: Directory.Data }),
/// );
/// ```
#[wasm_bindgen]
pub struct JsFileSystemBridge {
    write_fn: js_sys::Function,
    read_fn: js_sys::Function,
    delete_fn: js_sys::Function,
}

#[wasm_bindgen]
impl JsFileSystemBridge {
    /// Create a new filesystem bridge with JS callback functions.
    ///
    /// All callbacks should be async functions (returning Promises).
    #[wasm_bindgen(constructor)]
    pub fn new(
        write_fn: js_sys::Function,
        read_fn: js_sys::Function,
        delete_fn: js_sys::Function,
    ) -> Self {
        Self {
            write_fn,
            read_fn,
            delete_fn,
        }
    }
}

/// Helper to call a JS function and await its Promise result.
pub(crate) async fn call_js_async(
    func: &js_sys::Function,
    args: &[JsValue],
) -> std::result::Result<JsValue, JsValue> {
    let js_args = js_sys::Array::new();
    for arg in args {
        js_args.push(arg);
    }

    // Call the function - it returns a Promise
    let promise = func.apply(&JsValue::NULL, &js_args)?;

    JsFuture::from(js_sys::Promise::from(promise)).await
}

/// Best-effort text of a thrown JS value.
pub(crate) fn js_err_message(err: &JsValue) -> String {
    err.as_string()
        .or_else(|| {
            js_sys::Reflect::get(err, &"message".into())
                .ok()
                .and_then(|v| v.as_string())
        })
        .unwrap_or_else(|| format!("{:?}", err))
}

/// Convert a JS error to our FsError type.
fn js_err_to_fs_err(err: JsValue) -> FsError {
    let msg = js_err_message(&err);

    // Plugins report missing files in their own words
    let lower = msg.to_lowercase();
    if lower.contains("not found") || lower.contains("does not exist") || msg.contains("ENOENT")
    {
        FsError::NotFound(msg)
    } else {
        FsError::Io(msg)
    }
}

#[async_trait(?Send)]
impl FileSystem for JsFileSystemBridge {
    async fn write_file(&self, path: &str, data: &str, recursive: bool) -> Result<String> {
        let result = call_js_async(
            &self.write_fn,
            &[path.into(), data.into(), JsValue::from_bool(recursive)],
        )
        .await
        .map_err(js_err_to_fs_err)?;

        // Some hosts resolve to nothing; the relative path still locates the file
        Ok(result.as_string().unwrap_or_else(|| path.to_string()))
    }

    async fn read_file(&self, path: &str) -> Result<String> {
        let result = call_js_async(&self.read_fn, &[path.into()])
            .await
            .map_err(js_err_to_fs_err)?;

        result
            .as_string()
            .ok_or_else(|| FsError::Io(format!("read of {} did not return text", path)))
    }

    async fn delete_file(&self, path: &str) -> Result<()> {
        call_js_async(&self.delete_fn, &[path.into()])
            .await
            .map_err(js_err_to_fs_err)?;

        Ok(())
    }
}
