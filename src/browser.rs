/// Bridge to the chrome.* extension APIs

use crate::storage::{KeyValueStore, RawChangeCallback, StoreError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(catch, js_namespace = ["chrome", "storage", "local"], js_name = get)]
    async fn storage_local_get(keys: &str) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "storage", "local"], js_name = set)]
    async fn storage_local_set(items: &JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(js_namespace = ["chrome", "storage", "onChanged"], js_name = addListener)]
    fn storage_on_changed(listener: &js_sys::Function);

    #[wasm_bindgen(catch, js_namespace = ["chrome", "runtime"], js_name = sendMessage)]
    async fn runtime_send_message(message: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(js_namespace = ["chrome", "runtime", "onMessage"], js_name = addListener)]
    fn runtime_on_message(listener: &js_sys::Function);

    #[wasm_bindgen(js_namespace = ["chrome", "runtime", "onInstalled"], js_name = addListener)]
    fn runtime_on_installed(listener: &js_sys::Function);

    #[wasm_bindgen(js_namespace = ["chrome", "runtime", "onStartup"], js_name = addListener)]
    fn runtime_on_startup(listener: &js_sys::Function);
}

fn js_error(e: JsValue) -> String {
    e.as_string()
        .or_else(|| {
            js_sys::Reflect::get(&e, &JsValue::from_str("message"))
                .ok()
                .and_then(|m| m.as_string())
        })
        .unwrap_or_else(|| format!("{:?}", e))
}

/// Stored values are JSON text; anything else written by older builds is
/// re-encoded so it still decodes.
fn stored_text(value: &JsValue) -> Option<String> {
    if value.is_undefined() || value.is_null() {
        return None;
    }
    match value.as_string() {
        Some(text) => Some(text),
        None => js_sys::JSON::stringify(value).ok().and_then(|s| s.as_string()),
    }
}

/// chrome.storage.local
#[derive(Debug, Default, Clone, Copy)]
pub struct ChromeStore;

#[async_trait(?Send)]
impl KeyValueStore for ChromeStore {
    async fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        let result = storage_local_get(key)
            .await
            .map_err(|e| StoreError::Access(js_error(e)))?;
        let item = js_sys::Reflect::get(&result, &JsValue::from_str(key))
            .map_err(|e| StoreError::Access(js_error(e)))?;
        Ok(stored_text(&item))
    }

    async fn write(&self, key: &str, raw: String) -> Result<(), StoreError> {
        let items = js_sys::Object::new();
        js_sys::Reflect::set(&items, &JsValue::from_str(key), &JsValue::from_str(&raw))
            .map_err(|e| StoreError::Access(js_error(e)))?;
        storage_local_set(&items)
            .await
            .map_err(|e| StoreError::Access(js_error(e)))?;
        Ok(())
    }

    fn watch(&self, key: &str, callback: RawChangeCallback) {
        let key = key.to_string();
        let listener = Closure::wrap(Box::new(move |changes: JsValue, area: String| {
            if area != "local" {
                return;
            }
            let Ok(change) = js_sys::Reflect::get(&changes, &JsValue::from_str(&key)) else {
                return;
            };
            if change.is_undefined() {
                return;
            }
            let new_value = js_sys::Reflect::get(&change, &JsValue::from_str("newValue"))
                .ok()
                .and_then(|v| stored_text(&v));
            callback(new_value);
        }) as Box<dyn Fn(JsValue, String)>);

        storage_on_changed(listener.as_ref().unchecked_ref());
        // Listeners live as long as the page
        listener.forget();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    pub source: String,
}

/// Messages exchanged with the background script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RuntimeMessage {
    LogError { error: ErrorReport },
}

/// Send an error to the background log sink. Never fails.
pub fn report_error(source: &str, message: &str, stack: Option<String>) {
    log::error!("{}: {}", source, message);

    let report = RuntimeMessage::LogError {
        error: ErrorReport {
            message: message.to_string(),
            stack,
            source: source.to_string(),
        },
    };
    let Ok(message) = serde_wasm_bindgen::to_value(&report) else {
        return;
    };
    spawn_local(async move {
        if let Err(e) = runtime_send_message(message).await {
            log::warn!("Failed to report error: {}", js_error(e));
        }
    });
}

pub fn on_message(handler: impl Fn(RuntimeMessage) + 'static) {
    let listener = Closure::wrap(Box::new(move |message: JsValue| {
        match serde_wasm_bindgen::from_value::<RuntimeMessage>(message) {
            Ok(message) => handler(message),
            Err(e) => log::debug!("Ignoring runtime message: {}", e),
        }
    }) as Box<dyn Fn(JsValue)>);

    runtime_on_message(listener.as_ref().unchecked_ref());
    listener.forget();
}

/// Run `handler` on extension install and on browser startup
pub fn on_install_or_startup(handler: impl Fn(&'static str) + 'static) {
    let handler = std::rc::Rc::new(handler);

    let installed = handler.clone();
    let listener = Closure::wrap(Box::new(move |_: JsValue| installed("installed")) as Box<dyn Fn(JsValue)>);
    runtime_on_installed(listener.as_ref().unchecked_ref());
    listener.forget();

    let listener = Closure::wrap(Box::new(move |_: JsValue| handler("started")) as Box<dyn Fn(JsValue)>);
    runtime_on_startup(listener.as_ref().unchecked_ref());
    listener.forget();
}
