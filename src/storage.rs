/// Key-value storage adapter for chrome.storage.local
///
/// Values are stored as JSON text under their key. Every accessor here fails
/// soft: read and decode errors degrade to the caller's default, write errors
/// are logged and swallowed.

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage access failed: {0}")]
    Access(String),

    #[error("invalid JSON for key {key}: {message}")]
    Codec { key: String, message: String },
}

/// Raw change callback: receives the new JSON text, or None when the key was removed
pub type RawChangeCallback = Box<dyn Fn(Option<String>)>;

/// Backend of the adapter. Implemented by the browser store and by an
/// in-memory store in tests.
#[async_trait(?Send)]
pub trait KeyValueStore {
    async fn read(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn write(&self, key: &str, raw: String) -> Result<(), StoreError>;

    /// Register a callback for changes to `key` in the local area
    fn watch(&self, key: &str, callback: RawChangeCallback);
}

fn decode<T: DeserializeOwned>(key: &str, raw: &str) -> Result<T, StoreError> {
    serde_json::from_str(raw).map_err(|e| StoreError::Codec {
        key: key.to_string(),
        message: e.to_string(),
    })
}

/// Read and decode `key`, returning `default` if it is absent or unreadable
pub async fn get_value<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str, default: T) -> T {
    match store.read(key).await {
        Ok(Some(raw)) if !raw.is_empty() => match decode(key, &raw) {
            Ok(value) => value,
            Err(e) => {
                log::error!("Error getting data from storage for key \"{}\": {}", key, e);
                default
            }
        },
        Ok(_) => default,
        Err(e) => {
            log::error!("Error getting data from storage for key \"{}\": {}", key, e);
            default
        }
    }
}

/// Encode and write `value` under `key`, logging on failure
pub async fn set_value<T: Serialize + ?Sized>(store: &dyn KeyValueStore, key: &str, value: &T) {
    let raw = match serde_json::to_string(value) {
        Ok(raw) => raw,
        Err(e) => {
            log::error!("Error encoding data for key \"{}\": {}", key, e);
            return;
        }
    };

    if let Err(e) = store.write(key, raw).await {
        log::error!("Error setting data to storage for key \"{}\": {}", key, e);
    }
}

/// Deliver the decoded new value of `key` on every change.
/// Removed or undecodable values are delivered as `default`.
pub fn subscribe_value<T, F>(store: &dyn KeyValueStore, key: &str, default: T, callback: F)
where
    T: DeserializeOwned + Clone + 'static,
    F: Fn(T) + 'static,
{
    let owned_key = key.to_string();
    store.watch(
        key,
        Box::new(move |raw: Option<String>| {
            let value = match raw.as_deref() {
                Some(raw) if !raw.is_empty() => decode(&owned_key, raw).unwrap_or_else(|e| {
                    log::error!("Error parsing changed data for key \"{}\": {}", owned_key, e);
                    default.clone()
                }),
                _ => default.clone(),
            };
            callback(value);
        }),
    );
}

#[cfg(test)]
pub use memory::MemoryStore;


#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        count: u32,
    }

    #[tokio::test]
    async fn test_get_missing_returns_default() {
        let store = MemoryStore::new();

        assert_eq!(get_value(&store, "missing", 7u32).await, 7);
        assert_eq!(get_value(&store, "missing", String::from("x")).await, "x");
    }

    #[tokio::test]
    async fn test_get_unparsable_returns_default() {
        let store = MemoryStore::new();
        store.insert_raw("flag", "{not json");
        store.insert_raw("count", "\"a string\"");
        store.insert_raw("empty", "");

        assert!(get_value(&store, "flag", true).await);
        assert_eq!(get_value(&store, "count", 3usize).await, 3);
        assert_eq!(get_value(&store, "empty", 1i32).await, 1);
    }

    #[tokio::test]
    async fn test_get_access_error_returns_default() {
        let store = MemoryStore::new();
        store.insert_raw("flag", "false");
        store.set_failing(true);

        assert!(get_value(&store, "flag", true).await);
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let store = MemoryStore::new();
        let sample = Sample {
            name: "chart".to_string(),
            count: 2,
        };

        set_value(&store, "sample", &sample).await;

        assert_eq!(store.raw("sample").unwrap(), r#"{"name":"chart","count":2}"#);
        let loaded = get_value(
            &store,
            "sample",
            Sample {
                name: String::new(),
                count: 0,
            },
        )
        .await;
        assert_eq!(loaded, sample);
    }

    #[tokio::test]
    async fn test_set_failure_is_swallowed() {
        let store = MemoryStore::new();
        store.set_failing(true);

        set_value(&store, "flag", &true).await;

        store.set_failing(false);
        assert_eq!(store.raw("flag"), None);
    }

    #[tokio::test]
    async fn test_subscribe_delivers_decoded_value() {
        let store = MemoryStore::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let sink = seen.clone();
        subscribe_value(&store, "minWords", 5usize, move |v| sink.borrow_mut().push(v));

        set_value(&store, "minWords", &9usize).await;
        set_value(&store, "other", &1usize).await;
        store.write("minWords", "oops".to_string()).await.unwrap();

        assert_eq!(*seen.borrow(), vec![9, 5]);
    }
}
