use super::{SharedStorage, StorageCallback, StorageError, StorageEvent};
use crate::subscription::Subscription;
use gloo_events::EventListener;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::Storage;

fn describe(err: &JsValue) -> String {
    err.as_string()
        .or_else(|| {
            err.dyn_ref::<js_sys::Error>()
                .map(|e| String::from(e.message()))
        })
        .unwrap_or_else(|| format!("{err:?}"))
}

/// `window.localStorage` plus the window's `storage` event
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalStorage;

impl LocalStorage {
    fn storage() -> Result<Storage, StorageError> {
        let window = web_sys::window()
            .ok_or_else(|| StorageError::Unavailable("no window".to_string()))?;
        window
            .local_storage()
            .map_err(|err| StorageError::Unavailable(describe(&err)))?
            .ok_or_else(|| StorageError::Unavailable("localStorage is disabled".to_string()))
    }
}

impl SharedStorage for LocalStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Self::storage()?
            .get_item(key)
            .map_err(|err| StorageError::Operation(describe(&err)))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        Self::storage()?
            .set_item(key, value)
            .map_err(|err| StorageError::Operation(describe(&err)))
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        Self::storage()?
            .remove_item(key)
            .map_err(|err| StorageError::Operation(describe(&err)))
    }

    fn watch(&self, callback: StorageCallback) -> Result<Subscription, StorageError> {
        let window = web_sys::window()
            .ok_or_else(|| StorageError::Unavailable("no window".to_string()))?;

        let listener = EventListener::new(&window, "storage", move |event| {
            if let Some(event) = event.dyn_ref::<web_sys::StorageEvent>() {
                callback(&StorageEvent {
                    key: event.key(),
                    old_value: event.old_value(),
                    new_value: event.new_value(),
                });
            }
        });
        Ok(Subscription::hold(listener))
    }
}
