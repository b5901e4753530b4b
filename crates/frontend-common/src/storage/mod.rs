//! Origin-scoped shared key/value storage
//!
//! The browser's `localStorage` is the only medium every tab of an origin can
//! observe. Writes are last-write-wins and change events are delivered to the
//! *other* tabs only, never back to the writer.

mod memory;
#[cfg(target_arch = "wasm32")]
mod web;

pub use memory::MemoryStorage;
#[cfg(target_arch = "wasm32")]
pub use web::LocalStorage;

use crate::subscription::Subscription;
use std::rc::Rc;
use thiserror::Error;

/// Storage failures; these never escape the session registry
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// Storage is disabled, blocked, or absent in this context
    #[error("Shared storage unavailable: {0}")]
    Unavailable(String),

    /// A read or write was attempted and rejected (e.g. quota exceeded)
    #[error("Shared storage operation failed: {0}")]
    Operation(String),
}

/// Change notification delivered to other tabs sharing the medium
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    /// Changed key; `None` when the whole medium was cleared
    pub key: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

impl StorageEvent {
    pub fn is_for(&self, key: &str) -> bool {
        self.key.as_deref().is_none_or(|changed| changed == key)
    }
}

pub type StorageCallback = Rc<dyn Fn(&StorageEvent)>;

/// Shared, origin-scoped storage as seen by one tab
pub trait SharedStorage {
    /// # Errors
    ///
    /// Returns an error if the medium cannot be read
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// # Errors
    ///
    /// Returns an error if the medium rejects the write
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns an error if the medium rejects the removal
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;

    /// Observe changes made by other tabs; the writer's own changes are not delivered
    ///
    /// # Errors
    ///
    /// Returns an error if change events cannot be observed in this context
    fn watch(&self, callback: StorageCallback) -> Result<Subscription, StorageError>;
}
