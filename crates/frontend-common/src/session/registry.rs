//! Browser-wide active session slot
//!
//! One key in shared storage names the session that currently owns the
//! browser. Other tabs learn about changes through the storage change event;
//! the writing tab never does, so `publish` notifies local listeners itself.
//! `clear` deliberately does not: it runs inside logout, and a local
//! notification there would re-enter logout.

use crate::clock::Clock;
use crate::storage::{SharedStorage, StorageError, StorageEvent};
use crate::subscription::Subscription;
use portal_core::SessionId;
use std::cell::{Cell, RefCell};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::{Rc, Weak};
use tracing::{debug, error, warn};

/// Called with the new active id (`None` once cleared)
pub type SessionListener = Rc<dyn Fn(Option<&SessionId>)>;

/// Handle returned by [`SessionRegistry::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct RegistryInner {
    storage: Rc<dyn SharedStorage>,
    clock: Rc<dyn Clock>,
    key: String,
    listeners: RefCell<Vec<(ListenerId, SessionListener)>>,
    next_listener: Cell<u64>,
    watch: RefCell<Option<Subscription>>,
}

/// The active-session slot for one tab
///
/// Cloning yields another handle to the same registry.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Rc<RegistryInner>,
}

impl SessionRegistry {
    pub fn new(storage: Rc<dyn SharedStorage>, clock: Rc<dyn Clock>, key: impl Into<String>) -> Self {
        Self {
            inner: Rc::new(RegistryInner {
                storage,
                clock,
                key: key.into(),
                listeners: RefCell::new(Vec::new()),
                next_listener: Cell::new(0),
                watch: RefCell::new(None),
            }),
        }
    }

    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// Start relaying other tabs' changes of the slot to local listeners
    ///
    /// Idempotent. If change events cannot be observed the registry keeps
    /// working for this tab alone.
    pub fn start(&self) {
        if self.is_started() {
            return;
        }

        let weak: Weak<RegistryInner> = Rc::downgrade(&self.inner);
        let on_change = Rc::new(move |event: &StorageEvent| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if !event.is_for(&inner.key) {
                return;
            }
            let active = event.new_value.clone().map(SessionId::from);
            debug!(key = %inner.key, active = ?active, "Active session changed in another tab");
            SessionRegistry { inner }.notify(active.as_ref());
        });

        match self.inner.storage.watch(on_change) {
            Ok(watch) => *self.inner.watch.borrow_mut() = Some(watch),
            Err(err) => warn!(error = %err, "Cannot observe other tabs; single-tab mode"),
        }
    }

    /// Stop relaying cross-tab changes; local listeners stay registered
    pub fn stop(&self) {
        // Dropped outside the borrow so detach code may touch the registry
        let watch = self.inner.watch.borrow_mut().take();
        drop(watch);
    }

    pub fn is_started(&self) -> bool {
        self.inner.watch.borrow().is_some()
    }

    /// A fresh id: the clock in milliseconds plus a random suffix
    ///
    /// Collisions between tabs minting at the same instant are made negligible
    /// by the suffix rather than prevented by coordination.
    pub fn generate_id(&self) -> SessionId {
        let millis = self.inner.clock.now().timestamp_millis();
        let random = uuid::Uuid::new_v4().simple().to_string();
        SessionId::new(format!("{millis}-{}", &random[..12]))
    }

    /// Write `id` into the slot and tell this tab's listeners
    pub fn publish(&self, id: &SessionId) {
        if let Err(err) = self.inner.storage.set_item(&self.inner.key, id.as_str()) {
            warn!(error = %err, session_id = %id, "Failed to publish active session");
        }
        self.notify(Some(id));
    }

    /// Empty the slot; local listeners are not told
    pub fn clear(&self) {
        if let Err(err) = self.inner.storage.remove_item(&self.inner.key) {
            warn!(error = %err, "Failed to clear active session");
        }
    }

    /// The active id, or `None` if the slot is empty or unreadable
    pub fn read_active(&self) -> Option<SessionId> {
        self.try_read_active().unwrap_or_else(|err| {
            warn!(error = %err, "Failed to read active session");
            None
        })
    }

    /// The active id, distinguishing an empty slot from unreadable storage
    ///
    /// # Errors
    ///
    /// Returns the storage error if the slot cannot be read
    pub fn try_read_active(&self) -> Result<Option<SessionId>, StorageError> {
        Ok(self
            .inner
            .storage
            .get_item(&self.inner.key)?
            .map(SessionId::from))
    }

    /// Natively a panicking listener is logged and the rest still run. On
    /// `wasm32-unknown-unknown` panics abort and cannot be contained.
    pub fn subscribe(&self, listener: SessionListener) -> ListenerId {
        let id = ListenerId(self.inner.next_listener.get());
        self.inner.next_listener.set(id.0 + 1);
        self.inner.listeners.borrow_mut().push((id, listener));
        id
    }

    /// Returns whether the listener was registered
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.inner.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }

    /// Call every listener with `active`
    ///
    /// A panicking listener is skipped on native targets. On
    /// `wasm32-unknown-unknown` panics abort, so there the isolation does not
    /// hold and one panicking listener takes the tab down.
    fn notify(&self, active: Option<&SessionId>) {
        // Listeners may subscribe, unsubscribe or log out while we iterate
        let listeners: Vec<SessionListener> = self
            .inner
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();

        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(active))).is_err() {
                error!("Session listener panicked; continuing with the rest");
            }
        }
    }
}
