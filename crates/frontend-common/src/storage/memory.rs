use super::{SharedStorage, StorageCallback, StorageError, StorageEvent};
use crate::subscription::Subscription;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::{Rc, Weak};

/// Upper bound on events delivered by one `settle` call
const MAX_SETTLE_EVENTS: usize = 10_000;

struct Watcher {
    id: u64,
    tab: u64,
    callback: StorageCallback,
}

struct Medium {
    items: RefCell<HashMap<String, String>>,
    watchers: RefCell<Vec<Watcher>>,
    pending: RefCell<VecDeque<(u64, StorageEvent)>>,
    available: Cell<bool>,
    next_tab: Cell<u64>,
    next_watcher: Cell<u64>,
}

impl Medium {
    fn new() -> Self {
        Self {
            items: RefCell::new(HashMap::new()),
            watchers: RefCell::new(Vec::new()),
            pending: RefCell::new(VecDeque::new()),
            available: Cell::new(true),
            next_tab: Cell::new(1),
            next_watcher: Cell::new(0),
        }
    }

    fn check_available(&self) -> Result<(), StorageError> {
        if self.available.get() {
            Ok(())
        } else {
            Err(StorageError::Unavailable(
                "storage disabled for this origin".to_string(),
            ))
        }
    }
}

/// In-process shared storage with one handle per simulated tab
///
/// Handles created with [`MemoryStorage::open_tab`] share the same items.
/// Change events queue up until [`MemoryStorage::settle`] delivers them, which
/// models the asynchronous cross-tab dispatch of the browser.
#[derive(Clone)]
pub struct MemoryStorage {
    medium: Rc<Medium>,
    tab: u64,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            medium: Rc::new(Medium::new()),
            tab: 0,
        }
    }

    /// Another tab on the same origin
    #[must_use]
    pub fn open_tab(&self) -> Self {
        let tab = self.medium.next_tab.get();
        self.medium.next_tab.set(tab + 1);
        Self {
            medium: Rc::clone(&self.medium),
            tab,
        }
    }

    /// Simulate storage being disabled (or re-enabled) for every tab
    pub fn set_available(&self, available: bool) {
        self.medium.available.set(available);
    }

    pub fn pending_events(&self) -> usize {
        self.medium.pending.borrow().len()
    }

    /// Deliver queued change events to every tab except the writer's
    ///
    /// Events produced while delivering are delivered too. Returns the number
    /// of events dispatched.
    pub fn settle(&self) -> usize {
        let mut delivered = 0;
        while delivered < MAX_SETTLE_EVENTS {
            let next = self.medium.pending.borrow_mut().pop_front();
            let Some((origin, event)) = next else {
                break;
            };

            let targets: Vec<StorageCallback> = self
                .medium
                .watchers
                .borrow()
                .iter()
                .filter(|watcher| watcher.tab != origin)
                .map(|watcher| Rc::clone(&watcher.callback))
                .collect();

            for callback in targets {
                callback(&event);
            }
            delivered += 1;
        }

        if delivered == MAX_SETTLE_EVENTS {
            tracing::warn!(
                remaining = self.pending_events(),
                "Storage events did not settle"
            );
        }
        delivered
    }

    fn enqueue(&self, key: &str, old_value: Option<String>, new_value: Option<String>) {
        if old_value == new_value {
            return;
        }
        self.medium.pending.borrow_mut().push_back((
            self.tab,
            StorageEvent {
                key: Some(key.to_string()),
                old_value,
                new_value,
            },
        ));
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.medium.check_available()?;
        Ok(self.medium.items.borrow().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.medium.check_available()?;
        let old = self
            .medium
            .items
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        self.enqueue(key, old, Some(value.to_string()));
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.medium.check_available()?;
        let old = self.medium.items.borrow_mut().remove(key);
        self.enqueue(key, old, None);
        Ok(())
    }

    fn watch(&self, callback: StorageCallback) -> Result<Subscription, StorageError> {
        let id = self.medium.next_watcher.get();
        self.medium.next_watcher.set(id + 1);
        self.medium.watchers.borrow_mut().push(Watcher {
            id,
            tab: self.tab,
            callback,
        });

        let medium: Weak<Medium> = Rc::downgrade(&self.medium);
        Ok(Subscription::new(move || {
            if let Some(medium) = medium.upgrade() {
                medium.watchers.borrow_mut().retain(|watcher| watcher.id != id);
            }
        }))
    }
}
