//! Wires registry, state machine, and monitor together for one tab

use super::events::EventSource;
use super::monitor::ActivityMonitor;
use super::registry::SessionRegistry;
use crate::auth::{AuthBackend, AuthStateMachine};
use crate::clock::Clock;
use crate::spawner::TaskSpawner;
use crate::storage::SharedStorage;
use portal_core::{CoreResult, SessionConfig};
use std::rc::Rc;
use tracing::info;

/// Everything a tab needs for session handling, built from one config
#[derive(Clone)]
pub struct SessionCoordinator {
    registry: SessionRegistry,
    machine: AuthStateMachine,
    monitor: ActivityMonitor,
}

impl SessionCoordinator {
    /// # Errors
    ///
    /// Returns `InvalidConfig` if `config` fails validation.
    pub fn new(
        config: SessionConfig,
        storage: Rc<dyn SharedStorage>,
        clock: Rc<dyn Clock>,
        backend: Rc<dyn AuthBackend>,
        spawner: Rc<dyn TaskSpawner>,
        source: Rc<dyn EventSource>,
    ) -> CoreResult<Self> {
        config.validate()?;

        let registry = SessionRegistry::new(
            Rc::clone(&storage),
            Rc::clone(&clock),
            config.active_session_key.clone(),
        );
        let machine =
            AuthStateMachine::new(registry.clone(), storage, clock, backend, spawner, config);
        let monitor = ActivityMonitor::new(machine.clone(), source);

        Ok(Self {
            registry,
            machine,
            monitor,
        })
    }

    /// Coordinator over `localStorage`, the system clock, and DOM events
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if `config` fails validation.
    #[cfg(target_arch = "wasm32")]
    pub fn browser(config: SessionConfig, backend: Rc<dyn AuthBackend>) -> CoreResult<Self> {
        use super::browser::BrowserEventSource;
        use crate::clock::SystemClock;
        use crate::spawner::BrowserSpawner;
        use crate::storage::LocalStorage;

        Self::new(
            config,
            Rc::new(LocalStorage),
            Rc::new(SystemClock),
            backend,
            Rc::new(BrowserSpawner),
            Rc::new(BrowserEventSource),
        )
    }

    /// Page load: listen for other tabs, restore any persisted session, then
    /// start monitoring, which validates the restored session immediately
    pub fn start(&self) {
        self.registry.start();
        let restored = self.machine.rehydrate();
        self.monitor.start();
        info!(
            restored,
            authenticated = self.machine.is_authenticated(),
            "Session coordinator started"
        );
    }

    /// Teardown; leaves the session itself untouched
    pub fn stop(&self) {
        self.monitor.stop();
        self.registry.stop();
        info!("Session coordinator stopped");
    }

    pub fn machine(&self) -> &AuthStateMachine {
        &self.machine
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn monitor(&self) -> &ActivityMonitor {
        &self.monitor
    }
}
