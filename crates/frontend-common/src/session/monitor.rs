//! Activity monitor: the time-driven half of the auth state machine
//!
//! Interaction signals push the expiry out, a repeating tick checks it, and
//! resume points (focus, visibility, page load, another tab changing the
//! active session) check that this tab still owns the session.

use super::events::{ActivitySignal, EventSource, MonitorHooks};
use super::registry::ListenerId;
use crate::auth::{AuthStateMachine, AuthStatus};
use crate::subscription::Subscription;
use portal_core::SessionId;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;
use tracing::{debug, info, trace};

struct Running {
    subscriptions: Vec<Subscription>,
    registry_listener: ListenerId,
}

struct MonitorInner {
    machine: AuthStateMachine,
    source: Rc<dyn EventSource>,
    tick_interval: Duration,
    running: RefCell<Option<Running>>,
}

#[derive(Clone)]
pub struct ActivityMonitor {
    inner: Rc<MonitorInner>,
}

impl ActivityMonitor {
    /// Monitor `machine`, ticking at the machine's configured check interval
    pub fn new(machine: AuthStateMachine, source: Rc<dyn EventSource>) -> Self {
        let tick_interval = machine.config().check_interval();
        Self::with_interval(machine, source, tick_interval)
    }

    pub fn with_interval(
        machine: AuthStateMachine,
        source: Rc<dyn EventSource>,
        tick_interval: Duration,
    ) -> Self {
        Self {
            inner: Rc::new(MonitorInner {
                machine,
                source,
                tick_interval,
                running: RefCell::new(None),
            }),
        }
    }

    pub fn machine(&self) -> &AuthStateMachine {
        &self.inner.machine
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.borrow().is_some()
    }

    /// Attach listeners and the tick, then validate once for the page load
    ///
    /// Calling `start` again while running does nothing.
    pub fn start(&self) {
        if self.is_running() {
            debug!("Activity monitor already running");
            return;
        }

        let weak = Rc::downgrade(&self.inner);
        let hooks = MonitorHooks {
            on_activity: Rc::new({
                let weak = weak.clone();
                move |signal: ActivitySignal| {
                    if let Some(monitor) = Self::upgrade(&weak) {
                        monitor.record_activity(signal);
                    }
                }
            }),
            on_tick: Rc::new({
                let weak = weak.clone();
                move || {
                    if let Some(monitor) = Self::upgrade(&weak) {
                        monitor.tick();
                    }
                }
            }),
            on_resume: Rc::new({
                let weak = weak.clone();
                move || {
                    if let Some(monitor) = Self::upgrade(&weak) {
                        monitor.resume();
                    }
                }
            }),
        };

        let subscriptions = self.inner.source.connect(hooks, self.inner.tick_interval);
        let registry_listener =
            self.inner
                .machine
                .registry()
                .subscribe(Rc::new(move |active: Option<&SessionId>| {
                    if let Some(monitor) = Self::upgrade(&weak) {
                        trace!(active = ?active, "Active session changed");
                        monitor.resume();
                    }
                }));

        *self.inner.running.borrow_mut() = Some(Running {
            subscriptions,
            registry_listener,
        });
        info!(interval_ms = self.inner.tick_interval.as_millis(), "Activity monitor started");

        self.resume();
    }

    /// Detach every listener and the tick
    pub fn stop(&self) {
        let running = self.inner.running.borrow_mut().take();
        if let Some(running) = running {
            self.inner
                .machine
                .registry()
                .unsubscribe(running.registry_listener);
            drop(running.subscriptions);
            info!("Activity monitor stopped");
        }
    }

    /// Extend the session for an interaction; ignored unless authenticated
    ///
    /// Ownership is checked first, so a tab that was replaced while it missed
    /// the change event signs out instead of extending a stale session.
    pub fn record_activity(&self, signal: ActivitySignal) -> bool {
        if self.inner.machine.status() != AuthStatus::Authenticated {
            return false;
        }
        trace!(signal = signal.event_name(), "Activity");
        self.inner.machine.validate_session() && self.inner.machine.extend_activity()
    }

    /// Periodic check of expiry, then of ownership; `false` means the session is over
    ///
    /// The ownership check is the backstop for cross-tab change events this
    /// tab never received.
    pub fn tick(&self) -> bool {
        self.inner.machine.check_session() && self.inner.machine.validate_session()
    }

    /// Cross-tab ownership check; `false` means this tab has no session
    pub fn resume(&self) -> bool {
        self.inner.machine.validate_session()
    }

    fn upgrade(weak: &Weak<MonitorInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }
}

impl Drop for MonitorInner {
    fn drop(&mut self) {
        if let Some(running) = self.running.get_mut().take() {
            self.machine.registry().unsubscribe(running.registry_listener);
        }
    }
}
