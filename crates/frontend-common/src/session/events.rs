//! Interaction signals and the sources that deliver them

use crate::subscription::Subscription;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

/// User interactions that count as activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivitySignal {
    PointerDown,
    KeyDown,
    Scroll,
    TouchStart,
    Click,
}

impl ActivitySignal {
    pub const ALL: [Self; 5] = [
        Self::PointerDown,
        Self::KeyDown,
        Self::Scroll,
        Self::TouchStart,
        Self::Click,
    ];

    /// DOM event name
    pub const fn event_name(self) -> &'static str {
        match self {
            Self::PointerDown => "mousedown",
            Self::KeyDown => "keydown",
            Self::Scroll => "scroll",
            Self::TouchStart => "touchstart",
            Self::Click => "click",
        }
    }
}

/// Callbacks an event source drives
#[derive(Clone)]
pub struct MonitorHooks {
    pub on_activity: Rc<dyn Fn(ActivitySignal)>,
    pub on_tick: Rc<dyn Fn()>,
    /// The tab regained focus or became visible
    pub on_resume: Rc<dyn Fn()>,
}

/// Something that can deliver activity, a repeating tick, and resume points
pub trait EventSource {
    /// Attach `hooks`; dropping the returned subscriptions detaches them
    fn connect(&self, hooks: MonitorHooks, tick_interval: Duration) -> Vec<Subscription>;
}

#[derive(Default)]
struct ManualInner {
    connected: RefCell<Vec<(u64, MonitorHooks)>>,
    next: Cell<u64>,
    tick_interval: Cell<Option<Duration>>,
}

/// Event source driven by hand, for tests and hosts without a DOM
#[derive(Clone, Default)]
pub struct ManualEventSource {
    inner: Rc<ManualInner>,
}

impl ManualEventSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fire(&self, signal: ActivitySignal) {
        for hooks in self.hooks() {
            (hooks.on_activity)(signal);
        }
    }

    pub fn tick(&self) {
        for hooks in self.hooks() {
            (hooks.on_tick)();
        }
    }

    pub fn resume(&self) {
        for hooks in self.hooks() {
            (hooks.on_resume)();
        }
    }

    /// Number of live connections
    pub fn connection_count(&self) -> usize {
        self.inner.connected.borrow().len()
    }

    /// Interval requested by the most recent connection
    pub fn tick_interval(&self) -> Option<Duration> {
        self.inner.tick_interval.get()
    }

    fn hooks(&self) -> Vec<MonitorHooks> {
        self.inner
            .connected
            .borrow()
            .iter()
            .map(|(_, hooks)| hooks.clone())
            .collect()
    }
}

impl EventSource for ManualEventSource {
    fn connect(&self, hooks: MonitorHooks, tick_interval: Duration) -> Vec<Subscription> {
        let id = self.inner.next.get();
        self.inner.next.set(id + 1);
        self.inner.connected.borrow_mut().push((id, hooks));
        self.inner.tick_interval.set(Some(tick_interval));

        let inner = Rc::downgrade(&self.inner);
        vec![Subscription::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner.connected.borrow_mut().retain(|(hook_id, _)| *hook_id != id);
            }
        })]
    }
}
