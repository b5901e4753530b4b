//! DOM-backed event source

use super::events::{ActivitySignal, EventSource, MonitorHooks};
use crate::subscription::Subscription;
use gloo_events::{EventListener, EventListenerOptions};
use gloo_timers::callback::Interval;
use std::rc::Rc;
use std::time::Duration;
use web_sys::VisibilityState;

/// Interaction listeners on the document, an interval timer, and focus/visibility hooks
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserEventSource;

impl EventSource for BrowserEventSource {
    fn connect(&self, hooks: MonitorHooks, tick_interval: Duration) -> Vec<Subscription> {
        let window = gloo_utils::window();
        let document = gloo_utils::document();
        let mut subscriptions = Vec::with_capacity(ActivitySignal::ALL.len() + 3);

        // Capture phase so scrolls inside nested containers count too
        for signal in ActivitySignal::ALL {
            let on_activity = Rc::clone(&hooks.on_activity);
            let listener = EventListener::new_with_options(
                &document,
                signal.event_name(),
                EventListenerOptions::run_in_capture_phase(),
                move |_| on_activity(signal),
            );
            subscriptions.push(Subscription::hold(listener));
        }

        let millis = u32::try_from(tick_interval.as_millis()).unwrap_or(u32::MAX);
        let on_tick = Rc::clone(&hooks.on_tick);
        subscriptions.push(Subscription::hold(Interval::new(millis, move || on_tick())));

        let on_resume = Rc::clone(&hooks.on_resume);
        subscriptions.push(Subscription::hold(EventListener::new(
            &window,
            "focus",
            move |_| on_resume(),
        )));

        let on_resume = Rc::clone(&hooks.on_resume);
        let visibility_document = document.clone();
        subscriptions.push(Subscription::hold(EventListener::new(
            &document,
            "visibilitychange",
            move |_| {
                if visibility_document.visibility_state() == VisibilityState::Visible {
                    on_resume();
                }
            },
        )));

        subscriptions
    }
}
