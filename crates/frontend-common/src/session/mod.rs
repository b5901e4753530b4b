//! Cross-tab session coordination

#[cfg(target_arch = "wasm32")]
pub mod browser;
pub mod coordinator;
pub mod events;
pub mod monitor;
pub mod registry;

#[cfg(target_arch = "wasm32")]
pub use browser::BrowserEventSource;
pub use coordinator::SessionCoordinator;
pub use events::{ActivitySignal, EventSource, ManualEventSource, MonitorHooks};
pub use monitor::ActivityMonitor;
pub use registry::{ListenerId, SessionListener, SessionRegistry};
