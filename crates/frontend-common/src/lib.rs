//! Browser session coordination for the portal
//!
//! A tab signs in through [`auth::AuthStateMachine`], keeps its session alive
//! through [`session::ActivityMonitor`], and gives way when another tab of the
//! same browser signs in through [`session::SessionRegistry`].
//! [`session::SessionCoordinator`] wires the three together.

pub mod auth;
pub mod clock;
pub mod config;
pub mod logging;
pub mod session;
pub mod spawner;
pub mod storage;
pub mod subscription;

pub use auth::{AuthBackend, AuthError, AuthState, AuthStateMachine, AuthStatus, LogoutReason};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::AuthConfig;
pub use logging::init_logging;
pub use session::{ActivityMonitor, SessionCoordinator, SessionRegistry};
pub use spawner::TaskSpawner;
pub use storage::{MemoryStorage, SharedStorage, StorageError};
pub use subscription::Subscription;
