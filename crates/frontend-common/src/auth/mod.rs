//! Authentication module

pub mod backend;
pub mod error;
pub mod error_messages;
pub mod machine;
pub mod snapshot;
pub mod state;

// Re-export commonly used items
pub use backend::{AuthBackend, CredentialResponse};
pub use error::{AuthError, LogoutReason};
pub use error_messages::{get_user_friendly_error, logout_message};
pub use machine::{AuthStateMachine, LoginOutcome, LogoutListener};
pub use snapshot::{AuthSnapshot, from_snapshot, to_snapshot};
pub use state::{AuthState, AuthStatus};
