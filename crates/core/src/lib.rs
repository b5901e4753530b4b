//! Portal core types and utilities
//!
//! Platform-neutral pieces shared by the browser session layer: the user and
//! session types, the static role table, and session configuration.

pub mod access;
pub mod config;
pub mod error;
pub mod types;

pub use access::{
    Permission, Role, has_all_permissions, has_any_permission, has_any_role, has_permission,
    has_role, normalize_role,
};
pub use crate::config::SessionConfig;
pub use error::{CoreError, CoreResult};
pub use types::{SessionId, User};
