//! Role-based access control
//!
//! A static role → permission table and pure lookups over it. Nothing here
//! holds state; unknown roles and unknown permissions resolve to `false`.

pub mod permissions;
pub mod rbac;
pub mod roles;

pub use permissions::{Permission, UnknownPermission};
pub use rbac::{has_all_permissions, has_any_permission, has_any_role, has_permission, has_role};
pub use roles::{Role, UnknownRole, normalize_role};
