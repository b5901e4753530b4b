//! Stateless permission and role checks used by route guards
//!
//! Roles compare case-insensitively. Anything that is not in the static
//! table (a role or a permission name) yields `false`; these never error.

use super::permissions::Permission;
use super::roles::Role;

fn grants(role: Role, permission: &str) -> bool {
    permission
        .parse::<Permission>()
        .is_ok_and(|permission| role.grants(permission))
}

/// Whether `role` is granted `permission`
pub fn has_permission(role: &str, permission: &str) -> bool {
    Role::parse(role).is_some_and(|role| grants(role, permission))
}

/// Whether `role` is granted at least one of `permissions`
pub fn has_any_permission<P: AsRef<str>>(role: &str, permissions: &[P]) -> bool {
    Role::parse(role).is_some_and(|role| {
        permissions
            .iter()
            .any(|permission| grants(role, permission.as_ref()))
    })
}

/// Whether `role` is granted every one of `permissions`
///
/// An empty list is vacuously satisfied by any known role.
pub fn has_all_permissions<P: AsRef<str>>(role: &str, permissions: &[P]) -> bool {
    Role::parse(role).is_some_and(|role| {
        permissions
            .iter()
            .all(|permission| grants(role, permission.as_ref()))
    })
}

/// Whether `role` and `candidate` name the same known role
pub fn has_role(role: &str, candidate: &str) -> bool {
    match (Role::parse(role), Role::parse(candidate)) {
        (Some(role), Some(candidate)) => role == candidate,
        _ => false,
    }
}

/// Whether `role` matches any of `candidates`
pub fn has_any_role<R: AsRef<str>>(role: &str, candidates: &[R]) -> bool {
    candidates
        .iter()
        .any(|candidate| has_role(role, candidate.as_ref()))
}
