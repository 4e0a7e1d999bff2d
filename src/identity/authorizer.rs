//! Client-side permission checks.
//!
//! Flat string membership against the user's role, no hierarchy and no
//! wildcards. These gate what the UI offers; the backend stays the authority.

use super::user::User;

/// Permission strings the dashboard gates on.
pub mod perms {
    pub const TASK_CREATE: &str = "task.create";
    pub const TASK_UPDATE: &str = "task.update";
    pub const TASK_DELETE: &str = "task.delete";
    pub const USER_CREATE: &str = "user.create";
    pub const USER_UPDATE: &str = "user.update";
    pub const USER_DELETE: &str = "user.delete";
    pub const USER_MANAGE_ROLES: &str = "user.manage_roles";
}

pub fn has_permission(user: &User, permission: &str) -> bool {
    user.role.permissions.iter().any(|p| p == permission)
}

/// Like [`has_permission`], false when nobody is signed in.
pub fn permits(user: Option<&User>, permission: &str) -> bool {
    user.map(|u| has_permission(u, permission)).unwrap_or(false)
}

pub fn has_any_permission(user: &User, permissions: &[&str]) -> bool {
    permissions.iter().any(|p| has_permission(user, p))
}

/// Vacuously true for an empty list.
pub fn has_all_permissions(user: &User, permissions: &[&str]) -> bool {
    permissions.iter().all(|p| has_permission(user, p))
}

pub fn can_manage_users(user: &User) -> bool {
    has_any_permission(user, &[perms::USER_CREATE, perms::USER_UPDATE, perms::USER_DELETE])
}

pub fn can_manage_roles(user: &User) -> bool {
    has_permission(user, perms::USER_MANAGE_ROLES)
}
