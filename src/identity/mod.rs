//! Signed-in principal, session administration and client-side permission checks.
//! Keep the public surface thin and split implementation across sub-modules.

mod user;
mod session;
pub mod authorizer;

pub use user::{Role, User};
pub use session::{DeviceInfo, LoginRequest, LoginResponse, Session, SessionList, SessionManager};
pub use authorizer::{
    can_manage_roles, can_manage_users, has_all_permissions, has_any_permission, has_permission, permits, perms,
};
