pub mod client;
pub mod config;
pub mod error;
pub mod identity;

pub use client::{ApiClient, AuthLostReason, AuthStatus, RetryPolicy};
pub use config::ClientConfig;
pub use error::{ApiError, ApiResult, ErrorKind};
pub use identity::{Session, SessionList, SessionManager, User};
