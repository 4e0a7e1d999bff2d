//! Transport and auth lifecycle: token and cookie persistence, the HTTP core
//! with 401 interception, and single-flight refresh.

pub mod connectivity;
pub mod cookie_jar;
pub mod events;
pub mod refresh;
pub mod retry;
pub mod token_store;

pub use connectivity::{ApiClient, CookieRefresher};
pub use cookie_jar::PersistentCookieJar;
pub use events::{AuthLostReason, AuthSignal, AuthStatus};
pub use refresh::{RefreshCoordinator, TokenRefresher};
pub use retry::RetryPolicy;
pub use token_store::{FileTokenStore, MemoryTokenStore, TokenStore};
