use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::user::User;
use crate::client::connectivity::{ApiClient, LOGIN_PATH, LOGOUT_PATH, ME_PATH, REVOKE_OTHERS_PATH, SESSIONS_PATH};
use crate::client::events::AuthLostReason;
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceInfo {
    #[serde(default)]
    pub browser: Option<String>,
    #[serde(default)]
    pub os: Option<String>,
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
}

/// One authenticated device/browser login.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub device_info: Option<DeviceInfo>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    pub last_activity: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub remember_me: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionList {
    pub sessions: Vec<Session>,
    #[serde(default)]
    pub current_session_id: Option<String>,
}

impl SessionList {
    pub fn current(&self) -> Option<&Session> {
        let id = self.current_session_id.as_deref()?;
        self.sessions.iter().find(|s| s.id == id)
    }

    pub fn is_current(&self, session: &Session) -> bool {
        self.current_session_id.as_deref() == Some(session.id.as_str())
    }

    pub fn others(&self) -> impl Iterator<Item = &Session> {
        self.sessions.iter().filter(move |s| !self.is_current(s))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub remember_me: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: User,
    pub token: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RevokeOthersResponse {
    #[serde(default)]
    revoked_count: u64,
}

/// Login, logout and session administration for the signed-in user.
///
/// Holds the in-memory principal. The principal is never persisted; after a
/// restart it is recovered with [`SessionManager::restore`].
#[derive(Clone)]
pub struct SessionManager {
    api: ApiClient,
    user: Arc<RwLock<Option<User>>>,
}

impl SessionManager {
    pub fn new(api: ApiClient) -> Self {
        let user = Arc::new(RwLock::new(None));
        // whoever reports the loss, the principal goes with the token
        let slot = Arc::clone(&user);
        api.signal().on_authentication_lost(move |_| {
            *slot.write() = None;
        });
        Self { api, user }
    }

    pub fn api(&self) -> &ApiClient { &self.api }

    pub fn current_user(&self) -> Option<User> { self.user.read().clone() }

    pub fn is_authenticated(&self) -> bool { self.api.current_token().is_some() }

    /// No automatic retry. A 4xx (401 included) is reported as
    /// `InvalidCredentials`; network and server errors pass through.
    pub async fn login(&self, email: &str, password: &str, remember_me: bool) -> ApiResult<User> {
        let req = LoginRequest { email: email.to_string(), password: password.to_string(), remember_me };
        let resp: LoginResponse = match self.api.post(LOGIN_PATH, &req).await {
            Ok(r) => r,
            Err(e @ (ApiError::Client { .. } | ApiError::NotFound { .. } | ApiError::AuthenticationFailure { .. })) => {
                info!(target: "taskdesk::session", "login rejected for {}", email);
                return Err(ApiError::InvalidCredentials { message: e.server_message().map(str::to_string) });
            }
            Err(e) => return Err(e),
        };
        if resp.token.is_empty() {
            return Err(ApiError::decode("login response carried an empty token"));
        }
        self.api.coordinator().install_token(&resp.token);
        *self.user.write() = Some(resp.user.clone());
        info!(target: "taskdesk::session", "signed in as {} (session={:?})", resp.user.email, resp.session_id);
        Ok(resp.user)
    }

    /// The remote call is advisory; local state is always cleared.
    pub async fn logout(&self) {
        if let Err(e) = self.api.post::<serde_json::Value, _>(LOGOUT_PATH, &serde_json::json!({})).await {
            warn!(target: "taskdesk::session", "logout request failed: {}", e);
        }
        *self.user.write() = None;
        self.api.coordinator().terminate(AuthLostReason::Logout);
    }

    pub async fn fetch_current_user(&self) -> ApiResult<User> {
        let user: User = self.api.get(ME_PATH).await?;
        *self.user.write() = Some(user.clone());
        Ok(user)
    }

    /// Re-establish the principal from a persisted token after a restart.
    pub async fn restore(&self) -> ApiResult<Option<User>> {
        if !self.is_authenticated() {
            return Ok(None);
        }
        self.fetch_current_user().await.map(Some)
    }

    pub async fn list_sessions(&self) -> ApiResult<SessionList> {
        self.api.get(SESSIONS_PATH).await
    }

    /// `NotFound` when the session is already gone.
    pub async fn revoke_session(&self, id: &str) -> ApiResult<()> {
        let path = format!("{}/{}", SESSIONS_PATH, urlencoding::encode(id));
        self.api.delete::<serde_json::Value>(&path).await?;
        info!(target: "taskdesk::session", "revoked session {}", id);
        Ok(())
    }

    pub async fn revoke_all_others(&self) -> ApiResult<u64> {
        let resp: RevokeOthersResponse = self.api.delete(REVOKE_OTHERS_PATH).await?;
        info!(target: "taskdesk::session", "revoked {} other session(s)", resp.revoked_count);
        Ok(resp.revoked_count)
    }
}
