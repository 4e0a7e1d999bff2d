//! HTTP client core.
//!
//! Attaches the bearer token, decodes error bodies once, and routes 401s
//! through the [`RefreshCoordinator`]. The refresh-token cookie lives in the
//! reqwest cookie store shared by the ordinary client and [`CookieRefresher`];
//! with a token file configured that store is a [`PersistentCookieJar`].

use std::sync::Arc;

use futures_util::future::BoxFuture;
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, warn};

use super::cookie_jar::PersistentCookieJar;
use super::events::{AuthLostReason, AuthSignal, AuthStatus};
use super::refresh::{RefreshCoordinator, TokenRefresher};
use super::token_store::{FileTokenStore, MemoryTokenStore, TokenStore};
use crate::config::ClientConfig;
use crate::error::{extract_server_message, ApiError, ApiResult};

pub const LOGIN_PATH: &str = "/auth/login";
pub const REFRESH_PATH: &str = "/auth/refresh";
pub const LOGOUT_PATH: &str = "/auth/logout";
pub const ME_PATH: &str = "/auth/me";
pub const SESSIONS_PATH: &str = "/auth/sessions";
pub const REVOKE_OTHERS_PATH: &str = "/auth/sessions/revoke-others";

fn normalize_path(path: &str) -> &str {
    let p = path.split(['?', '#']).next().unwrap_or(path);
    p.trim_end_matches('/')
}

/// Login, refresh and logout never go through the refresh flow; a 401 on
/// them is terminal.
pub fn is_auth_exempt(path: &str) -> bool {
    let p = normalize_path(path);
    p == LOGIN_PATH || p == REFRESH_PATH || p == LOGOUT_PATH
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    token: String,
}

/// Calls `POST /auth/refresh`, authenticated by cookie only.
pub struct CookieRefresher {
    http: reqwest::Client,
    url: Url,
}

impl CookieRefresher {
    pub fn new(http: reqwest::Client, url: Url) -> Self { Self { http, url } }
}

impl TokenRefresher for CookieRefresher {
    fn refresh(&self) -> BoxFuture<'_, ApiResult<String>> {
        Box::pin(async move {
            let resp = self
                .http
                .post(self.url.clone())
                .json(&serde_json::json!({}))
                .send()
                .await?;
            let reply = Reply::read(resp).await?;
            let text = reply.into_result()?;
            let body: RefreshResponse = decode_body(&text)?;
            if body.token.is_empty() {
                return Err(ApiError::decode("refresh response carried an empty token"));
            }
            Ok(body.token)
        })
    }
}

struct Reply {
    status: StatusCode,
    body: String,
}

impl Reply {
    async fn read(resp: reqwest::Response) -> ApiResult<Self> {
        let status = resp.status();
        let body = resp.text().await.map_err(|e| ApiError::network(e.to_string()))?;
        Ok(Self { status, body })
    }

    fn message(&self) -> Option<String> { extract_server_message(&self.body) }

    fn into_result(self) -> ApiResult<String> {
        if self.status.is_success() {
            Ok(self.body)
        } else {
            let msg = self.message();
            Err(ApiError::from_status(self.status.as_u16(), msg))
        }
    }
}

/// Empty bodies decode as JSON `null`, so `()` and `Option<T>` accept 204s.
pub fn decode_body<T: DeserializeOwned>(text: &str) -> ApiResult<T> {
    let t = text.trim();
    let src = if t.is_empty() { "null" } else { t };
    serde_json::from_str(src).map_err(Into::into)
}

#[derive(Clone)]
pub struct ApiClient {
    config: Arc<ClientConfig>,
    http: reqwest::Client,
    coordinator: Arc<RefreshCoordinator>,
}

impl ApiClient {
    /// Token persistence follows the config: a file when `token_file` is set,
    /// memory otherwise.
    pub fn new(config: ClientConfig) -> ApiResult<Self> {
        let store: Arc<dyn TokenStore> = match config.token_file() {
            Some(p) => Arc::new(FileTokenStore::new(p.clone())),
            None => Arc::new(MemoryTokenStore::new()),
        };
        Self::with_token_store(config, store)
    }

    pub fn with_token_store(config: ClientConfig, tokens: Arc<dyn TokenStore>) -> ApiResult<Self> {
        let builder = match config.cookie_file() {
            Some(path) => reqwest::Client::builder().cookie_provider(Arc::new(PersistentCookieJar::load(path))),
            None => reqwest::Client::builder().cookie_store(true),
        };
        let http = builder
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ApiError::config(format!("failed to build HTTP client: {}", e)))?;
        let refresher = Arc::new(CookieRefresher::new(http.clone(), config.endpoint(REFRESH_PATH)?));
        let initial = if tokens.get().is_some() {
            AuthStatus::SignedIn
        } else {
            AuthStatus::SignedOut { reason: None }
        };
        let signal = Arc::new(AuthSignal::new(initial));
        let coordinator = Arc::new(RefreshCoordinator::new(tokens, signal, refresher));
        Ok(Self { config: Arc::new(config), http, coordinator })
    }

    pub fn config(&self) -> &ClientConfig { &self.config }
    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> { &self.coordinator }
    pub fn signal(&self) -> &Arc<AuthSignal> { self.coordinator.signal() }
    pub fn subscribe(&self) -> watch::Receiver<AuthStatus> { self.signal().subscribe() }
    pub fn current_token(&self) -> Option<String> { self.coordinator.current_token() }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        self.request::<T, ()>(Method::GET, path, None).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> ApiResult<T> {
        self.request(Method::POST, path, Some(body)).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> ApiResult<T> {
        self.request(Method::PUT, path, Some(body)).await
    }

    pub async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> ApiResult<T> {
        self.request(Method::PATCH, path, Some(body)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        self.request::<T, ()>(Method::DELETE, path, None).await
    }

    pub async fn request<T, B>(&self, method: Method, path: &str, body: Option<&B>) -> ApiResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = body.map(serde_json::to_value).transpose()?;
        let text = self.execute(method, path, body).await?;
        decode_body(&text)
    }

    /// Send with retries for transient failures. Auth endpoints get exactly
    /// one attempt.
    pub(crate) async fn execute(&self, method: Method, path: &str, body: Option<serde_json::Value>) -> ApiResult<String> {
        let url = self.config.endpoint(path)?;
        let exempt = is_auth_exempt(path);
        let max = if exempt { 1 } else { self.config.retry().max_attempts(&method) };
        // survives network retries so a request refreshes at most once
        let mut refreshed = false;
        let mut attempt = 1;
        loop {
            let res = self.send_intercepted(&method, &url, body.as_ref(), exempt, &mut refreshed).await;
            match res {
                Err(e) if e.is_retryable() && attempt < max => {
                    attempt += 1;
                    let delay = self.config.retry().delay_for(attempt);
                    debug!(target: "taskdesk::http", "{} {} failed ({}); attempt {}/{} in {:?}", method, path, e, attempt, max, delay);
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }

    async fn send_intercepted(
        &self,
        method: &Method,
        url: &Url,
        body: Option<&serde_json::Value>,
        exempt: bool,
        refreshed: &mut bool,
    ) -> ApiResult<String> {
        let token = self.coordinator.current_token();
        let reply = self.send_once(method, url, body, token.as_deref()).await?;
        if reply.status != StatusCode::UNAUTHORIZED {
            return reply.into_result();
        }

        if exempt {
            warn!(target: "taskdesk::http", "{} {} rejected with 401; signing out", method, url.path());
            self.coordinator.terminate(AuthLostReason::AuthEndpointRejected);
            return Err(ApiError::auth_failure(reply.message()));
        }
        if *refreshed {
            self.coordinator.terminate(AuthLostReason::RefreshedTokenRejected);
            return Err(ApiError::auth_failure(reply.message()));
        }

        *refreshed = true;
        let fresh = self.coordinator.token_after_unauthorized(token.as_deref()).await?;
        let retry = self.send_once(method, url, body, Some(&fresh)).await?;
        if retry.status == StatusCode::UNAUTHORIZED {
            warn!(target: "taskdesk::http", "{} {} still 401 after refresh", method, url.path());
            self.coordinator.terminate(AuthLostReason::RefreshedTokenRejected);
            return Err(ApiError::auth_failure(retry.message()));
        }
        retry.into_result()
    }

    async fn send_once(
        &self,
        method: &Method,
        url: &Url,
        body: Option<&serde_json::Value>,
        bearer: Option<&str>,
    ) -> ApiResult<Reply> {
        let mut req = self.http.request(method.clone(), url.clone());
        if let Some(t) = bearer {
            req = req.bearer_auth(t);
        }
        if let Some(b) = body {
            req = req.json(b);
        }
        let resp = req.send().await?;
        Reply::read(resp).await
    }
}
