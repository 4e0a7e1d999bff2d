//! Client configuration.
//!
//! The API base URL is mandatory and supplied from outside; there is no
//! fallback guessing. A missing or malformed URL is reported at startup.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;

use crate::client::retry::RetryPolicy;
use crate::error::{ApiError, ApiResult};

pub const ENV_API_URL: &str = "TASKDESK_API_URL";
pub const ENV_HTTP_TIMEOUT_SECS: &str = "TASKDESK_HTTP_TIMEOUT_SECS";
pub const ENV_TOKEN_FILE: &str = "TASKDESK_TOKEN_FILE";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub(crate) base_url: Url,
    pub(crate) timeout: Duration,
    pub(crate) token_file: Option<PathBuf>,
    pub(crate) retry: RetryPolicy,
    pub(crate) user_agent: String,
}

impl ClientConfig {
    pub fn new(base_url: &str) -> ApiResult<Self> {
        let url = Url::parse(base_url)
            .map_err(|e| ApiError::config(format!("invalid API base URL '{}': {}", base_url, e)))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ApiError::config(format!("API base URL must be http(s): {}", base_url)));
        }
        if url.cannot_be_a_base() || url.host_str().is_none() {
            return Err(ApiError::config(format!("API base URL has no host: {}", base_url)));
        }
        Ok(Self {
            base_url: url,
            timeout: DEFAULT_TIMEOUT,
            token_file: None,
            retry: RetryPolicy::default(),
            user_agent: format!("taskdesk/{}", env!("CARGO_PKG_VERSION")),
        })
    }

    /// Build from `TASKDESK_*` environment variables.
    pub fn from_env() -> ApiResult<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> ApiResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base = lookup(ENV_API_URL)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ApiError::config(format!("{} is not set", ENV_API_URL)))?;
        let mut cfg = Self::new(base.trim())?;
        if let Some(raw) = lookup(ENV_HTTP_TIMEOUT_SECS) {
            let secs: u64 = raw
                .trim()
                .parse()
                .map_err(|_| ApiError::config(format!("{} must be a number of seconds, got '{}'", ENV_HTTP_TIMEOUT_SECS, raw)))?;
            cfg.timeout = Duration::from_secs(secs);
        }
        if let Some(path) = lookup(ENV_TOKEN_FILE).filter(|v| !v.trim().is_empty()) {
            cfg.token_file = Some(PathBuf::from(path));
        }
        Ok(cfg)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_token_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_file = Some(path.into());
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = ua.into();
        self
    }

    pub fn base_url(&self) -> &Url { &self.base_url }
    pub fn timeout(&self) -> Duration { self.timeout }
    pub fn token_file(&self) -> Option<&PathBuf> { self.token_file.as_ref() }

    /// Cookie jar file kept beside the token file (`storage.json` gives
    /// `storage.cookies.json`). None when tokens live in memory only.
    pub fn cookie_file(&self) -> Option<PathBuf> {
        self.token_file.as_ref().map(|p| p.with_extension("cookies.json"))
    }
    pub fn retry(&self) -> &RetryPolicy { &self.retry }

    /// Join an API path onto the base URL, keeping any base path prefix
    /// (`http://h/api` + `/auth/me` gives `http://h/api/auth/me`).
    pub fn endpoint(&self, path: &str) -> ApiResult<Url> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Url::parse(&format!("{}/{}", base, path))
            .map_err(|e| ApiError::config(format!("bad endpoint path '{}': {}", path, e)))
    }
}
