//! Single-flight access token refresh.
//!
//! At most one refresh call is in flight per coordinator. The first request to
//! see a 401 while idle becomes the leader and starts the refresh; every other
//! 401 that arrives meanwhile parks a oneshot sender in the queue. When the
//! refresh settles the queue is drained in FIFO order, then the leader is
//! released, all with the same outcome.
//!
//! The `refreshing` flag, the queue and every token write share one mutex so
//! "check idle, else enqueue" is atomic. Every token write outside the refresh
//! path (login, logout, termination) bumps a generation counter; a refresh
//! that started under an older generation settles without touching the store.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::events::{AuthLostReason, AuthSignal};
use super::token_store::TokenStore;
use crate::error::{ApiError, ApiResult};

/// Obtains a new access token through the refresh side channel (cookie),
/// never through the expired bearer token.
pub trait TokenRefresher: Send + Sync {
    fn refresh(&self) -> BoxFuture<'_, ApiResult<String>>;
}

type Waiter = oneshot::Sender<ApiResult<String>>;

#[derive(Default)]
struct RefreshState {
    refreshing: bool,
    queue: Vec<Waiter>,
    leader: Option<Waiter>,
    generation: u64,
    /// generation the in-flight refresh was started under
    started_at: u64,
}

pub struct RefreshCoordinator {
    state: Mutex<RefreshState>,
    tokens: Arc<dyn TokenStore>,
    signal: Arc<AuthSignal>,
    refresher: Arc<dyn TokenRefresher>,
    refreshes: AtomicU64,
}

impl RefreshCoordinator {
    pub fn new(
        tokens: Arc<dyn TokenStore>,
        signal: Arc<AuthSignal>,
        refresher: Arc<dyn TokenRefresher>,
    ) -> Self {
        Self {
            state: Mutex::new(RefreshState::default()),
            tokens,
            signal,
            refresher,
            refreshes: AtomicU64::new(0),
        }
    }

    pub fn signal(&self) -> &Arc<AuthSignal> { &self.signal }

    pub fn current_token(&self) -> Option<String> {
        let _st = self.state.lock();
        self.tokens.get()
    }

    /// Store a token obtained outside the refresh path (login).
    pub fn install_token(&self, token: &str) {
        {
            let mut st = self.state.lock();
            st.generation += 1;
            self.tokens.set(token);
        }
        self.signal.signed_in();
    }

    pub fn clear_token(&self) {
        let mut st = self.state.lock();
        st.generation += 1;
        self.tokens.clear();
    }

    /// Clear credentials and tell the host the session is gone.
    pub fn terminate(&self, reason: AuthLostReason) {
        self.clear_token();
        self.signal.authentication_lost(reason);
    }

    pub fn is_refreshing(&self) -> bool { self.state.lock().refreshing }

    /// Number of requests parked behind the in-flight refresh (leader excluded).
    pub fn pending(&self) -> usize { self.state.lock().queue.len() }

    /// Refresh calls started since construction.
    pub fn refresh_count(&self) -> u64 { self.refreshes.load(Ordering::SeqCst) }

    /// Called after a request sent with `sent_with` came back 401.
    /// Resolves to the token the request should be replayed with, or to
    /// `AuthenticationFailure` when the refresh failed.
    pub async fn token_after_unauthorized(self: &Arc<Self>, sent_with: Option<&str>) -> ApiResult<String> {
        let rx = {
            let mut st = self.state.lock();
            let (tx, rx) = oneshot::channel();
            if st.refreshing {
                st.queue.push(tx);
                debug!(target: "taskdesk::refresh", "queued behind in-flight refresh (pending={})", st.queue.len());
            } else {
                if let Some(current) = self.tokens.get() {
                    if Some(current.as_str()) != sent_with {
                        debug!(target: "taskdesk::refresh", "401 for a superseded token; replaying with current");
                        return Ok(current);
                    }
                }
                st.refreshing = true;
                st.started_at = st.generation;
                st.leader = Some(tx);
                self.refreshes.fetch_add(1, Ordering::SeqCst);
                let this = Arc::clone(self);
                tokio::spawn(async move { this.run_refresh().await });
            }
            rx
        };
        match rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(ApiError::auth_failure(Some("refresh abandoned".into()))),
        }
    }

    async fn run_refresh(self: Arc<Self>) {
        info!(target: "taskdesk::refresh", "refreshing access token");
        let mut guard = SettleGuard { coord: &*self, settled: false };
        let outcome = self.refresher.refresh().await;
        guard.settled = true;

        let (queue, leader, superseded) = {
            let mut st = self.state.lock();
            let superseded = st.generation != st.started_at;
            if !superseded {
                match &outcome {
                    Ok(token) => self.tokens.set(token),
                    Err(_) => self.tokens.clear(),
                }
            }
            st.refreshing = false;
            (std::mem::take(&mut st.queue), st.leader.take(), superseded)
        };

        let delivered = match outcome {
            _ if superseded => {
                info!(target: "taskdesk::refresh", "credentials changed during refresh; discarding result for {} request(s)", queue.len() + 1);
                Err(ApiError::auth_failure(Some("session changed during refresh".into())))
            }
            Ok(token) => {
                self.signal.signed_in();
                debug!(target: "taskdesk::refresh", "refresh ok; releasing {} queued request(s)", queue.len());
                Ok(token)
            }
            Err(e) => {
                warn!(target: "taskdesk::refresh", "refresh failed: {}; rejecting {} queued request(s)", e, queue.len());
                self.signal.authentication_lost(AuthLostReason::RefreshFailed);
                let msg = e.server_message().map(str::to_string).unwrap_or_else(|| e.to_string());
                Err(ApiError::auth_failure(Some(msg)))
            }
        };

        // receivers may be gone (caller lost interest); that is fine
        for tx in queue {
            let _ = tx.send(delivered.clone());
        }
        if let Some(tx) = leader {
            let _ = tx.send(delivered);
        }
    }
}

/// Returns the coordinator to idle if the refresh future never completes
/// (panic or runtime shutdown). Dropped senders surface to waiters as
/// `AuthenticationFailure`.
struct SettleGuard<'a> {
    coord: &'a RefreshCoordinator,
    settled: bool,
}

impl Drop for SettleGuard<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let (queue, leader) = {
            let mut st = self.coord.state.lock();
            st.refreshing = false;
            (std::mem::take(&mut st.queue), st.leader.take())
        };
        warn!(target: "taskdesk::refresh", "refresh abandoned; releasing {} waiter(s)", queue.len() + leader.iter().count());
    }
}
