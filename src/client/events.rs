use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthLostReason {
    Logout,
    RefreshFailed,
    RefreshedTokenRejected,
    AuthEndpointRejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    SignedIn,
    SignedOut { reason: Option<AuthLostReason> },
}

type LostHook = Arc<dyn Fn(AuthLostReason) + Send + Sync>;

/// Publishes sign-in state to the hosting application.
///
/// Going signed-out is edge-triggered: however many callers report the loss,
/// subscribers and hooks see it once until the next sign-in.
pub struct AuthSignal {
    tx: watch::Sender<AuthStatus>,
    hooks: RwLock<Vec<LostHook>>,
}

impl AuthSignal {
    pub fn new(initial: AuthStatus) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx, hooks: RwLock::new(Vec::new()) }
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthStatus> {
        self.tx.subscribe()
    }

    pub fn status(&self) -> AuthStatus {
        *self.tx.borrow()
    }

    /// Hooks run synchronously on the signed-out transition, in registration order.
    pub fn on_authentication_lost<F>(&self, f: F)
    where
        F: Fn(AuthLostReason) + Send + Sync + 'static,
    {
        self.hooks.write().push(Arc::new(f));
    }

    pub fn signed_in(&self) {
        self.tx.send_if_modified(|s| {
            if *s == AuthStatus::SignedIn { return false; }
            *s = AuthStatus::SignedIn;
            true
        });
    }

    /// Returns true when this call performed the transition.
    pub fn authentication_lost(&self, reason: AuthLostReason) -> bool {
        let changed = self.tx.send_if_modified(|s| {
            if matches!(s, AuthStatus::SignedOut { reason: Some(_) }) { return false; }
            *s = AuthStatus::SignedOut { reason: Some(reason) };
            true
        });
        if changed {
            info!(target: "taskdesk::auth", "authentication lost: {:?}", reason);
            let hooks = self.hooks.read().clone();
            for h in hooks { h(reason); }
        }
        changed
    }
}

impl Default for AuthSignal {
    fn default() -> Self { Self::new(AuthStatus::SignedOut { reason: None }) }
}
