//! Session-to-cache synchronization.
//!
//! `AuthSync` listens to the session provider's lifecycle events and
//! translates them into cache commands: sign-out clears everything, every
//! other session change invalidates the current-user entry.
//!
//! Any number of consumers may activate it; only the first activation
//! subscribes and only the last deactivation unsubscribes, so at most one
//! listener is ever registered per manager.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::auth::{AuthEvent, SessionProvider, SubscriptionId};
use crate::cache::QueryCache;
use crate::portal::keys;

/// What a token refresh does to the current-user entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenRefreshPolicy {
    /// Invalidate so the profile is refetched with the new token
    #[default]
    Invalidate,
    /// Leave the entry alone and let staleness trigger the refetch
    Lazy,
}

/// Apply one lifecycle event to the cache
pub fn apply_event(cache: &QueryCache, policy: TokenRefreshPolicy, event: AuthEvent) {
    debug!(%event, "Auth state changed");
    match event {
        AuthEvent::SignedOut => cache.clear(),
        AuthEvent::TokenRefreshed if policy == TokenRefreshPolicy::Lazy => {
            debug!("Token refreshed, deferring user refetch");
        }
        AuthEvent::InitialSession
        | AuthEvent::SignedIn
        | AuthEvent::TokenRefreshed
        | AuthEvent::UserUpdated => {
            cache.invalidate_queries(&keys::auth_user());
        }
        AuthEvent::PasswordRecovery => {
            debug!(%event, "Unhandled auth event");
        }
    }
}

#[derive(Default)]
struct SyncState {
    ref_count: usize,
    subscription: Option<SubscriptionId>,
}

struct Inner {
    provider: Arc<dyn SessionProvider>,
    cache: Arc<QueryCache>,
    policy: TokenRefreshPolicy,
    state: Mutex<SyncState>,
}

impl Inner {
    fn release(&self) {
        let mut state = self.state.lock();
        state.ref_count = state.ref_count.saturating_sub(1);
        if state.ref_count == 0 {
            if let Some(id) = state.subscription.take() {
                debug!("Last consumer gone, removing auth listener");
                self.provider.unsubscribe(id);
            }
        }
    }
}

/// Reference-counted owner of the single auth-event subscription.
/// Clones share the same count.
#[derive(Clone)]
pub struct AuthSync {
    inner: Arc<Inner>,
}

impl AuthSync {
    pub fn new(
        provider: Arc<dyn SessionProvider>,
        cache: Arc<QueryCache>,
        policy: TokenRefreshPolicy,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                provider,
                cache,
                policy,
                state: Mutex::new(SyncState::default()),
            }),
        }
    }

    /// Register a consumer. The listener is installed on the first call;
    /// later calls only bump the count. Dropping the guard releases it.
    pub fn activate(&self) -> AuthSyncGuard {
        let mut state = self.inner.state.lock();
        if state.subscription.is_none() {
            let cache = Arc::clone(&self.inner.cache);
            let policy = self.inner.policy;
            let id = self
                .inner
                .provider
                .subscribe(Arc::new(move |event| apply_event(&cache, policy, event)));
            debug!("Auth listener installed");
            state.subscription = Some(id);
        }
        state.ref_count += 1;
        debug!(consumers = state.ref_count, "Auth sync activated");

        AuthSyncGuard {
            inner: Arc::clone(&self.inner),
        }
    }

    pub fn consumer_count(&self) -> usize {
        self.inner.state.lock().ref_count
    }

    pub fn is_subscribed(&self) -> bool {
        self.inner.state.lock().subscription.is_some()
    }
}

/// Keeps one consumer registered with `AuthSync` while alive.
#[must_use = "dropping the guard deactivates auth sync immediately"]
pub struct AuthSyncGuard {
    inner: Arc<Inner>,
}

impl Drop for AuthSyncGuard {
    fn drop(&mut self) {
        self.inner.release();
    }
}
