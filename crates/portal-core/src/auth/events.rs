use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

/// Session lifecycle notifications emitted by a session provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthEvent {
    /// Emitted once when the provider finishes loading any stored session
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
    PasswordRecovery,
}

impl fmt::Display for AuthEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthEvent::InitialSession => "INITIAL_SESSION",
            AuthEvent::SignedIn => "SIGNED_IN",
            AuthEvent::SignedOut => "SIGNED_OUT",
            AuthEvent::TokenRefreshed => "TOKEN_REFRESHED",
            AuthEvent::UserUpdated => "USER_UPDATED",
            AuthEvent::PasswordRecovery => "PASSWORD_RECOVERY",
        };
        f.write_str(name)
    }
}

pub type AuthListener = Arc<dyn Fn(AuthEvent) + Send + Sync>;

/// Handle returned by `subscribe`, passed back to `unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Listener table shared by session provider implementations.
#[derive(Default)]
pub struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: Mutex<HashMap<u64, AuthListener>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: AuthListener) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().insert(id, listener);
        SubscriptionId(id)
    }

    /// Returns false if the subscription was already gone
    pub fn remove(&self, id: SubscriptionId) -> bool {
        self.listeners.lock().remove(&id.0).is_some()
    }

    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver an event to every live listener.
    /// Listeners run outside the lock so they may subscribe or unsubscribe.
    pub fn emit(&self, event: AuthEvent) {
        let listeners: Vec<AuthListener> = self.listeners.lock().values().cloned().collect();
        debug!(%event, listeners = listeners.len(), "Emitting auth event");
        for listener in listeners {
            listener(event);
        }
    }
}
