use async_trait::async_trait;

use super::events::{AuthListener, SubscriptionId};
use super::session::{SessionData, TokenGrant};
use crate::api::ApiError;

/// Capability the rest of the crate needs from an identity provider.
///
/// The API client reads tokens through it, the auth sync manager listens to
/// its lifecycle events, and the portal layer drives sign-in and sign-out.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Snapshot of the current session, if any
    fn session(&self) -> Option<SessionData>;

    /// Current access token. Implementations may refresh an expired
    /// session before answering; `None` means the caller is signed out.
    async fn access_token(&self) -> Option<String>;

    /// Exchange the refresh token for a new session and emit `TokenRefreshed`
    async fn refresh(&self) -> Result<SessionData, ApiError>;

    /// Install a freshly issued session and emit `SignedIn`
    async fn set_session(&self, grant: TokenGrant) -> Result<SessionData, ApiError>;

    /// Drop the session and emit `SignedOut`
    async fn sign_out(&self) -> Result<(), ApiError>;

    /// Emit `UserUpdated` after the account changed server-side
    fn notify_user_updated(&self);

    fn subscribe(&self, listener: AuthListener) -> SubscriptionId;

    fn unsubscribe(&self, id: SubscriptionId);
}
