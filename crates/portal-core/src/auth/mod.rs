//! Session management for the identity provider.
//!
//! This module provides:
//! - `SessionProvider`: the capability the API client and auth sync depend on
//! - `SessionStore`: the concrete store that persists the session and refreshes tokens
//! - `ListenerRegistry` / `AuthEvent`: session lifecycle notifications
//! - `CredentialStore`: remembered passwords in the OS keychain

pub mod credentials;
pub mod events;
pub mod provider;
pub mod session;
pub mod store;

pub use credentials::CredentialStore;
pub use events::{AuthEvent, AuthListener, ListenerRegistry, SubscriptionId};
pub use provider::SessionProvider;
pub use session::{SessionData, SessionUser, TokenGrant};
pub use store::SessionStore;
