//! Core library for the executive portal.
//!
//! Provides the authenticated API client, the session store and its
//! lifecycle events, the request cache, the auth-to-cache sync manager,
//! and the cached `Portal` operations used by front ends.

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod models;
pub mod portal;
pub mod sync;
pub mod utils;

pub use api::{ApiClient, ApiError, UnauthorizedPolicy};
pub use auth::{AuthEvent, SessionProvider, SessionStore};
pub use cache::{QueryCache, QueryKey};
pub use config::Config;
pub use portal::Portal;
pub use sync::{AuthSync, AuthSyncGuard, TokenRefreshPolicy};
