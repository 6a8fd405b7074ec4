use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::Client;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::events::{AuthEvent, AuthListener, ListenerRegistry, SubscriptionId};
use super::provider::SessionProvider;
use super::session::{SessionData, TokenGrant};
use crate::api::ApiError;

/// Session file name in cache directory
const SESSION_FILE: &str = "session.json";

/// HTTP request timeout for identity provider calls
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Session store backed by the identity provider's token endpoint.
///
/// Holds the session in memory, optionally mirrors it to `session.json`,
/// and emits lifecycle events to subscribers. Share one instance per
/// process (behind an `Arc`) so concurrent refreshes collapse into one.
pub struct SessionStore {
    http: Client,
    auth_url: Option<String>,
    anon_key: Option<String>,
    session_path: Option<PathBuf>,
    state: RwLock<Option<SessionData>>,
    listeners: ListenerRegistry,
    refresh_lock: tokio::sync::Mutex<()>,
}

impl SessionStore {
    pub fn new(auth_url: Option<String>, anon_key: Option<String>) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http,
            auth_url: auth_url.map(|u| u.trim_end_matches('/').to_string()),
            anon_key,
            session_path: None,
            state: RwLock::new(None),
            listeners: ListenerRegistry::new(),
            refresh_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Mirror the session to `<cache_dir>/session.json`
    pub fn with_persistence(mut self, cache_dir: &Path) -> Self {
        self.session_path = Some(cache_dir.join(SESSION_FILE));
        self
    }

    /// Load any stored session and emit `InitialSession`.
    ///
    /// Expired sessions are kept: their refresh token is still usable.
    pub fn initialize(&self) -> Result<bool> {
        let loaded = match self.load()? {
            Some(data) => {
                debug!(expired = data.is_expired(), "Stored session found");
                *self.state.write() = Some(data);
                true
            }
            None => false,
        };
        self.listeners.emit(AuthEvent::InitialSession);
        Ok(loaded)
    }

    /// Number of live event subscriptions
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Periodically refresh the session shortly before it expires.
    /// The task ends once the store is dropped.
    pub fn spawn_auto_refresh(self: &Arc<Self>, check_every: Duration) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(check_every);
            loop {
                ticker.tick().await;
                let Some(store) = weak.upgrade() else {
                    break;
                };
                let due = store.session().map(|s| s.needs_refresh()).unwrap_or(false);
                if due {
                    if let Err(e) = store.refresh().await {
                        warn!(error = %e, "Background token refresh failed");
                    }
                }
            }
        })
    }

    fn load(&self) -> Result<Option<SessionData>> {
        let Some(path) = self.session_path.as_ref() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path).context("Failed to read session file")?;
        let data: SessionData =
            serde_json::from_str(&contents).context("Failed to parse session file")?;
        Ok(Some(data))
    }

    fn save(&self, data: &SessionData) -> Result<()> {
        let Some(path) = self.session_path.as_ref() else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(data)?;
        std::fs::write(path, contents).context("Failed to write session file")?;
        Ok(())
    }

    fn remove_file(&self) -> Result<()> {
        if let Some(path) = self.session_path.as_ref() {
            if path.exists() {
                std::fs::remove_file(path).context("Failed to remove session file")?;
            }
        }
        Ok(())
    }

    /// Swap the in-memory session and mirror the change to disk.
    /// Disk failures are logged; the in-memory session stays authoritative.
    fn replace(&self, data: Option<SessionData>) {
        let persisted = match &data {
            Some(d) => self.save(d),
            None => self.remove_file(),
        };
        if let Err(e) = persisted {
            warn!(error = %e, "Failed to persist session");
        }
        *self.state.write() = data;
    }

    async fn request_refresh(&self, refresh_token: &str) -> Result<TokenGrant, ApiError> {
        let auth_url = self
            .auth_url
            .as_deref()
            .ok_or_else(|| ApiError::Session("No identity provider URL configured".to_string()))?;
        let url = format!("{}/token?grant_type=refresh_token", auth_url);

        let mut request = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "refresh_token": refresh_token }));
        if let Some(ref key) = self.anon_key {
            request = request.header("apikey", key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(%status, body = %ApiError::body_excerpt(&body), "Refresh rejected");
            if status.is_client_error() {
                // The refresh token is dead; nothing left to recover
                warn!(%status, "Refresh token rejected, signing out");
                self.replace(None);
                self.listeners.emit(AuthEvent::SignedOut);
            }
            return Err(ApiError::Session(format!(
                "Token refresh failed with status {}",
                status.as_u16()
            )));
        }

        response
            .json::<TokenGrant>()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse token response: {}", e)))
    }
}

#[async_trait]
impl SessionProvider for SessionStore {
    fn session(&self) -> Option<SessionData> {
        self.state.read().clone()
    }

    async fn access_token(&self) -> Option<String> {
        let session = self.session()?;
        if !session.is_expired() {
            return Some(session.access_token);
        }
        match self.refresh().await {
            Ok(refreshed) => Some(refreshed.access_token),
            Err(e) => {
                warn!(error = %e, "Expired session could not be refreshed");
                None
            }
        }
    }

    async fn refresh(&self) -> Result<SessionData, ApiError> {
        let seen = self.session().ok_or(ApiError::Unauthenticated)?;
        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed while this one waited
        match self.session() {
            None => return Err(ApiError::Unauthenticated),
            Some(current) if current.refresh_token != seen.refresh_token => {
                debug!("Session already refreshed by a concurrent caller");
                return Ok(current);
            }
            Some(_) => {}
        }

        let grant = self.request_refresh(&seen.refresh_token).await?;
        let data = grant.into_session(seen.user);
        self.replace(Some(data.clone()));
        debug!(expires_at = %data.expires_at, "Token refreshed");
        self.listeners.emit(AuthEvent::TokenRefreshed);
        Ok(data)
    }

    async fn set_session(&self, grant: TokenGrant) -> Result<SessionData, ApiError> {
        let data = grant.into_session(None);
        self.replace(Some(data.clone()));
        info!(email = data.email().unwrap_or("unknown"), "Signed in");
        self.listeners.emit(AuthEvent::SignedIn);
        Ok(data)
    }

    async fn sign_out(&self) -> Result<(), ApiError> {
        let _guard = self.refresh_lock.lock().await;
        self.replace(None);
        info!("Signed out");
        self.listeners.emit(AuthEvent::SignedOut);
        Ok(())
    }

    fn notify_user_updated(&self) {
        self.listeners.emit(AuthEvent::UserUpdated);
    }

    fn subscribe(&self, listener: AuthListener) -> SubscriptionId {
        self.listeners.add(listener)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        if !self.listeners.remove(id) {
            debug!(?id, "Unsubscribe for unknown subscription");
        }
    }
}
