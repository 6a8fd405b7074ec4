//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use wiremock::MockServer;

use portal_core::api::{ApiClient, ApiError, UnauthorizedPolicy};
use portal_core::auth::{
    AuthEvent, AuthListener, ListenerRegistry, SessionData, SessionProvider, SessionUser,
    SubscriptionId, TokenGrant,
};
use portal_core::cache::{CacheConfig, QueryCache};
use portal_core::sync::{AuthSync, TokenRefreshPolicy};
use portal_core::Portal;

/// In-memory session provider with scripted refresh behaviour.
#[derive(Default)]
pub struct FakeSession {
    state: Mutex<Option<SessionData>>,
    next_token: Mutex<Option<String>>,
    listeners: ListenerRegistry,
    refresh_calls: AtomicUsize,
    events: Mutex<Vec<AuthEvent>>,
}

impl FakeSession {
    pub fn signed_out() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn signed_in(token: &str) -> Arc<Self> {
        let session = Self::default();
        let mut grant = TokenGrant::new(token, "refresh-1");
        grant.user = Some(SessionUser {
            id: "auth-1".to_string(),
            email: Some("exec@utesca.ca".to_string()),
        });
        *session.state.lock() = Some(grant.into_session(None));
        Arc::new(session)
    }

    /// Make the next `refresh` succeed with this access token
    pub fn refresh_to(&self, token: &str) {
        *self.next_token.lock() = Some(token.to_string());
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn emitted(&self) -> Vec<AuthEvent> {
        self.events.lock().clone()
    }

    /// Fire an event as the identity provider would
    pub fn emit(&self, event: AuthEvent) {
        self.events.lock().push(event);
        self.listeners.emit(event);
    }
}

#[async_trait]
impl SessionProvider for FakeSession {
    fn session(&self) -> Option<SessionData> {
        self.state.lock().clone()
    }

    async fn access_token(&self) -> Option<String> {
        self.session().map(|s| s.access_token)
    }

    async fn refresh(&self) -> Result<SessionData, ApiError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        let token = self
            .next_token
            .lock()
            .take()
            .ok_or_else(|| ApiError::Session("refresh rejected".to_string()))?;
        let user = self.session().and_then(|s| s.user);
        let data = TokenGrant::new(token, "refresh-2").into_session(user);
        *self.state.lock() = Some(data.clone());
        self.emit(AuthEvent::TokenRefreshed);
        Ok(data)
    }

    async fn set_session(&self, grant: TokenGrant) -> Result<SessionData, ApiError> {
        let data = grant.into_session(None);
        *self.state.lock() = Some(data.clone());
        self.emit(AuthEvent::SignedIn);
        Ok(data)
    }

    async fn sign_out(&self) -> Result<(), ApiError> {
        *self.state.lock() = None;
        self.emit(AuthEvent::SignedOut);
        Ok(())
    }

    fn notify_user_updated(&self) {
        self.emit(AuthEvent::UserUpdated);
    }

    fn subscribe(&self, listener: AuthListener) -> SubscriptionId {
        self.listeners.add(listener)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.listeners.remove(id);
    }
}

pub fn api_url(server: &MockServer) -> String {
    format!("{}/api/v1", server.uri())
}

pub fn client(server: &MockServer, session: &Arc<FakeSession>) -> ApiClient {
    let provider: Arc<dyn SessionProvider> = session.clone();
    ApiClient::new(&api_url(server), provider).unwrap()
}

pub fn client_with_policy(
    server: &MockServer,
    session: &Arc<FakeSession>,
    policy: UnauthorizedPolicy,
) -> ApiClient {
    client(server, session).with_unauthorized_policy(policy)
}

/// Cache config without retry delays
pub fn fast_cache() -> Arc<QueryCache> {
    Arc::new(QueryCache::new(CacheConfig {
        retry_delay: std::time::Duration::from_millis(1),
        ..CacheConfig::default()
    }))
}

pub struct Harness {
    pub session: Arc<FakeSession>,
    pub cache: Arc<QueryCache>,
    pub sync: AuthSync,
    pub portal: Portal,
}

pub fn harness(server: &MockServer, session: Arc<FakeSession>) -> Harness {
    harness_with_policy(server, session, UnauthorizedPolicy::FailFast)
}

pub fn harness_with_policy(
    server: &MockServer,
    session: Arc<FakeSession>,
    policy: UnauthorizedPolicy,
) -> Harness {
    let cache = fast_cache();
    let provider: Arc<dyn SessionProvider> = session.clone();
    let sync = AuthSync::new(provider, Arc::clone(&cache), TokenRefreshPolicy::Invalidate);
    let api = client_with_policy(server, &session, policy);
    let portal = Portal::new(api, Arc::clone(&cache), &sync);
    Harness {
        session,
        cache,
        sync,
        portal,
    }
}

pub fn user_json(id: &str, user_id: &str, first_name: &str) -> Value {
    json!({
        "id": id,
        "userId": user_id,
        "email": "exec@utesca.ca",
        "firstName": first_name,
        "lastName": "Nguyen",
        "role": "co_president",
        "displayRole": "Co-President",
        "departmentId": null,
        "preferredName": null,
        "photoUrl": null,
        "invitedBy": null,
        "notificationPreferences": {
            "announcements": "all",
            "rsvpChanges": true,
            "newApplicationSubmitted": true
        },
        "linkedinUrl": null,
        "createdAt": "2025-01-01T00:00:00Z",
        "updatedAt": "2025-01-01T00:00:00Z"
    })
}

pub fn event_json(id: &str, title: &str) -> Value {
    json!({
        "id": id,
        "title": title,
        "description": null,
        "dateTime": "2025-03-01T23:00:00Z",
        "location": "Myhal 150",
        "registrationDeadline": null,
        "status": "published",
        "createdBy": null,
        "registrationFormSchema": null,
        "maxCapacity": null,
        "imageUrl": null,
        "createdAt": "2025-01-01T00:00:00Z",
        "updatedAt": "2025-01-01T00:00:00Z",
        "approvedBy": null,
        "approvedAt": null,
        "category": null,
        "imagePosition": null,
        "albumLink": null,
        "registrationLink": null
    })
}

pub fn registration_json(id: &str, event_id: &str, status: &str) -> Value {
    json!({
        "id": id,
        "eventId": event_id,
        "formData": {"fullName": "Ada Lovelace", "email": "ada@mail.utoronto.ca"},
        "status": status,
        "submittedAt": "2025-01-10T12:00:00Z",
        "reviewedBy": null,
        "reviewedAt": null,
        "rsvpToken": null,
        "confirmedAt": null,
        "checkedIn": false,
        "checkedInAt": null,
        "checkedInBy": null,
        "createdAt": "2025-01-10T12:00:00Z",
        "updatedAt": "2025-01-10T12:00:00Z"
    })
}

pub fn registration_page(event_id: &str, total: u64) -> Value {
    json!({
        "registrations": [registration_json("r-1", event_id, "submitted")],
        "pagination": {"total": total, "page": 1, "limit": 1, "totalPages": total}
    })
}
