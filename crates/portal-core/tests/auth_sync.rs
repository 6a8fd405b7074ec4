mod common;

use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{fast_cache, harness, user_json, FakeSession};
use portal_core::auth::{AuthEvent, SessionProvider};
use portal_core::portal::keys;
use portal_core::sync::{AuthSync, TokenRefreshPolicy};

fn sync_for(session: &Arc<FakeSession>) -> AuthSync {
    let provider: Arc<dyn SessionProvider> = session.clone();
    AuthSync::new(provider, fast_cache(), TokenRefreshPolicy::Invalidate)
}

#[test]
fn subscription_survives_until_last_consumer_leaves() {
    let session = FakeSession::signed_in("t");
    let sync = sync_for(&session);

    let first = sync.activate();
    let second = sync.activate();
    assert_eq!(sync.consumer_count(), 2);
    assert_eq!(session.listener_count(), 1);

    drop(first);
    assert!(sync.is_subscribed());
    assert_eq!(session.listener_count(), 1);

    drop(second);
    assert!(!sync.is_subscribed());
    assert_eq!(session.listener_count(), 0);
}

#[test]
fn never_more_than_one_listener_across_lifecycles() {
    let session = FakeSession::signed_in("t");
    let sync = sync_for(&session);
    let events = [
        AuthEvent::InitialSession,
        AuthEvent::SignedIn,
        AuthEvent::TokenRefreshed,
        AuthEvent::UserUpdated,
        AuthEvent::SignedOut,
    ];

    let mut guards = Vec::new();
    for round in 0..40usize {
        // Deterministic mix of activations, releases and events
        match round % 5 {
            0 | 1 | 3 => guards.push(sync.activate()),
            2 => {
                guards.pop();
            }
            _ => {
                let clone = sync.clone();
                let _temporary = clone.activate();
                session.emit(events[round % events.len()]);
            }
        }
        session.emit(events[(round * 7) % events.len()]);
        assert!(session.listener_count() <= 1);
        assert_eq!(session.listener_count(), usize::from(sync.consumer_count() > 0));
    }

    guards.clear();
    assert_eq!(session.listener_count(), 0);

    // Re-activation after a full teardown subscribes again
    let _again = sync.activate();
    assert_eq!(session.listener_count(), 1);
}

#[tokio::test]
async fn sign_out_empties_the_cache() {
    let server = MockServer::start().await;
    let h = harness(&server, FakeSession::signed_in("t"));
    h.cache.set_query_data(&keys::events_all().child("list"), &json!([]));
    h.cache.set_query_data(&keys::auth_user(), &json!({"id": "m-1"}));

    h.session.sign_out().await.unwrap();

    assert_eq!(h.cache.len(), 0);
}

#[tokio::test]
async fn token_refresh_forces_current_user_refetch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/auth/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_json("m-1", "auth-1", "Priya")))
        .expect(2)
        .mount(&server)
        .await;

    let session = FakeSession::signed_in("first");
    let h = harness(&server, session);

    h.portal.current_user().await.unwrap();
    // Fresh entry is served from cache
    h.portal.current_user().await.unwrap();
    assert_eq!(h.cache.is_stale(&keys::auth_user()), Some(false));

    h.session.refresh_to("second");
    h.session.refresh().await.unwrap();
    assert_eq!(h.cache.is_stale(&keys::auth_user()), Some(true));

    h.portal.current_user().await.unwrap();
    assert_eq!(h.cache.is_stale(&keys::auth_user()), Some(false));
}

#[tokio::test]
async fn lazy_policy_keeps_current_user_after_refresh() {
    let session = FakeSession::signed_in("first");
    let cache = fast_cache();
    let provider: Arc<dyn SessionProvider> = session.clone();
    let sync = AuthSync::new(provider, Arc::clone(&cache), TokenRefreshPolicy::Lazy);
    let _guard = sync.activate();
    cache.set_query_data(&keys::auth_user(), &json!({"id": "m-1"}));

    session.refresh_to("second");
    session.refresh().await.unwrap();

    assert_eq!(cache.is_stale(&keys::auth_user()), Some(false));
}

#[tokio::test]
async fn inactive_sync_leaves_cache_alone() {
    let session = FakeSession::signed_in("t");
    let cache = fast_cache();
    let provider: Arc<dyn SessionProvider> = session.clone();
    let sync = AuthSync::new(provider, Arc::clone(&cache), TokenRefreshPolicy::Invalidate);
    cache.set_query_data(&keys::auth_user(), &json!({"id": "m-1"}));

    drop(sync.activate());
    session.sign_out().await.unwrap();

    assert_eq!(cache.len(), 1);
}
