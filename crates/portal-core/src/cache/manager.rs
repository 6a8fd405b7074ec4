use std::collections::HashMap;
use std::future::Future;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::key::QueryKey;
use super::policy::{CacheConfig, QueryOptions};
use crate::api::ApiError;

/// Typed view of a cache entry handed back to callers.
#[derive(Debug, Clone)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
    pub invalidated: bool,
}

#[derive(Debug, Clone)]
struct QueryEntry {
    key: QueryKey,
    data: Value,
    cached_at: DateTime<Utc>,
    last_accessed: DateTime<Utc>,
    /// Freshness window of the query that stored this entry
    stale_time: Duration,
    invalidated: bool,
}

impl QueryEntry {
    fn is_stale(&self, stale_time: Duration) -> bool {
        self.invalidated || Utc::now() - self.cached_at > stale_time
    }
}

/// Drop entries not read since `cutoff`, returning how many went
fn sweep(entries: &mut HashMap<String, QueryEntry>, cutoff: DateTime<Utc>) -> usize {
    let before = entries.len();
    entries.retain(|_, e| e.last_accessed >= cutoff);
    before - entries.len()
}

/// In-memory request cache keyed by `QueryKey`.
///
/// Successful responses are memoized; failures are never stored.
/// Entries unread for longer than the GC time are swept whenever a new
/// value is stored. Locks are held only for map operations, never across
/// an `.await`.
pub struct QueryCache {
    config: CacheConfig,
    entries: RwLock<HashMap<String, QueryEntry>>,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl QueryCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Default options for queries that don't override anything
    pub fn default_options(&self) -> QueryOptions {
        self.config.query_options()
    }

    /// Return the cached value if fresh, otherwise run `fetcher` (retrying
    /// per `options.retry`) and cache its result.
    pub async fn fetch_query<T, F, Fut>(
        &self,
        key: &QueryKey,
        options: QueryOptions,
        fetcher: F,
    ) -> Result<T, ApiError>
    where
        T: Serialize + DeserializeOwned,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        if let Some(data) = self.fresh_data::<T>(key, options.stale_time) {
            debug!(%key, "Query cache hit");
            return Ok(data);
        }

        let mut failures: u32 = 0;
        loop {
            match fetcher().await {
                Ok(data) => {
                    self.store(key, &data, Some(options.stale_time));
                    return Ok(data);
                }
                Err(e) if options.retry.should_retry(failures, &e) => {
                    let delay = self.config.backoff(failures);
                    failures += 1;
                    warn!(%key, error = %e, retry = failures, delay_ms = delay.as_millis() as u64, "Query failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    debug!(%key, error = %e, "Query failed");
                    return Err(e);
                }
            }
        }
    }

    fn fresh_data<T: DeserializeOwned>(&self, key: &QueryKey, stale_time: Duration) -> Option<T> {
        let mut entries = self.entries.write();
        let entry = entries.get_mut(&key.hash_key())?;
        if entry.is_stale(stale_time) {
            return None;
        }
        entry.last_accessed = Utc::now();
        match serde_json::from_value(entry.data.clone()) {
            Ok(data) => Some(data),
            Err(e) => {
                debug!(%key, error = %e, "Cached value has a different shape, refetching");
                None
            }
        }
    }

    pub fn get_query_data<T: DeserializeOwned>(&self, key: &QueryKey) -> Option<CachedData<T>> {
        let mut entries = self.entries.write();
        let entry = entries.get_mut(&key.hash_key())?;
        entry.last_accessed = Utc::now();
        let data = serde_json::from_value(entry.data.clone()).ok()?;
        Some(CachedData {
            data,
            cached_at: entry.cached_at,
            invalidated: entry.invalidated,
        })
    }

    /// Store (or overwrite) a fresh value under `key`.
    ///
    /// An existing entry keeps its stale time; new entries get the default.
    pub fn set_query_data<T: Serialize + ?Sized>(&self, key: &QueryKey, data: &T) {
        self.store(key, data, None);
    }

    fn store<T: Serialize + ?Sized>(&self, key: &QueryKey, data: &T, stale_time: Option<Duration>) {
        let value = match serde_json::to_value(data) {
            Ok(v) => v,
            Err(e) => {
                warn!(%key, error = %e, "Failed to serialize query data, not caching");
                return;
            }
        };
        let now = Utc::now();
        let hash = key.hash_key();
        let mut entries = self.entries.write();

        let swept = sweep(&mut entries, now - self.config.gc_time);
        if swept > 0 {
            debug!(swept, "Collected unused queries");
        }

        let stale_time = stale_time
            .or_else(|| entries.get(&hash).map(|e| e.stale_time))
            .unwrap_or(self.config.stale_time);
        entries.insert(
            hash,
            QueryEntry {
                key: key.clone(),
                data: value,
                cached_at: now,
                last_accessed: now,
                stale_time,
                invalidated: false,
            },
        );
    }

    /// Whether the next read of `key` refetches, judged by the entry's own
    /// stale time. `None` when nothing is cached under `key`.
    pub fn is_stale(&self, key: &QueryKey) -> Option<bool> {
        self.entries
            .read()
            .get(&key.hash_key())
            .map(|e| e.is_stale(e.stale_time))
    }

    /// Mark every entry under `prefix` stale so the next access refetches
    pub fn invalidate_queries(&self, prefix: &QueryKey) -> usize {
        self.invalidate_matching(prefix, |_| true)
    }

    /// Mark entries under `prefix` that also satisfy `predicate` stale
    pub fn invalidate_matching<P>(&self, prefix: &QueryKey, predicate: P) -> usize
    where
        P: Fn(&QueryKey) -> bool,
    {
        let mut count = 0;
        for entry in self.entries.write().values_mut() {
            if entry.key.starts_with(prefix) && predicate(&entry.key) {
                entry.invalidated = true;
                count += 1;
            }
        }
        debug!(%prefix, count, "Invalidated queries");
        count
    }

    pub fn remove_queries(&self, prefix: &QueryKey) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, e| !e.key.starts_with(prefix));
        let removed = before - entries.len();
        debug!(%prefix, removed, "Removed queries");
        removed
    }

    pub fn clear(&self) {
        let mut entries = self.entries.write();
        let count = entries.len();
        entries.clear();
        debug!(count, "Cleared query cache");
    }

    /// Drop entries nobody has read within the GC window
    pub fn gc(&self) -> usize {
        sweep(&mut self.entries.write(), Utc::now() - self.config.gc_time)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<QueryKey> {
        self.entries.read().values().map(|e| e.key.clone()).collect()
    }

    #[cfg(test)]
    fn backdate(&self, key: &QueryKey, by: Duration) {
        if let Some(entry) = self.entries.write().get_mut(&key.hash_key()) {
            entry.cached_at = entry.cached_at - by;
            entry.last_accessed = entry.last_accessed - by;
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::RetryPolicy;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration as StdDuration;

    fn test_cache() -> QueryCache {
        QueryCache::new(CacheConfig {
            retry_delay: StdDuration::ZERO,
            ..CacheConfig::default()
        })
    }

    fn events_key() -> QueryKey {
        QueryKey::root("events").child("list")
    }

    #[tokio::test]
    async fn test_fetch_query_memoizes_fresh_data() {
        let cache = test_cache();
        let calls = &AtomicU32::new(0);
        let fetch = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ApiError>(vec!["a".to_string()])
        };

        let first = cache.fetch_query(&events_key(), cache.default_options(), fetch).await.unwrap();
        let second = cache.fetch_query(&events_key(), cache.default_options(), fetch).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidated_entry_is_refetched() {
        let cache = test_cache();
        let calls = &AtomicU32::new(0);
        let fetch = move || async move { Ok::<_, ApiError>(calls.fetch_add(1, Ordering::SeqCst)) };

        cache.fetch_query(&events_key(), cache.default_options(), fetch).await.unwrap();
        assert_eq!(cache.invalidate_queries(&QueryKey::root("events")), 1);
        assert_eq!(cache.is_stale(&events_key()), Some(true));

        let value = cache.fetch_query(&events_key(), cache.default_options(), fetch).await.unwrap();
        assert_eq!(value, 1);
        assert_eq!(cache.is_stale(&events_key()), Some(false));
    }

    #[tokio::test]
    async fn test_old_entry_goes_stale() {
        let cache = test_cache();
        cache.set_query_data(&events_key(), &1);
        assert_eq!(cache.is_stale(&events_key()), Some(false));
        cache.backdate(&events_key(), Duration::seconds(31));
        assert_eq!(cache.is_stale(&events_key()), Some(true));
    }

    #[tokio::test]
    async fn test_transient_failure_retried_once_and_not_cached() {
        let cache = test_cache();
        let calls = &AtomicU32::new(0);
        let fetch = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<u32, _>(ApiError::Api { status: 503, message: "down".into() })
        };

        let err = cache.fetch_query(&events_key(), cache.default_options(), fetch).await.unwrap_err();
        assert_eq!(err.to_string(), "down");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_retry_recovers() {
        let cache = test_cache();
        let calls = &AtomicU32::new(0);
        let fetch = move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(ApiError::AuthenticationFailed)
            } else {
                Ok(7u32)
            }
        };
        let value = cache.fetch_query(&events_key(), cache.default_options(), fetch).await.unwrap();
        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_no_retry_policy() {
        let cache = test_cache();
        let calls = &AtomicU32::new(0);
        let options = QueryOptions {
            retry: RetryPolicy::TransientExceptAuth { max_retries: 1 },
            ..cache.default_options()
        };
        let fetch = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<u32, _>(ApiError::AuthenticationFailed)
        };
        assert!(cache.fetch_query(&events_key(), options, fetch).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_invalidate_matching_and_remove() {
        let cache = test_cache();
        let lists = QueryKey::root("registrations").child("list");
        let a = lists.child(&serde_json::json!({"eventId": "a", "page": 1}));
        let b = lists.child(&serde_json::json!({"eventId": "b", "page": 1}));
        cache.set_query_data(&a, &1);
        cache.set_query_data(&b, &2);

        let count = cache.invalidate_matching(&lists, |key| {
            key.parts().get(2).and_then(|p| p.get("eventId")).and_then(|v| v.as_str()) == Some("a")
        });
        assert_eq!(count, 1);
        assert_eq!(cache.is_stale(&a), Some(true));
        assert_eq!(cache.is_stale(&b), Some(false));

        assert_eq!(cache.remove_queries(&QueryKey::root("registrations")), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clear_and_gc() {
        let cache = test_cache();
        let old = QueryKey::root("users").child("list");
        let recent = QueryKey::root("events").child("list");
        cache.set_query_data(&old, &"old");
        cache.set_query_data(&recent, &"recent");
        cache.backdate(&old, Duration::minutes(6));

        assert_eq!(cache.gc(), 1);
        assert_eq!(cache.keys(), vec![recent]);

        cache.clear();
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_storing_sweeps_unused_entries() {
        let cache = test_cache();
        let old = QueryKey::root("users").child("detail").child("m-1");
        cache.set_query_data(&old, &"old");
        cache.backdate(&old, Duration::minutes(6));

        cache.set_query_data(&events_key(), &"new");

        assert!(cache.is_stale(&old).is_none());
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_entry_keeps_its_query_stale_time() {
        let cache = test_cache();
        let me = QueryKey::root("auth").child("user");
        let options = QueryOptions {
            stale_time: Duration::seconds(60),
            ..cache.default_options()
        };
        cache
            .fetch_query(&me, options, || async { Ok::<_, ApiError>("priya".to_string()) })
            .await
            .unwrap();
        cache.backdate(&me, Duration::seconds(45));
        assert_eq!(cache.is_stale(&me), Some(false));

        // Overwriting keeps the window; a brand-new entry gets the default
        cache.set_query_data(&me, &"priya");
        cache.backdate(&me, Duration::seconds(45));
        assert_eq!(cache.is_stale(&me), Some(false));

        cache.set_query_data(&events_key(), &1);
        cache.backdate(&events_key(), Duration::seconds(45));
        assert_eq!(cache.is_stale(&events_key()), Some(true));
    }

    #[test]
    fn test_get_query_data_reports_age() {
        let cache = test_cache();
        cache.set_query_data(&events_key(), &vec![1, 2, 3]);
        let cached: CachedData<Vec<i32>> = cache.get_query_data(&events_key()).unwrap();
        assert_eq!(cached.data, vec![1, 2, 3]);
        assert!(Utc::now() - cached.cached_at < Duration::seconds(5));
        assert!(!cached.invalidated);
    }
}
