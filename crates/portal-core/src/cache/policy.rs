use std::time::Duration as StdDuration;

use chrono::Duration;

use crate::api::ApiError;

/// Data is considered fresh for 30 seconds
const DEFAULT_STALE_SECS: i64 = 30;

/// Unused entries are kept for 5 minutes
const DEFAULT_GC_MINUTES: i64 = 5;

/// Initial backoff delay between retries, doubled per attempt
const INITIAL_RETRY_BACKOFF_MS: u64 = 1000;

/// Backoff never grows beyond this
const MAX_RETRY_BACKOFF_MS: u64 = 30_000;

/// When a failed read is re-issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    Never,
    /// Retry transient failures, 401 included
    Transient { max_retries: u32 },
    /// Retry transient failures but let authentication failures surface immediately
    TransientExceptAuth { max_retries: u32 },
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::Transient { max_retries: 1 }
    }
}

impl RetryPolicy {
    /// `failure_count` is the number of failures before the current one
    pub fn should_retry(&self, failure_count: u32, error: &ApiError) -> bool {
        match *self {
            RetryPolicy::Never => false,
            RetryPolicy::Transient { max_retries } => {
                failure_count < max_retries && error.is_transient()
            }
            RetryPolicy::TransientExceptAuth { max_retries } => {
                failure_count < max_retries && error.is_transient() && !error.is_auth_error()
            }
        }
    }

    /// Same retry budget, but authentication failures are final
    pub fn except_auth(self) -> Self {
        match self {
            RetryPolicy::Transient { max_retries } => RetryPolicy::TransientExceptAuth { max_retries },
            other => other,
        }
    }
}

/// Per-query overrides of the cache defaults.
#[derive(Debug, Clone, Copy)]
pub struct QueryOptions {
    pub stale_time: Duration,
    pub retry: RetryPolicy,
}

/// Cache-wide defaults.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    pub stale_time: Duration,
    pub gc_time: Duration,
    pub retry: RetryPolicy,
    pub retry_delay: StdDuration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            stale_time: Duration::seconds(DEFAULT_STALE_SECS),
            gc_time: Duration::minutes(DEFAULT_GC_MINUTES),
            retry: RetryPolicy::default(),
            retry_delay: StdDuration::from_millis(INITIAL_RETRY_BACKOFF_MS),
        }
    }
}

impl CacheConfig {
    pub fn query_options(&self) -> QueryOptions {
        QueryOptions {
            stale_time: self.stale_time,
            retry: self.retry,
        }
    }

    /// Exponential backoff for the given retry attempt (0-based)
    pub fn backoff(&self, attempt: u32) -> StdDuration {
        let factor = 2u32.saturating_pow(attempt);
        self.retry_delay
            .saturating_mul(factor)
            .min(StdDuration::from_millis(MAX_RETRY_BACKOFF_MS))
    }
}
