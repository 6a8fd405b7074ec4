//! Client-side request cache.
//!
//! `QueryCache` memoizes API responses under hierarchical `QueryKey`s,
//! tracks staleness (30 seconds by default), retries transient read
//! failures once, and supports prefix invalidation so mutations and
//! session changes can force refetches.

pub mod key;
pub mod manager;
pub mod policy;

pub use key::QueryKey;
pub use manager::{CachedData, QueryCache};
pub use policy::{CacheConfig, QueryOptions, RetryPolicy};
