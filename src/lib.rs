//! # Requery
//!
//! A stale-while-revalidate query cache for async Rust, with per-consumer
//! bindings exposing declarative `data` / `is_loading` / `error` state.
//!
//! This crate provides the building blocks for serving named, asynchronously
//! fetched values out of a shared in-memory cache: fresh values are served
//! without fetching, stale values are served instantly while a background
//! revalidation runs, and only true misses make the caller wait.
//!
//! ## Features
//!
//! - **Stale-while-revalidate**: stale reads return immediately and refresh
//!   in the background
//! - **Refresh de-duplication**: at most one in-flight revalidation per key
//! - **Explicit invalidation**: by key, by regex pattern, or wholesale
//! - **Consumer bindings**: loading/error/refetch state per consumer, with
//!   last-key-wins ordering for superseded fetches
//! - **Key construction**: deterministic, order-sensitive key helper
//! - **Statistics**: hit/miss/refresh counters (with the `stats` feature)
//!
//! ## Module Organization
//!
//! - [`entry`](CacheEntry) - entry wrapper with storage timestamp and
//!   refreshing flag
//! - [`store`](QueryCache) - the shared stale-while-revalidate store
//! - [`binding`](QueryBinding) - per-consumer state over a key and fetcher
//! - [`keys`](cache_key) - cache key generation
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::time::Duration;
//! use requery::{QueryCache, QueryOptions};
//!
//! let cache: QueryCache<Vec<Job>> = QueryCache::new();
//!
//! // True miss: awaits the fetcher and stores the result.
//! let jobs = cache
//!     .query(
//!         "jobs/open",
//!         || fetch_open_jobs(),
//!         QueryOptions::default().ttl(Duration::from_secs(60)),
//!     )
//!     .await?;
//!
//! // Within the TTL: served from cache, no fetch.
//! // After the TTL: served stale, revalidated in the background.
//! ```
//!
//! The cache is an injectable handle, not a global: clone it to share, or
//! construct a private instance per test.

mod binding;
mod entry;
mod error;
mod keys;
mod store;

#[cfg(feature = "stats")]
mod stats;

pub use binding::{BindingOptions, BoxFetcher, QueryBinding, QueryState};
pub use entry::CacheEntry;
pub use error::QueryError;
pub use keys::{cache_key, CacheableKey};
pub use store::{QueryCache, QueryOptions, DEFAULT_TTL};

#[cfg(feature = "stats")]
pub use stats::CacheStats;
