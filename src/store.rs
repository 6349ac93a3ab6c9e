use dashmap::DashMap;
use regex::Regex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::entry::CacheEntry;
use crate::error::QueryError;
#[cfg(feature = "stats")]
use crate::stats::CacheStats;

/// Default time-to-live for cached entries: 5 minutes.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Per-call options for [`QueryCache::query`].
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use requery::QueryOptions;
///
/// let opts = QueryOptions::default().ttl(Duration::from_secs(30));
/// assert!(!opts.force_refresh);
///
/// let forced = QueryOptions::default().force_refresh();
/// assert!(forced.force_refresh);
/// ```
#[derive(Clone, Debug)]
pub struct QueryOptions {
    /// Age at which a cached entry is considered stale.
    pub ttl: Duration,
    /// Discard any cached entry and fetch unconditionally.
    pub force_refresh: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            force_refresh: false,
        }
    }
}

impl QueryOptions {
    /// Sets the time-to-live after which an entry is served stale.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Requests an unconditional fetch, discarding any cached entry first.
    pub fn force_refresh(mut self) -> Self {
        self.force_refresh = true;
        self
    }
}

/// How a `query` call will be served, decided in one step under the entry
/// guard so concurrent callers on the same key never observe a half-applied
/// transition.
enum ReadPlan<T> {
    /// Entry exists and is inside its TTL.
    Fresh(T),
    /// Entry exists but is stale; `start_refresh` is true for exactly one
    /// caller, which owns the background revalidation.
    Stale { value: T, start_refresh: bool },
    /// No entry at all; the caller must await the fetcher.
    Miss,
}

struct Inner<T> {
    entries: DashMap<String, CacheEntry<T>>,
    #[cfg(feature = "stats")]
    stats: CacheStats,
}

/// A keyed query cache with stale-while-revalidate semantics.
///
/// The cache maps string keys to values of a single type `T`. A read for a
/// key is served in one of three ways:
///
/// * **fresh hit** - the entry is inside its TTL; the cached value is
///   returned and no fetch happens.
/// * **stale hit** - the entry has outlived its TTL; the cached value is
///   returned immediately and the fetcher is spawned on the Tokio runtime to
///   revalidate in the background. At most one revalidation runs per key; a
///   failed revalidation is logged and swallowed, keeping the stale entry
///   serviceable.
/// * **true miss** - no entry exists; the fetcher is awaited and its failure
///   propagates to the caller.
///
/// Readers never block on a background revalidation; only a true miss or an
/// explicit [`force_refresh`](QueryOptions::force_refresh) awaits the
/// fetcher.
///
/// Entries leave the cache only through [`invalidate`](Self::invalidate),
/// [`invalidate_pattern`](Self::invalidate_pattern), or
/// [`clear`](Self::clear) - there is no timer-driven expiry and no eviction.
///
/// # Construction and sharing
///
/// `QueryCache` is an explicitly constructed handle around shared state:
/// cloning it is cheap and every clone reads and writes the same entries.
/// There is no global instance; inject a clone wherever cached reads are
/// needed, and construct a private instance in tests.
///
/// # Runtime
///
/// The stale-hit path spawns the revalidation with `tokio::spawn`, so
/// `query` must be called from within a Tokio runtime.
///
/// # Examples
///
/// ```ignore
/// use requery::{QueryCache, QueryOptions};
///
/// let cache: QueryCache<Vec<Job>> = QueryCache::new();
///
/// let jobs = cache
///     .query("jobs/open", || fetch_open_jobs(), QueryOptions::default())
///     .await?;
/// ```
pub struct QueryCache<T: Clone + Send + Sync + 'static> {
    inner: Arc<Inner<T>>,
}

impl<T: Clone + Send + Sync + 'static> Clone for QueryCache<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Default for QueryCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> QueryCache<T> {
    /// Creates a new, empty cache.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: DashMap::new(),
                #[cfg(feature = "stats")]
                stats: CacheStats::new(),
            }),
        }
    }

    /// Serves the value for `key`, consulting the cache first.
    ///
    /// Decision order:
    ///
    /// 1. `force_refresh`: remove any existing entry, await the fetcher,
    ///    store the result, return it. A failure propagates and nothing is
    ///    written - the old entry is already gone. Forced refresh means "new
    ///    truth even if I momentarily have none cached".
    /// 2. Fresh entry: return the cached value without fetching.
    /// 3. Stale entry, no revalidation in flight: mark the entry as
    ///    refreshing, return the stale value, and spawn the fetcher in the
    ///    background. Success replaces the entry; failure is logged, keeps
    ///    the stale entry, and clears the refreshing flag so a later read
    ///    may retry.
    /// 4. Stale entry, revalidation already in flight: return the stale
    ///    value without starting a second fetch for the same key.
    /// 5. True miss: await the fetcher, store the result, return it. A
    ///    failure propagates and nothing is stored.
    ///
    /// The hit/stale/miss decision and the flip of the refreshing flag are
    /// applied atomically under the entry's map guard, with no `await` while
    /// the guard is held.
    ///
    /// # Arguments
    ///
    /// * `key` - Non-empty string identifying the resource.
    /// * `fetcher` - Zero-argument closure producing the value; invoked at
    ///   most once per call.
    /// * `options` - TTL and force-refresh controls.
    ///
    /// # Errors
    ///
    /// Returns the fetcher's error on a true miss or a forced refresh.
    /// Background revalidation failures never reach the caller.
    pub async fn query<F, Fut>(
        &self,
        key: &str,
        fetcher: F,
        options: QueryOptions,
    ) -> Result<T, QueryError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, QueryError>> + Send + 'static,
    {
        if options.force_refresh {
            self.inner.entries.remove(key);
            let value = fetcher().await?;
            self.inner
                .entries
                .insert(key.to_string(), CacheEntry::new(value.clone()));
            return Ok(value);
        }

        let plan = match self.inner.entries.get_mut(key) {
            Some(mut entry) => {
                if !entry.is_stale(options.ttl) {
                    ReadPlan::Fresh(entry.value.clone())
                } else if entry.refreshing {
                    ReadPlan::Stale {
                        value: entry.value.clone(),
                        start_refresh: false,
                    }
                } else {
                    entry.refreshing = true;
                    ReadPlan::Stale {
                        value: entry.value.clone(),
                        start_refresh: true,
                    }
                }
            }
            None => ReadPlan::Miss,
        };

        match plan {
            ReadPlan::Fresh(value) => {
                #[cfg(feature = "stats")]
                self.inner.stats.record_fresh_hit();

                Ok(value)
            }
            ReadPlan::Stale {
                value,
                start_refresh,
            } => {
                #[cfg(feature = "stats")]
                self.inner.stats.record_stale_hit();

                if start_refresh {
                    self.spawn_refresh(key.to_string(), fetcher());
                }
                Ok(value)
            }
            ReadPlan::Miss => {
                #[cfg(feature = "stats")]
                self.inner.stats.record_miss();

                let value = fetcher().await?;
                self.inner
                    .entries
                    .insert(key.to_string(), CacheEntry::new(value.clone()));
                Ok(value)
            }
        }
    }

    /// Spawns a background revalidation for `key`.
    ///
    /// The caller has already set the entry's refreshing flag; this task is
    /// the only one allowed to clear it (by replacing the entry on success
    /// or resetting the flag on failure).
    fn spawn_refresh<Fut>(&self, key: String, fut: Fut)
    where
        Fut: Future<Output = Result<T, QueryError>> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        debug!(key = %key, "revalidating stale entry in background");

        tokio::spawn(async move {
            match fut.await {
                Ok(value) => {
                    // Replaces value and timestamp together; the fresh entry
                    // starts with refreshing = false.
                    inner.entries.insert(key, CacheEntry::new(value));
                }
                Err(error) => {
                    warn!(key = %key, %error, "background revalidation failed, keeping stale entry");

                    #[cfg(feature = "stats")]
                    inner.stats.record_refresh_failure();

                    if let Some(mut entry) = inner.entries.get_mut(&key) {
                        entry.refreshing = false;
                    }
                }
            }
        });
    }

    /// Returns true if an entry exists for `key`, fresh or stale.
    pub fn has(&self, key: &str) -> bool {
        self.inner.entries.contains_key(key)
    }

    /// Removes the entry for `key`, if present. The next `query` for the key
    /// is a true miss.
    pub fn invalidate(&self, key: &str) {
        self.inner.entries.remove(key);
    }

    /// Removes every entry whose key matches `pattern`.
    ///
    /// Used to bulk-invalidate families of related keys, e.g.
    /// `invalidate_pattern(&Regex::new("^jobs/").unwrap())` after a posting
    /// changes.
    ///
    /// # Returns
    ///
    /// Number of entries removed.
    pub fn invalidate_pattern(&self, pattern: &Regex) -> usize {
        let matching: Vec<String> = self
            .inner
            .entries
            .iter()
            .filter(|entry| pattern.is_match(entry.key()))
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = 0;
        for key in matching {
            if self.inner.entries.remove(&key).is_some() {
                removed += 1;
            }
        }
        removed
    }

    /// Removes all entries.
    pub fn clear(&self) {
        self.inner.entries.clear();
    }

    /// Returns the number of entries currently cached, fresh or stale.
    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    /// Returns true if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    /// Returns the cache's statistics counters.
    #[cfg(feature = "stats")]
    pub fn stats(&self) -> &CacheStats {
        &self.inner.stats
    }
}
