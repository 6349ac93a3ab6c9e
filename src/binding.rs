use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use crate::error::QueryError;
use crate::store::{QueryCache, QueryOptions, DEFAULT_TTL};

/// Type-erased fetcher stored by a binding.
///
/// The binding keeps the fetcher in a replaceable slot and reads it at fetch
/// time, so callers may swap in a new closure at any moment without
/// triggering a fetch.
pub type BoxFetcher<T> =
    Arc<dyn Fn() -> BoxFuture<'static, Result<T, QueryError>> + Send + Sync>;

/// Construction options for [`QueryBinding`].
#[derive(Clone, Debug)]
pub struct BindingOptions<T> {
    /// Age at which the bound entry is served stale. Defaults to 5 minutes.
    pub ttl: Duration,
    /// Value to expose as `data` before the first fetch resolves.
    pub initial_data: Option<T>,
    /// When false, the binding never fetches on its own. Defaults to true.
    pub enabled: bool,
}

impl<T> Default for BindingOptions<T> {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            initial_data: None,
            enabled: true,
        }
    }
}

impl<T> BindingOptions<T> {
    /// Sets the time-to-live used for this binding's reads.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Seeds `data` with a value before the first fetch resolves.
    pub fn initial_data(mut self, data: T) -> Self {
        self.initial_data = Some(data);
        self
    }

    /// Suppresses automatic fetching; the binding stays inert until
    /// [`QueryBinding::set_enabled`] re-enables it.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Snapshot of a binding's consumer-visible state.
///
/// * `data` - last successfully resolved value, or the seeded initial value.
///   A failed fetch never clears it.
/// * `is_loading` - true while a fetch for a key with no cached entry is in
///   flight. A key with an existing entry, even a stale one, is shown
///   without a loading flash.
/// * `error` - failure of the most recent fetch, cleared by the next
///   success.
#[derive(Clone, Debug)]
pub struct QueryState<T> {
    pub data: Option<T>,
    pub is_loading: bool,
    pub error: Option<QueryError>,
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self {
            data: None,
            is_loading: false,
            error: None,
        }
    }
}

struct BindingInner<T: Clone + Send + Sync + 'static> {
    cache: QueryCache<T>,
    ttl: Duration,
    key: Mutex<String>,
    fetcher: Mutex<BoxFetcher<T>>,
    state: Mutex<QueryState<T>>,
    enabled: AtomicBool,
    /// Advanced by every fetch trigger; a resolution is applied only while
    /// its captured generation is still current (last-key-wins).
    generation: AtomicU64,
    changed: Notify,
}

impl<T: Clone + Send + Sync + 'static> BindingInner<T> {
    /// Applies a fetch resolution to consumer state, unless a newer trigger
    /// has superseded it - a stale resolution must not touch state at all.
    fn apply(&self, generation: u64, result: Result<T, QueryError>) {
        if self.generation.load(Ordering::SeqCst) != generation {
            return;
        }

        {
            let mut state = self.state.lock();
            match result {
                Ok(value) => {
                    state.data = Some(value);
                    state.error = None;
                }
                Err(error) => {
                    // Keep whatever data we had; a failed refresh is not a
                    // reason to blank the screen.
                    state.error = Some(error);
                }
            }
            state.is_loading = false;
        }

        self.changed.notify_one();
    }

    /// Marks the binding as loading only when no cached entry exists for
    /// `key`; stale-but-present data is about to be shown and must not
    /// flash a spinner.
    fn mark_loading_if_miss(&self, key: &str) {
        if !self.cache.has(key) {
            self.state.lock().is_loading = true;
        }
    }
}

/// A per-consumer binding connecting a cache key and a fetcher to
/// declarative `data` / `is_loading` / `error` state.
///
/// The binding triggers a fetch through its [`QueryCache`] when it is
/// created and whenever its key changes; the fetcher identity is
/// deliberately not a trigger. It owns its state exclusively - two bindings
/// over the same key share cached values through the store but never share
/// consumer state.
///
/// # Triggering rules
///
/// * Construction (unless [`disabled`](BindingOptions::disabled)) and
///   [`set_key`](Self::set_key) spawn a fetch for the current key.
/// * [`set_fetcher`](Self::set_fetcher) replaces the fetcher without
///   fetching; the next triggered fetch uses the latest closure.
/// * [`refetch`](Self::refetch) forces a fetch that bypasses the cache.
/// * A resolution that arrives after a newer trigger is discarded
///   (last-key-wins), so a slow fetch for an old key can never clobber the
///   state of the current one.
///
/// # Runtime
///
/// Constructing an enabled binding spawns a task, so it must happen within
/// a Tokio runtime.
///
/// # Examples
///
/// ```ignore
/// use requery::{BindingOptions, QueryBinding, QueryCache};
///
/// let cache: QueryCache<Profile> = QueryCache::new();
/// let binding = cache.bind(
///     "profile/student-19",
///     move || fetch_profile(19),
///     BindingOptions::default(),
/// );
///
/// binding.changed().await;
/// if let Some(profile) = binding.data() {
///     render(profile);
/// }
/// ```
pub struct QueryBinding<T: Clone + Send + Sync + 'static> {
    inner: Arc<BindingInner<T>>,
}

impl<T: Clone + Send + Sync + 'static> QueryBinding<T> {
    /// Creates a binding for `key` and, unless disabled, spawns the initial
    /// fetch.
    pub fn new<F, Fut>(
        cache: QueryCache<T>,
        key: impl Into<String>,
        fetcher: F,
        options: BindingOptions<T>,
    ) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, QueryError>> + Send + 'static,
    {
        let fetcher: BoxFetcher<T> = Arc::new(move || Box::pin(fetcher()));
        let binding = Self {
            inner: Arc::new(BindingInner {
                cache,
                ttl: options.ttl,
                key: Mutex::new(key.into()),
                fetcher: Mutex::new(fetcher),
                state: Mutex::new(QueryState {
                    data: options.initial_data,
                    is_loading: false,
                    error: None,
                }),
                enabled: AtomicBool::new(options.enabled),
                generation: AtomicU64::new(0),
                changed: Notify::new(),
            }),
        };
        binding.spawn_fetch();
        binding
    }

    /// Spawns a fetch for the current key, advancing the generation so any
    /// older in-flight resolution is discarded. No-op while disabled.
    fn spawn_fetch(&self) {
        if !self.inner.enabled.load(Ordering::SeqCst) {
            return;
        }

        let inner = Arc::clone(&self.inner);
        let generation = inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let key = inner.key.lock().clone();
        inner.mark_loading_if_miss(&key);

        tokio::spawn(async move {
            // Read the fetcher at fetch time, not at trigger time; a
            // consumer may have replaced it since.
            let fetcher = inner.fetcher.lock().clone();
            let options = QueryOptions::default().ttl(inner.ttl);
            let result = inner.cache.query(&key, move || fetcher(), options).await;
            inner.apply(generation, result);
        });
    }

    /// Points the binding at a new key and triggers a fetch for it.
    ///
    /// Any resolution still in flight for the previous key is superseded and
    /// will be discarded when it lands. Setting the same key again is a
    /// no-op.
    pub fn set_key(&self, key: impl Into<String>) {
        let key = key.into();
        {
            let mut current = self.inner.key.lock();
            if *current == key {
                return;
            }
            *current = key;
        }
        self.spawn_fetch();
    }

    /// Replaces the fetcher without triggering a fetch.
    ///
    /// Fetch triggering depends only on the key; the latest fetcher is read
    /// when a fetch actually runs.
    pub fn set_fetcher<F, Fut>(&self, fetcher: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, QueryError>> + Send + 'static,
    {
        *self.inner.fetcher.lock() = Arc::new(move || Box::pin(fetcher()));
    }

    /// Enables or disables automatic fetching. Re-enabling triggers a fetch
    /// for the current key; disabling leaves existing `data` in place.
    pub fn set_enabled(&self, enabled: bool) {
        let was_enabled = self.inner.enabled.swap(enabled, Ordering::SeqCst);
        if enabled && !was_enabled {
            self.spawn_fetch();
        }
    }

    /// Fetches unconditionally, bypassing the cache, and applies the result
    /// to consumer state before returning it.
    pub async fn refetch(&self) -> Result<T, QueryError> {
        let inner = &self.inner;
        let generation = inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let key = inner.key.lock().clone();
        inner.mark_loading_if_miss(&key);

        let fetcher = inner.fetcher.lock().clone();
        let options = QueryOptions::default().ttl(inner.ttl).force_refresh();
        let result = inner.cache.query(&key, move || fetcher(), options).await;
        inner.apply(generation, result.clone());
        result
    }

    /// Completes once a state update has been applied since the last call.
    ///
    /// A discarded (superseded) resolution does not count; only updates that
    /// actually touched state wake waiters.
    pub async fn changed(&self) {
        self.inner.changed.notified().await;
    }

    /// Returns a snapshot of the consumer-visible state.
    pub fn state(&self) -> QueryState<T> {
        self.inner.state.lock().clone()
    }

    /// Returns the last resolved (or seeded) value, if any.
    pub fn data(&self) -> Option<T> {
        self.inner.state.lock().data.clone()
    }

    /// Returns true while a fetch for an uncached key is in flight.
    pub fn is_loading(&self) -> bool {
        self.inner.state.lock().is_loading
    }

    /// Returns the most recent fetch failure, if the latest fetch failed.
    pub fn error(&self) -> Option<QueryError> {
        self.inner.state.lock().error.clone()
    }

    /// Returns the key the binding currently points at.
    pub fn key(&self) -> String {
        self.inner.key.lock().clone()
    }

    /// Returns true if automatic fetching is enabled.
    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::SeqCst)
    }
}

impl<T: Clone + Send + Sync + 'static> QueryCache<T> {
    /// Creates a [`QueryBinding`] over this cache. See [`QueryBinding::new`].
    pub fn bind<F, Fut>(
        &self,
        key: impl Into<String>,
        fetcher: F,
        options: BindingOptions<T>,
    ) -> QueryBinding<T>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, QueryError>> + Send + 'static,
    {
        QueryBinding::new(self.clone(), key, fetcher, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_initial_data_is_visible_before_resolution() {
        let cache: QueryCache<u32> = QueryCache::new();
        let binding = cache.bind(
            "seeded",
            || async { Ok(2) },
            BindingOptions::default().initial_data(1).disabled(),
        );

        assert_eq!(binding.data(), Some(1));
        assert!(!binding.is_loading());
        assert!(binding.error().is_none());
    }

    #[tokio::test]
    async fn test_disabled_binding_never_fetches() {
        let cache: QueryCache<u32> = QueryCache::new();
        let binding = cache.bind(
            "inert",
            || async { panic!("disabled binding fetched") },
            BindingOptions::default().disabled(),
        );

        tokio::task::yield_now().await;
        assert!(binding.data().is_none());
        assert!(!binding.is_loading());
        assert!(!cache.has("inert"));
        assert!(!binding.is_enabled());
    }

    #[tokio::test]
    async fn test_mount_resolves_data() {
        let cache: QueryCache<&'static str> = QueryCache::new();
        let binding = cache.bind(
            "greeting",
            || async { Ok("hello") },
            BindingOptions::default(),
        );

        binding.changed().await;
        assert_eq!(binding.data(), Some("hello"));
        assert!(!binding.is_loading());
        assert!(binding.error().is_none());
    }

    #[tokio::test]
    async fn test_set_same_key_does_not_retrigger() {
        let cache: QueryCache<u32> = QueryCache::new();
        let binding = cache.bind("stable", || async { Ok(5) }, BindingOptions::default());
        binding.changed().await;

        let generation_before = binding.inner.generation.load(Ordering::SeqCst);
        binding.set_key("stable");
        assert_eq!(
            binding.inner.generation.load(Ordering::SeqCst),
            generation_before
        );
    }
}
