use std::time::Duration;
use tokio::time::Instant;

/// Internal wrapper that tracks when a value was stored and whether a
/// background revalidation for it is currently in flight.
///
/// Each cached value is wrapped in a `CacheEntry` which records the storage
/// timestamp using `tokio::time::Instant::now()`. Staleness is evaluated
/// lazily at read time against a caller-supplied TTL; entries never expire on
/// a timer by themselves.
///
/// The `value` and `stored_at` fields are always written together: a
/// successful fetch replaces the whole entry, never one field at a time.
///
/// # Type Parameters
///
/// * `T` - The type of the cached value
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use requery::CacheEntry;
///
/// let entry = CacheEntry::new(42);
/// assert_eq!(entry.value, 42);
/// assert!(!entry.refreshing);
///
/// // A brand new entry is fresh for any positive TTL.
/// assert!(!entry.is_stale(Duration::from_secs(60)));
///
/// // A zero TTL makes every entry stale immediately.
/// assert!(entry.is_stale(Duration::ZERO));
/// ```
#[derive(Clone, Debug)]
pub struct CacheEntry<T> {
    pub value: T,
    pub stored_at: Instant,
    pub refreshing: bool,
}

impl<T> CacheEntry<T> {
    /// Creates a new cache entry with the current timestamp and no
    /// revalidation in flight.
    pub fn new(value: T) -> Self {
        Self {
            value,
            stored_at: Instant::now(),
            refreshing: false,
        }
    }

    /// Returns true if the entry's age has reached the given TTL.
    ///
    /// Staleness is inclusive: an entry whose age equals the TTL exactly is
    /// already stale.
    pub fn is_stale(&self, ttl: Duration) -> bool {
        self.stored_at.elapsed() >= ttl
    }
}
