use std::sync::atomic::{AtomicU64, Ordering};

/// Cache statistics for monitoring hit/miss rates and revalidation health.
///
/// Tracks four counters with atomic operations for thread-safe collection at
/// minimal overhead:
///
/// * **fresh hits** - reads served from an entry still inside its TTL
/// * **stale hits** - reads served from an expired entry while a background
///   revalidation was triggered or already running
/// * **misses** - reads with no entry at all (the fetcher was awaited)
/// * **refresh failures** - background revalidations that failed and were
///   swallowed
///
/// All operations use `Relaxed` ordering; counters are monotonic and
/// independent, so no cross-counter consistency is needed.
///
/// # Examples
///
/// ```
/// use requery::CacheStats;
///
/// let stats = CacheStats::new();
/// stats.record_fresh_hit();
/// stats.record_fresh_hit();
/// stats.record_miss();
///
/// assert_eq!(stats.fresh_hits(), 2);
/// assert_eq!(stats.misses(), 1);
/// assert_eq!(stats.total_reads(), 3);
/// assert!((stats.hit_rate() - 0.6666).abs() < 0.001);
/// ```
#[derive(Debug, Default)]
pub struct CacheStats {
    fresh_hits: AtomicU64,
    stale_hits: AtomicU64,
    misses: AtomicU64,
    refresh_failures: AtomicU64,
}

impl CacheStats {
    /// Creates a new `CacheStats` instance with zero counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a read served from a fresh entry.
    #[inline]
    pub fn record_fresh_hit(&self) {
        self.fresh_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a read served from a stale entry.
    #[inline]
    pub fn record_stale_hit(&self) {
        self.stale_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a read that found no entry.
    #[inline]
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a background revalidation that failed.
    #[inline]
    pub fn record_refresh_failure(&self) {
        self.refresh_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of reads served from fresh entries.
    #[inline]
    pub fn fresh_hits(&self) -> u64 {
        self.fresh_hits.load(Ordering::Relaxed)
    }

    /// Returns the number of reads served from stale entries.
    #[inline]
    pub fn stale_hits(&self) -> u64 {
        self.stale_hits.load(Ordering::Relaxed)
    }

    /// Returns the number of reads that found no entry.
    #[inline]
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Returns the number of swallowed background revalidation failures.
    #[inline]
    pub fn refresh_failures(&self) -> u64 {
        self.refresh_failures.load(Ordering::Relaxed)
    }

    /// Returns the total number of reads (fresh hits + stale hits + misses).
    #[inline]
    pub fn total_reads(&self) -> u64 {
        self.fresh_hits() + self.stale_hits() + self.misses()
    }

    /// Returns the fraction of reads served from cache, fresh or stale
    /// (0.0 to 1.0). Returns 0.0 when there have been no reads.
    pub fn hit_rate(&self) -> f64 {
        let total = self.total_reads();
        if total == 0 {
            return 0.0;
        }
        (self.fresh_hits() + self.stale_hits()) as f64 / total as f64
    }
}
