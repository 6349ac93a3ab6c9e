//! Integration tests for the consumer-side query binding.

use requery::{BindingOptions, QueryCache, QueryError, QueryOptions};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[tokio::test]
async fn mounting_over_a_miss_shows_a_loading_state() {
    let cache: QueryCache<&'static str> = QueryCache::new();
    let binding = cache.bind("fresh-key", || async { Ok("loaded") }, BindingOptions::default());

    // The spawned fetch has not run yet on the current-thread runtime; the
    // loading flag was set synchronously because the key has no entry.
    assert!(binding.is_loading());
    assert!(binding.data().is_none());

    binding.changed().await;
    assert!(!binding.is_loading());
    assert_eq!(binding.data(), Some("loaded"));
    assert!(binding.error().is_none());
}

#[tokio::test]
async fn mounting_over_an_existing_entry_never_flashes_loading() {
    let cache: QueryCache<&'static str> = QueryCache::new();
    cache
        .query("warm-key", || async { Ok("warm") }, QueryOptions::default())
        .await
        .unwrap();

    let binding = cache.bind("warm-key", || async { Ok("warm") }, BindingOptions::default());
    assert!(!binding.is_loading());

    binding.changed().await;
    assert_eq!(binding.data(), Some("warm"));
    assert!(!binding.is_loading());
}

#[tokio::test]
async fn failed_fetch_surfaces_error_and_keeps_data() {
    let cache: QueryCache<u32> = QueryCache::new();
    let binding = cache.bind(
        "flaky",
        || async { Err(QueryError::message("backend down")) },
        BindingOptions::default().initial_data(7),
    );

    binding.changed().await;
    let state = binding.state();
    assert_eq!(state.error.unwrap().to_string(), "backend down");
    // Good data is never cleared by a failed refresh.
    assert_eq!(state.data, Some(7));
    assert!(!state.is_loading);
}

#[tokio::test]
async fn successful_fetch_clears_a_previous_error() {
    let cache: QueryCache<u32> = QueryCache::new();
    let binding = cache.bind(
        "recovering",
        || async { Err(QueryError::message("first attempt failed")) },
        BindingOptions::default(),
    );
    binding.changed().await;
    assert!(binding.error().is_some());

    binding.set_fetcher(|| async { Ok(11) });
    let v = binding.refetch().await.unwrap();
    assert_eq!(v, 11);
    assert_eq!(binding.data(), Some(11));
    assert!(binding.error().is_none());
}

#[tokio::test]
async fn refetch_bypasses_a_fresh_entry() {
    let cache: QueryCache<u32> = QueryCache::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let fetch_calls = Arc::clone(&calls);
    let binding = cache.bind(
        "counter",
        move || {
            let n = fetch_calls.fetch_add(1, Ordering::SeqCst) as u32;
            async move { Ok(n) }
        },
        BindingOptions::default(),
    );
    binding.changed().await;
    assert_eq!(binding.data(), Some(0));

    // The entry is fresh, but refetch must hit the fetcher anyway.
    let v = binding.refetch().await.unwrap();
    assert_eq!(v, 1);
    assert_eq!(binding.data(), Some(1));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn late_resolution_for_a_superseded_key_is_discarded() {
    let cache: QueryCache<String> = QueryCache::new();
    let gate = Arc::new(Notify::new());

    // The fetch for the first key blocks until the gate opens.
    let fetch_gate = Arc::clone(&gate);
    let binding = cache.bind(
        "slow-key",
        move || {
            let gate = Arc::clone(&fetch_gate);
            async move {
                gate.notified().await;
                Ok("slow".to_string())
            }
        },
        BindingOptions::default(),
    );
    tokio::task::yield_now().await;
    assert!(binding.is_loading());

    // Supersede it before it resolves.
    binding.set_fetcher(|| async { Ok("fast".to_string()) });
    binding.set_key("fast-key");
    binding.changed().await;
    assert_eq!(binding.data(), Some("fast".to_string()));
    assert!(!binding.is_loading());

    // Let the old fetch finish; its resolution must not clobber state.
    gate.notify_waiters();
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert_eq!(binding.data(), Some("fast".to_string()));
    assert!(binding.error().is_none());
    assert!(!binding.is_loading());
}

#[tokio::test]
async fn key_change_refetches_with_the_latest_fetcher() {
    let cache: QueryCache<u32> = QueryCache::new();
    let binding = cache.bind("first", || async { Ok(1) }, BindingOptions::default());
    binding.changed().await;
    assert_eq!(binding.data(), Some(1));

    // Replacing the fetcher alone triggers nothing.
    binding.set_fetcher(|| async { Ok(2) });
    tokio::task::yield_now().await;
    assert_eq!(binding.data(), Some(1));

    // The key change does, and it uses the latest fetcher.
    binding.set_key("second");
    binding.changed().await;
    assert_eq!(binding.data(), Some(2));
    assert_eq!(binding.key(), "second");
}

#[tokio::test]
async fn enabling_a_disabled_binding_triggers_a_fetch() {
    let cache: QueryCache<u32> = QueryCache::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let fetch_calls = Arc::clone(&calls);
    let binding = cache.bind(
        "gated",
        move || {
            fetch_calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(3) }
        },
        BindingOptions::default().disabled(),
    );

    // Inert while disabled, even across key changes.
    binding.set_key("gated-2");
    tokio::task::yield_now().await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(binding.data().is_none());

    binding.set_enabled(true);
    binding.changed().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(binding.data(), Some(3));
}

#[tokio::test]
async fn bindings_share_the_store_but_not_consumer_state() {
    let cache: QueryCache<u32> = QueryCache::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let first_calls = Arc::clone(&calls);
    let first = cache.bind(
        "shared-key",
        move || {
            first_calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(42) }
        },
        BindingOptions::default(),
    );
    first.changed().await;

    // The second binding mounts over the entry the first one populated: no
    // loading flash, no second fetch, but its own error/data cells.
    let second_calls = Arc::clone(&calls);
    let second = cache.bind(
        "shared-key",
        move || {
            second_calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(42) }
        },
        BindingOptions::default(),
    );
    assert!(!second.is_loading());
    second.changed().await;
    assert_eq!(second.data(), Some(42));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
