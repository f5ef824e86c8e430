mod fixtures;

use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use serde_json::json;

use fixtures::*;
use flexiflight::cache::ResponseCache;
use flexiflight::error::FetchError;
use flexiflight::fetcher::{FetchConfig, FlightFetcher, ProviderQuery};

#[test]
fn test_concurrent_misses_on_one_fingerprint_fetch_once() {
    let cache = Arc::new(ResponseCache::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                cache
                    .get_or_fetch("flight_search:abc", || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(50));
                        Ok(json!({"price": 500}))
                    })
                    .unwrap()
            })
        })
        .collect();

    for handle in handles {
        let response = handle.join().unwrap();
        assert_eq!(response.body, json!({"price": 500}));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.misses(), 1);
    assert_eq!(cache.hits(), 7);
}

#[test]
fn test_waiters_share_a_failure_and_the_next_call_retries() {
    let cache = Arc::new(ResponseCache::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(4));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                cache.get_or_fetch("k", || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(50));
                    Err(FetchError::RateLimited)
                })
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap().unwrap_err(), FetchError::RateLimited);
    }
    // Late arrivals may start a second attempt after the first one failed,
    // but never more than one per thread.
    assert!(calls.load(Ordering::SeqCst) <= 4);
    assert!(cache.is_empty());

    let retry = cache.get_or_fetch("k", || Ok(json!("ok"))).unwrap();
    assert_eq!(retry.body, json!("ok"));
}

#[test]
fn test_distinct_fingerprints_fetch_in_parallel() {
    let cache = Arc::new(ResponseCache::new());
    let barrier = Arc::new(Barrier::new(4));

    let started = std::time::Instant::now();
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                cache
                    .get_or_fetch(&format!("k{}", i), || {
                        thread::sleep(Duration::from_millis(200));
                        Ok(json!(i))
                    })
                    .unwrap()
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(cache.len(), 4);
    assert_eq!(cache.misses(), 4);
    // Serialized misses would take at least 800ms.
    assert!(started.elapsed() < Duration::from_millis(700));
}

#[test]
fn test_fetcher_single_flight_through_provider() {
    let day = date(2026, 5, 1);
    let provider = Arc::new(StubProvider::fixed(vec![nonstop_yow_cdg(day, 640.0)]).with_delay(Duration::from_millis(50)));
    let fetcher = Arc::new(FlightFetcher::new(
        provider.clone(),
        Arc::new(ResponseCache::new()),
        FetchConfig::default(),
    ));
    let request = one_way("YOW", "CDG", day, day);
    let strategy = one_way_strategy("YOW", "CDG", day);
    let barrier = Arc::new(Barrier::new(6));

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let fetcher = Arc::clone(&fetcher);
            let request = request.clone();
            let strategy = strategy.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                fetcher.quote(&strategy, &request).unwrap()
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap().len(), 1);
    }

    assert_eq!(provider.calls(), 1);
    assert_eq!(fetcher.budget().used(), 1);
}

#[test]
fn test_persisted_cache_round_trips_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache").join("flights.jsonl");

    let cache = ResponseCache::new();
    cache.get_or_fetch("flight_search:a", || Ok(json!({"best_flights": []}))).unwrap();
    cache.get_or_fetch("flight_search:b", || Ok(json!([1, 2, 3]))).unwrap();
    assert_eq!(cache.flush(&path).unwrap(), 2);

    let reloaded = ResponseCache::load(&path).unwrap();
    assert_eq!(reloaded.len(), 2);
    let hit = reloaded
        .get_or_fetch("flight_search:b", || panic!("persisted entry must be a hit"))
        .unwrap();
    assert_eq!(hit.body, json!([1, 2, 3]));
    assert_eq!(reloaded.hits(), 1);
}

#[test]
fn test_corrupt_lines_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("flights.jsonl");
    let good = json!({
        "fingerprint": "flight_search:good",
        "fetched_at": "2026-04-01T12:00:00Z",
        "response": {"price": 700}
    });
    fs::write(
        &path,
        format!("{}\nnot json at all\n{{\"fingerprint\": \"truncated\"\n\n", good),
    )
    .unwrap();

    let cache = ResponseCache::load(&path).unwrap();
    assert_eq!(cache.len(), 1);

    let mut fetched = false;
    cache
        .get_or_fetch("truncated", || {
            fetched = true;
            Ok(json!(null))
        })
        .unwrap();
    assert!(fetched, "a corrupt entry behaves as a miss");
}

#[test]
fn test_unreadable_persisted_entry_is_refetched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("flights.jsonl");
    let day = date(2026, 5, 1);
    let request = one_way("YOW", "CDG", day, day);
    let strategy = one_way_strategy("YOW", "CDG", day);
    let fingerprint = ProviderQuery::from_strategy(&strategy, &request).fingerprint();

    // Valid JSON, but not a body the provider can normalize.
    let line = json!({
        "fingerprint": fingerprint,
        "fetched_at": "2026-04-01T12:00:00Z",
        "response": {"bogus": true}
    });
    fs::write(&path, format!("{}\n", line)).unwrap();

    let provider = Arc::new(StubProvider::fixed(vec![nonstop_yow_cdg(day, 640.0)]));
    let cache = Arc::new(ResponseCache::load(&path).unwrap());
    let fetcher = FlightFetcher::new(provider.clone(), Arc::clone(&cache), FetchConfig::default());

    let first = fetcher.quote(&strategy, &request).unwrap();
    assert_eq!(first[0].price, 640.0);
    assert_eq!(provider.calls(), 1);
    assert_eq!(fetcher.budget().used(), 1);

    // The repaired entry is what gets served and persisted from now on.
    let second = fetcher.quote(&strategy, &request).unwrap();
    assert_eq!(second, first);
    assert_eq!(provider.calls(), 1);
    cache.flush(&path).unwrap();
    assert!(!fs::read_to_string(&path).unwrap().contains("bogus"));
}

#[test]
fn test_missing_file_is_an_empty_cache() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ResponseCache::load(&dir.path().join("absent.jsonl")).unwrap();
    assert!(cache.is_empty());
}
