/// Caching behavior tests
///
/// These tests verify the at-most-one-construction guarantee, cache identity
/// per key, default-key override and the poisoning of failed keys.

use ferrous_provide::{provide, Provider, ProvideError, ResolveOptions};
use futures::future::join_all;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn counted(id: &str, runs: &Arc<AtomicU32>) -> Provider {
    let runs = runs.clone();
    provide(id).by(move |_| {
        let n = runs.fetch_add(1, Ordering::SeqCst) + 1;
        async move {
            // Yield so concurrent callers overlap the construction.
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok(format!("instance-{}", n))
        }
    })
}

#[tokio::test]
async fn test_concurrent_same_key_constructs_once() {
    let runs = Arc::new(AtomicU32::new(0));
    let p = counted("p", &runs);

    let results = join_all((0..16).map(|_| p.get_cached::<String>("shared"))).await;
    let first = results[0].as_ref().unwrap().clone();
    for result in &results {
        assert!(Arc::ptr_eq(result.as_ref().unwrap(), &first));
    }
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_same_key_across_threads() {
    let runs = Arc::new(AtomicU32::new(0));
    let p = counted("p", &runs).singleton();

    let handles: Vec<_> = (0..32)
        .map(|_| {
            let p = p.clone();
            tokio::spawn(async move { p.get::<String>().await })
        })
        .collect();

    let mut instances = Vec::new();
    for handle in handles {
        instances.push(handle.await.unwrap().unwrap());
    }
    assert!(instances.iter().all(|i| Arc::ptr_eq(i, &instances[0])));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_distinct_keys_construct_independently() {
    let runs = Arc::new(AtomicU32::new(0));
    let p = counted("p", &runs);

    let keyed = join_all((0..5).map(|i| p.get_cached::<String>(format!("key-{}", i)))).await;
    assert_eq!(runs.load(Ordering::SeqCst), 5);
    assert_eq!(p.inspect().len(), 5);

    let uncached = join_all((0..5).map(|_| p.get::<String>())).await;
    assert_eq!(runs.load(Ordering::SeqCst), 10);
    assert_eq!(p.inspect().len(), 5);

    let a = keyed[0].as_ref().unwrap();
    let b = keyed[1].as_ref().unwrap();
    assert!(!Arc::ptr_eq(a, b));
    assert!(uncached.iter().all(|r| r.is_ok()));
}

#[tokio::test]
async fn test_same_key_returns_same_instance() {
    let runs = Arc::new(AtomicU32::new(0));
    let p = counted("p", &runs);

    let a = p.get_cached::<String>("k").await.unwrap();
    let b = p.get_cached::<String>("k").await.unwrap();
    assert!(Arc::ptr_eq(&a, &b));

    let resolution = p.resolve_cached("k");
    assert!(resolution.ptr_eq(&p.inspect().get("k").unwrap()));
}

#[tokio::test]
async fn test_default_key_override() {
    let runs = Arc::new(AtomicU32::new(0));
    let p = counted("p", &runs).persisted("main");

    let implicit = p.get::<String>().await.unwrap();
    let explicit = p.get_cached::<String>("main").await.unwrap();
    let other = p.get_cached::<String>("other").await.unwrap();

    assert!(Arc::ptr_eq(&implicit, &explicit));
    assert!(!Arc::ptr_eq(&implicit, &other));
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_singleton_and_once_share_the_fixed_key() {
    let runs = Arc::new(AtomicU32::new(0));
    let p = counted("p", &runs);

    assert_eq!(p.singleton().default_cache_key(), Some(ferrous_provide::SINGLETON_KEY));
    assert_eq!(p.once().default_cache_key(), Some("singleton"));
    assert!(p.is_transient());
    assert!(p.singleton().transient().is_transient());
}

#[tokio::test]
async fn test_cache_is_populated_before_settling() {
    let p = provide("slow")
        .by(|_| async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(1u8)
        })
        .singleton();

    let pending = p.resolve();
    assert!(p.inspect().contains("singleton"));
    assert!(pending.peek().is_none());

    assert_eq!(*pending.typed::<u8>().await.unwrap(), 1);
    assert!(matches!(p.inspect().get("singleton").unwrap().peek(), Some(Ok(_))));
}

#[tokio::test]
async fn test_failed_resolution_poisons_key_until_disposed() {
    let runs = Arc::new(AtomicU32::new(0));
    let counter = runs.clone();
    let p = provide("flaky")
        .by(move |_| {
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    Err(ProvideError::msg("first attempt fails"))
                } else {
                    Ok(attempt)
                }
            }
        })
        .singleton();

    assert!(p.get::<u32>().await.is_err());
    // Same rejected resolution, no retry.
    assert!(p.get::<u32>().await.is_err());
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    p.dispose(Some("singleton")).await.unwrap();
    assert_eq!(*p.get::<u32>().await.unwrap(), 1);
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_group_passes_same_key_to_every_member() {
    let runs = Arc::new(AtomicU32::new(0));
    let a = counted("a", &runs);
    let b = counted("b", &runs);
    let g = ferrous_provide::group([a.clone(), b.clone()]);

    let first = g.resolve_with(ResolveOptions::cached("batch")).await.unwrap();
    let second = g.resolve_with(ResolveOptions::cached("batch")).await.unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 2);
    assert!(Arc::ptr_eq(&first.get::<String>("a").unwrap(), &second.get::<String>("a").unwrap()));
    assert!(a.inspect().contains("batch"));
    assert!(b.inspect().contains("batch"));

    g.dispose(Some("batch")).await.unwrap();
    assert!(a.inspect().is_empty());
    assert!(b.inspect().is_empty());
}
