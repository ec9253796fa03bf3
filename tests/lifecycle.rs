use ferrous_provide::{group, provide, Lifecycle, ProvideError, Scope};
use std::sync::{Arc, Mutex};

type Log = Arc<Mutex<Vec<String>>>;

type Hook = futures::future::Ready<ferrous_provide::ProvideResult<()>>;

fn record(log: &Log, entry: &str) -> impl Fn() -> Hook + Send + Sync + 'static {
    let log = log.clone();
    let entry = entry.to_string();
    move || {
        log.lock().unwrap().push(entry.clone());
        futures::future::ready(Ok(()))
    }
}

fn sorted(log: &Log) -> Vec<String> {
    let mut entries = log.lock().unwrap().clone();
    entries.sort();
    entries
}

#[tokio::test]
async fn test_group_start_fires_own_and_member_hooks() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let a = provide("a");
    let b = provide("b");
    a.on_start(record(&log, "a"));
    b.on_start(record(&log, "b"));

    let g = group([a.clone(), b.clone()]);
    g.on_start(record(&log, "group"));

    g.start().await.unwrap();
    assert_eq!(sorted(&log), vec!["a", "b", "group"]);

    // Group hooks live on the group only.
    log.lock().unwrap().clear();
    a.start().await.unwrap();
    assert_eq!(sorted(&log), vec!["a"]);
    assert_eq!(g.lifecycle().start_hooks(), 1);
    assert_eq!(a.lifecycle().start_hooks(), 1);
}

#[tokio::test]
async fn test_group_stop_reports_failures_after_running_everything() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let a = provide("a").by(|_| async { Ok(1u8) }).singleton();
    let b = provide("b");
    a.on_stop(record(&log, "a"));
    b.on_stop(|| async { Err(ProvideError::Hook("b refused".to_string())) });

    a.get::<u8>().await.unwrap();
    let g = group([a.clone(), b]);
    let err = g.stop(true).await.unwrap_err();

    assert!(matches!(err, ProvideError::Hook(ref m) if m == "b refused"));
    assert_eq!(sorted(&log), vec!["a"]);
    assert!(a.inspect().is_empty());
}

#[tokio::test]
async fn test_resolver_registered_hooks_fire_with_group() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let hooks = log.clone();
    let server = provide("server")
        .by_with_lifecycle(move |_, lifecycle: Lifecycle| {
            lifecycle.on_start(record(&hooks, "listen"));
            lifecycle.on_stop(record(&hooks, "shutdown"));
            async { Ok("server".to_string()) }
        })
        .singleton();

    let g = group([server.clone()]);
    g.resolve().await.unwrap();
    g.start().await.unwrap();
    g.stop(true).await.unwrap();

    assert_eq!(*log.lock().unwrap(), vec!["listen".to_string(), "shutdown".to_string()]);
    assert!(server.inspect().is_empty());
}

#[tokio::test]
async fn test_scope_tracks_added_and_removed_providers() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let scope = Scope::default();
    let kept = provide("kept");
    let removed = provide("removed");
    kept.on_stop(record(&log, "kept"));
    removed.on_stop(record(&log, "removed"));
    scope.on_stop(record(&log, "scope"));

    assert!(scope.add(kept.clone()));
    assert!(scope.add(removed.clone()));
    assert!(!scope.add(kept.clone()));
    assert!(scope.remove(&removed));
    assert!(!scope.remove(&removed));
    assert_eq!(scope.len(), 1);

    scope.stop(false).await.unwrap();
    assert_eq!(sorted(&log), vec!["kept", "scope"]);
}

#[tokio::test]
async fn test_scope_dispose_and_group_snapshot() {
    let a = provide("a").by(|_| async { Ok(1u8) }).singleton();
    let b = provide("b").by(|_| async { Ok(2u8) }).singleton();
    let scope = Scope::new([a.clone(), b.clone()]);

    let out = scope.group().resolve().await.unwrap();
    assert_eq!(out.len(), 2);
    assert_eq!(a.inspect().len(), 1);

    scope.dispose(Some("singleton")).await.unwrap();
    assert!(a.inspect().is_empty());
    assert!(b.inspect().is_empty());
}
