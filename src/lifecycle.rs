//! Start/stop hook broker for providers, groups and scopes.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::{join_all, BoxFuture, FutureExt};
use parking_lot::Mutex;
use tracing::debug;

use crate::ProvideResult;

type Hook = Arc<dyn Fn() -> BoxFuture<'static, ProvideResult<()>> + Send + Sync>;

#[derive(Default)]
struct LifecycleInner {
    start: Mutex<Vec<Hook>>,
    stop: Mutex<Vec<Hook>>,
}

/// Lifecycle hooks for startup and shutdown events.
///
/// A `Lifecycle` is a cheap handle: clones share the same hook lists. Every
/// provider, group and scope owns one, and resolvers registered with
/// [`Provider::by_with_lifecycle`](crate::Provider::by_with_lifecycle)
/// receive their provider's broker so the constructed instance can hook
/// itself into start and stop.
///
/// Firing runs every registered hook concurrently and waits for all of
/// them. A failing hook does not prevent the others from running; the first
/// failure is returned. Firing twice runs every hook twice.
///
/// # Examples
///
/// ```
/// use ferrous_provide::Lifecycle;
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicU32, Ordering};
///
/// # async fn example() -> ferrous_provide::ProvideResult<()> {
/// let lifecycle = Lifecycle::new();
/// let started = Arc::new(AtomicU32::new(0));
///
/// let counter = started.clone();
/// lifecycle.on_start(move || {
///     let counter = counter.clone();
///     async move {
///         counter.fetch_add(1, Ordering::SeqCst);
///         Ok(())
///     }
/// });
///
/// lifecycle.start().await?;
/// assert_eq!(started.load(Ordering::SeqCst), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct Lifecycle {
    inner: Arc<LifecycleInner>,
}

impl Lifecycle {
    /// Create an empty broker
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a start hook
    pub fn on_start<F, Fut>(&self, hook: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProvideResult<()>> + Send + 'static,
    {
        self.inner.start.lock().push(Arc::new(move || hook().boxed()));
    }

    /// Add a stop hook
    pub fn on_stop<F, Fut>(&self, hook: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProvideResult<()>> + Send + 'static,
    {
        self.inner.stop.lock().push(Arc::new(move || hook().boxed()));
    }

    /// Run every start hook
    pub async fn start(&self) -> ProvideResult<()> {
        let hooks = self.inner.start.lock().clone();
        debug!(hooks = hooks.len(), "firing start hooks");
        fire(hooks).await
    }

    /// Run every stop hook
    pub async fn stop(&self) -> ProvideResult<()> {
        let hooks = self.inner.stop.lock().clone();
        debug!(hooks = hooks.len(), "firing stop hooks");
        fire(hooks).await
    }

    pub fn start_hooks(&self) -> usize {
        self.inner.start.lock().len()
    }

    pub fn stop_hooks(&self) -> usize {
        self.inner.stop.lock().len()
    }

    /// Returns true if both handles share the same hook lists.
    pub fn ptr_eq(&self, other: &Lifecycle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

async fn fire(hooks: Vec<Hook>) -> ProvideResult<()> {
    let results = join_all(hooks.iter().map(|hook| hook())).await;
    results.into_iter().collect()
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle")
            .field("start_hooks", &self.start_hooks())
            .field("stop_hooks", &self.stop_hooks())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProvideError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn counting(
        counter: &Arc<AtomicU32>,
    ) -> impl Fn() -> BoxFuture<'static, ProvideResult<()>> + Send + Sync {
        let counter = counter.clone();
        move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn failing_hook_does_not_stop_the_others() {
        let lifecycle = Lifecycle::new();
        let ran = Arc::new(AtomicU32::new(0));

        lifecycle.on_stop(counting(&ran));
        lifecycle.on_stop(|| async { Err(ProvideError::Hook("flush failed".to_string())) });
        lifecycle.on_stop(counting(&ran));

        let err = lifecycle.stop().await.unwrap_err();
        assert!(matches!(err, ProvideError::Hook(_)));
        assert_eq!(ran.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn firing_twice_reruns_hooks() {
        let lifecycle = Lifecycle::new();
        let ran = Arc::new(AtomicU32::new(0));
        lifecycle.on_start(counting(&ran));

        lifecycle.start().await.unwrap();
        lifecycle.start().await.unwrap();
        assert_eq!(ran.load(Ordering::SeqCst), 2);
        assert_eq!(lifecycle.start_hooks(), 1);
        assert_eq!(lifecycle.stop_hooks(), 0);
    }

    #[tokio::test]
    async fn hooks_run_concurrently() {
        let lifecycle = Lifecycle::new();
        let barrier = Arc::new(tokio::sync::Barrier::new(2));
        for _ in 0..2 {
            let barrier = barrier.clone();
            lifecycle.on_start(move || {
                let barrier = barrier.clone();
                async move {
                    barrier.wait().await;
                    Ok(())
                }
            });
        }
        // Deadlocks if hooks were awaited one after another.
        tokio::time::timeout(std::time::Duration::from_secs(5), lifecycle.start())
            .await
            .expect("hooks should not wait on each other")
            .unwrap();
    }
}
