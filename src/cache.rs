//! Per-provider resolution cache with expiry and disposal.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::future::{join_all, BoxFuture, FutureExt};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::traits::{AsyncDispose, Dispose};
use crate::{Instance, ProvideError, ProvideResult, Resolution};

static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

/// Cleanup callback invoked with a resolved instance when its cache entry
/// is removed.
///
/// # Examples
///
/// ```
/// use ferrous_provide::Disposer;
/// use std::sync::Arc;
///
/// struct Connection;
///
/// let generic = Disposer::new(|_instance| async { Ok(()) });
/// let typed = Disposer::typed(|conn: Arc<Connection>| async move {
///     drop(conn);
///     Ok(())
/// });
/// ```
#[derive(Clone)]
pub struct Disposer {
    f: Arc<dyn Fn(Instance) -> BoxFuture<'static, ProvideResult<()>> + Send + Sync>,
}

impl Disposer {
    /// Creates a disposer over the type-erased instance.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Instance) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProvideResult<()>> + Send + 'static,
    {
        Self {
            f: Arc::new(move |instance| f(instance).boxed()),
        }
    }

    /// Creates a disposer that downcasts the instance to `T` first.
    ///
    /// Disposing an instance of another type fails with
    /// [`ProvideError::TypeMismatch`].
    pub fn typed<T, F, Fut>(f: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(Arc<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProvideResult<()>> + Send + 'static,
    {
        Self::new(move |instance: Instance| match instance.downcast::<T>() {
            Ok(typed) => f(typed).boxed(),
            Err(_) => futures::future::ready(Err(ProvideError::TypeMismatch {
                id: String::from("<disposer>"),
                expected: std::any::type_name::<T>(),
            }))
            .boxed(),
        })
    }

    /// Disposer calling [`Dispose::dispose`] on instances of `T`.
    pub fn from_dispose<T: Dispose>() -> Self {
        Self::typed(|instance: Arc<T>| {
            instance.dispose();
            futures::future::ready(Ok(()))
        })
    }

    /// Disposer awaiting [`AsyncDispose::dispose`] on instances of `T`.
    pub fn from_async_dispose<T: AsyncDispose>() -> Self {
        Self::typed(|instance: Arc<T>| async move { instance.dispose().await })
    }

    pub(crate) fn call(&self, instance: Instance) -> BoxFuture<'static, ProvideResult<()>> {
        (self.f)(instance)
    }
}

impl fmt::Debug for Disposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Disposer")
    }
}

/// Per-entry caching options.
///
/// Values given here override the provider-level defaults set with
/// [`Provider::with_disposer`](crate::Provider::with_disposer) and
/// [`Provider::temporary`](crate::Provider::temporary).
#[derive(Debug, Clone, Default)]
pub struct CacheOptions {
    /// Cleanup run with the instance when the entry is disposed
    pub disposer: Option<Disposer>,
    /// Time after which the entry is disposed automatically
    pub ttl: Option<Duration>,
}

impl CacheOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_disposer(mut self, disposer: Disposer) -> Self {
        self.disposer = Some(disposer);
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Fills unset fields from `defaults`.
    pub(crate) fn or(self, defaults: &CacheOptions) -> CacheOptions {
        CacheOptions {
            disposer: self.disposer.or_else(|| defaults.disposer.clone()),
            ttl: self.ttl.or(defaults.ttl),
        }
    }
}

struct CacheEntry {
    serial: u64,
    key: String,
    resolution: Resolution,
    disposer: Option<Disposer>,
    expiry: Mutex<Option<JoinHandle<()>>>,
}

impl CacheEntry {
    fn new(key: String, resolution: Resolution, disposer: Option<Disposer>) -> Self {
        Self {
            serial: NEXT_SERIAL.fetch_add(1, Ordering::Relaxed),
            key,
            resolution,
            disposer,
            expiry: Mutex::new(None),
        }
    }

    fn stop_expiry(&self) {
        if let Some(handle) = self.expiry.lock().take() {
            handle.abort();
        }
    }

    /// Runs the disposer once the construction has settled.
    ///
    /// Must only be called by whoever removed the entry from the map.
    async fn finalize(&self) -> ProvideResult<()> {
        let Some(disposer) = self.disposer.clone() else {
            return Ok(());
        };
        match self.resolution.clone().await {
            Ok(instance) => disposer.call(instance).await.map_err(|err| ProvideError::Disposer {
                key: self.key.clone(),
                message: err.to_string(),
            }),
            // A failed construction has nothing to clean up.
            Err(_) => Ok(()),
        }
    }
}

#[derive(Default)]
struct CacheInner {
    entries: Mutex<Vec<Arc<CacheEntry>>>,
}

impl Drop for CacheInner {
    fn drop(&mut self) {
        let undisposed = self.entries.get_mut().iter().filter(|e| e.disposer.is_some()).count();
        if undisposed > 0 {
            warn!(undisposed, "cache dropped with undisposed entries");
        }
    }
}

/// Resolution cache owned by a single provider.
///
/// Maps cache keys to in-flight or completed [`Resolution`]s. Each entry may
/// carry a disposer and an expiry timer. Enumeration order is insertion
/// order. The cache is exposed for inspection through
/// [`Provider::inspect`](crate::Provider::inspect).
///
/// # Disposal policy
///
/// Disposing an entry first removes it from the map, then stops its
/// expiry timer, then awaits the construction and runs the disposer. A
/// failing disposer therefore never leaves its entry behind, and a
/// concurrent lookup during a slow disposal already misses.
///
/// # Expiry
///
/// An entry with both a TTL and a disposer is disposed when the TTL runs
/// out; a TTL without a disposer has no effect. TTL timers are tokio tasks.
/// Arming one outside a tokio runtime logs a warning and leaves the entry
/// without expiry. Disposer failures during expiry have no caller to return
/// to and are logged.
pub struct ResolutionCache {
    inner: Arc<CacheInner>,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CacheInner::default()),
        }
    }

    /// Looks up the resolution stored under `key`.
    pub fn get(&self, key: &str) -> Option<Resolution> {
        self.inner
            .entries
            .lock()
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| entry.resolution.clone())
    }

    /// Installs `resolution` under `key`, arming an expiry timer when
    /// `options` carries both a TTL and a disposer.
    ///
    /// The previous entry under `key`, if any, is replaced without running
    /// its disposer; callers that own a previous instance dispose it first.
    pub fn set(&self, key: impl Into<String>, resolution: Resolution, options: CacheOptions) {
        let entry = Arc::new(CacheEntry::new(key.into(), resolution, options.disposer));
        let replaced = {
            let mut entries = self.inner.entries.lock();
            match entries.iter_mut().find(|existing| existing.key == entry.key) {
                Some(slot) => Some(std::mem::replace(slot, entry.clone())),
                None => {
                    entries.push(entry.clone());
                    None
                }
            }
        };
        if let Some(old) = replaced {
            old.stop_expiry();
        }
        self.arm_expiry_if_disposable(&entry, options.ttl);
    }

    /// Returns the entry under `key`, inserting the resolution built by
    /// `make` when there is none. Lookup and insertion share one critical
    /// section, so concurrent callers never build twice for one key.
    pub(crate) fn get_or_insert_with<F>(
        &self,
        key: &str,
        options: CacheOptions,
        make: F,
    ) -> Resolution
    where
        F: FnOnce() -> Resolution,
    {
        let entry = {
            let mut entries = self.inner.entries.lock();
            if let Some(existing) = entries.iter().find(|entry| entry.key == key) {
                debug!(key, "cache hit");
                return existing.resolution.clone();
            }
            let entry = Arc::new(CacheEntry::new(key.to_string(), make(), options.disposer));
            entries.push(entry.clone());
            entry
        };
        self.arm_expiry_if_disposable(&entry, options.ttl);
        entry.resolution.clone()
    }

    /// Snapshot of every cached resolution in insertion order.
    pub fn all(&self) -> Vec<Resolution> {
        self.inner.entries.lock().iter().map(|entry| entry.resolution.clone()).collect()
    }

    /// Snapshot of every cache key in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.inner.entries.lock().iter().map(|entry| entry.key.clone()).collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.entries.lock().iter().any(|entry| entry.key == key)
    }

    /// Returns true if the entry under `key` has a pending expiry timer.
    pub fn has_expiry(&self, key: &str) -> bool {
        self.inner
            .entries
            .lock()
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| entry.expiry.lock().as_ref().is_some_and(|h| !h.is_finished()))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.lock().is_empty()
    }

    /// Disposes the entry under `key`, or every entry when `key` is `None`.
    ///
    /// Disposing an absent key is a no-op. When disposing everything, all
    /// entries are removed and finalized concurrently; the first disposer
    /// failure is returned.
    pub async fn dispose(&self, key: Option<&str>) -> ProvideResult<()> {
        let removed: Vec<Arc<CacheEntry>> = {
            let mut entries = self.inner.entries.lock();
            match key {
                Some(key) => match entries.iter().position(|entry| entry.key == key) {
                    Some(index) => vec![entries.remove(index)],
                    None => Vec::new(),
                },
                None => entries.drain(..).collect(),
            }
        };
        if removed.is_empty() {
            return Ok(());
        }

        for entry in &removed {
            entry.stop_expiry();
            debug!(key = %entry.key, "disposing cached resolution");
        }
        let results = join_all(removed.iter().map(|entry| entry.finalize())).await;
        results.into_iter().collect()
    }

    fn remove_serial(&self, serial: u64) -> Option<Arc<CacheEntry>> {
        let mut entries = self.inner.entries.lock();
        let index = entries.iter().position(|entry| entry.serial == serial)?;
        Some(entries.remove(index))
    }

    /// An entry expires only when it has both a TTL and a disposer;
    /// a TTL alone keeps the entry cached.
    fn arm_expiry_if_disposable(&self, entry: &Arc<CacheEntry>, ttl: Option<Duration>) {
        if let (Some(ttl), Some(_)) = (ttl, &entry.disposer) {
            self.arm_expiry(entry, ttl);
        }
    }

    fn arm_expiry(&self, entry: &Arc<CacheEntry>, ttl: Duration) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(key = %entry.key, ?ttl, "no tokio runtime, cache entry will not expire");
            return;
        };
        let cache: Weak<CacheInner> = Arc::downgrade(&self.inner);
        let serial = entry.serial;
        let handle = runtime.spawn(async move {
            tokio::time::sleep(ttl).await;
            let Some(inner) = cache.upgrade() else {
                return;
            };
            let cache = ResolutionCache { inner };
            if let Some(expired) = cache.remove_serial(serial) {
                debug!(key = %expired.key, "cached resolution expired");
                if let Err(err) = expired.finalize().await {
                    warn!(key = %expired.key, error = %err, "disposer failed on expiry");
                }
            }
        });
        *entry.expiry.lock() = Some(handle);
    }
}

impl Default for ResolutionCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ResolutionCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolutionCache").field("keys", &self.keys()).finish()
    }
}
