//! Provider module: lazy, asynchronous factories with declared dependencies.
//!
//! This module contains the [`Provider`] type, its immutable builder API and
//! the resolution algorithm that gathers dependencies, invokes the resolver
//! and populates the provider's own [`ResolutionCache`].

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::try_join_all;
use tracing::debug;

use crate::config::CacheSettings;
use crate::graph::{CloneResolver, MockResolver};
use crate::{
    CacheOptions, Container, Disposer, Instance, Lifecycle, ProvideError, ProvideResult, Resolution,
    ResolutionCache,
};

mod options;
pub use options::{ProviderOptions, ResolveOptions, Resolver};

/// Cache key used by [`Provider::singleton`] and [`Provider::once`].
pub const SINGLETON_KEY: &str = "singleton";

/// Creates a provider with no dependencies and no resolver.
///
/// Chain builder methods to give it dependencies, a resolver and caching
/// defaults. Without a resolver it resolves to an empty [`Container`].
///
/// # Examples
///
/// ```
/// use ferrous_provide::{provide, Container};
///
/// # async fn example() -> ferrous_provide::ProvideResult<()> {
/// let empty = provide("x").get::<Container>().await?;
/// assert!(empty.is_empty());
/// # Ok(())
/// # }
/// ```
pub fn provide(id: impl Into<String>) -> Provider {
    Provider::new(id, ProviderOptions::default())
}

/// A named, lazy, asynchronous factory with declared dependencies.
///
/// `Provider` is a cheap handle: cloning it shares the same identity, cache
/// and lifecycle broker. Builder methods never mutate a provider; each one
/// returns a new provider with a fresh, empty cache and broker. Use
/// [`Provider::duplicate`] for a structural copy and [`Provider::isolate`]
/// for a deep copy of the whole dependency graph.
///
/// # Caching
///
/// A resolution with a cache key (explicit, or the provider's default set
/// by [`persisted`](Provider::persisted) / [`singleton`](Provider::singleton))
/// is stored in the provider's cache before it settles. Every later call
/// with the same key gets the same resolution, so the resolver runs at most
/// once per key, even for concurrent callers. A failed resolution stays
/// cached under its key until disposed.
///
/// # Examples
///
/// ```
/// use ferrous_provide::{provide, group};
///
/// # async fn example() -> ferrous_provide::ProvideResult<()> {
/// let a = provide("a").by(|_| async { Ok("a".to_string()) });
/// let b = provide("b")
///     .using([a.clone()])
///     .by(|deps| async move { Ok(format!("{}b", deps.get::<String>("a")?)) });
///
/// let out = group([a, b]).resolve().await?;
/// assert_eq!(*out.get::<String>("b")?, "ab");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Provider {
    inner: Arc<ProviderInner>,
}

struct ProviderInner {
    id: String,
    dependencies: Vec<Provider>,
    resolver: Option<Resolver>,
    default_cache_key: Option<String>,
    defaults: CacheOptions,
    cache: ResolutionCache,
    lifecycle: Lifecycle,
}

impl Provider {
    /// Builds a provider from a full option bundle.
    ///
    /// Dependencies are de-duplicated by identity, keeping the first
    /// occurrence.
    pub fn new(id: impl Into<String>, options: ProviderOptions) -> Self {
        let mut dependencies: Vec<Provider> = Vec::with_capacity(options.dependencies.len());
        for dependency in options.dependencies {
            if !dependencies.iter().any(|existing| existing.ptr_eq(&dependency)) {
                dependencies.push(dependency);
            }
        }

        Self {
            inner: Arc::new(ProviderInner {
                id: id.into(),
                dependencies,
                resolver: options.resolver,
                default_cache_key: options.default_cache_key,
                defaults: CacheOptions {
                    disposer: options.disposer,
                    ttl: options.default_ttl,
                },
                cache: ResolutionCache::new(),
                lifecycle: Lifecycle::new(),
            }),
        }
    }

    // ===== Accessors =====

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn dependencies(&self) -> &[Provider] {
        &self.inner.dependencies
    }

    pub fn default_cache_key(&self) -> Option<&str> {
        self.inner.default_cache_key.as_deref()
    }

    pub fn default_ttl(&self) -> Option<Duration> {
        self.inner.defaults.ttl
    }

    /// Returns true when resolutions without an explicit key are not cached.
    pub fn is_transient(&self) -> bool {
        self.inner.default_cache_key.is_none()
    }

    pub fn has_resolver(&self) -> bool {
        self.inner.resolver.is_some()
    }

    /// Returns true if both handles refer to the same provider.
    pub fn ptr_eq(&self, other: &Provider) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Identity of this provider, used to memoize graph traversals.
    pub(crate) fn node_id(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }

    /// The current option bundle.
    pub fn options(&self) -> ProviderOptions {
        ProviderOptions {
            dependencies: self.inner.dependencies.clone(),
            resolver: self.inner.resolver.clone(),
            disposer: self.inner.defaults.disposer.clone(),
            default_cache_key: self.inner.default_cache_key.clone(),
            default_ttl: self.inner.defaults.ttl,
        }
    }

    /// The provider's resolution cache.
    pub fn inspect(&self) -> &ResolutionCache {
        &self.inner.cache
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.inner.lifecycle
    }

    // ===== Builder API =====

    fn rebuild<F>(&self, change: F) -> Provider
    where
        F: FnOnce(&mut ProviderOptions),
    {
        let mut options = self.options();
        change(&mut options);
        Provider::new(self.inner.id.clone(), options)
    }

    /// Same provider under a new id.
    pub fn with_id(&self, id: impl Into<String>) -> Provider {
        Provider::new(id, self.options())
    }

    /// Replaces the resolver.
    pub fn by<T, F, Fut>(&self, resolver: F) -> Provider
    where
        T: Any + Send + Sync,
        F: Fn(Container) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProvideResult<T>> + Send + 'static,
    {
        self.by_resolver(Resolver::new(resolver))
    }

    /// Replaces the resolver with one that also receives this provider's
    /// lifecycle broker.
    pub fn by_with_lifecycle<T, F, Fut>(&self, resolver: F) -> Provider
    where
        T: Any + Send + Sync,
        F: Fn(Container, Lifecycle) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProvideResult<T>> + Send + 'static,
    {
        self.by_resolver(Resolver::with_lifecycle(resolver))
    }

    pub fn by_resolver(&self, resolver: Resolver) -> Provider {
        self.rebuild(|options| options.resolver = Some(resolver))
    }

    /// Replaces the dependency list.
    ///
    /// The container shape the old resolver expected no longer holds, so the
    /// resolver is reset to the empty default; follow up with
    /// [`by`](Provider::by).
    pub fn using<I>(&self, dependencies: I) -> Provider
    where
        I: IntoIterator<Item = Provider>,
    {
        self.rebuild(|options| {
            options.dependencies = dependencies.into_iter().collect();
            options.resolver = None;
        })
    }

    /// Same provider with rewritten dependencies, keeping the resolver.
    pub(crate) fn with_dependencies(&self, dependencies: Vec<Provider>) -> Provider {
        self.rebuild(|options| options.dependencies = dependencies)
    }

    /// Sets or clears the default disposer for cache entries.
    pub fn with_disposer(&self, disposer: Option<Disposer>) -> Provider {
        self.rebuild(|options| options.disposer = disposer)
    }

    /// Caches resolutions without an explicit key under `key`.
    pub fn persisted(&self, key: impl Into<String>) -> Provider {
        let key = key.into();
        self.rebuild(|options| options.default_cache_key = Some(key))
    }

    /// Caches resolutions without an explicit key under [`SINGLETON_KEY`].
    pub fn singleton(&self) -> Provider {
        self.persisted(SINGLETON_KEY)
    }

    /// Alias of [`singleton`](Provider::singleton).
    pub fn once(&self) -> Provider {
        self.singleton()
    }

    /// Clears the default cache key: every call without an explicit key
    /// constructs a new instance.
    pub fn transient(&self) -> Provider {
        self.rebuild(|options| options.default_cache_key = None)
    }

    /// Sets the default TTL for cache entries. Entries expire only when a
    /// disposer applies to them as well.
    pub fn temporary(&self, ttl: Duration) -> Provider {
        self.rebuild(|options| options.default_ttl = Some(ttl))
    }

    /// Applies loaded cache settings; unset fields keep their current value.
    pub fn configure(&self, settings: &CacheSettings) -> Provider {
        self.rebuild(|options| {
            if let Some(key) = &settings.default_cache_key {
                options.default_cache_key = Some(key.clone());
            }
            if let Some(ttl) = settings.default_ttl() {
                options.default_ttl = Some(ttl);
            }
        })
    }

    /// Substitutes every node of the dependency graph whose id matches one
    /// of `mocks`, at any depth.
    ///
    /// Nodes on the path to a substitution are rebuilt; everything else is
    /// shared by reference with the original graph.
    pub fn mock<I>(&self, mocks: I) -> Provider
    where
        I: IntoIterator<Item = Provider>,
    {
        let mut resolver = MockResolver::new(mocks);
        let dependencies = self
            .inner
            .dependencies
            .iter()
            .map(|dep| resolver.resolve(dep))
            .collect();
        self.with_dependencies(dependencies)
    }

    /// Structurally identical provider with a fresh cache and broker.
    ///
    /// Dependencies are shared by reference.
    pub fn duplicate(&self) -> Provider {
        self.rebuild(|_| {})
    }

    /// Deep copy of the whole dependency graph.
    ///
    /// Every reachable node is duplicated exactly once and every edge points
    /// at the copy, so shared dependencies stay shared inside the copy.
    pub fn isolate(&self) -> Provider {
        CloneResolver::new().resolve(self)
    }

    // ===== Resolution =====

    /// Resolves with the provider's default cache key, if any.
    pub fn resolve(&self) -> Resolution {
        self.resolve_with(ResolveOptions::default())
    }

    /// Resolves through the cache slot `key`.
    pub fn resolve_cached(&self, key: impl Into<String>) -> Resolution {
        self.resolve_with(ResolveOptions::cached(key))
    }

    /// Resolves with explicit options.
    ///
    /// The returned resolution is already stored in the cache when a key
    /// applies; awaiting it drives the construction.
    pub fn resolve_with(&self, options: ResolveOptions) -> Resolution {
        let key = options.cache_key.or_else(|| self.inner.default_cache_key.clone());
        match key {
            None => self.construct(Container::new()),
            Some(key) => {
                let cache_options = options.cache.or(&self.inner.defaults);
                self.inner
                    .cache
                    .get_or_insert_with(&key, cache_options, || self.construct(Container::new()))
            }
        }
    }

    /// Resolves with the default key and downcasts to `T`.
    pub async fn get<T>(&self) -> ProvideResult<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        let instance = self.resolve().await?;
        self.downcast(instance)
    }

    /// Resolves through the cache slot `key` and downcasts to `T`.
    pub async fn get_cached<T>(&self, key: impl Into<String>) -> ProvideResult<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        let instance = self.resolve_cached(key).await?;
        self.downcast(instance)
    }

    fn downcast<T>(&self, instance: Instance) -> ProvideResult<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        instance.downcast::<T>().map_err(|_| ProvideError::TypeMismatch {
            id: self.inner.id.clone(),
            expected: std::any::type_name::<T>(),
        })
    }

    /// Builds the construction future. Dependencies already present in
    /// `resolved` are not resolved again.
    ///
    /// The future captures the dependencies and resolver but not the
    /// provider itself, so a cached resolution never keeps its own provider
    /// alive.
    fn construct(&self, resolved: Container) -> Resolution {
        let id = self.inner.id.clone();
        let dependencies = self.inner.dependencies.clone();
        let resolver = self.inner.resolver.clone();
        let lifecycle = self.inner.lifecycle.clone();

        Resolution::new(async move {
            let pending: Vec<(String, Resolution)> = dependencies
                .iter()
                .filter(|dependency| !resolved.contains(dependency.id()))
                .map(|dependency| (dependency.id().to_string(), dependency.resolve()))
                .collect();
            let settled = try_join_all(pending.into_iter().map(|(dependency_id, resolution)| {
                async move { resolution.await.map(|instance| (dependency_id, instance)) }
            }))
            .await?;
            let mut container: Container = settled.into_iter().collect();
            container.merge(resolved);

            match resolver {
                Some(resolver) => {
                    debug!(provider = %id, dependencies = container.len(), "constructing instance");
                    (resolver.f)(container, lifecycle).await
                }
                None => Ok(Arc::new(Container::new()) as Instance),
            }
        })
    }

    /// Resolves with some dependency outputs supplied by the caller.
    ///
    /// Only dependencies whose id is missing from `resolved` are resolved;
    /// the two maps are merged and handed to the resolver. With a cache key
    /// in `options`, the entry under that key is disposed first and the new
    /// resolution takes its place.
    pub async fn complete(
        &self,
        resolved: Container,
        options: ResolveOptions,
    ) -> ProvideResult<Instance> {
        let resolution = self.construct(resolved);
        if let Some(key) = options.cache_key {
            self.inner.cache.dispose(Some(&key)).await?;
            let cache_options = options.cache.or(&self.inner.defaults);
            self.inner.cache.set(key, resolution.clone(), cache_options);
        }
        resolution.await
    }

    /// Caches a pre-built instance under `key`, bypassing the resolver.
    ///
    /// The entry previously under `key` is disposed before the new one
    /// becomes visible.
    pub async fn mount(
        &self,
        instance: Instance,
        key: impl Into<String>,
        options: CacheOptions,
    ) -> ProvideResult<()> {
        let key = key.into();
        self.inner.cache.dispose(Some(&key)).await?;
        debug!(provider = %self.inner.id, key = %key, "mounting instance");
        let cache_options = options.or(&self.inner.defaults);
        self.inner.cache.set(key, Resolution::ready(instance), cache_options);
        Ok(())
    }

    /// Disposes the cache entry under `key`, or the whole cache.
    pub async fn dispose(&self, key: Option<&str>) -> ProvideResult<()> {
        self.inner.cache.dispose(key).await
    }

    // ===== Lifecycle =====

    pub fn on_start<F, Fut>(&self, hook: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProvideResult<()>> + Send + 'static,
    {
        self.inner.lifecycle.on_start(hook);
    }

    pub fn on_stop<F, Fut>(&self, hook: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProvideResult<()>> + Send + 'static,
    {
        self.inner.lifecycle.on_stop(hook);
    }

    /// Fires the start hooks.
    pub async fn start(&self) -> ProvideResult<()> {
        self.inner.lifecycle.start().await
    }

    /// Fires the stop hooks, then disposes the whole cache when
    /// `should_dispose` is set. Both run even if the other fails.
    pub async fn stop(&self, should_dispose: bool) -> ProvideResult<()> {
        let stopped = self.inner.lifecycle.stop().await;
        if should_dispose {
            self.inner.cache.dispose(None).await?;
        }
        stopped
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dependencies: Vec<&str> = self.inner.dependencies.iter().map(Provider::id).collect();
        f.debug_struct("Provider")
            .field("id", &self.inner.id)
            .field("dependencies", &dependencies)
            .field("default_cache_key", &self.inner.default_cache_key)
            .field("cache", &self.inner.cache)
            .finish()
    }
}
