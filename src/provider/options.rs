//! Option bundles for building providers and issuing resolutions.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};

use crate::{CacheOptions, Container, Disposer, Instance, Lifecycle, Provider, ProvideResult};

pub(crate) type ResolverFn =
    Arc<dyn Fn(Container, Lifecycle) -> BoxFuture<'static, ProvideResult<Instance>> + Send + Sync>;

/// Constructs an instance from a resolved dependency [`Container`].
///
/// Most code builds resolvers through [`Provider::by`] and
/// [`Provider::by_with_lifecycle`]; this type exists so a resolver can be
/// stored in [`ProviderOptions`] and moved between providers.
#[derive(Clone)]
pub struct Resolver {
    pub(crate) f: ResolverFn,
}

impl Resolver {
    /// Resolver receiving the dependency container only.
    pub fn new<T, F, Fut>(f: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(Container) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProvideResult<T>> + Send + 'static,
    {
        Self::with_lifecycle::<T, _, Fut>(move |deps, _lifecycle| f(deps))
    }

    /// Resolver receiving the dependency container and the provider's
    /// lifecycle broker, to register start/stop hooks for the instance.
    pub fn with_lifecycle<T, F, Fut>(f: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(Container, Lifecycle) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProvideResult<T>> + Send + 'static,
    {
        Self {
            f: Arc::new(move |deps, lifecycle| {
                let constructing = f(deps, lifecycle);
                async move {
                    constructing
                        .await
                        .map(|instance| Arc::new(instance) as Instance)
                }
                .boxed()
            }),
        }
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Resolver")
    }
}

/// Full option bundle a provider is built from.
///
/// Every builder method on [`Provider`] reads the current bundle, changes
/// one field and builds a new provider from it.
#[derive(Debug, Clone, Default)]
pub struct ProviderOptions {
    /// Direct dependencies; duplicates (by identity) are dropped
    pub dependencies: Vec<Provider>,
    /// Constructor; `None` resolves to an empty [`Container`]
    pub resolver: Option<Resolver>,
    /// Disposer applied to cache entries that do not bring their own
    pub disposer: Option<Disposer>,
    /// Cache key used when a resolution names none
    pub default_cache_key: Option<String>,
    /// TTL applied to cache entries that do not bring their own
    pub default_ttl: Option<Duration>,
}

/// Per-call resolution options.
///
/// # Examples
///
/// ```
/// use ferrous_provide::ResolveOptions;
/// use std::time::Duration;
///
/// let options = ResolveOptions::cached("tenant-42").with_ttl(Duration::from_secs(30));
/// assert_eq!(options.cache_key.as_deref(), Some("tenant-42"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Cache slot to use; falls back to the provider's default key
    pub cache_key: Option<String>,
    /// Disposer and TTL for a newly created entry
    pub cache: CacheOptions,
}

impl ResolveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options targeting the cache slot `key`.
    pub fn cached(key: impl Into<String>) -> Self {
        Self {
            cache_key: Some(key.into()),
            cache: CacheOptions::default(),
        }
    }

    pub fn with_disposer(mut self, disposer: Disposer) -> Self {
        self.cache.disposer = Some(disposer);
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.cache.ttl = Some(ttl);
        self
    }
}
