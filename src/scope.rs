//! Scopes: mutable provider registries for lifecycle and disposal fan-out.

use std::fmt;
use std::future::Future;

use futures::future::join_all;
use parking_lot::RwLock;
use tracing::debug;

use crate::{Group, Lifecycle, Provider, ProvideResult};

/// An untyped, mutable registry of providers.
///
/// Unlike a [`Group`], a scope can gain and lose members after creation.
/// It offers no resolution of its own; it exists to start, stop and
/// dispose whatever providers have been registered with it, for example
/// everything created while serving one request.
///
/// # Examples
///
/// ```
/// use ferrous_provide::{provide, Scope};
///
/// # async fn example() -> ferrous_provide::ProvideResult<()> {
/// let scope = Scope::default();
/// let conn = provide("conn").by(|_| async { Ok(42u32) }).singleton();
/// scope.add(conn.clone());
///
/// conn.get::<u32>().await?;
/// scope.stop(true).await?;
/// assert!(conn.inspect().is_empty());
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct Scope {
    providers: RwLock<Vec<Provider>>,
    lifecycle: Lifecycle,
}

impl Scope {
    pub fn new<I>(providers: I) -> Self
    where
        I: IntoIterator<Item = Provider>,
    {
        let scope = Scope::default();
        for provider in providers {
            scope.add(provider);
        }
        scope
    }

    /// Registers `provider`; returns false if it was already registered.
    pub fn add(&self, provider: Provider) -> bool {
        let mut providers = self.providers.write();
        if providers.iter().any(|existing| existing.ptr_eq(&provider)) {
            return false;
        }
        debug!(provider = %provider.id(), "provider added to scope");
        providers.push(provider);
        true
    }

    /// Unregisters `provider`; returns false if it was not registered.
    pub fn remove(&self, provider: &Provider) -> bool {
        let mut providers = self.providers.write();
        match providers.iter().position(|existing| existing.ptr_eq(provider)) {
            Some(index) => {
                providers.remove(index);
                true
            }
            None => false,
        }
    }

    /// Snapshot of the registered providers.
    pub fn providers(&self) -> Vec<Provider> {
        self.providers.read().clone()
    }

    /// Snapshot of the registered providers as a group.
    pub fn group(&self) -> Group {
        Group::new(self.providers())
    }

    pub fn len(&self) -> usize {
        self.providers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.read().is_empty()
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn on_start<F, Fut>(&self, hook: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProvideResult<()>> + Send + 'static,
    {
        self.lifecycle.on_start(hook);
    }

    pub fn on_stop<F, Fut>(&self, hook: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProvideResult<()>> + Send + 'static,
    {
        self.lifecycle.on_stop(hook);
    }

    /// Fires the scope's start hooks and every registered provider's.
    pub async fn start(&self) -> ProvideResult<()> {
        let providers = self.providers();
        let (own, members) = futures::join!(
            self.lifecycle.start(),
            join_all(providers.iter().map(Provider::start))
        );
        members.into_iter().chain(std::iter::once(own)).collect()
    }

    /// Fires the scope's stop hooks and stops every registered provider,
    /// disposing their caches when `should_dispose` is set.
    pub async fn stop(&self, should_dispose: bool) -> ProvideResult<()> {
        let providers = self.providers();
        let stopping = providers.iter().map(|provider| provider.stop(should_dispose));
        let (own, members) = futures::join!(self.lifecycle.stop(), join_all(stopping));
        members.into_iter().chain(std::iter::once(own)).collect()
    }

    /// Disposes `key` (or everything) in every registered provider's cache.
    pub async fn dispose(&self, key: Option<&str>) -> ProvideResult<()> {
        let providers = self.providers();
        let results = join_all(providers.iter().map(|provider| provider.dispose(key))).await;
        results.into_iter().collect()
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<String> = self.providers.read().iter().map(|p| p.id().to_string()).collect();
        f.debug_struct("Scope").field("providers", &ids).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provide;

    #[test]
    fn add_and_remove_track_identity() {
        let a = provide("a");
        let scope = Scope::new([a.clone(), a.clone()]);
        assert_eq!(scope.len(), 1);
        assert!(!scope.add(a.clone()));
        assert!(scope.add(provide("a")));
        assert_eq!(scope.len(), 2);

        assert!(scope.remove(&a));
        assert!(!scope.remove(&a));
        assert_eq!(scope.len(), 1);
    }

    #[tokio::test]
    async fn dispose_fans_out_to_members() {
        let a = provide("a").by(|_| async { Ok(1u8) }).singleton();
        let b = provide("b").by(|_| async { Ok(2u8) }).singleton();
        let scope = Scope::new([a.clone(), b.clone()]);

        a.get::<u8>().await.unwrap();
        b.get::<u8>().await.unwrap();
        scope.dispose(Some("singleton")).await.unwrap();
        assert!(a.inspect().is_empty());
        assert!(b.inspect().is_empty());
    }
}
