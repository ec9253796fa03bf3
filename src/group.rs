//! Groups: batch operations over a set of providers.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;

use futures::future::{join_all, try_join_all};

use crate::graph::{CloneResolver, MockResolver};
use crate::{Container, Lifecycle, Provider, ProvideResult, ResolveOptions};

/// Creates a group from a list of providers.
pub fn group<I>(providers: I) -> Group
where
    I: IntoIterator<Item = Provider>,
{
    Group::new(providers)
}

/// An aggregate of providers offering batched operations.
///
/// A group does not own its members' lifetimes and has no cache of its
/// own: batch resolution and disposal fan out to each member's own cache.
/// Members are kept in insertion order, de-duplicated by identity. The id
/// map is built from the member list, so when two members share an id the
/// later one wins the map slot while both stay in the list.
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
/// let c = provide("c")
///     .using([b.clone()])
///     .by(|deps| async move { Ok(format!("{}c", deps.get::<String>("b")?)) });
///
/// let out = group([a, b, c]).resolve().await?;
/// assert_eq!(*out.get::<String>("c")?, "abc");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Group {
    list: Vec<Provider>,
    map: HashMap<String, Provider>,
    lifecycle: Lifecycle,
}

impl Group {
    pub fn new<I>(providers: I) -> Self
    where
        I: IntoIterator<Item = Provider>,
    {
        let mut list: Vec<Provider> = Vec::new();
        for provider in providers {
            if !list.iter().any(|existing| existing.ptr_eq(&provider)) {
                list.push(provider);
            }
        }
        let map = list
            .iter()
            .map(|provider| (provider.id().to_string(), provider.clone()))
            .collect();
        Self {
            list,
            map,
            lifecycle: Lifecycle::new(),
        }
    }

    pub fn list(&self) -> &[Provider] {
        &self.list
    }

    pub fn map(&self) -> &HashMap<String, Provider> {
        &self.map
    }

    pub fn get(&self, id: &str) -> Option<&Provider> {
        self.map.get(id)
    }

    /// Member ids in list order.
    pub fn ids(&self) -> Vec<&str> {
        self.list.iter().map(Provider::id).collect()
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// Resolves every member concurrently with its default cache key.
    pub async fn resolve(&self) -> ProvideResult<Container> {
        self.resolve_with(ResolveOptions::default()).await
    }

    /// Resolves every member concurrently, passing the same options to each
    /// member's own resolution.
    pub async fn resolve_with(&self, options: ResolveOptions) -> ProvideResult<Container> {
        let pending = self.list.iter().map(|provider| {
            let id = provider.id().to_string();
            let resolution = provider.resolve_with(options.clone());
            async move { resolution.await.map(|instance| (id, instance)) }
        });
        Ok(try_join_all(pending).await?.into_iter().collect())
    }

    /// Disposes `key` (or everything) in every member's cache.
    pub async fn dispose(&self, key: Option<&str>) -> ProvideResult<()> {
        let results = join_all(self.list.iter().map(|provider| provider.dispose(key))).await;
        results.into_iter().collect()
    }

    /// New group with `providers` appended.
    pub fn add<I>(&self, providers: I) -> Group
    where
        I: IntoIterator<Item = Provider>,
    {
        Group::new(self.list.iter().cloned().chain(providers))
    }

    /// New group with the members of both groups.
    pub fn concat(&self, other: &Group) -> Group {
        self.add(other.list.iter().cloned())
    }

    /// Deep-copies every member's graph with one shared memo, so dependencies
    /// shared across members stay shared in the copy.
    pub fn isolate(&self) -> Group {
        let mut resolver = CloneResolver::new();
        Group::new(self.list.iter().map(|provider| resolver.resolve(provider)))
    }

    /// Deep-copies the member picked by `selector`.
    pub fn isolate_one<F>(&self, selector: F) -> Option<Provider>
    where
        F: FnOnce(&HashMap<String, Provider>) -> Option<Provider>,
    {
        selector(&self.map).map(|provider| CloneResolver::new().resolve(&provider))
    }

    /// Deep-copies the members picked by `selector` into a new group.
    pub fn isolate_some<F>(&self, selector: F) -> Group
    where
        F: FnOnce(&HashMap<String, Provider>) -> Vec<Provider>,
    {
        let mut resolver = CloneResolver::new();
        let picked = selector(&self.map);
        Group::new(picked.iter().map(|provider| resolver.resolve(provider)))
    }

    /// Substitutes nodes matching `mocks` by id across every member graph.
    pub fn mock<I>(&self, mocks: I) -> Group
    where
        I: IntoIterator<Item = Provider>,
    {
        let mut resolver = MockResolver::new(mocks);
        Group::new(self.list.iter().map(|provider| resolver.resolve(provider)))
    }

    // ===== Lifecycle =====

    /// Adds a hook to the group's own broker.
    ///
    /// The hook is not copied onto the members: [`start`](Group::start)
    /// already fires every member's hooks, so a copy would run twice, and
    /// members shared with other groups would pick up hooks they never
    /// registered.
    pub fn on_start<F, Fut>(&self, hook: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProvideResult<()>> + Send + 'static,
    {
        self.lifecycle.on_start(hook);
    }

    /// Adds a hook to the group's own broker; see
    /// [`on_start`](Group::on_start) for why members do not receive it.
    pub fn on_stop<F, Fut>(&self, hook: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProvideResult<()>> + Send + 'static,
    {
        self.lifecycle.on_stop(hook);
    }

    /// Fires the group's start hooks and every member's, concurrently.
    pub async fn start(&self) -> ProvideResult<()> {
        let (own, members) = futures::join!(
            self.lifecycle.start(),
            join_all(self.list.iter().map(Provider::start))
        );
        members.into_iter().chain(std::iter::once(own)).collect()
    }

    /// Fires the group's stop hooks and every member's stop, concurrently.
    pub async fn stop(&self, should_dispose: bool) -> ProvideResult<()> {
        let stopping = self.list.iter().map(|provider| provider.stop(should_dispose));
        let (own, members) = futures::join!(self.lifecycle.stop(), join_all(stopping));
        members.into_iter().chain(std::iter::once(own)).collect()
    }
}

impl Default for Group {
    fn default() -> Self {
        Group::new(std::iter::empty())
    }
}

impl fmt::Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group").field("members", &self.ids()).finish()
    }
}

impl FromIterator<Provider> for Group {
    fn from_iter<I: IntoIterator<Item = Provider>>(iter: I) -> Self {
        Group::new(iter)
    }
}
