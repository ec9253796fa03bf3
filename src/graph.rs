//! Graph rewrites over provider dependency DAGs.
//!
//! Both resolvers memoize per node identity for the lifetime of one
//! traversal, which keeps shared subgraphs shared in the result and visits
//! every node of a diamond once. Providers are immutable and must exist
//! before anything can depend on them, so the graphs walked here are always
//! acyclic.

use std::collections::HashMap;

use tracing::debug;

use crate::Provider;

/// Deep-copies dependency graphs.
///
/// Each reachable node is replaced by a duplicate with a fresh cache and
/// lifecycle broker whose dependencies are the duplicates of the original
/// dependencies. Reusing one `CloneResolver` across several seeds (as
/// [`Group::isolate`](crate::Group::isolate) does) keeps dependencies
/// shared between seeds shared in the copy as well.
///
/// # Examples
///
/// ```
/// use ferrous_provide::{provide, CloneResolver};
///
/// let shared = provide("shared");
/// let left = provide("left").using([shared.clone()]);
/// let right = provide("right").using([shared.clone()]);
///
/// let mut resolver = CloneResolver::new();
/// let left2 = resolver.resolve(&left);
/// let right2 = resolver.resolve(&right);
///
/// assert!(left2.dependencies()[0].ptr_eq(&right2.dependencies()[0]));
/// assert!(!left2.dependencies()[0].ptr_eq(&shared));
/// ```
#[derive(Default)]
pub struct CloneResolver {
    memo: HashMap<usize, Provider>,
}

impl CloneResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the copy of `provider`, building it on first visit.
    pub fn resolve(&mut self, provider: &Provider) -> Provider {
        if let Some(cloned) = self.memo.get(&provider.node_id()) {
            return cloned.clone();
        }

        let dependencies: Vec<Provider> = provider
            .dependencies()
            .iter()
            .map(|dep| self.resolve(dep))
            .collect();
        let cloned = provider.with_dependencies(dependencies);
        debug!(provider = %provider.id(), "isolated provider");
        self.memo.insert(provider.node_id(), cloned.clone());
        cloned
    }
}

/// Substitutes graph nodes by id.
///
/// A node whose id matches a mock is replaced by that mock and its subtree
/// is not examined. Any other node is rebuilt when at least one of its
/// dependencies was rewritten, and returned as-is otherwise.
#[derive(Default)]
pub struct MockResolver {
    mocks: HashMap<String, Provider>,
    memo: HashMap<usize, Provider>,
}

impl MockResolver {
    /// Builds the id → mock map; a later mock with the same id wins.
    pub fn new<I>(mocks: I) -> Self
    where
        I: IntoIterator<Item = Provider>,
    {
        Self {
            mocks: mocks.into_iter().map(|mock| (mock.id().to_string(), mock)).collect(),
            memo: HashMap::new(),
        }
    }

    /// Returns the rewritten `provider`.
    pub fn resolve(&mut self, provider: &Provider) -> Provider {
        if let Some(mock) = self.mocks.get(provider.id()) {
            return mock.clone();
        }
        if let Some(rewritten) = self.memo.get(&provider.node_id()) {
            return rewritten.clone();
        }

        let dependencies: Vec<Provider> = provider
            .dependencies()
            .iter()
            .map(|dep| self.resolve(dep))
            .collect();
        let changed = dependencies
            .iter()
            .zip(provider.dependencies())
            .any(|(rewritten, original)| !rewritten.ptr_eq(original));
        let rewritten = if changed {
            debug!(provider = %provider.id(), "rebuilt provider around mocks");
            provider.with_dependencies(dependencies)
        } else {
            provider.clone()
        };
        self.memo.insert(provider.node_id(), rewritten.clone());
        rewritten
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provide;

    #[test]
    fn diamond_is_cloned_once() {
        let d = provide("d");
        let b = provide("b").using([d.clone()]);
        let c = provide("c").using([d.clone()]);
        let a = provide("a").using([b.clone(), c.clone()]);

        let isolated = a.isolate();
        let b2 = &isolated.dependencies()[0];
        let c2 = &isolated.dependencies()[1];

        assert!(!b2.ptr_eq(&b));
        assert!(!c2.ptr_eq(&c));
        assert!(b2.dependencies()[0].ptr_eq(&c2.dependencies()[0]));
        assert!(!b2.dependencies()[0].ptr_eq(&d));
    }

    #[test]
    fn separate_isolations_share_nothing() {
        let d = provide("d");
        let a = provide("a").using([d]);

        let first = a.isolate();
        let second = a.isolate();
        assert!(!first.ptr_eq(&second));
        assert!(!first.dependencies()[0].ptr_eq(&second.dependencies()[0]));
    }

    #[test]
    fn untouched_subgraphs_are_shared() {
        let leaf = provide("leaf");
        let untouched = provide("untouched").using([leaf.clone()]);
        let target = provide("target");
        let root = provide("root").using([untouched.clone(), target.clone()]);

        let mut resolver = MockResolver::new([provide("target").by(|_| async { Ok(1u8) })]);
        let rewritten = resolver.resolve(&root);

        assert!(!rewritten.ptr_eq(&root));
        assert!(rewritten.dependencies()[0].ptr_eq(&untouched));
        assert!(!rewritten.dependencies()[1].ptr_eq(&target));
    }

    #[test]
    fn matching_root_is_replaced_wholesale() {
        let mock = provide("root");
        let root = provide("root").using([provide("child")]);

        let mut resolver = MockResolver::new([mock.clone()]);
        assert!(resolver.resolve(&root).ptr_eq(&mock));
    }
}
