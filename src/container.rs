//! Type-erased dependency container handed to resolvers.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::{ProvideError, ProvideResult};

/// A resolved instance with its concrete type erased.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Mapping from dependency id to resolved instance.
///
/// Resolvers receive a `Container` holding one entry per declared
/// dependency, keyed by the dependency's id. Groups also return their
/// batch results as a `Container`. Storage is type-erased; typed access
/// goes through [`Container::get`], which downcasts at the call site.
///
/// # Examples
///
/// ```
/// use ferrous_provide::Container;
/// use std::sync::Arc;
///
/// let mut container = Container::new();
/// container.insert("port", Arc::new(8080u16));
///
/// let port = container.get::<u16>("port").unwrap();
/// assert_eq!(*port, 8080);
/// assert!(container.get::<String>("port").is_err());
/// ```
#[derive(Clone, Default)]
pub struct Container {
    values: HashMap<String, Instance>,
}

impl Container {
    /// Creates an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an instance under `id`, returning the previous one if any.
    pub fn insert(&mut self, id: impl Into<String>, instance: Instance) -> Option<Instance> {
        self.values.insert(id.into(), instance)
    }

    /// Gets the instance stored under `id` downcast to `T`.
    pub fn get<T>(&self, id: &str) -> ProvideResult<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        let instance = self
            .values
            .get(id)
            .cloned()
            .ok_or_else(|| ProvideError::MissingDependency(id.to_string()))?;
        instance.downcast::<T>().map_err(|_| ProvideError::TypeMismatch {
            id: id.to_string(),
            expected: std::any::type_name::<T>(),
        })
    }

    /// Gets the untyped instance stored under `id`.
    pub fn get_any(&self, id: &str) -> Option<&Instance> {
        self.values.get(id)
    }

    /// Returns true if an instance is stored under `id`.
    pub fn contains(&self, id: &str) -> bool {
        self.values.contains_key(id)
    }

    /// Ids present in the container, in no particular order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Moves every entry of `other` into `self`; entries of `other` win.
    pub fn merge(&mut self, other: Container) {
        self.values.extend(other.values);
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<&str> = self.ids().collect();
        ids.sort_unstable();
        f.debug_struct("Container").field("ids", &ids).finish()
    }
}

impl FromIterator<(String, Instance)> for Container {
    fn from_iter<I: IntoIterator<Item = (String, Instance)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Container {
    type Item = (String, Instance);
    type IntoIter = std::collections::hash_map::IntoIter<String, Instance>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}
