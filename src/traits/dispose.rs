//! Disposal traits for instance types that know how to clean up after themselves.

/// Trait for synchronous resource disposal.
///
/// Implement this for instance types that need structured teardown (flushing
/// buffers, releasing handles). Turn it into a cache disposer with
/// [`Disposer::from_dispose`](crate::Disposer::from_dispose).
///
/// # Examples
///
/// ```
/// use ferrous_provide::{provide, Dispose, Disposer};
///
/// struct Cache {
///     name: String,
/// }
///
/// impl Dispose for Cache {
///     fn dispose(&self) {
///         println!("Flushing cache: {}", self.name);
///     }
/// }
///
/// let cache = provide("cache")
///     .by(|_| async { Ok(Cache { name: "user_cache".to_string() }) })
///     .with_disposer(Some(Disposer::from_dispose::<Cache>()))
///     .singleton();
/// ```
pub trait Dispose: Send + Sync + 'static {
    /// Perform synchronous cleanup of resources.
    fn dispose(&self);
}

/// Trait for asynchronous resource disposal.
///
/// Implement this for instance types that require async teardown (graceful
/// connection shutdown, flushing over the network). Turn it into a cache
/// disposer with [`Disposer::from_async_dispose`](crate::Disposer::from_async_dispose).
///
/// # Examples
///
/// ```
/// use ferrous_provide::{provide, AsyncDispose, Disposer, ProvideResult};
/// use async_trait::async_trait;
///
/// struct DatabaseClient {
///     connection_id: String,
/// }
///
/// #[async_trait]
/// impl AsyncDispose for DatabaseClient {
///     async fn dispose(&self) -> ProvideResult<()> {
///         println!("Closing database connection: {}", self.connection_id);
///         Ok(())
///     }
/// }
///
/// let client = provide("db")
///     .by(|_| async { Ok(DatabaseClient { connection_id: "conn_123".to_string() }) })
///     .with_disposer(Some(Disposer::from_async_dispose::<DatabaseClient>()))
///     .singleton();
/// ```
#[async_trait::async_trait]
pub trait AsyncDispose: Send + Sync + 'static {
    /// Perform asynchronous cleanup of resources.
    async fn dispose(&self) -> crate::ProvideResult<()>;
}
