//! Shared, possibly pending constructions.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::{BoxFuture, FutureExt, Shared};

use crate::{Instance, ProvideError, ProvideResult};

/// One in-flight or completed construction.
///
/// A `Resolution` wraps a shared future: cloning it is cheap and every
/// clone observes the same outcome, including the same error. The
/// construction is driven by whichever clone is polled first, so a cache
/// can hand out a resolution before it has settled and concurrent callers
/// still share a single construction.
///
/// # Examples
///
/// ```
/// use ferrous_provide::Resolution;
/// use std::sync::Arc;
///
/// # async fn example() -> ferrous_provide::ProvideResult<()> {
/// let resolution = Resolution::new(async { Ok(Arc::new(7u8) as ferrous_provide::Instance) });
/// let other = resolution.clone();
///
/// let a = resolution.typed::<u8>().await?;
/// let b = other.typed::<u8>().await?;
/// assert!(Arc::ptr_eq(&a, &b));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Resolution {
    inner: Shared<BoxFuture<'static, ProvideResult<Instance>>>,
}

impl Resolution {
    /// Wraps a construction future.
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = ProvideResult<Instance>> + Send + 'static,
    {
        Self {
            inner: future.boxed().shared(),
        }
    }

    /// A resolution that is already settled with `instance`.
    pub fn ready(instance: Instance) -> Self {
        Self::new(futures::future::ready(Ok(instance)))
    }

    /// A resolution that is already settled with `error`.
    pub fn failed(error: ProvideError) -> Self {
        Self::new(futures::future::ready(Err(error)))
    }

    /// Awaits the instance and downcasts it to `T`.
    pub async fn typed<T>(self) -> ProvideResult<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        let instance = self.await?;
        instance.downcast::<T>().map_err(|_| ProvideError::TypeMismatch {
            id: String::from("<resolution>"),
            expected: std::any::type_name::<T>(),
        })
    }

    /// Returns true if both handles share the same construction.
    pub fn ptr_eq(&self, other: &Resolution) -> bool {
        self.inner.ptr_eq(&other.inner)
    }

    /// The settled outcome, if the construction has already completed.
    pub fn peek(&self) -> Option<&ProvideResult<Instance>> {
        self.inner.peek()
    }
}

impl Future for Resolution {
    type Output = ProvideResult<Instance>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.poll_unpin(cx)
    }
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.peek() {
            None => "pending",
            Some(Ok(_)) => "resolved",
            Some(Err(_)) => "failed",
        };
        f.debug_struct("Resolution").field("state", &state).finish()
    }
}
