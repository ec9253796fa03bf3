//! Traits implemented by instance types.

mod dispose;

pub use dispose::{Dispose, AsyncDispose};
