//! # ferrous-provide
//!
//! Lazy, asynchronous providers with explicit dependency graphs.
//!
//! ## Features
//!
//! - **Explicit graphs**: every provider declares its dependencies by reference, no reflection
//! - **Keyed caching**: at most one construction per cache key, even under concurrent callers
//! - **Expiry and disposal**: per-entry TTL timers and disposers, dispose-before-replace
//! - **Graph rewrites**: surgical mocking by id and deep isolation preserving shared nodes
//! - **Groups and scopes**: batch resolution, disposal and start/stop fan-out
//! - **Immutable builders**: every builder call returns a new provider
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrous_provide::{provide, group};
//!
//! # async fn example() -> ferrous_provide::ProvideResult<()> {
//! let config = provide("config")
//!     .by(|_| async { Ok("postgres://localhost".to_string()) })
//!     .singleton();
//!
//! let database = provide("database")
//!     .using([config.clone()])
//!     .by(|deps| async move {
//!         let url = deps.get::<String>("config")?;
//!         Ok(format!("pool({})", url))
//!     })
//!     .singleton();
//!
//! let app = group([config, database]).resolve().await?;
//! assert_eq!(*app.get::<String>("database")?, "pool(postgres://localhost)");
//! # Ok(())
//! # }
//! ```
//!
//! ## Caching
//!
//! Resolutions are cached only when a cache key applies: either passed
//! explicitly ([`Provider::resolve_cached`]) or set as the provider default
//! ([`Provider::persisted`], [`Provider::singleton`]). Each key holds one
//! construction until it is disposed.
//!
//! ```rust
//! use ferrous_provide::provide;
//! use std::sync::Arc;
//!
//! # async fn example() -> ferrous_provide::ProvideResult<()> {
//! let session = provide("session").by(|_| async { Ok(String::from("s")) }).persisted("main");
//!
//! let a = session.get::<String>().await?;
//! let b = session.get_cached::<String>("main").await?;
//! let c = session.get_cached::<String>("other").await?;
//! assert!(Arc::ptr_eq(&a, &b));
//! assert!(!Arc::ptr_eq(&a, &c));
//! # Ok(())
//! # }
//! ```
//!
//! ## Mocking and Isolation
//!
//! ```rust
//! use ferrous_provide::provide;
//!
//! # async fn example() -> ferrous_provide::ProvideResult<()> {
//! let clock = provide("clock").by(|_| async { Ok(1_700_000_000u64) });
//! let service = provide("service")
//!     .using([clock])
//!     .by(|deps| async move { Ok(*deps.get::<u64>("clock")? + 1) });
//!
//! let frozen = provide("clock").by(|_| async { Ok(0u64) });
//! let under_test = service.mock([frozen]);
//! assert_eq!(*under_test.get::<u64>().await?, 1);
//! # Ok(())
//! # }
//! ```

// Module declarations
pub mod cache;
pub mod config;
pub mod container;
pub mod error;
pub mod graph;
pub mod group;
pub mod lifecycle;
pub mod provider;
pub mod resolution;
pub mod scope;
pub mod traits;

// Re-export core types
pub use cache::{CacheOptions, Disposer, ResolutionCache};
pub use config::CacheSettings;
pub use container::{Container, Instance};
pub use error::{ProvideError, ProvideResult};
pub use graph::{CloneResolver, MockResolver};
pub use group::{group, Group};
pub use lifecycle::Lifecycle;
pub use provider::{provide, Provider, ProviderOptions, ResolveOptions, Resolver, SINGLETON_KEY};
pub use resolution::Resolution;
pub use scope::Scope;
pub use traits::{AsyncDispose, Dispose};
