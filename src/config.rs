//! Loadable cache settings for providers.
//!
//! Settings come from environment variables (always available) or, with
//! the `config` feature, from JSON. Apply them with
//! [`Provider::configure`](crate::Provider::configure).

use std::env;
use std::time::Duration;
#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use crate::{ProvideError, ProvideResult};

/// Provider-level caching defaults.
///
/// # Examples
///
/// ```
/// use ferrous_provide::{provide, CacheSettings};
/// use std::time::Duration;
///
/// let settings = CacheSettings {
///     default_cache_key: Some("main".to_string()),
///     default_ttl_ms: Some(30_000),
/// };
///
/// let provider = provide("db").configure(&settings);
/// assert_eq!(provider.default_cache_key(), Some("main"));
/// assert_eq!(provider.default_ttl(), Some(Duration::from_secs(30)));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct CacheSettings {
    /// Cache key used when a resolution names none
    pub default_cache_key: Option<String>,
    /// Default entry TTL in milliseconds
    pub default_ttl_ms: Option<u64>,
}

impl CacheSettings {
    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl_ms.map(Duration::from_millis)
    }

    /// Reads `{PREFIX}_DEFAULT_CACHE_KEY` and `{PREFIX}_DEFAULT_TTL_MS`.
    pub fn from_env(prefix: &str) -> ProvideResult<Self> {
        Self::from_lookup(prefix, |name| env::var(name).ok())
    }

    /// Same as [`from_env`](CacheSettings::from_env) with a custom variable
    /// lookup.
    pub fn from_lookup<F>(prefix: &str, lookup: F) -> ProvideResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let name = |suffix: &str| {
            if prefix.is_empty() {
                suffix.to_string()
            } else {
                format!("{}_{}", prefix.to_uppercase(), suffix)
            }
        };

        let default_cache_key = lookup(&name("DEFAULT_CACHE_KEY")).filter(|key| !key.is_empty());
        let ttl_var = name("DEFAULT_TTL_MS");
        let default_ttl_ms = match lookup(&ttl_var) {
            Some(raw) => Some(raw.trim().parse::<u64>().map_err(|err| {
                let message = format!("{ttl_var} must be a non-negative integer: {err}");
                ProvideError::Config(message)
            })?),
            None => None,
        };

        Ok(Self {
            default_cache_key,
            default_ttl_ms,
        })
    }

    /// Parses settings from a JSON document.
    #[cfg(feature = "config")]
    pub fn from_json(json: &str) -> ProvideResult<Self> {
        serde_json::from_str(json).map_err(|err| ProvideError::Config(err.to_string()))
    }
}
