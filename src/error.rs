//! Error types for provider resolution, disposal and lifecycle hooks.

use std::fmt;
use std::sync::Arc;

/// Provider errors
///
/// Represents the failures that can surface while resolving a provider,
/// disposing a cached resolution or firing lifecycle hooks. The engine never
/// swallows one of these: each reaches the nearest caller.
///
/// `ProvideError` is `Clone` because a single failed construction is shared
/// by every caller awaiting the same cached resolution.
///
/// # Examples
///
/// ```rust
/// use ferrous_provide::ProvideError;
///
/// let missing = ProvideError::MissingDependency("database".to_string());
/// let custom = ProvideError::msg("connection refused");
///
/// println!("Error: {}", missing);
/// println!("Error: {}", custom);
/// ```
#[derive(Debug, Clone)]
pub enum ProvideError {
    /// The container has no entry for the requested dependency id
    MissingDependency(String),
    /// The instance stored under a dependency id has another type
    TypeMismatch {
        /// Dependency id that was looked up
        id: String,
        /// Requested type name
        expected: &'static str,
    },
    /// A disposer failed for the given cache key
    Disposer {
        /// Cache key of the disposed entry
        key: String,
        /// Failure message
        message: String,
    },
    /// A lifecycle hook failed
    Hook(String),
    /// Settings could not be loaded
    Config(String),
    /// Any other failure raised by user code
    Custom(Arc<dyn std::error::Error + Send + Sync>),
}

impl ProvideError {
    /// Creates a [`ProvideError::Custom`] from a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        ProvideError::Custom(Arc::new(Message(message.into())))
    }

    /// Wraps an arbitrary error as [`ProvideError::Custom`].
    pub fn custom<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ProvideError::Custom(Arc::new(error))
    }
}

impl fmt::Display for ProvideError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProvideError::MissingDependency(id) => write!(f, "Dependency not found: {}", id),
            ProvideError::TypeMismatch { id, expected } => {
                write!(f, "Type mismatch for dependency {id}: expected {expected}")
            }
            ProvideError::Disposer { key, message } => {
                write!(f, "Disposer failed for cache key {}: {}", key, message)
            }
            ProvideError::Hook(message) => write!(f, "Lifecycle hook failed: {}", message),
            ProvideError::Config(message) => write!(f, "Invalid settings: {}", message),
            ProvideError::Custom(error) => write!(f, "{}", error),
        }
    }
}

impl std::error::Error for ProvideError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProvideError::Custom(error) => Some(error.as_ref()),
            _ => None,
        }
    }
}

impl From<String> for ProvideError {
    fn from(message: String) -> Self {
        ProvideError::msg(message)
    }
}

impl From<&str> for ProvideError {
    fn from(message: &str) -> Self {
        ProvideError::msg(message)
    }
}

#[derive(Debug)]
struct Message(String);

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for Message {}

/// Result type for provider operations
///
/// A convenience alias for `Result<T, ProvideError>` used throughout
/// ferrous-provide, including as the output of resolver futures.
///
/// # Examples
///
/// ```rust
/// use ferrous_provide::{ProvideResult, ProvideError};
///
/// fn connect(url: &str) -> ProvideResult<String> {
///     if url.is_empty() {
///         return Err(ProvideError::msg("empty url"));
///     }
///     Ok(format!("connected to {}", url))
/// }
///
/// assert!(connect("").is_err());
/// ```
pub type ProvideResult<T> = Result<T, ProvideError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn display_names_the_failing_part() {
        let err = ProvideError::TypeMismatch {
            id: "db".to_string(),
            expected: "u32",
        };
        assert_eq!(err.to_string(), "Type mismatch for dependency db: expected u32");

        let err = ProvideError::Disposer {
            key: "singleton".to_string(),
            message: "closed".to_string(),
        };
        assert_eq!(err.to_string(), "Disposer failed for cache key singleton: closed");
    }

    #[test]
    fn custom_errors_expose_their_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "socket closed");
        let err = ProvideError::custom(io);
        assert_eq!(err.to_string(), "socket closed");
        assert!(err.source().is_some());

        let err: ProvideError = "plain".into();
        assert_eq!(err.to_string(), "plain");
    }
}
