//! Error types for the read-through cache.
//!
//! [`TierError`] is what a tier backend reports; [`CacheError`] is what the
//! orchestrator hands back to callers.

use std::fmt;

/// Boxed error produced by a caller-supplied loader.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Which layer of the hierarchy an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TierKind {
    /// The in-process tier.
    Local,
    /// The shared network tier.
    Remote,
}

impl fmt::Display for TierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Remote => write!(f, "remote"),
        }
    }
}

/// Errors raised by a tier backend.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TierError {
    /// The backend could not be reached or constructed.
    #[error("{tier} tier connection error: {message}")]
    Connection { tier: TierKind, message: String },

    /// The backend was reached but rejected or failed the command.
    #[error("{tier} tier command error: {message}")]
    Command { tier: TierKind, message: String },
}

impl TierError {
    /// Creates a new `Connection` error.
    #[must_use]
    pub fn connection(tier: TierKind, message: impl Into<String>) -> Self {
        Self::Connection {
            tier,
            message: message.into(),
        }
    }

    /// Creates a new `Command` error.
    #[must_use]
    pub fn command(tier: TierKind, message: impl Into<String>) -> Self {
        Self::Command {
            tier,
            message: message.into(),
        }
    }

    /// The tier that raised this error.
    #[must_use]
    pub fn tier(&self) -> TierKind {
        match self {
            Self::Connection { tier, .. } | Self::Command { tier, .. } => *tier,
        }
    }
}

/// Errors returned by [`ReadCache`](crate::ReadCache) operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Both tiers missed and no loader was supplied.
    #[error("key[{key}] not exist in cache")]
    NotFound { key: String },

    /// A remote value could not be decoded into the requested type.
    #[error("failed to decode cached value for key[{key}]: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// A value could not be encoded for the remote tier.
    #[error("failed to encode value for key[{key}]: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// A local entry holds a value of a different type than requested.
    #[error("cached value for key[{key}] is not a {expected}")]
    TypeMismatch { key: String, expected: &'static str },

    /// The loader failed. The loader's own error is the `source()`.
    #[error("loader failed for key[{key}]: {source}")]
    Loader {
        key: String,
        #[source]
        source: BoxError,
    },

    /// A tier backend failed.
    #[error(transparent)]
    Tier(#[from] TierError),

    /// Invalid or unavailable configuration.
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl CacheError {
    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Creates a new `TypeMismatch` error for the requested type `V`.
    #[must_use]
    pub fn type_mismatch<V>(key: impl Into<String>) -> Self {
        Self::TypeMismatch {
            key: key.into(),
            expected: std::any::type_name::<V>(),
        }
    }

    /// Creates a new `Loader` error wrapping the loader's failure.
    #[must_use]
    pub fn loader(key: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Loader {
            key: key.into(),
            source: source.into(),
        }
    }

    /// Creates a new `Config` error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a not found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if this is a type mismatch error.
    #[must_use]
    pub fn is_type_mismatch(&self) -> bool {
        matches!(self, Self::TypeMismatch { .. })
    }

    /// Returns the error category for logging purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::Decode { .. } | Self::Encode { .. } => ErrorCategory::Codec,
            Self::TypeMismatch { .. } => ErrorCategory::TypeMismatch,
            Self::Loader { .. } => ErrorCategory::Loader,
            Self::Tier(_) => ErrorCategory::Backend,
            Self::Config { .. } => ErrorCategory::Config,
        }
    }
}

/// Categories of cache errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    NotFound,
    Codec,
    TypeMismatch,
    Loader,
    Backend,
    Config,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::Codec => write!(f, "codec"),
            Self::TypeMismatch => write!(f, "type_mismatch"),
            Self::Loader => write!(f, "loader"),
            Self::Backend => write!(f, "backend"),
            Self::Config => write!(f, "config"),
        }
    }
}
