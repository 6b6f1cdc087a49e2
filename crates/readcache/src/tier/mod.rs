//! Tier contracts and their implementations.
//!
//! ## Tiers
//!
//! - **Local** ([`LocalTier`]): in-process, holds typed values directly,
//!   including cached absences.
//! - **Remote** ([`RemoteTier`]): shared across processes, holds JSON text,
//!   never holds a null.
//!
//! ## TTL convention
//!
//! A `ttl` of [`Duration::ZERO`] stores the entry without expiry. Any other
//! value is an expiry horizon measured from the write.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::TierError;

pub mod local;
pub mod memory;
pub mod redis;

pub use self::local::MemoryTier;
pub use self::memory::MemoryRemoteTier;
pub use self::redis::RedisTier;

/// A type-erased entry in the local tier.
///
/// `LocalValue::absent()` is a cached "no value" answer, which is different
/// from the key not being in the tier at all.
#[derive(Clone)]
pub struct LocalValue(Option<Arc<dyn Any + Send + Sync>>);

impl LocalValue {
    /// A cached absence.
    pub fn absent() -> Self {
        Self(None)
    }

    /// A present value.
    pub fn present<V: Send + Sync + 'static>(value: Arc<V>) -> Self {
        Self(Some(value))
    }

    pub fn from_option<V: Send + Sync + 'static>(value: Option<Arc<V>>) -> Self {
        match value {
            Some(value) => Self::present(value),
            None => Self::absent(),
        }
    }

    pub fn is_absent(&self) -> bool {
        self.0.is_none()
    }

    /// Narrow the entry back to `V`.
    ///
    /// A cached absence narrows to any type. A present value of another type
    /// is handed back unchanged as the error.
    pub fn downcast<V: Send + Sync + 'static>(self) -> Result<Option<Arc<V>>, LocalValue> {
        match self.0 {
            None => Ok(None),
            Some(value) => value
                .downcast::<V>()
                .map(Some)
                .map_err(|value| Self(Some(value))),
        }
    }
}

impl fmt::Debug for LocalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            None => f.write_str("LocalValue(absent)"),
            Some(_) => f.write_str("LocalValue(present)"),
        }
    }
}

/// The fast, process-local tier. Consulted first.
///
/// Implementations must be safe for concurrent use.
#[async_trait]
pub trait LocalTier: Send + Sync {
    /// Returns `None` if the key is not present (or has expired).
    async fn get(&self, key: &str) -> Option<LocalValue>;

    /// Store an entry. Must accept [`LocalValue::absent`].
    async fn put(&self, key: &str, value: LocalValue, ttl: Duration) -> Result<(), TierError>;

    async fn delete(&self, key: &str) -> Result<(), TierError>;

    async fn exists(&self, key: &str) -> Result<bool, TierError>;
}

/// The shared tier. Values are JSON text; absence is signalled by `None`.
///
/// Implementations must be safe for concurrent use.
#[async_trait]
pub trait RemoteTier: Send + Sync {
    /// Returns `Ok(None)` if the key is not present.
    async fn get(&self, key: &str) -> Result<Option<String>, TierError>;

    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), TierError>;

    async fn delete(&self, key: &str) -> Result<(), TierError>;

    async fn exists(&self, key: &str) -> Result<bool, TierError>;
}

/// Expiry instant for a TTL under the zero-means-forever convention.
///
/// A TTL too large to represent as an `Instant` is also treated as forever.
pub(crate) fn expires_at(ttl: Duration) -> Option<std::time::Instant> {
    if ttl.is_zero() {
        None
    } else {
        std::time::Instant::now().checked_add(ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_narrows_to_any_type() {
        assert_eq!(LocalValue::absent().downcast::<String>().unwrap(), None);
        assert_eq!(LocalValue::absent().downcast::<u32>().unwrap(), None);
    }

    #[test]
    fn test_present_narrows_to_own_type() {
        let value = LocalValue::present(Arc::new("abc".to_string()));
        assert!(!value.is_absent());

        let narrowed = value.downcast::<String>().unwrap();
        assert_eq!(narrowed.as_deref().map(String::as_str), Some("abc"));
    }

    #[test]
    fn test_present_rejects_other_type() {
        let value = LocalValue::present(Arc::new(5_u32));
        let rejected = value.downcast::<String>().unwrap_err();

        // The rejected value comes back intact.
        assert_eq!(*rejected.downcast::<u32>().unwrap().unwrap(), 5);
    }

    #[test]
    fn test_from_option() {
        assert!(LocalValue::from_option::<u8>(None).is_absent());
        assert!(!LocalValue::from_option(Some(Arc::new(1_u8))).is_absent());
    }

    #[test]
    fn test_zero_ttl_never_expires() {
        assert!(expires_at(Duration::ZERO).is_none());
        assert!(expires_at(Duration::from_secs(1)).is_some());
    }

    #[test]
    fn test_unrepresentable_ttl_never_expires() {
        assert!(expires_at(Duration::MAX).is_none());
        assert!(expires_at(Duration::from_secs(u64::MAX)).is_none());
    }
}
