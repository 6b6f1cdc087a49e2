//! Process-wide cache instance.
//!
//! Services that want a single shared cache call [`init`] once at startup
//! and reach it anywhere through [`cache`].

use std::sync::OnceLock;

use crate::cache::ReadCache;
use crate::config::CacheConfig;
use crate::error::CacheError;

static SHARED: OnceLock<ReadCache> = OnceLock::new();

/// Connect both tiers from `config` and install the result.
///
/// Any failure here is a startup failure.
pub async fn init(config: &CacheConfig) -> Result<&'static ReadCache, CacheError> {
    if SHARED.get().is_some() {
        return Err(CacheError::config("read cache is already initialized"));
    }
    let instance = ReadCache::connect(config).await?;
    install(instance)
}

/// Install an already built cache.
pub fn install(instance: ReadCache) -> Result<&'static ReadCache, CacheError> {
    SHARED
        .set(instance)
        .map_err(|_| CacheError::config("read cache is already initialized"))?;
    cache()
}

/// The installed cache.
pub fn cache() -> Result<&'static ReadCache, CacheError> {
    SHARED
        .get()
        .ok_or_else(|| CacheError::config("read cache is not initialized"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RemoteBackend;
    use crate::tier::{MemoryRemoteTier, MemoryTier};
    use std::sync::Arc;

    // The instance is process-wide, so the whole lifecycle lives in one test.
    #[tokio::test]
    async fn test_init_once() {
        let mut config = CacheConfig::default();
        config.remote.backend = RemoteBackend::Memory;

        assert!(cache().is_err());

        let shared = init(&config).await.unwrap();
        shared
            .put("global", Some("value".to_string()), config.default_ttl())
            .await
            .unwrap();

        let again = cache().unwrap();
        let value = again.get_cached::<String>("global").await.unwrap();
        assert_eq!(value.as_deref().map(String::as_str), Some("value"));

        let err = init(&config).await.err().unwrap();
        assert!(matches!(err, CacheError::Config { .. }));

        let second = ReadCache::new(
            Arc::new(MemoryTier::new()),
            Arc::new(MemoryRemoteTier::new()),
        );
        let err = install(second).err().unwrap();
        assert!(matches!(err, CacheError::Config { .. }));
        assert!(std::ptr::eq(cache().unwrap(), shared));
    }
}
