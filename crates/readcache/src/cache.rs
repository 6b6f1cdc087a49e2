//! Read-through orchestration across the local and remote tiers.
//!
//! ## Lookup Order
//!
//! ```text
//! get → local ──miss──→ remote ──miss──→ [miss gate] local re-check ──miss──→ loader
//!         │                │                     │                            │
//!       return     write back to local         return                 put to both tiers
//!                  (refresh ttl), return                              (default ttl), return
//! ```
//!
//! ## Error Policy
//!
//! Failures that affect the value being returned (decode, type mismatch,
//! loader, not found) propagate. Failures that only affect later lookups
//! (write-back after a remote hit or a load) are logged and swallowed.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::codec;
use crate::config::{CacheConfig, RemoteBackend};
use crate::coordinator::{CoordinatorMode, MissCoordinator};
use crate::error::{BoxError, CacheError};
use crate::tier::{LocalTier, LocalValue, MemoryRemoteTier, MemoryTier, RedisTier, RemoteTier};

/// TTL for values written back after a successful load.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60 * 60);

/// Local TTL for values re-cached after a remote hit.
pub const DEFAULT_REFRESH_TTL: Duration = Duration::from_secs(1);

type NoLoader<V> = fn(String, ()) -> std::future::Ready<Result<Option<V>, CacheError>>;

/// Two-tier read-through cache.
///
/// Values come back as `Option<Arc<V>>`: `None` is a cached absence, a
/// legitimate answer that stops the lookup. A key that is not cached at all
/// and cannot be loaded is [`CacheError::NotFound`].
pub struct ReadCache {
    local: Arc<dyn LocalTier>,
    remote: Arc<dyn RemoteTier>,
    coordinator: MissCoordinator,
    default_ttl: Duration,
    refresh_ttl: Duration,
}

impl ReadCache {
    pub fn new(local: Arc<dyn LocalTier>, remote: Arc<dyn RemoteTier>) -> Self {
        Self {
            local,
            remote,
            coordinator: MissCoordinator::default(),
            default_ttl: DEFAULT_TTL,
            refresh_ttl: DEFAULT_REFRESH_TTL,
        }
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_refresh_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_ttl = ttl;
        self
    }

    pub fn with_coordinator(mut self, mode: CoordinatorMode) -> Self {
        self.coordinator = MissCoordinator::new(mode);
        self
    }

    /// Build both tiers from configuration.
    ///
    /// Fails if the configuration is invalid or the remote tier cannot be
    /// reached. This is a startup failure; callers are expected to abort.
    pub async fn connect(config: &CacheConfig) -> Result<Self, CacheError> {
        config.validate().map_err(CacheError::config)?;

        let remote: Arc<dyn RemoteTier> = match config.remote.backend {
            RemoteBackend::Redis => Arc::new(RedisTier::connect(&config.redis).await?),
            RemoteBackend::Memory => {
                tracing::info!("Using in-process remote tier (single instance only)");
                Arc::new(MemoryRemoteTier::new())
            }
        };

        let local = Arc::new(MemoryTier::new());
        local.spawn_cleanup(config.local.cleanup_interval());

        tracing::info!(
            default_ttl_secs = config.default_ttl_secs,
            refresh_ttl_ms = config.local.refresh_ttl_ms,
            coordinator = ?config.coordinator,
            "read cache initialized"
        );

        Ok(Self::new(local, remote)
            .with_default_ttl(config.default_ttl())
            .with_refresh_ttl(config.local.refresh_ttl())
            .with_coordinator(config.coordinator))
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    pub fn coordinator(&self) -> &MissCoordinator {
        &self.coordinator
    }

    /// Get the local tier (for testing/internal use).
    pub fn local_tier(&self) -> &Arc<dyn LocalTier> {
        &self.local
    }

    /// Get the remote tier (for testing/internal use).
    pub fn remote_tier(&self) -> &Arc<dyn RemoteTier> {
        &self.remote
    }

    /// Read a value, falling back to `loader` when both tiers miss.
    ///
    /// With `loader = None` a full miss is [`CacheError::NotFound`]. A loader
    /// result, including `None`, is written back to both tiers with the
    /// default TTL before it is returned. A loader error is returned and
    /// nothing is cached.
    pub async fn get<V, P, F, Fut, E>(
        &self,
        key: &str,
        param: P,
        loader: Option<F>,
    ) -> Result<Option<Arc<V>>, CacheError>
    where
        V: Serialize + DeserializeOwned + Send + Sync + 'static,
        F: FnOnce(String, P) -> Fut,
        Fut: Future<Output = Result<Option<V>, E>>,
        E: Into<BoxError>,
    {
        if let Some(cached) = self.local.get(key).await {
            let value = narrow::<V>(key, cached)?;
            tracing::debug!(key = %key, "get from local tier success");
            return Ok(value);
        }

        if let Some(value) = self.get_remote::<V>(key).await? {
            return Ok(Some(value));
        }

        match loader {
            Some(loader) => self.load(key, param, loader).await,
            None => Err(CacheError::not_found(key)),
        }
    }

    /// [`get`](Self::get) with a loader.
    pub async fn get_or_load<V, P, F, Fut, E>(
        &self,
        key: &str,
        param: P,
        loader: F,
    ) -> Result<Option<Arc<V>>, CacheError>
    where
        V: Serialize + DeserializeOwned + Send + Sync + 'static,
        F: FnOnce(String, P) -> Fut,
        Fut: Future<Output = Result<Option<V>, E>>,
        E: Into<BoxError>,
    {
        self.get(key, param, Some(loader)).await
    }

    /// [`get`](Self::get) without a loader: a full miss is an error.
    pub async fn get_cached<V>(&self, key: &str) -> Result<Option<Arc<V>>, CacheError>
    where
        V: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        self.get(key, (), None::<NoLoader<V>>).await
    }

    /// Write a value to both tiers.
    ///
    /// The local tier is written first, whatever the value; if that fails
    /// the remote tier is not touched. `None` is cached locally only, so
    /// other processes never see a stored null.
    pub async fn put<V>(&self, key: &str, value: Option<V>, ttl: Duration) -> Result<(), CacheError>
    where
        V: Serialize + Send + Sync + 'static,
    {
        self.put_shared(key, value.map(Arc::new), ttl).await
    }

    /// Cache an absence for `key` in the local tier.
    pub async fn put_absent(&self, key: &str, ttl: Duration) -> Result<(), CacheError> {
        self.local.put(key, LocalValue::absent(), ttl).await?;
        tracing::debug!(key = %key, "put absence to local tier success");
        Ok(())
    }

    /// Remove `key` from the local tier, then the remote tier.
    pub async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.local.delete(key).await?;
        self.remote.delete(key).await?;
        tracing::debug!(key = %key, "delete from cache success");
        Ok(())
    }

    /// `true` if either tier holds `key`. The local tier is asked first.
    pub async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        if self.local.exists(key).await? {
            return Ok(true);
        }
        Ok(self.remote.exists(key).await?)
    }

    async fn put_shared<V>(
        &self,
        key: &str,
        value: Option<Arc<V>>,
        ttl: Duration,
    ) -> Result<(), CacheError>
    where
        V: Serialize + Send + Sync + 'static,
    {
        self.local
            .put(key, LocalValue::from_option(value.clone()), ttl)
            .await?;

        if let Some(value) = value {
            let raw = codec::encode(key, &*value)?;
            // A value that serializes to `null` would read back as a
            // stored null elsewhere; keep it local like any absence.
            if raw == "null" {
                tracing::debug!(key = %key, "value encodes to null, remote tier skipped");
            } else {
                self.remote.put(key, raw, ttl).await?;
            }
        }

        tracing::debug!(key = %key, "put to cache success");
        Ok(())
    }

    async fn get_remote<V>(&self, key: &str) -> Result<Option<Arc<V>>, CacheError>
    where
        V: DeserializeOwned + Send + Sync + 'static,
    {
        let raw = match self.remote.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Ok(None),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "remote tier GET error, treating as miss");
                return Ok(None);
            }
        };

        let value = Arc::new(codec::decode::<V>(key, &raw)?);

        if let Err(e) = self
            .local
            .put(key, LocalValue::present(Arc::clone(&value)), self.refresh_ttl)
            .await
        {
            tracing::error!(
                key = %key,
                error = %e,
                "get from remote tier success, but write back to local tier failed"
            );
        }

        tracing::debug!(key = %key, "get from remote tier success");
        Ok(Some(value))
    }

    async fn load<V, P, F, Fut, E>(
        &self,
        key: &str,
        param: P,
        loader: F,
    ) -> Result<Option<Arc<V>>, CacheError>
    where
        V: Serialize + Send + Sync + 'static,
        F: FnOnce(String, P) -> Fut,
        Fut: Future<Output = Result<Option<V>, E>>,
        E: Into<BoxError>,
    {
        tracing::debug!(key = %key, "key not in cache, loading from source");

        let _gate = self.coordinator.acquire(key).await;

        // A previous gate holder may have loaded this key while we waited.
        if let Some(cached) = self.local.get(key).await {
            let value = narrow::<V>(key, cached)?;
            tracing::debug!(key = %key, "get from local tier after acquiring load gate, skipping loader");
            return Ok(value);
        }

        let loaded = loader(key.to_string(), param)
            .await
            .map_err(|e| CacheError::loader(key, e))?
            .map(Arc::new);

        if let Err(e) = self.put_shared(key, loaded.clone(), self.default_ttl).await {
            tracing::error!(key = %key, error = %e, "write back to cache after load failed");
        }

        tracing::debug!(key = %key, absent = loaded.is_none(), "loaded from source");
        Ok(loaded)
    }
}

fn narrow<V: Send + Sync + 'static>(
    key: &str,
    cached: LocalValue,
) -> Result<Option<Arc<V>>, CacheError> {
    cached.downcast::<V>().map_err(|_| {
        tracing::warn!(
            key = %key,
            expected = std::any::type_name::<V>(),
            "local tier holds a value of another type"
        );
        CacheError::type_mismatch::<V>(key)
    })
}
