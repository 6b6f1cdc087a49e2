//! Shared tier backed by Redis through a `deadpool-redis` pool.

use std::time::Duration;

use ::redis::AsyncCommands;
use async_trait::async_trait;
use deadpool_redis::{Connection, Pool, Runtime};

use super::RemoteTier;
use crate::config::RedisConfig;
use crate::error::{TierError, TierKind};

/// Remote tier storing JSON text in Redis.
///
/// | Operation | Command               |
/// |-----------|-----------------------|
/// | get       | `GET`                 |
/// | put       | `PSETEX` (`SET` if ttl is zero) |
/// | delete    | `DEL`                 |
/// | exists    | `EXISTS`              |
#[derive(Clone)]
pub struct RedisTier {
    pool: Pool,
}

impl RedisTier {
    /// Wrap an existing pool.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Build a pool from configuration and verify that one connection can be
    /// established.
    pub async fn connect(config: &RedisConfig) -> Result<Self, TierError> {
        let url = config.url();
        tracing::info!(url = %url, pool_size = config.pool_size, "Connecting to Redis");

        let mut redis_config = deadpool_redis::Config::from_url(&url);
        let timeout = Some(config.timeout());
        let mut pool_config = redis_config.pool.take().unwrap_or_default();
        pool_config.max_size = config.pool_size;
        pool_config.timeouts.wait = timeout;
        pool_config.timeouts.create = timeout;
        pool_config.timeouts.recycle = timeout;
        redis_config.pool = Some(pool_config);

        let pool = redis_config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| {
                TierError::connection(TierKind::Remote, format!("failed to create pool: {e}"))
            })?;

        let tier = Self::new(pool);
        tier.conn().await?;
        tracing::info!(url = %url, "Connected to Redis");
        Ok(tier)
    }

    /// Check whether a connection can be taken from the pool.
    pub async fn is_available(&self) -> bool {
        self.pool.get().await.is_ok()
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    async fn conn(&self) -> Result<Connection, TierError> {
        self.pool.get().await.map_err(|e| {
            TierError::connection(
                TierKind::Remote,
                format!("failed to get Redis connection: {e}"),
            )
        })
    }
}

fn command_error(op: &str, key: &str, e: ::redis::RedisError) -> TierError {
    TierError::command(TierKind::Remote, format!("{op} {key}: {e}"))
}

#[async_trait]
impl RemoteTier for RedisTier {
    async fn get(&self, key: &str) -> Result<Option<String>, TierError> {
        let mut conn = self.conn().await?;
        conn.get::<_, Option<String>>(key)
            .await
            .map_err(|e| command_error("GET", key, e))
    }

    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), TierError> {
        let mut conn = self.conn().await?;
        let millis = expiry_millis(ttl);
        let result = match millis {
            None => conn.set::<_, _, ()>(key, value).await,
            Some(millis) => conn.pset_ex::<_, _, ()>(key, value, millis).await,
        };
        result.map_err(|e| command_error("SET", key, e))?;
        tracing::debug!(key = %key, ttl_ms = millis.unwrap_or(0), "remote tier set");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), TierError> {
        let mut conn = self.conn().await?;
        conn.del::<_, ()>(key)
            .await
            .map_err(|e| command_error("DEL", key, e))
    }

    async fn exists(&self, key: &str) -> Result<bool, TierError> {
        let mut conn = self.conn().await?;
        conn.exists::<_, bool>(key)
            .await
            .map_err(|e| command_error("EXISTS", key, e))
    }
}

/// PSETEX argument for `ttl`; `None` means store without expiry.
fn expiry_millis(ttl: Duration) -> Option<u64> {
    if ttl.is_zero() {
        return None;
    }
    // Sub-millisecond TTLs would be rejected by PSETEX.
    Some(u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1))
}
