//! # readcache
//!
//! Two-tier read-through cache: a fast in-process tier in front of a shared
//! Redis tier, with an optional loader that fills both on a full miss.
//!
//! ## Cache Hierarchy
//!
//! ```text
//! get → local (DashMap) → remote (Redis) → loader (DB/API)
//!          <1µs              ~ms             whatever the source costs
//! ```
//!
//! Concurrent misses are funnelled through a [`MissCoordinator`] so a cold key
//! is loaded once, not once per caller.
//!
//! ## Example
//!
//! ```ignore
//! use readcache::{CacheConfig, ReadCache};
//!
//! let cache = ReadCache::connect(&CacheConfig::default()).await?;
//! let user = cache
//!     .get_or_load("user:42", &pool, |key, pool| async move {
//!         load_user(pool, &key).await
//!     })
//!     .await?;
//! ```

pub mod cache;
pub mod codec;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod global;
pub mod observability;
pub mod tier;

pub use cache::{DEFAULT_REFRESH_TTL, DEFAULT_TTL, ReadCache};
pub use config::{
    CacheConfig, LocalConfig, LoggingConfig, RedisConfig, RemoteBackend, RemoteConfig,
};
pub use coordinator::{CoordinatorMode, MissCoordinator, MissGuard};
pub use error::{BoxError, CacheError, ErrorCategory, TierError, TierKind};
pub use observability::init_tracing;
pub use tier::{LocalTier, LocalValue, MemoryRemoteTier, MemoryTier, RedisTier, RemoteTier};
