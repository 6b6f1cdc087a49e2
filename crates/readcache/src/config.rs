use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::coordinator::CoordinatorMode;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Which backend serves the shared tier
    #[serde(default)]
    pub remote: RemoteConfig,
    /// Redis connection settings (used when `remote.backend = "redis"`)
    #[serde(default)]
    pub redis: RedisConfig,
    /// Local (in-process) tier settings
    #[serde(default)]
    pub local: LocalConfig,
    /// TTL in seconds for values written back after a load
    /// Default: 18000 (5 hours)
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,
    /// How concurrent misses are serialized
    #[serde(default)]
    pub coordinator: CoordinatorMode,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_ttl_secs() -> u64 {
    5 * 60 * 60
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            remote: RemoteConfig::default(),
            redis: RedisConfig::default(),
            local: LocalConfig::default(),
            default_ttl_secs: default_ttl_secs(),
            coordinator: CoordinatorMode::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.remote.backend == RemoteBackend::Redis {
            if self.redis.host.trim().is_empty() {
                return Err("redis.host must not be empty".into());
            }
            if self.redis.port == 0 {
                return Err("redis.port must be > 0".into());
            }
            if self.redis.pool_size == 0 {
                return Err("redis.pool_size must be > 0".into());
            }
            if self.redis.timeout_ms == 0 {
                return Err("redis.timeout_ms must be > 0".into());
            }
        }
        if self.local.cleanup_interval_secs == 0 {
            return Err("local.cleanup_interval_secs must be > 0".into());
        }
        if self.local.refresh_ttl_ms == 0 {
            return Err("local.refresh_ttl_ms must be > 0".into());
        }
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        Ok(())
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RemoteBackend {
    /// Shared Redis instance
    #[default]
    Redis,
    /// In-process map; only for single-instance deployments and tests
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RemoteConfig {
    #[serde(default)]
    pub backend: RemoteBackend,
}

/// Redis connection settings for the shared tier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_host")]
    pub host: String,

    #[serde(default = "default_redis_port")]
    pub port: u16,

    /// Logical database number
    #[serde(default)]
    pub db: u32,

    /// Connection pool size
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,

    /// Connection timeout in milliseconds
    #[serde(default = "default_redis_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_redis_host() -> String {
    "127.0.0.1".to_string()
}

fn default_redis_port() -> u16 {
    6379
}

fn default_redis_pool_size() -> usize {
    10
}

fn default_redis_timeout_ms() -> u64 {
    5000
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: default_redis_host(),
            port: default_redis_port(),
            db: 0,
            pool_size: default_redis_pool_size(),
            timeout_ms: default_redis_timeout_ms(),
        }
    }
}

impl RedisConfig {
    /// Connection URL, e.g. `redis://127.0.0.1:6379/0`.
    pub fn url(&self) -> String {
        format!("redis://{}:{}/{}", self.host, self.port, self.db)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Local tier settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalConfig {
    /// How often expired local entries are swept, in seconds
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,

    /// Local TTL in milliseconds for values re-cached after a remote hit
    #[serde(default = "default_refresh_ttl_ms")]
    pub refresh_ttl_ms: u64,
}

fn default_cleanup_interval_secs() -> u64 {
    60
}

fn default_refresh_ttl_ms() -> u64 {
    1000
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            cleanup_interval_secs: default_cleanup_interval_secs(),
            refresh_ttl_ms: default_refresh_ttl_ms(),
        }
    }
}

impl LocalConfig {
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    pub fn refresh_ttl(&self) -> Duration {
        Duration::from_millis(self.refresh_ttl_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Level for the cache's own events; dependencies log at `warn`
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Include the event target (module path) in each line
    #[serde(default)]
    pub with_target: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            with_target: false,
        }
    }
}

pub mod loader {
    use super::CacheConfig;
    use crate::error::CacheError;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    /// Load configuration from a TOML file (default `readcache.toml`, if
    /// present) overlaid by `READCACHE__*` environment variables.
    pub fn load_config(path: Option<&str>) -> Result<CacheConfig, CacheError> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                let pathbuf = PathBuf::from(p);
                if !pathbuf.exists() {
                    return Err(CacheError::config(format!("config file not found: {p}")));
                }
                builder = builder.add_source(File::from(pathbuf));
            }
            None => {
                let default_path = PathBuf::from("readcache.toml");
                if default_path.exists() {
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }
        // Environment variable overrides, e.g., READCACHE__REDIS__PORT=6380
        builder = builder.add_source(
            Environment::with_prefix("READCACHE")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| CacheError::config(format!("config build error: {e}")))?;
        let merged: CacheConfig = cfg
            .try_deserialize()
            .map_err(|e| CacheError::config(format!("config deserialize error: {e}")))?;
        merged.validate().map_err(CacheError::config)?;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = CacheConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.default_ttl(), Duration::from_secs(18000));
        assert_eq!(cfg.local.refresh_ttl(), Duration::from_secs(1));
        assert_eq!(cfg.coordinator, CoordinatorMode::Global);
        assert_eq!(cfg.redis.url(), "redis://127.0.0.1:6379/0");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut cfg = CacheConfig::default();
        cfg.redis.port = 0;
        assert!(cfg.validate().is_err());

        // Redis settings are ignored for the memory backend.
        cfg.remote.backend = RemoteBackend::Memory;
        assert!(cfg.validate().is_ok());

        cfg.local.cleanup_interval_secs = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = CacheConfig::default();
        cfg.logging.level = "loud".into();
        assert!(cfg.validate().unwrap_err().contains("logging.level"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            r#"
default_ttl_secs = 600
coordinator = "per_key"

[redis]
host = "cache.internal"
port = 6380
db = 3

[local]
refresh_ttl_ms = 250
"#
        )
        .unwrap();

        let cfg = loader::load_config(file.path().to_str()).unwrap();
        assert_eq!(cfg.default_ttl_secs, 600);
        assert_eq!(cfg.coordinator, CoordinatorMode::PerKey);
        assert_eq!(cfg.redis.url(), "redis://cache.internal:6380/3");
        assert_eq!(cfg.redis.pool_size, 10);
        assert_eq!(cfg.local.refresh_ttl(), Duration::from_millis(250));
        assert_eq!(cfg.local.cleanup_interval_secs, 60);
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let err = loader::load_config(Some("/nonexistent/readcache.toml")).unwrap_err();
        assert_eq!(err.category(), crate::error::ErrorCategory::Config);
    }
}
