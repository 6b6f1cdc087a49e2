//! Log output for the cache and the CLI.
//!
//! The configured level applies to this crate's own events; dependencies
//! (pool, Redis client, runtime) only report warnings and errors.
//! `RUST_LOG`, when set and valid, replaces the whole filter.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::LoggingConfig;

const OWN_TARGETS: [&str; 2] = ["readcache", "readcache_cli"];

/// Install the global subscriber on stderr.
///
/// Returns `false` if a subscriber was already installed.
pub fn init_tracing(logging: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| filter_for(logging));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(logging.with_target),
        )
        .try_init()
        .is_ok()
}

fn filter_for(logging: &LoggingConfig) -> EnvFilter {
    let level = logging.level.to_ascii_lowercase();
    let mut directives = vec!["warn".to_string()];
    directives.extend(OWN_TARGETS.iter().map(|target| format!("{target}={level}")));
    EnvFilter::new(directives.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_scopes_level_to_own_targets() {
        let logging = LoggingConfig {
            level: "DEBUG".to_string(),
            with_target: false,
        };
        let filter = filter_for(&logging).to_string();
        assert!(filter.contains("readcache=debug"), "{filter}");
        assert!(filter.contains("readcache_cli=debug"), "{filter}");
        assert!(filter.contains("warn"), "{filter}");
    }

    #[test]
    fn test_init_installs_once() {
        let logging = LoggingConfig::default();
        assert!(init_tracing(&logging));
        // Only one global subscriber can exist per process.
        assert!(!init_tracing(&logging));
        tracing::debug!("subscriber installed");
    }
}
