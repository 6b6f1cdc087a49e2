mod cli;
mod output;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use readcache::config::loader::load_config;
use readcache::{CacheConfig, ReadCache};
use serde_json::Value;

use cli::{Cli, Commands};
use output::{print_error, print_note, print_success, print_value};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let mut logging = config.logging.clone();
    if let Some(level) = &cli.log_level {
        logging.level = level.clone();
    }
    readcache::init_tracing(&logging);

    match &cli.command {
        Commands::Config => {
            print_value(&serde_json::to_value(&config)?);
        }
        Commands::Get(args) => {
            let cache = connect(&config).await?;
            match cache.get_cached::<Value>(&args.key).await {
                Ok(Some(value)) => print_value(&value),
                Ok(None) => print_note("(cached absence)"),
                Err(e) if e.is_not_found() => {
                    anyhow::bail!("key not found: {}", args.key)
                }
                Err(e) => return Err(e.into()),
            }
        }
        Commands::Put(args) => {
            let value = parse_put_value(&args.value)?;
            let ttl = args
                .ttl_secs
                .map(Duration::from_secs)
                .unwrap_or_else(|| config.default_ttl());

            let cache = connect(&config).await?;
            cache.put(&args.key, Some(value), ttl).await?;
            print_success(&format!("Stored {} (ttl {}s)", args.key, ttl.as_secs()));
        }
        Commands::Delete(args) => {
            let cache = connect(&config).await?;
            cache.delete(&args.key).await?;
            print_success(&format!("Deleted {}", args.key));
        }
        Commands::Exists(args) => {
            let cache = connect(&config).await?;
            let exists = cache.exists(&args.key).await?;
            println!("{exists}");
        }
    }

    Ok(())
}

/// Parse the JSON given to `put`.
///
/// `null` is rejected: an absence is only ever cached in the local tier,
/// which does not outlive this process.
fn parse_put_value(raw: &str) -> Result<Value> {
    let value: Value =
        serde_json::from_str(raw).with_context(|| format!("value is not valid JSON: {raw}"))?;
    if value.is_null() {
        anyhow::bail!("null is only cached in-process and would not outlive this command");
    }
    Ok(value)
}

async fn connect(config: &CacheConfig) -> Result<ReadCache> {
    ReadCache::connect(config)
        .await
        .context("failed to initialize read cache")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_put_value_accepts_json() {
        assert_eq!(parse_put_value("42").unwrap(), json!(42));
        assert_eq!(parse_put_value("\"text\"").unwrap(), json!("text"));
        assert_eq!(parse_put_value(r#"{"id":1}"#).unwrap(), json!({"id": 1}));
    }

    #[test]
    fn test_parse_put_value_rejects_null_and_garbage() {
        let err = parse_put_value("null").unwrap_err();
        assert!(err.to_string().contains("in-process"));

        let err = parse_put_value("{not json").unwrap_err();
        assert!(err.to_string().contains("not valid JSON"));
    }
}
