use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "readcache")]
#[command(about = "Inspect and populate a two-tier read cache")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (defaults to ./readcache.toml when present)
    #[arg(short, long, global = true, env = "READCACHE_CONFIG")]
    pub config: Option<String>,

    /// Log level (overrides logging.level from config; RUST_LOG wins over both)
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Read a key (local tier, then remote tier)
    Get(KeyArgs),
    /// Write a JSON value to both tiers
    Put(PutArgs),
    /// Remove a key from both tiers
    Delete(KeyArgs),
    /// Check whether either tier holds a key
    Exists(KeyArgs),
    /// Print the effective configuration
    Config,
}

#[derive(clap::Args)]
pub struct KeyArgs {
    /// Cache key
    pub key: String,
}

#[derive(clap::Args)]
pub struct PutArgs {
    /// Cache key
    pub key: String,
    /// Value as JSON (e.g. '"text"', '42', '{"id":1}')
    pub value: String,
    /// TTL in seconds (defaults to default_ttl_secs; 0 = no expiry)
    #[arg(long)]
    pub ttl_secs: Option<u64>,
}
