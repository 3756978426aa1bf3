//! Command line arguments

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Default RocksDB directory when `--data-dir` is not given
pub const DEFAULT_DATA_DIR: &str = "./data/leasehold";

#[derive(Debug, Parser)]
#[command(name = "leasehold", version, about = "Lease locks and TTL values over an embedded store")]
pub struct Cli {
    /// RocksDB directory holding leases and values
    #[arg(long, env = "LEASEHOLD_DATA_DIR", default_value = DEFAULT_DATA_DIR, global = true)]
    pub data_dir: PathBuf,

    /// Config file (TOML/YAML/JSON) for the lock manager
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Key namespace, overriding the config file
    #[arg(long, global = true)]
    pub namespace: Option<String>,

    /// Owner id written into leases; defaults to the host name
    #[arg(long, env = "LEASEHOLD_WORKER_ID", global = true)]
    pub worker_id: Option<String>,

    /// Log level used when RUST_LOG is unset
    #[arg(long, default_value = "warn", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Acquire a lease and print its token
    Acquire {
        key: String,
        #[command(flatten)]
        lease: LeaseArgs,
        /// Retry until the lease is acquired
        #[arg(long, conflicts_with = "max_attempts")]
        wait: bool,
        /// Pause between attempts in milliseconds
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,
    },
    /// Extend a lease previously acquired by this worker
    Extend {
        key: String,
        token: String,
        /// New lease lifetime in seconds
        #[arg(long)]
        ttl: Option<u64>,
    },
    /// Release a lease if the token still holds it
    Release { key: String, token: String },
    /// Print the current lease record as JSON
    Status { key: String },
    /// Run a command while holding a lease, extending it in the background
    Exec {
        key: String,
        #[command(flatten)]
        lease: LeaseArgs,
        /// Program and arguments, after `--`
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },
    /// Read and write cached values
    #[command(subcommand)]
    Cache(CacheCommand),
}

#[derive(Debug, Clone, Args)]
pub struct LeaseArgs {
    /// Lease lifetime in seconds
    #[arg(long)]
    pub ttl: Option<u64>,
    /// Attempts before giving up
    #[arg(long)]
    pub max_attempts: Option<u32>,
}

#[derive(Debug, Subcommand)]
pub enum CacheCommand {
    /// Store a JSON value
    Put {
        key: String,
        /// JSON document; bare words are stored as strings
        value: String,
        /// Value lifetime in seconds
        #[arg(long)]
        ttl: Option<u64>,
    },
    /// Print a stored value as JSON
    Get {
        key: String,
        /// JSON printed when the value is missing or expired
        #[arg(long)]
        default: Option<String>,
        /// Return the value even when it has expired
        #[arg(long)]
        ignore_ttl: bool,
    },
}
