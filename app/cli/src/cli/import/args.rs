use std::path::PathBuf;

use clap::Parser;
use clap::{arg, command};

#[derive(Parser, Debug)]
#[command(about = "Import the logs of a set of contracts", long_about = None)]
pub struct ImportArgs {
    /// Node Provider connection string
    #[arg(short, long)]
    pub rpc_url: String,

    /// SQLite connection string
    #[arg(short, long)]
    pub db_url: String,

    /// Chain name the import states are saved under
    #[arg(short, long)]
    pub chain: String,

    /// Contracts to import, as `address@creation_block` (comma-separated)
    #[arg(short, long)]
    pub objects: String,

    /// Event signature, e.g. `Transfer(address,address,uint256)`, or its topic0 hash
    #[arg(short, long)]
    pub event: String,

    /// Only import blocks after the last recent pass
    #[arg(long, default_value_t = false)]
    pub recent: bool,

    /// JSON file describing what the RPC provider accepts
    #[arg(long)]
    pub rpc_limitations: Option<PathBuf>,

    /// Re-import the full range of every contract
    #[arg(long, default_value_t = false)]
    pub ignore_import_state: bool,

    /// Plan address batches in a reproducible order
    #[arg(long, default_value_t = false)]
    pub deterministic: bool,

    /// Maximum queries planned per contract and pass
    #[arg(long, default_value_t = 10)]
    pub max_queries_per_product: usize,

    /// Provider calls in flight at once
    #[arg(long, default_value_t = 4)]
    pub work_concurrency: usize,

    /// Longest wait for a batch to fill up, in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub max_input_wait: u64,

    /// Maximum queries per provider call
    #[arg(long, default_value_t = 100)]
    pub max_input_take: usize,

    /// Retry budget of one batch, in milliseconds
    #[arg(long, default_value_t = 30_000)]
    pub max_total_retry: u64,

    /// Hold new work while resident memory is above this, in MiB
    #[arg(long, default_value_t = 2048)]
    pub max_memory_mb: u64,
}
