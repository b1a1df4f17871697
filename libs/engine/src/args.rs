use alloy::primitives::B256;
use chain::limits::RpcLimitations;
use sync::throttle::ThrottleConfig;

use crate::executor::BatchStreamConfig;
use crate::optimizer::types::{OptimizerOptions, TieBreak};
use crate::retry::RetryPolicy;

/// Configuration of one chain's import job.
#[derive(Debug, Clone)]
pub struct Args {
    pub chain: String,
    /// Accepted topic0 values, usually a single event signature hash.
    pub topics: Vec<B256>,
    pub ignore_import_state: bool,
    pub max_queries_per_product: usize,
    pub tie_break: TieBreak,
    pub batch: BatchStreamConfig,
    pub throttle: ThrottleConfig,
    pub retry: RetryPolicy,
}

impl Args {
    pub fn new(chain: impl Into<String>, topics: Vec<B256>) -> Self {
        Self {
            chain: chain.into(),
            topics,
            ignore_import_state: false,
            max_queries_per_product: 10,
            tie_break: TieBreak::default(),
            batch: BatchStreamConfig::default(),
            throttle: ThrottleConfig::default(),
            retry: RetryPolicy::default(),
        }
    }

    /// Planning budgets, bounded by what the chain's provider accepts.
    pub fn optimizer_options(&self, limitations: &RpcLimitations) -> OptimizerOptions {
        OptimizerOptions {
            ignore_import_state: self.ignore_import_state,
            max_addresses_per_query: limitations.max_get_logs_addresses,
            max_range_size: limitations.max_get_logs_block_span,
            max_queries_per_product: self.max_queries_per_product,
            tie_break: self.tie_break,
        }
    }
}
