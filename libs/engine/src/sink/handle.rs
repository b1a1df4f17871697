use alloy::primitives::{Address, BlockNumber};
use alloy::rpc::types::Log;
use eyre::Result;

use crate::range::Range;

/// Logs fetched for one object, already cut down to the ranges it asked for.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectLogs {
    pub key: String,
    pub address: Address,
    /// Ranges these logs fully cover, empty ones included.
    pub ranges: Vec<Range<BlockNumber>>,
    pub logs: Vec<Log>,
}

/// Decodes and persists fetched logs.
#[async_trait::async_trait]
pub trait LogSink: Send + Sync {
    /// One result per input entry, in input order. A failed entry is
    /// imported again on the next pass, the others are marked covered.
    async fn process_batch(&self, batch: &[ObjectLogs]) -> Vec<Result<()>>;
}
