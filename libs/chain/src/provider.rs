use alloy::primitives::{Address, B256, BlockNumber, Bytes};
use alloy::rpc::types::Log;

use crate::error::RpcFailure;

/// One `eth_getLogs` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFilter {
    pub addresses: Vec<Address>,
    /// Accepted values for topic0.
    pub topics: Vec<B256>,
    pub from_block: BlockNumber,
    pub to_block: BlockNumber,
}

/// The handful of RPC primitives the importer needs from a chain.
///
/// Chain specific quirks (odd block tag encoding, hand rolled JSON-RPC
/// batching) belong in the implementation, not in the callers.
#[async_trait::async_trait]
pub trait ChainProvider: Send + Sync {
    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<Log>, RpcFailure>;

    /// Sends all filters at once. The outer error means the whole batch was
    /// lost; the inner results are per filter, in input order.
    async fn get_logs_batch(
        &self,
        filters: &[LogFilter],
    ) -> Result<Vec<Result<Vec<Log>, RpcFailure>>, RpcFailure> {
        let mut results = Vec::with_capacity(filters.len());
        for filter in filters {
            results.push(self.get_logs(filter).await);
        }
        Ok(results)
    }

    async fn call(
        &self,
        contract: Address,
        data: Bytes,
        block: BlockNumber,
    ) -> Result<Bytes, RpcFailure>;

    /// Timestamp (unix seconds) of the given block.
    async fn get_block_timestamp(&self, block: BlockNumber) -> Result<u64, RpcFailure>;

    async fn get_block_number(&self) -> Result<BlockNumber, RpcFailure>;
}
