use alloy::eips::{BlockId, BlockNumberOrTag};
use alloy::primitives::{Address, BlockNumber, Bytes};
use alloy::providers::{Provider, RootProvider};
use alloy::rpc::client::{BatchRequest, RpcClient};
use alloy::rpc::types::{Filter, Log, TransactionRequest};
use alloy::transports::http::reqwest::Url;
use futures_util::future::join_all;

use crate::error::RpcFailure;
use crate::provider::{ChainProvider, LogFilter};

#[derive(Clone)]
pub struct NodeClient {
    provider: RootProvider,
}

impl NodeClient {
    pub fn new(rpc_url: Url) -> Self {
        let rpc_client = RpcClient::new_http(rpc_url);
        Self { provider: RootProvider::new(rpc_client) }
    }

    pub fn borrow_provider(&self) -> &RootProvider {
        &self.provider
    }
}

fn to_filter(filter: &LogFilter) -> Filter {
    Filter::new()
        .address(filter.addresses.clone())
        .event_signature(filter.topics.clone())
        .from_block(filter.from_block)
        .to_block(filter.to_block)
}

#[async_trait::async_trait]
impl ChainProvider for NodeClient {
    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<Log>, RpcFailure> {
        Ok(self.provider.get_logs(&to_filter(filter)).await?)
    }

    // alloy's provider API has no batched getLogs, so the batch is assembled
    // by hand on the underlying client.
    async fn get_logs_batch(
        &self,
        filters: &[LogFilter],
    ) -> Result<Vec<Result<Vec<Log>, RpcFailure>>, RpcFailure> {
        if filters.len() == 1 {
            return Ok(vec![self.get_logs(&filters[0]).await]);
        }

        let mut batch = BatchRequest::new(self.provider.client());
        let mut waiters = Vec::with_capacity(filters.len());
        for filter in filters {
            waiters.push(batch.add_call::<_, Vec<Log>>("eth_getLogs", &(to_filter(filter),))?);
        }
        tracing::debug!("Sending eth_getLogs batch of {} filters", filters.len());
        batch.send().await?;

        Ok(join_all(waiters).await.into_iter().map(|result| result.map_err(RpcFailure::from)).collect())
    }

    async fn call(
        &self,
        contract: Address,
        data: Bytes,
        block: BlockNumber,
    ) -> Result<Bytes, RpcFailure> {
        let tx = TransactionRequest::default().to(contract).input(data.into());
        Ok(self.provider.call(tx).block(BlockId::number(block)).await?)
    }

    async fn get_block_timestamp(&self, block: BlockNumber) -> Result<u64, RpcFailure> {
        let block_data = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Number(block))
            .await?
            // the node may simply not have caught up yet
            .ok_or_else(|| RpcFailure::Transport(format!("block {block} not found")))?;
        Ok(block_data.header.timestamp)
    }

    async fn get_block_number(&self) -> Result<BlockNumber, RpcFailure> {
        Ok(self.provider.get_block_number().await?)
    }
}
