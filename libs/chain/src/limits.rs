use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The RPC primitives the importer relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RpcMethod {
    EthGetLogs,
    EthCall,
    EthGetBlockByNumber,
    EthBlockNumber,
}

impl RpcMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RpcMethod::EthGetLogs => "eth_getLogs",
            RpcMethod::EthCall => "eth_call",
            RpcMethod::EthGetBlockByNumber => "eth_getBlockByNumber",
            RpcMethod::EthBlockNumber => "eth_blockNumber",
        }
    }
}

/// What a given chain's provider tolerates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcLimitations {
    /// Ceiling on the number of addresses in one `eth_getLogs` filter.
    pub max_get_logs_addresses: usize,
    /// Ceiling on `to - from + 1` for one `eth_getLogs` filter.
    pub max_get_logs_block_span: u64,
    /// Maximum JSON-RPC batch size per method. Missing or `null` means the
    /// provider cannot batch this method and calls go out one by one.
    #[serde(default)]
    pub methods: HashMap<RpcMethod, Option<usize>>,
    #[serde(default)]
    pub min_delay_between_calls_ms: u64,
    #[serde(default)]
    pub is_archive_node: bool,
}

impl Default for RpcLimitations {
    fn default() -> Self {
        Self {
            max_get_logs_addresses: 50,
            max_get_logs_block_span: 2_000,
            methods: HashMap::from([
                (RpcMethod::EthGetLogs, Some(20)),
                (RpcMethod::EthCall, Some(100)),
                (RpcMethod::EthGetBlockByNumber, Some(100)),
                (RpcMethod::EthBlockNumber, None),
            ]),
            min_delay_between_calls_ms: 0,
            is_archive_node: false,
        }
    }
}

impl RpcLimitations {
    /// How many `method` calls may share a single JSON-RPC batch.
    pub fn max_batch_calls(&self, method: RpcMethod) -> usize {
        self.methods.get(&method).copied().flatten().unwrap_or(1).max(1)
    }

    pub fn supports_batching(&self, method: RpcMethod) -> bool {
        self.max_batch_calls(method) > 1
    }

    pub fn min_delay_between_calls(&self) -> Duration {
        Duration::from_millis(self.min_delay_between_calls_ms)
    }
}
