use std::path::Path;

use alloy::primitives::{Address, B256, keccak256};
use chain::limits::RpcLimitations;
use engine::job::TrackedObject;
use eyre::{Result, WrapErr, eyre};

/// Parses `address@creation_block,...`. The address doubles as object key.
pub fn parse_objects(input: &str) -> Result<Vec<TrackedObject>> {
    input
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            let (address, block) = part
                .split_once('@')
                .ok_or_else(|| eyre!("`{part}` is not of the form address@creation_block"))?;
            let address: Address =
                address.trim().parse().wrap_err_with(|| format!("Invalid address `{address}`"))?;
            let creation_block: u64 =
                block.trim().parse().wrap_err_with(|| format!("Invalid block number `{block}`"))?;
            Ok(TrackedObject { key: address.to_string(), address, creation_block })
        })
        .collect()
}

/// A 32 bytes hex hash is taken as is, anything else is hashed as an event
/// signature.
pub fn parse_topic(event: &str) -> B256 {
    event.trim().parse::<B256>().unwrap_or_else(|_| keccak256(event.trim()))
}

pub fn read_limitations(path: &Path) -> Result<RpcLimitations> {
    let content = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("Cannot read RPC limitations from {}", path.display()))?;
    serde_json::from_str(&content)
        .wrap_err_with(|| format!("Invalid RPC limitations in {}", path.display()))
}
