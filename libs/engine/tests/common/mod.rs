#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use alloy::primitives::{Address, B256, BlockNumber, Bytes, LogData, keccak256};
use alloy::rpc::types::Log;
use chain::error::RpcFailure;
use chain::provider::{ChainProvider, LogFilter};
use engine::range::Range;
use engine::state::import::ImportState;
use sync::memory::MemoryProbe;

pub fn transfer_topic() -> B256 {
    keccak256("Transfer(address,address,uint256)")
}

pub fn range(from: u64, to: u64) -> Range<u64> {
    Range { from, to }
}

pub fn state(full: (u64, u64), covered: &[(u64, u64)], to_retry: &[(u64, u64)]) -> ImportState<u64> {
    ImportState {
        full_range: range(full.0, full.1),
        covered_ranges: covered.iter().map(|&(from, to)| range(from, to)).collect(),
        to_retry: to_retry.iter().map(|&(from, to)| range(from, to)).collect(),
        archive_retry: vec![],
        last_import_date: None,
    }
}

pub fn log_at(address: Address, block: BlockNumber) -> Log {
    Log {
        inner: alloy::primitives::Log {
            address,
            data: LogData::new_unchecked(vec![transfer_topic()], Bytes::new()),
        },
        block_number: Some(block),
        ..Default::default()
    }
}

struct ScriptedFailure {
    failure: RpcFailure,
    remaining: usize,
}

/// In memory chain. `eth_getLogs` filters are answered from `logs`, unless a
/// failure was scripted for the exact block range of the filter.
pub struct MockProvider {
    pub head: BlockNumber,
    pub logs: Vec<Log>,
    failures: Mutex<HashMap<(BlockNumber, BlockNumber), ScriptedFailure>>,
    filters: Mutex<Vec<LogFilter>>,
    batches: AtomicUsize,
    latency: Duration,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    dispatched_at: Mutex<Vec<Instant>>,
}

impl MockProvider {
    pub fn new(head: BlockNumber, logs: Vec<Log>) -> Self {
        Self {
            head,
            logs,
            failures: Mutex::new(HashMap::new()),
            filters: Mutex::new(vec![]),
            batches: AtomicUsize::new(0),
            latency: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            dispatched_at: Mutex::new(vec![]),
        }
    }

    /// Every batch takes `latency` to answer.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Fails the next `times` filters over exactly `[from, to]`.
    pub fn fail(&self, from: BlockNumber, to: BlockNumber, failure: RpcFailure, times: usize) {
        self.failures
            .lock()
            .unwrap()
            .insert((from, to), ScriptedFailure { failure, remaining: times });
    }

    pub fn filters(&self) -> Vec<LogFilter> {
        self.filters.lock().unwrap().clone()
    }

    pub fn batches(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }

    /// Most batches ever answered at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn dispatched_at(&self) -> Vec<Instant> {
        self.dispatched_at.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ChainProvider for MockProvider {
    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<Log>, RpcFailure> {
        self.filters.lock().unwrap().push(filter.clone());

        if let Some(scripted) =
            self.failures.lock().unwrap().get_mut(&(filter.from_block, filter.to_block))
        {
            if scripted.remaining > 0 {
                scripted.remaining -= 1;
                return Err(scripted.failure.clone());
            }
        }

        Ok(self
            .logs
            .iter()
            .filter(|log| filter.addresses.contains(&log.address()))
            .filter(|log| {
                log.block_number
                    .is_some_and(|block| filter.from_block <= block && block <= filter.to_block)
            })
            .filter(|log| log.topics().first().is_some_and(|topic| filter.topics.contains(topic)))
            .cloned()
            .collect())
    }

    async fn get_logs_batch(
        &self,
        filters: &[LogFilter],
    ) -> Result<Vec<Result<Vec<Log>, RpcFailure>>, RpcFailure> {
        self.batches.fetch_add(1, Ordering::SeqCst);
        self.dispatched_at.lock().unwrap().push(Instant::now());
        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(in_flight, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let mut results = Vec::with_capacity(filters.len());
        for filter in filters {
            results.push(self.get_logs(filter).await);
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(results)
    }

    async fn call(
        &self,
        _contract: Address,
        _data: Bytes,
        _block: BlockNumber,
    ) -> Result<Bytes, RpcFailure> {
        Ok(Bytes::new())
    }

    async fn get_block_timestamp(&self, block: BlockNumber) -> Result<u64, RpcFailure> {
        Ok(1_600_000_000 + block * 12)
    }

    async fn get_block_number(&self) -> Result<BlockNumber, RpcFailure> {
        Ok(self.head)
    }
}

/// Reports a constant memory usage.
pub struct FixedMemory(pub Option<u64>);

impl MemoryProbe for FixedMemory {
    fn used_bytes(&self) -> Option<u64> {
        self.0
    }
}
