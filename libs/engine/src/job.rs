use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use alloy::primitives::{Address, B256, BlockNumber};
use alloy::rpc::types::Log;
use chain::limits::{RpcLimitations, RpcMethod};
use chain::provider::{ChainProvider, LogFilter};
use eyre::{Result, eyre};
use sync::consumer::Consumer;
use sync::memory::MemoryProbe;
use sync::throttle::MemoryThrottle;
use tokio::sync::{Mutex, broadcast, mpsc};

use crate::args::Args;
use crate::checkpointer::Checkpointer;
use crate::error::{FailureContext, ImportError};
use crate::executor::{BatchExecutor, BatchQuery, CallBudget, QueryFailure, WorkResult};
use crate::optimizer::plan::optimize;
use crate::optimizer::types::{OptimizerInput, OptimizerOutput};
use crate::range::{Range, ranges_intersect};
use crate::retry::retry;
use crate::sink::handle::{LogSink, ObjectLogs};
use crate::state::chain::ChainState;
use crate::state::import::{ImportState, RangeOutcome};

/// A contract whose logs are imported, from its creation block onwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackedObject {
    pub key: String,
    pub address: Address,
    pub creation_block: BlockNumber,
}

/// One object served by a [`LogQuery`], with the ranges it actually wants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTarget {
    pub key: String,
    pub address: Address,
    pub served: Vec<Range<BlockNumber>>,
}

/// One `eth_getLogs` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogQuery {
    pub id: usize,
    pub range: Range<BlockNumber>,
    pub targets: Vec<QueryTarget>,
}

impl LogQuery {
    pub fn filter(&self, topics: &[B256]) -> LogFilter {
        let mut addresses: Vec<Address> = self.targets.iter().map(|t| t.address).collect();
        addresses.sort();
        addresses.dedup();
        LogFilter {
            addresses,
            topics: topics.to_vec(),
            from_block: self.range.from,
            to_block: self.range.to,
        }
    }

    /// Hands every target the logs of its own address within its own ranges.
    /// Logs fetched only because a neighbour needed a wider range are dropped.
    pub fn split(&self, logs: &[Log]) -> Vec<ObjectLogs> {
        self.targets
            .iter()
            .map(|target| ObjectLogs {
                key: target.key.clone(),
                address: target.address,
                ranges: target.served.clone(),
                logs: logs
                    .iter()
                    .filter(|log| log.address() == target.address)
                    .filter(|log| {
                        log.block_number
                            .is_some_and(|block| target.served.iter().any(|r| r.contains(block)))
                    })
                    .cloned()
                    .collect(),
            })
            .collect()
    }
}

impl BatchQuery for LogQuery {
    type Key = usize;

    fn key(&self) -> usize {
        self.id
    }

    fn context(&self, chain: &str) -> FailureContext {
        let keys: Vec<&str> = self.targets.iter().map(|t| t.key.as_str()).collect();
        FailureContext::new(chain).object(keys.join(",")).range(self.range)
    }
}

/// Flattens optimizer outputs into queries, keeping their order.
pub fn plan_queries(
    outputs: Vec<OptimizerOutput<String, BlockNumber>>,
    addresses: &HashMap<String, Address>,
) -> Result<Vec<LogQuery>> {
    let address_of = |key: &String| {
        addresses
            .get(key)
            .copied()
            .ok_or_else(|| ImportError::Invariant(format!("planned unknown object {key}")))
    };

    let mut queries = Vec::new();
    for output in outputs {
        match output {
            OptimizerOutput::JsonRpcBatch { queries: batch } => {
                for query in batch {
                    queries.push(LogQuery {
                        id: queries.len(),
                        range: query.range,
                        targets: vec![QueryTarget {
                            address: address_of(&query.key)?,
                            key: query.key,
                            served: vec![query.range],
                        }],
                    });
                }
            }
            OptimizerOutput::AddressBatch { queries: batch } => {
                for query in batch {
                    let mut targets = Vec::with_capacity(query.post_filters.len());
                    for post_filter in &query.post_filters {
                        targets.push(QueryTarget {
                            key: post_filter.key.clone(),
                            address: address_of(&post_filter.key)?,
                            served: post_filter.filter.served(&query.range),
                        });
                    }
                    queries.push(LogQuery { id: queries.len(), range: query.range, targets });
                }
            }
        }
    }
    Ok(queries)
}

/// Sends one JSON-RPC batch of `eth_getLogs`, one filter per query.
pub async fn fetch_logs(
    provider: &dyn ChainProvider,
    topics: &[B256],
    batch: Vec<LogQuery>,
) -> WorkResult<usize, Vec<Log>> {
    let filters: Vec<LogFilter> = batch.iter().map(|query| query.filter(topics)).collect();
    let results = provider.get_logs_batch(&filters).await?;
    Ok(batch.iter().map(|query| query.id).zip(results).collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    /// Everything between each object's creation and the head.
    Historical,
    /// Only blocks after the chain's recent import cursor.
    Recent,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub head: BlockNumber,
    pub queries: usize,
    /// Object ranges imported.
    pub succeeded: usize,
    /// Object ranges left for a later retry.
    pub failed: usize,
    pub archive_node_required: usize,
    /// Object ranges parked until the chain has an archive node.
    pub awaiting_archive_node: usize,
    /// Objects left out of the pass because their saved state is unusable.
    pub skipped: usize,
    pub logs: usize,
}

struct Progress {
    states: HashMap<String, ImportState<BlockNumber>>,
    report: ImportReport,
}

/// Imports the logs of a set of objects on one chain, one pass at a time.
pub struct ImportJob {
    args: Args,
    chain_state: Arc<ChainState>,
    provider: Arc<dyn ChainProvider>,
    checkpointer: Checkpointer,
    sink: Arc<dyn LogSink>,
    memory: Arc<dyn MemoryProbe>,
}

impl ImportJob {
    pub fn new(
        args: Args,
        chain_state: Arc<ChainState>,
        provider: Arc<dyn ChainProvider>,
        checkpointer: Checkpointer,
        sink: Arc<dyn LogSink>,
        memory: Arc<dyn MemoryProbe>,
    ) -> Self {
        Self { args, chain_state, provider, checkpointer, sink, memory }
    }

    pub async fn run(&self, objects: &[TrackedObject], mode: ImportMode) -> Result<ImportReport> {
        let chain = self.chain_state.chain().to_string();
        let guard = self
            .chain_state
            .try_begin_pass()
            .ok_or_else(|| eyre!("An import pass is already running on {chain}"))?;

        let mut seen = HashSet::with_capacity(objects.len());
        if let Some(duplicate) = objects.iter().find(|object| !seen.insert(&object.key)) {
            return Err(ImportError::InvalidInput(format!("duplicate object {}", duplicate.key)).into());
        }

        let head = retry(&self.args.retry, &FailureContext::new(&chain), || {
            self.provider.get_block_number()
        })
        .await?;
        let limitations = self.chain_state.limitations().await;
        tracing::info!("Import pass ({mode:?}) started on {chain} at head {head}");

        let mut skipped = 0;
        let mut awaiting_archive_node = 0;
        let mut states = HashMap::with_capacity(objects.len());
        for object in objects {
            if object.creation_block > head {
                tracing::warn!("Skip: {} created after head {head}", object.key);
                continue;
            }
            let full_range = Range::new(object.creation_block, head)?;
            let mut state = match self.checkpointer.load_or_create(&object.key, full_range).await {
                Ok(state) => state,
                Err(e) => {
                    tracing::error!(
                        "Skip: {} on {chain}, cannot load its import state: {e:?}",
                        object.key
                    );
                    skipped += 1;
                    continue;
                }
            };
            state.extend_to(head);
            if !limitations.is_archive_node && !state.archive_retry.is_empty() {
                tracing::warn!(
                    "{}: {} ranges wait for an archive node on {chain}",
                    object.key,
                    state.archive_retry.len()
                );
                awaiting_archive_node += state.archive_retry.len();
            }
            states.insert(object.key.clone(), state);
        }

        let mut ordered: Vec<(&String, &ImportState<BlockNumber>)> = states.iter().collect();
        ordered.sort_by(|a, b| a.1.last_import_date.cmp(&b.1.last_import_date).then(a.0.cmp(b.0)));

        let inputs: Vec<OptimizerInput<String, BlockNumber>> = match mode {
            ImportMode::Historical => {
                let mut inputs = Vec::with_capacity(ordered.len());
                for (key, state) in ordered {
                    let state = state.for_planning(limitations.is_archive_node)?;
                    inputs.push(OptimizerInput { key: key.clone(), state });
                }
                inputs
            }
            ImportMode::Recent => {
                let from = match self.chain_state.recent_import().await {
                    Some(cursor) => cursor.saturating_add(1),
                    None => head.saturating_sub(limitations.max_get_logs_block_span.saturating_sub(1)),
                };
                if from > head {
                    tracing::info!("Nothing new on {chain} since block {head}");
                    return Ok(ImportReport {
                        head,
                        skipped,
                        awaiting_archive_node,
                        ..Default::default()
                    });
                }
                let mut inputs = Vec::with_capacity(ordered.len());
                for (key, state) in ordered {
                    if let Some(window) = recent_window(state, from, head)? {
                        inputs.push(OptimizerInput { key: key.clone(), state: window });
                    }
                }
                inputs
            }
        };

        let options = self.args.optimizer_options(&limitations);
        let addresses: HashMap<String, Address> =
            objects.iter().map(|object| (object.key.clone(), object.address)).collect();
        let queries = plan_queries(optimize(&inputs, &options), &addresses)?;
        tracing::info!("Planned {} queries for {} objects on {chain}", queries.len(), inputs.len());

        let progress = Arc::new(Mutex::new(Progress {
            states,
            report: ImportReport {
                head,
                queries: queries.len(),
                awaiting_archive_node,
                skipped,
                ..Default::default()
            },
        }));

        self.execute(queries, &limitations, Arc::clone(&progress)).await?;

        let report = progress.lock().await.report.clone();
        if mode == ImportMode::Recent && report.failed == 0 {
            guard.complete(head).await;
        }

        tracing::info!("Import pass finished on {chain}: {report:?}");
        Ok(report)
    }

    /// Queries → throttle → executor → sink, until every query has an outcome.
    async fn execute(
        &self,
        queries: Vec<LogQuery>,
        limitations: &RpcLimitations,
        progress: Arc<Mutex<Progress>>,
    ) -> Result<()> {
        let chain = self.chain_state.chain().to_string();
        let channel_size = self.args.batch.max_input_take.max(1) * 2;

        let (query_tx, query_rx) = mpsc::channel::<LogQuery>(channel_size);
        let (throttled_tx, throttled_rx) = mpsc::channel::<LogQuery>(channel_size);
        let (success_tx, success_rx) = mpsc::channel::<(LogQuery, Vec<Log>)>(channel_size);
        let (error_tx, error_rx) = mpsc::channel::<QueryFailure<LogQuery>>(channel_size);
        let (shutdown_tx, _) = broadcast::channel::<()>(1);

        let success_handle = {
            let chain = chain.clone();
            let progress = Arc::clone(&progress);
            let checkpointer = self.checkpointer.clone();
            let sink = Arc::clone(&self.sink);
            Consumer::spawn(success_rx, shutdown_tx.clone(), move |(query, logs)| {
                let chain = chain.clone();
                let progress = Arc::clone(&progress);
                let checkpointer = checkpointer.clone();
                let sink = Arc::clone(&sink);
                async move {
                    on_success(&chain, &progress, &checkpointer, sink.as_ref(), query, logs).await
                }
            })
        };

        let error_handle = {
            let chain = chain.clone();
            let progress = Arc::clone(&progress);
            let checkpointer = self.checkpointer.clone();
            Consumer::spawn(error_rx, shutdown_tx.clone(), move |failure| {
                let chain = chain.clone();
                let progress = Arc::clone(&progress);
                let checkpointer = checkpointer.clone();
                async move { on_failure(&chain, &progress, &checkpointer, failure).await }
            })
        };

        let throttle_handle = MemoryThrottle::new(self.args.throttle.clone(), Arc::clone(&self.memory))
            .spawn(query_rx, throttled_tx);

        let feeder_handle = tokio::spawn(async move {
            for query in queries {
                if query_tx.send(query).await.is_err() {
                    break;
                }
            }
        });

        let executor = BatchExecutor::new(
            &chain,
            self.args.batch.clone(),
            CallBudget::new(RpcMethod::EthGetLogs, 1),
            limitations,
            self.args.retry.clone(),
        );
        let provider = Arc::clone(&self.provider);
        let topics = self.args.topics.clone();
        let executed = executor
            .run(throttled_rx, success_tx, error_tx, move |batch| {
                let provider = Arc::clone(&provider);
                let topics = topics.clone();
                async move { fetch_logs(provider.as_ref(), &topics, batch).await }
            })
            .await;

        feeder_handle.await?;
        throttle_handle.await?;
        let consumed = [success_handle.await?, error_handle.await?];

        executed?;
        for result in consumed {
            result?;
        }
        Ok(())
    }
}

/// The part of `state` that a recent pass over `[from, head]` needs to look
/// at. Retries are left to historical passes.
fn recent_window(
    state: &ImportState<BlockNumber>,
    from: BlockNumber,
    head: BlockNumber,
) -> Result<Option<ImportState<BlockNumber>>> {
    let from = from.max(state.full_range.from);
    if from > head {
        return Ok(None);
    }
    let window = Range::new(from, head)?;
    Ok(Some(ImportState {
        full_range: window,
        covered_ranges: ranges_intersect(&state.covered_ranges, &[window])?,
        to_retry: vec![],
        archive_retry: vec![],
        last_import_date: state.last_import_date,
    }))
}

async fn on_success(
    chain: &str,
    progress: &Mutex<Progress>,
    checkpointer: &Checkpointer,
    sink: &dyn LogSink,
    query: LogQuery,
    logs: Vec<Log>,
) -> Result<()> {
    let entries = query.split(&logs);
    let results = sink.process_batch(&entries).await;
    if results.len() != entries.len() {
        return Err(ImportError::Invariant(format!(
            "sink answered {} of {} entries",
            results.len(),
            entries.len()
        ))
        .into());
    }

    let mut progress = progress.lock().await;
    for (entry, result) in entries.iter().zip(results) {
        let outcome = match result {
            Ok(()) => {
                progress.report.succeeded += 1;
                progress.report.logs += entry.logs.len();
                RangeOutcome::Imported
            }
            Err(e) => {
                let context = FailureContext::new(chain).object(&entry.key).range(query.range);
                tracing::error!("{}", ImportError::Sink { context, message: e.to_string() });
                progress.report.failed += 1;
                RangeOutcome::Failed
            }
        };
        record(&mut progress.states, checkpointer, &entry.key, &entry.ranges, outcome).await?;
    }
    Ok(())
}

async fn on_failure(
    chain: &str,
    progress: &Mutex<Progress>,
    checkpointer: &Checkpointer,
    failure: QueryFailure<LogQuery>,
) -> Result<()> {
    let outcome = if failure.error.is_archive_node_required() {
        tracing::warn!("{chain}: needs an archive node, parked: {}", failure.error);
        RangeOutcome::NeedsArchiveNode
    } else {
        tracing::error!("{chain}: query failed, queued for retry: {}", failure.error);
        RangeOutcome::Failed
    };

    let mut progress = progress.lock().await;
    for target in &failure.query.targets {
        progress.report.failed += 1;
        if outcome == RangeOutcome::NeedsArchiveNode {
            progress.report.archive_node_required += 1;
        }
        record(&mut progress.states, checkpointer, &target.key, &target.served, outcome).await?;
    }
    Ok(())
}

async fn record(
    states: &mut HashMap<String, ImportState<BlockNumber>>,
    checkpointer: &Checkpointer,
    key: &str,
    ranges: &[Range<BlockNumber>],
    outcome: RangeOutcome,
) -> Result<()> {
    let state = states
        .get_mut(key)
        .ok_or_else(|| ImportError::Invariant(format!("no import state for {key}")))?;
    for range in ranges {
        state.record(*range, outcome)?;
    }
    checkpointer.save(key, state).await
}
