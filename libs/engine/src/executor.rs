use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use chain::error::RpcFailure;
use chain::limits::{RpcLimitations, RpcMethod};
use sync::buffer::recv_batch;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tokio::time::Instant;

use crate::error::{FailureContext, ImportError};
use crate::retry::RetryPolicy;

/// How much work is buffered before a provider call goes out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchStreamConfig {
    /// Provider calls in flight at once.
    pub work_concurrency: usize,
    /// Longest wait for a batch to fill up once its first item arrived.
    pub max_input_wait: Duration,
    pub max_input_take: usize,
    /// Retry budget of one batch, all attempts included.
    pub max_total_retry: Duration,
}

impl Default for BatchStreamConfig {
    fn default() -> Self {
        Self {
            work_concurrency: 4,
            max_input_wait: Duration::from_secs(1),
            max_input_take: 100,
            max_total_retry: Duration::from_secs(30),
        }
    }
}

/// RPC primitive invocations one logical query costs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallBudget {
    pub method: RpcMethod,
    pub calls_per_query: usize,
}

impl CallBudget {
    pub fn new(method: RpcMethod, calls_per_query: usize) -> Self {
        Self { method, calls_per_query }
    }

    /// Queries per provider call, so the JSON-RPC batch stays within what the
    /// provider accepts for `method`.
    pub fn batch_size(&self, config: &BatchStreamConfig, limitations: &RpcLimitations) -> usize {
        let by_provider = limitations.max_batch_calls(self.method) / self.calls_per_query.max(1);
        by_provider.min(config.max_input_take).max(1)
    }
}

/// A unit of work the executor can dispatch and match back to its result.
pub trait BatchQuery: Clone + Send + Sync + 'static {
    type Key: Clone + Eq + Hash + Debug + Send + Sync + 'static;

    /// Unique within one execution.
    fn key(&self) -> Self::Key;

    fn context(&self, chain: &str) -> FailureContext;
}

/// Results of one provider call, keyed by query. The outer error means
/// the call as a whole failed.
pub type WorkResult<K, R> = Result<Vec<(K, Result<R, RpcFailure>)>, RpcFailure>;

#[derive(Debug, Clone)]
pub struct QueryFailure<Q> {
    pub query: Q,
    pub error: ImportError,
}

#[derive(Debug)]
pub struct BatchOutcome<Q, R> {
    pub successes: Vec<(Q, R)>,
    pub errors: Vec<QueryFailure<Q>>,
}

impl<Q, R> Default for BatchOutcome<Q, R> {
    fn default() -> Self {
        Self { successes: vec![], errors: vec![] }
    }
}

/// Groups incoming queries into provider sized batches, runs them with a
/// bounded concurrency and routes every query to either the success or the
/// error channel.
///
/// One query failing never fails its siblings. Only an invariant violation
/// (a result for a query that was never sent, or two results for the same
/// query) stops the executor.
#[derive(Debug, Clone)]
pub struct BatchExecutor {
    chain: String,
    config: BatchStreamConfig,
    batch_size: usize,
    min_delay: Duration,
    policy: RetryPolicy,
}

impl BatchExecutor {
    pub fn new(
        chain: impl Into<String>,
        config: BatchStreamConfig,
        budget: CallBudget,
        limitations: &RpcLimitations,
        policy: RetryPolicy,
    ) -> Self {
        let batch_size = budget.batch_size(&config, limitations);
        let policy = policy.with_max_total(config.max_total_retry);
        Self {
            chain: chain.into(),
            config,
            batch_size,
            min_delay: limitations.min_delay_between_calls(),
            policy,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub async fn run<Q, R, F, Fut>(
        &self,
        mut rx: mpsc::Receiver<Q>,
        success_tx: mpsc::Sender<(Q, R)>,
        error_tx: mpsc::Sender<QueryFailure<Q>>,
        work: F,
    ) -> Result<(), ImportError>
    where
        Q: BatchQuery,
        R: Send + 'static,
        F: Fn(Vec<Q>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = WorkResult<Q::Key, R>> + Send + 'static,
    {
        let work = Arc::new(work);
        let mut in_flight: JoinSet<Result<BatchOutcome<Q, R>, ImportError>> = JoinSet::new();
        let mut last_dispatch: Option<Instant> = None;
        let concurrency = self.config.work_concurrency.max(1);

        while let Some(batch) = recv_batch(&mut rx, self.batch_size, self.config.max_input_wait).await
        {
            while in_flight.len() >= concurrency {
                let Some(joined) = in_flight.join_next().await else { break };
                if !forward(joined, &success_tx, &error_tx).await? {
                    tracing::warn!("{}: downstream closed, stopping executor", self.chain);
                    return Ok(());
                }
            }

            if let Some(last) = last_dispatch {
                tokio::time::sleep_until(last + self.min_delay).await;
            }
            last_dispatch = Some(Instant::now());

            tracing::debug!("{}: dispatching {} queries", self.chain, batch.len());
            let work = Arc::clone(&work);
            let chain = self.chain.clone();
            let policy = self.policy.clone();
            in_flight.spawn(async move { execute_batch(&chain, &policy, batch, work.as_ref()).await });
        }

        while let Some(joined) = in_flight.join_next().await {
            if !forward(joined, &success_tx, &error_tx).await? {
                tracing::warn!("{}: downstream closed, stopping executor", self.chain);
                return Ok(());
            }
        }

        Ok(())
    }

    /// Runs a fixed list of queries to completion.
    pub async fn execute<Q, R, F, Fut>(
        &self,
        queries: Vec<Q>,
        work: F,
    ) -> Result<BatchOutcome<Q, R>, ImportError>
    where
        Q: BatchQuery,
        R: Send + 'static,
        F: Fn(Vec<Q>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = WorkResult<Q::Key, R>> + Send + 'static,
    {
        // every query ends up in exactly one of the two outputs
        let capacity = queries.len().max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let (success_tx, mut success_rx) = mpsc::channel(capacity);
        let (error_tx, mut error_rx) = mpsc::channel(capacity);

        for query in queries {
            if tx.send(query).await.is_err() {
                return Err(ImportError::Invariant("executor input closed early".to_string()));
            }
        }
        drop(tx);

        self.run(rx, success_tx, error_tx, work).await?;

        let mut outcome = BatchOutcome::default();
        while let Some(success) = success_rx.recv().await {
            outcome.successes.push(success);
        }
        while let Some(failure) = error_rx.recv().await {
            outcome.errors.push(failure);
        }
        Ok(outcome)
    }
}

/// Sends a finished batch downstream. `Ok(false)` once a receiver is gone.
async fn forward<Q, R>(
    joined: Result<Result<BatchOutcome<Q, R>, ImportError>, JoinError>,
    success_tx: &mpsc::Sender<(Q, R)>,
    error_tx: &mpsc::Sender<QueryFailure<Q>>,
) -> Result<bool, ImportError> {
    let outcome = joined.map_err(|e| ImportError::Invariant(format!("batch task failed: {e}")))??;

    for success in outcome.successes {
        if success_tx.send(success).await.is_err() {
            return Ok(false);
        }
    }
    for failure in outcome.errors {
        if error_tx.send(failure).await.is_err() {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Runs one batch, retrying the retryable failures only, until every query
/// has either succeeded or failed for good.
pub async fn execute_batch<Q, R, F, Fut>(
    chain: &str,
    policy: &RetryPolicy,
    batch: Vec<Q>,
    work: &F,
) -> Result<BatchOutcome<Q, R>, ImportError>
where
    Q: BatchQuery,
    F: Fn(Vec<Q>) -> Fut,
    Fut: Future<Output = WorkResult<Q::Key, R>>,
{
    let max_attempts = policy.max_attempts();
    let mut outcome = BatchOutcome::default();
    let mut pending = batch;
    let mut attempt = 1;

    while !pending.is_empty() {
        let mut retryable: Vec<Q> = Vec::new();
        let mut route = |query: Q, failure: RpcFailure, outcome: &mut BatchOutcome<Q, R>| {
            if failure.is_retryable() && attempt < max_attempts {
                retryable.push(query);
            } else {
                let error = ImportError::from_rpc(query.context(chain), attempt, failure);
                outcome.errors.push(QueryFailure { query, error });
            }
        };

        match work(pending.clone()).await {
            Err(failure) => {
                tracing::warn!("{chain}: batch of {} failed: {failure}", pending.len());
                for query in pending.drain(..) {
                    route(query, failure.clone(), &mut outcome);
                }
            }
            Ok(results) => {
                let mut by_key = demux(chain, &pending, results)?;
                for query in pending.drain(..) {
                    match by_key.remove(&query.key()) {
                        Some(Ok(result)) => outcome.successes.push((query, result)),
                        Some(Err(failure)) => route(query, failure, &mut outcome),
                        None => {
                            let error = ImportError::MissingResult { context: query.context(chain) };
                            tracing::error!("{error}");
                            outcome.errors.push(QueryFailure { query, error });
                        }
                    }
                }
            }
        }

        if retryable.is_empty() {
            break;
        }

        let delay = policy.jittered_delay(attempt);
        tracing::warn!(
            "{chain}: attempt {attempt}/{max_attempts} left {} queries to retry, retrying in {delay:?}",
            retryable.len()
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
        pending = retryable;
    }

    Ok(outcome)
}

/// Indexes results by key, rejecting keys that were not asked for or
/// answered twice.
fn demux<Q: BatchQuery, R>(
    chain: &str,
    sent: &[Q],
    results: Vec<(Q::Key, Result<R, RpcFailure>)>,
) -> Result<HashMap<Q::Key, Result<R, RpcFailure>>, ImportError> {
    let mut by_key = HashMap::with_capacity(results.len());
    for (key, result) in results {
        if !sent.iter().any(|query| query.key() == key) {
            return Err(ImportError::Invariant(format!(
                "{chain}: provider returned a result for unknown query {key:?}"
            )));
        }
        if by_key.insert(key.clone(), result).is_some() {
            return Err(ImportError::Invariant(format!(
                "{chain}: provider returned query {key:?} twice"
            )));
        }
    }
    Ok(by_key)
}
