use std::future::Future;
use std::time::Duration;

use chain::error::RpcFailure;
use rand::Rng;

use crate::error::{FailureContext, ImportError};

/// Attempts are capped so a huge retry budget cannot overflow the delays.
const MAX_ATTEMPTS: u32 = 32;

/// Exponential backoff with full jitter, bounded by a total time budget.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub factor: f64,
    /// Sum of worst case delays between attempts may not exceed this.
    pub max_total: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(200),
            factor: 2.0,
            max_total: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_total(mut self, max_total: Duration) -> Self {
        self.max_total = max_total;
        self
    }

    /// Upper bound of the pause after the `attempt`-th failure (1-based).
    pub fn delay_ceiling(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(MAX_ATTEMPTS) as i32;
        let secs = self.base_delay.as_secs_f64() * self.factor.max(1.0).powi(exponent);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }

    /// Total attempts, first one included, whose worst case pauses fit in
    /// `max_total`. Always at least one.
    pub fn max_attempts(&self) -> u32 {
        let mut attempts = 1;
        let mut total = Duration::ZERO;
        while attempts < MAX_ATTEMPTS {
            total = total.saturating_add(self.delay_ceiling(attempts));
            if total > self.max_total {
                break;
            }
            attempts += 1;
        }
        attempts
    }

    /// Uniformly random pause in `[0, delay_ceiling(attempt)]`.
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let ceiling_ms = self.delay_ceiling(attempt).as_millis().min(u64::MAX as u128) as u64;
        if ceiling_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=ceiling_ms))
    }
}

/// Runs `op` until it succeeds, fails with a non retryable error, or the
/// policy's attempts run out.
pub async fn retry<T, F, Fut>(
    policy: &RetryPolicy,
    context: &FailureContext,
    mut op: F,
) -> Result<T, ImportError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RpcFailure>>,
{
    let max_attempts = policy.max_attempts();
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!("{context}: succeeded after {attempt} attempts");
                }
                return Ok(value);
            }
            Err(failure) if !failure.is_retryable() || attempt >= max_attempts => {
                let error = ImportError::from_rpc(context.clone(), attempt, failure);
                tracing::error!("{error}");
                return Err(error);
            }
            Err(failure) => {
                let delay = policy.jittered_delay(attempt);
                tracing::warn!(
                    "{context}: attempt {attempt}/{max_attempts} failed: {failure}, retrying in {delay:?}"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
