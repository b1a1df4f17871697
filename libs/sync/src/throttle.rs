use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::memory::MemoryProbe;

#[derive(Debug, Clone)]
pub struct ThrottleConfig {
    /// How often memory is sampled.
    pub sampling_interval: Duration,
    /// Random extra delay added to each sampling tick.
    pub sampling_jitter: Duration,
    /// Items are held while resident memory is at or above this.
    pub max_memory_bytes: u64,
    /// Items released per tick while memory allows it.
    pub send_bursts_of: usize,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            sampling_interval: Duration::from_millis(100),
            sampling_jitter: Duration::from_millis(20),
            max_memory_bytes: 2 * 1024 * 1024 * 1024,
            send_bursts_of: 10,
        }
    }
}

/// Buffers everything it receives and lets items through in bursts, only
/// while the process stays under its memory threshold.
///
/// The output channel is closed once the input is closed and every buffered
/// item has been forwarded.
pub struct MemoryThrottle {
    config: ThrottleConfig,
    probe: Arc<dyn MemoryProbe>,
}

impl MemoryThrottle {
    pub fn new(config: ThrottleConfig, probe: Arc<dyn MemoryProbe>) -> Self {
        Self { config, probe }
    }

    pub fn spawn<T: Send + 'static>(
        self,
        rx: mpsc::Receiver<T>,
        tx: mpsc::Sender<T>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move { self.run(rx, tx).await })
    }

    pub async fn run<T>(&self, mut rx: mpsc::Receiver<T>, tx: mpsc::Sender<T>) {
        let mut queue: VecDeque<T> = VecDeque::new();
        let mut upstream_done = false;

        let tick = tokio::time::sleep(self.next_tick());
        tokio::pin!(tick);

        loop {
            if upstream_done && queue.is_empty() {
                break;
            }

            tokio::select! {
                maybe_item = rx.recv(), if !upstream_done => {
                    match maybe_item {
                        Some(item) => queue.push_back(item),
                        None => upstream_done = true,
                    }
                }
                _ = &mut tick => {
                    tick.as_mut().reset(Instant::now() + self.next_tick());

                    if queue.is_empty() {
                        continue;
                    }
                    if !self.has_headroom() {
                        tracing::debug!("Memory threshold reached, holding {} items", queue.len());
                        continue;
                    }

                    for _ in 0..self.config.send_bursts_of.max(1) {
                        let Some(item) = queue.pop_front() else { break };
                        if tx.send(item).await.is_err() {
                            // The receiver dropped
                            tracing::warn!("Throttle output closed, dropping {} items", queue.len());
                            return;
                        }
                    }
                }
            }
        }

        tracing::debug!("Throttle drained");
    }

    fn has_headroom(&self) -> bool {
        match self.probe.used_bytes() {
            Some(used) => used < self.config.max_memory_bytes,
            None => true,
        }
    }

    fn next_tick(&self) -> Duration {
        let jitter_ms = self.config.sampling_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
        };
        self.config.sampling_interval + jitter
    }
}
