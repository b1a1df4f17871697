use eyre::Result;

use crate::sink::handle::{LogSink, ObjectLogs};

/// Reports what was fetched without storing it.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

#[async_trait::async_trait]
impl LogSink for TracingSink {
    async fn process_batch(&self, batch: &[ObjectLogs]) -> Vec<Result<()>> {
        batch
            .iter()
            .map(|entry| {
                let ranges =
                    entry.ranges.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
                tracing::info!(
                    "Processed {} logs for {} ({}) over {ranges}",
                    entry.logs.len(),
                    entry.key,
                    entry.address
                );
                Ok(())
            })
            .collect()
    }
}
