use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Waits for at least one item, then keeps collecting until `max_take` items
/// are buffered or `max_wait` has elapsed since the first one arrived.
///
/// Returns `None` once the channel is closed and drained.
pub async fn recv_batch<T>(
    rx: &mut mpsc::Receiver<T>,
    max_take: usize,
    max_wait: Duration,
) -> Option<Vec<T>> {
    let max_take = max_take.max(1);
    let first = rx.recv().await?;

    let mut batch = Vec::with_capacity(max_take);
    batch.push(first);

    let deadline = Instant::now() + max_wait;
    while batch.len() < max_take {
        // Grab whatever is already queued without touching the timer
        match rx.try_recv() {
            Ok(item) => {
                batch.push(item);
                continue;
            }
            Err(mpsc::error::TryRecvError::Disconnected) => break,
            Err(mpsc::error::TryRecvError::Empty) => {}
        }

        match tokio::time::timeout_at(deadline, rx.recv()).await {
            Ok(Some(item)) => batch.push(item),
            // closed or deadline reached
            Ok(None) | Err(_) => break,
        }
    }

    Some(batch)
}
