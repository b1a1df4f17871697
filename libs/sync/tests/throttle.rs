#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    use sync::memory::MemoryProbe;
    use sync::throttle::{MemoryThrottle, ThrottleConfig};
    use tokio::sync::mpsc;

    struct FakeMemory(AtomicU64);

    impl MemoryProbe for FakeMemory {
        fn used_bytes(&self) -> Option<u64> {
            Some(self.0.load(Ordering::SeqCst))
        }
    }

    fn config(send_bursts_of: usize) -> ThrottleConfig {
        ThrottleConfig {
            sampling_interval: Duration::from_millis(5),
            sampling_jitter: Duration::from_millis(1),
            max_memory_bytes: 1_000,
            send_bursts_of,
        }
    }

    #[tokio::test]
    async fn test_throttle_forwards_everything_and_closes() {
        let memory = Arc::new(FakeMemory(AtomicU64::new(10)));
        let (in_tx, in_rx) = mpsc::channel(100);
        let (out_tx, mut out_rx) = mpsc::channel(100);

        let handle = MemoryThrottle::new(config(3), memory).spawn(in_rx, out_tx);

        for i in 0..20 {
            in_tx.send(i).await.unwrap();
        }
        // closing the input must not lose the buffered tail
        drop(in_tx);

        let mut received = Vec::new();
        while let Some(item) = out_rx.recv().await {
            received.push(item);
        }
        handle.await.unwrap();

        assert_eq!(received, (0..20).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_throttle_holds_items_above_threshold() {
        let memory = Arc::new(FakeMemory(AtomicU64::new(5_000)));
        let (in_tx, in_rx) = mpsc::channel(100);
        let (out_tx, mut out_rx) = mpsc::channel(100);

        let handle = MemoryThrottle::new(config(2), Arc::clone(&memory) as Arc<dyn MemoryProbe>)
            .spawn(in_rx, out_tx);

        for i in 0..4 {
            in_tx.send(i).await.unwrap();
        }
        drop(in_tx);

        // nothing gets through while memory is high
        let held = tokio::time::timeout(Duration::from_millis(60), out_rx.recv()).await;
        assert!(held.is_err());

        memory.0.store(0, Ordering::SeqCst);

        let mut received = Vec::new();
        while let Some(item) = out_rx.recv().await {
            received.push(item);
        }
        handle.await.unwrap();

        assert_eq!(received, vec![0, 1, 2, 3]);
    }
}
