#[cfg(test)]
mod tests {
    use std::time::Duration;
    use sync::buffer::recv_batch;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_batch_flushes_on_count() {
        let (tx, mut rx) = mpsc::channel(100);
        for i in 0..7 {
            tx.send(i).await.unwrap();
        }

        let first = recv_batch(&mut rx, 3, Duration::from_secs(60)).await;
        assert_eq!(first, Some(vec![0, 1, 2]));
        let second = recv_batch(&mut rx, 3, Duration::from_secs(60)).await;
        assert_eq!(second, Some(vec![3, 4, 5]));
    }

    #[tokio::test]
    async fn test_batch_flushes_on_timeout() {
        let (tx, mut rx) = mpsc::channel(100);
        tx.send("a").await.unwrap();

        // keep the sender alive so only the timer can end the batch
        let batch = recv_batch(&mut rx, 10, Duration::from_millis(50)).await;
        assert_eq!(batch, Some(vec!["a"]));
        drop(tx);
    }

    #[tokio::test]
    async fn test_batch_returns_tail_then_none_when_closed() {
        let (tx, mut rx) = mpsc::channel(100);
        tx.send(1).await.unwrap();
        tx.send(2).await.unwrap();
        drop(tx);

        assert_eq!(recv_batch(&mut rx, 10, Duration::from_secs(60)).await, Some(vec![1, 2]));
        assert_eq!(recv_batch(&mut rx, 10, Duration::from_secs(60)).await, None);
    }
}
