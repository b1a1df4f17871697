use std::{fmt::Display, future::Future, pin::Pin, sync::Arc};
use tokio::sync::{broadcast, mpsc};

pub type ConsumerCallback<T, E> =
    dyn Fn(T) -> Pin<Box<dyn Future<Output = Result<(), E>> + Send>> + Send + Sync + 'static;

/// Drains a channel through an async callback until the channel closes, a
/// shutdown is signalled, or the callback fails. A failing callback
/// broadcasts shutdown so sibling stages stop too.
pub struct Consumer<T: 'static, E: 'static> {
    consumer_callback: Arc<ConsumerCallback<T, E>>,
    rx: mpsc::Receiver<T>,
    shutdown_tx: broadcast::Sender<()>,
}

impl<T, E> Consumer<T, E> {
    pub fn new(
        consumer_callback: Arc<ConsumerCallback<T, E>>,
        rx: mpsc::Receiver<T>,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Self {
        Self { consumer_callback, rx, shutdown_tx }
    }
}

impl<T: Send + 'static, E: Display + Send + 'static> Consumer<T, E> {
    pub fn spawn<F, Fut>(
        rx: mpsc::Receiver<T>,
        shutdown_tx: broadcast::Sender<()>,
        consumer_callback_factory: F,
    ) -> tokio::task::JoinHandle<Result<(), E>>
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
    {
        let consumer_callback: Arc<ConsumerCallback<T, E>> =
            Arc::new(move |msg: T| Box::pin(consumer_callback_factory(msg)));

        let mut consumer = Consumer::new(consumer_callback, rx, shutdown_tx);

        tokio::spawn(async move { consumer.run().await })
    }
}

impl<T, E: Display> Consumer<T, E> {
    pub async fn run(&mut self) -> Result<(), E> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                maybe_msg = self.rx.recv() => {
                    match maybe_msg {
                        Some(data) => {
                            let consumer_callback = Arc::clone(&self.consumer_callback);
                            if let Err(e) = consumer_callback(data).await {
                                tracing::error!("Consumer failed: {e}");
                                // stop signal
                                let _ = self.shutdown_tx.send(());
                                return Err(e);
                            }
                        }
                        // Channel closed
                        None => break,
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("Consumer received shutdown signal");
                    break
                }
            }
        }

        Ok(())
    }
}
