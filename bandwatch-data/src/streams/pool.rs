use super::{MessageHandler, RawMessage};
use crate::error::DataError;
use std::sync::Arc;
use tokio::{
    sync::{Mutex, mpsc},
    task::JoinHandle,
};
use tracing::{debug, warn};

/// Fixed set of worker tasks sharing one bounded queue of [`RawMessage`]s.
#[derive(Debug)]
pub struct WorkerPool {
    tx: mpsc::Sender<RawMessage>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn spawn(handler: Arc<dyn MessageHandler>, workers: usize, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));

        let workers = (0..workers.max(1))
            .map(|worker| {
                let rx = Arc::clone(&rx);
                let handler = Arc::clone(&handler);
                tokio::spawn(async move {
                    loop {
                        let message = rx.lock().await.recv().await;
                        match message {
                            Some(message) => handler.handle(message).await,
                            None => break,
                        }
                    }
                    debug!(worker, "worker stopped");
                })
            })
            .collect();

        Self { tx, workers }
    }

    /// Enqueue a message, waiting only while the queue is full.
    pub async fn submit(&self, message: RawMessage) -> Result<(), DataError> {
        self.tx.send(message).await.map_err(|_| DataError::PoolClosed)
    }

    /// Close the queue and wait for the workers to handle every message already enqueued.
    pub async fn shutdown(self) {
        let Self { tx, workers } = self;
        drop(tx);

        for result in futures::future::join_all(workers).await {
            if let Err(error) = result {
                warn!(%error, "worker task failed");
            }
        }
    }
}
