//! Wires parsed streaming updates and backfill events through the store, the metric engine
//! and a [`Notifier`].
//!
//! Workers of the streaming client only parse. Every mutation of the [`CandleStore`] made by
//! streaming happens on one consumer task, fed through a bounded channel.

use crate::{
    error::DataError,
    event::UpdateEvent,
    instrument::MarketKind,
    metric::engine::MetricEngine,
    normalizer::{KlineUpdate, apply_update, parse_stream},
    notify::Notifier,
    store::CandleStore,
    streams::{MessageHandler, RawMessage},
};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

#[derive(Debug)]
enum Input {
    Stream { sequence: u64, update: KlineUpdate },
    Event(UpdateEvent),
}

/// Owns the consumer task applying updates for one market.
#[derive(Debug)]
pub struct Pipeline {
    market: MarketKind,
    tx: mpsc::Sender<Input>,
    consumer: JoinHandle<()>,
}

impl Pipeline {
    pub fn spawn(
        market: MarketKind,
        store: Arc<CandleStore>,
        engine: Arc<MetricEngine>,
        notifier: Arc<dyn Notifier>,
        capacity: usize,
    ) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let consumer = tokio::spawn(consume(rx, store, engine, notifier));
        Self {
            market,
            tx,
            consumer,
        }
    }

    /// [`MessageHandler`] for the streaming client's worker pool.
    pub fn handler(&self) -> Arc<KlineMessageHandler> {
        Arc::new(KlineMessageHandler {
            market: self.market,
            tx: self.tx.clone(),
        })
    }

    /// Forward an already applied event (eg/ from backfill) to the engine and notifier.
    pub async fn publish(&self, event: UpdateEvent) -> Result<(), DataError> {
        self.tx
            .send(Input::Event(event))
            .await
            .map_err(|_| DataError::ConsumerClosed)
    }

    /// Wait for the consumer to apply everything sent to it.
    ///
    /// Returns once every [`KlineMessageHandler`] from [`Self::handler`] has been dropped
    /// too, so stop and drop the streaming client first.
    pub async fn join(self) {
        let Self { tx, consumer, .. } = self;
        drop(tx);
        if let Err(error) = consumer.await {
            warn!(%error, "update consumer failed");
        }
    }
}

async fn consume(
    mut rx: mpsc::Receiver<Input>,
    store: Arc<CandleStore>,
    engine: Arc<MetricEngine>,
    notifier: Arc<dyn Notifier>,
) {
    while let Some(input) = rx.recv().await {
        let events = match input {
            Input::Stream { sequence, update } => match apply_update(&store, &update, sequence) {
                Some(applied) => Vec::from(applied.into_events()),
                None => continue,
            },
            Input::Event(event) => vec![event],
        };

        for event in events {
            notifier.on_event(&event);

            let outcome = engine.process(&event);
            if let Some(event) = outcome.event {
                notifier.on_event(&event);
            }
            if let Some(alert) = outcome.alert {
                notifier.on_alert(&alert);
            }
        }
    }

    info!("update consumer stopped");
}

/// Parses raw combined stream frames on the worker pool and forwards them to the consumer.
#[derive(Debug)]
pub struct KlineMessageHandler {
    market: MarketKind,
    tx: mpsc::Sender<Input>,
}

#[async_trait]
impl MessageHandler for KlineMessageHandler {
    async fn handle(&self, message: RawMessage) {
        match parse_stream(self.market, &message.payload) {
            Ok(update) => {
                let input = Input::Stream {
                    sequence: message.sequence,
                    update,
                };
                if self.tx.send(input).await.is_err() {
                    warn!(sequence = message.sequence, "update consumer closed, dropping kline");
                }
            }
            Err(error @ DataError::UnsupportedMessageType(_)) => {
                debug!(%error, sequence = message.sequence, "skipping message");
            }
            Err(error) => {
                warn!(%error, sequence = message.sequence, "failed to parse message");
            }
        }
    }
}
