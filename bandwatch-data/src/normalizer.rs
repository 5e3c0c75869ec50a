//! Unifies REST kline snapshots and streaming kline payloads into [`UpdateEvent`]s.
//!
//! Streaming payloads are handled in two halves: [`parse_stream`] is pure and runs on the
//! worker pool, [`apply_update`] mutates the [`CandleStore`] and runs on the single consumer.

use crate::{
    error::DataError,
    event::{UpdateEvent, UpdateKind},
    exchange::binance::kline::{BinanceKlineRow, BinanceMessage},
    instrument::{BucketKey, Interval, MarketKind},
    store::{Candle, CandleStore},
};
use tracing::trace;

/// Immutable result of parsing one streaming kline payload.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct KlineUpdate {
    pub key: BucketKey,
    pub candle: Candle,
}

/// Decode one combined stream envelope into a [`KlineUpdate`].
pub fn parse_stream(market: MarketKind, payload: &str) -> Result<KlineUpdate, DataError> {
    let message = serde_json::from_str::<BinanceMessage>(payload)
        .map_err(|error| DataError::deserialise(error, payload))?;

    let event = match message {
        BinanceMessage::Kline(event) => event,
        BinanceMessage::Unsupported(kind) => return Err(DataError::UnsupportedMessageType(kind)),
    };

    let key = event.kline.key(market)?;
    let candle = event.kline.candle();

    if key.interval.bucket_start(candle.timestamp) != candle.timestamp {
        return Err(DataError::InvalidKline(format!(
            "{key} start time {} is not aligned to the interval",
            candle.timestamp
        )));
    }

    Ok(KlineUpdate { key, candle })
}

/// Events produced by writing candles into one bucket: the update, then the cleanup pass
/// that trimmed the bucket back to its capacity.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Applied {
    pub update: UpdateEvent,
    pub cleanup: UpdateEvent,
}

impl Applied {
    fn new(key: &BucketKey, cleanup: UpdateEvent) -> Self {
        Self {
            update: UpdateEvent::for_bucket(UpdateKind::CandleUpdate, key),
            cleanup,
        }
    }

    /// Update first, cleanup second.
    pub fn into_events(self) -> [UpdateEvent; 2] {
        [self.update, self.cleanup]
    }
}

/// Upsert every REST kline row into its bucket, overwriting existing fields, then evict.
pub fn apply_history(
    store: &CandleStore,
    market: MarketKind,
    symbol: &str,
    interval: Interval,
    klines: &[BinanceKlineRow],
) -> Applied {
    let key = BucketKey::from((market, symbol, interval));
    let cleanup = store.upsert_batch(&key, klines.iter().copied().map(Candle::from));
    trace!(%key, rows = klines.len(), "applied kline history");
    Applied::new(&key, cleanup)
}

/// Parse and apply one streaming payload in a single step.
pub fn apply_stream(
    store: &CandleStore,
    market: MarketKind,
    payload: &str,
) -> Result<Applied, DataError> {
    let KlineUpdate { key, candle } = parse_stream(market, payload)?;
    let cleanup = store.upsert_batch(&key, [candle]);
    Ok(Applied::new(&key, cleanup))
}

/// Apply a parsed streaming update read from the transport as message number `sequence`.
///
/// Returns `None` if a later message already wrote the same bucket timestamp.
pub fn apply_update(
    store: &CandleStore,
    update: &KlineUpdate,
    sequence: u64,
) -> Option<Applied> {
    store
        .upsert_sequenced(&update.key, update.candle, sequence)
        .map(|cleanup| Applied::new(&update.key, cleanup))
}
