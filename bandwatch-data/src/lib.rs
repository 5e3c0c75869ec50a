//! # Bandwatch Data
//! Binance kline ingestion with a bounded in-memory candle history and Bollinger band
//! breakout alerts.
//!
//! Data flows leaves first:
//! * [`streams::client::StreamingClient`] keeps one combined-stream WebSocket alive and
//!   hands every text frame, stamped with a sequence number, to a bounded worker pool.
//! * [`normalizer`] turns REST kline rows and streaming payloads into [`event::UpdateEvent`]s.
//! * [`store::CandleStore`] keeps the most recent candles per (market, symbol, interval).
//! * [`metric::engine::MetricEngine`] rebuilds band snapshots and raises deduplicated alerts.
//!
//! [`pipeline::Pipeline`] connects the pieces through a single consumer task.

/// All [`Error`](std::error::Error)s generated in Bandwatch Data.
pub mod error;

/// Market, interval and series key types.
pub mod instrument;

/// Immutable change notifications produced by the store and the metric engine.
pub mod event;

/// Bounded candle history.
pub mod store;

/// Exchange specific endpoints and wire models.
pub mod exchange;

/// REST kline & streaming kline normalisation into [`event::UpdateEvent`]s.
pub mod normalizer;

/// Reconnecting streaming transport.
pub mod streams;

/// Bollinger bands and alerting.
pub mod metric;

/// Historical kline backfill.
pub mod backfill;

/// Symbol universe selection by 24h quote volume.
pub mod symbols;

/// Alert & event side effects.
pub mod notify;

/// Worker to consumer wiring.
pub mod pipeline;

/// `BANDWATCH_*` environment configuration.
pub mod config;

pub use error::DataError;
pub use event::{UpdateEvent, UpdateKind};
pub use instrument::{BucketKey, Interval, MarketKind};
pub use store::{Candle, CandleStore};
