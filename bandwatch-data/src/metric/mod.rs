/// Bollinger band maths over candle closes.
pub mod bollinger;

/// Per-series band snapshots and deduplicated breakout alerts.
pub mod engine;
