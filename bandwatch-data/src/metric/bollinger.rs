use crate::store::Candle;
use rust_decimal::{Decimal, MathematicalOps};
use serde::{Deserialize, Serialize};

/// Number of trailing closes the bands are computed over.
pub const DEFAULT_BAND_PERIOD: usize = 20;

/// Standard deviations between the moving average and each band.
pub const BAND_STD_MULTIPLIER: Decimal = Decimal::TWO;

/// Bollinger bands of one series, anchored at its most recent candle.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
pub struct BandSnapshot {
    pub upper: Decimal,
    pub sma: Decimal,
    pub lower: Decimal,
    /// Timestamp of the candle the bands are anchored at.
    pub timestamp: i64,
    /// Close of the candle the bands are anchored at.
    pub close: Decimal,
}

impl BandSnapshot {
    pub fn width_pct(&self) -> Option<Decimal> {
        band_width_pct(self.upper, self.lower)
    }
}

/// Compute bands over the trailing `period` closes of `candles` (ascending by timestamp),
/// using the sample standard deviation.
///
/// Returns `None` with fewer than `period` candles or a `period` below 2.
pub fn compute_bands(candles: &[Candle], period: usize) -> Option<BandSnapshot> {
    if period < 2 || candles.len() < period {
        return None;
    }

    let window = &candles[candles.len() - period..];
    let last = window.last()?;
    let count = Decimal::from(period);

    let sma = window.iter().map(|candle| candle.close).sum::<Decimal>() / count;
    let variance = window
        .iter()
        .map(|candle| {
            let deviation = candle.close - sma;
            deviation * deviation
        })
        .sum::<Decimal>()
        / (count - Decimal::ONE);
    let std = variance.sqrt()?;

    Some(BandSnapshot {
        upper: sma + BAND_STD_MULTIPLIER * std,
        sma,
        lower: sma - BAND_STD_MULTIPLIER * std,
        timestamp: last.timestamp,
        close: last.close,
    })
}

/// Distance between the bands as a percentage of the upper band, ie/ in 0..100 units.
pub fn band_width_pct(upper: Decimal, lower: Decimal) -> Option<Decimal> {
    if upper.is_zero() {
        return None;
    }
    Some((upper - lower).abs() / upper * Decimal::ONE_HUNDRED)
}
