use super::bollinger::{BandSnapshot, DEFAULT_BAND_PERIOD, band_width_pct, compute_bands};
use crate::{
    event::{UpdateEvent, UpdateKind},
    instrument::{BucketKey, Interval, MarketKind},
    store::CandleStore,
};
use chrono::DateTime;
use fnv::FnvHashMap;
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::{fmt, sync::Arc};
use tracing::{debug, trace};

/// Fast band width a setup must exceed, compared against [`band_width_pct`] (0..100 units).
pub const DEFAULT_WIDTH_THRESHOLD_PCT: Decimal = Decimal::from_parts(2, 0, 0, false, 2);

#[derive(Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
pub struct MetricConfig {
    /// Minimum history before bands are computed for a series.
    pub max_candles: usize,
    pub band_period: usize,
    pub fast_interval: Interval,
    pub slow_interval: Interval,
    pub width_threshold_pct: Decimal,
}

impl Default for MetricConfig {
    fn default() -> Self {
        Self {
            max_candles: 50,
            band_period: DEFAULT_BAND_PERIOD,
            fast_interval: Interval::Minute1,
            slow_interval: Interval::Minute5,
            width_threshold_pct: DEFAULT_WIDTH_THRESHOLD_PCT,
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Deserialize, Serialize)]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Buy => "BUY",
            Direction::Sell => "SELL",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Close outside both the fast and slow bands of one symbol.
#[derive(Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
pub struct Alert {
    pub direction: Direction,
    pub market: MarketKind,
    pub symbol: SmolStr,
    pub close: Decimal,
    pub fast_interval: Interval,
    pub slow_interval: Interval,
    pub fast_width_pct: Decimal,
    pub slow_width_pct: Decimal,
    /// Start of the fast bucket that triggered the alert, epoch ms.
    pub timestamp: i64,
}

impl fmt::Display for Alert {
    /// eg/ `BTCUSDT [2023-11-14 22:13]: SELL | WH/2: 0.42% (1m), 0.91% (5m)`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let time = DateTime::from_timestamp_millis(self.timestamp)
            .map(|time| time.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| self.timestamp.to_string());

        write!(
            f,
            "{} [{}]: {} | WH/2: {}% ({}), {}% ({})",
            self.symbol,
            time,
            self.direction,
            (self.fast_width_pct / Decimal::TWO).round_dp(2),
            self.fast_interval,
            (self.slow_width_pct / Decimal::TWO).round_dp(2),
            self.slow_interval,
        )
    }
}

/// What [`MetricEngine::process`] produced for one store update.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct MetricOutcome {
    pub event: Option<UpdateEvent>,
    pub alert: Option<Alert>,
}

/// Rolling Bollinger bands per series and deduplicated alerts per symbol.
#[derive(Debug)]
pub struct MetricEngine {
    config: MetricConfig,
    store: Arc<CandleStore>,
    bands: RwLock<FnvHashMap<BucketKey, BandSnapshot>>,
    /// Last alerted fast bucket timestamp per (market, symbol).
    notified: Mutex<FnvHashMap<(MarketKind, SmolStr), i64>>,
}

impl MetricEngine {
    pub fn new(config: MetricConfig, store: Arc<CandleStore>) -> Self {
        Self {
            config,
            store,
            bands: RwLock::new(FnvHashMap::default()),
            notified: Mutex::new(FnvHashMap::default()),
        }
    }

    pub fn config(&self) -> &MetricConfig {
        &self.config
    }

    /// Latest band snapshot of a series, if it ever had enough history.
    pub fn bands(&self, key: &BucketKey) -> Option<BandSnapshot> {
        self.bands.read().get(key).copied()
    }

    /// Rebuild the band snapshot of `key` from the store.
    ///
    /// Returns a [`UpdateKind::MetricUpdate`] event if the series holds at least
    /// `max_candles` candles, otherwise leaves any previous snapshot untouched.
    pub fn recompute(&self, key: &BucketKey) -> Option<UpdateEvent> {
        let candles = self.store.snapshot(key);
        if candles.len() < self.config.max_candles {
            trace!(%key, len = candles.len(), "not enough history for bands");
            return None;
        }

        let snapshot = compute_bands(&candles, self.config.band_period)?;
        self.bands.write().insert(key.clone(), snapshot);
        Some(UpdateEvent::for_bucket(UpdateKind::MetricUpdate, key))
    }

    /// Check the fast and slow snapshots of one symbol against the alert rules.
    ///
    /// Fires at most once per fast bucket: the notification state only moves forward.
    pub fn evaluate_alert(&self, market: MarketKind, symbol: &str) -> Option<Alert> {
        let fast = self.bands(&BucketKey::from((market, symbol, self.config.fast_interval)))?;
        let slow = self.bands(&BucketKey::from((market, symbol, self.config.slow_interval)))?;

        let close = fast.close;
        let positive = [close, fast.upper, fast.lower, slow.upper, slow.lower]
            .iter()
            .all(|value| value.is_sign_positive() && !value.is_zero());
        if !positive {
            return None;
        }

        let fast_width_pct = band_width_pct(fast.upper, fast.lower)?;
        if fast_width_pct <= self.config.width_threshold_pct {
            return None;
        }
        let slow_width_pct = band_width_pct(slow.upper, slow.lower)?;

        let direction = if close >= fast.upper && close >= slow.upper {
            Direction::Sell
        } else if close <= fast.lower && close <= slow.lower {
            Direction::Buy
        } else {
            return None;
        };

        {
            let mut notified = self.notified.lock();
            let last = notified.entry((market, SmolStr::new(symbol))).or_insert(i64::MIN);
            if *last >= fast.timestamp {
                debug!(%market, symbol, timestamp = fast.timestamp, "alert already sent for bucket");
                return None;
            }
            *last = fast.timestamp;
        }

        Some(Alert {
            direction,
            market,
            symbol: SmolStr::new(symbol),
            close,
            fast_interval: self.config.fast_interval,
            slow_interval: self.config.slow_interval,
            fast_width_pct,
            slow_width_pct,
            timestamp: fast.timestamp,
        })
    }

    /// React to a candle update: rebuild the touched series' bands and, for the fast
    /// interval, evaluate the alert rules.
    pub fn process(&self, event: &UpdateEvent) -> MetricOutcome {
        if event.kind != UpdateKind::CandleUpdate {
            return MetricOutcome::default();
        }
        let Some(key) = event.bucket() else {
            return MetricOutcome::default();
        };

        let Some(event) = self.recompute(&key) else {
            return MetricOutcome::default();
        };

        let alert = (key.interval == self.config.fast_interval)
            .then(|| self.evaluate_alert(key.market, &key.symbol))
            .flatten();

        MetricOutcome {
            event: Some(event),
            alert,
        }
    }
}
