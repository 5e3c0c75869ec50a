use crate::{
    backfill::DEFAULT_BACKFILL_PACING,
    error::DataError,
    instrument::{Interval, MarketKind},
    metric::{
        bollinger::DEFAULT_BAND_PERIOD,
        engine::{DEFAULT_WIDTH_THRESHOLD_PCT, MetricConfig},
    },
    streams::{
        DEFAULT_CONNECT_TIMEOUT, DEFAULT_QUEUE_CAPACITY, DEFAULT_RECONNECT_INITIAL,
        DEFAULT_RECONNECT_MAX, DEFAULT_WORKERS, StreamConfig, timeout::DEFAULT_WS_READ_TIMEOUT,
    },
    symbols::{DEFAULT_QUOTE_ASSET, DEFAULT_TOP_SYMBOLS},
    exchange::binance::PING_INTERVAL_BINANCE,
};
use smol_str::SmolStr;
use std::{fmt::Display, str::FromStr, time::Duration};
use url::Url;

pub const DEFAULT_MAX_CANDLES: usize = 50;

/// Runtime settings of the scanner, read from `BANDWATCH_*` environment variables.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ScannerConfig {
    pub market: MarketKind,
    pub max_candles: usize,
    pub top_symbols: usize,
    pub quote_asset: SmolStr,
    pub fast_interval: Interval,
    pub slow_interval: Interval,
    pub workers: usize,
    pub queue_capacity: usize,
    pub ping_interval: Duration,
    pub reconnect_initial: Duration,
    pub reconnect_max: Duration,
    pub read_timeout: Duration,
    pub backfill_pacing: Duration,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            market: MarketKind::Futures,
            max_candles: DEFAULT_MAX_CANDLES,
            top_symbols: DEFAULT_TOP_SYMBOLS,
            quote_asset: SmolStr::new_static(DEFAULT_QUOTE_ASSET),
            fast_interval: Interval::Minute1,
            slow_interval: Interval::Minute5,
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            ping_interval: PING_INTERVAL_BINANCE,
            reconnect_initial: DEFAULT_RECONNECT_INITIAL,
            reconnect_max: DEFAULT_RECONNECT_MAX,
            read_timeout: DEFAULT_WS_READ_TIMEOUT,
            backfill_pacing: DEFAULT_BACKFILL_PACING,
        }
    }
}

impl ScannerConfig {
    pub fn from_env() -> Result<Self, DataError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from a variable lookup, falling back to defaults for unset variables.
    pub fn from_lookup<Lookup>(lookup: Lookup) -> Result<Self, DataError>
    where
        Lookup: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let secs = |key: &str, default: Duration| {
            parse_var(&lookup, key, default.as_secs()).map(Duration::from_secs)
        };

        let config = Self {
            market: parse_var(&lookup, "BANDWATCH_MARKET", defaults.market)?,
            max_candles: parse_var(&lookup, "BANDWATCH_MAX_CANDLES", defaults.max_candles)?,
            top_symbols: parse_var(&lookup, "BANDWATCH_TOP_SYMBOLS", defaults.top_symbols)?,
            quote_asset: lookup("BANDWATCH_QUOTE_ASSET")
                .map(|quote| SmolStr::new(quote.trim().to_ascii_uppercase()))
                .unwrap_or(defaults.quote_asset),
            fast_interval: parse_var(&lookup, "BANDWATCH_FAST_INTERVAL", defaults.fast_interval)?,
            slow_interval: parse_var(&lookup, "BANDWATCH_SLOW_INTERVAL", defaults.slow_interval)?,
            workers: parse_var(&lookup, "BANDWATCH_WORKERS", defaults.workers)?,
            queue_capacity: parse_var(&lookup, "BANDWATCH_QUEUE_CAPACITY", defaults.queue_capacity)?,
            ping_interval: secs("BANDWATCH_PING_INTERVAL_SECS", defaults.ping_interval)?,
            reconnect_initial: secs("BANDWATCH_RECONNECT_INITIAL_SECS", defaults.reconnect_initial)?,
            reconnect_max: secs("BANDWATCH_RECONNECT_MAX_SECS", defaults.reconnect_max)?,
            read_timeout: secs("BANDWATCH_READ_TIMEOUT_SECS", defaults.read_timeout)?,
            backfill_pacing: parse_var(
                &lookup,
                "BANDWATCH_BACKFILL_PACING_MS",
                defaults.backfill_pacing.as_millis() as u64,
            )
            .map(Duration::from_millis)?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), DataError> {
        if self.max_candles < DEFAULT_BAND_PERIOD {
            return Err(DataError::Config(format!(
                "max_candles must be at least {DEFAULT_BAND_PERIOD}, got {}",
                self.max_candles
            )));
        }
        if self.fast_interval >= self.slow_interval {
            return Err(DataError::Config(format!(
                "fast interval must be shorter than slow interval, got {} and {}",
                self.fast_interval, self.slow_interval
            )));
        }
        if self.workers == 0 || self.queue_capacity == 0 {
            return Err(DataError::Config(
                "workers and queue_capacity must be at least 1".to_string(),
            ));
        }
        for (name, duration) in [
            ("ping_interval", self.ping_interval),
            ("read_timeout", self.read_timeout),
            ("reconnect_initial", self.reconnect_initial),
        ] {
            if duration.is_zero() {
                return Err(DataError::Config(format!("{name} must be non-zero")));
            }
        }
        if self.quote_asset.is_empty() {
            return Err(DataError::Config("quote asset must not be empty".to_string()));
        }
        Ok(())
    }

    /// Fast then slow interval, the order series are subscribed and backfilled in.
    pub fn intervals(&self) -> [Interval; 2] {
        [self.fast_interval, self.slow_interval]
    }

    pub fn stream_config(&self, url: Url) -> StreamConfig {
        StreamConfig::new(url)
            .with_ping_interval(self.ping_interval)
            .with_read_timeout(self.read_timeout)
            .with_connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .with_reconnect(self.reconnect_initial, self.reconnect_max)
            .with_workers(self.workers)
            .with_queue_capacity(self.queue_capacity)
    }

    pub fn metric_config(&self) -> MetricConfig {
        MetricConfig {
            max_candles: self.max_candles,
            band_period: DEFAULT_BAND_PERIOD,
            fast_interval: self.fast_interval,
            slow_interval: self.slow_interval,
            width_threshold_pct: DEFAULT_WIDTH_THRESHOLD_PCT,
        }
    }
}

fn parse_var<Lookup, T>(lookup: &Lookup, key: &str, default: T) -> Result<T, DataError>
where
    Lookup: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|error| DataError::Config(format!("{key}={raw}: {error}"))),
        None => Ok(default),
    }
}
