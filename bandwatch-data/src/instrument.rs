use crate::error::DataError;
use derive_more::{Constructor, Display};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::{fmt, str::FromStr, time::Duration};

/// Binance market an instrument trades on.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketKind {
    Spot,
    Futures,
}

impl MarketKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketKind::Spot => "spot",
            MarketKind::Futures => "futures",
        }
    }
}

impl fmt::Display for MarketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MarketKind {
    type Err = DataError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.to_ascii_lowercase().as_str() {
            "spot" => Ok(MarketKind::Spot),
            "futures" | "perpetual" => Ok(MarketKind::Futures),
            other => Err(DataError::Config(format!("unknown market: {other}"))),
        }
    }
}

/// Kline timeframe, ordered from fastest to slowest.
///
/// See docs: <https://developers.binance.com/docs/derivatives/usds-margined-futures/market-data/rest-api/Kline-Candlestick-Data>
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Deserialize, Serialize)]
pub enum Interval {
    #[serde(rename = "1m")]
    Minute1,
    #[serde(rename = "3m")]
    Minute3,
    #[serde(rename = "5m")]
    Minute5,
    #[serde(rename = "10m")]
    Minute10,
    #[serde(rename = "15m")]
    Minute15,
    #[serde(rename = "30m")]
    Minute30,
    #[serde(rename = "1h")]
    Hour1,
}

impl Interval {
    pub const ALL: [Interval; 7] = [
        Interval::Minute1,
        Interval::Minute3,
        Interval::Minute5,
        Interval::Minute10,
        Interval::Minute15,
        Interval::Minute30,
        Interval::Hour1,
    ];

    /// Exchange interval code, eg/ "1m".
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::Minute1 => "1m",
            Interval::Minute3 => "3m",
            Interval::Minute5 => "5m",
            Interval::Minute10 => "10m",
            Interval::Minute15 => "15m",
            Interval::Minute30 => "30m",
            Interval::Hour1 => "1h",
        }
    }

    pub fn period(&self) -> Duration {
        let minutes = match self {
            Interval::Minute1 => 1,
            Interval::Minute3 => 3,
            Interval::Minute5 => 5,
            Interval::Minute10 => 10,
            Interval::Minute15 => 15,
            Interval::Minute30 => 30,
            Interval::Hour1 => 60,
        };
        Duration::from_secs(minutes * 60)
    }

    pub fn period_ms(&self) -> i64 {
        self.period().as_millis() as i64
    }

    /// Start of the bucket containing `time_ms`, ie/ `time_ms` truncated down to the
    /// interval period.
    pub fn bucket_start(&self, time_ms: i64) -> i64 {
        time_ms - time_ms.rem_euclid(self.period_ms())
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Interval {
    type Err = DataError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Interval::ALL
            .into_iter()
            .find(|interval| interval.as_str() == input)
            .ok_or_else(|| DataError::UnsupportedInterval(input.to_string()))
    }
}

/// Identifies one candle series: (market, symbol, interval).
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Deserialize, Serialize, Display, Constructor)]
#[display("{market}|{symbol}|{interval}")]
pub struct BucketKey {
    pub market: MarketKind,
    pub symbol: SmolStr,
    pub interval: Interval,
}

impl<S> From<(MarketKind, S, Interval)> for BucketKey
where
    S: Into<SmolStr>,
{
    fn from((market, symbol, interval): (MarketKind, S, Interval)) -> Self {
        Self::new(market, symbol.into(), interval)
    }
}
