use crate::instrument::{BucketKey, Interval, MarketKind};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt;

/// What an [`UpdateEvent`] reports as changed.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Deserialize, Serialize)]
pub enum UpdateKind {
    CandleUpdate,
    SymbolUpdate,
    MetricUpdate,
    CandleCleanup,
}

impl UpdateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateKind::CandleUpdate => "candle_update",
            UpdateKind::SymbolUpdate => "symbol_update",
            UpdateKind::MetricUpdate => "metric_update",
            UpdateKind::CandleCleanup => "candle_cleanup",
        }
    }
}

/// Immutable description of a state change in the candle store or metric engine.
///
/// Market-wide events (eg/ a refreshed symbol universe) carry no `symbol` or `interval`.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Deserialize, Serialize)]
pub struct UpdateEvent {
    pub kind: UpdateKind,
    pub market: MarketKind,
    pub symbol: Option<SmolStr>,
    pub interval: Option<Interval>,
}

impl UpdateEvent {
    pub fn for_bucket(kind: UpdateKind, key: &BucketKey) -> Self {
        Self {
            kind,
            market: key.market,
            symbol: Some(key.symbol.clone()),
            interval: Some(key.interval),
        }
    }

    pub fn for_market(kind: UpdateKind, market: MarketKind) -> Self {
        Self {
            kind,
            market,
            symbol: None,
            interval: None,
        }
    }

    /// The bucket this event refers to, if it refers to exactly one.
    pub fn bucket(&self) -> Option<BucketKey> {
        match (&self.symbol, self.interval) {
            (Some(symbol), Some(interval)) => {
                Some(BucketKey::new(self.market, symbol.clone(), interval))
            }
            _ => None,
        }
    }
}

impl fmt::Display for UpdateEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}", self.kind.as_str(), self.market)?;
        if let Some(symbol) = &self.symbol {
            write!(f, ", {symbol}")?;
        }
        if let Some(interval) = &self.interval {
            write!(f, ", {interval}")?;
        }
        write!(f, ")")
    }
}
