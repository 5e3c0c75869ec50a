use crate::{
    error::DataError,
    event::UpdateEvent,
    exchange::binance::kline::BinanceKlineRow,
    instrument::{Interval, MarketKind},
    normalizer::apply_history,
    store::CandleStore,
};
use async_trait::async_trait;
use fnv::FnvHashMap;
use smol_str::SmolStr;
use std::time::Duration;
use tracing::{info, warn};

/// Default pause between consecutive historical kline requests.
pub const DEFAULT_BACKFILL_PACING: Duration = Duration::from_millis(10);

/// Source of historical klines, eg/ the Binance REST API.
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// Fetch up to `limit` of the most recent klines of one series.
    async fn fetch_candles(
        &self,
        market: MarketKind,
        symbol: &str,
        interval: Interval,
        limit: usize,
    ) -> Result<Vec<BinanceKlineRow>, DataError>;
}

/// Outcome of one [`backfill`] run.
#[derive(Clone, Debug, Default)]
pub struct BackfillSummary {
    /// Update and cleanup events of every series fetched, in fetch order.
    pub events: Vec<UpdateEvent>,
    /// Every symbol with at least one failed request, with the errors it produced.
    pub failed: FnvHashMap<SmolStr, Vec<DataError>>,
}

impl BackfillSummary {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Populate the store with recent history for every (symbol, interval) pair.
///
/// Requests are issued one at a time with `pacing` between them. A failed request does not
/// stop the run: the symbol is recorded in [`BackfillSummary::failed`] and the next pair is
/// fetched.
pub async fn backfill<Source, Symbol>(
    source: &Source,
    store: &CandleStore,
    market: MarketKind,
    symbols: &[Symbol],
    intervals: &[Interval],
    pacing: Duration,
) -> BackfillSummary
where
    Source: CandleSource + ?Sized,
    Symbol: AsRef<str>,
{
    let mut summary = BackfillSummary::default();
    let limit = store.max_candles();
    let mut first = true;

    for symbol in symbols.iter().map(AsRef::as_ref) {
        for &interval in intervals {
            if !first && !pacing.is_zero() {
                tokio::time::sleep(pacing).await;
            }
            first = false;

            match source.fetch_candles(market, symbol, interval, limit).await {
                Ok(rows) => {
                    let applied = apply_history(store, market, symbol, interval, &rows);
                    summary.events.extend(applied.into_events());
                }
                Err(error) => {
                    warn!(%market, symbol, %interval, %error, "failed to backfill klines");
                    summary
                        .failed
                        .entry(SmolStr::new(symbol))
                        .or_default()
                        .push(error);
                }
            }
        }
    }

    info!(
        %market,
        events = summary.events.len(),
        failed_symbols = summary.failed.len(),
        "backfill finished"
    );

    summary
}
