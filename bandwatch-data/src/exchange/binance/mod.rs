use crate::{
    error::DataError,
    instrument::{Interval, MarketKind},
};
use itertools::Itertools;
use std::time::Duration;
use url::Url;

/// Kline WebSocket & REST wire models.
pub mod kline;

/// REST client for klines and 24h tickers.
pub mod rest;

/// 24h ticker statistics used for symbol selection.
pub mod ticker;

/// [`MarketKind::Futures`] REST base url.
///
/// See docs: <https://developers.binance.com/docs/derivatives/usds-margined-futures/general-info>
pub const BASE_URL_BINANCE_FUTURES_REST: &str = "https://fapi.binance.com/fapi/v1";

/// [`MarketKind::Spot`] REST base url.
///
/// See docs: <https://developers.binance.com/docs/binance-spot-api-docs/rest-api/general-api-information>
pub const BASE_URL_BINANCE_SPOT_REST: &str = "https://api.binance.com/api/v3";

/// [`MarketKind::Futures`] WebSocket base url.
///
/// See docs: <https://developers.binance.com/docs/derivatives/usds-margined-futures/websocket-market-streams>
pub const BASE_URL_BINANCE_FUTURES_WS: &str = "wss://fstream.binance.com";

/// [`MarketKind::Spot`] WebSocket base url.
///
/// See docs: <https://developers.binance.com/docs/binance-spot-api-docs/web-socket-streams>
pub const BASE_URL_BINANCE_SPOT_WS: &str = "wss://stream.binance.com:9443";

/// Client ping interval used to keep the combined stream alive.
pub const PING_INTERVAL_BINANCE: Duration = Duration::from_secs(20);

pub fn rest_base_url(market: MarketKind) -> &'static str {
    match market {
        MarketKind::Spot => BASE_URL_BINANCE_SPOT_REST,
        MarketKind::Futures => BASE_URL_BINANCE_FUTURES_REST,
    }
}

pub fn ws_base_url(market: MarketKind) -> &'static str {
    match market {
        MarketKind::Spot => BASE_URL_BINANCE_SPOT_WS,
        MarketKind::Futures => BASE_URL_BINANCE_FUTURES_WS,
    }
}

/// Kline stream name for one (symbol, interval), eg/ "btcusdt@kline_1m".
pub fn kline_stream_name(symbol: &str, interval: Interval) -> String {
    format!("{}@kline_{}", symbol.to_lowercase(), interval.as_str())
}

/// Combined stream url subscribing to one kline channel per (symbol, interval) pair.
///
/// See docs: <https://developers.binance.com/docs/binance-spot-api-docs/web-socket-streams#general-wss-information>
pub fn combined_kline_stream_url<Symbol>(
    market: MarketKind,
    symbols: &[Symbol],
    intervals: &[Interval],
) -> Result<Url, DataError>
where
    Symbol: AsRef<str>,
{
    if symbols.is_empty() || intervals.is_empty() {
        return Err(DataError::Config(
            "combined kline stream requires at least one symbol and interval".to_string(),
        ));
    }

    let streams = symbols
        .iter()
        .cartesian_product(intervals.iter())
        .map(|(symbol, interval)| kline_stream_name(symbol.as_ref(), *interval))
        .join("/");

    let raw = format!("{}/stream?streams={}", ws_base_url(market), streams);
    Url::parse(&raw).map_err(|error| DataError::Config(format!("invalid stream url {raw}: {error}")))
}
