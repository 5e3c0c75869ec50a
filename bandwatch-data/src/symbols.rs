use crate::{
    error::DataError,
    event::{UpdateEvent, UpdateKind},
    exchange::binance::{rest::BinanceRestClient, ticker::Ticker24h},
    instrument::MarketKind,
};
use itertools::Itertools;
use smol_str::SmolStr;
use tracing::info;

/// Default number of symbols to scan.
pub const DEFAULT_TOP_SYMBOLS: usize = 400;

/// Default quote asset symbols must trade against.
pub const DEFAULT_QUOTE_ASSET: &str = "USDT";

/// Keep tickers quoted in `quote_asset`, ranked by 24h quote volume (highest first, ties
/// by symbol), truncated to `top`.
pub fn rank_by_quote_volume<Iter>(tickers: Iter, quote_asset: &str, top: usize) -> Vec<SmolStr>
where
    Iter: IntoIterator<Item = Ticker24h>,
{
    tickers
        .into_iter()
        .filter(|ticker| ticker.symbol.ends_with(quote_asset) && ticker.symbol.len() > quote_asset.len())
        .sorted_by(|a, b| {
            b.quote_volume
                .cmp(&a.quote_volume)
                .then_with(|| a.symbol.cmp(&b.symbol))
        })
        .take(top)
        .map(|ticker| ticker.symbol)
        .collect()
}

/// Fetch 24h tickers and select the symbol universe for `market`.
pub async fn select_symbols(
    client: &BinanceRestClient,
    market: MarketKind,
    quote_asset: &str,
    top: usize,
) -> Result<(Vec<SmolStr>, UpdateEvent), DataError> {
    let tickers = client.fetch_tickers_24h(market).await?;
    let available = tickers.len();
    let symbols = rank_by_quote_volume(tickers, quote_asset, top);

    info!(%market, available, selected = symbols.len(), quote_asset, "selected symbols");

    Ok((symbols, UpdateEvent::for_market(UpdateKind::SymbolUpdate, market)))
}
