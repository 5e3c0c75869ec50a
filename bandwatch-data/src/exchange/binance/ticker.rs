use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Subset of a Binance `GET /ticker/24hr` entry used to rank symbols.
///
/// ### Raw Payload Examples
/// See docs: <https://developers.binance.com/docs/derivatives/usds-margined-futures/market-data/rest-api/24hr-Ticker-Price-Change-Statistics>
/// ```json
/// {
///     "symbol": "BTCUSDT",
///     "priceChange": "-94.99999800",
///     "lastPrice": "36510.00",
///     "volume": "431.00000000",
///     "quoteVolume": "15744213.00000000",
///     "count": 76
/// }
/// ```
#[derive(Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
pub struct Ticker24h {
    pub symbol: SmolStr,

    #[serde(rename = "quoteVolume", with = "rust_decimal::serde::str")]
    pub quote_volume: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_ticker_24h_ignores_unused_fields() {
        let input = r#"
            [
                {
                    "symbol": "BTCUSDT",
                    "priceChange": "-94.99999800",
                    "priceChangePercent": "-95.960",
                    "lastPrice": "36510.00",
                    "volume": "431.00000000",
                    "quoteVolume": "15744213.00000000",
                    "openTime": 1699913600000,
                    "closeTime": 1700000000000,
                    "count": 76
                },
                {"symbol": "ETHBTC", "quoteVolume": "12.5"}
            ]
        "#;

        let actual: Vec<Ticker24h> = serde_json::from_str(input).unwrap();
        assert_eq!(
            actual,
            vec![
                Ticker24h {
                    symbol: SmolStr::new("BTCUSDT"),
                    quote_volume: dec!(15744213.00000000),
                },
                Ticker24h {
                    symbol: SmolStr::new("ETHBTC"),
                    quote_volume: dec!(12.5),
                },
            ]
        );
    }
}
