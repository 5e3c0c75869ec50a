use crate::{
    error::DataError,
    instrument::{BucketKey, Interval, MarketKind},
    store::Candle,
};
use rust_decimal::Decimal;
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{self, Expected, IgnoredAny, SeqAccess, Visitor},
};
use serde_json::Value;
use smol_str::SmolStr;
use std::{fmt, str::FromStr};

/// Messages received on a Binance combined stream connection.
#[derive(Clone, Debug, PartialEq)]
pub enum BinanceMessage {
    Kline(BinanceKlineEvent),
    /// Any other `data.e` discriminator, eg/ "24hrTicker".
    Unsupported(String),
}

impl<'de> Deserialize<'de> for BinanceMessage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Envelope {
            data: Value,
        }

        let Envelope { data } = Envelope::deserialize(deserializer)?;
        let kind = data.get("e").and_then(Value::as_str).map(str::to_owned);

        match kind.as_deref() {
            Some("kline") => serde_json::from_value(data)
                .map(BinanceMessage::Kline)
                .map_err(de::Error::custom),
            Some(other) => Ok(BinanceMessage::Unsupported(other.to_string())),
            None => Err(de::Error::missing_field("e")),
        }
    }
}

/// ### Raw Payload Examples
/// See docs: <https://developers.binance.com/docs/derivatives/usds-margined-futures/websocket-market-streams/Kline-Candlestick-Streams>
/// ```json
/// {
///     "e": "kline",
///     "E": 1700000001234,
///     "s": "BTCUSDT",
///     "k": {
///         "t": 1699999980000,
///         "T": 1700000039999,
///         "s": "BTCUSDT",
///         "i": "1m",
///         "o": "36500.10",
///         "c": "36510.00",
///         "h": "36520.00",
///         "l": "36490.50",
///         "v": "10.512",
///         "x": false
///     }
/// }
/// ```
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct BinanceKlineEvent {
    #[serde(rename = "k")]
    pub kline: BinanceKline,
}

#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct BinanceKline {
    #[serde(rename = "s")]
    pub symbol: SmolStr,

    #[serde(rename = "i")]
    pub interval: String,

    #[serde(rename = "t")]
    pub start_time: i64,

    #[serde(rename = "o", with = "rust_decimal::serde::str")]
    pub open: Decimal,

    #[serde(rename = "h", with = "rust_decimal::serde::str")]
    pub high: Decimal,

    #[serde(rename = "l", with = "rust_decimal::serde::str")]
    pub low: Decimal,

    #[serde(rename = "c", with = "rust_decimal::serde::str")]
    pub close: Decimal,
}

impl BinanceKline {
    pub fn key(&self, market: MarketKind) -> Result<BucketKey, DataError> {
        let interval = Interval::from_str(&self.interval)?;
        Ok(BucketKey::new(market, self.symbol.clone(), interval))
    }

    pub fn candle(&self) -> Candle {
        Candle {
            timestamp: self.start_time,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
        }
    }
}

/// One row of a `GET /klines` response.
///
/// Binance returns `[open_time, open, high, low, close, volume, close_time, ...]`; only the
/// first five columns are read and any trailing columns are ignored.
///
/// See docs: <https://developers.binance.com/docs/derivatives/usds-margined-futures/market-data/rest-api/Kline-Candlestick-Data>
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct BinanceKlineRow {
    pub open_time: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
}

impl From<BinanceKlineRow> for Candle {
    fn from(row: BinanceKlineRow) -> Self {
        Candle {
            timestamp: row.open_time,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
        }
    }
}

impl<'de> Deserialize<'de> for BinanceKlineRow {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct RowVisitor;

        impl<'de> Visitor<'de> for RowVisitor {
            type Value = BinanceKlineRow;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a kline array [open_time, open, high, low, close, ..]")
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let open_time = seq
                    .next_element::<i64>()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;
                let open = next_decimal(&mut seq, 1, &self)?;
                let high = next_decimal(&mut seq, 2, &self)?;
                let low = next_decimal(&mut seq, 3, &self)?;
                let close = next_decimal(&mut seq, 4, &self)?;

                while seq.next_element::<IgnoredAny>()?.is_some() {}

                Ok(BinanceKlineRow {
                    open_time,
                    open,
                    high,
                    low,
                    close,
                })
            }
        }

        deserializer.deserialize_seq(RowVisitor)
    }
}

fn next_decimal<'de, A>(seq: &mut A, index: usize, expected: &dyn Expected) -> Result<Decimal, A::Error>
where
    A: SeqAccess<'de>,
{
    let raw = seq
        .next_element::<String>()?
        .ok_or_else(|| de::Error::invalid_length(index, expected))?;
    Decimal::from_str(&raw).map_err(|error| de::Error::custom(format!("column {index}: {error}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    mod de {
        use super::*;
        use rust_decimal_macros::dec;

        #[test]
        fn test_binance_message() {
            struct TestCase {
                input: &'static str,
                expected: Result<BinanceMessage, ()>,
            }

            let tests = vec![
                TestCase {
                    // TC0: combined stream kline is deserialised
                    input: r#"
                        {
                            "stream": "btcusdt@kline_1m",
                            "data": {
                                "e": "kline",
                                "E": 1700000001234,
                                "s": "BTCUSDT",
                                "k": {
                                    "t": 1699999980000,
                                    "T": 1700000039999,
                                    "s": "BTCUSDT",
                                    "i": "1m",
                                    "f": 100,
                                    "L": 200,
                                    "o": "36500.10",
                                    "c": "36510.00",
                                    "h": "36520.00",
                                    "l": "36490.50",
                                    "v": "10.512",
                                    "n": 100,
                                    "x": false,
                                    "q": "383700.12",
                                    "V": "5.1",
                                    "Q": "186200.00",
                                    "B": "0"
                                }
                            }
                        }
                    "#,
                    expected: Ok(BinanceMessage::Kline(BinanceKlineEvent {
                        kline: BinanceKline {
                            symbol: SmolStr::new("BTCUSDT"),
                            interval: "1m".to_string(),
                            start_time: 1699999980000,
                            open: dec!(36500.10),
                            high: dec!(36520.00),
                            low: dec!(36490.50),
                            close: dec!(36510.00),
                        },
                    })),
                },
                TestCase {
                    // TC1: other event types are recognised but unsupported
                    input: r#"{"stream": "btcusdt@ticker", "data": {"e": "24hrTicker", "s": "BTCUSDT"}}"#,
                    expected: Ok(BinanceMessage::Unsupported("24hrTicker".to_string())),
                },
                TestCase {
                    // TC2: kline missing its close price is rejected
                    input: r#"
                        {
                            "data": {
                                "e": "kline",
                                "k": {"t": 1, "s": "BTCUSDT", "i": "1m", "o": "1", "h": "1", "l": "1"}
                            }
                        }
                    "#,
                    expected: Err(()),
                },
                TestCase {
                    // TC3: envelope without a discriminator is rejected
                    input: r#"{"data": {"k": {}}}"#,
                    expected: Err(()),
                },
                TestCase {
                    // TC4: price that is not a decimal string is rejected
                    input: r#"
                        {
                            "data": {
                                "e": "kline",
                                "k": {"t": 1, "s": "BTCUSDT", "i": "1m", "o": "x", "h": "1", "l": "1", "c": "1"}
                            }
                        }
                    "#,
                    expected: Err(()),
                },
            ];

            for (index, test) in tests.into_iter().enumerate() {
                let actual = serde_json::from_str::<BinanceMessage>(test.input);
                match (actual, test.expected) {
                    (Ok(actual), Ok(expected)) => {
                        assert_eq!(actual, expected, "TC{} failed", index)
                    }
                    (Err(_), Err(_)) => {
                        // Test passed
                    }
                    (actual, expected) => {
                        // Test failed
                        panic!(
                            "TC{index} failed because actual != expected. \nActual: {actual:?}\nExpected: {expected:?}\n"
                        );
                    }
                }
            }
        }

        #[test]
        fn test_binance_kline_row() {
            struct TestCase {
                input: &'static str,
                expected: Result<BinanceKlineRow, ()>,
            }

            let tests = vec![
                TestCase {
                    // TC0: full 12 column REST row
                    input: r#"[
                        1699999980000, "36500.10", "36520.00", "36490.50", "36510.00", "10.512",
                        1700000039999, "383700.12", 100, "5.1", "186200.00", "0"
                    ]"#,
                    expected: Ok(BinanceKlineRow {
                        open_time: 1699999980000,
                        open: dec!(36500.10),
                        high: dec!(36520.00),
                        low: dec!(36490.50),
                        close: dec!(36510.00),
                    }),
                },
                TestCase {
                    // TC1: minimal five column row
                    input: r#"[1700000000000, "100.0", "101.0", "99.5", "100.5"]"#,
                    expected: Ok(BinanceKlineRow {
                        open_time: 1700000000000,
                        open: dec!(100.0),
                        high: dec!(101.0),
                        low: dec!(99.5),
                        close: dec!(100.5),
                    }),
                },
                TestCase {
                    // TC2: truncated row
                    input: r#"[1700000000000, "100.0", "101.0"]"#,
                    expected: Err(()),
                },
                TestCase {
                    // TC3: non decimal price
                    input: r#"[1700000000000, "100.0", "101.0", "abc", "100.5"]"#,
                    expected: Err(()),
                },
            ];

            for (index, test) in tests.into_iter().enumerate() {
                let actual = serde_json::from_str::<BinanceKlineRow>(test.input);
                match (actual, test.expected) {
                    (Ok(actual), Ok(expected)) => {
                        assert_eq!(actual, expected, "TC{} failed", index)
                    }
                    (Err(_), Err(_)) => {
                        // Test passed
                    }
                    (actual, expected) => {
                        // Test failed
                        panic!(
                            "TC{index} failed because actual != expected. \nActual: {actual:?}\nExpected: {expected:?}\n"
                        );
                    }
                }
            }
        }

        #[test]
        fn test_decimal_prices_keep_exchange_precision() {
            let row: BinanceKlineRow =
                serde_json::from_str(r#"[0, "0.00001234", "0.00001240", "0.00001230", "0.00001235"]"#)
                    .unwrap();
            assert_eq!(row.close.to_string(), "0.00001235");
        }
    }

    #[test]
    fn test_binance_kline_key() {
        let kline = BinanceKline {
            symbol: SmolStr::new("ETHUSDT"),
            interval: "5m".to_string(),
            start_time: 0,
            open: Decimal::ONE,
            high: Decimal::ONE,
            low: Decimal::ONE,
            close: Decimal::ONE,
        };
        assert_eq!(
            kline.key(MarketKind::Spot),
            Ok(BucketKey::from((MarketKind::Spot, "ETHUSDT", Interval::Minute5)))
        );

        let kline = BinanceKline {
            interval: "2w".to_string(),
            ..kline
        };
        assert_eq!(
            kline.key(MarketKind::Spot),
            Err(DataError::UnsupportedInterval("2w".to_string()))
        );
    }
}
