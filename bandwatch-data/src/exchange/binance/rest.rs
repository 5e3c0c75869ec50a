use super::{kline::BinanceKlineRow, rest_base_url, ticker::Ticker24h};
use crate::{
    backfill::CandleSource,
    error::DataError,
    instrument::{Interval, MarketKind},
};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Per-request timeout applied to every Binance REST call.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Thin Binance REST client for the two public endpoints the scanner needs.
#[derive(Clone, Debug)]
pub struct BinanceRestClient {
    http: Client,
}

impl BinanceRestClient {
    pub fn new() -> Result<Self, DataError> {
        let http = Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self { http })
    }

    /// Fetch 24h statistics for every symbol of the `market`.
    pub async fn fetch_tickers_24h(&self, market: MarketKind) -> Result<Vec<Ticker24h>, DataError> {
        let url = tickers_24h_url(market)?;
        self.get_json(url).await
    }

    /// Fetch up to `limit` klines whose open time is at or before `end_time` (epoch ms).
    pub async fn fetch_klines(
        &self,
        market: MarketKind,
        symbol: &str,
        interval: Interval,
        end_time: i64,
        limit: usize,
    ) -> Result<Vec<BinanceKlineRow>, DataError> {
        let url = klines_url(market, symbol, interval, end_time, limit)?;
        self.get_json(url).await
    }

    async fn get_json<T>(&self, url: Url) -> Result<T, DataError>
    where
        T: DeserializeOwned,
    {
        debug!(%url, "sending Binance REST request");

        let response = self.http.get(url.clone()).send().await?;
        if let Err(status_err) = response.error_for_status_ref() {
            return Err(DataError::Http(format!("{url}: {status_err}")));
        }

        let payload = response.text().await?;
        serde_json::from_str(&payload).map_err(|error| DataError::deserialise(error, &payload))
    }
}

#[async_trait]
impl CandleSource for BinanceRestClient {
    async fn fetch_candles(
        &self,
        market: MarketKind,
        symbol: &str,
        interval: Interval,
        limit: usize,
    ) -> Result<Vec<BinanceKlineRow>, DataError> {
        let end_time = interval.bucket_start(Utc::now().timestamp_millis());
        self.fetch_klines(market, symbol, interval, end_time, limit)
            .await
    }
}

pub fn tickers_24h_url(market: MarketKind) -> Result<Url, DataError> {
    let raw = format!("{}/ticker/24hr", rest_base_url(market));
    Url::parse(&raw).map_err(|error| DataError::Config(format!("invalid url {raw}: {error}")))
}

/// See docs: <https://developers.binance.com/docs/derivatives/usds-margined-futures/market-data/rest-api/Kline-Candlestick-Data>
pub fn klines_url(
    market: MarketKind,
    symbol: &str,
    interval: Interval,
    end_time: i64,
    limit: usize,
) -> Result<Url, DataError> {
    let raw = format!("{}/klines", rest_base_url(market));
    Url::parse_with_params(
        &raw,
        &[
            ("symbol", symbol),
            ("interval", interval.as_str()),
            ("endTime", &end_time.to_string()),
            ("limit", &limit.to_string()),
        ],
    )
    .map_err(|error| DataError::Config(format!("invalid url {raw}: {error}")))
}
