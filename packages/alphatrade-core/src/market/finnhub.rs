//! Finnhub market data client.
//!
//! - Quotes via `/quote`
//! - Candles via `/stock/candle`
//!
//! API documentation: https://finnhub.io/docs/api

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::MarketDataSource;
use crate::config::DEFAULT_FINNHUB_BASE_URL;
use crate::types::{Candle, Quote, TimeRange};
use crate::Unavailable;

const SOURCE_ID: &str = "FINNHUB";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

// ============================================================================
// API Response Structures
// ============================================================================

/// Response from /quote endpoint
#[derive(Debug, Deserialize)]
struct QuoteResponse {
    /// Current price
    c: Option<f64>,
    /// Change
    d: Option<f64>,
    /// Percent change
    dp: Option<f64>,
    /// High price of the day
    h: Option<f64>,
    /// Low price of the day
    l: Option<f64>,
    /// Open price of the day
    o: Option<f64>,
    /// Previous close price
    pc: Option<f64>,
}

/// Response from /stock/candle endpoint
#[derive(Debug, Deserialize)]
struct CandleResponse {
    /// Status: "ok" or "no_data"
    s: String,
    #[serde(default)]
    t: Vec<i64>,
    #[serde(default)]
    o: Vec<f64>,
    #[serde(default)]
    h: Vec<f64>,
    #[serde(default)]
    l: Vec<f64>,
    #[serde(default)]
    c: Vec<f64>,
    #[serde(default)]
    v: Vec<f64>,
}

impl QuoteResponse {
    fn into_quote(self, symbol: &str) -> Result<Quote, Unavailable> {
        let price = self.c.unwrap_or(0.0);
        // Finnhub answers unknown symbols with zeros and null changes
        if price == 0.0 && self.d.is_none() {
            return Err(Unavailable::NoData(symbol.to_string()));
        }

        Ok(Quote {
            price,
            change: self.d.unwrap_or(0.0),
            percent_change: self.dp.unwrap_or(0.0),
            high: self.h.unwrap_or(price),
            low: self.l.unwrap_or(price),
            open: self.o.unwrap_or(price),
            previous_close: self.pc.unwrap_or(price),
        })
    }
}

impl CandleResponse {
    fn into_candles(self, symbol: &str) -> Result<Vec<Candle>, Unavailable> {
        if self.s != "ok" {
            return Err(Unavailable::NoData(symbol.to_string()));
        }

        let n = self.t.len();
        if [self.o.len(), self.h.len(), self.l.len(), self.c.len(), self.v.len()]
            .iter()
            .any(|&len| len != n)
        {
            return Err(Unavailable::Malformed(
                "candle arrays have different lengths".to_string(),
            ));
        }

        let mut candles = Vec::with_capacity(n);
        for i in 0..n {
            let time = DateTime::from_timestamp(self.t[i], 0).ok_or_else(|| {
                Unavailable::Malformed(format!("timestamp out of range: {}", self.t[i]))
            })?;
            candles.push(Candle {
                time,
                open: self.o[i],
                high: self.h[i],
                low: self.l[i],
                close: self.c[i],
                volume: self.v[i],
            });
        }
        candles.sort_by_key(|c| c.time);
        Ok(candles)
    }
}

// ============================================================================
// FinnhubClient
// ============================================================================

/// Finnhub client. Free tier is limited to 60 calls per minute.
#[derive(Debug, Clone)]
pub struct FinnhubClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl FinnhubClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_key: api_key.into(),
            base_url: DEFAULT_FINNHUB_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Make a GET request and decode the JSON body.
    async fn fetch<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<T, Unavailable> {
        debug!("Finnhub request: {} {:?}", endpoint, params);

        let response = self
            .client
            .get(format!("{}{}", self.base_url, endpoint))
            .header("X-Finnhub-Token", &self.api_key)
            .query(params)
            .send()
            .await
            .map_err(|e| Unavailable::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Unavailable::Status(status.as_u16()));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| Unavailable::Malformed(e.to_string()))
    }
}

#[async_trait]
impl MarketDataSource for FinnhubClient {
    fn id(&self) -> &'static str {
        SOURCE_ID
    }

    async fn quote(&self, symbol: &str) -> Result<Quote, Unavailable> {
        let response: QuoteResponse = self.fetch("/quote", &[("symbol", symbol)]).await?;
        response.into_quote(symbol)
    }

    async fn candles(&self, symbol: &str, range: TimeRange) -> Result<Vec<Candle>, Unavailable> {
        let now = Utc::now();
        let to = now.timestamp().to_string();
        let from = (now - range.lookback()).timestamp().to_string();

        let response: CandleResponse = self
            .fetch(
                "/stock/candle",
                &[
                    ("symbol", symbol),
                    ("resolution", range.resolution()),
                    ("from", from.as_str()),
                    ("to", to.as_str()),
                ],
            )
            .await?;
        response.into_candles(symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> FinnhubClient {
        FinnhubClient::new("test-key").with_base_url(server.uri())
    }

    #[tokio::test]
    async fn test_quote() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/quote"))
            .and(query_param("symbol", "AAPL"))
            .and(header("X-Finnhub-Token", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "c": 182.5, "d": 1.2, "dp": 0.66, "h": 183.0,
                "l": 180.1, "o": 181.0, "pc": 181.3, "t": 1700000000
            })))
            .mount(&server)
            .await;

        let quote = client_for(&server).await.quote("AAPL").await.unwrap();
        assert_eq!(quote.price, 182.5);
        assert_eq!(quote.change, 1.2);
        assert_eq!(quote.previous_close, 181.3);
    }

    #[tokio::test]
    async fn test_any_success_status_is_accepted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/quote"))
            .respond_with(ResponseTemplate::new(203).set_body_json(json!({
                "c": 99.0, "d": -1.0, "dp": -1.0, "h": 100.0, "l": 98.0, "o": 100.0, "pc": 100.0
            })))
            .mount(&server)
            .await;

        let quote = client_for(&server).await.quote("AAPL").await.unwrap();
        assert_eq!(quote.price, 99.0);
    }

    #[tokio::test]
    async fn test_unknown_symbol() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/quote"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "c": 0, "d": null, "dp": null, "h": 0, "l": 0, "o": 0, "pc": 0
            })))
            .mount(&server)
            .await;

        let result = client_for(&server).await.quote("NOPE").await;
        assert_eq!(result, Err(Unavailable::NoData("NOPE".to_string())));
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let result = client_for(&server).await.quote("AAPL").await;
        assert_eq!(result, Err(Unavailable::Status(429)));
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let result = client_for(&server).await.quote("AAPL").await;
        assert!(matches!(result, Err(Unavailable::Malformed(_))));
    }

    #[tokio::test]
    async fn test_candles() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stock/candle"))
            .and(query_param("symbol", "AAPL"))
            .and(query_param("resolution", "W"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "s": "ok",
                "t": [1700000000, 1700604800],
                "o": [180.0, 182.0],
                "h": [185.0, 186.0],
                "l": [179.0, 181.0],
                "c": [182.0, 185.5],
                "v": [1000000.0, 1200000.0]
            })))
            .mount(&server)
            .await;

        let candles = client_for(&server)
            .await
            .candles("AAPL", TimeRange::Year)
            .await
            .unwrap();

        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].time.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(candles[1].close, 185.5);
    }

    #[tokio::test]
    async fn test_candles_no_data() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stock/candle"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "s": "no_data" })))
            .mount(&server)
            .await;

        let result = client_for(&server).await.candles("AAPL", TimeRange::Day).await;
        assert_eq!(result, Err(Unavailable::NoData("AAPL".to_string())));
    }

    #[test]
    fn test_mismatched_candle_arrays() {
        let response = CandleResponse {
            s: "ok".to_string(),
            t: vec![1, 2],
            o: vec![1.0, 2.0],
            h: vec![1.0, 2.0],
            l: vec![1.0],
            c: vec![1.0, 2.0],
            v: vec![1.0, 2.0],
        };
        assert!(matches!(
            response.into_candles("AAPL"),
            Err(Unavailable::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_host() {
        // Nothing listens on port 9 locally
        let client = FinnhubClient::new("k").with_base_url("http://127.0.0.1:9");
        assert!(matches!(
            client.quote("AAPL").await,
            Err(Unavailable::Network(_))
        ));
    }
}
