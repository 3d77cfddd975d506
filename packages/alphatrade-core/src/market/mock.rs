//! Synthetic market data: random quotes and random-walk candles.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;
use std::time::Duration;

use super::MarketDataSource;
use crate::types::{Candle, Quote, TimeRange};
use crate::Unavailable;

/// Price the random walk starts from.
pub const DEFAULT_START_PRICE: f64 = 150.0;

/// Per-bar volatility as a fraction of price.
const VOLATILITY: f64 = 0.02;

/// Generate a plausible quote with a price between 100 and 200.
pub fn mock_quote<R: Rng>(rng: &mut R) -> Quote {
    let price = rng.random_range(100.0..200.0);
    let change = rng.random_range(-2.5..2.5);
    let previous_close = price - change;
    let open = previous_close + rng.random_range(-1.0..1.0);

    Quote {
        price,
        change,
        percent_change: change / previous_close * 100.0,
        high: price.max(open) + rng.random_range(0.0..2.0),
        low: price.min(open) - rng.random_range(0.0..2.0),
        open,
        previous_close,
    }
}

/// Generate `count` bars of a random walk ending one `step` before `end`.
///
/// Bars are oldest first and exactly `step` apart.
pub fn mock_candles<R: Rng>(
    rng: &mut R,
    count: usize,
    start_price: f64,
    step: ChronoDuration,
    end: DateTime<Utc>,
) -> Vec<Candle> {
    let mut price = start_price;
    let mut candles = Vec::with_capacity(count);

    for i in (1..=count as i32).rev() {
        let volatility = price * VOLATILITY;
        let open = price;
        let close = price + (rng.random::<f64>() - 0.5) * volatility;
        let high = open.max(close) + rng.random::<f64>() * volatility * 0.5;
        let low = open.min(close) - rng.random::<f64>() * volatility * 0.5;
        let volume = rng.random_range(500_000..1_500_000u64) as f64;

        candles.push(Candle {
            time: end - step * i,
            open,
            high,
            low,
            close,
            volume,
        });
        price = close;
    }
    candles
}

/// Market data source that never fails.
pub struct MockMarketData {
    rng: Mutex<StdRng>,
    latency: Duration,
    start_price: f64,
}

impl MockMarketData {
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_os_rng())
    }

    /// Deterministic generator for tests and reproducible demos.
    pub fn seeded(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            rng: Mutex::new(rng),
            latency: Duration::ZERO,
            start_price: DEFAULT_START_PRICE,
        }
    }

    /// Delay every simulated response by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_start_price(mut self, start_price: f64) -> Self {
        self.start_price = start_price;
        self
    }

    pub async fn simulate_quote(&self, symbol: &str) -> Quote {
        self.delay().await;
        let quote = mock_quote(&mut *self.lock_rng());
        tracing::debug!(symbol, price = quote.price, "Simulated quote");
        quote
    }

    pub async fn simulate_candles(&self, symbol: &str, range: TimeRange) -> Vec<Candle> {
        self.delay().await;
        let candles = mock_candles(
            &mut *self.lock_rng(),
            range.point_count(),
            self.start_price,
            range.step(),
            Utc::now(),
        );
        tracing::debug!(symbol, %range, count = candles.len(), "Simulated candles");
        candles
    }

    async fn delay(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    // A panic mid-generation leaves the generator usable.
    fn lock_rng(&self) -> std::sync::MutexGuard<'_, StdRng> {
        self.rng.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MockMarketData {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketDataSource for MockMarketData {
    fn id(&self) -> &'static str {
        "MOCK"
    }

    async fn quote(&self, symbol: &str) -> Result<Quote, Unavailable> {
        Ok(self.simulate_quote(symbol).await)
    }

    async fn candles(&self, symbol: &str, range: TimeRange) -> Result<Vec<Candle>, Unavailable> {
        Ok(self.simulate_candles(symbol, range).await)
    }
}
