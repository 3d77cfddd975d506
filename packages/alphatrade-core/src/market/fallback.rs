//! Degrade to simulated data when the live source is unavailable.

use std::sync::Arc;
use tracing::warn;

use super::mock::MockMarketData;
use super::{MarketDataSource, Sourced};
use crate::types::{Candle, Quote, TimeRange};

/// Wraps an optional live source; every call resolves to data.
pub struct FallbackMarketData {
    primary: Option<Arc<dyn MarketDataSource>>,
    mock: MockMarketData,
}

impl FallbackMarketData {
    pub fn new(primary: Option<Arc<dyn MarketDataSource>>, mock: MockMarketData) -> Self {
        Self { primary, mock }
    }

    /// Simulated data only.
    pub fn simulated(mock: MockMarketData) -> Self {
        Self::new(None, mock)
    }

    pub fn live(primary: Arc<dyn MarketDataSource>) -> Self {
        Self::new(Some(primary), MockMarketData::new())
    }

    pub fn is_live(&self) -> bool {
        self.primary.is_some()
    }

    pub async fn quote(&self, symbol: &str) -> Sourced<Quote> {
        if let Some(primary) = &self.primary {
            match primary.quote(symbol).await {
                Ok(quote) => return Sourced::live(quote),
                Err(e) => warn!(
                    source = primary.id(),
                    symbol,
                    error = %e,
                    "Quote unavailable, falling back to simulated data"
                ),
            }
        }
        Sourced::simulated(self.mock.simulate_quote(symbol).await)
    }

    pub async fn candles(&self, symbol: &str, range: TimeRange) -> Sourced<Vec<Candle>> {
        if let Some(primary) = &self.primary {
            match primary.candles(symbol, range).await {
                Ok(candles) => return Sourced::live(candles),
                Err(e) => warn!(
                    source = primary.id(),
                    symbol,
                    %range,
                    error = %e,
                    "Candles unavailable, falling back to simulated data"
                ),
            }
        }
        Sourced::simulated(self.mock.simulate_candles(symbol, range).await)
    }
}
