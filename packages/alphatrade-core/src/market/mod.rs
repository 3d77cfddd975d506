//! Market data module.
//!
//! Live quotes and candles come from Finnhub. When no key is configured or a
//! request fails, [`FallbackMarketData`] serves random-walk data from
//! [`MockMarketData`] instead.

mod fallback;
mod finnhub;
mod mock;

use async_trait::async_trait;

use crate::types::{Candle, Quote, TimeRange};
use crate::Unavailable;

pub use fallback::FallbackMarketData;
pub use finnhub::FinnhubClient;
pub use mock::{mock_candles, mock_quote, MockMarketData};
pub use crate::types::{Origin, Sourced};

/// A source of quotes and candles that may be unavailable.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Short identifier used in logs.
    fn id(&self) -> &'static str;

    async fn quote(&self, symbol: &str) -> Result<Quote, Unavailable>;

    /// Bars for `range`, oldest first.
    async fn candles(&self, symbol: &str, range: TimeRange) -> Result<Vec<Candle>, Unavailable>;
}
