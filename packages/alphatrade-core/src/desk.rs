//! Trading desk: market data, commentary and the ledger behind one handle.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::commentary::{CommentarySource, FallbackCommentary, GeminiClient};
use crate::config::{AppConfig, Mode};
use crate::ledger::{PortfolioLedger, Positions};
use crate::market::{FallbackMarketData, FinnhubClient, MarketDataSource, MockMarketData};
use crate::types::{
    normalize_symbol, Candle, Origin, Quote, Sourced, TimeRange, TradeSide, Transaction,
};
use crate::Result;

/// Quote and candles for one symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub symbol: String,
    pub range: TimeRange,
    pub quote: Quote,
    pub candles: Vec<Candle>,
    /// `Simulated` if either part came from the generator
    pub origin: Origin,
}

pub struct TradingDesk {
    market: FallbackMarketData,
    commentary: FallbackCommentary,
    ledger: PortfolioLedger,
    mode: Mode,
}

impl TradingDesk {
    pub fn new(
        market: FallbackMarketData,
        commentary: FallbackCommentary,
        ledger: PortfolioLedger,
    ) -> Self {
        let mode = if market.is_live() || commentary.is_live() {
            Mode::Live
        } else {
            Mode::Simulated
        };
        Self {
            market,
            commentary,
            ledger,
            mode,
        }
    }

    /// Build every component from `config`.
    pub fn from_config(config: &AppConfig) -> Self {
        let latency = config.simulated_latency();

        let finnhub = config.finnhub_key().map(|key| {
            Arc::new(FinnhubClient::new(key).with_base_url(config.finnhub_base_url.clone()))
                as Arc<dyn MarketDataSource>
        });
        let market = FallbackMarketData::new(finnhub, MockMarketData::new().with_latency(latency));

        let gemini = config.gemini_key().map(|key| {
            Arc::new(
                GeminiClient::new(key)
                    .with_base_url(config.gemini_base_url.clone())
                    .with_model(config.gemini_model.clone()),
            ) as Arc<dyn CommentarySource>
        });
        let commentary = FallbackCommentary::new(gemini).with_latency(latency);

        let ledger = PortfolioLedger::open(config.data_dir.clone()).with_policy(config.sell_policy);

        let desk = Self::new(market, commentary, ledger);
        info!(
            mode = ?desk.mode,
            market = if desk.market.is_live() { "finnhub" } else { "simulated" },
            commentary = if desk.commentary.is_live() { "gemini" } else { "simulated" },
            data_dir = %config.data_dir.display(),
            "Trading desk ready"
        );
        desk
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn ledger(&self) -> &PortfolioLedger {
        &self.ledger
    }

    pub async fn quote(&self, symbol: &str) -> Result<Sourced<Quote>> {
        let symbol = normalize_symbol(symbol)?;
        Ok(self.market.quote(&symbol).await)
    }

    pub async fn candles(&self, symbol: &str, range: TimeRange) -> Result<Sourced<Vec<Candle>>> {
        let symbol = normalize_symbol(symbol)?;
        Ok(self.market.candles(&symbol, range).await)
    }

    /// Load the quote, then the candles, for `symbol`.
    pub async fn search(&self, symbol: &str, range: TimeRange) -> Result<MarketSnapshot> {
        let symbol = normalize_symbol(symbol)?;
        let quote = self.market.quote(&symbol).await;
        let candles = self.market.candles(&symbol, range).await;

        let origin = if quote.is_simulated() || candles.is_simulated() {
            Origin::Simulated
        } else {
            Origin::Live
        };
        Ok(MarketSnapshot {
            symbol,
            range,
            quote: quote.into_inner(),
            candles: candles.into_inner(),
            origin,
        })
    }

    /// Execute a trade at the current market price.
    pub async fn trade(&self, side: TradeSide, symbol: &str, quantity: u64) -> Result<Transaction> {
        let symbol = normalize_symbol(symbol)?;
        let quote = self.market.quote(&symbol).await.into_inner();
        let tx = Transaction::new(side, &symbol, quote.price, quantity)?;
        self.ledger.record_transaction(tx.clone()).await?;
        info!(
            side = %tx.side,
            symbol = %tx.symbol,
            quantity = tx.quantity,
            price = tx.price,
            "Trade executed"
        );
        Ok(tx)
    }

    /// Commentary on the current quote of `symbol`.
    pub async fn analyze(&self, symbol: &str) -> Result<Sourced<String>> {
        let symbol = normalize_symbol(symbol)?;
        let quote = self.market.quote(&symbol).await.into_inner();
        Ok(self.commentary.analyze(&symbol, &quote.summary()).await)
    }

    /// Fetch a quote for every held symbol and store the prices.
    pub async fn refresh_positions(&self) -> Result<Positions> {
        let positions = self.ledger.list_positions().await?;
        let quotes = join_all(positions.keys().map(|symbol| async move {
            let quote = self.market.quote(symbol).await.into_inner();
            (symbol.clone(), quote.price)
        }))
        .await;

        self.ledger.mark_prices(&quotes).await?;
        self.ledger.list_positions().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SellPolicy;
    use crate::{Error, Unavailable};
    use async_trait::async_trait;
    use chrono::Utc;

    /// Live source with a fixed price per symbol.
    struct FixedPrice(f64);

    #[async_trait]
    impl MarketDataSource for FixedPrice {
        fn id(&self) -> &'static str {
            "FIXED"
        }

        async fn quote(&self, _symbol: &str) -> std::result::Result<Quote, Unavailable> {
            Ok(Quote {
                price: self.0,
                change: 1.0,
                percent_change: 1.0,
                high: self.0,
                low: self.0,
                open: self.0,
                previous_close: self.0 - 1.0,
            })
        }

        async fn candles(
            &self,
            _symbol: &str,
            _range: TimeRange,
        ) -> std::result::Result<Vec<Candle>, Unavailable> {
            Err(Unavailable::NoData("fixed".to_string()))
        }
    }

    fn fixed_desk(price: f64) -> TradingDesk {
        TradingDesk::new(
            FallbackMarketData::new(Some(Arc::new(FixedPrice(price))), MockMarketData::seeded(1)),
            FallbackCommentary::simulated(),
            PortfolioLedger::in_memory(),
        )
    }

    fn simulated_desk() -> TradingDesk {
        TradingDesk::new(
            FallbackMarketData::simulated(MockMarketData::seeded(1)),
            FallbackCommentary::simulated(),
            PortfolioLedger::in_memory(),
        )
    }

    #[test]
    fn test_mode() {
        assert_eq!(simulated_desk().mode(), Mode::Simulated);
        assert_eq!(fixed_desk(10.0).mode(), Mode::Live);
    }

    #[tokio::test]
    async fn test_trade_uses_market_price() {
        let desk = fixed_desk(100.0);
        let tx = desk.trade(TradeSide::Buy, "aapl", 10).await.unwrap();

        assert_eq!(tx.symbol, "AAPL");
        assert_eq!(tx.price, 100.0);
        assert_eq!(tx.total, 1000.0);

        let positions = desk.ledger().list_positions().await.unwrap();
        assert_eq!(positions["AAPL"].quantity, 10);
        assert_eq!(positions["AAPL"].avg_cost, 100.0);
    }

    #[tokio::test]
    async fn test_trade_rejects_bad_input() {
        let desk = simulated_desk();
        assert!(matches!(
            desk.trade(TradeSide::Buy, "  ", 1).await,
            Err(Error::InvalidOperation(_))
        ));
        assert!(matches!(
            desk.trade(TradeSide::Buy, "AAPL", 0).await,
            Err(Error::InvalidOperation(_))
        ));
        assert!(desk.ledger().list_transactions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_strict_desk_rejects_oversell() {
        let desk = TradingDesk::new(
            FallbackMarketData::new(Some(Arc::new(FixedPrice(50.0))), MockMarketData::seeded(1)),
            FallbackCommentary::simulated(),
            PortfolioLedger::in_memory().with_policy(SellPolicy::Strict),
        );
        desk.trade(TradeSide::Buy, "AAPL", 5).await.unwrap();
        assert!(matches!(
            desk.trade(TradeSide::Sell, "AAPL", 8).await,
            Err(Error::InsufficientHoldings { .. })
        ));
    }

    #[tokio::test]
    async fn test_search_mixed_origin() {
        let desk = fixed_desk(100.0);
        let snapshot = desk.search("msft", TimeRange::Month).await.unwrap();

        assert_eq!(snapshot.symbol, "MSFT");
        assert_eq!(snapshot.quote.price, 100.0);
        // Candles fell back, so the snapshot is simulated
        assert_eq!(snapshot.candles.len(), 30);
        assert_eq!(snapshot.origin, Origin::Simulated);
    }

    #[tokio::test]
    async fn test_search_simulated_ranges() {
        let desk = simulated_desk();
        let snapshot = desk.search("AAPL", TimeRange::Day).await.unwrap();
        assert_eq!(snapshot.candles.len(), 24);
        assert!(snapshot.candles.last().unwrap().time <= Utc::now());
    }

    #[tokio::test]
    async fn test_analyze_simulated() {
        let desk = simulated_desk();
        let analysis = desk.analyze("nvda").await.unwrap();
        assert!(analysis.is_simulated());
        assert!(analysis.data.contains("NVDA"));
    }

    #[tokio::test]
    async fn test_refresh_positions_marks_prices() {
        let desk = fixed_desk(120.0);
        desk.ledger()
            .record_transaction(Transaction::new(TradeSide::Buy, "AAPL", 100.0, 10).unwrap())
            .await
            .unwrap();

        let positions = desk.refresh_positions().await.unwrap();
        assert_eq!(positions["AAPL"].current_price, Some(120.0));
        assert_eq!(positions["AAPL"].unrealized_pnl(), 200.0);
    }

    #[tokio::test]
    async fn test_from_config_defaults_to_simulated() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            data_dir: dir.path().to_path_buf(),
            ..AppConfig::default()
        };
        let desk = TradingDesk::from_config(&config);
        assert_eq!(desk.mode(), Mode::Simulated);

        desk.trade(TradeSide::Buy, "AAPL", 1).await.unwrap();
        assert!(dir.path().join("alp_transactions.json").exists());
    }
}
