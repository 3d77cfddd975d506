//! AlphaTrade Core - Simulated stock trading library.
//!
//! This crate provides the building blocks of the AlphaTrade simulator:
//!
//! - **Market data**: Finnhub quotes and candles with a random-walk fallback
//! - **Commentary**: Gemini-generated analysis with a canned fallback
//! - **Portfolio ledger**: Append-only transaction log with average-cost positions
//! - **Trading desk**: The three wired together from explicit configuration
//!
//! # Example
//!
//! ```rust,no_run
//! use alphatrade_core::{AppConfig, TradeSide, TradingDesk};
//!
//! # async fn run() -> alphatrade_core::Result<()> {
//! let config = AppConfig::load(None)?;
//! let desk = TradingDesk::from_config(&config);
//!
//! // Buy 10 shares at the current market price
//! let tx = desk.trade(TradeSide::Buy, "AAPL", 10).await?;
//! println!("Bought {} {} @ {:.2}", tx.quantity, tx.symbol, tx.price);
//!
//! for (symbol, position) in desk.ledger().list_positions().await? {
//!     println!("{symbol}: {} @ {:.2}", position.quantity, position.avg_cost);
//! }
//! # Ok(())
//! # }
//! ```

pub mod commentary;
pub mod config;
pub mod desk;
pub mod ledger;
pub mod market;
pub mod types;

// Re-export commonly used types
pub use types::{
    normalize_symbol, ApiResponse, Candle, Origin, PortfolioSummary, Position, Quote, Sourced,
    TimeRange, TradeSide, Transaction,
};

// Re-export main functionality
pub use commentary::{CommentarySource, FallbackCommentary, GeminiClient};
pub use config::{AppConfig, Mode, SellPolicy};
pub use desk::{MarketSnapshot, TradingDesk};
pub use ledger::{
    apply_transaction, replay, FileStore, KeyValueStore, MemoryStore, PortfolioLedger, Positions,
    StoreError,
};
pub use market::{FallbackMarketData, FinnhubClient, MarketDataSource, MockMarketData};

/// Error types for alphatrade-core operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Persistence unavailable: {0}")]
    Persistence(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Insufficient holdings for {symbol}: hold {held}, requested {requested}")]
    InsufficientHoldings {
        symbol: String,
        held: u64,
        requested: u64,
    },
}

/// Result type for alphatrade-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a live collaborator could not serve a request.
///
/// Live sources return this instead of failing hard; the fallback wrappers
/// turn it into simulated data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Unavailable {
    #[error("request failed: {0}")]
    Network(String),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("no data for {0}")]
    NoData(String),
}
