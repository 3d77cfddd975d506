//! Core data types for the AlphaTrade simulator.
//!
//! Wire names follow the JSON layout used by the browser build of the
//! simulator (`avgCost`, `type: "BUY"`, epoch-millisecond timestamps) so that
//! stored records can be moved between the two.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::{Error, Result};

/// A current-quote snapshot for one symbol.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    /// Current price
    pub price: f64,
    /// Absolute change since previous close
    pub change: f64,
    /// Percent change since previous close
    pub percent_change: f64,
    /// High price of the day
    pub high: f64,
    /// Low price of the day
    pub low: f64,
    /// Open price of the day
    pub open: f64,
    /// Previous close price
    pub previous_close: f64,
}

impl Quote {
    /// Short price summary handed to the commentary source.
    pub fn summary(&self) -> String {
        format!(
            "Price: {:.2}, Change: {:.2} ({:.2}%)",
            self.price, self.change, self.percent_change
        )
    }
}

/// One open-high-low-close-volume bar.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    /// Bucket start time
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Chart range selector.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum TimeRange {
    /// One day of hourly bars
    #[serde(rename = "1D")]
    Day,
    /// One month of daily bars
    #[default]
    #[serde(rename = "1M")]
    Month,
    /// One year of weekly bars
    #[serde(rename = "1Y")]
    Year,
}

impl TimeRange {
    pub const ALL: [TimeRange; 3] = [TimeRange::Day, TimeRange::Month, TimeRange::Year];

    /// Finnhub resolution code for this range.
    pub fn resolution(&self) -> &'static str {
        match self {
            TimeRange::Day => "60",
            TimeRange::Month => "D",
            TimeRange::Year => "W",
        }
    }

    /// How far back the range reaches from now.
    pub fn lookback(&self) -> Duration {
        match self {
            TimeRange::Day => Duration::days(1),
            TimeRange::Month => Duration::days(30),
            TimeRange::Year => Duration::days(365),
        }
    }

    /// Width of one bar.
    pub fn step(&self) -> Duration {
        match self {
            TimeRange::Day => Duration::hours(1),
            TimeRange::Month => Duration::days(1),
            TimeRange::Year => Duration::weeks(1),
        }
    }

    /// Number of bars a synthetic series for this range contains.
    pub fn point_count(&self) -> usize {
        match self {
            TimeRange::Day => 24,
            TimeRange::Month => 30,
            TimeRange::Year => 52,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::Day => "1D",
            TimeRange::Month => "1M",
            TimeRange::Year => "1Y",
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "1D" | "DAY" => Ok(TimeRange::Day),
            "1M" | "MONTH" => Ok(TimeRange::Month),
            "1Y" | "YEAR" => Ok(TimeRange::Year),
            other => Err(Error::InvalidOperation(format!(
                "Unknown time range: {other}. Expected 1D, 1M or 1Y"
            ))),
        }
    }
}

/// Trade direction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSide::Buy => f.write_str("BUY"),
            TradeSide::Sell => f.write_str("SELL"),
        }
    }
}

/// A single executed (simulated) trade. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub id: String,
    #[serde(rename = "type")]
    pub side: TradeSide,
    /// Ticker symbol (uppercase)
    pub symbol: String,
    /// Execution price per share
    pub price: f64,
    /// Number of shares
    pub quantity: u64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    /// price * quantity
    pub total: f64,
}

impl Transaction {
    /// Build a transaction executed now.
    ///
    /// Rejects an empty symbol, a zero quantity, and a price that is not a
    /// finite positive number.
    pub fn new(side: TradeSide, symbol: &str, price: f64, quantity: u64) -> Result<Self> {
        Self::at(side, symbol, price, quantity, Utc::now())
    }

    /// Build a transaction with an explicit execution time.
    pub fn at(
        side: TradeSide,
        symbol: &str,
        price: f64,
        quantity: u64,
        timestamp: DateTime<Utc>,
    ) -> Result<Self> {
        let symbol = normalize_symbol(symbol)?;
        if quantity == 0 {
            return Err(Error::InvalidOperation(
                "Quantity must be a positive integer".to_string(),
            ));
        }
        if !price.is_finite() || price <= 0.0 {
            return Err(Error::InvalidOperation(format!("Invalid price: {price}")));
        }

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            side,
            symbol,
            price,
            quantity,
            timestamp,
            total: price * quantity as f64,
        })
    }
}

/// Trim and upper-case a ticker symbol, rejecting an empty one.
pub fn normalize_symbol(symbol: &str) -> Result<String> {
    let symbol = symbol.trim().to_uppercase();
    if symbol.is_empty() {
        return Err(Error::InvalidOperation("Symbol must not be empty".to_string()));
    }
    Ok(symbol)
}

/// A held position, derived from the transaction log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    /// Id of the BUY transaction that opened the position
    pub id: String,
    /// Stock ticker symbol (uppercase)
    pub symbol: String,
    /// Display name
    pub name: String,
    /// Number of shares held
    pub quantity: u64,
    /// Average cost per share over BUY inflows
    pub avg_cost: f64,
    /// Last observed market price (if any)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_price: Option<f64>,
}

impl Position {
    /// Open a position from the BUY transaction that created it.
    pub fn open(tx: &Transaction) -> Self {
        Self {
            id: tx.id.clone(),
            symbol: tx.symbol.clone(),
            name: tx.symbol.clone(),
            quantity: tx.quantity,
            avg_cost: tx.price,
            current_price: None,
        }
    }

    /// Calculate the total cost of this position.
    pub fn total_cost(&self) -> f64 {
        self.quantity as f64 * self.avg_cost
    }

    /// Price used for valuation: last observed, else average cost.
    pub fn valuation_price(&self) -> f64 {
        self.current_price.unwrap_or(self.avg_cost)
    }

    pub fn market_value(&self) -> f64 {
        self.quantity as f64 * self.valuation_price()
    }

    /// Unrealized gain/loss in dollars.
    pub fn unrealized_pnl(&self) -> f64 {
        (self.valuation_price() - self.avg_cost) * self.quantity as f64
    }

    /// Unrealized gain/loss percentage.
    pub fn unrealized_pnl_percent(&self) -> f64 {
        if self.avg_cost > 0.0 {
            ((self.valuation_price() - self.avg_cost) / self.avg_cost) * 100.0
        } else {
            0.0
        }
    }
}

/// Portfolio totals over all held positions.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSummary {
    pub position_count: usize,
    pub transaction_count: usize,
    pub total_cost: f64,
    pub market_value: f64,
    pub unrealized_pnl: f64,
    pub unrealized_pnl_percent: f64,
}

impl PortfolioSummary {
    pub fn from_positions<'a>(
        positions: impl IntoIterator<Item = &'a Position>,
        transaction_count: usize,
    ) -> Self {
        let mut summary = Self {
            transaction_count,
            ..Default::default()
        };
        for position in positions {
            summary.position_count += 1;
            summary.total_cost += position.total_cost();
            summary.market_value += position.market_value();
        }
        summary.unrealized_pnl = summary.market_value - summary.total_cost;
        summary.unrealized_pnl_percent = if summary.total_cost > 0.0 {
            (summary.unrealized_pnl / summary.total_cost) * 100.0
        } else {
            0.0
        };
        summary
    }
}

/// Where a piece of data came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Live,
    Simulated,
}

/// Data tagged with its origin.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Sourced<T> {
    pub data: T,
    pub origin: Origin,
}

impl<T> Sourced<T> {
    pub fn live(data: T) -> Self {
        Self {
            data,
            origin: Origin::Live,
        }
    }

    pub fn simulated(data: T) -> Self {
        Self {
            data,
            origin: Origin::Simulated,
        }
    }

    pub fn is_simulated(&self) -> bool {
        self.origin == Origin::Simulated
    }

    pub fn into_inner(self) -> T {
        self.data
    }
}

/// API response wrapper used by the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Create a successful response.
    pub fn ok(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    /// Create an error response.
    pub fn err(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_transaction_new() {
        let tx = Transaction::new(TradeSide::Buy, " aapl ", 150.0, 10).unwrap();
        assert_eq!(tx.symbol, "AAPL");
        assert_eq!(tx.total, 1500.0);
        assert!(!tx.id.is_empty());
    }

    #[test]
    fn test_transaction_rejects_bad_input() {
        assert!(matches!(
            Transaction::new(TradeSide::Buy, "  ", 150.0, 10),
            Err(Error::InvalidOperation(_))
        ));
        assert!(matches!(
            Transaction::new(TradeSide::Buy, "AAPL", 150.0, 0),
            Err(Error::InvalidOperation(_))
        ));
        assert!(matches!(
            Transaction::new(TradeSide::Sell, "AAPL", f64::NAN, 1),
            Err(Error::InvalidOperation(_))
        ));
        assert!(matches!(
            Transaction::new(TradeSide::Sell, "AAPL", -1.0, 1),
            Err(Error::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_transaction_wire_format() {
        let ts = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();
        let tx = Transaction::at(TradeSide::Sell, "TSLA", 200.0, 3, ts).unwrap();
        let value = serde_json::to_value(&tx).unwrap();

        assert_eq!(value["type"], "SELL");
        assert_eq!(value["timestamp"], 1_700_000_000_123i64);
        assert_eq!(value["total"], 600.0);

        let back: Transaction = serde_json::from_value(value).unwrap();
        assert_eq!(back, tx);
    }

    #[test]
    fn test_position_reads_browser_record() {
        let json = r#"{"id":"abc","symbol":"AAPL","name":"AAPL","quantity":10,"avgCost":150.5}"#;
        let pos: Position = serde_json::from_str(json).unwrap();
        assert_eq!(pos.avg_cost, 150.5);
        assert!(pos.current_price.is_none());
    }

    #[test]
    fn test_position_valuation() {
        let tx = Transaction::new(TradeSide::Buy, "AAPL", 150.0, 10).unwrap();
        let mut pos = Position::open(&tx);
        assert_eq!(pos.id, tx.id);

        // No market price yet: valued at cost
        assert_eq!(pos.market_value(), 1500.0);
        assert_eq!(pos.unrealized_pnl(), 0.0);

        pos.current_price = Some(175.0);
        assert_eq!(pos.market_value(), 1750.0);
        assert_eq!(pos.unrealized_pnl(), 250.0);
        assert_relative_eq!(pos.unrealized_pnl_percent(), 16.666_666, epsilon = 1e-4);
    }

    #[test]
    fn test_portfolio_summary() {
        let a = Transaction::new(TradeSide::Buy, "AAPL", 150.0, 10).unwrap();
        let b = Transaction::new(TradeSide::Buy, "GOOGL", 100.0, 5).unwrap();
        let mut aapl = Position::open(&a);
        aapl.current_price = Some(160.0);
        let googl = Position::open(&b);

        let summary = PortfolioSummary::from_positions([&aapl, &googl], 2);
        assert_eq!(summary.position_count, 2);
        assert_eq!(summary.total_cost, 2000.0);
        assert_eq!(summary.market_value, 2100.0);
        assert_eq!(summary.unrealized_pnl, 100.0);
        assert_relative_eq!(summary.unrealized_pnl_percent, 5.0);
    }

    #[test]
    fn test_time_range_parsing() {
        assert_eq!("1d".parse::<TimeRange>().unwrap(), TimeRange::Day);
        assert_eq!("1M".parse::<TimeRange>().unwrap(), TimeRange::Month);
        assert_eq!("year".parse::<TimeRange>().unwrap(), TimeRange::Year);
        assert!("5Y".parse::<TimeRange>().is_err());
        assert_eq!(serde_json::to_string(&TimeRange::Year).unwrap(), "\"1Y\"");
    }

    #[test]
    fn test_quote_summary() {
        let quote = Quote {
            price: 182.5,
            change: 1.2,
            percent_change: 0.66,
            high: 183.0,
            low: 180.0,
            open: 181.0,
            previous_close: 181.3,
        };
        assert_eq!(quote.summary(), "Price: 182.50, Change: 1.20 (0.66%)");
    }

    #[test]
    fn test_api_response() {
        let response: ApiResponse<String> = ApiResponse::ok("test".to_string());
        assert!(response.ok);
        assert_eq!(response.data, Some("test".to_string()));

        let err_response: ApiResponse<String> = ApiResponse::err("error");
        assert!(!err_response.ok);
        assert_eq!(err_response.error, Some("error".to_string()));
    }
}
