//! Portfolio ledger module.
//!
//! Provides the transaction log, the average-cost position fold, and the
//! stores they persist to.

mod fold;
mod portfolio;
mod store;

pub use fold::{apply_transaction, check_sell, replay, PositionChange, Positions};
pub use portfolio::{PortfolioLedger, POSITIONS_KEY, TRANSACTIONS_KEY};
pub use store::{FileStore, KeyValueStore, MemoryStore, StoreError};
