//! The position fold: how one transaction changes the position table.

use std::collections::BTreeMap;

use crate::types::{Position, TradeSide, Transaction};
use crate::{Error, Result};

/// Position table keyed by symbol.
pub type Positions = BTreeMap<String, Position>;

/// What applying a transaction did to the position table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionChange {
    Opened,
    Increased,
    Reduced,
    Closed,
    /// SELL of a symbol that is not held
    Untouched,
}

/// Fold one transaction into the position table.
///
/// BUY re-averages the cost basis over the combined quantity. SELL reduces
/// the quantity and leaves the cost basis alone; a SELL that reaches zero or
/// beyond removes the position.
///
/// A BUY whose combined quantity does not fit in a `u64` is rejected and the
/// table is left unchanged.
pub fn apply_transaction(positions: &mut Positions, tx: &Transaction) -> Result<PositionChange> {
    match tx.side {
        TradeSide::Buy => {
            let Some(pos) = positions.get_mut(&tx.symbol) else {
                positions.insert(tx.symbol.clone(), Position::open(tx));
                return Ok(PositionChange::Opened);
            };
            let total_quantity = pos.quantity.checked_add(tx.quantity).ok_or_else(|| {
                Error::InvalidOperation(format!(
                    "Position in {} would exceed {} shares",
                    tx.symbol,
                    u64::MAX
                ))
            })?;
            pos.avg_cost = (pos.avg_cost * pos.quantity as f64 + tx.price * tx.quantity as f64)
                / total_quantity as f64;
            pos.quantity = total_quantity;
            Ok(PositionChange::Increased)
        }
        TradeSide::Sell => {
            let Some(pos) = positions.get_mut(&tx.symbol) else {
                return Ok(PositionChange::Untouched);
            };
            if tx.quantity >= pos.quantity {
                positions.remove(&tx.symbol);
                Ok(PositionChange::Closed)
            } else {
                pos.quantity -= tx.quantity;
                Ok(PositionChange::Reduced)
            }
        }
    }
}

/// Rebuild the position table from a log stored most-recent-first.
pub fn replay(transactions: &[Transaction]) -> Result<Positions> {
    let mut positions = Positions::new();
    for tx in transactions.iter().rev() {
        apply_transaction(&mut positions, tx)?;
    }
    Ok(positions)
}

/// Reject a SELL for more shares than are held.
pub fn check_sell(positions: &Positions, tx: &Transaction) -> Result<()> {
    if tx.side != TradeSide::Sell {
        return Ok(());
    }
    let held = positions.get(&tx.symbol).map(|p| p.quantity).unwrap_or(0);
    if tx.quantity > held {
        return Err(Error::InsufficientHoldings {
            symbol: tx.symbol.clone(),
            held,
            requested: tx.quantity,
        });
    }
    Ok(())
}
