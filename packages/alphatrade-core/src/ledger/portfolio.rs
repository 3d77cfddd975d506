//! Portfolio ledger: the transaction log and its derived position table.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::fold::{apply_transaction, check_sell, replay, PositionChange, Positions};
use super::store::{FileStore, KeyValueStore, MemoryStore, StoreError};
use crate::config::SellPolicy;
use crate::types::{normalize_symbol, PortfolioSummary, Position, Transaction};
use crate::Result;

/// Record key for the transaction log.
pub const TRANSACTIONS_KEY: &str = "alp_transactions";
/// Record key for the position table.
pub const POSITIONS_KEY: &str = "alp_assets";

/// Ledger over a key-value store.
///
/// Every operation holds one async mutex for its whole read-modify-write, so
/// concurrent callers are serialized and readers never see a log and a
/// position table from different generations.
pub struct PortfolioLedger {
    store: Arc<dyn KeyValueStore>,
    policy: SellPolicy,
    lock: Mutex<()>,
}

impl PortfolioLedger {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            policy: SellPolicy::default(),
            lock: Mutex::new(()),
        }
    }

    /// Ledger persisted under `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(FileStore::new(dir)))
    }

    /// Create an in-memory ledger (no persistence).
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub fn with_policy(mut self, policy: SellPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> SellPolicy {
        self.policy
    }

    /// All transactions, most recent first.
    pub async fn list_transactions(&self) -> Result<Vec<Transaction>> {
        let _guard = self.lock.lock().await;
        self.load_transactions().await
    }

    /// Held positions keyed by symbol.
    pub async fn list_positions(&self) -> Result<Positions> {
        let _guard = self.lock.lock().await;
        self.load_positions().await
    }

    /// Append a transaction and fold it into the position table.
    ///
    /// Under [`SellPolicy::Strict`] a SELL for more than the held quantity is
    /// rejected and nothing is written.
    pub async fn record_transaction(&self, tx: Transaction) -> Result<PositionChange> {
        let _guard = self.lock.lock().await;

        let mut transactions = self.load_transactions().await?;
        let mut positions = self.load_positions().await?;

        if self.policy == SellPolicy::Strict {
            check_sell(&positions, &tx)?;
        }

        let change = apply_transaction(&mut positions, &tx)?;
        debug!(
            id = %tx.id,
            side = %tx.side,
            symbol = %tx.symbol,
            quantity = tx.quantity,
            price = tx.price,
            ?change,
            "Recording transaction"
        );
        transactions.insert(0, tx);

        self.persist(&transactions, &positions).await?;
        Ok(change)
    }

    /// Delete both records.
    pub async fn clear(&self) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.store
            .remove_batch(&[TRANSACTIONS_KEY, POSITIONS_KEY])
            .await?;
        info!("Ledger cleared");
        Ok(())
    }

    /// Store last observed prices on held positions.
    ///
    /// Symbols are normalized like transaction symbols; those that are not
    /// held are skipped. Returns how many positions were updated.
    pub async fn mark_prices(&self, prices: &[(String, f64)]) -> Result<usize> {
        let _guard = self.lock.lock().await;

        let mut positions = self.load_positions().await?;
        let mut updated = 0;
        for (symbol, price) in prices {
            let Ok(symbol) = normalize_symbol(symbol) else {
                continue;
            };
            if let Some(pos) = positions.get_mut(&symbol) {
                pos.current_price = Some(*price);
                updated += 1;
            }
        }

        if updated > 0 {
            let content = serde_json::to_string_pretty(&positions)?;
            self.store.put_batch(&[(POSITIONS_KEY, content)]).await?;
        }
        Ok(updated)
    }

    /// Recompute the position table from the log and store it.
    ///
    /// Last observed prices survive for positions that are still held.
    pub async fn rebuild_positions(&self) -> Result<Positions> {
        let _guard = self.lock.lock().await;

        let transactions = self.load_transactions().await?;
        let previous = self.load_positions().await?;
        let mut rebuilt = replay(&transactions)?;
        for (symbol, pos) in rebuilt.iter_mut() {
            pos.current_price = previous.get(symbol).and_then(|p| p.current_price);
        }

        let content = serde_json::to_string_pretty(&rebuilt)?;
        self.store.put_batch(&[(POSITIONS_KEY, content)]).await?;
        info!(
            positions = rebuilt.len(),
            transactions = transactions.len(),
            "Rebuilt position table from transaction log"
        );
        Ok(rebuilt)
    }

    /// Totals across the position table.
    pub async fn summary(&self) -> Result<PortfolioSummary> {
        let _guard = self.lock.lock().await;
        let transactions = self.load_transactions().await?;
        let positions = self.load_positions().await?;
        Ok(PortfolioSummary::from_positions(
            positions.values(),
            transactions.len(),
        ))
    }

    async fn load_transactions(&self) -> Result<Vec<Transaction>> {
        let Some(content) = self.store.get(TRANSACTIONS_KEY).await? else {
            return Ok(Vec::new());
        };
        let transactions = serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
            key: TRANSACTIONS_KEY.to_string(),
            source,
        })?;
        Ok(transactions)
    }

    async fn load_positions(&self) -> Result<Positions> {
        let Some(content) = self.store.get(POSITIONS_KEY).await? else {
            return Ok(Positions::new());
        };
        let corrupt = |source| StoreError::Corrupt {
            key: POSITIONS_KEY.to_string(),
            source,
        };
        let data: serde_json::Value = serde_json::from_str(&content).map_err(corrupt)?;

        // Browser records store the table as a list
        if data.is_array() {
            let list: Vec<Position> = serde_json::from_value(data).map_err(corrupt)?;
            return Ok(list.into_iter().map(|p| (p.symbol.clone(), p)).collect());
        }

        Ok(serde_json::from_value(data).map_err(corrupt)?)
    }

    async fn persist(&self, transactions: &[Transaction], positions: &Positions) -> Result<()> {
        let records = [
            (TRANSACTIONS_KEY, serde_json::to_string_pretty(transactions)?),
            (POSITIONS_KEY, serde_json::to_string_pretty(positions)?),
        ];
        self.store.put_batch(&records).await?;
        Ok(())
    }
}
