use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use alloy_primitives::Address;
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::types::Transaction;

/// Address-indexed accumulator of matched transactions, plus the scan cursor
///
/// The map and the cursor are synchronized independently: reading the cursor never
/// waits on map traffic
#[derive(Debug, Default)]
pub struct TransactionStore {
    txs: Mutex<HashMap<Address, Vec<Transaction>>>,

    /// Last fully processed block
    cursor: AtomicU64,
}

impl TransactionStore {
    pub fn new(cursor: u64) -> Self {
        Self {
            txs: Default::default(),
            cursor: AtomicU64::new(cursor),
        }
    }

    /// Appends to the entry for `address`, creating it if needed. Arrival order is kept
    /// and nothing is deduplicated
    pub async fn append(&self, address: Address, txs: Vec<Transaction>) {
        if txs.is_empty() {
            return;
        }

        trace!(%address, count = txs.len(), "append");
        self.txs.lock().await.entry(address).or_default().extend(txs);
    }

    /// Removes and returns everything stored for `address`
    pub async fn drain(&self, address: &Address) -> Vec<Transaction> {
        let txs = self.txs.lock().await.remove(address).unwrap_or_default();
        debug!(%address, count = txs.len(), "drain");
        txs
    }

    pub fn cursor(&self) -> u64 {
        self.cursor.load(Ordering::Acquire)
    }

    pub fn set_cursor(&self, block: u64) {
        self.cursor.store(block, Ordering::Release);
    }

    #[cfg(test)]
    pub(crate) async fn lock_index(
        &self,
    ) -> tokio::sync::MutexGuard<'_, HashMap<Address, Vec<Transaction>>> {
        self.txs.lock().await
    }
}
