use crate::core::transaction::Transaction;
use crate::error::{CoinError, Result};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::warn;

/// Upper bound on the in-transit queue; hashes beyond it are dropped.
pub const MAX_BLOCKS_IN_TRANSIT: usize = 1024;

///
/// In-memory staging area for unconfirmed transactions, keyed by
/// hex-encoded transaction id. Not persisted; reset on restart.
///
pub struct MemoryPool {
    inner: RwLock<HashMap<String, Transaction>>,
}

impl MemoryPool {
    pub fn new() -> MemoryPool {
        MemoryPool {
            inner: RwLock::new(HashMap::new()),
        }
    }

    pub fn contains(&self, txid_hex: &str) -> Result<bool> {
        let inner = self
            .inner
            .read()
            .map_err(|e| CoinError::PoisonedLockError(e.to_string()))?;
        Ok(inner.contains_key(txid_hex))
    }

    pub fn add(&self, tx: Transaction) -> Result<()> {
        let txid_hex = tx.get_tx_id_hex();
        self.inner
            .write()
            .map_err(|e| CoinError::PoisonedLockError(e.to_string()))?
            .insert(txid_hex, tx);
        Ok(())
    }

    pub fn get(&self, txid_hex: &str) -> Result<Option<Transaction>> {
        let inner = self
            .inner
            .read()
            .map_err(|e| CoinError::PoisonedLockError(e.to_string()))?;
        Ok(inner.get(txid_hex).cloned())
    }

    pub fn remove(&self, tx: &Transaction) -> Result<Option<Transaction>> {
        let txid_hex = tx.get_tx_id_hex();
        let mut inner = self
            .inner
            .write()
            .map_err(|e| CoinError::PoisonedLockError(e.to_string()))?;
        Ok(inner.remove(txid_hex.as_str()))
    }

    /// Snapshot of the pool contents in unspecified order.
    pub fn get_all(&self) -> Result<Vec<Transaction>> {
        let inner = self
            .inner
            .read()
            .map_err(|e| CoinError::PoisonedLockError(e.to_string()))?;
        Ok(inner.values().cloned().collect())
    }

    pub fn len(&self) -> Result<usize> {
        let inner = self
            .inner
            .read()
            .map_err(|e| CoinError::PoisonedLockError(e.to_string()))?;
        Ok(inner.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl Default for MemoryPool {
    fn default() -> Self {
        Self::new()
    }
}

///
/// Queue of block hashes awaiting download during chain catch-up. One
/// representation only: assigned wholesale from an `inv`, consumed from the
/// front. Bounded; overflowing hashes are dropped and the peer re-announces
/// them on the next round.
///
pub struct BlockInTransit {
    inner: RwLock<Vec<Vec<u8>>>,
}

impl BlockInTransit {
    pub fn new() -> BlockInTransit {
        BlockInTransit {
            inner: RwLock::new(vec![]),
        }
    }

    /// Replaces the queue contents with `blocks`, truncated to the bound.
    pub fn set_blocks(&self, blocks: &[Vec<u8>]) -> Result<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|e| CoinError::PoisonedLockError(e.to_string()))?;
        inner.clear();
        let keep = blocks.len().min(MAX_BLOCKS_IN_TRANSIT);
        if keep < blocks.len() {
            warn!(
                "in-transit queue full, dropping {} block hash(es)",
                blocks.len() - keep
            );
        }
        inner.extend(blocks[..keep].iter().cloned());
        Ok(())
    }

    pub fn pop_front(&self) -> Result<Option<Vec<u8>>> {
        let mut inner = self
            .inner
            .write()
            .map_err(|e| CoinError::PoisonedLockError(e.to_string()))?;
        if inner.is_empty() {
            Ok(None)
        } else {
            Ok(Some(inner.remove(0)))
        }
    }

    pub fn clear(&self) -> Result<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|e| CoinError::PoisonedLockError(e.to_string()))?;
        inner.clear();
        Ok(())
    }

    pub fn len(&self) -> Result<usize> {
        let inner = self
            .inner
            .read()
            .map_err(|e| CoinError::PoisonedLockError(e.to_string()))?;
        Ok(inner.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl Default for BlockInTransit {
    fn default() -> Self {
        Self::new()
    }
}
