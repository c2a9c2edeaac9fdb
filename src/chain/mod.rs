//! Chain service: the shared, single-writer view over the blockstore, plus
//! the derived UTXO index.

pub mod utxo_set;

pub use utxo_set::UTXOSet;

use crate::core::block::Block;
use crate::core::transaction::{TXOutput, Transaction};
use crate::error::{CoinError, Result};
use crate::store::chain_store::{ChainIterator, ChainStore};
use sled::Db;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock as TokioRwLock;

///
/// Shared handle to the chain. Reads take the read lock; block application
/// (mining or appending) takes the write lock, so at any moment at most one
/// writer updates the chain and its derived UTXO index.
///
#[derive(Debug)]
pub struct ChainService(Arc<TokioRwLock<ChainStore>>);

impl Clone for ChainService {
    fn clone(&self) -> Self {
        ChainService(self.0.clone())
    }
}

impl ChainService {
    /// Creates the chain (genesis paying `genesis_address`) or opens it when
    /// it already exists.
    pub async fn initialize(genesis_address: &str) -> Result<ChainService> {
        let store = ChainStore::create(genesis_address).await?;
        Ok(ChainService(Arc::new(TokioRwLock::new(store))))
    }

    pub async fn open() -> Result<ChainService> {
        let store = ChainStore::open().await?;
        Ok(ChainService(Arc::new(TokioRwLock::new(store))))
    }

    pub async fn open_empty() -> Result<ChainService> {
        let store = ChainStore::open_empty().await?;
        Ok(ChainService(Arc::new(TokioRwLock::new(store))))
    }

    pub async fn get_db(&self) -> Db {
        self.0.read().await.get_db().clone()
    }

    pub async fn is_empty(&self) -> bool {
        self.0.read().await.is_empty()
    }

    pub async fn get_best_height(&self) -> Result<usize> {
        self.0.read().await.get_best_height().await
    }

    pub async fn get_tip_hash(&self) -> Vec<u8> {
        self.0.read().await.get_tip_hash().await
    }

    pub async fn get_block(&self, block_hash: &[u8]) -> Result<Option<Block>> {
        self.0.read().await.get_block(block_hash).await
    }

    pub async fn get_block_hashes(&self) -> Result<Vec<Vec<u8>>> {
        self.0.read().await.get_block_hashes().await
    }

    /// Appends a block received from the network. Serialized with mining
    /// through the write lock.
    pub async fn add_block(&self, block: &Block) -> Result<()> {
        let mut store = self.0.write().await;
        store.add_block(block).await
    }

    ///
    /// The `mine_block` function verifies every transaction against the
    /// chain, then mines a block extending the tip. Verification failures
    /// abort mining before any store write.
    ///
    pub async fn mine_block(&self, transactions: &[Transaction]) -> Result<Block> {
        for transaction in transactions {
            let is_valid = transaction.verify(self).await?;
            if !is_valid {
                return Err(CoinError::InvalidTransaction);
            }
        }
        let store = self.0.write().await;
        store.mine_block(transactions).await
    }

    pub async fn find_transaction(&self, txid: &[u8]) -> Result<Option<Transaction>> {
        self.0.read().await.find_transaction(txid).await
    }

    /// Full-chain UTXO projection, used to (re)build the index.
    pub async fn find_utxo(&self) -> Result<HashMap<String, Vec<TXOutput>>> {
        self.0.read().await.find_utxo().await
    }

    pub async fn iterator(&self) -> ChainIterator {
        self.0.read().await.iterator().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::isolated_store;
    use crate::wallet::Wallet;

    fn generate_test_address() -> String {
        let wallet = Wallet::new().expect("Failed to create test wallet");
        let address = wallet.get_address().expect("Failed to get wallet address");
        address.as_str().to_string()
    }

    #[tokio::test]
    async fn test_initialize_and_height() {
        let _env = isolated_store();
        let chain = ChainService::initialize(&generate_test_address())
            .await
            .expect("Failed to create chain");
        assert_eq!(
            chain.get_best_height().await.expect("Failed to get height"),
            1
        );
    }

    #[tokio::test]
    async fn test_mine_block_appends_to_tip() {
        let _env = isolated_store();
        let address = generate_test_address();
        let chain = ChainService::initialize(&address)
            .await
            .expect("Failed to create chain");

        let coinbase =
            Transaction::new_coinbase_tx(&address, None).expect("Failed to create coinbase tx");
        let block = chain
            .mine_block(&[coinbase])
            .await
            .expect("Failed to mine block");

        assert_eq!(block.get_height(), 2);
        assert_eq!(chain.get_tip_hash().await, block.get_hash_bytes());
    }

    #[tokio::test]
    async fn test_find_utxo_after_genesis() {
        let _env = isolated_store();
        let chain = ChainService::initialize(&generate_test_address())
            .await
            .expect("Failed to create chain");

        let utxo = chain.find_utxo().await.expect("Failed to scan");
        assert_eq!(utxo.len(), 1);
        let outputs = utxo.values().next().expect("one entry");
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].get_value(), crate::core::transaction::SUBSIDY);
    }
}
