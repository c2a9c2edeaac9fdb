use crate::config::GLOBAL_CONFIG;
use crate::core::block::Block;
use crate::core::transaction::{TXOutput, Transaction};
use crate::error::{CoinError, Result};
use data_encoding::HEXLOWER;
use sled::transaction::TransactionResult;
use sled::{Db, IVec, Tree};
use std::collections::HashMap;
use std::env::current_dir;
use std::sync::Arc;
use tokio::sync::RwLock as TokioRwLock;
use tracing::info;

const TIP_BLOCK_HASH_KEY: &str = "tip_block_hash";
const BLOCKS_TREE: &str = "blocks";

///
/// Persistent mapping `block_hash → block_bytes` plus the distinguished tip
/// pointer, stored in the `blocks` tree of a sled database. The tip's
/// `prev_block_hash` chain always reaches a block whose parent hash is all
/// zeros (genesis).
///
#[derive(Clone, Debug)]
pub struct ChainStore {
    db: Db,
    tip_hash: Arc<TokioRwLock<Vec<u8>>>,
    is_empty: bool,
}

impl ChainStore {
    /// Opens the store and seeds it with a genesis block paying the subsidy
    /// to `genesis_address` if no chain exists yet.
    pub async fn create(genesis_address: &str) -> Result<ChainStore> {
        let db = Self::open_db()?;
        let blocks_tree = Self::blocks_tree(&db)?;

        let tip = blocks_tree
            .get(TIP_BLOCK_HASH_KEY)
            .map_err(|e| CoinError::ChainStoreError(e.to_string()))?;
        let tip_hash = if let Some(tip) = tip {
            tip.to_vec()
        } else {
            let coinbase = Transaction::new_coinbase_tx(genesis_address, None)?;
            let genesis = Block::generate_genesis_block(&coinbase)?;
            Self::update_blocks_tree(&blocks_tree, &genesis)?;
            info!(
                "created chain with genesis block {}",
                HEXLOWER.encode(genesis.get_hash())
            );
            genesis.get_hash_bytes()
        };

        Ok(ChainStore {
            db,
            tip_hash: Arc::new(TokioRwLock::new(tip_hash)),
            is_empty: false,
        })
    }

    /// Opens an existing store; fails when no chain has been created.
    pub async fn open() -> Result<ChainStore> {
        let db = Self::open_db()?;
        let blocks_tree = Self::blocks_tree(&db)?;

        let tip = blocks_tree
            .get(TIP_BLOCK_HASH_KEY)
            .map_err(|e| CoinError::ChainStoreError(e.to_string()))?
            .ok_or_else(|| {
                CoinError::BlockchainNotFound(
                    "no existing chain found, create one first".to_string(),
                )
            })?;

        Ok(ChainStore {
            db,
            tip_hash: Arc::new(TokioRwLock::new(tip.to_vec())),
            is_empty: false,
        })
    }

    /// Opens a store with no chain yet; the first block received from the
    /// network seeds it.
    pub async fn open_empty() -> Result<ChainStore> {
        let db = Self::open_db()?;
        Ok(ChainStore {
            db,
            tip_hash: Arc::new(TokioRwLock::new(vec![])),
            is_empty: true,
        })
    }

    fn open_db() -> Result<Db> {
        let path = current_dir()
            .map(|dir| dir.join(GLOBAL_CONFIG.data_dir()))
            .map_err(|e| CoinError::ChainStoreError(e.to_string()))?;
        sled::open(path).map_err(|e| CoinError::ChainStoreError(e.to_string()))
    }

    fn blocks_tree(db: &Db) -> Result<Tree> {
        db.open_tree(BLOCKS_TREE)
            .map_err(|e| CoinError::ChainStoreError(e.to_string()))
    }

    // Stores the block and advances the tip pointer in one write transaction.
    fn update_blocks_tree(blocks_tree: &Tree, block: &Block) -> Result<()> {
        let block_hash = block.get_hash_bytes();
        let block_ivec = IVec::try_from(block.clone())?;
        let result: TransactionResult<(), ()> = blocks_tree.transaction(|tx_db| {
            let _ = tx_db.insert(block_hash.as_slice(), block_ivec.clone())?;
            let _ = tx_db.insert(TIP_BLOCK_HASH_KEY, block_hash.as_slice())?;
            Ok(())
        });
        result
            .map(|_| ())
            .map_err(|e| CoinError::ChainStoreError(format!("{:?}", e)))
    }

    pub fn is_empty(&self) -> bool {
        self.is_empty
    }

    pub fn get_db(&self) -> &Db {
        &self.db
    }

    pub async fn get_tip_hash(&self) -> Vec<u8> {
        self.tip_hash.read().await.clone()
    }

    async fn set_tip_hash(&self, new_tip_hash: &[u8]) {
        let mut tip_hash = self.tip_hash.write().await;
        *tip_hash = new_tip_hash.to_vec();
    }

    ///
    /// The `mine_block` function builds a block on the current tip, runs the
    /// proof-of-work search, persists the result and advances the tip.
    /// Transaction verification happens in the chain service before the
    /// store is touched.
    ///
    pub async fn mine_block(&self, transactions: &[Transaction]) -> Result<Block> {
        let best_height = self.get_best_height().await?;
        let block = Block::new_block(self.get_tip_hash().await, transactions, best_height + 1)?;

        let blocks_tree = Self::blocks_tree(&self.db)?;
        Self::update_blocks_tree(&blocks_tree, &block)?;
        self.set_tip_hash(block.get_hash()).await;
        Ok(block)
    }

    ///
    /// The `add_block` function appends a block received from the network.
    /// A block whose hash is already stored is a no-op. The stored tip only
    /// advances when the new block's height exceeds the tip height; other
    /// blocks are kept but never become tip.
    ///
    pub async fn add_block(&mut self, block: &Block) -> Result<()> {
        let blocks_tree = Self::blocks_tree(&self.db)?;

        if self.is_empty {
            Self::update_blocks_tree(&blocks_tree, block)?;
            self.set_tip_hash(block.get_hash()).await;
            self.is_empty = false;
            info!("seeded empty chain at height {}", block.get_height());
            return Ok(());
        }

        let known = blocks_tree
            .get(block.get_hash())
            .map_err(|e| CoinError::ChainStoreError(e.to_string()))?;
        if known.is_some() {
            return Ok(());
        }

        let block_bytes = block.serialize()?;
        let tip_height = self.get_best_height().await?;
        let advances_tip = block.get_height() > tip_height;

        let block_hash = block.get_hash_bytes();
        let result: TransactionResult<(), ()> = blocks_tree.transaction(|tx_db| {
            let _ = tx_db.insert(block_hash.as_slice(), block_bytes.clone())?;
            if advances_tip {
                let _ = tx_db.insert(TIP_BLOCK_HASH_KEY, block_hash.as_slice())?;
            }
            Ok(())
        });
        result.map_err(|e| CoinError::ChainStoreError(format!("{:?}", e)))?;

        if advances_tip {
            self.set_tip_hash(block.get_hash()).await;
        } else {
            info!(
                "block {} stored without advancing tip (height {} <= {})",
                HEXLOWER.encode(block.get_hash()),
                block.get_height(),
                tip_height
            );
        }
        Ok(())
    }

    pub async fn get_best_height(&self) -> Result<usize> {
        if self.is_empty {
            return Ok(0);
        }
        let blocks_tree = Self::blocks_tree(&self.db)?;
        let tip_block_bytes = blocks_tree
            .get(self.get_tip_hash().await)
            .map_err(|e| CoinError::ChainStoreError(e.to_string()))?
            .ok_or_else(|| CoinError::ChainStoreError("tip is invalid".to_string()))?;
        let tip_block = Block::deserialize(tip_block_bytes.as_ref())?;
        Ok(tip_block.get_height())
    }

    pub async fn get_block(&self, block_hash: &[u8]) -> Result<Option<Block>> {
        let blocks_tree = Self::blocks_tree(&self.db)?;
        let block_bytes = blocks_tree
            .get(block_hash)
            .map_err(|e| CoinError::ChainStoreError(e.to_string()))?;
        match block_bytes {
            Some(bytes) => Ok(Some(Block::deserialize(bytes.as_ref())?)),
            None => Ok(None),
        }
    }

    /// All block hashes from tip back to genesis, newest first.
    pub async fn get_block_hashes(&self) -> Result<Vec<Vec<u8>>> {
        let mut iterator = self.iterator().await;
        let mut hashes = vec![];
        while let Some(block) = iterator.next() {
            hashes.push(block.get_hash_bytes());
        }
        Ok(hashes)
    }

    pub async fn find_transaction(&self, txid: &[u8]) -> Result<Option<Transaction>> {
        let mut iterator = self.iterator().await;
        while let Some(block) = iterator.next() {
            for transaction in block.get_transactions() {
                if txid.eq(transaction.get_id()) {
                    return Ok(Some(transaction.clone()));
                }
            }
        }
        Ok(None)
    }

    ///
    /// The `find_utxo` function scans the whole chain from tip to genesis and
    /// returns, per transaction id, the outputs never referenced by any
    /// input. Spends always reference deeper blocks, so inputs are seen
    /// before the outputs they consume.
    ///
    pub async fn find_utxo(&self) -> Result<HashMap<String, Vec<TXOutput>>> {
        let mut utxo: HashMap<String, Vec<TXOutput>> = HashMap::new();
        let mut spent_txos: HashMap<String, Vec<i64>> = HashMap::new();

        let mut iterator = self.iterator().await;
        while let Some(block) = iterator.next() {
            for tx in block.get_transactions() {
                let txid_hex = tx.get_tx_id_hex();
                let spent_indexes = spent_txos.get(&txid_hex).cloned().unwrap_or_default();

                for (out_index, out) in tx.get_vout().iter().enumerate() {
                    if spent_indexes.contains(&(out_index as i64)) {
                        continue;
                    }
                    utxo.entry(txid_hex.clone()).or_default().push(out.clone());
                }

                if tx.not_coinbase() {
                    for vin in tx.get_vin() {
                        spent_txos
                            .entry(vin.get_input_tx_id_hex())
                            .or_default()
                            .push(vin.get_vout());
                    }
                }
            }
        }
        Ok(utxo)
    }

    pub async fn iterator(&self) -> ChainIterator {
        ChainIterator {
            db: self.db.clone(),
            current_hash: self.get_tip_hash().await,
        }
    }
}

/// Walks the chain from the tip towards genesis.
pub struct ChainIterator {
    db: Db,
    current_hash: Vec<u8>,
}

impl ChainIterator {
    pub fn next(&mut self) -> Option<Block> {
        let blocks_tree = self.db.open_tree(BLOCKS_TREE).ok()?;
        let data = blocks_tree.get(self.current_hash.as_slice()).ok()??;
        let block = Block::deserialize(data.as_ref()).ok()?;
        self.current_hash = block.get_prev_block_hash().to_vec();
        Some(block)
    }
}
