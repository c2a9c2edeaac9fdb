use crate::core::merkle::MerkleTree;
use crate::core::proof_of_work::ProofOfWork;
use crate::core::transaction::Transaction;
use crate::error::{CoinError, Result};
use serde::{Deserialize, Serialize};
use sled::IVec;
use std::time::{SystemTime, UNIX_EPOCH};

/// `prev_block_hash` of the genesis block: 32 zero bytes.
pub fn genesis_prev_hash() -> Vec<u8> {
    vec![0u8; 32]
}

pub(crate) fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[derive(Clone, Serialize, Deserialize)]
pub struct BlockHeader {
    timestamp: i64,
    prev_block_hash: Vec<u8>,
    hash: Vec<u8>,
    nonce: i64,
    height: usize,
}

/// A block: header plus the ordered transactions it commits to. The last
/// transaction is the coinbase. `hash` is the proof-of-work solution over
/// `prev_block_hash ‖ merkle_root ‖ timestamp ‖ target_bits ‖ nonce`.
#[derive(Clone, Serialize, Deserialize)]
pub struct Block {
    header: BlockHeader,
    transactions: Vec<Transaction>,
}

impl Block {
    pub fn new_block(
        prev_block_hash: Vec<u8>,
        transactions: &[Transaction],
        height: usize,
    ) -> Result<Block> {
        let header = BlockHeader {
            timestamp: current_timestamp(),
            prev_block_hash,
            hash: vec![], // filled by the proof-of-work search
            nonce: 0,
            height,
        };
        let mut block = Block {
            header,
            transactions: transactions.to_vec(),
        };
        let pow = ProofOfWork::new_proof_of_work(block.clone());
        let (nonce, hash) = pow.run()?;
        block.header.nonce = nonce;
        block.header.hash = hash;
        Ok(block)
    }

    pub fn generate_genesis_block(coinbase: &Transaction) -> Result<Block> {
        Block::new_block(genesis_prev_hash(), &[coinbase.clone()], 1)
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| CoinError::BlockSerializationError(e.to_string()))
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Block> {
        bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map(|(block, _)| block)
            .map_err(|e| CoinError::BlockDeserializationError(e.to_string()))
    }

    pub fn get_transactions(&self) -> &[Transaction] {
        self.transactions.as_slice()
    }

    pub fn get_prev_block_hash(&self) -> &[u8] {
        self.header.prev_block_hash.as_slice()
    }

    pub fn get_hash(&self) -> &[u8] {
        self.header.hash.as_slice()
    }

    pub fn get_hash_bytes(&self) -> Vec<u8> {
        self.header.hash.clone()
    }

    pub fn get_timestamp(&self) -> i64 {
        self.header.timestamp
    }

    pub fn get_nonce(&self) -> i64 {
        self.header.nonce
    }

    pub fn get_height(&self) -> usize {
        self.header.height
    }

    /// Merkle root over the ordered serializations of the block's
    /// transactions. Swapping any two transactions changes the root and
    /// therefore the block hash.
    pub fn hash_transactions(&self) -> Result<Vec<u8>> {
        let mut serialized = Vec::with_capacity(self.transactions.len());
        for transaction in &self.transactions {
            serialized.push(transaction.serialize()?);
        }
        Ok(MerkleTree::new(serialized.as_slice()).root_hash().to_vec())
    }
}

impl TryFrom<Block> for IVec {
    type Error = CoinError;
    fn try_from(block: Block) -> Result<Self> {
        let bytes = block.serialize()?;
        Ok(Self::from(bytes))
    }
}
