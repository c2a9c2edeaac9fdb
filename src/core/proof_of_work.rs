use crate::core::block::Block;
use crate::crypto::sha256_digest;
use crate::error::{CoinError, Result};
use data_encoding::HEXLOWER;
use num_bigint::{BigInt, Sign};
use std::borrow::Borrow;
use std::ops::ShlAssign;
use tracing::debug;

/// Network-wide difficulty: a block hash must be below `1 << (256 - TARGET_BITS)`.
pub const TARGET_BITS: i32 = 16;

const MAX_NONCE: i64 = i64::MAX;

pub struct ProofOfWork {
    block: Block,
    target: BigInt,
}

impl ProofOfWork {
    pub fn new_proof_of_work(block: Block) -> ProofOfWork {
        // target = 2^(256 - TARGET_BITS); every valid hash is strictly below it.
        let mut target = BigInt::from(1);
        target.shl_assign(256 - TARGET_BITS);
        ProofOfWork { block, target }
    }

    fn prepare_data(&self, nonce: i64) -> Result<Vec<u8>> {
        let mut data_bytes = vec![];
        data_bytes.extend(self.block.get_prev_block_hash());
        data_bytes.extend(self.block.hash_transactions()?);
        data_bytes.extend(self.block.get_timestamp().to_be_bytes());
        data_bytes.extend(TARGET_BITS.to_be_bytes());
        data_bytes.extend(nonce.to_be_bytes());
        Ok(data_bytes)
    }

    /// Iterates the nonce from zero until the candidate hash, read as a
    /// big-endian integer, falls below the target.
    pub fn run(&self) -> Result<(i64, Vec<u8>)> {
        let mut nonce = 0;
        debug!("Mining the block");
        while nonce < MAX_NONCE {
            let data = self.prepare_data(nonce)?;
            let hash = sha256_digest(data.as_slice());
            let hash_int = BigInt::from_bytes_be(Sign::Plus, hash.as_slice());

            if hash_int.lt(self.target.borrow()) {
                debug!("{}", HEXLOWER.encode(hash.as_slice()));
                return Ok((nonce, hash));
            }
            nonce += 1;
        }
        Err(CoinError::InvalidBlock("nonce space exhausted".to_string()))
    }

    /// Recomputes the hash from the stored nonce and checks that it meets the
    /// target and matches the hash recorded in the block.
    pub fn validate(block: &Block) -> Result<bool> {
        let pow = ProofOfWork::new_proof_of_work(block.clone());
        let data = pow.prepare_data(block.get_nonce())?;
        let hash = sha256_digest(data.as_slice());
        let hash_int = BigInt::from_bytes_be(Sign::Plus, hash.as_slice());
        Ok(hash_int.lt(pow.target.borrow()) && hash.as_slice().eq(block.get_hash()))
    }
}
