use crate::chain::ChainService;
use crate::core::block::Block;
use crate::core::transaction::TXOutput;
use crate::crypto::pub_key_hash_from_address;
use crate::error::{CoinError, Result};
use crate::wallet::WalletAddress;
use data_encoding::HEXLOWER;
use sled::Tree;
use std::collections::HashMap;
use tracing::debug;

const UTXO_TREE: &str = "chainstate";

///
/// Persistent secondary index `txid → unspent outputs`, derived from the
/// chain. Only outputs never referenced by any input appear; entries whose
/// output list becomes empty are removed.
///
pub struct UTXOSet {
    chain: ChainService,
}

impl UTXOSet {
    pub fn new(chain: ChainService) -> UTXOSet {
        UTXOSet { chain }
    }

    pub fn get_chain(&self) -> &ChainService {
        &self.chain
    }

    async fn utxo_tree(&self) -> Result<Tree> {
        self.chain
            .get_db()
            .await
            .open_tree(UTXO_TREE)
            .map_err(|e| CoinError::UtxoStoreError(e.to_string()))
    }

    fn decode_outputs(bytes: &[u8]) -> Result<Vec<TXOutput>> {
        bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map(|(outs, _)| outs)
            .map_err(|e| CoinError::TransactionDeserializationError(e.to_string()))
    }

    fn encode_outputs(outputs: &[TXOutput]) -> Result<Vec<u8>> {
        bincode::serde::encode_to_vec(outputs, bincode::config::standard())
            .map_err(|e| CoinError::TransactionSerializationError(e.to_string()))
    }

    ///
    /// The `find_spendable_outputs` function accumulates outputs locked to
    /// `pub_key_hash` in iteration order until the running sum reaches
    /// `amount`, returning the sum and a map of txid-hex to output indices.
    /// Callers must not assume least-coins selection.
    ///
    pub async fn find_spendable_outputs(
        &self,
        pub_key_hash: &[u8],
        amount: i64,
    ) -> Result<(i64, HashMap<String, Vec<usize>>)> {
        let mut unspent_outputs: HashMap<String, Vec<usize>> = HashMap::new();
        let mut accumulated = 0;
        let utxo_tree = self.utxo_tree().await?;

        for item in utxo_tree.iter() {
            let (k, v) = item.map_err(|e| CoinError::UtxoStoreError(e.to_string()))?;
            let txid_hex = HEXLOWER.encode(k.as_ref());
            let outputs = Self::decode_outputs(v.as_ref())?;

            for (out_index, out) in outputs.iter().enumerate() {
                if out.is_locked_with_key(pub_key_hash) && accumulated < amount {
                    accumulated += out.get_value();
                    unspent_outputs
                        .entry(txid_hex.clone())
                        .or_default()
                        .push(out_index);
                }
            }
        }
        debug!(
            "selected {} output group(s) accumulating {}",
            unspent_outputs.len(),
            accumulated
        );
        Ok((accumulated, unspent_outputs))
    }

    /// All unspent outputs locked to `pub_key_hash`.
    pub async fn find_utxo(&self, pub_key_hash: &[u8]) -> Result<Vec<TXOutput>> {
        let utxo_tree = self.utxo_tree().await?;
        let mut utxos = vec![];

        for item in utxo_tree.iter() {
            let (_, v) = item.map_err(|e| CoinError::UtxoStoreError(e.to_string()))?;
            let outputs = Self::decode_outputs(v.as_ref())?;
            for out in outputs {
                if out.is_locked_with_key(pub_key_hash) {
                    utxos.push(out);
                }
            }
        }
        Ok(utxos)
    }

    /// Number of transactions with at least one unspent output.
    pub async fn count_transactions(&self) -> Result<usize> {
        let utxo_tree = self.utxo_tree().await?;
        let mut counter = 0;
        for _ in utxo_tree.iter() {
            counter += 1;
        }
        Ok(counter)
    }

    ///
    /// The `reindex` function rebuilds the index from scratch: it clears the
    /// `chainstate` tree and stores the full-chain projection produced by
    /// `ChainService::find_utxo`.
    ///
    pub async fn reindex(&self) -> Result<()> {
        let utxo_tree = self.utxo_tree().await?;
        utxo_tree
            .clear()
            .map_err(|e| CoinError::UtxoStoreError(e.to_string()))?;

        let utxo_map = self.chain.find_utxo().await?;
        debug!("reindexing {} transaction(s) with unspent outputs", utxo_map.len());

        for (txid_hex, outputs) in &utxo_map {
            let txid = HEXLOWER
                .decode(txid_hex.as_bytes())
                .map_err(|e| CoinError::TransactionIdHexDecodingError(e.to_string()))?;
            let value = Self::encode_outputs(outputs)?;
            utxo_tree
                .insert(txid.as_slice(), value)
                .map_err(|e| CoinError::UtxoStoreError(e.to_string()))?;
        }
        Ok(())
    }

    ///
    /// The `update` function applies a block incrementally. For every
    /// non-coinbase transaction it removes the spent output (by position)
    /// from the referenced entry, deleting the key once its list is empty;
    /// then it stores each transaction's outputs under its id. Applying it
    /// to an index that matches the chain up to the block's parent yields
    /// the index for the chain including the block.
    ///
    pub async fn update(&self, block: &Block) -> Result<()> {
        let utxo_tree = self.utxo_tree().await?;

        for tx in block.get_transactions() {
            if tx.not_coinbase() {
                for vin in tx.get_vin() {
                    let prev_ivec = utxo_tree
                        .get(vin.get_txid())
                        .map_err(|e| CoinError::UtxoStoreError(e.to_string()))?
                        .ok_or_else(|| {
                            CoinError::UtxoNotFoundError(format!(
                                "(update) no unspent outputs under {}",
                                vin.get_input_tx_id_hex()
                            ))
                        })?;
                    let prev_outputs = Self::decode_outputs(prev_ivec.as_ref())?;

                    let updated_outputs: Vec<TXOutput> = prev_outputs
                        .iter()
                        .enumerate()
                        .filter(|(out_index, _)| *out_index as i64 != vin.get_vout())
                        .map(|(_, out)| out.clone())
                        .collect();

                    if updated_outputs.is_empty() {
                        utxo_tree
                            .remove(vin.get_txid())
                            .map_err(|e| CoinError::UtxoStoreError(e.to_string()))?;
                    } else {
                        utxo_tree
                            .insert(vin.get_txid(), Self::encode_outputs(&updated_outputs)?)
                            .map_err(|e| CoinError::UtxoStoreError(e.to_string()))?;
                    }
                }
            }

            let new_outputs: Vec<TXOutput> = tx.get_vout().to_vec();
            utxo_tree
                .insert(tx.get_id(), Self::encode_outputs(&new_outputs)?)
                .map_err(|e| CoinError::UtxoStoreError(e.to_string()))?;
        }
        Ok(())
    }

    /// Sum of all unspent outputs locked to `address`.
    pub async fn get_balance(&self, address: &WalletAddress) -> Result<i64> {
        let pub_key_hash = pub_key_hash_from_address(address.as_str())?;
        let utxos = self.find_utxo(pub_key_hash.as_slice()).await?;
        Ok(utxos.iter().map(|out| out.get_value()).sum())
    }
}
