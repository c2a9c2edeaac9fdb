use crate::chain::ChainService;
use crate::chain::utxo_set::UTXOSet;
use crate::crypto::{
    ecdsa_p256_sha256_sign_digest, ecdsa_p256_sha256_sign_verify, hash_pub_key,
    pub_key_hash_from_address, sha256_digest,
};
use crate::error::{CoinError, Result};
use crate::wallet::Wallet;
use data_encoding::HEXLOWER;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Fixed coinbase reward per block.
pub const SUBSIDY: i64 = 10;

/// Sentinel output index carried by the single coinbase input.
pub const COINBASE_VOUT: i64 = -1;

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct TXInput {
    txid: Vec<u8>,
    vout: i64,
    signature: Vec<u8>,
    pub_key: Vec<u8>,
}

impl TXInput {
    pub fn new(txid: &[u8], vout: i64) -> TXInput {
        TXInput {
            txid: txid.to_vec(),
            vout,
            signature: vec![],
            pub_key: vec![],
        }
    }

    pub fn get_txid(&self) -> &[u8] {
        self.txid.as_slice()
    }

    pub fn get_input_tx_id_hex(&self) -> String {
        HEXLOWER.encode(self.txid.as_slice())
    }

    pub fn get_vout(&self) -> i64 {
        self.vout
    }

    pub fn get_signature(&self) -> &[u8] {
        self.signature.as_slice()
    }

    pub fn get_pub_key(&self) -> &[u8] {
        self.pub_key.as_slice()
    }

    /// Whether this input was created by the holder of `pub_key_hash`.
    pub fn uses_key(&self, pub_key_hash: &[u8]) -> bool {
        let locking_hash = hash_pub_key(self.pub_key.as_slice());
        locking_hash.eq(pub_key_hash)
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct TXOutput {
    value: i64,
    pub_key_hash: Vec<u8>,
}

impl TXOutput {
    pub fn new(value: i64, address: &str) -> Result<TXOutput> {
        let mut output = TXOutput {
            value,
            pub_key_hash: vec![],
        };
        output.lock(address)?;
        Ok(output)
    }

    pub fn get_value(&self) -> i64 {
        self.value
    }

    pub fn get_pub_key_hash(&self) -> &[u8] {
        self.pub_key_hash.as_slice()
    }

    // Locks the output to the pubkey hash carried inside the address.
    fn lock(&mut self, address: &str) -> Result<()> {
        self.pub_key_hash = pub_key_hash_from_address(address)?;
        Ok(())
    }

    pub fn is_locked_with_key(&self, pub_key_hash: &[u8]) -> bool {
        self.pub_key_hash.eq(pub_key_hash)
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Transaction {
    id: Vec<u8>,
    vin: Vec<TXInput>,
    vout: Vec<TXOutput>,
}

impl Transaction {
    ///
    /// The `new_coinbase_tx` function creates a transaction minting the block
    /// subsidy to `to`. The single input references no prior output; its
    /// `pub_key` field carries arbitrary data, randomized when not supplied.
    ///
    pub fn new_coinbase_tx(to: &str, data: Option<Vec<u8>>) -> Result<Transaction> {
        let data = data.unwrap_or_else(|| Uuid::new_v4().as_bytes().to_vec());
        let tx_input = TXInput {
            txid: vec![],
            vout: COINBASE_VOUT,
            signature: vec![],
            pub_key: data,
        };
        let tx_output = TXOutput::new(SUBSIDY, to)?;

        let mut tx = Transaction {
            id: vec![],
            vin: vec![tx_input],
            vout: vec![tx_output],
        };
        tx.id = tx.hash()?;
        Ok(tx)
    }

    ///
    /// The `new_utxo_transaction` function constructs a transfer by selecting
    /// spendable outputs for the sender, creating inputs for them, paying the
    /// recipient, returning change when the selection overshoots, and signing
    /// every input against the chain.
    ///
    /// # Arguments
    ///
    /// * `wallet` - The sender's wallet (keys and address).
    /// * `to` - The recipient address.
    /// * `amount` - The amount to transfer.
    /// * `utxo_set` - The index used for coin selection.
    pub async fn new_utxo_transaction(
        wallet: &Wallet,
        to: &str,
        amount: i64,
        utxo_set: &UTXOSet,
    ) -> Result<Transaction> {
        let pub_key_hash = hash_pub_key(wallet.get_public_key());

        let (accumulated, valid_outputs) = utxo_set
            .find_spendable_outputs(pub_key_hash.as_slice(), amount)
            .await?;
        if accumulated < amount {
            return Err(CoinError::NotEnoughFunds);
        }

        let mut inputs = vec![];
        for (txid_hex, out_indexes) in valid_outputs {
            let txid = HEXLOWER
                .decode(txid_hex.as_bytes())
                .map_err(|e| CoinError::TransactionIdHexDecodingError(e.to_string()))?;
            for out_index in out_indexes {
                inputs.push(TXInput {
                    txid: txid.clone(),
                    vout: out_index as i64,
                    signature: vec![],
                    pub_key: wallet.get_public_key().to_vec(),
                });
            }
        }

        let mut outputs = vec![TXOutput::new(amount, to)?];
        if accumulated > amount {
            let change_addr = wallet.get_address()?;
            outputs.push(TXOutput::new(accumulated - amount, change_addr.as_str())?);
        }

        let mut tx = Transaction {
            id: vec![],
            vin: inputs,
            vout: outputs,
        };
        tx.id = tx.hash()?;
        tx.sign(utxo_set.get_chain(), wallet.get_pkcs8()).await?;
        Ok(tx)
    }

    ///
    /// `trimmed_copy` creates a copy of the transaction whose inputs carry
    /// neither signatures nor public keys. The copy is the canvas on which
    /// the per-input signing pre-image is painted.
    ///
    fn trimmed_copy(&self) -> Transaction {
        let inputs = self
            .vin
            .iter()
            .map(|input| TXInput::new(input.get_txid(), input.get_vout()))
            .collect();
        Transaction {
            id: self.id.clone(),
            vin: inputs,
            vout: self.vout.clone(),
        }
    }

    /// Collects every prior transaction referenced by this one. A reference
    /// that cannot be resolved is a fatal caller error.
    async fn resolve_prev_transactions(
        &self,
        chain: &ChainService,
        context: &str,
    ) -> Result<HashMap<String, Transaction>> {
        let mut prev_txs = HashMap::new();
        for vin in &self.vin {
            let prev_tx = chain.find_transaction(vin.get_txid()).await?.ok_or_else(|| {
                CoinError::TransactionNotFoundError(format!(
                    "({}) previous transaction {} is not correct",
                    context,
                    vin.get_input_tx_id_hex()
                ))
            })?;
            prev_txs.insert(vin.get_input_tx_id_hex(), prev_tx);
        }
        Ok(prev_txs)
    }

    ///
    /// The `sign` function signs every input with ECDSA P-256. For input *i*
    /// the pre-image is the hash of the trimmed copy in which only input *i*
    /// carries the pubkey hash of the output it spends; the pubkey slot is
    /// reset before the next input is processed.
    ///
    pub async fn sign(&mut self, chain: &ChainService, pkcs8: &[u8]) -> Result<()> {
        if self.is_coinbase() {
            return Ok(());
        }
        let prev_txs = self.resolve_prev_transactions(chain, "sign").await?;
        let mut tx_copy = self.trimmed_copy();

        for idx in 0..self.vin.len() {
            let prev_tx = prev_txs
                .get(&self.vin[idx].get_input_tx_id_hex())
                .ok_or_else(|| {
                    CoinError::TransactionNotFoundError(
                        "(sign) previous transaction is not correct".to_string(),
                    )
                })?;
            let out_index = self.vin[idx].get_vout() as usize;
            let prev_out = prev_tx
                .vout
                .get(out_index)
                .ok_or(CoinError::InvalidTransaction)?;

            tx_copy.vin[idx].signature = vec![];
            tx_copy.vin[idx].pub_key = prev_out.pub_key_hash.clone();
            tx_copy.id = tx_copy.hash()?;
            tx_copy.vin[idx].pub_key = vec![];

            let signature = ecdsa_p256_sha256_sign_digest(pkcs8, tx_copy.get_id())?;
            self.vin[idx].signature = signature;
        }
        Ok(())
    }

    ///
    /// The `verify` function reproduces the signing pre-image for every input
    /// and checks its signature against the embedded public key. Any failing
    /// input makes the whole transaction invalid. Coinbase transactions are
    /// always accepted.
    ///
    pub async fn verify(&self, chain: &ChainService) -> Result<bool> {
        if self.is_coinbase() {
            return Ok(true);
        }
        let prev_txs = self.resolve_prev_transactions(chain, "verify").await?;
        let mut tx_copy = self.trimmed_copy();

        for (idx, vin) in self.vin.iter().enumerate() {
            let prev_tx = prev_txs.get(&vin.get_input_tx_id_hex()).ok_or_else(|| {
                CoinError::TransactionNotFoundError(
                    "(verify) previous transaction is not correct".to_string(),
                )
            })?;
            let prev_out = prev_tx
                .vout
                .get(vin.get_vout() as usize)
                .ok_or(CoinError::InvalidTransaction)?;

            tx_copy.vin[idx].signature = vec![];
            tx_copy.vin[idx].pub_key = prev_out.pub_key_hash.clone();
            tx_copy.id = tx_copy.hash()?;
            tx_copy.vin[idx].pub_key = vec![];

            let valid = ecdsa_p256_sha256_sign_verify(
                vin.pub_key.as_slice(),
                vin.signature.as_slice(),
                tx_copy.get_id(),
            );
            if !valid {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// A transaction is coinbase iff it has exactly one input referencing no
    /// prior transaction (empty txid, output index −1).
    pub fn is_coinbase(&self) -> bool {
        self.vin.len() == 1 && self.vin[0].txid.is_empty() && self.vin[0].vout == COINBASE_VOUT
    }

    pub fn not_coinbase(&self) -> bool {
        !self.is_coinbase()
    }

    ///
    /// The `hash` function computes the transaction id: the SHA-256 digest of
    /// the serialized transaction with the `id` field emptied, making the id
    /// a pure function of the remaining fields.
    ///
    fn hash(&self) -> Result<Vec<u8>> {
        let tx_copy = Transaction {
            id: vec![],
            vin: self.vin.clone(),
            vout: self.vout.clone(),
        };
        Ok(sha256_digest(tx_copy.serialize()?.as_slice()))
    }

    pub fn get_id(&self) -> &[u8] {
        self.id.as_slice()
    }

    pub fn get_id_bytes(&self) -> Vec<u8> {
        self.id.clone()
    }

    pub fn get_tx_id_hex(&self) -> String {
        HEXLOWER.encode(self.id.as_slice())
    }

    pub fn get_vin(&self) -> &[TXInput] {
        self.vin.as_slice()
    }

    pub fn get_vout(&self) -> &[TXOutput] {
        self.vout.as_slice()
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| CoinError::TransactionSerializationError(e.to_string()))
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Transaction> {
        bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map(|(tx, _)| tx)
            .map_err(|e| CoinError::TransactionDeserializationError(e.to_string()))
    }
}
