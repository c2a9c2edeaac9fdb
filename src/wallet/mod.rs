//! Wallets: P-256 key pairs, their addresses, and the on-disk wallet file
//! (`wallet_<NODE_ID>.dat`, a bincode-encoded map of address to key pair).
//!
//! # Examples
//!
//! ```
//! use minicoin::wallet::Wallet;
//! let wallet = Wallet::new().expect("Failed to create wallet");
//! let address = wallet.get_address().expect("Failed to get address");
//! ```

use crate::config::GLOBAL_CONFIG;
use crate::crypto::{
    convert_address, hash_pub_key, new_key_pair, public_key_from_pkcs8, validate_address,
};
use crate::error::{CoinError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env::current_dir;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Write};

/// An address whose Base58 checksum has been verified.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WalletAddress(String);

impl WalletAddress {
    pub fn validate(address: String) -> Result<WalletAddress> {
        if validate_address(address.as_str())? {
            Ok(WalletAddress(address))
        } else {
            Err(CoinError::InvalidAddress(address))
        }
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct Wallet {
    // PKCS#8 private-key document for ECDSA P-256.
    pkcs8: Vec<u8>,
    // Uncompressed curve point, as carried in transaction inputs.
    public_key: Vec<u8>,
}

impl Wallet {
    pub fn new() -> Result<Wallet> {
        let pkcs8 = new_key_pair()?;
        let public_key = public_key_from_pkcs8(pkcs8.as_slice())?;
        Ok(Wallet { pkcs8, public_key })
    }

    /// Derives the Base58 address of this wallet's public key.
    pub fn get_address(&self) -> Result<WalletAddress> {
        let pub_key_hash = hash_pub_key(self.public_key.as_slice());
        WalletAddress::validate(convert_address(pub_key_hash.as_slice()))
    }

    pub fn get_public_key(&self) -> &[u8] {
        self.public_key.as_slice()
    }

    pub fn get_pkcs8(&self) -> &[u8] {
        self.pkcs8.as_slice()
    }
}

///
/// The wallet file: a map of address to key pair, loaded on open and written
/// back after every mutation. The bincode encoding is stable across runs.
///
pub struct Wallets {
    wallets: HashMap<String, Wallet>,
}

impl Wallets {
    pub fn new() -> Result<Wallets> {
        let mut wallets = Wallets {
            wallets: HashMap::new(),
        };
        wallets.load_from_file()?;
        Ok(wallets)
    }

    pub fn create_wallet(&mut self) -> Result<WalletAddress> {
        let wallet = Wallet::new()?;
        let address = wallet.get_address()?;
        self.wallets.insert(address.as_str().to_string(), wallet);
        self.save_to_file()?;
        Ok(address)
    }

    pub fn get_addresses(&self) -> Vec<WalletAddress> {
        self.wallets
            .keys()
            .map(|address| WalletAddress(address.clone()))
            .collect()
    }

    pub fn get_wallet(&self, address: &WalletAddress) -> Option<&Wallet> {
        self.wallets.get(address.as_str())
    }

    fn load_from_file(&mut self) -> Result<()> {
        let path = current_dir()
            .map_err(|e| CoinError::WalletsFileError(e.to_string()))?
            .join(GLOBAL_CONFIG.wallet_file());
        if !path.exists() {
            return Ok(());
        }
        let mut file =
            File::open(path).map_err(|e| CoinError::WalletsFileError(e.to_string()))?;
        let mut buf = vec![];
        file.read_to_end(&mut buf)
            .map_err(|e| CoinError::WalletsFileError(e.to_string()))?;
        let wallets = bincode::serde::decode_from_slice(buf.as_slice(), bincode::config::standard())
            .map_err(|e| CoinError::WalletsDeserializationError(e.to_string()))?
            .0;
        self.wallets = wallets;
        Ok(())
    }

    fn save_to_file(&self) -> Result<()> {
        let path = current_dir()
            .map_err(|e| CoinError::WalletsFileError(e.to_string()))?
            .join(GLOBAL_CONFIG.wallet_file());
        let file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&path)
            .map_err(|e| CoinError::SavingWalletsError(e.to_string()))?;
        let mut writer = BufWriter::new(file);
        let wallets_bytes =
            bincode::serde::encode_to_vec(&self.wallets, bincode::config::standard())
                .map_err(|e| CoinError::WalletsSerializationError(e.to_string()))?;
        writer
            .write_all(wallets_bytes.as_slice())
            .map_err(|e| CoinError::SavingWalletsError(e.to_string()))?;
        writer
            .flush()
            .map_err(|e| CoinError::SavingWalletsError(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::pub_key_hash_from_address;
    use crate::test_support::isolated_store;

    #[test]
    fn test_wallet_address_round_trip() {
        let wallet = Wallet::new().expect("Failed to create wallet");
        let address = wallet.get_address().expect("Failed to get address");

        assert!(validate_address(address.as_str()).expect("Failed to validate"));
        let decoded_hash =
            pub_key_hash_from_address(address.as_str()).expect("Failed to decode address");
        assert_eq!(decoded_hash, hash_pub_key(wallet.get_public_key()));
        assert_eq!(decoded_hash.len(), 20);
    }

    #[test]
    fn test_wallet_address_rejects_garbage() {
        assert!(WalletAddress::validate("definitely-not-an-address".to_string()).is_err());
    }

    #[test]
    fn test_wallets_persist_across_reload() {
        let _env = isolated_store();

        let created = {
            let mut wallets = Wallets::new().expect("Failed to open wallets");
            wallets.create_wallet().expect("Failed to create wallet")
        };

        let reloaded = Wallets::new().expect("Failed to reopen wallets");
        assert!(reloaded.get_wallet(&created).is_some());
        assert!(reloaded
            .get_addresses()
            .iter()
            .any(|address| address == &created));

        let wallet = reloaded.get_wallet(&created).expect("wallet exists");
        assert_eq!(
            wallet.get_address().expect("Failed to get address"),
            created
        );
    }
}
