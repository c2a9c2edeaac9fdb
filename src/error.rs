use thiserror::Error;

#[derive(Clone, Error, Debug)]
pub enum CoinError {
    // Recoverable input errors
    #[error("Blockchain not found error: {0}")]
    BlockchainNotFound(String),
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Not enough funds")]
    NotEnoughFunds,
    #[error("Invalid transaction")]
    InvalidTransaction,
    #[error("Invalid block: {0}")]
    InvalidBlock(String),

    // Serialization errors
    #[error("Block serialization error: {0}")]
    BlockSerializationError(String),
    #[error("Block deserialization error: {0}")]
    BlockDeserializationError(String),
    #[error("Transaction serialization error: {0}")]
    TransactionSerializationError(String),
    #[error("Transaction deserialization error: {0}")]
    TransactionDeserializationError(String),
    #[error("Transaction id hex decoding error: {0}")]
    TransactionIdHexDecodingError(String),
    #[error("Message encoding error: {0}")]
    MessageEncodingError(String),
    #[error("Message decoding error: {0}")]
    MessageDecodingError(String),

    // Chain invariant violations
    #[error("Transaction not found error: {0}")]
    TransactionNotFoundError(String),
    #[error("Transaction signature error: {0}")]
    TransactionSignatureError(String),
    #[error("Address decoding error: {0}")]
    AddressDecodingError(String),

    // Wallet errors
    #[error("Wallet key pair error: {0}")]
    WalletKeyPairError(String),
    #[error("Saving wallets error: {0}")]
    SavingWalletsError(String),
    #[error("Wallets file error: {0}")]
    WalletsFileError(String),
    #[error("Wallets serialization error: {0}")]
    WalletsSerializationError(String),
    #[error("Wallets deserialization error: {0}")]
    WalletsDeserializationError(String),

    // Store errors
    #[error("Chain store error: {0}")]
    ChainStoreError(String),
    #[error("UTXO store error: {0}")]
    UtxoStoreError(String),
    #[error("UTXO not found error: {0}")]
    UtxoNotFoundError(String),

    // Network errors
    #[error("Network error: {0}")]
    NetworkError(String),

    // Lock errors
    #[error("Poisoned lock error: {0}")]
    PoisonedLockError(String),
}

pub type Result<T> = std::result::Result<T, CoinError>;
