pub mod chain;
pub mod config;
pub mod core;
pub mod crypto;
pub mod error;
pub mod net;
pub mod node;
pub mod store;
pub mod wallet;

pub use crate::chain::{ChainService, UTXOSet};
pub use crate::config::{CENTRAL_NODE, Config, GLOBAL_CONFIG, NODE_VERSION};
pub use crate::core::block::Block;
pub use crate::core::merkle::MerkleTree;
pub use crate::core::proof_of_work::{ProofOfWork, TARGET_BITS};
pub use crate::core::transaction::{SUBSIDY, TXInput, TXOutput, Transaction};
pub use crate::error::{CoinError, Result};
pub use crate::net::{InvKind, Message, Server};
pub use crate::node::{BlockInTransit, MemoryPool, NodeContext, Peers};
pub use crate::store::{ChainIterator, ChainStore};
pub use crate::wallet::{Wallet, WalletAddress, Wallets};
