// Persistent blockstore backed by sled.
pub mod chain_store;

pub use chain_store::{ChainIterator, ChainStore};
