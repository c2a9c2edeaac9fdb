//! Node context: the single value owning every process-wide mutable
//! collection — known peers, mempool, in-transit queue — together with the
//! node's own addresses. Cloning is cheap; all clones share state.

use crate::chain::{ChainService, UTXOSet};
use crate::config::{CENTRAL_NODE, GLOBAL_CONFIG};
use crate::error::Result;
use crate::node::mempool::{BlockInTransit, MemoryPool};
use crate::node::peers::Peers;
use crate::wallet::WalletAddress;
use std::net::SocketAddr;
use std::sync::Arc;

#[derive(Clone)]
pub struct NodeContext {
    chain: ChainService,
    mempool: Arc<MemoryPool>,
    blocks_in_transit: Arc<BlockInTransit>,
    peers: Arc<Peers>,
    node_addr: SocketAddr,
    mining_addr: Option<WalletAddress>,
}

impl NodeContext {
    /// Builds a context from the global configuration. The known-peer set is
    /// seeded with the central bootstrap node.
    pub fn new(chain: ChainService) -> NodeContext {
        NodeContext {
            chain,
            mempool: Arc::new(MemoryPool::new()),
            blocks_in_transit: Arc::new(BlockInTransit::new()),
            peers: Arc::new(Peers::new(*CENTRAL_NODE)),
            node_addr: GLOBAL_CONFIG.get_node_addr(),
            mining_addr: GLOBAL_CONFIG.get_mining_addr(),
        }
    }

    pub fn chain(&self) -> &ChainService {
        &self.chain
    }

    pub fn mempool(&self) -> &MemoryPool {
        &self.mempool
    }

    pub fn blocks_in_transit(&self) -> &BlockInTransit {
        &self.blocks_in_transit
    }

    pub fn peers(&self) -> &Peers {
        &self.peers
    }

    pub fn node_addr(&self) -> SocketAddr {
        self.node_addr
    }

    pub fn mining_addr(&self) -> Option<&WalletAddress> {
        self.mining_addr.as_ref()
    }

    /// The central node relays transactions instead of mining them.
    pub fn is_central(&self) -> bool {
        self.node_addr == *CENTRAL_NODE
    }

    pub fn utxo_set(&self) -> UTXOSet {
        UTXOSet::new(self.chain.clone())
    }

    /// Known peers minus this node and the `exclude` list.
    pub fn peers_excluding(&self, exclude: &[SocketAddr]) -> Result<Vec<SocketAddr>> {
        Ok(self
            .peers
            .get_all()?
            .into_iter()
            .filter(|peer| *peer != self.node_addr && !exclude.contains(peer))
            .collect())
    }
}
