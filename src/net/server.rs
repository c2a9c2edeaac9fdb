//! TCP listener and the seven message handlers. Each connection carries one
//! message and is handled by its own task; handler failures are logged and
//! never propagate to other connections.

use crate::config::{CENTRAL_NODE, NODE_VERSION};
use crate::core::block::Block;
use crate::core::proof_of_work::ProofOfWork;
use crate::core::transaction::Transaction;
use crate::error::{CoinError, Result};
use crate::net::message::{InvKind, Message};
use crate::node::context::NodeContext;
use crate::node::miner;
use data_encoding::HEXLOWER;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

pub struct Server {
    ctx: NodeContext,
}

impl Server {
    pub fn new(ctx: NodeContext) -> Server {
        Server { ctx }
    }

    ///
    /// Binds the listener and serves connections until the process exits.
    /// A non-central node first greets the central node with its version so
    /// chain catch-up can start.
    ///
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.ctx.node_addr())
            .await
            .map_err(|e| CoinError::NetworkError(e.to_string()))?;
        info!("listening on {}", self.ctx.node_addr());

        if !self.ctx.is_central() {
            let best_height = self.ctx.chain().get_best_height().await?;
            send_version(&self.ctx, &CENTRAL_NODE, best_height).await;
        }

        loop {
            match listener.accept().await {
                Ok((stream, peer_addr)) => {
                    let ctx = self.ctx.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(ctx, stream).await {
                            error!("connection from {} failed: {}", peer_addr, e);
                        }
                    });
                }
                Err(e) => error!("accept error: {}", e),
            }
        }
    }
}

/// Reads the single message on the connection and dispatches by command.
async fn handle_connection(ctx: NodeContext, mut stream: TcpStream) -> Result<()> {
    let mut frame = Vec::new();
    stream
        .read_to_end(&mut frame)
        .await
        .map_err(|e| CoinError::NetworkError(e.to_string()))?;
    drop(stream);

    let message = Message::decode(frame.as_slice())?;
    debug!("received {} ({} bytes)", message.command(), frame.len());

    match message {
        Message::Version {
            addr_from,
            version,
            best_height,
        } => handle_version(&ctx, addr_from, version, best_height).await,
        Message::Addr { addr_list } => handle_addr(&ctx, addr_list.as_slice()).await,
        Message::GetBlocks { addr_from } => handle_get_blocks(&ctx, &addr_from).await,
        Message::Inv {
            addr_from,
            kind,
            items,
        } => handle_inv(&ctx, &addr_from, kind, items).await,
        Message::GetData {
            addr_from,
            kind,
            id,
        } => handle_get_data(&ctx, &addr_from, kind, id.as_slice()).await,
        Message::Block { addr_from, block } => handle_block(&ctx, &addr_from, block.as_slice()).await,
        Message::Tx {
            addr_from,
            transaction,
        } => handle_tx(&ctx, &addr_from, transaction.as_slice()).await,
    }
}

// A taller peer triggers catch-up; a shorter one gets our version back.
// Either way the sender joins the known-peer set.
async fn handle_version(
    ctx: &NodeContext,
    addr_from: SocketAddr,
    version: usize,
    best_height: usize,
) -> Result<()> {
    debug!(
        "peer {} speaks protocol {} at height {}",
        addr_from, version, best_height
    );
    let local_best_height = ctx.chain().get_best_height().await?;
    if local_best_height < best_height {
        send_get_blocks(ctx, &addr_from).await;
    } else if local_best_height > best_height {
        send_version(ctx, &addr_from, local_best_height).await;
    }

    if !ctx.peers().contains(&addr_from)? {
        ctx.peers().add(addr_from)?;
    }
    Ok(())
}

async fn handle_addr(ctx: &NodeContext, addr_list: &[SocketAddr]) -> Result<()> {
    ctx.peers().add_all(addr_list)?;
    info!("there are {} known peers now", ctx.peers().len()?);
    for peer in ctx.peers_excluding(&[])? {
        send_get_blocks(ctx, &peer).await;
    }
    Ok(())
}

async fn handle_get_blocks(ctx: &NodeContext, addr_from: &SocketAddr) -> Result<()> {
    let hashes = ctx.chain().get_block_hashes().await?;
    send_inv(ctx, addr_from, InvKind::Block, hashes.as_slice()).await;
    Ok(())
}

async fn handle_inv(
    ctx: &NodeContext,
    addr_from: &SocketAddr,
    kind: InvKind,
    items: Vec<Vec<u8>>,
) -> Result<()> {
    if items.is_empty() {
        return Ok(());
    }
    info!("received inventory with {} {:?} item(s)", items.len(), kind);

    match kind {
        InvKind::Block => {
            ctx.blocks_in_transit().set_blocks(items.as_slice())?;
            if let Some(first) = ctx.blocks_in_transit().pop_front()? {
                send_get_data(ctx, addr_from, InvKind::Block, first.as_slice()).await;
            }
        }
        InvKind::Tx => {
            let txid_hex = HEXLOWER.encode(items[0].as_slice());
            if !ctx.mempool().contains(txid_hex.as_str())? {
                send_get_data(ctx, addr_from, InvKind::Tx, items[0].as_slice()).await;
            }
        }
    }
    Ok(())
}

async fn handle_get_data(
    ctx: &NodeContext,
    addr_from: &SocketAddr,
    kind: InvKind,
    id: &[u8],
) -> Result<()> {
    match kind {
        InvKind::Block => {
            if let Some(block) = ctx.chain().get_block(id).await? {
                send_block(ctx, addr_from, &block).await;
            }
            // unknown block hashes are silently ignored
        }
        InvKind::Tx => {
            let txid_hex = HEXLOWER.encode(id);
            match ctx.mempool().get(txid_hex.as_str())? {
                Some(tx) => send_tx(ctx, addr_from, &tx).await,
                None => info!(
                    "transaction {} is not in the mempool (likely mined already), ignoring",
                    txid_hex
                ),
            }
        }
    }
    Ok(())
}

// Appends the block, then either continues catch-up or brings the UTXO index
// up to date: an incremental update when the block extended the tip we had,
// a full reindex when catch-up delivered blocks out of order.
async fn handle_block(ctx: &NodeContext, addr_from: &SocketAddr, block_bytes: &[u8]) -> Result<()> {
    let block = Block::deserialize(block_bytes)?;
    if !ProofOfWork::validate(&block)? {
        warn!(
            "rejecting block {} with invalid proof of work",
            HEXLOWER.encode(block.get_hash())
        );
        return Ok(());
    }

    let tip_before = ctx.chain().get_tip_hash().await;
    ctx.chain().add_block(&block).await?;
    info!("added block {}", HEXLOWER.encode(block.get_hash()));

    // Anything the block confirmed was mined elsewhere.
    for tx in block.get_transactions() {
        ctx.mempool().remove(tx)?;
    }

    if let Some(next_hash) = ctx.blocks_in_transit().pop_front()? {
        send_get_data(ctx, addr_from, InvKind::Block, next_hash.as_slice()).await;
    } else if block.get_prev_block_hash() == tip_before.as_slice() {
        ctx.utxo_set().update(&block).await?;
    } else {
        ctx.utxo_set().reindex().await?;
    }
    Ok(())
}

// The central node relays new transactions; a mining node starts a round
// once the pool crosses the threshold.
async fn handle_tx(ctx: &NodeContext, addr_from: &SocketAddr, tx_bytes: &[u8]) -> Result<()> {
    let tx = Transaction::deserialize(tx_bytes)?;
    let txid = tx.get_id_bytes();
    let txid_hex = tx.get_tx_id_hex();

    ctx.mempool().add(tx)?;
    info!(
        "transaction {} entered the mempool ({} pending)",
        txid_hex,
        ctx.mempool().len()?
    );

    if ctx.is_central() {
        for peer in ctx.peers_excluding(&[*addr_from])? {
            send_inv(ctx, &peer, InvKind::Tx, &[txid.clone()]).await;
        }
    } else if miner::should_trigger_mining(ctx) {
        miner::mine_pending_transactions(ctx).await?;
    }
    Ok(())
}

///
/// Opens a connection, writes one framed message and closes. A peer that
/// cannot be dialed is evicted from the known set; mid-write failures are
/// fatal to this send only.
///
async fn send_data(ctx: &NodeContext, addr_to: &SocketAddr, message: Message) {
    let frame = match message.encode() {
        Ok(frame) => frame,
        Err(e) => {
            error!("failed to encode {} message: {}", message.command(), e);
            return;
        }
    };

    let mut stream = match TcpStream::connect(addr_to).await {
        Ok(stream) => stream,
        Err(_) => {
            warn!("peer {} is not reachable, evicting it", addr_to);
            if let Err(e) = ctx.peers().evict(addr_to) {
                error!("failed to evict {}: {}", addr_to, e);
            }
            return;
        }
    };

    if let Err(e) = stream.write_all(frame.as_slice()).await {
        error!("failed to send {} to {}: {}", message.command(), addr_to, e);
        return;
    }
    let _ = stream.shutdown().await;
}

pub async fn send_version(ctx: &NodeContext, addr_to: &SocketAddr, best_height: usize) {
    send_data(
        ctx,
        addr_to,
        Message::Version {
            addr_from: ctx.node_addr(),
            version: NODE_VERSION,
            best_height,
        },
    )
    .await;
}

pub async fn send_addr(ctx: &NodeContext, addr_to: &SocketAddr, addr_list: Vec<SocketAddr>) {
    send_data(ctx, addr_to, Message::Addr { addr_list }).await;
}

pub async fn send_get_blocks(ctx: &NodeContext, addr_to: &SocketAddr) {
    send_data(
        ctx,
        addr_to,
        Message::GetBlocks {
            addr_from: ctx.node_addr(),
        },
    )
    .await;
}

pub async fn send_inv(ctx: &NodeContext, addr_to: &SocketAddr, kind: InvKind, items: &[Vec<u8>]) {
    send_data(
        ctx,
        addr_to,
        Message::Inv {
            addr_from: ctx.node_addr(),
            kind,
            items: items.to_vec(),
        },
    )
    .await;
}

pub async fn send_get_data(ctx: &NodeContext, addr_to: &SocketAddr, kind: InvKind, id: &[u8]) {
    send_data(
        ctx,
        addr_to,
        Message::GetData {
            addr_from: ctx.node_addr(),
            kind,
            id: id.to_vec(),
        },
    )
    .await;
}

pub async fn send_block(ctx: &NodeContext, addr_to: &SocketAddr, block: &Block) {
    let block_bytes = match block.serialize() {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("failed to serialize block for {}: {}", addr_to, e);
            return;
        }
    };
    send_data(
        ctx,
        addr_to,
        Message::Block {
            addr_from: ctx.node_addr(),
            block: block_bytes,
        },
    )
    .await;
}

pub async fn send_tx(ctx: &NodeContext, addr_to: &SocketAddr, tx: &Transaction) {
    let tx_bytes = match tx.serialize() {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("failed to serialize transaction for {}: {}", addr_to, e);
            return;
        }
    };
    send_data(
        ctx,
        addr_to,
        Message::Tx {
            addr_from: ctx.node_addr(),
            transaction: tx_bytes,
        },
    )
    .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{ChainService, UTXOSet};
    use crate::test_support::isolated_store;
    use crate::wallet::Wallet;
    use std::str::FromStr;

    fn peer(s: &str) -> SocketAddr {
        SocketAddr::from_str(s).expect("Failed to parse address")
    }

    async fn test_context() -> (NodeContext, Wallet) {
        let wallet = Wallet::new().expect("Failed to create test wallet");
        let address = wallet.get_address().expect("Failed to get wallet address");
        let chain = ChainService::initialize(address.as_str())
            .await
            .expect("Failed to create chain");
        UTXOSet::new(chain.clone())
            .reindex()
            .await
            .expect("Failed to reindex");
        (NodeContext::new(chain), wallet)
    }

    #[tokio::test]
    async fn test_handle_version_records_peer() {
        let _env = isolated_store();
        let (ctx, _) = test_context().await;
        let sender = peer("127.0.0.1:3456");

        handle_version(&ctx, sender, NODE_VERSION, 1)
            .await
            .expect("handler failed");
        assert!(ctx.peers().contains(&sender).expect("Failed to check"));
    }

    #[tokio::test]
    async fn test_handle_tx_fills_mempool() {
        let _env = isolated_store();
        let (ctx, wallet) = test_context().await;
        let address = wallet.get_address().expect("Failed to get address");

        let tx = Transaction::new_coinbase_tx(address.as_str(), None)
            .expect("Failed to create coinbase tx");
        let tx_bytes = tx.serialize().expect("Failed to serialize");

        handle_tx(&ctx, &peer("127.0.0.1:3456"), &tx_bytes)
            .await
            .expect("handler failed");
        assert!(ctx
            .mempool()
            .contains(&tx.get_tx_id_hex())
            .expect("Failed to check"));
    }

    #[tokio::test]
    async fn test_handle_block_appends_and_indexes() {
        let _env = isolated_store();
        let (ctx, wallet) = test_context().await;
        let address = wallet.get_address().expect("Failed to get address");

        let coinbase = Transaction::new_coinbase_tx(address.as_str(), None)
            .expect("Failed to create coinbase tx");
        let block = ctx
            .chain()
            .mine_block(&[coinbase])
            .await
            .expect("Failed to mine");
        let block_bytes = block.serialize().expect("Failed to serialize");

        handle_block(&ctx, &peer("127.0.0.1:3456"), &block_bytes)
            .await
            .expect("handler failed");

        assert_eq!(
            ctx.chain()
                .get_best_height()
                .await
                .expect("Failed to get height"),
            2
        );
        // Genesis + mined coinbase both carry unspent outputs.
        assert_eq!(
            ctx.utxo_set()
                .count_transactions()
                .await
                .expect("Failed to count"),
            2
        );
    }

    #[tokio::test]
    async fn test_handle_block_rejects_bad_pow() {
        let _env = isolated_store();
        let (ctx, wallet) = test_context().await;
        let address = wallet.get_address().expect("Failed to get address");

        let coinbase = Transaction::new_coinbase_tx(address.as_str(), None)
            .expect("Failed to create coinbase tx");
        let forged = Block::new_block(vec![5u8; 32], &[coinbase], 7).expect("Failed to build");
        let mut forged_bytes = forged.serialize().expect("Failed to serialize");
        // Flip a bit in the last transaction byte: the block still decodes
        // but its merkle root no longer matches the mined hash.
        if let Some(byte) = forged_bytes.last_mut() {
            *byte ^= 0x01;
        }

        handle_block(&ctx, &peer("127.0.0.1:3456"), &forged_bytes)
            .await
            .expect("handler failed");
        assert_eq!(
            ctx.chain()
                .get_best_height()
                .await
                .expect("Failed to get height"),
            1
        );
    }

    #[tokio::test]
    async fn test_handle_get_data_ignores_missing_tx() {
        let _env = isolated_store();
        let (ctx, _) = test_context().await;

        // Must not fabricate a transaction or error out.
        handle_get_data(&ctx, &peer("127.0.0.1:3456"), InvKind::Tx, &[0xCD; 32])
            .await
            .expect("handler failed");
        assert!(ctx.mempool().is_empty().expect("Failed to check"));
    }

    #[tokio::test]
    async fn test_handle_inv_tracks_blocks_in_transit() {
        let _env = isolated_store();
        let (ctx, _) = test_context().await;

        let items = vec![vec![1u8; 32], vec![2u8; 32], vec![3u8; 32]];
        handle_inv(&ctx, &peer("127.0.0.1:3456"), InvKind::Block, items)
            .await
            .expect("handler failed");

        // Head was popped and requested; two hashes remain queued.
        assert_eq!(ctx.blocks_in_transit().len().expect("Failed to count"), 2);
    }
}
