//! Miner workflow: assemble verified mempool transactions plus a coinbase,
//! mine, index, evict mined transactions, and announce the block.

use crate::core::transaction::Transaction;
use crate::error::{CoinError, Result};
use crate::net::message::InvKind;
use crate::net::server::send_inv;
use crate::node::context::NodeContext;
use data_encoding::HEXLOWER;
use tracing::{info, warn};

/// A mining node starts a round once this many transactions are pending.
pub const TRANSACTION_THRESHOLD: usize = 2;

/// Whether accepting a new transaction should start a mining round. The
/// central node never mines; it relays.
pub fn should_trigger_mining(ctx: &NodeContext) -> bool {
    ctx.mining_addr().is_some()
        && !ctx.is_central()
        && ctx
            .mempool()
            .len()
            .map(|len| len >= TRANSACTION_THRESHOLD)
            .unwrap_or(false)
}

///
/// Runs mining rounds until the mempool drains. Each round snapshots the
/// pool, drops entries that fail verification from the candidate set
/// (they stay pooled for the next cycle), appends a coinbase paying the
/// mining address, mines the block, applies the incremental UTXO update,
/// removes the mined transactions, and announces the block hash to every
/// known peer except this node.
///
pub async fn mine_pending_transactions(ctx: &NodeContext) -> Result<()> {
    let mining_addr = match ctx.mining_addr() {
        Some(addr) => addr.clone(),
        None => return Ok(()),
    };

    loop {
        let snapshot = ctx.mempool().get_all()?;
        if snapshot.is_empty() {
            return Ok(());
        }

        let mut txs = Vec::with_capacity(snapshot.len() + 1);
        for tx in snapshot {
            match tx.verify(ctx.chain()).await {
                Ok(true) => txs.push(tx),
                Ok(false) => {
                    warn!(
                        "transaction {} failed verification, not mining it",
                        tx.get_tx_id_hex()
                    );
                }
                Err(CoinError::TransactionNotFoundError(e)) => {
                    warn!(
                        "transaction {} references an unknown output ({}), not mining it",
                        tx.get_tx_id_hex(),
                        e
                    );
                }
                Err(e) => return Err(e),
            }
        }
        if txs.is_empty() {
            info!("all pending transactions are invalid, waiting for new ones");
            return Ok(());
        }

        let coinbase = Transaction::new_coinbase_tx(mining_addr.as_str(), None)?;
        txs.push(coinbase);

        let block = ctx.chain().mine_block(txs.as_slice()).await?;
        ctx.utxo_set().update(&block).await?;
        info!("new block {} is mined", HEXLOWER.encode(block.get_hash()));

        for tx in block.get_transactions() {
            ctx.mempool().remove(tx)?;
        }

        for peer in ctx.peers_excluding(&[])? {
            send_inv(ctx, &peer, InvKind::Block, &[block.get_hash_bytes()]).await;
        }

        if ctx.mempool().is_empty()? {
            return Ok(());
        }
    }
}
