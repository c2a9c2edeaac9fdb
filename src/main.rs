use clap::{Parser, Subcommand};
use data_encoding::HEXLOWER;
use minicoin::net::server::send_tx;
use minicoin::{
    CENTRAL_NODE, ChainService, CoinError, GLOBAL_CONFIG, NodeContext, Result, Server, Transaction,
    UTXOSet, WalletAddress, Wallets,
};
use tracing::info;
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    fmt,
    prelude::*,
};

#[derive(Debug, Parser)]
#[command(name = "minicoin", about = "A miniature UTXO cryptocurrency node")]
struct Opt {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(
        name = "createblockchain",
        about = "Create a chain whose genesis block pays the subsidy to ADDRESS"
    )]
    Createblockchain {
        #[arg(long)]
        address: String,
    },
    #[command(name = "createwallet", about = "Create a new wallet")]
    Createwallet,
    #[command(name = "listaddresses", about = "List local wallet addresses")]
    ListAddresses,
    #[command(name = "getbalance", about = "Get the balance of ADDRESS")]
    Getbalance {
        #[arg(long)]
        address: String,
    },
    #[command(name = "send", about = "Send AMOUNT from FROM to TO")]
    Send {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: i64,
        #[arg(long, help = "Mine the transaction into a block on this node")]
        mine: bool,
    },
    #[command(name = "startnode", about = "Start the node")]
    StartNode {
        #[arg(long, help = "Mine to this wallet address when the mempool fills")]
        miner: Option<String>,
    },
    #[command(name = "printchain", about = "Print every block in the chain")]
    Printchain,
    #[command(name = "reindexutxo", about = "Rebuild the UTXO index from the chain")]
    Reindexutxo,
}

fn initialize_logging() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(fmt::layer().with_filter(filter))
        .init();
}

async fn create_blockchain(address: String) -> Result<()> {
    let address = WalletAddress::validate(address)?;
    let chain = ChainService::initialize(address.as_str()).await?;
    let utxo_set = UTXOSet::new(chain.clone());
    utxo_set.reindex().await?;
    info!("Done! Genesis subsidy paid to {}", address);
    Ok(())
}

fn create_wallet() -> Result<()> {
    let mut wallets = Wallets::new()?;
    let address = wallets.create_wallet()?;
    info!("Your new address: {}", address);
    Ok(())
}

fn list_addresses() -> Result<()> {
    let wallets = Wallets::new()?;
    for address in wallets.get_addresses() {
        info!("{}", address);
    }
    Ok(())
}

async fn get_balance(address: String) -> Result<()> {
    let address = WalletAddress::validate(address)?;
    let chain = ChainService::open().await?;
    let utxo_set = UTXOSet::new(chain);
    let balance = utxo_set.get_balance(&address).await?;
    info!("Balance of {}: {}", address, balance);
    Ok(())
}

async fn send(from: String, to: String, amount: i64, mine: bool) -> Result<()> {
    let from = WalletAddress::validate(from)?;
    let to = WalletAddress::validate(to)?;
    if amount <= 0 {
        return Err(CoinError::InvalidTransaction);
    }

    let chain = ChainService::open().await?;
    let utxo_set = UTXOSet::new(chain.clone());
    let wallets = Wallets::new()?;
    let wallet = wallets
        .get_wallet(&from)
        .ok_or_else(|| CoinError::InvalidAddress(format!("no local wallet for {}", from)))?;

    let tx = Transaction::new_utxo_transaction(wallet, to.as_str(), amount, &utxo_set).await?;

    if mine {
        let coinbase = Transaction::new_coinbase_tx(from.as_str(), None)?;
        let block = chain.mine_block(&[tx, coinbase]).await?;
        utxo_set.update(&block).await?;
        info!("mined block {}", HEXLOWER.encode(block.get_hash()));
    } else {
        let ctx = NodeContext::new(chain);
        send_tx(&ctx, &CENTRAL_NODE, &tx).await;
    }
    info!("Success!");
    Ok(())
}

async fn start_node(miner: Option<String>) -> Result<()> {
    if let Some(miner) = miner {
        let mining_addr = WalletAddress::validate(miner)?;
        info!("mining is on, rewards go to {}", mining_addr);
        GLOBAL_CONFIG.set_mining_addr(&mining_addr);
    }

    let chain = match ChainService::open().await {
        Ok(chain) => {
            // Bring the index in line with whatever the store holds.
            UTXOSet::new(chain.clone()).reindex().await?;
            chain
        }
        Err(CoinError::BlockchainNotFound(_)) => ChainService::open_empty().await?,
        Err(e) => return Err(e),
    };

    let ctx = NodeContext::new(chain);
    info!("starting node {} at {}", GLOBAL_CONFIG.get_node_id(), ctx.node_addr());
    Server::new(ctx).run().await
}

async fn print_chain() -> Result<()> {
    let chain = ChainService::open().await?;
    let mut iterator = chain.iterator().await;
    while let Some(block) = iterator.next() {
        info!("Prev block hash: {}", HEXLOWER.encode(block.get_prev_block_hash()));
        info!("Cur block hash: {}", HEXLOWER.encode(block.get_hash()));
        info!("Cur block timestamp: {}", block.get_timestamp());
        info!("Cur block height: {}", block.get_height());
        for tx in block.get_transactions() {
            info!("- Transaction txid: {}", tx.get_tx_id_hex());
            if tx.not_coinbase() {
                for input in tx.get_vin() {
                    info!(
                        "-- Input txid = {}, vout = {}",
                        input.get_input_tx_id_hex(),
                        input.get_vout()
                    );
                }
            }
            for output in tx.get_vout() {
                info!(
                    "-- Output value = {}, pubkey hash = {}",
                    output.get_value(),
                    HEXLOWER.encode(output.get_pub_key_hash())
                );
            }
        }
    }
    Ok(())
}

async fn reindex_utxo() -> Result<()> {
    let chain = ChainService::open().await?;
    let utxo_set = UTXOSet::new(chain);
    utxo_set.reindex().await?;
    let count = utxo_set.count_transactions().await?;
    info!(
        "Done! There are {} transactions in the UTXO set.",
        count
    );
    Ok(())
}

async fn process_command(command: Command) -> Result<()> {
    match command {
        Command::Createblockchain { address } => create_blockchain(address).await,
        Command::Createwallet => create_wallet(),
        Command::ListAddresses => list_addresses(),
        Command::Getbalance { address } => get_balance(address).await,
        Command::Send {
            from,
            to,
            amount,
            mine,
        } => send(from, to, amount, mine).await,
        Command::StartNode { miner } => start_node(miner).await,
        Command::Printchain => print_chain().await,
        Command::Reindexutxo => reindex_utxo().await,
    }
}

#[tokio::main]
async fn main() {
    initialize_logging();

    let opt = Opt::parse();
    if let Err(e) = process_command(opt.command).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
