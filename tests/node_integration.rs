//! End-to-end scenarios over the chain, wallet and UTXO index, run against
//! a throwaway sled store per test.

use minicoin::{ChainService, CoinError, SUBSIDY, Transaction, UTXOSet, Wallet, WalletAddress};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

// The store location travels through the environment, so store-touching
// tests run one at a time.
static ENV_LOCK: Mutex<()> = Mutex::new(());

struct TestEnv {
    _lock: MutexGuard<'static, ()>,
    root: PathBuf,
}

impl Drop for TestEnv {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

fn isolated_env() -> TestEnv {
    let lock = ENV_LOCK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    let root = std::env::temp_dir().join(format!(
        "minicoin_it_{}_{}_{}",
        std::process::id(),
        rand::random::<u32>(),
        uuid::Uuid::new_v4()
    ));
    std::fs::create_dir_all(&root).expect("Failed to create test directory");

    unsafe {
        std::env::set_var("DATA_DIR", root.join("db").display().to_string());
        std::env::set_var("WALLET_FILE", root.join("wallet.dat").display().to_string());
    }

    TestEnv { _lock: lock, root }
}

fn new_wallet() -> (Wallet, WalletAddress) {
    let wallet = Wallet::new().expect("Failed to create wallet");
    let address = wallet.get_address().expect("Failed to get address");
    (wallet, address)
}

async fn balance(utxo_set: &UTXOSet, address: &WalletAddress) -> i64 {
    utxo_set
        .get_balance(address)
        .await
        .expect("Failed to get balance")
}

#[tokio::test]
async fn genesis_pays_subsidy_to_creator() {
    let _env = isolated_env();
    let (_, address) = new_wallet();

    let chain = ChainService::initialize(address.as_str())
        .await
        .expect("Failed to create chain");
    let utxo_set = UTXOSet::new(chain.clone());
    utxo_set.reindex().await.expect("Failed to reindex");

    assert_eq!(balance(&utxo_set, &address).await, SUBSIDY);
    assert_eq!(
        utxo_set
            .count_transactions()
            .await
            .expect("Failed to count"),
        1
    );

    let projection = chain.find_utxo().await.expect("Failed to scan");
    assert_eq!(projection.len(), 1);
}

#[tokio::test]
async fn local_send_updates_balances_and_index() {
    let _env = isolated_env();
    let (wallet_a, addr_a) = new_wallet();
    let (_, addr_b) = new_wallet();
    let (_, addr_m) = new_wallet(); // miner reward sink

    let chain = ChainService::initialize(addr_a.as_str())
        .await
        .expect("Failed to create chain");
    let utxo_set = UTXOSet::new(chain.clone());
    utxo_set.reindex().await.expect("Failed to reindex");

    let tx = Transaction::new_utxo_transaction(&wallet_a, addr_b.as_str(), 4, &utxo_set)
        .await
        .expect("Failed to build transaction");
    let coinbase =
        Transaction::new_coinbase_tx(addr_m.as_str(), None).expect("Failed to create coinbase");
    let block = chain
        .mine_block(&[tx, coinbase])
        .await
        .expect("Failed to mine block");
    utxo_set.update(&block).await.expect("Failed to update");

    assert_eq!(balance(&utxo_set, &addr_a).await, 6);
    assert_eq!(balance(&utxo_set, &addr_b).await, 4);
    assert_eq!(balance(&utxo_set, &addr_m).await, SUBSIDY);

    // The transfer spends the genesis coinbase entirely, so the index holds
    // exactly the transfer outputs and the new coinbase.
    assert_eq!(
        utxo_set
            .count_transactions()
            .await
            .expect("Failed to count"),
        2
    );
}

#[tokio::test]
async fn overspending_is_rejected() {
    let _env = isolated_env();
    let (wallet_a, addr_a) = new_wallet();
    let (_, addr_b) = new_wallet();

    let chain = ChainService::initialize(addr_a.as_str())
        .await
        .expect("Failed to create chain");
    let utxo_set = UTXOSet::new(chain.clone());
    utxo_set.reindex().await.expect("Failed to reindex");

    let result =
        Transaction::new_utxo_transaction(&wallet_a, addr_b.as_str(), SUBSIDY + 1, &utxo_set).await;
    assert!(matches!(result, Err(CoinError::NotEnoughFunds)));
}

#[tokio::test]
async fn chained_spends_keep_index_consistent() {
    let _env = isolated_env();
    let (wallet_a, addr_a) = new_wallet();
    let (wallet_b, addr_b) = new_wallet();
    let (_, addr_m) = new_wallet();

    let chain = ChainService::initialize(addr_a.as_str())
        .await
        .expect("Failed to create chain");
    let utxo_set = UTXOSet::new(chain.clone());
    utxo_set.reindex().await.expect("Failed to reindex");

    // A pays B 4.
    let tx1 = Transaction::new_utxo_transaction(&wallet_a, addr_b.as_str(), 4, &utxo_set)
        .await
        .expect("Failed to build transaction");
    let cb1 =
        Transaction::new_coinbase_tx(addr_m.as_str(), None).expect("Failed to create coinbase");
    let block1 = chain
        .mine_block(&[tx1, cb1])
        .await
        .expect("Failed to mine block");
    utxo_set.update(&block1).await.expect("Failed to update");

    // B pays A 3 out of the freshly received output.
    let tx2 = Transaction::new_utxo_transaction(&wallet_b, addr_a.as_str(), 3, &utxo_set)
        .await
        .expect("Failed to build transaction");
    let cb2 =
        Transaction::new_coinbase_tx(addr_m.as_str(), None).expect("Failed to create coinbase");
    let block2 = chain
        .mine_block(&[tx2, cb2])
        .await
        .expect("Failed to mine block");
    utxo_set.update(&block2).await.expect("Failed to update");

    assert_eq!(balance(&utxo_set, &addr_a).await, 9);
    assert_eq!(balance(&utxo_set, &addr_b).await, 1);
    assert_eq!(balance(&utxo_set, &addr_m).await, 2 * SUBSIDY);

    // Total supply: genesis plus two block subsidies. Every remaining
    // output carries a positive value locked to a 20-byte pubkey hash.
    let projection = chain.find_utxo().await.expect("Failed to scan");
    let mut total = 0;
    for out in projection.values().flat_map(|outputs| outputs.iter()) {
        assert!(out.get_value() > 0);
        assert_eq!(out.get_pub_key_hash().len(), 20);
        total += out.get_value();
    }
    assert_eq!(total, 3 * SUBSIDY);
}

#[tokio::test]
async fn reindex_matches_incrementally_maintained_index() {
    let _env = isolated_env();
    let (wallet_a, addr_a) = new_wallet();
    let (_, addr_b) = new_wallet();
    let (_, addr_m) = new_wallet();

    let chain = ChainService::initialize(addr_a.as_str())
        .await
        .expect("Failed to create chain");
    let utxo_set = UTXOSet::new(chain.clone());
    utxo_set.reindex().await.expect("Failed to reindex");

    let tx = Transaction::new_utxo_transaction(&wallet_a, addr_b.as_str(), 7, &utxo_set)
        .await
        .expect("Failed to build transaction");
    let coinbase =
        Transaction::new_coinbase_tx(addr_m.as_str(), None).expect("Failed to create coinbase");
    let block = chain
        .mine_block(&[tx, coinbase])
        .await
        .expect("Failed to mine block");
    utxo_set.update(&block).await.expect("Failed to update");

    let count_before = utxo_set
        .count_transactions()
        .await
        .expect("Failed to count");
    let balances_before = (
        balance(&utxo_set, &addr_a).await,
        balance(&utxo_set, &addr_b).await,
        balance(&utxo_set, &addr_m).await,
    );

    // Wipe and rebuild from the chain; nothing may change.
    utxo_set.reindex().await.expect("Failed to reindex");

    assert_eq!(
        utxo_set
            .count_transactions()
            .await
            .expect("Failed to count"),
        count_before
    );
    assert_eq!(
        (
            balance(&utxo_set, &addr_a).await,
            balance(&utxo_set, &addr_b).await,
            balance(&utxo_set, &addr_m).await,
        ),
        balances_before
    );
}

#[tokio::test]
async fn verification_rejects_transaction_after_signature_swap() {
    let _env = isolated_env();
    let (wallet_a, addr_a) = new_wallet();
    let (wallet_b, addr_b) = new_wallet();

    let chain = ChainService::initialize(addr_a.as_str())
        .await
        .expect("Failed to create chain");
    let utxo_set = UTXOSet::new(chain.clone());
    utxo_set.reindex().await.expect("Failed to reindex");

    let tx = Transaction::new_utxo_transaction(&wallet_a, addr_b.as_str(), 4, &utxo_set)
        .await
        .expect("Failed to build transaction");
    assert!(tx.verify(&chain).await.expect("Failed to verify"));

    // A transaction signed by the wrong key round-trips the wire but fails
    // verification, so a block carrying it is never mined.
    let mut forged = Transaction::new_utxo_transaction(&wallet_a, addr_b.as_str(), 4, &utxo_set)
        .await
        .expect("Failed to build transaction");
    forged
        .sign(&chain, wallet_b.get_pkcs8())
        .await
        .expect("Failed to re-sign");
    assert!(!forged.verify(&chain).await.expect("Failed to verify"));

    let coinbase =
        Transaction::new_coinbase_tx(addr_a.as_str(), None).expect("Failed to create coinbase");
    let result = chain.mine_block(&[forged, coinbase]).await;
    assert!(matches!(result, Err(CoinError::InvalidTransaction)));
}
