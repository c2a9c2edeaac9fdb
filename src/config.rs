use crate::wallet::WalletAddress;
use once_cell::sync::Lazy;
use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::RwLock;

pub static GLOBAL_CONFIG: Lazy<Config> = Lazy::new(Config::new);

/// Bootstrap peer every fresh node greets first. The node whose listen
/// address equals this one is the central node and never mines.
pub static CENTRAL_NODE: Lazy<SocketAddr> = Lazy::new(|| {
    env::var("CENTRAL_NODE")
        .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
        .parse()
        .expect("CENTRAL_NODE environment variable is not a valid socket address")
});

pub const NODE_VERSION: usize = 1;

const NODE_ID_KEY: &str = "NODE_ID";
const DEFAULT_NODE_ID: &str = "3000";
const DEFAULT_PORT: u16 = 3000;

///
/// Process-wide configuration. `NODE_ID` selects the listening port
/// (`127.0.0.1:<NODE_ID>`) and the store/wallet file names, so several nodes
/// can run side by side from the same working directory.
///
pub struct Config {
    node_id: String,
    node_addr: SocketAddr,
    mining_addr: RwLock<Option<WalletAddress>>,
}

impl Config {
    pub fn new() -> Config {
        let node_id = env::var(NODE_ID_KEY).unwrap_or_else(|_| DEFAULT_NODE_ID.to_string());
        let port = node_id.parse().unwrap_or(DEFAULT_PORT);
        Config {
            node_id,
            node_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port),
            mining_addr: RwLock::new(None),
        }
    }

    pub fn get_node_id(&self) -> &str {
        self.node_id.as_str()
    }

    pub fn get_node_addr(&self) -> SocketAddr {
        self.node_addr
    }

    pub fn set_mining_addr(&self, addr: &WalletAddress) {
        let mut mining_addr = self.mining_addr.write().unwrap();
        *mining_addr = Some(addr.clone());
    }

    pub fn get_mining_addr(&self) -> Option<WalletAddress> {
        self.mining_addr.read().unwrap().clone()
    }

    pub fn is_miner(&self) -> bool {
        self.mining_addr.read().unwrap().is_some()
    }

    /// Directory holding the sled database. Read from the environment on
    /// every call so tests can point each fixture at its own directory.
    pub fn data_dir(&self) -> String {
        env::var("DATA_DIR").unwrap_or_else(|_| format!("data_{}", self.node_id))
    }

    pub fn wallet_file(&self) -> String {
        env::var("WALLET_FILE").unwrap_or_else(|_| format!("wallet_{}.dat", self.node_id))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
