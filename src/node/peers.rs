use crate::error::{CoinError, Result};
use std::net::SocketAddr;
use std::sync::RwLock;

///
/// Known-peer set. Insertion-ordered; the first entry is the bootstrap peer.
/// Membership grows on `version`/`addr` messages and shrinks when a peer is
/// unreachable on send.
///
pub struct Peers {
    inner: RwLock<Vec<SocketAddr>>,
}

impl Peers {
    pub fn new(bootstrap: SocketAddr) -> Peers {
        Peers {
            inner: RwLock::new(vec![bootstrap]),
        }
    }

    pub fn add(&self, addr: SocketAddr) -> Result<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|e| CoinError::PoisonedLockError(e.to_string()))?;
        if !inner.contains(&addr) {
            inner.push(addr);
        }
        Ok(())
    }

    pub fn add_all(&self, addrs: &[SocketAddr]) -> Result<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|e| CoinError::PoisonedLockError(e.to_string()))?;
        for addr in addrs {
            if !inner.contains(addr) {
                inner.push(*addr);
            }
        }
        Ok(())
    }

    pub fn evict(&self, addr: &SocketAddr) -> Result<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|e| CoinError::PoisonedLockError(e.to_string()))?;
        inner.retain(|known| known != addr);
        Ok(())
    }

    pub fn contains(&self, addr: &SocketAddr) -> Result<bool> {
        let inner = self
            .inner
            .read()
            .map_err(|e| CoinError::PoisonedLockError(e.to_string()))?;
        Ok(inner.contains(addr))
    }

    pub fn get_all(&self) -> Result<Vec<SocketAddr>> {
        let inner = self
            .inner
            .read()
            .map_err(|e| CoinError::PoisonedLockError(e.to_string()))?;
        Ok(inner.clone())
    }

    pub fn len(&self) -> Result<usize> {
        let inner = self
            .inner
            .read()
            .map_err(|e| CoinError::PoisonedLockError(e.to_string()))?;
        Ok(inner.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn addr(s: &str) -> SocketAddr {
        SocketAddr::from_str(s).expect("Failed to parse address")
    }

    #[test]
    fn test_bootstrap_is_first() {
        let peers = Peers::new(addr("127.0.0.1:3000"));
        peers.add(addr("127.0.0.1:3001")).expect("Failed to add");
        let all = peers.get_all().expect("Failed to list");
        assert_eq!(all[0], addr("127.0.0.1:3000"));
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_add_is_idempotent() {
        let peers = Peers::new(addr("127.0.0.1:3000"));
        peers.add(addr("127.0.0.1:3001")).expect("Failed to add");
        peers.add(addr("127.0.0.1:3001")).expect("Failed to add");
        assert_eq!(peers.len().expect("Failed to count"), 2);
    }

    #[test]
    fn test_evict_removes_peer() {
        let peers = Peers::new(addr("127.0.0.1:3000"));
        peers.add(addr("127.0.0.1:3001")).expect("Failed to add");
        peers
            .evict(&addr("127.0.0.1:3001"))
            .expect("Failed to evict");
        assert!(!peers
            .contains(&addr("127.0.0.1:3001"))
            .expect("Failed to check"));
        assert_eq!(peers.len().expect("Failed to count"), 1);
    }
}
