use crate::crypto::sha256_digest;

///
/// Binary hash tree committing to an ordered list of transaction
/// serializations. Leaves hold `SHA256(item)`; internal nodes hold
/// `SHA256(left ‖ right)`. A level with odd cardinality duplicates its last
/// node before pairing.
///
pub struct MerkleTree {
    root: Vec<u8>,
}

impl MerkleTree {
    /// Builds the tree bottom-up. Callers always supply at least one item
    /// (every block carries a coinbase transaction).
    pub fn new(items: &[Vec<u8>]) -> MerkleTree {
        debug_assert!(!items.is_empty());
        let mut level: Vec<Vec<u8>> = items.iter().map(|item| sha256_digest(item)).collect();
        while level.len() > 1 {
            if level.len() % 2 != 0 {
                if let Some(last) = level.last().cloned() {
                    level.push(last);
                }
            }
            let mut next_level = Vec::with_capacity(level.len() / 2);
            for pair in level.chunks(2) {
                let mut node_data = pair[0].clone();
                node_data.extend_from_slice(pair[1].as_slice());
                next_level.push(sha256_digest(node_data.as_slice()));
            }
            level = next_level;
        }
        MerkleTree {
            root: level.into_iter().next().unwrap_or_default(),
        }
    }

    pub fn root_hash(&self) -> &[u8] {
        self.root.as_slice()
    }
}
