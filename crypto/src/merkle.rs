//! Merkle root over transaction ids.
//!
//! Leaves are transaction ids in block order. Each level hashes adjacent
//! pairs; an odd trailing node is paired with itself. An empty body has the
//! all-zero root, and a single transaction's root is its own id.

use dpos_types::{BlockHash, TxHash};

use crate::hash::blake2b_256_multi;

pub fn merkle_root(leaves: &[TxHash]) -> BlockHash {
    if leaves.is_empty() {
        return BlockHash::ZERO;
    }

    let mut level: Vec<[u8; 32]> = leaves.iter().map(|id| *id.as_bytes()).collect();
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| {
                let right = pair.get(1).unwrap_or(&pair[0]);
                blake2b_256_multi(&[&pair[0], right])
            })
            .collect();
    }
    BlockHash::new(level[0])
}
