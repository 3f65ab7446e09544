//! Candidate fork tree: every recently accepted block, canonical or not.
//!
//! Siblings and gaps are allowed, and a removed block's descendants stay
//! behind disconnected. Blocks leave only through [`ForkTree::remove`] or
//! [`ForkTree::prune_below`].

use std::collections::{BTreeMap, HashMap, HashSet};

use dpos_types::BlockHash;

use crate::Block;

#[derive(Default)]
pub struct ForkTree {
    candidates: HashMap<BlockHash, Block>,
    /// Block number → ids at that height.
    by_number: BTreeMap<u64, HashSet<BlockHash>>,
}

impl ForkTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `block` under its id. Returns `false` if it was already present.
    pub fn insert(&mut self, id: BlockHash, block: Block) -> bool {
        if self.candidates.contains_key(&id) {
            return false;
        }
        self.by_number.entry(block.number).or_default().insert(id);
        self.candidates.insert(id, block);
        true
    }

    pub fn contains(&self, id: &BlockHash) -> bool {
        self.candidates.contains_key(id)
    }

    pub fn get(&self, id: &BlockHash) -> Option<&Block> {
        self.candidates.get(id)
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn remove(&mut self, id: &BlockHash) -> Option<Block> {
        let block = self.candidates.remove(id)?;
        if let Some(ids) = self.by_number.get_mut(&block.number) {
            ids.remove(id);
            if ids.is_empty() {
                self.by_number.remove(&block.number);
            }
        }
        Some(block)
    }

    /// Drop candidates numbered below `min_number`. Returns how many went.
    pub fn prune_below(&mut self, min_number: u64) -> usize {
        let keep = self.by_number.split_off(&min_number);
        let stale = std::mem::replace(&mut self.by_number, keep);
        let mut pruned = 0;
        for id in stale.into_values().flatten() {
            if self.candidates.remove(&id).is_some() {
                pruned += 1;
            }
        }
        pruned
    }
}
