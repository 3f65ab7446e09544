//! Pending transaction pool.
//!
//! Transactions wait here, in arrival order, until a block includes them or
//! they fail validation during assembly. A transaction that does not fit the
//! current block stays queued for the next one.

use std::collections::{HashSet, VecDeque};

use dpos_transactions::Transaction;
use dpos_types::TxHash;

/// Maximum queued transactions before new arrivals are refused.
const DEFAULT_MAX_PENDING: usize = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolInsert {
    Added,
    Duplicate,
    Full,
}

pub struct PendingPool {
    queue: VecDeque<(TxHash, Transaction)>,
    ids: HashSet<TxHash>,
    max_size: usize,
}

impl PendingPool {
    pub fn new(max_size: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            ids: HashSet::new(),
            max_size,
        }
    }

    pub fn with_default_size() -> Self {
        Self::new(DEFAULT_MAX_PENDING)
    }

    pub fn insert(&mut self, tx: Transaction) -> PoolInsert {
        let id = tx.id();
        if self.ids.contains(&id) {
            return PoolInsert::Duplicate;
        }
        if self.queue.len() >= self.max_size {
            return PoolInsert::Full;
        }
        self.ids.insert(id);
        self.queue.push_back((id, tx));
        PoolInsert::Added
    }

    pub fn contains(&self, id: &TxHash) -> bool {
        self.ids.contains(id)
    }

    pub fn get(&self, id: &TxHash) -> Option<&Transaction> {
        if !self.ids.contains(id) {
            return None;
        }
        self.queue.iter().find(|(k, _)| k == id).map(|(_, tx)| tx)
    }

    /// Copy of the queue in arrival order, for a two-phase drain: decide on
    /// the snapshot, then [`remove`](Self::remove) what was consumed.
    pub fn snapshot(&self) -> Vec<(TxHash, Transaction)> {
        self.queue.iter().cloned().collect()
    }

    /// Remove the given ids, keeping the relative order of the rest.
    /// Returns how many were present.
    pub fn remove<'a>(&mut self, ids: impl IntoIterator<Item = &'a TxHash>) -> usize {
        let doomed: HashSet<TxHash> = ids
            .into_iter()
            .filter(|id| self.ids.contains(*id))
            .copied()
            .collect();
        if doomed.is_empty() {
            return 0;
        }
        self.queue.retain(|(id, _)| !doomed.contains(id));
        self.ids.retain(|id| !doomed.contains(id));
        doomed.len()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
