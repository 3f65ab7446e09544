//! Canonical chain store.
//!
//! Owns the candidate [`ForkTree`], the durable block store with its
//! number → id index, and the cached [`ChainProperties`] head. Callers
//! serialize access; nothing here locks.

use std::collections::HashSet;
use std::sync::Arc;

use dpos_store::{BlockStore, ChainProperties, KvStore, PropertiesStore, StoreError, WriteBatch};
use dpos_types::{BlockHash, ChainParams, Timestamp, TxHash};

use crate::genesis::create_genesis_block;
use crate::{Block, ChainError, ForkTree};

/// Where a pushed block came from. Locally produced blocks skip signature
/// and merkle checks; the assembler built them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockSource {
    Local,
    Network,
}

#[derive(Debug, PartialEq, Eq)]
pub enum PushOutcome {
    /// Already known; nothing changed.
    Duplicate,
    /// Stored as a candidate; head unchanged.
    Candidate,
    /// Head moved. `attached` are the newly canonical blocks in ascending
    /// order ending with the new head; `detached` are the blocks that left
    /// the canonical chain, ascending.
    NewHead {
        attached: Vec<Block>,
        detached: Vec<Block>,
    },
}

pub struct ChainStore {
    params: ChainParams,
    forest: ForkTree,
    blocks: BlockStore,
    properties: PropertiesStore,
    head: ChainProperties,
    genesis_id: BlockHash,
    created: bool,
}

impl ChainStore {
    /// Open the chain in `kv`, writing the genesis block if the store is empty.
    ///
    /// Fails with [`ChainError::GenesisMismatch`] when the store holds a
    /// chain with a different genesis.
    pub fn open(kv: Arc<dyn KvStore>, params: ChainParams) -> Result<Self, ChainError> {
        let blocks = BlockStore::new(kv.clone());
        let properties = PropertiesStore::new(kv);
        let genesis = create_genesis_block(&params);
        let genesis_id = genesis.id();

        let (head, created) = match properties.get()? {
            Some(head) => {
                let stored = blocks.hash_at(0)?.ok_or_else(|| {
                    StoreError::Corruption("chain state present without genesis".into())
                })?;
                if stored != genesis_id {
                    return Err(ChainError::GenesisMismatch {
                        stored,
                        configured: genesis_id,
                    });
                }
                (head, false)
            }
            None => {
                let head = ChainProperties::genesis(genesis_id, genesis.timestamp);
                let mut batch = WriteBatch::new();
                BlockStore::stage_canonical(&mut batch, &genesis_id, 0, genesis.encode()?, &[]);
                PropertiesStore::stage(&mut batch, &head)?;
                blocks.commit(batch)?;
                tracing::info!(genesis = %genesis_id, "initialized chain with genesis block");
                (head, true)
            }
        };

        Ok(Self {
            params,
            forest: ForkTree::new(),
            blocks,
            properties,
            head,
            genesis_id,
            created,
        })
    }

    /// `true` when [`open`](Self::open) wrote a fresh genesis.
    pub fn was_created(&self) -> bool {
        self.created
    }

    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    pub fn head(&self) -> &ChainProperties {
        &self.head
    }

    pub fn genesis_id(&self) -> BlockHash {
        self.genesis_id
    }

    pub fn candidate_count(&self) -> usize {
        self.forest.len()
    }

    pub fn head_block(&self) -> Result<Block, ChainError> {
        let id = self.head.latest_block_hash;
        self.get_block(&id)?
            .ok_or_else(|| StoreError::Corruption(format!("head block {id} missing")).into())
    }

    /// Validate and insert a block, moving the head if it is now the deepest.
    pub fn push(&mut self, block: Block, source: BlockSource) -> Result<PushOutcome, ChainError> {
        let id = block.id();
        if self.contains_block(&id)? {
            return Ok(PushOutcome::Duplicate);
        }

        let parent = self
            .get_block(&block.parent)?
            .ok_or_else(|| ChainError::BadBlock(format!("unknown parent {}", block.parent)))?;
        if block.number != parent.number + 1 {
            return Err(ChainError::BadBlock(format!(
                "number {} does not follow parent number {}",
                block.number, parent.number
            )));
        }
        if block.timestamp <= parent.timestamp {
            return Err(ChainError::BadBlock(format!(
                "timestamp {} not after parent timestamp {}",
                block.timestamp, parent.timestamp
            )));
        }
        if source == BlockSource::Network {
            if block.compute_merkle_root() != block.merkle_root {
                return Err(ChainError::BadBlock("merkle root mismatch".into()));
            }
            if !block.verify_signature() {
                return Err(ChainError::BadBlock("invalid witness signature".into()));
            }
        }
        self.check_transactions(&block)?;

        let number = block.number;
        let extends_head = block.parent == self.head.latest_block_hash;
        self.forest.insert(id, block.clone());

        // A later arrival never wins a tie, so only a strictly deeper block moves the head.
        if number <= self.head.latest_block_number {
            tracing::debug!(block = %id, number, "stored side-chain candidate");
            return Ok(PushOutcome::Candidate);
        }

        let (attached, detached) = if extends_head {
            (vec![block], Vec::new())
        } else {
            let (to_new, to_old) = self.get_branch(&id, &self.head.latest_block_hash)?;
            tracing::warn!(
                new_head = %id,
                number,
                attached = to_new.len(),
                detached = to_old.len(),
                "switching to a deeper fork"
            );
            (to_new, to_old)
        };
        self.commit_canonical(&attached, &detached)?;
        Ok(PushOutcome::NewHead { attached, detached })
    }

    /// Reject a block that repeats a transaction, within itself or against
    /// the chain it builds on.
    ///
    /// The merkle root pairs an odd last leaf with itself, so a list with its
    /// last id repeated hashes to the same root; uniqueness has to be checked
    /// here rather than inferred from the block id.
    fn check_transactions(&self, block: &Block) -> Result<(), ChainError> {
        let ids = block.transaction_ids();
        if ids.is_empty() {
            return Ok(());
        }
        let mut seen = HashSet::with_capacity(ids.len());
        if let Some(repeated) = ids.iter().find(|tx| !seen.insert(**tx)) {
            return Err(ChainError::BadBlock(format!("duplicate transaction {repeated}")));
        }

        // Side-branch ancestors are not in the transaction index.
        let mut branch = HashSet::new();
        let mut cursor = block.parent;
        let fork_number = loop {
            let ancestor = self
                .get_block(&cursor)?
                .ok_or(ChainError::ChainUnreachable(cursor))?;
            if self.get_block_id_by_number(ancestor.number)? == Some(cursor) {
                break ancestor.number;
            }
            branch.extend(ancestor.transaction_ids());
            cursor = ancestor.parent;
        };

        for tx in &ids {
            let replayed = if branch.contains(tx) {
                true
            } else {
                match self.transaction_block(tx)? {
                    Some(included) => matches!(
                        self.get_block(&included)?,
                        Some(b) if b.number <= fork_number
                    ),
                    None => false,
                }
            };
            if replayed {
                return Err(ChainError::BadBlock(format!(
                    "transaction {tx} already included in an ancestor"
                )));
            }
        }
        Ok(())
    }

    fn commit_canonical(&mut self, attached: &[Block], detached: &[Block]) -> Result<(), ChainError> {
        let mut batch = WriteBatch::new();
        // Detached blocks keep their bytes so the abandoned branch stays reachable.
        for block in detached {
            self.blocks
                .stage_unindex(&mut batch, &block.id(), block.number, &block.transaction_ids())?;
        }

        let mut head = self.head;
        for block in attached {
            let id = block.id();
            BlockStore::stage_canonical(
                &mut batch,
                &id,
                block.number,
                block.encode()?,
                &block.transaction_ids(),
            );
            let missed = self.missed_slots(head.latest_block_timestamp, block.timestamp);
            head.advance(id, block.number, block.timestamp, missed);
        }
        // Advancing from the old head would count slots of the abandoned branch.
        match attached.last() {
            Some(tip) if !detached.is_empty() => {
                head.recent_slots_filled = self.replay_participation(tip)?;
            }
            _ => {}
        }
        PropertiesStore::stage(&mut batch, &head)?;
        self.blocks.commit(batch)?;
        self.head = head;
        Ok(())
    }

    /// Rebuild the slot bitmap for `tip` from its own ancestry, back to
    /// genesis or until the window is covered.
    fn replay_participation(&self, tip: &Block) -> Result<u128, ChainError> {
        let mut gaps = Vec::new();
        let mut covered = 0u64;
        let mut block = tip.clone();
        while block.number > 0 && covered < u64::from(u128::BITS) {
            let parent = self
                .get_block(&block.parent)?
                .ok_or(ChainError::ChainUnreachable(block.parent))?;
            let missed = self.missed_slots(parent.timestamp, block.timestamp);
            covered = covered.saturating_add(missed).saturating_add(1);
            gaps.push(missed);
            block = parent;
        }

        let mut bits = if block.number == 0 { u128::MAX } else { 0 };
        for missed in gaps.into_iter().rev() {
            bits = ChainProperties::shift_in_block(bits, missed);
        }
        Ok(bits)
    }

    /// Empty slots between two consecutive canonical block times.
    fn missed_slots(&self, previous: Timestamp, next: Timestamp) -> u64 {
        let interval = self.params.block_interval_ms.max(1);
        let genesis = self.params.genesis_timestamp_ms;
        let slot = |t: Timestamp| (t.as_millis() - genesis).max(0) / interval;
        (slot(next) - slot(previous) - 1).max(0) as u64
    }

    /// Candidates first, then durable storage.
    pub fn contains_block(&self, id: &BlockHash) -> Result<bool, ChainError> {
        Ok(self.forest.contains(id) || self.blocks.has_block(id)?)
    }

    /// Candidates first, then durable storage.
    pub fn get_block(&self, id: &BlockHash) -> Result<Option<Block>, ChainError> {
        if let Some(block) = self.forest.get(id) {
            return Ok(Some(block.clone()));
        }
        self.blocks
            .get_block(id)?
            .map(|bytes| Block::decode(&bytes))
            .transpose()
    }

    /// Canonical id at `number`. Canonical blocks are always written through
    /// to durable storage, so the index is authoritative.
    pub fn get_block_id_by_number(&self, number: u64) -> Result<Option<BlockHash>, ChainError> {
        if number > self.head.latest_block_number {
            return Ok(None);
        }
        Ok(self.blocks.hash_at(number)?)
    }

    pub fn is_canonical(&self, id: &BlockHash) -> Result<bool, ChainError> {
        match self.get_block(id)? {
            Some(block) => Ok(self.get_block_id_by_number(block.number)? == Some(*id)),
            None => Ok(false),
        }
    }

    /// Id of the canonical block that included `tx`.
    pub fn transaction_block(&self, tx: &TxHash) -> Result<Option<BlockHash>, ChainError> {
        Ok(self.blocks.transaction_block(tx)?)
    }

    /// Walk `a` and `b` back to their common ancestor.
    ///
    /// Returns the blocks after the ancestor on each side, ascending, each
    /// ending with the tip it started from. Equal ids give two empty paths.
    pub fn get_branch(
        &self,
        a: &BlockHash,
        b: &BlockHash,
    ) -> Result<(Vec<Block>, Vec<Block>), ChainError> {
        let load = |id: &BlockHash| -> Result<Block, ChainError> {
            self.get_block(id)?.ok_or(ChainError::ChainUnreachable(*id))
        };

        let (mut left_id, mut left) = (*a, load(a)?);
        let (mut right_id, mut right) = (*b, load(b)?);
        let mut left_path = Vec::new();
        let mut right_path = Vec::new();

        while left_id != right_id {
            if left.number >= right.number {
                if left.number == 0 {
                    return Err(ChainError::ChainUnreachable(*a));
                }
                left_id = left.parent;
                left_path.push(std::mem::replace(&mut left, load(&left_id)?));
            } else {
                right_id = right.parent;
                right_path.push(std::mem::replace(&mut right, load(&right_id)?));
            }
        }

        left_path.reverse();
        right_path.reverse();
        Ok((left_path, right_path))
    }

    /// Remove a block from the candidates and from durable storage, including
    /// its index entries. If it was head, its parent becomes head.
    pub fn delete_block(&mut self, id: &BlockHash) -> Result<(), ChainError> {
        let block = self
            .get_block(id)?
            .ok_or_else(|| ChainError::BadBlock(format!("unknown block {id}")))?;
        if block.number == 0 {
            return Err(ChainError::BadBlock("genesis block cannot be deleted".into()));
        }

        let mut batch = WriteBatch::new();
        self.blocks
            .stage_removal(&mut batch, id, block.number, &block.transaction_ids())?;

        let mut head = self.head;
        if head.latest_block_hash == *id {
            let parent = self
                .get_block(&block.parent)?
                .ok_or(ChainError::ChainUnreachable(block.parent))?;
            head.latest_block_hash = block.parent;
            head.latest_block_number = parent.number;
            head.latest_block_timestamp = parent.timestamp;
            PropertiesStore::stage(&mut batch, &head)?;
        }

        self.blocks.commit(batch)?;
        self.forest.remove(id);
        if head != self.head {
            tracing::warn!(deleted = %id, new_head = %head.latest_block_hash, "head block deleted");
            self.head = head;
        }
        Ok(())
    }

    /// Set or clear the maintenance flag on the current head.
    pub fn set_maintenance(&mut self, maintenance: bool) -> Result<(), ChainError> {
        if self.head.maintenance == maintenance {
            return Ok(());
        }
        let mut head = self.head;
        head.maintenance = maintenance;
        self.properties.put(&head)?;
        self.head = head;
        Ok(())
    }

    /// Drop candidates more than `fork_tree_depth` blocks below head.
    pub fn prune_forks(&mut self) -> usize {
        let floor = self
            .head
            .latest_block_number
            .saturating_sub(self.params.fork_tree_depth);
        let pruned = self.forest.prune_below(floor);
        if pruned > 0 {
            tracing::debug!(pruned, floor, "pruned fork candidates");
        }
        pruned
    }
}
