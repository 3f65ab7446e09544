//! The chain engine: sole owner of every piece of mutable chain state.
//!
//! Inbound blocks, inbound transactions, and local production all go through
//! one `ChainEngine` value. The node wraps it in a single async mutex, so
//! pushes, applies, assemblies, and rotations never interleave. Readers that
//! only need the head subscribe to a `watch` channel updated after every
//! head change.

use std::collections::HashSet;
use std::sync::Arc;

use dpos_consensus::ConsensusScheduler;
use dpos_ledger::{Block, BlockSource, ChainError, ChainStore, PushOutcome};
use dpos_store::{Account, ChainProperties, KvStore, LedgerState, StoreError, Witness};
use dpos_transactions::{tally_and_rotate_active_witnesses, Transaction, TransactionApplier, TxError};
use dpos_types::{Address, BlockHash, ChainParams, PrivateKey, Timestamp, TxHash};
use tokio::sync::watch;

use crate::assembler::BlockAssembler;
use crate::config::GenesisAllocation;
use crate::delegate::{InventoryItem, Message, NodeDelegate, MAX_LOST_BLOCK_IDS};
use crate::metrics::NodeMetrics;
use crate::pool::{PendingPool, PoolInsert};
use crate::shutdown::CancelToken;
use crate::tracing_spans::{block_push_span, tx_apply_span};
use crate::NodeError;

pub struct ChainEngine {
    chain: ChainStore,
    state: LedgerState,
    applier: TransactionApplier,
    scheduler: ConsensusScheduler,
    pool: PendingPool,
    assembler: BlockAssembler,
    metrics: Arc<NodeMetrics>,
    head_tx: watch::Sender<ChainProperties>,
}

impl ChainEngine {
    /// Open the chain in `kv`. A fresh store gets the genesis block and the
    /// `genesis` allocation; an existing one must have the same genesis.
    pub fn open(
        kv: Arc<dyn KvStore>,
        params: ChainParams,
        genesis: &GenesisAllocation,
        metrics: Arc<NodeMetrics>,
        cancel: CancelToken,
    ) -> Result<Self, NodeError> {
        let chain = ChainStore::open(kv.clone(), params.clone()).map_err(|e| match e {
            ChainError::GenesisMismatch { stored, configured } => {
                NodeError::GenesisMismatch { stored, configured }
            }
            other => other.into(),
        })?;
        let state = LedgerState::new(kv);
        if chain.was_created() {
            install_genesis(&state, genesis, params.max_active_witnesses)?;
        }

        let mut scheduler = ConsensusScheduler::new(params.clone());
        scheduler.set_active_witnesses(state.witnesses.active_addresses()?);
        let (head_tx, _) = watch::channel(*chain.head());

        let mut engine = Self {
            chain,
            state,
            applier: TransactionApplier::new(),
            scheduler,
            pool: PendingPool::with_default_size(),
            assembler: BlockAssembler::new(params.block_size_budget, cancel),
            metrics,
            head_tx,
        };
        engine.align_schedule()?;
        engine.refresh_gauges();

        let head = engine.head();
        tracing::info!(
            head = %head.latest_block_hash,
            number = head.latest_block_number,
            active_witnesses = engine.scheduler.active_witnesses().len(),
            "chain engine opened"
        );
        Ok(engine)
    }

    pub fn head(&self) -> ChainProperties {
        *self.chain.head()
    }

    /// Receiver that sees every head change as a whole record.
    pub fn subscribe_head(&self) -> watch::Receiver<ChainProperties> {
        self.head_tx.subscribe()
    }

    pub fn chain(&self) -> &ChainStore {
        &self.chain
    }

    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    pub fn scheduler(&self) -> &ConsensusScheduler {
        &self.scheduler
    }

    pub fn pool(&self) -> &PendingPool {
        &self.pool
    }

    /// Reshuffle the witness ordering if the head closes a round.
    pub fn rotate_if_due(&mut self) -> bool {
        let head = self.head();
        self.scheduler.rotate_if_due(&head)
    }

    /// Assemble, sign, and commit a block for `witness` at `when`.
    pub fn produce_block(
        &mut self,
        witness: Address,
        key: &PrivateKey,
        when: Timestamp,
    ) -> Result<Block, NodeError> {
        self.metrics.block_assemblies.inc();
        let built = self.assembler.assemble(
            &mut self.chain,
            &self.state,
            &mut self.pool,
            witness,
            key,
            when,
        )?;

        self.metrics
            .transactions_applied
            .inc_by(built.block.transactions.len() as u64);
        self.metrics.transactions_dropped.inc_by(built.dropped as u64);
        self.metrics.transactions_postponed.inc_by(built.postponed as u64);

        if let PushOutcome::NewHead { attached, detached } = &built.outcome {
            self.on_new_head(attached, detached, Some(built.block.id()))?;
        }
        self.metrics.blocks_produced.inc();
        tracing::info!(
            block = %built.block.id(),
            number = built.block.number,
            transactions = built.block.transactions.len(),
            "produced block"
        );
        Ok(built.block)
    }

    /// A head-extending network block must come from the witness scheduled
    /// for its slot. Side-chain blocks are checked only for linkage and
    /// signature; their schedule depends on state we do not hold.
    fn check_scheduled_witness(&self, block: &Block) -> Result<(), NodeError> {
        let head = self.head();
        if block.parent != head.latest_block_hash {
            return Ok(());
        }
        let slot = self.scheduler.slot_at_time(block.timestamp, &head);
        if slot == 0 {
            return Err(ChainError::BadBlock(format!(
                "timestamp {} precedes the next slot",
                block.timestamp
            ))
            .into());
        }
        let expected = self.scheduler.scheduled_witness(slot, &head)?;
        if expected != block.witness {
            return Err(ChainError::BadBlock(format!(
                "witness {} is not scheduled for slot {slot}, expected {expected}",
                block.witness
            ))
            .into());
        }
        Ok(())
    }

    /// Bookkeeping after the canonical chain changed: apply the newly
    /// canonical blocks, clear their transactions from the pool, run
    /// maintenance, realign the schedule, and prune old forks.
    ///
    /// `produced` names a block whose transactions were already applied
    /// during local assembly.
    fn on_new_head(
        &mut self,
        attached: &[Block],
        detached: &[Block],
        produced: Option<BlockHash>,
    ) -> Result<(), NodeError> {
        if !detached.is_empty() {
            // There is no undo log; effects of the abandoned blocks stay applied.
            tracing::warn!(
                detached = detached.len(),
                attached = attached.len(),
                "chain reorganized, abandoned block effects are not reverted"
            );
        }

        // Abandoned blocks stay applied, so their transactions are not applied again.
        let already_applied: HashSet<TxHash> = detached
            .iter()
            .flat_map(|block| block.transaction_ids())
            .collect();

        for block in attached {
            let id = block.id();
            if produced != Some(id) {
                self.apply_block_transactions(block, &already_applied)?;
            }
            self.pool.remove(block.transaction_ids().iter());
            if self.is_maintenance_block(block.number) {
                self.run_maintenance(block.number)?;
            }
        }

        let maintenance = self.is_maintenance_block(self.head().latest_block_number);
        self.chain.set_maintenance(maintenance)?;
        self.align_schedule()?;
        self.chain.prune_forks();
        self.head_tx.send_replace(self.head());
        self.refresh_gauges();
        Ok(())
    }

    fn apply_block_transactions(
        &mut self,
        block: &Block,
        skip: &HashSet<TxHash>,
    ) -> Result<(), NodeError> {
        for tx in &block.transactions {
            let id = tx.id();
            if skip.contains(&id) {
                continue;
            }
            let _span = tx_apply_span(&id).entered();
            match self.applier.apply(tx, &self.state) {
                Ok(_) => self.metrics.transactions_applied.inc(),
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    self.metrics.transactions_dropped.inc();
                    tracing::warn!(
                        tx = %id,
                        block = %block.id(),
                        error = %e,
                        "transaction in canonical block failed to apply"
                    );
                }
            }
        }
        Ok(())
    }

    fn is_maintenance_block(&self, number: u64) -> bool {
        let interval = self.chain.params().maintenance_interval_blocks;
        interval > 0 && number > 0 && number % interval == 0
    }

    fn run_maintenance(&mut self, number: u64) -> Result<(), NodeError> {
        let params = self.chain.params();
        let tally = tally_and_rotate_active_witnesses(
            &self.state,
            params.max_active_witnesses,
            params.witness_rank_order,
        )?;
        match tally {
            Some(active) => {
                tracing::info!(number, active = active.len(), "maintenance installed new active set");
                self.scheduler.set_active_witnesses(active);
            }
            None => tracing::info!(number, "maintenance kept the previous active set"),
        }
        Ok(())
    }

    /// Make the witness ordering match what every node with this chain
    /// computes: the active set shuffled with the block that opened the
    /// current round.
    fn align_schedule(&mut self) -> Result<(), NodeError> {
        let head = self.head();
        if self.scheduler.rotate_if_due(&head) {
            return Ok(());
        }
        let Some(anchor) = self.scheduler.rotation_anchor(head.latest_block_number) else {
            return Ok(());
        };
        let Some(anchor_id) = self.chain.get_block_id_by_number(anchor)? else {
            return Ok(());
        };
        if self.scheduler.last_rotation() == Some(anchor_id) {
            return Ok(());
        }
        let anchor_block = self
            .chain
            .get_block(&anchor_id)?
            .ok_or(ChainError::ChainUnreachable(anchor_id))?;
        self.scheduler.reshuffle(anchor_id, anchor_block.timestamp);
        Ok(())
    }

    fn refresh_gauges(&self) {
        let head = self.head();
        self.metrics
            .head_block_number
            .set(head.latest_block_number as i64);
        self.metrics
            .participation_rate
            .set(head.participation_rate() as i64);
        self.metrics.pending_transactions.set(self.pool.len() as i64);
    }

    /// Canonical block id at `number`; the canonical chain is contiguous, so
    /// a gap is corruption.
    fn canonical_id(&self, number: u64) -> Result<BlockHash, NodeError> {
        self.chain.get_block_id_by_number(number)?.ok_or_else(|| {
            StoreError::Corruption(format!("canonical chain has no block {number}")).into()
        })
    }

    /// Number of `id` if it is on the canonical chain.
    fn canonical_number(&self, id: &BlockHash) -> Result<Option<u64>, NodeError> {
        let Some(block) = self.chain.get_block(id)? else {
            return Ok(None);
        };
        let on_chain = self.chain.get_block_id_by_number(block.number)? == Some(*id);
        Ok(on_chain.then_some(block.number))
    }

    fn committed_transaction(&self, id: &dpos_types::TxHash) -> Result<Option<Transaction>, NodeError> {
        let Some(block_id) = self.chain.transaction_block(id)? else {
            return Ok(None);
        };
        let Some(block) = self.chain.get_block(&block_id)? else {
            return Ok(None);
        };
        Ok(block.transactions.into_iter().find(|tx| tx.id() == *id))
    }
}

fn install_genesis(
    state: &LedgerState,
    genesis: &GenesisAllocation,
    max_active: usize,
) -> Result<(), NodeError> {
    let accounts: Vec<Account> = genesis
        .accounts
        .iter()
        .map(|(address, balance)| Account::new(*address, *balance))
        .collect();
    state.accounts.put_all(&accounts)?;

    let witnesses: Vec<Witness> = genesis
        .witnesses
        .iter()
        .enumerate()
        .map(|(i, (address, url))| {
            let mut witness = Witness::new(*address, url.clone());
            witness.is_active = i < max_active;
            witness
        })
        .collect();
    state.witnesses.put_all(&witnesses)?;

    tracing::info!(
        accounts = accounts.len(),
        witnesses = witnesses.len(),
        "installed genesis allocation"
    );
    Ok(())
}

impl NodeDelegate for ChainEngine {
    fn handle_block(&mut self, block: Block) -> Result<PushOutcome, NodeError> {
        let id = block.id();
        let span = block_push_span(&id, block.number);
        let _enter = span.enter();

        if !self.chain.contains_block(&id)? {
            if let Err(e) = self.check_scheduled_witness(&block) {
                self.metrics.blocks_rejected.inc();
                tracing::warn!(block = %id, error = %e, "rejected block");
                return Err(e);
            }
        }

        match self.chain.push(block, BlockSource::Network) {
            Ok(outcome) => {
                match &outcome {
                    PushOutcome::NewHead { attached, detached } => {
                        self.metrics.blocks_accepted.inc();
                        self.on_new_head(attached, detached, None)?;
                        tracing::debug!(block = %id, "block accepted as new head");
                    }
                    PushOutcome::Candidate => {
                        self.metrics.blocks_accepted.inc();
                    }
                    PushOutcome::Duplicate => {}
                }
                Ok(outcome)
            }
            Err(e) if e.is_fatal() => Err(e.into()),
            Err(e) => {
                self.metrics.blocks_rejected.inc();
                tracing::warn!(block = %id, error = %e, "rejected block");
                Err(e.into())
            }
        }
    }

    fn handle_transaction(&mut self, tx: Transaction) -> Result<bool, NodeError> {
        let id = tx.id();
        if self.pool.contains(&id) || self.chain.transaction_block(&id)?.is_some() {
            tracing::trace!(tx = %id, "ignoring known transaction");
            return Ok(false);
        }
        if !tx.verify_signature() {
            return Err(TxError::BadSignature.into());
        }
        let queued = match self.pool.insert(tx) {
            PoolInsert::Added => true,
            PoolInsert::Duplicate => false,
            PoolInsert::Full => {
                tracing::warn!(tx = %id, "pending pool full, transaction refused");
                false
            }
        };
        self.metrics.pending_transactions.set(self.pool.len() as i64);
        Ok(queued)
    }

    fn get_lost_block_ids(&self, summary: &[BlockHash]) -> Result<Vec<BlockHash>, NodeError> {
        let common = if summary.is_empty() {
            0
        } else {
            let mut best = None;
            for id in summary {
                if let Some(number) = self.canonical_number(id)? {
                    best = best.max(Some(number));
                }
            }
            let fallback = summary.last().copied().unwrap_or(BlockHash::ZERO);
            best.ok_or(ChainError::ChainUnreachable(fallback))?
        };

        let head = self.head().latest_block_number;
        let last = head.min(common.saturating_add(MAX_LOST_BLOCK_IDS as u64));
        ((common + 1)..=last).map(|n| self.canonical_id(n)).collect()
    }

    fn get_block_chain_summary(
        &self,
        from: &BlockHash,
        known: &[BlockHash],
    ) -> Result<Vec<BlockHash>, NodeError> {
        let low = if from.is_zero() {
            0
        } else {
            self.canonical_number(from)?
                .ok_or(ChainError::ChainUnreachable(*from))?
        };
        let high = self.head().latest_block_number;

        let mut summary = Vec::new();
        let mut n = low;
        while n < high {
            summary.push(self.canonical_id(n)?);
            n += ((high - n) / 2).max(1);
        }
        summary.push(self.canonical_id(high)?);
        summary.extend_from_slice(known);
        Ok(summary)
    }

    fn get_data(&self, item: &InventoryItem) -> Result<Option<Message>, NodeError> {
        match item {
            InventoryItem::Block(id) => Ok(self.chain.get_block(id)?.map(Message::Block)),
            InventoryItem::Transaction(id) => {
                if let Some(tx) = self.pool.get(id) {
                    return Ok(Some(Message::Transaction(tx.clone())));
                }
                Ok(self.committed_transaction(id)?.map(Message::Transaction))
            }
        }
    }

    fn get_head_block_id(&self) -> BlockHash {
        self.chain.head().latest_block_hash
    }

    fn contains(&self, item: &InventoryItem) -> Result<bool, NodeError> {
        match item {
            InventoryItem::Block(id) => Ok(self.chain.contains_block(id)?),
            InventoryItem::Transaction(id) => {
                Ok(self.pool.contains(id) || self.chain.transaction_block(id)?.is_some())
            }
        }
    }

    fn get_genesis_block(&self) -> BlockHash {
        self.chain.genesis_id()
    }
}
