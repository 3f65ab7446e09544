//! The capability set the peer-to-peer layer consumes.
//!
//! The transport decodes wire messages into [`Block`]s and [`Transaction`]s
//! and calls in here; it never touches chain state any other way. Outbound
//! traffic goes through [`dpos_types::Broadcaster`].

use dpos_ledger::{Block, PushOutcome};
use dpos_transactions::Transaction;
use dpos_types::{BlockHash, TxHash};

use crate::NodeError;

/// Most block ids returned for one sync request.
pub const MAX_LOST_BLOCK_IDS: usize = 2_000;

/// An inventory entry a peer can ask about. The variant is the item kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InventoryItem {
    Block(BlockHash),
    Transaction(TxHash),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Block(Block),
    Transaction(Transaction),
}

pub trait NodeDelegate {
    /// Validate and push an inbound block.
    fn handle_block(&mut self, block: Block) -> Result<PushOutcome, NodeError>;

    /// Queue an inbound transaction. `Ok(false)` when it was already pending,
    /// already committed, or the pool is full.
    fn handle_transaction(&mut self, tx: Transaction) -> Result<bool, NodeError>;

    /// Canonical ids a peer with chain `summary` is missing, oldest first.
    fn get_lost_block_ids(&self, summary: &[BlockHash]) -> Result<Vec<BlockHash>, NodeError>;

    /// Sparse list of canonical ids from `from` (genesis when zero) to head,
    /// followed by `known`.
    fn get_block_chain_summary(
        &self,
        from: &BlockHash,
        known: &[BlockHash],
    ) -> Result<Vec<BlockHash>, NodeError>;

    fn get_data(&self, item: &InventoryItem) -> Result<Option<Message>, NodeError>;

    fn get_head_block_id(&self) -> BlockHash;

    fn contains(&self, item: &InventoryItem) -> Result<bool, NodeError>;

    fn get_genesis_block(&self) -> BlockHash;
}
