//! Named spans for the block pipeline.
//!
//! Consistent span names and fields make it easy to filter and correlate
//! a block's path through push, production, and transaction application.

use dpos_types::{Address, BlockHash, TxHash};
use tracing::{info_span, Span};

/// Span covering validation and fork choice for one inbound block.
pub fn block_push_span(block: &BlockHash, number: u64) -> Span {
    info_span!("block_push", block = %block, number)
}

/// Span covering one local production attempt.
pub fn block_produce_span(slot: u64, witness: &Address) -> Span {
    info_span!("block_produce", slot, witness = %witness)
}

/// Span covering application of one transaction.
pub fn tx_apply_span(tx: &TxHash) -> Span {
    info_span!("tx_apply", tx = %tx)
}
