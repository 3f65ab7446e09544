//! Genesis block construction.
//!
//! The genesis block is number 0 with a zero parent, the configured genesis
//! timestamp, a zero witness, and an empty body. Nodes configured with the
//! same chain parameters derive the same genesis id.

use dpos_types::{Address, BlockHash, ChainParams, Timestamp};

use crate::Block;

pub fn create_genesis_block(params: &ChainParams) -> Block {
    Block::new(
        0,
        BlockHash::ZERO,
        Timestamp::from_millis(params.genesis_timestamp_ms),
        Address::ZERO,
        Vec::new(),
    )
}
