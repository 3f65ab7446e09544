//! Chain-wide state: the head pointer and participation accounting.

use std::sync::Arc;

use dpos_types::params::PARTICIPATION_WINDOW;
use dpos_types::{BlockHash, Timestamp};
use serde::{Deserialize, Serialize};

use crate::codec::{decode, encode};
use crate::{KvStore, Namespace, StoreError, WriteBatch};

const CHAIN_STATE_KEY: &[u8] = b"chain_state";

/// Head-of-chain summary, updated only when a block becomes canonical.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainProperties {
    pub latest_block_hash: BlockHash,
    pub latest_block_number: u64,
    pub latest_block_timestamp: Timestamp,
    /// Set while the head block closed a maintenance interval.
    pub maintenance: bool,
    /// One bit per recent slot, newest in bit 0; set when the slot produced a block.
    pub recent_slots_filled: u128,
}

impl ChainProperties {
    /// State right after genesis: every tracked slot counts as filled.
    pub fn genesis(hash: BlockHash, timestamp: Timestamp) -> Self {
        Self {
            latest_block_hash: hash,
            latest_block_number: 0,
            latest_block_timestamp: timestamp,
            maintenance: false,
            recent_slots_filled: u128::MAX,
        }
    }

    /// Advance the head to a new canonical block, recording `missed_slots`
    /// empty slots before it.
    pub fn advance(
        &mut self,
        hash: BlockHash,
        number: u64,
        timestamp: Timestamp,
        missed_slots: u64,
    ) {
        self.recent_slots_filled = Self::shift_in_block(self.recent_slots_filled, missed_slots);
        self.latest_block_hash = hash;
        self.latest_block_number = number;
        self.latest_block_timestamp = timestamp;
    }

    /// Slot bitmap after `missed_slots` empty slots followed by a filled one.
    pub fn shift_in_block(bits: u128, missed_slots: u64) -> u128 {
        let shift = u32::try_from(missed_slots).unwrap_or(u32::MAX);
        let history = bits.checked_shl(shift).unwrap_or(0);
        (history << 1) | 1
    }

    /// Percentage (0..=100) of the last 128 slots that produced a block.
    pub fn participation_rate(&self) -> u8 {
        (self.recent_slots_filled.count_ones() * 100 / PARTICIPATION_WINDOW) as u8
    }
}

#[derive(Clone)]
pub struct PropertiesStore {
    kv: Arc<dyn KvStore>,
}

impl PropertiesStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    pub fn get(&self) -> Result<Option<ChainProperties>, StoreError> {
        self.kv
            .get(Namespace::Properties, CHAIN_STATE_KEY)?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    pub fn put(&self, properties: &ChainProperties) -> Result<(), StoreError> {
        self.kv
            .put(Namespace::Properties, CHAIN_STATE_KEY, &encode(properties)?)
    }

    pub fn stage(batch: &mut WriteBatch, properties: &ChainProperties) -> Result<(), StoreError> {
        batch.put(Namespace::Properties, CHAIN_STATE_KEY, encode(properties)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn genesis() -> ChainProperties {
        ChainProperties::genesis(BlockHash::new([1; 32]), Timestamp::from_millis(0))
    }

    #[test]
    fn genesis_participation_is_full() {
        assert_eq!(genesis().participation_rate(), 100);
    }

    #[test]
    fn missed_slots_lower_participation() {
        let mut props = genesis();
        props.advance(BlockHash::new([2; 32]), 1, Timestamp::from_millis(3_000), 64);
        // 64 fresh zeros plus the new block leave 63 of the old ones and the new bit.
        assert_eq!(props.recent_slots_filled.count_ones(), 64);
        assert_eq!(props.participation_rate(), 50);
        assert_eq!(props.latest_block_number, 1);
    }

    #[test]
    fn long_gap_clears_history() {
        let mut props = genesis();
        props.advance(BlockHash::new([2; 32]), 1, Timestamp::from_millis(3_000), 10_000);
        assert_eq!(props.recent_slots_filled, 1);
        assert_eq!(props.participation_rate(), 0);
    }
}
