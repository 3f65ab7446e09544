//! Slot arithmetic and the scheduled witness.
//!
//! Slots are numbered relative to the current head: slot 1 is the first slot
//! boundary after the head block, slot 2 the one after that, and so on.
//! Slot 0 means "no slot yet" and is never scheduled.

use dpos_store::ChainProperties;
use dpos_types::{Address, BlockHash, ChainParams, Timestamp};

use crate::shuffle::shuffle_witnesses;
use crate::ConsensusError;

pub struct ConsensusScheduler {
    params: ChainParams,
    /// Active set sorted by address.
    active: Vec<Address>,
    /// Round-robin order for the current round.
    ordering: Vec<Address>,
    /// Head the ordering was last shuffled at, so a rotation runs once per block.
    last_rotation: Option<BlockHash>,
}

impl ConsensusScheduler {
    pub fn new(params: ChainParams) -> Self {
        Self {
            params,
            active: Vec::new(),
            ordering: Vec::new(),
            last_rotation: None,
        }
    }

    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    fn interval(&self) -> i64 {
        self.params.block_interval_ms.max(1)
    }

    /// Replace the active set. The ordering resets to address order until the
    /// next rotation or [`reshuffle`](Self::reshuffle).
    pub fn set_active_witnesses(&mut self, mut witnesses: Vec<Address>) {
        witnesses.sort();
        witnesses.dedup();
        tracing::info!(count = witnesses.len(), "active witness set installed");
        self.ordering = witnesses.clone();
        self.active = witnesses;
        self.last_rotation = None;
    }

    pub fn active_witnesses(&self) -> &[Address] {
        &self.active
    }

    pub fn ordering(&self) -> &[Address] {
        &self.ordering
    }

    /// Block the current ordering was shuffled at, if any.
    pub fn last_rotation(&self) -> Option<BlockHash> {
        self.last_rotation
    }

    /// Number of the block whose timestamp seeded the current round, for a
    /// chain whose head is at `head_number`. A restarting node reshuffles
    /// with that block to rejoin the network's ordering.
    pub fn rotation_anchor(&self, head_number: u64) -> Option<u64> {
        let n = self.active.len() as u64;
        (n > 0).then(|| head_number - head_number % n)
    }

    /// Shuffle the active set with the timestamp of block `seed_block`.
    pub fn reshuffle(&mut self, seed_block: BlockHash, seed_time: Timestamp) {
        self.ordering = shuffle_witnesses(&self.active, seed_time);
        self.last_rotation = Some(seed_block);
    }

    /// Reshuffle when the head closes a round (`number % active_count == 0`).
    ///
    /// Call once per committed block. Returns `true` if the ordering changed
    /// hands; repeated calls for the same head are no-ops.
    pub fn rotate_if_due(&mut self, head: &ChainProperties) -> bool {
        let n = self.active.len() as u64;
        if n == 0 || head.latest_block_number % n != 0 {
            return false;
        }
        if self.last_rotation == Some(head.latest_block_hash) {
            return false;
        }
        self.reshuffle(head.latest_block_hash, head.latest_block_timestamp);
        tracing::debug!(
            head = %head.latest_block_hash,
            number = head.latest_block_number,
            "witness ordering reshuffled"
        );
        true
    }

    /// Absolute slot index of the head block since genesis.
    fn head_slot(&self, head: &ChainProperties) -> u64 {
        let since_genesis = head.latest_block_timestamp.as_millis() - self.params.genesis_timestamp_ms;
        (since_genesis.max(0) / self.interval()) as u64
    }

    /// Start time of `slot` relative to `head`. Slot 0 returns `now`.
    pub fn slot_time(&self, slot: u64, head: &ChainProperties, now: Timestamp) -> Timestamp {
        if slot == 0 {
            return now;
        }
        let interval = self.interval();
        let genesis = self.params.genesis_timestamp_ms;
        let offset = interval.saturating_mul(slot as i64);

        if head.latest_block_number == 0 {
            return Timestamp::from_millis(genesis.saturating_add(offset));
        }

        let head_time = head.latest_block_timestamp.as_millis();
        let aligned = head_time - (head_time - genesis).rem_euclid(interval);
        let mut at = aligned.saturating_add(offset);
        if head.maintenance {
            at = at.saturating_add(interval.saturating_mul(self.params.maintenance_skip_slots as i64));
        }
        Timestamp::from_millis(at)
    }

    /// Slot containing `when`, or 0 if `when` precedes the first slot after head.
    pub fn slot_at_time(&self, when: Timestamp, head: &ChainProperties) -> u64 {
        let first = self.slot_time(1, head, when);
        if when < first {
            return 0;
        }
        (first.millis_until(when) / self.interval()) as u64 + 1
    }

    /// The witness owning `slot`.
    pub fn scheduled_witness(
        &self,
        slot: u64,
        head: &ChainProperties,
    ) -> Result<Address, ConsensusError> {
        let n = self.ordering.len() as u64;
        if n == 0 {
            return Err(ConsensusError::EmptySchedule);
        }
        let index = self.head_slot(head).wrapping_add(slot) % n;
        Ok(self.ordering[index as usize])
    }

    /// Share (0..=100) of recent slots that produced a block.
    pub fn participation_rate(&self, head: &ChainProperties) -> u8 {
        head.participation_rate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GENESIS: i64 = 1_000_000;

    fn params() -> ChainParams {
        ChainParams {
            genesis_timestamp_ms: GENESIS,
            block_interval_ms: 3_000,
            maintenance_skip_slots: 2,
            ..ChainParams::default()
        }
    }

    fn head(number: u64, ts: i64) -> ChainProperties {
        let mut props = ChainProperties::genesis(BlockHash::new([9; 32]), Timestamp::from_millis(GENESIS));
        props.latest_block_hash = BlockHash::new([number as u8; 32]);
        props.latest_block_number = number;
        props.latest_block_timestamp = Timestamp::from_millis(ts);
        props
    }

    fn witnesses(n: u8) -> Vec<Address> {
        (1..=n).rev().map(|i| Address::new([i; 32])).collect()
    }

    #[test]
    fn slot_zero_is_now() {
        let s = ConsensusScheduler::new(params());
        let now = Timestamp::from_millis(123);
        assert_eq!(s.slot_time(0, &head(5, GENESIS + 15_000), now), now);
    }

    #[test]
    fn slot_time_from_genesis_on_empty_chain() {
        let s = ConsensusScheduler::new(params());
        let h = head(0, GENESIS);
        assert_eq!(s.slot_time(1, &h, Timestamp::EPOCH).as_millis(), GENESIS + 3_000);
        assert_eq!(s.slot_time(4, &h, Timestamp::EPOCH).as_millis(), GENESIS + 12_000);
    }

    #[test]
    fn slot_time_aligns_to_head_slot() {
        let s = ConsensusScheduler::new(params());
        // Head produced 700ms late into its slot.
        let h = head(3, GENESIS + 9_700);
        assert_eq!(s.slot_time(1, &h, Timestamp::EPOCH).as_millis(), GENESIS + 12_000);
    }

    #[test]
    fn maintenance_skips_slots() {
        let s = ConsensusScheduler::new(params());
        let mut h = head(3, GENESIS + 9_000);
        h.maintenance = true;
        assert_eq!(s.slot_time(1, &h, Timestamp::EPOCH).as_millis(), GENESIS + 18_000);
    }

    #[test]
    fn slot_at_time_counts_from_head() {
        let s = ConsensusScheduler::new(params());
        let h = head(3, GENESIS + 9_000);
        assert_eq!(s.slot_at_time(Timestamp::from_millis(GENESIS + 11_999), &h), 0);
        assert_eq!(s.slot_at_time(Timestamp::from_millis(GENESIS + 12_000), &h), 1);
        assert_eq!(s.slot_at_time(Timestamp::from_millis(GENESIS + 14_999), &h), 1);
        assert_eq!(s.slot_at_time(Timestamp::from_millis(GENESIS + 21_000), &h), 4);
    }

    #[test]
    fn empty_schedule_is_an_error() {
        let s = ConsensusScheduler::new(params());
        assert_eq!(
            s.scheduled_witness(1, &head(0, GENESIS)),
            Err(ConsensusError::EmptySchedule)
        );
    }

    #[test]
    fn scheduled_witness_walks_the_ordering() {
        let mut s = ConsensusScheduler::new(params());
        s.set_active_witnesses(witnesses(3));
        let h = head(0, GENESIS);
        let picks: Vec<_> = (1..=3).map(|slot| s.scheduled_witness(slot, &h).unwrap()).collect();
        assert_eq!(
            picks,
            vec![Address::new([2; 32]), Address::new([3; 32]), Address::new([1; 32])]
        );
    }

    #[test]
    fn set_active_sorts_and_dedups() {
        let mut s = ConsensusScheduler::new(params());
        let mut set = witnesses(3);
        set.push(Address::new([2; 32]));
        s.set_active_witnesses(set);
        assert_eq!(
            s.active_witnesses(),
            &[Address::new([1; 32]), Address::new([2; 32]), Address::new([3; 32])]
        );
    }

    #[test]
    fn rotation_runs_once_per_round_boundary() {
        let mut s = ConsensusScheduler::new(params());
        s.set_active_witnesses(witnesses(21));

        assert!(!s.rotate_if_due(&head(20, GENESIS + 60_000)));
        let boundary = head(21, GENESIS + 63_000);
        assert!(s.rotate_if_due(&boundary));
        assert!(!s.rotate_if_due(&boundary));
        assert_eq!(
            s.ordering(),
            shuffle_witnesses(s.active_witnesses(), Timestamp::from_millis(GENESIS + 63_000)).as_slice()
        );
    }

    #[test]
    fn rotation_anchor_is_round_start() {
        let mut s = ConsensusScheduler::new(params());
        assert_eq!(s.rotation_anchor(30), None);
        s.set_active_witnesses(witnesses(21));
        assert_eq!(s.rotation_anchor(30), Some(21));
        assert_eq!(s.rotation_anchor(21), Some(21));
        assert_eq!(s.rotation_anchor(5), Some(0));
    }

    #[test]
    fn participation_reads_the_head_bitmap() {
        let s = ConsensusScheduler::new(params());
        let mut h = head(1, GENESIS + 3_000);
        h.recent_slots_filled = u128::MAX >> 64;
        assert_eq!(s.participation_rate(&h), 50);
    }
}
