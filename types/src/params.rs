//! Chain parameters: slot timing, witness-set size, and block budgets.

use serde::{Deserialize, Serialize};

/// Number of recent slots tracked for participation accounting.
pub const PARTICIPATION_WINDOW: u32 = 128;

/// How the vote tally ranks witnesses when choosing the active set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankOrder {
    /// Most-voted witnesses win.
    #[default]
    HighestVotes,
    /// Least-voted witnesses win. Kept for chains bootstrapped under the
    /// historical ascending ordering.
    LowestVotes,
}

/// Consensus parameters every node on a chain must agree on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainParams {
    // ── Slot timing ──────────────────────────────────────────────────────
    /// Timestamp of the genesis block; slot 1 starts one interval later.
    pub genesis_timestamp_ms: i64,

    /// Fixed duration of one production slot.
    pub block_interval_ms: i64,

    /// Extra slots skipped after a maintenance head.
    pub maintenance_skip_slots: u64,

    // ── Witnesses ────────────────────────────────────────────────────────
    /// Size of the active witness set chosen by the vote tally.
    pub max_active_witnesses: usize,

    /// Heads at multiples of this number trigger a vote tally (0 = never).
    pub maintenance_interval_blocks: u64,

    pub witness_rank_order: RankOrder,

    // ── Blocks ───────────────────────────────────────────────────────────
    /// Maximum summed encoded size of the transactions in one block.
    pub block_size_budget: usize,

    /// Candidates this many blocks below head are pruned from the fork tree.
    pub fork_tree_depth: u64,
}

impl ChainParams {
    /// 2018-01-01T00:00:00Z.
    pub const DEFAULT_GENESIS_MS: i64 = 1_514_764_800_000;

    pub fn mainnet_defaults() -> Self {
        Self {
            genesis_timestamp_ms: Self::DEFAULT_GENESIS_MS,
            block_interval_ms: 3_000,
            maintenance_skip_slots: 0,
            max_active_witnesses: 21,
            maintenance_interval_blocks: 0,
            witness_rank_order: RankOrder::HighestVotes,
            block_size_budget: 2_000_000,
            fork_tree_depth: 64,
        }
    }
}

impl Default for ChainParams {
    fn default() -> Self {
        Self::mainnet_defaults()
    }
}
