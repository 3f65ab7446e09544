//! Prometheus metrics for the DPoS node.
//!
//! [`NodeMetrics`] owns a dedicated [`Registry`]; [`NodeMetrics::encode_text`]
//! renders it in the text exposition format for whatever transport the
//! operator puts in front of the node.

use prometheus::{
    register_int_counter_with_registry, register_int_gauge_with_registry, Encoder, IntCounter,
    IntGauge, Opts, Registry, TextEncoder,
};

pub struct NodeMetrics {
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Blocks this node produced and committed.
    pub blocks_produced: IntCounter,
    /// Inbound blocks accepted as head or candidate.
    pub blocks_accepted: IntCounter,
    /// Inbound blocks rejected as invalid.
    pub blocks_rejected: IntCounter,
    /// Times the block assembler was invoked.
    pub block_assemblies: IntCounter,
    pub transactions_applied: IntCounter,
    /// Transactions discarded after failing validation.
    pub transactions_dropped: IntCounter,
    /// Transactions left in the pool because the block budget was full.
    pub transactions_postponed: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    pub head_block_number: IntGauge,
    pub participation_rate: IntGauge,
    pub pending_transactions: IntGauge,
}

impl NodeMetrics {
    /// Create a fresh set of metrics, all registered under a new [`Registry`].
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let counter = |name: &str, help: &str| {
            register_int_counter_with_registry!(Opts::new(name, help), registry)
        };
        let blocks_produced = counter("dpos_blocks_produced_total", "Blocks produced by this node")?;
        let blocks_accepted = counter("dpos_blocks_accepted_total", "Inbound blocks accepted")?;
        let blocks_rejected = counter("dpos_blocks_rejected_total", "Inbound blocks rejected")?;
        let block_assemblies = counter("dpos_block_assemblies_total", "Block assembly attempts")?;
        let transactions_applied =
            counter("dpos_transactions_applied_total", "Transactions applied to the ledger")?;
        let transactions_dropped =
            counter("dpos_transactions_dropped_total", "Transactions dropped as invalid")?;
        let transactions_postponed = counter(
            "dpos_transactions_postponed_total",
            "Transactions deferred because the block was full",
        )?;

        let gauge = |name: &str, help: &str| {
            register_int_gauge_with_registry!(Opts::new(name, help), registry)
        };
        let head_block_number = gauge("dpos_head_block_number", "Current head block number")?;
        let participation_rate =
            gauge("dpos_participation_rate", "Percentage of recent slots that produced a block")?;
        let pending_transactions =
            gauge("dpos_pending_transactions", "Transactions waiting in the pending pool")?;

        Ok(Self {
            registry,
            blocks_produced,
            blocks_accepted,
            blocks_rejected,
            block_assemblies,
            transactions_applied,
            transactions_dropped,
            transactions_postponed,
            head_block_number,
            participation_rate,
            pending_transactions,
        })
    }

    /// Render every metric in the Prometheus text format.
    pub fn encode_text(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
