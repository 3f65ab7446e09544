//! DPoS ledger node.
//!
//! Wires the chain store, the witness scheduler, and transaction application
//! into one serialized [`ChainEngine`], and drives local block production:
//! - Inbound blocks and transactions arrive through [`NodeDelegate`]
//! - [`BlockAssembler`] turns the [`PendingPool`] into signed blocks
//! - [`ProductionLoop`] wakes once per slot and produces when it is our turn
//! - [`DposNode`] owns all of it and exposes `start()` / `stop()`

pub mod assembler;
pub mod config;
pub mod delegate;
pub mod engine;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod node;
pub mod pool;
pub mod production;
pub mod shutdown;
pub mod tracing_spans;

pub use assembler::{AssembleError, AssembledBlock, BlockAssembler};
pub use config::{GenesisAllocation, NodeConfig, ProductionConfig, StorageBackend};
pub use delegate::{InventoryItem, Message, NodeDelegate, MAX_LOST_BLOCK_IDS};
pub use engine::ChainEngine;
pub use error::NodeError;
pub use logging::{init_logging, LogFormat};
pub use metrics::NodeMetrics;
pub use node::DposNode;
pub use pool::{PendingPool, PoolInsert};
pub use production::{ProductionCondition, ProductionError, ProductionLoop};
pub use shutdown::{CancelToken, ShutdownController};
