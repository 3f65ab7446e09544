//! Linear block chain with fork handling.
//!
//! Blocks arrive from the network or from local production. Every accepted
//! block lands in an in-memory candidate tree; fork choice picks the deepest
//! reachable candidate as head, and the head's ancestry is written through
//! to durable storage so the canonical chain stays number-contiguous.

pub mod block;
pub mod chain_store;
pub mod error;
pub mod fork_tree;
pub mod genesis;

pub use block::Block;
pub use chain_store::{BlockSource, ChainStore, PushOutcome};
pub use error::ChainError;
pub use fork_tree::ForkTree;
pub use genesis::create_genesis_block;
