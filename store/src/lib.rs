//! Storage contract and typed stores for the DPoS ledger node.
//!
//! The engine underneath is an opaque ordered key-value store
//! ([`KvStore`]) split into fixed [`Namespace`]s. Backends (LMDB, in-memory
//! for testing) implement only that trait; everything above it talks to the
//! typed stores in this crate.

pub mod account;
pub mod block;
mod codec;
pub mod error;
pub mod kv;
pub mod properties;
pub mod state;
pub mod witness;

pub use account::{Account, AccountLedger};
pub use block::BlockStore;
pub use error::StoreError;
pub use kv::{BatchOp, KvStore, Namespace, WriteBatch};
pub use properties::{ChainProperties, PropertiesStore};
pub use state::LedgerState;
pub use witness::{Witness, WitnessRegistry};
