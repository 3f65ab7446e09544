//! LMDB storage backend for the DPoS ledger node.
//!
//! Implements [`dpos_store::KvStore`] with the `heed` LMDB bindings. Each
//! [`Namespace`](dpos_store::Namespace) is one named database inside a
//! single environment.

pub mod environment;
pub mod error;

pub use environment::LmdbStore;
pub use error::LmdbError;
