//! Fundamental types for the DPoS ledger node.
//!
//! This crate defines the core types shared across every other crate in the workspace:
//! addresses, hashes, timestamps, keys, chain parameters, and the clock and
//! broadcast seams the node is wired through.

pub mod address;
pub mod id;
pub mod keys;
pub mod network;
pub mod params;
pub mod time;

pub use address::Address;
pub use id::{BlockHash, TxHash};
pub use keys::{KeyPair, PrivateKey, PublicKey, Signature};
pub use network::{BroadcastError, Broadcaster, NetworkId};
pub use params::{ChainParams, RankOrder};
pub use time::{Clock, SystemClock, Timestamp};
