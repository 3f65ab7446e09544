//! Witness scheduling for delegated proof of stake.
//!
//! Time is cut into fixed slots counted from the genesis timestamp. Each slot
//! belongs to exactly one witness of the active set, taken round-robin from an
//! ordering that is reshuffled once per round. The shuffle seed comes from the
//! head block's timestamp, so every node holding the same chain arrives at the
//! same order.
//!
//! - [`schedule`]: [`ConsensusScheduler`], time ↔ slot ↔ witness.
//! - [`shuffle`]: deterministic Fisher–Yates over the sorted active set.

pub mod error;
pub mod schedule;
pub mod shuffle;

pub use error::ConsensusError;
pub use schedule::ConsensusScheduler;
pub use shuffle::shuffle_witnesses;
