//! Nullable infrastructure for deterministic testing.
//!
//! The clock, the outbound network, and the storage engine are all reached
//! through traits. This crate provides implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically, including injected failures
//! - Never touch the filesystem or network
//!
//! `NullStore` doubles as the `memory` storage backend for dev nodes.

pub mod clock;
pub mod network;
pub mod store;

pub use clock::NullClock;
pub use network::NullNetwork;
pub use store::NullStore;
