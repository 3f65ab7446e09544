//! Cryptographic primitives for the DPoS ledger node.
//!
//! - **Ed25519** for block and transaction signatures
//! - **Blake2b-256** for block ids, transaction ids, and merkle roots
//! - Textual `dpos_` addresses with base32 encoding and a checksum

pub mod address;
pub mod error;
pub mod hash;
pub mod keys;
pub mod merkle;
pub mod sign;

pub use address::{decode_address, encode_address};
pub use error::CryptoError;
pub use hash::{blake2b_256, blake2b_256_multi};
pub use keys::{generate_keypair, keypair_from_seed, public_from_private};
pub use merkle::merkle_root;
pub use sign::{sign_message, verify_signature};
