//! The block format.

use dpos_crypto::{blake2b_256_multi, merkle_root, sign_message, verify_signature};
use dpos_transactions::Transaction;
use dpos_types::{Address, BlockHash, PrivateKey, Signature, Timestamp, TxHash};
use serde::{Deserialize, Serialize};

use crate::ChainError;

const BLOCK_DOMAIN: &[u8] = b"dpos-block";

/// Length of the fixed header encoding: number, parent, timestamp, witness, merkle root.
pub const HEADER_LEN: usize = 8 + 32 + 8 + 32 + 32;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub number: u64,
    pub parent: BlockHash,
    pub timestamp: Timestamp,
    /// The producer; also the key the signature verifies against.
    pub witness: Address,
    pub merkle_root: BlockHash,
    pub transactions: Vec<Transaction>,
    pub signature: Signature,
}

impl Block {
    /// An unsigned block whose merkle root matches `transactions`.
    pub fn new(
        number: u64,
        parent: BlockHash,
        timestamp: Timestamp,
        witness: Address,
        transactions: Vec<Transaction>,
    ) -> Self {
        let mut block = Self {
            number,
            parent,
            timestamp,
            witness,
            merkle_root: BlockHash::ZERO,
            transactions,
            signature: Signature::EMPTY,
        };
        block.merkle_root = block.compute_merkle_root();
        block
    }

    pub fn header_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[..8].copy_from_slice(&self.number.to_be_bytes());
        out[8..40].copy_from_slice(self.parent.as_bytes());
        out[40..48].copy_from_slice(&self.timestamp.as_millis().to_be_bytes());
        out[48..80].copy_from_slice(self.witness.as_bytes());
        out[80..].copy_from_slice(self.merkle_root.as_bytes());
        out
    }

    /// The id commits to the header, and through the merkle root to the body.
    pub fn id(&self) -> BlockHash {
        BlockHash::new(blake2b_256_multi(&[BLOCK_DOMAIN, &self.header_bytes()]))
    }

    pub fn transaction_ids(&self) -> Vec<TxHash> {
        self.transactions.iter().map(Transaction::id).collect()
    }

    pub fn compute_merkle_root(&self) -> BlockHash {
        merkle_root(&self.transaction_ids())
    }

    pub fn sign(&mut self, key: &PrivateKey) {
        self.signature = sign_message(self.id().as_bytes(), key);
    }

    pub fn verify_signature(&self) -> bool {
        verify_signature(
            self.id().as_bytes(),
            &self.signature,
            &self.witness.to_public_key(),
        )
    }

    pub fn encode(&self) -> Result<Vec<u8>, ChainError> {
        bincode::serialize(self).map_err(|e| ChainError::Encoding(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ChainError> {
        bincode::deserialize(bytes).map_err(|e| ChainError::Encoding(e.to_string()))
    }
}
