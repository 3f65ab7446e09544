//! Transactions and the state transitions they drive.
//!
//! Operation types:
//! - **Vote**: an account assigns vote counts to registered witnesses
//! - **CreateWitness**: an address registers itself as a block producer
//! - **Transfer**: move balance between accounts
//!
//! The operation set is a closed enum; [`TransactionApplier`] dispatches on
//! it with an exhaustive match.

pub mod applier;
pub mod error;
pub mod tally;
pub mod transfer;
pub mod vote;
pub mod witness_create;

pub use applier::TransactionApplier;
pub use error::TxError;
pub use tally::tally_and_rotate_active_witnesses;
pub use transfer::TransferOp;
pub use vote::{VoteEntry, VoteWitnessOp};
pub use witness_create::CreateWitnessOp;

use dpos_crypto::{blake2b_256_multi, sign_message, verify_signature};
use dpos_types::{Address, KeyPair, Signature, Timestamp, TxHash};
use serde::{Deserialize, Serialize};

const TX_DOMAIN: &[u8] = b"dpos-transaction";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    Vote(VoteWitnessOp),
    CreateWitness(CreateWitnessOp),
    Transfer(TransferOp),
}

impl Operation {
    /// The address that must sign a transaction carrying this operation.
    pub fn owner(&self) -> Address {
        match self {
            Self::Vote(op) => op.voter,
            Self::CreateWitness(op) => op.owner,
            Self::Transfer(op) => op.from,
        }
    }

    fn write_canonical(&self, out: &mut Vec<u8>) {
        match self {
            Self::Vote(op) => {
                out.push(0);
                out.extend_from_slice(op.voter.as_bytes());
                out.extend_from_slice(&(op.votes.len() as u32).to_be_bytes());
                for entry in &op.votes {
                    out.extend_from_slice(entry.witness.as_bytes());
                    out.extend_from_slice(&entry.count.to_be_bytes());
                }
            }
            Self::CreateWitness(op) => {
                out.push(1);
                out.extend_from_slice(op.owner.as_bytes());
                out.extend_from_slice(&(op.url.len() as u32).to_be_bytes());
                out.extend_from_slice(op.url.as_bytes());
            }
            Self::Transfer(op) => {
                out.push(2);
                out.extend_from_slice(op.from.as_bytes());
                out.extend_from_slice(op.to.as_bytes());
                out.extend_from_slice(&op.amount.to_be_bytes());
            }
        }
    }
}

/// A signed operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub operation: Operation,
    /// Creation time; distinguishes deliberate repeats of the same operation.
    pub timestamp: Timestamp,
    pub signer: Address,
    pub signature: Signature,
}

impl Transaction {
    pub fn new_signed(operation: Operation, timestamp: Timestamp, keypair: &KeyPair) -> Self {
        let mut tx = Self {
            operation,
            timestamp,
            signer: keypair.address(),
            signature: Signature::EMPTY,
        };
        tx.signature = sign_message(&tx.signing_bytes(), &keypair.private);
        tx
    }

    /// Deterministic encoding of everything except the signature.
    pub fn signing_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(128);
        self.operation.write_canonical(&mut out);
        out.extend_from_slice(&self.timestamp.as_millis().to_be_bytes());
        out.extend_from_slice(self.signer.as_bytes());
        out
    }

    pub fn id(&self) -> TxHash {
        TxHash::new(blake2b_256_multi(&[TX_DOMAIN, &self.signing_bytes()]))
    }

    pub fn verify_signature(&self) -> bool {
        verify_signature(
            &self.signing_bytes(),
            &self.signature,
            &self.signer.to_public_key(),
        )
    }

    /// Size counted against the block budget: payload plus signature.
    pub fn encoded_size(&self) -> usize {
        self.signing_bytes().len() + self.signature.as_bytes().len()
    }
}
