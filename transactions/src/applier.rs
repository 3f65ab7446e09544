//! Transaction dispatch.

use dpos_store::LedgerState;
use dpos_types::TxHash;

use crate::{transfer, vote, witness_create, Operation, Transaction, TxError};

/// Applies signed transactions to the ledger state.
///
/// A transaction either commits completely or leaves the state untouched:
/// the signature and ownership are checked first, and every handler
/// validates before it writes.
#[derive(Clone, Copy, Debug, Default)]
pub struct TransactionApplier;

impl TransactionApplier {
    pub fn new() -> Self {
        Self
    }

    pub fn apply(&self, tx: &Transaction, state: &LedgerState) -> Result<TxHash, TxError> {
        if !tx.verify_signature() {
            return Err(TxError::BadSignature);
        }
        let owner = tx.operation.owner();
        if tx.signer != owner {
            return Err(TxError::Unauthorized {
                signer: tx.signer,
                owner,
            });
        }

        match &tx.operation {
            Operation::Vote(op) => vote::apply(op, state)?,
            Operation::CreateWitness(op) => witness_create::apply(op, state)?,
            Operation::Transfer(op) => transfer::apply(op, state)?,
        }
        Ok(tx.id())
    }
}
