//! Vote operation: an account assigns vote counts to witnesses.

use dpos_store::LedgerState;
use dpos_types::Address;
use serde::{Deserialize, Serialize};

use crate::TxError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteEntry {
    pub witness: Address,
    pub count: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteWitnessOp {
    pub voter: Address,
    pub votes: Vec<VoteEntry>,
}

/// Validate the whole vote list before touching the account, so a bad
/// entry anywhere rejects the transaction without partial effect.
pub(crate) fn apply(op: &VoteWitnessOp, state: &LedgerState) -> Result<(), TxError> {
    if op.votes.is_empty() {
        return Err(TxError::InvalidVote("empty vote list".into()));
    }
    let mut account = state
        .accounts
        .get(&op.voter)?
        .ok_or(TxError::AccountNotFound(op.voter))?;

    for entry in &op.votes {
        if entry.count == 0 {
            return Err(TxError::InvalidVote(format!(
                "zero votes for witness {}",
                entry.witness
            )));
        }
        if !state.witnesses.exists(&entry.witness)? {
            return Err(TxError::WitnessNotFound(entry.witness));
        }
        account
            .add_votes(entry.witness, entry.count)
            .ok_or_else(|| TxError::InvalidVote("vote count overflow".into()))?;
    }

    state.accounts.put(&account)?;
    Ok(())
}
