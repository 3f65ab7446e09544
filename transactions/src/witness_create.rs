//! CreateWitness operation: register a block producer.

use dpos_store::{LedgerState, Witness};
use dpos_types::Address;
use serde::{Deserialize, Serialize};

use crate::TxError;

pub const MAX_URL_LEN: usize = 256;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateWitnessOp {
    pub owner: Address,
    pub url: String,
}

/// Registering an address that is already a witness replaces the record and
/// resets its vote count until the next tally. The active flag is kept: it
/// mirrors the running schedule, which is rebuilt from it on restart.
pub(crate) fn apply(op: &CreateWitnessOp, state: &LedgerState) -> Result<(), TxError> {
    if op.url.is_empty() || op.url.len() > MAX_URL_LEN {
        return Err(TxError::InvalidUrl(format!(
            "length {} outside 1..={MAX_URL_LEN}",
            op.url.len()
        )));
    }
    let mut witness = Witness::new(op.owner, op.url.clone());
    if let Some(existing) = state.witnesses.get(&op.owner)? {
        tracing::warn!(witness = %op.owner, "witness re-registered, overwriting record");
        witness.is_active = existing.is_active;
    }
    state.witnesses.put(&witness)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dpos_nullables::NullStore;
    use std::sync::Arc;

    fn state() -> LedgerState {
        LedgerState::new(Arc::new(NullStore::new()))
    }

    #[test]
    fn creates_with_zero_votes() {
        let state = state();
        let owner = Address::new([3; 32]);
        apply(&CreateWitnessOp { owner, url: "https://w3".into() }, &state).unwrap();
        let witness = state.witnesses.get(&owner).unwrap().unwrap();
        assert_eq!(witness.vote_count, 0);
        assert_eq!(witness.url, "https://w3");
        assert!(!witness.is_active);
    }

    #[test]
    fn duplicate_overwrites_but_keeps_active_flag() {
        let state = state();
        let owner = Address::new([3; 32]);
        let mut existing = Witness::new(owner, "old");
        existing.vote_count = 42;
        existing.is_active = true;
        state.witnesses.put(&existing).unwrap();

        apply(&CreateWitnessOp { owner, url: "new".into() }, &state).unwrap();
        let witness = state.witnesses.get(&owner).unwrap().unwrap();
        assert_eq!(witness.url, "new");
        assert_eq!(witness.vote_count, 0);
        assert!(witness.is_active);
    }

    #[test]
    fn url_length_is_bounded() {
        let state = state();
        let owner = Address::new([3; 32]);
        let long = "x".repeat(MAX_URL_LEN + 1);
        assert!(apply(&CreateWitnessOp { owner, url: long }, &state).is_err());
        assert!(apply(&CreateWitnessOp { owner, url: String::new() }, &state).is_err());
        assert!(!state.witnesses.exists(&owner).unwrap());
    }
}
