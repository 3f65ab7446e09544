//! Transfer operation: move balance between accounts.

use dpos_store::{Account, LedgerState};
use dpos_types::Address;
use serde::{Deserialize, Serialize};

use crate::TxError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferOp {
    pub from: Address,
    pub to: Address,
    pub amount: u64,
}

/// The recipient account is created on first receipt. Both records are
/// written in one batch.
pub(crate) fn apply(op: &TransferOp, state: &LedgerState) -> Result<(), TxError> {
    if op.amount == 0 {
        return Err(TxError::InvalidTransfer("amount must be positive".into()));
    }
    if op.from == op.to {
        return Err(TxError::InvalidTransfer("sender and recipient are the same".into()));
    }

    let mut sender = state
        .accounts
        .get(&op.from)?
        .ok_or(TxError::AccountNotFound(op.from))?;
    if sender.balance < op.amount {
        return Err(TxError::InsufficientBalance {
            needed: op.amount,
            available: sender.balance,
        });
    }
    let mut recipient = state
        .accounts
        .get(&op.to)?
        .unwrap_or_else(|| Account::new(op.to, 0));
    recipient.balance = recipient
        .balance
        .checked_add(op.amount)
        .ok_or_else(|| TxError::InvalidTransfer("recipient balance overflow".into()))?;
    sender.balance -= op.amount;

    state.accounts.put_all(&[sender, recipient])?;
    Ok(())
}
