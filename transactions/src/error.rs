use dpos_store::StoreError;
use dpos_types::Address;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TxError {
    #[error("invalid transaction signature")]
    BadSignature,

    #[error("signer {signer} does not own the operation (owner {owner})")]
    Unauthorized { signer: Address, owner: Address },

    #[error("account not found: {0}")]
    AccountNotFound(Address),

    #[error("witness not found: {0}")]
    WitnessNotFound(Address),

    #[error("insufficient balance: need {needed}, have {available}")]
    InsufficientBalance { needed: u64, available: u64 },

    #[error("invalid vote: {0}")]
    InvalidVote(String),

    #[error("invalid witness url: {0}")]
    InvalidUrl(String),

    #[error("invalid transfer: {0}")]
    InvalidTransfer(String),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl TxError {
    /// Storage failures abort the caller; every other variant only rejects
    /// the transaction.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TxError::Store(_))
    }
}
