use dpos_store::StoreError;
use dpos_types::BlockHash;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("bad block: {0}")]
    BadBlock(String),

    #[error("no common ancestor reachable from {0}")]
    ChainUnreachable(BlockHash),

    #[error("stored genesis {stored} does not match configured genesis {configured}")]
    GenesisMismatch {
        stored: BlockHash,
        configured: BlockHash,
    },

    #[error("block encoding error: {0}")]
    Encoding(String),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl ChainError {
    /// Storage and on-disk consistency failures stop the node; everything
    /// else only rejects the offending input.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ChainError::Store(_) | ChainError::GenesisMismatch { .. }
        )
    }
}
