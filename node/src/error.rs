use dpos_types::BlockHash;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("chain error: {0}")]
    Chain(#[from] dpos_ledger::ChainError),

    #[error("transaction error: {0}")]
    Transaction(#[from] dpos_transactions::TxError),

    #[error("block assembly error: {0}")]
    Assemble(#[from] crate::assembler::AssembleError),

    #[error("consensus error: {0}")]
    Consensus(#[from] dpos_consensus::ConsensusError),

    #[error("store error: {0}")]
    Store(#[from] dpos_store::StoreError),

    #[error("lmdb error: {0}")]
    Lmdb(#[from] dpos_store_lmdb::LmdbError),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("stored genesis {stored} does not match configured genesis {configured}")]
    GenesisMismatch {
        stored: BlockHash,
        configured: BlockHash,
    },

    #[error("config error: {0}")]
    Config(String),

    #[error("logging error: {0}")]
    Logging(String),

    #[error("node is already running")]
    AlreadyRunning,

    #[error("node has been stopped")]
    Stopped,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl NodeError {
    /// Errors after which the node must stop rather than keep serving an
    /// unreadable or foreign ledger.
    pub fn is_fatal(&self) -> bool {
        match self {
            NodeError::Chain(e) => e.is_fatal(),
            NodeError::Transaction(e) => e.is_fatal(),
            NodeError::Assemble(e) => e.is_fatal(),
            NodeError::Store(_) | NodeError::Lmdb(_) | NodeError::Io(_) => true,
            NodeError::GenesisMismatch { .. } => true,
            _ => false,
        }
    }
}
