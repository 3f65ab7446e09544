use thiserror::Error;

/// Failures below the ledger. All of them leave the store in an unknown
/// state, so callers above treat every variant as fatal.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The engine itself failed: I/O, a full map, an injected fault.
    #[error("storage backend error: {0}")]
    Backend(String),

    /// A record could not be encoded, or stored bytes do not decode.
    #[error("record encoding error: {0}")]
    Serialization(String),

    /// Stored records contradict each other.
    #[error("ledger storage is corrupted: {0}")]
    Corruption(String),
}
