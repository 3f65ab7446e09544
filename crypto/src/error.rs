use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("entropy source unavailable: {0}")]
    Entropy(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),
}
