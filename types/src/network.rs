//! Network identity and the outbound broadcast seam.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifies which chain a node belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkId {
    /// The production network.
    Live,
    /// The public test network.
    Test,
    /// Local development network.
    Dev,
}

impl NetworkId {
    /// Human-readable name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Test => "test",
            Self::Dev => "dev",
        }
    }
}

impl std::str::FromStr for NetworkId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "live" => Ok(Self::Live),
            "test" => Ok(Self::Test),
            "dev" => Ok(Self::Dev),
            other => Err(format!("unknown network: {other}")),
        }
    }
}

#[derive(Debug, Error)]
#[error("broadcast failed: {0}")]
pub struct BroadcastError(pub String);

/// Outbound half of the network capability.
///
/// The peer-to-peer transport implements this; the core only ever hands it
/// an encoded block after a successful local production.
pub trait Broadcaster: Send + Sync {
    fn broadcast(&self, encoded_block: &[u8]) -> Result<(), BroadcastError>;
}
