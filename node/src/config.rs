//! Node configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use dpos_crypto::{decode_address, keypair_from_seed};
use dpos_types::{Address, ChainParams, KeyPair, NetworkId};

use crate::logging::LogFormat;
use crate::NodeError;

/// Configuration for a DPoS node.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Which network this node belongs to.
    #[serde(default = "default_network")]
    pub network: NetworkId,

    /// Data directory for ledger storage.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Storage engine for the ledger.
    #[serde(default)]
    pub storage: StorageBackend,

    /// LMDB map size in bytes.
    #[serde(default = "default_lmdb_map_size")]
    pub lmdb_map_size: usize,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Chain-wide constants. Every node on a network must agree on these.
    #[serde(default)]
    pub chain: ChainParams,

    #[serde(default)]
    pub genesis: GenesisConfig,

    #[serde(default)]
    pub production: ProductionConfig,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Lmdb,
    /// Volatile in-memory store, for development and tests.
    Memory,
}

/// Balances and witnesses installed when the ledger is created.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GenesisConfig {
    #[serde(default)]
    pub accounts: Vec<GenesisAccount>,
    #[serde(default)]
    pub witnesses: Vec<GenesisWitness>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenesisAccount {
    pub address: String,
    pub balance: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenesisWitness {
    pub address: String,
    #[serde(default)]
    pub url: String,
}

/// [`GenesisConfig`] with addresses decoded.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GenesisAllocation {
    pub accounts: Vec<(Address, u64)>,
    pub witnesses: Vec<(Address, String)>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProductionConfig {
    /// Run the witness production loop.
    #[serde(default)]
    pub enabled: bool,

    /// Witness this node produces for, as a `dpos_` address. Defaults to the
    /// address of `witness_private_key`.
    #[serde(default)]
    pub witness_address: Option<String>,

    /// Hex-encoded 32-byte Ed25519 seed.
    #[serde(default)]
    pub witness_private_key: Option<String>,

    /// Minimum share of recently filled slots before this node will produce.
    #[serde(default = "default_min_participation_rate")]
    pub min_participation_rate: u8,

    /// How late into its slot a block may still be produced.
    #[serde(default = "default_produce_timeout_ms")]
    pub produce_timeout_ms: i64,

    /// Produce even when the node does not consider itself synced.
    #[serde(default)]
    pub enable_stale_production: bool,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_network() -> NetworkId {
    NetworkId::Dev
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./dpos_data")
}

fn default_lmdb_map_size() -> usize {
    dpos_store_lmdb::LmdbStore::DEFAULT_MAP_SIZE
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_min_participation_rate() -> u8 {
    33
}

fn default_produce_timeout_ms() -> i64 {
    500
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, NodeError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| NodeError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, NodeError> {
        toml::to_string_pretty(self).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// A copy safe to print: the witness key is blanked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.production.witness_private_key.is_some() {
            copy.production.witness_private_key = Some("<redacted>".to_string());
        }
        copy
    }

    /// Ephemeral dev configuration: in-memory storage, fast one-second slots.
    pub fn dev_in_memory() -> Self {
        let mut config = Self {
            storage: StorageBackend::Memory,
            ..Self::default()
        };
        config.chain.block_interval_ms = 1_000;
        config
    }
}

impl GenesisConfig {
    pub fn decode(&self) -> Result<GenesisAllocation, NodeError> {
        let parse = |s: &str| {
            decode_address(s).map_err(|e| NodeError::Config(format!("genesis address {s}: {e}")))
        };
        let accounts = self
            .accounts
            .iter()
            .map(|a| Ok((parse(&a.address)?, a.balance)))
            .collect::<Result<_, NodeError>>()?;
        let witnesses = self
            .witnesses
            .iter()
            .map(|w| Ok((parse(&w.address)?, w.url.clone())))
            .collect::<Result<_, NodeError>>()?;
        Ok(GenesisAllocation { accounts, witnesses })
    }
}

impl ProductionConfig {
    /// Decode the witness key, if one is configured.
    pub fn keypair(&self) -> Result<Option<KeyPair>, NodeError> {
        let Some(encoded) = &self.witness_private_key else {
            return Ok(None);
        };
        let bytes = hex::decode(encoded.trim())
            .map_err(|e| NodeError::Config(format!("witness_private_key: {e}")))?;
        let seed: [u8; 32] = bytes.try_into().map_err(|_| {
            NodeError::Config("witness_private_key must be 32 bytes of hex".to_string())
        })?;
        Ok(Some(keypair_from_seed(&seed)))
    }

    /// The witness address this node produces for.
    ///
    /// When both an address and a key are configured they must match.
    pub fn witness(&self, keypair: Option<&KeyPair>) -> Result<Option<Address>, NodeError> {
        let configured = self
            .witness_address
            .as_deref()
            .map(|s| decode_address(s).map_err(|e| NodeError::Config(format!("witness_address: {e}"))))
            .transpose()?;
        match (configured, keypair) {
            (Some(address), Some(kp)) if address != kp.address() => Err(NodeError::Config(
                format!("witness_address {address} does not match witness_private_key"),
            )),
            (Some(address), _) => Ok(Some(address)),
            (None, Some(kp)) => Ok(Some(kp.address())),
            (None, None) => Ok(None),
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            network: default_network(),
            data_dir: default_data_dir(),
            storage: StorageBackend::default(),
            lmdb_map_size: default_lmdb_map_size(),
            log_format: LogFormat::default(),
            log_level: default_log_level(),
            chain: ChainParams::default(),
            genesis: GenesisConfig::default(),
            production: ProductionConfig::default(),
        }
    }
}

impl Default for ProductionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            witness_address: None,
            witness_private_key: None,
            min_participation_rate: default_min_participation_rate(),
            produce_timeout_ms: default_produce_timeout_ms(),
            enable_stale_production: false,
        }
    }
}
