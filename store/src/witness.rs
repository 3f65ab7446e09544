//! Witness records and the witness registry.

use std::sync::Arc;

use dpos_types::Address;
use serde::{Deserialize, Serialize};

use crate::codec::{decode, encode};
use crate::{KvStore, Namespace, StoreError, WriteBatch};

/// A registered block producer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Witness {
    pub address: Address,
    pub url: String,
    /// Votes counted at the most recent tally.
    pub vote_count: u64,
    pub is_active: bool,
}

impl Witness {
    pub fn new(address: Address, url: impl Into<String>) -> Self {
        Self {
            address,
            url: url.into(),
            vote_count: 0,
            is_active: false,
        }
    }
}

/// Persistent address → [`Witness`] map.
#[derive(Clone)]
pub struct WitnessRegistry {
    kv: Arc<dyn KvStore>,
}

impl WitnessRegistry {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    pub fn get(&self, address: &Address) -> Result<Option<Witness>, StoreError> {
        self.kv
            .get(Namespace::Witnesses, address.as_bytes())?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    pub fn put(&self, witness: &Witness) -> Result<(), StoreError> {
        self.kv.put(
            Namespace::Witnesses,
            witness.address.as_bytes(),
            &encode(witness)?,
        )
    }

    pub fn exists(&self, address: &Address) -> Result<bool, StoreError> {
        self.kv.contains(Namespace::Witnesses, address.as_bytes())
    }

    pub fn delete(&self, address: &Address) -> Result<(), StoreError> {
        self.kv.delete(Namespace::Witnesses, address.as_bytes())
    }

    /// All registered witnesses in address order.
    pub fn iter(&self) -> Result<Vec<Witness>, StoreError> {
        self.kv
            .scan(Namespace::Witnesses)?
            .into_iter()
            .map(|(_, bytes)| decode(&bytes))
            .collect()
    }

    pub fn count(&self) -> Result<u64, StoreError> {
        self.kv.count(Namespace::Witnesses)
    }

    /// Addresses currently flagged active, in address order.
    pub fn active_addresses(&self) -> Result<Vec<Address>, StoreError> {
        Ok(self
            .iter()?
            .into_iter()
            .filter(|w| w.is_active)
            .map(|w| w.address)
            .collect())
    }

    /// Write every record in `witnesses` in one atomic batch.
    pub fn put_all(&self, witnesses: &[Witness]) -> Result<(), StoreError> {
        let mut batch = WriteBatch::new();
        for witness in witnesses {
            batch.put(
                Namespace::Witnesses,
                witness.address.as_bytes().to_vec(),
                encode(witness)?,
            );
        }
        self.kv.commit(batch)
    }
}
