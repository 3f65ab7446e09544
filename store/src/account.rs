//! Account records and the account ledger.

use std::collections::BTreeMap;
use std::sync::Arc;

use dpos_types::Address;
use serde::{Deserialize, Serialize};

use crate::codec::{decode, encode};
use crate::{KvStore, Namespace, StoreError, WriteBatch};

/// A funded identity that may sign transactions and hold votes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub address: Address,
    pub balance: u64,
    /// Witness address → votes this account has cast for it.
    pub votes: BTreeMap<Address, u64>,
}

impl Account {
    pub fn new(address: Address, balance: u64) -> Self {
        Self {
            address,
            balance,
            votes: BTreeMap::new(),
        }
    }

    /// Accumulate votes for `witness`. Returns `None` on overflow and leaves
    /// the record untouched.
    pub fn add_votes(&mut self, witness: Address, count: u64) -> Option<u64> {
        let current = self.votes.get(&witness).copied().unwrap_or(0);
        let total = current.checked_add(count)?;
        self.votes.insert(witness, total);
        Some(total)
    }

    pub fn votes_for(&self, witness: &Address) -> u64 {
        self.votes.get(witness).copied().unwrap_or(0)
    }
}

/// Persistent address → [`Account`] map.
#[derive(Clone)]
pub struct AccountLedger {
    kv: Arc<dyn KvStore>,
}

impl AccountLedger {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    pub fn get(&self, address: &Address) -> Result<Option<Account>, StoreError> {
        self.kv
            .get(Namespace::Accounts, address.as_bytes())?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    pub fn put(&self, account: &Account) -> Result<(), StoreError> {
        self.kv.put(
            Namespace::Accounts,
            account.address.as_bytes(),
            &encode(account)?,
        )
    }

    /// Write every record in `accounts` in one atomic batch.
    pub fn put_all(&self, accounts: &[Account]) -> Result<(), StoreError> {
        let mut batch = WriteBatch::new();
        for account in accounts {
            batch.put(
                Namespace::Accounts,
                account.address.as_bytes().to_vec(),
                encode(account)?,
            );
        }
        self.kv.commit(batch)
    }

    pub fn exists(&self, address: &Address) -> Result<bool, StoreError> {
        self.kv.contains(Namespace::Accounts, address.as_bytes())
    }

    pub fn delete(&self, address: &Address) -> Result<(), StoreError> {
        self.kv.delete(Namespace::Accounts, address.as_bytes())
    }

    /// All accounts in address order.
    pub fn iter(&self) -> Result<Vec<Account>, StoreError> {
        self.kv
            .scan(Namespace::Accounts)?
            .into_iter()
            .map(|(_, bytes)| decode(&bytes))
            .collect()
    }

    pub fn count(&self) -> Result<u64, StoreError> {
        self.kv.count(Namespace::Accounts)
    }
}
