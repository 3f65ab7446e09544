//! The ordered key-value engine contract.

use crate::StoreError;

/// Logical partitions of the key space. Each backend maps one namespace to
/// one physical table (an LMDB named database, a map in memory).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Namespace {
    /// Block id → encoded block.
    Blocks,
    /// Big-endian block number → canonical block id.
    BlockIndex,
    /// Transaction id → id of the canonical block that included it.
    TransactionIndex,
    /// Address → account record.
    Accounts,
    /// Address → witness record.
    Witnesses,
    /// Singleton chain-state records.
    Properties,
}

impl Namespace {
    pub const ALL: [Namespace; 6] = [
        Namespace::Blocks,
        Namespace::BlockIndex,
        Namespace::TransactionIndex,
        Namespace::Accounts,
        Namespace::Witnesses,
        Namespace::Properties,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Blocks => "blocks",
            Self::BlockIndex => "block_index",
            Self::TransactionIndex => "transaction_index",
            Self::Accounts => "accounts",
            Self::Witnesses => "witnesses",
            Self::Properties => "properties",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BatchOp {
    Put {
        namespace: Namespace,
        key: Vec<u8>,
        value: Vec<u8>,
    },
    Delete {
        namespace: Namespace,
        key: Vec<u8>,
    },
}

/// A group of writes applied all-or-nothing by [`KvStore::commit`].
#[derive(Clone, Debug, Default)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, namespace: Namespace, key: impl Into<Vec<u8>>, value: Vec<u8>) {
        self.ops.push(BatchOp::Put {
            namespace,
            key: key.into(),
            value,
        });
    }

    pub fn delete(&mut self, namespace: Namespace, key: impl Into<Vec<u8>>) {
        self.ops.push(BatchOp::Delete {
            namespace,
            key: key.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }
}

/// An ordered byte-key store.
///
/// Implementations must be safe to share across threads; callers serialize
/// writes at a higher level, so backends only need per-call atomicity plus
/// all-or-nothing [`commit`](KvStore::commit).
pub trait KvStore: Send + Sync {
    fn get(&self, namespace: Namespace, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    fn put(&self, namespace: Namespace, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    /// Deleting a missing key is not an error.
    fn delete(&self, namespace: Namespace, key: &[u8]) -> Result<(), StoreError>;

    /// Every entry in the namespace, ascending by key.
    fn scan(&self, namespace: Namespace) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError>;

    fn count(&self, namespace: Namespace) -> Result<u64, StoreError>;

    fn commit(&self, batch: WriteBatch) -> Result<(), StoreError>;

    fn contains(&self, namespace: Namespace, key: &[u8]) -> Result<bool, StoreError> {
        Ok(self.get(namespace, key)?.is_some())
    }
}
