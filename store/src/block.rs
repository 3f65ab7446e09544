//! Durable canonical block storage.
//!
//! Blocks are stored as opaque encoded bytes keyed by id; the block type
//! itself lives in `dpos-ledger`. Alongside sit the number → id index and
//! the committed-transaction index.

use std::sync::Arc;

use dpos_types::{BlockHash, TxHash};

use crate::{KvStore, Namespace, StoreError, WriteBatch};

pub fn number_key(number: u64) -> [u8; 8] {
    number.to_be_bytes()
}

fn hash_from_bytes(bytes: &[u8]) -> Result<[u8; 32], StoreError> {
    bytes
        .try_into()
        .map_err(|_| StoreError::Corruption(format!("expected 32-byte id, got {}", bytes.len())))
}

#[derive(Clone)]
pub struct BlockStore {
    kv: Arc<dyn KvStore>,
}

impl BlockStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    pub fn get_block(&self, hash: &BlockHash) -> Result<Option<Vec<u8>>, StoreError> {
        self.kv.get(Namespace::Blocks, hash.as_bytes())
    }

    pub fn has_block(&self, hash: &BlockHash) -> Result<bool, StoreError> {
        self.kv.contains(Namespace::Blocks, hash.as_bytes())
    }

    pub fn block_count(&self) -> Result<u64, StoreError> {
        self.kv.count(Namespace::Blocks)
    }

    /// Canonical block id at `number`.
    pub fn hash_at(&self, number: u64) -> Result<Option<BlockHash>, StoreError> {
        self.kv
            .get(Namespace::BlockIndex, &number_key(number))?
            .map(|bytes| hash_from_bytes(&bytes).map(BlockHash::new))
            .transpose()
    }

    /// Id of the canonical block that included `tx`.
    pub fn transaction_block(&self, tx: &TxHash) -> Result<Option<BlockHash>, StoreError> {
        self.kv
            .get(Namespace::TransactionIndex, tx.as_bytes())?
            .map(|bytes| hash_from_bytes(&bytes).map(BlockHash::new))
            .transpose()
    }

    /// Queue a canonical block: its bytes, its number slot, and its transactions.
    pub fn stage_canonical(
        batch: &mut WriteBatch,
        hash: &BlockHash,
        number: u64,
        encoded: Vec<u8>,
        transactions: &[TxHash],
    ) {
        batch.put(Namespace::Blocks, hash.as_bytes().to_vec(), encoded);
        batch.put(
            Namespace::BlockIndex,
            number_key(number).to_vec(),
            hash.as_bytes().to_vec(),
        );
        for tx in transactions {
            batch.put(
                Namespace::TransactionIndex,
                tx.as_bytes().to_vec(),
                hash.as_bytes().to_vec(),
            );
        }
    }

    /// Queue removal of a block together with any index entries pointing at it.
    pub fn stage_removal(
        &self,
        batch: &mut WriteBatch,
        hash: &BlockHash,
        number: u64,
        transactions: &[TxHash],
    ) -> Result<(), StoreError> {
        batch.delete(Namespace::Blocks, hash.as_bytes().to_vec());
        self.stage_unindex(batch, hash, number, transactions)
    }

    /// Queue removal of the index entries pointing at a block, keeping its bytes.
    pub fn stage_unindex(
        &self,
        batch: &mut WriteBatch,
        hash: &BlockHash,
        number: u64,
        transactions: &[TxHash],
    ) -> Result<(), StoreError> {
        if self.hash_at(number)? == Some(*hash) {
            batch.delete(Namespace::BlockIndex, number_key(number).to_vec());
        }
        for tx in transactions {
            if self.transaction_block(tx)? == Some(*hash) {
                batch.delete(Namespace::TransactionIndex, tx.as_bytes().to_vec());
            }
        }
        Ok(())
    }

    pub fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        self.kv.commit(batch)
    }
}
