//! Nullable store: a thread-safe in-memory `KvStore`.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use dpos_store::{BatchOp, KvStore, Namespace, StoreError, WriteBatch};

type Tables = HashMap<Namespace, BTreeMap<Vec<u8>, Vec<u8>>>;

#[derive(Debug, Default)]
pub struct NullStore {
    tables: Mutex<Tables>,
    fail_writes: AtomicBool,
}

impl NullStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every write returns `StoreError::Backend`, as a full disk would.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".into()))
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("injected write failure".into()));
        }
        Ok(())
    }
}

impl KvStore for NullStore {
    fn get(&self, namespace: Namespace, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self
            .tables()?
            .get(&namespace)
            .and_then(|table| table.get(key))
            .cloned())
    }

    fn put(&self, namespace: Namespace, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.check_writable()?;
        self.tables()?
            .entry(namespace)
            .or_default()
            .insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, namespace: Namespace, key: &[u8]) -> Result<(), StoreError> {
        self.check_writable()?;
        if let Some(table) = self.tables()?.get_mut(&namespace) {
            table.remove(key);
        }
        Ok(())
    }

    fn scan(&self, namespace: Namespace) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        Ok(self
            .tables()?
            .get(&namespace)
            .map(|table| table.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }

    fn count(&self, namespace: Namespace) -> Result<u64, StoreError> {
        Ok(self
            .tables()?
            .get(&namespace)
            .map_or(0, |table| table.len() as u64))
    }

    fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut tables = self.tables()?;
        for op in batch.into_ops() {
            match op {
                BatchOp::Put {
                    namespace,
                    key,
                    value,
                } => {
                    tables.entry(namespace).or_default().insert(key, value);
                }
                BatchOp::Delete { namespace, key } => {
                    if let Some(table) = tables.get_mut(&namespace) {
                        table.remove(&key);
                    }
                }
            }
        }
        Ok(())
    }
}
