//! LMDB environment and the namespace → database mapping.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use dpos_store::{BatchOp, KvStore, Namespace, StoreError, WriteBatch};
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use crate::LmdbError;

type RawDb = Database<Bytes, Bytes>;

pub struct LmdbStore {
    env: Arc<Env>,
    dbs: HashMap<Namespace, RawDb>,
}

impl LmdbStore {
    pub const DEFAULT_MAP_SIZE: usize = 1 << 30;

    /// Open or create an environment at `path` with one database per namespace.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)?;
        // SAFETY: the environment is opened once per path for the lifetime of
        // the process, and nothing else maps the same file.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(Namespace::ALL.len() as u32)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let mut dbs = HashMap::new();
        for namespace in Namespace::ALL {
            let db: RawDb = env.create_database(&mut wtxn, Some(namespace.name()))?;
            dbs.insert(namespace, db);
        }
        wtxn.commit()?;

        tracing::info!(path = %path.display(), map_size, "opened LMDB environment");
        Ok(Self {
            env: Arc::new(env),
            dbs,
        })
    }

    fn db(&self, namespace: Namespace) -> Result<RawDb, StoreError> {
        self.dbs
            .get(&namespace)
            .copied()
            .ok_or_else(|| StoreError::Corruption(format!("missing database {}", namespace.name())))
    }
}

impl KvStore for LmdbStore {
    fn get(&self, namespace: Namespace, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let db = self.db(namespace)?;
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let value = db.get(&rtxn, key).map_err(LmdbError::from)?;
        Ok(value.map(<[u8]>::to_vec))
    }

    fn put(&self, namespace: Namespace, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let db = self.db(namespace)?;
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        db.put(&mut wtxn, key, value).map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn delete(&self, namespace: Namespace, key: &[u8]) -> Result<(), StoreError> {
        let db = self.db(namespace)?;
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        db.delete(&mut wtxn, key).map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn scan(&self, namespace: Namespace) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        let db = self.db(namespace)?;
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut entries = Vec::new();
        for item in db.iter(&rtxn).map_err(LmdbError::from)? {
            let (key, value) = item.map_err(LmdbError::from)?;
            entries.push((key.to_vec(), value.to_vec()));
        }
        Ok(entries)
    }

    fn count(&self, namespace: Namespace) -> Result<u64, StoreError> {
        let db = self.db(namespace)?;
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(db.len(&rtxn).map_err(LmdbError::from)?)
    }

    /// One LMDB write transaction per batch; dropping it on error aborts.
    fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        for op in batch.into_ops() {
            match op {
                BatchOp::Put {
                    namespace,
                    key,
                    value,
                } => {
                    self.db(namespace)?
                        .put(&mut wtxn, &key, &value)
                        .map_err(LmdbError::from)?;
                }
                BatchOp::Delete { namespace, key } => {
                    self.db(namespace)?
                        .delete(&mut wtxn, &key)
                        .map_err(LmdbError::from)?;
                }
            }
        }
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }
}
