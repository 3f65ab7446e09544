//! The running node: storage, engine, and the production task.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dpos_nullables::NullStore;
use dpos_store::{ChainProperties, KvStore};
use dpos_store_lmdb::LmdbStore;
use dpos_types::{Broadcaster, Clock};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::config::{NodeConfig, StorageBackend};
use crate::engine::ChainEngine;
use crate::metrics::NodeMetrics;
use crate::production::ProductionLoop;
use crate::shutdown::ShutdownController;
use crate::NodeError;

/// A DPoS node.
///
/// Owns the single [`ChainEngine`] behind an async mutex. The network layer
/// locks [`engine`](Self::engine) and calls its
/// [`NodeDelegate`](crate::NodeDelegate) methods; [`start`](Self::start) and
/// [`stop`](Self::stop) control the witness production task.
pub struct DposNode {
    config: NodeConfig,
    engine: Arc<Mutex<ChainEngine>>,
    head: watch::Receiver<ChainProperties>,
    metrics: Arc<NodeMetrics>,
    shutdown: Arc<ShutdownController>,
    production: Option<Arc<ProductionLoop>>,
    synced: Arc<AtomicBool>,
    /// Handles for spawned background tasks (joined during stop).
    task_handles: Vec<JoinHandle<()>>,
}

impl DposNode {
    /// Open storage as configured and prepare the node. Nothing runs until
    /// [`start`](Self::start).
    pub fn new(
        config: NodeConfig,
        clock: Arc<dyn Clock>,
        broadcaster: Arc<dyn Broadcaster>,
    ) -> Result<Self, NodeError> {
        let kv: Arc<dyn KvStore> = match config.storage {
            StorageBackend::Memory => Arc::new(NullStore::new()),
            StorageBackend::Lmdb => {
                Arc::new(LmdbStore::open(&config.data_dir, config.lmdb_map_size)?)
            }
        };
        Self::with_store(config, kv, clock, broadcaster)
    }

    /// Build the node over an already-open store.
    pub fn with_store(
        config: NodeConfig,
        kv: Arc<dyn KvStore>,
        clock: Arc<dyn Clock>,
        broadcaster: Arc<dyn Broadcaster>,
    ) -> Result<Self, NodeError> {
        let metrics = Arc::new(NodeMetrics::new()?);
        let shutdown = Arc::new(ShutdownController::new());
        let genesis = config.genesis.decode()?;

        let engine = ChainEngine::open(
            kv,
            config.chain.clone(),
            &genesis,
            metrics.clone(),
            shutdown.token(),
        )?;
        let head = engine.subscribe_head();
        let engine = Arc::new(Mutex::new(engine));
        let synced = Arc::new(AtomicBool::new(false));

        let production = if config.production.enabled {
            let key = config.production.keypair()?;
            let witness = config.production.witness(key.as_ref())?;
            if witness.is_none() {
                return Err(NodeError::Config(
                    "production is enabled but no witness address or key is configured".into(),
                ));
            }
            Some(Arc::new(ProductionLoop::new(
                engine.clone(),
                clock,
                broadcaster,
                &config.production,
                witness,
                key,
                synced.clone(),
                shutdown.clone(),
            )))
        } else {
            None
        };

        tracing::info!(
            network = config.network.as_str(),
            storage = ?config.storage,
            producing = production.is_some(),
            "node initialized"
        );
        Ok(Self {
            config,
            engine,
            head,
            metrics,
            shutdown,
            production,
            synced,
            task_handles: Vec::new(),
        })
    }

    /// Spawn the background tasks. Must be called inside a Tokio runtime.
    pub fn start(&mut self) -> Result<(), NodeError> {
        if self.shutdown.is_shutdown() {
            return Err(NodeError::Stopped);
        }
        if !self.task_handles.is_empty() {
            return Err(NodeError::AlreadyRunning);
        }
        if let Some(production) = &self.production {
            let rx = self.shutdown.subscribe();
            self.task_handles.push(tokio::spawn(production.clone().run(rx)));
        }
        tracing::info!("node started");
        Ok(())
    }

    /// Signal every task to stop and wait for them. An assembly in progress
    /// runs to completion first.
    pub async fn stop(&mut self) {
        tracing::info!("node stopping");
        self.shutdown.shutdown();
        for handle in self.task_handles.drain(..) {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "background task ended abnormally");
            }
        }
        tracing::info!("node stopped");
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Consistent snapshot of the head record, without taking the engine lock.
    pub fn head(&self) -> ChainProperties {
        *self.head.borrow()
    }

    pub fn engine(&self) -> Arc<Mutex<ChainEngine>> {
        self.engine.clone()
    }

    pub fn metrics(&self) -> &Arc<NodeMetrics> {
        &self.metrics
    }

    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        self.shutdown.clone()
    }

    pub fn production(&self) -> Option<&Arc<ProductionLoop>> {
        self.production.as_ref()
    }

    /// Set by the sync layer once the node has caught up with its peers.
    pub fn set_synced(&self, synced: bool) {
        self.synced.store(synced, Ordering::SeqCst);
    }

    pub fn is_synced(&self) -> bool {
        self.synced.load(Ordering::SeqCst)
    }
}
