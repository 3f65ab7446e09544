//! Witness block production.
//!
//! One periodic task wakes at each slot boundary, asks the scheduler whose
//! turn it is, and produces a block when it is ours. Every tick reports a
//! [`ProductionCondition`]; production failures are logged and the loop
//! carries on. Only cancellation or a storage failure ends it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dpos_types::{Address, Broadcaster, Clock, KeyPair};
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};

use crate::assembler::AssembleError;
use crate::config::ProductionConfig;
use crate::engine::ChainEngine;
use crate::shutdown::{CancelToken, ShutdownController};
use crate::tracing_spans::block_produce_span;
use crate::NodeError;

/// Sleeps shorter than this roll over to the following slot.
const MIN_SLEEP_MS: i64 = 50;

/// Outcome of one production tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductionCondition {
    NotSynced,
    LowParticipation,
    NotTimeYet,
    NotMyTurn,
    Lag,
    NoPrivateKey,
    Produced,
    ExceptionProducingBlock,
}

#[derive(Debug, Error)]
pub enum ProductionError {
    #[error("production cancelled")]
    Cancelled,

    #[error("fatal node error: {0}")]
    Fatal(NodeError),
}

pub struct ProductionLoop {
    engine: Arc<Mutex<ChainEngine>>,
    clock: Arc<dyn Clock>,
    broadcaster: Arc<dyn Broadcaster>,
    witness: Option<Address>,
    key: Option<KeyPair>,
    min_participation_rate: u8,
    produce_timeout_ms: i64,
    enable_stale_production: bool,
    synced: Arc<AtomicBool>,
    shutdown: Arc<ShutdownController>,
    cancel: CancelToken,
}

impl ProductionLoop {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        engine: Arc<Mutex<ChainEngine>>,
        clock: Arc<dyn Clock>,
        broadcaster: Arc<dyn Broadcaster>,
        config: &ProductionConfig,
        witness: Option<Address>,
        key: Option<KeyPair>,
        synced: Arc<AtomicBool>,
        shutdown: Arc<ShutdownController>,
    ) -> Self {
        let cancel = shutdown.token();
        Self {
            engine,
            clock,
            broadcaster,
            witness,
            key,
            min_participation_rate: config.min_participation_rate,
            produce_timeout_ms: config.produce_timeout_ms,
            enable_stale_production: config.enable_stale_production,
            synced,
            shutdown,
            cancel,
        }
    }

    pub fn witness(&self) -> Option<Address> {
        self.witness
    }

    /// One production attempt at the current clock time.
    pub async fn try_produce_block(&self) -> Result<ProductionCondition, ProductionError> {
        if self.cancel.is_cancelled() {
            return Err(ProductionError::Cancelled);
        }
        if !self.enable_stale_production && !self.synced.load(Ordering::SeqCst) {
            return Ok(ProductionCondition::NotSynced);
        }

        let mut engine = self.engine.lock().await;
        let head = engine.head();
        let now = self.clock.now();
        let scheduler = engine.scheduler();

        let participation = scheduler.participation_rate(&head);
        if participation < self.min_participation_rate {
            tracing::warn!(
                participation,
                required = self.min_participation_rate,
                "participation too low to produce"
            );
            return Ok(ProductionCondition::LowParticipation);
        }

        let slot = scheduler.slot_at_time(now, &head);
        if slot == 0 {
            return Ok(ProductionCondition::NotTimeYet);
        }

        let scheduled = match scheduler.scheduled_witness(slot, &head) {
            Ok(witness) => witness,
            Err(e) => {
                tracing::error!(slot, error = %e, "no witness schedule");
                return Ok(ProductionCondition::ExceptionProducingBlock);
            }
        };
        if self.witness != Some(scheduled) {
            return Ok(ProductionCondition::NotMyTurn);
        }

        let slot_time = scheduler.slot_time(slot, &head, now);
        let late_by = slot_time.millis_until(now);
        if late_by > self.produce_timeout_ms {
            tracing::warn!(slot, late_by, "missed production deadline");
            return Ok(ProductionCondition::Lag);
        }

        let Some(key) = &self.key else {
            tracing::warn!(slot, witness = %scheduled, "our slot, but no witness key is configured");
            return Ok(ProductionCondition::NoPrivateKey);
        };

        let span = block_produce_span(slot, &scheduled);
        let produced = span.in_scope(|| engine.produce_block(scheduled, &key.private, slot_time));
        let block = match produced {
            Ok(block) => block,
            Err(NodeError::Assemble(AssembleError::Cancelled)) => {
                return Err(ProductionError::Cancelled)
            }
            Err(e) if e.is_fatal() => return Err(ProductionError::Fatal(e)),
            Err(e) => {
                tracing::error!(slot, error = %e, "block production failed");
                return Ok(ProductionCondition::ExceptionProducingBlock);
            }
        };

        engine.rotate_if_due();
        drop(engine);

        let sent = block
            .encode()
            .map_err(|e| e.to_string())
            .and_then(|bytes| self.broadcaster.broadcast(&bytes).map_err(|e| e.to_string()));
        if let Err(e) = sent {
            tracing::error!(block = %block.id(), error = %e, "failed to broadcast produced block");
            return Ok(ProductionCondition::ExceptionProducingBlock);
        }
        Ok(ProductionCondition::Produced)
    }

    /// Time until the next slot boundary, skipping one that is too close.
    async fn until_next_slot(&self) -> Duration {
        let (interval, genesis) = {
            let engine = self.engine.lock().await;
            let params = engine.scheduler().params();
            (params.block_interval_ms.max(1), params.genesis_timestamp_ms)
        };
        let now = self.clock.now().as_millis();
        let mut wait = interval - (now - genesis).rem_euclid(interval);
        if wait < MIN_SLEEP_MS {
            wait += interval;
        }
        Duration::from_millis(wait as u64)
    }

    /// Run until shutdown. A fatal error shuts the whole node down.
    pub async fn run(self: Arc<Self>, mut shutdown_rx: broadcast::Receiver<()>) {
        tracing::info!(witness = ?self.witness, "witness production loop started");
        loop {
            match self.try_produce_block().await {
                Ok(condition) => log_condition(condition),
                Err(ProductionError::Cancelled) => break,
                Err(ProductionError::Fatal(e)) => {
                    tracing::error!(error = %e, "fatal error in production loop, shutting down");
                    self.shutdown.shutdown();
                    break;
                }
            }

            let wait = self.until_next_slot().await;
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                _ = tokio::time::sleep(wait) => {}
            }
        }
        tracing::info!("witness production loop stopped");
    }
}

fn log_condition(condition: ProductionCondition) {
    use ProductionCondition::*;
    match condition {
        Produced => tracing::info!(?condition, "production tick"),
        // Already reported with details at warn or error level.
        ExceptionProducingBlock | LowParticipation | Lag | NoPrivateKey => {
            tracing::trace!(?condition, "production tick")
        }
        NotSynced | NotTimeYet | NotMyTurn => {
            tracing::debug!(?condition, "production tick")
        }
    }
}
