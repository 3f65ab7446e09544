//! Local block assembly.
//!
//! Takes a snapshot of the pending pool, applies what fits the byte budget,
//! signs the result, and pushes it onto the chain as a local block. Pool
//! removals happen only after the whole snapshot has been decided.

use dpos_ledger::block::HEADER_LEN;
use dpos_ledger::{Block, BlockSource, ChainError, ChainStore, PushOutcome};
use dpos_store::LedgerState;
use dpos_transactions::{TransactionApplier, TxError};
use dpos_types::{Address, PrivateKey, Timestamp, TxHash};
use thiserror::Error;

use crate::pool::PendingPool;
use crate::shutdown::CancelToken;
use crate::tracing_spans::tx_apply_span;

const SIGNATURE_LEN: usize = 64;

#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("block time {when} is not after parent time {parent}")]
    TimeTravel { parent: Timestamp, when: Timestamp },

    #[error("assembly cancelled")]
    Cancelled,

    #[error("transaction error: {0}")]
    Transaction(#[from] TxError),

    #[error("chain error: {0}")]
    Chain(#[from] ChainError),
}

impl AssembleError {
    pub fn is_fatal(&self) -> bool {
        match self {
            AssembleError::Transaction(e) => e.is_fatal(),
            AssembleError::Chain(e) => e.is_fatal(),
            AssembleError::TimeTravel { .. } | AssembleError::Cancelled => false,
        }
    }
}

/// A block built, signed, and pushed by [`BlockAssembler::assemble`].
#[derive(Debug)]
pub struct AssembledBlock {
    pub block: Block,
    pub outcome: PushOutcome,
    /// Left in the pool because the block was full.
    pub postponed: usize,
    /// Removed from the pool after failing to apply.
    pub dropped: usize,
}

pub struct BlockAssembler {
    applier: TransactionApplier,
    budget: usize,
    cancel: CancelToken,
}

impl BlockAssembler {
    pub fn new(budget: usize, cancel: CancelToken) -> Self {
        Self {
            applier: TransactionApplier::new(),
            budget,
            cancel,
        }
    }

    /// Build the next block on top of the current head at time `when`.
    ///
    /// Every included transaction has been applied exactly once; every
    /// transaction skipped for size is still queued; every transaction that
    /// failed to apply is gone from the pool.
    pub fn assemble(
        &self,
        chain: &mut ChainStore,
        state: &LedgerState,
        pool: &mut PendingPool,
        witness: Address,
        key: &PrivateKey,
        when: Timestamp,
    ) -> Result<AssembledBlock, AssembleError> {
        if self.cancel.is_cancelled() {
            return Err(AssembleError::Cancelled);
        }
        let head = *chain.head();
        if when <= head.latest_block_timestamp {
            return Err(AssembleError::TimeTravel {
                parent: head.latest_block_timestamp,
                when,
            });
        }

        let mut size = HEADER_LEN + SIGNATURE_LEN;
        let mut included = Vec::new();
        let mut consumed: Vec<TxHash> = Vec::new();
        let mut postponed = 0;
        let mut dropped = 0;

        for (id, tx) in pool.snapshot() {
            let tx_size = tx.encoded_size();
            if size + tx_size > self.budget {
                postponed += 1;
                continue;
            }
            let _span = tx_apply_span(&id).entered();
            match self.applier.apply(&tx, state) {
                Ok(_) => {
                    size += tx_size;
                    included.push(tx);
                    consumed.push(id);
                }
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    tracing::debug!(tx = %id, error = %e, "dropping transaction that failed to apply");
                    dropped += 1;
                    consumed.push(id);
                }
            }
        }
        pool.remove(consumed.iter());

        let mut block = Block::new(
            head.latest_block_number + 1,
            head.latest_block_hash,
            when,
            witness,
            included,
        );
        block.sign(key);
        let outcome = chain.push(block.clone(), BlockSource::Local)?;

        tracing::debug!(
            block = %block.id(),
            number = block.number,
            transactions = block.transactions.len(),
            bytes = size,
            postponed,
            dropped,
            "assembled block"
        );
        Ok(AssembledBlock {
            block,
            outcome,
            postponed,
            dropped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dpos_crypto::keypair_from_seed;
    use dpos_nullables::NullStore;
    use dpos_store::{Account, KvStore};
    use dpos_transactions::{Operation, Transaction, TransferOp};
    use dpos_types::{ChainParams, KeyPair};
    use std::sync::Arc;

    const GENESIS: i64 = 1_000_000;

    struct Fixture {
        chain: ChainStore,
        state: LedgerState,
        pool: PendingPool,
        witness: KeyPair,
        sender: KeyPair,
    }

    fn fixture() -> Fixture {
        let kv: Arc<dyn KvStore> = Arc::new(NullStore::new());
        let params = ChainParams {
            genesis_timestamp_ms: GENESIS,
            ..ChainParams::default()
        };
        let chain = ChainStore::open(kv.clone(), params).unwrap();
        let state = LedgerState::new(kv);
        let sender = keypair_from_seed(&[2; 32]);
        state.accounts.put(&Account::new(sender.address(), 1_000)).unwrap();
        Fixture {
            chain,
            state,
            pool: PendingPool::with_default_size(),
            witness: keypair_from_seed(&[1; 32]),
            sender,
        }
    }

    fn transfer(kp: &KeyPair, amount: u64, at: i64) -> Transaction {
        Transaction::new_signed(
            Operation::Transfer(TransferOp {
                from: kp.address(),
                to: Address::new([7; 32]),
                amount,
            }),
            Timestamp::from_millis(at),
            kp,
        )
    }

    fn assemble(f: &mut Fixture, assembler: &BlockAssembler, when: i64) -> Result<AssembledBlock, AssembleError> {
        assembler.assemble(
            &mut f.chain,
            &f.state,
            &mut f.pool,
            f.witness.address(),
            &f.witness.private,
            Timestamp::from_millis(when),
        )
    }

    #[test]
    fn includes_every_fitting_transaction_once() {
        let mut f = fixture();
        let txs: Vec<_> = (1..=3).map(|i| transfer(&f.sender, 10, i)).collect();
        for tx in &txs {
            f.pool.insert(tx.clone());
        }
        let assembler = BlockAssembler::new(2_000_000, CancelToken::new());
        let built = assemble(&mut f, &assembler, GENESIS + 3_000).unwrap();

        assert_eq!(built.block.transactions, txs);
        assert!(f.pool.is_empty());
        assert!(built.block.verify_signature());
        assert_eq!(built.block.compute_merkle_root(), built.block.merkle_root);
        assert!(matches!(built.outcome, PushOutcome::NewHead { .. }));
        assert_eq!(f.chain.head().latest_block_number, 1);
        let sender = f.state.accounts.get(&f.sender.address()).unwrap().unwrap();
        assert_eq!(sender.balance, 970);
    }

    #[test]
    fn oversized_transaction_stays_queued() {
        let mut f = fixture();
        let tx1 = transfer(&f.sender, 10, 1);
        let tx2 = transfer(&f.sender, 20, 2);
        f.pool.insert(tx1.clone());
        f.pool.insert(tx2.clone());

        let budget = HEADER_LEN + SIGNATURE_LEN + tx1.encoded_size() + tx2.encoded_size() / 2;
        let assembler = BlockAssembler::new(budget, CancelToken::new());
        let built = assemble(&mut f, &assembler, GENESIS + 3_000).unwrap();

        assert_eq!(built.block.transactions, vec![tx1]);
        assert_eq!(built.postponed, 1);
        assert_eq!(f.pool.len(), 1);
        assert!(f.pool.contains(&tx2.id()));
    }

    #[test]
    fn failed_transaction_is_dropped() {
        let mut f = fixture();
        let good = transfer(&f.sender, 10, 1);
        let broke = transfer(&keypair_from_seed(&[3; 32]), 10, 2);
        f.pool.insert(broke.clone());
        f.pool.insert(good.clone());

        let assembler = BlockAssembler::new(2_000_000, CancelToken::new());
        let built = assemble(&mut f, &assembler, GENESIS + 3_000).unwrap();

        assert_eq!(built.block.transactions, vec![good]);
        assert_eq!(built.dropped, 1);
        assert!(f.pool.is_empty());
    }

    #[test]
    fn time_travel_is_rejected_before_touching_the_pool() {
        let mut f = fixture();
        f.pool.insert(transfer(&f.sender, 10, 1));
        let assembler = BlockAssembler::new(2_000_000, CancelToken::new());
        let err = assemble(&mut f, &assembler, GENESIS - 1).unwrap_err();
        assert!(matches!(err, AssembleError::TimeTravel { .. }));
        assert!(!err.is_fatal());
        assert_eq!(f.pool.len(), 1);
        assert_eq!(f.chain.head().latest_block_number, 0);
    }

    #[test]
    fn cancelled_assembly_does_nothing() {
        let mut f = fixture();
        let token = CancelToken::new();
        token.cancel();
        let assembler = BlockAssembler::new(2_000_000, token);
        assert!(matches!(
            assemble(&mut f, &assembler, GENESIS + 3_000),
            Err(AssembleError::Cancelled)
        ));
        assert_eq!(f.chain.head().latest_block_number, 0);
    }

    #[test]
    fn empty_pool_still_produces_a_block() {
        let mut f = fixture();
        let assembler = BlockAssembler::new(2_000_000, CancelToken::new());
        let built = assemble(&mut f, &assembler, GENESIS + 3_000).unwrap();
        assert!(built.block.transactions.is_empty());
        assert_eq!(built.block.merkle_root, dpos_types::BlockHash::ZERO);
    }
}
