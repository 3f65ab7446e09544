use std::sync::Arc;

use dpos_crypto::keypair_from_seed;
use dpos_ledger::{Block, BlockSource, ChainError, ChainStore, PushOutcome};
use dpos_nullables::NullStore;
use dpos_store::KvStore;
use dpos_transactions::{Operation, Transaction, TransferOp};
use dpos_types::{Address, BlockHash, ChainParams, KeyPair, Timestamp};

const INTERVAL: i64 = 3_000;

fn params() -> ChainParams {
    ChainParams {
        genesis_timestamp_ms: 0,
        block_interval_ms: INTERVAL,
        fork_tree_depth: 4,
        ..ChainParams::default()
    }
}

fn witness(seed: u8) -> KeyPair {
    keypair_from_seed(&[seed; 32])
}

/// A signed child of `parent` in slot `slot` (absolute, from genesis).
fn child(parent: &Block, slot: i64, producer: &KeyPair, txs: Vec<Transaction>) -> Block {
    let mut block = Block::new(
        parent.number + 1,
        parent.id(),
        Timestamp::from_millis(slot * INTERVAL),
        producer.address(),
        txs,
    );
    block.sign(&producer.private);
    block
}

fn transfer(amount: u64) -> Transaction {
    let kp = keypair_from_seed(&[50; 32]);
    Transaction::new_signed(
        Operation::Transfer(TransferOp {
            from: kp.address(),
            to: Address::new([51; 32]),
            amount,
        }),
        Timestamp::from_millis(amount as i64),
        &kp,
    )
}

fn open() -> (Arc<NullStore>, ChainStore) {
    let kv = Arc::new(NullStore::new());
    let chain = ChainStore::open(kv.clone(), params()).unwrap();
    (kv, chain)
}

#[test]
fn open_writes_genesis_once() {
    let (kv, chain) = open();
    assert!(chain.was_created());
    assert_eq!(chain.head().latest_block_number, 0);
    assert_eq!(chain.get_block_id_by_number(0).unwrap(), Some(chain.genesis_id()));

    let reopened = ChainStore::open(kv.clone(), params()).unwrap();
    assert!(!reopened.was_created());
    assert_eq!(reopened.genesis_id(), chain.genesis_id());

    let other = ChainParams {
        genesis_timestamp_ms: 42,
        ..params()
    };
    let err = ChainStore::open(kv as Arc<dyn KvStore>, other).err().unwrap();
    assert!(matches!(err, ChainError::GenesisMismatch { .. }));
    assert!(err.is_fatal());
}

#[test]
fn extending_head_persists_contiguously() {
    let (_kv, mut chain) = open();
    let w = witness(1);
    let mut parent = chain.head_block().unwrap();
    for slot in 1..=5 {
        let block = child(&parent, slot, &w, vec![]);
        let outcome = chain.push(block.clone(), BlockSource::Network).unwrap();
        assert!(matches!(outcome, PushOutcome::NewHead { ref detached, .. } if detached.is_empty()));
        parent = block;
    }
    assert_eq!(chain.head().latest_block_number, 5);
    assert_eq!(chain.head().latest_block_hash, parent.id());
    for n in 0..=5 {
        assert!(chain.get_block_id_by_number(n).unwrap().is_some());
    }
    assert_eq!(chain.get_block_id_by_number(6).unwrap(), None);
    assert_eq!(chain.head().participation_rate(), 100);
}

#[test]
fn unknown_parent_is_rejected_and_head_unchanged() {
    let (_kv, mut chain) = open();
    let w = witness(1);
    let genesis = chain.head_block().unwrap();
    let mut orphan = child(&genesis, 1, &w, vec![]);
    orphan.parent = BlockHash::new([0xEE; 32]);
    orphan.sign(&w.private);

    let err = chain.push(orphan, BlockSource::Network).unwrap_err();
    assert!(matches!(err, ChainError::BadBlock(_)));
    assert!(!err.is_fatal());
    assert_eq!(chain.head().latest_block_hash, chain.genesis_id());
}

#[test]
fn tampered_merkle_root_is_rejected() {
    let (_kv, mut chain) = open();
    let w = witness(1);
    let genesis = chain.head_block().unwrap();
    let mut block = child(&genesis, 1, &w, vec![transfer(1), transfer(2)]);
    block.transactions.pop();
    // Re-sign so only the merkle check can catch it.
    block.sign(&w.private);
    assert!(matches!(
        chain.push(block, BlockSource::Network),
        Err(ChainError::BadBlock(reason)) if reason.contains("merkle")
    ));
}

#[test]
fn bad_signature_is_rejected_for_network_blocks_only() {
    let (_kv, mut chain) = open();
    let w = witness(1);
    let genesis = chain.head_block().unwrap();
    let mut block = child(&genesis, 1, &w, vec![]);
    block.signature.0[10] ^= 1;
    assert!(matches!(
        chain.push(block.clone(), BlockSource::Network),
        Err(ChainError::BadBlock(_))
    ));
    assert!(chain.push(block, BlockSource::Local).is_ok());
}

#[test]
fn non_sequential_number_or_time_is_rejected() {
    let (_kv, mut chain) = open();
    let w = witness(1);
    let genesis = chain.head_block().unwrap();

    let mut skipped = child(&genesis, 1, &w, vec![]);
    skipped.number = 2;
    skipped.sign(&w.private);
    assert!(chain.push(skipped, BlockSource::Network).is_err());

    let mut stale = child(&genesis, 0, &w, vec![]);
    stale.sign(&w.private);
    assert!(chain.push(stale, BlockSource::Network).is_err());
}

#[test]
fn duplicate_push_is_a_no_op() {
    let (_kv, mut chain) = open();
    let genesis = chain.head_block().unwrap();
    let block = child(&genesis, 1, &witness(1), vec![]);
    chain.push(block.clone(), BlockSource::Network).unwrap();
    assert_eq!(
        chain.push(block, BlockSource::Network).unwrap(),
        PushOutcome::Duplicate
    );
}

#[test]
fn fork_choice_follows_the_deeper_branch() {
    let (_kv, mut chain) = open();
    let (wa, wb) = (witness(1), witness(2));
    let genesis = chain.head_block().unwrap();

    let b1 = child(&genesis, 1, &wa, vec![transfer(1)]);
    let b2 = child(&genesis, 2, &wb, vec![transfer(2)]);
    chain.push(b1.clone(), BlockSource::Network).unwrap();
    // Same height, later arrival: stays a candidate.
    assert_eq!(
        chain.push(b2.clone(), BlockSource::Network).unwrap(),
        PushOutcome::Candidate
    );
    assert_eq!(chain.head().latest_block_hash, b1.id());

    let c = child(&b2, 3, &wa, vec![]);
    let outcome = chain.push(c.clone(), BlockSource::Network).unwrap();
    assert_eq!(
        outcome,
        PushOutcome::NewHead {
            attached: vec![b2.clone(), c.clone()],
            detached: vec![b1.clone()],
        }
    );
    assert_eq!(chain.head().latest_block_hash, c.id());
    assert_eq!(chain.get_block_id_by_number(1).unwrap(), Some(b2.id()));
    assert!(chain.is_canonical(&b2.id()).unwrap());
    assert!(!chain.is_canonical(&b1.id()).unwrap());
    // The abandoned block is still a candidate.
    assert!(chain.contains_block(&b1.id()).unwrap());

    // Transaction index follows the canonical chain.
    assert_eq!(chain.transaction_block(&transfer(2).id()).unwrap(), Some(b2.id()));
    assert_eq!(chain.transaction_block(&transfer(1).id()).unwrap(), None);

    let (to_head, to_other) = chain.get_branch(&c.id(), &b1.id()).unwrap();
    assert_eq!(to_head, vec![b2, c]);
    assert_eq!(to_other, vec![b1]);
}

#[test]
fn repeated_transaction_in_block_is_rejected() {
    let (_kv, mut chain) = open();
    let w = witness(1);
    let genesis = chain.head_block().unwrap();
    let honest = child(&genesis, 1, &w, vec![transfer(1), transfer(2), transfer(3)]);

    // Repeating the odd last leaf leaves the merkle root, and so the id, unchanged.
    let mut forged = honest.clone();
    forged.transactions.push(transfer(3));
    assert_eq!(forged.compute_merkle_root(), honest.merkle_root);
    assert_eq!(forged.id(), honest.id());

    assert!(matches!(
        chain.push(forged, BlockSource::Network),
        Err(ChainError::BadBlock(reason)) if reason.contains("duplicate")
    ));
    assert_eq!(chain.head().latest_block_hash, chain.genesis_id());
    assert!(!chain.contains_block(&honest.id()).unwrap());

    assert!(matches!(
        chain.push(honest.clone(), BlockSource::Network).unwrap(),
        PushOutcome::NewHead { .. }
    ));
    assert_eq!(chain.get_block(&honest.id()).unwrap().unwrap().transactions.len(), 3);
}

#[test]
fn transaction_replayed_from_an_ancestor_is_rejected() {
    let (_kv, mut chain) = open();
    let (wa, wb) = (witness(1), witness(2));
    let genesis = chain.head_block().unwrap();

    let b1 = child(&genesis, 1, &wa, vec![transfer(1)]);
    chain.push(b1.clone(), BlockSource::Network).unwrap();
    let replay = child(&b1, 2, &wa, vec![transfer(1)]);
    assert!(matches!(
        chain.push(replay, BlockSource::Network),
        Err(ChainError::BadBlock(reason)) if reason.contains("already included")
    ));
    assert_eq!(chain.head().latest_block_hash, b1.id());

    // Replays along a side branch are caught too.
    let side = child(&genesis, 2, &wb, vec![transfer(2)]);
    assert_eq!(
        chain.push(side.clone(), BlockSource::Network).unwrap(),
        PushOutcome::Candidate
    );
    let side_replay = child(&side, 3, &wb, vec![transfer(2)]);
    assert!(chain.push(side_replay, BlockSource::Network).is_err());

    // A competing branch may carry what the abandoned one included.
    let sibling = child(&side, 3, &wb, vec![transfer(1)]);
    let outcome = chain.push(sibling.clone(), BlockSource::Network).unwrap();
    assert!(matches!(outcome, PushOutcome::NewHead { ref detached, .. } if detached == &vec![b1.clone()]));
    assert_eq!(chain.transaction_block(&transfer(1).id()).unwrap(), Some(sibling.id()));
}

#[test]
fn reorg_keeps_the_abandoned_branch_after_reopen() {
    let (kv, mut chain) = open();
    let (wa, wb) = (witness(1), witness(2));
    let genesis = chain.head_block().unwrap();
    let a1 = child(&genesis, 1, &wa, vec![transfer(1)]);
    let a2 = child(&a1, 2, &wa, vec![]);
    chain.push(a1.clone(), BlockSource::Network).unwrap();
    chain.push(a2.clone(), BlockSource::Network).unwrap();
    drop(chain);

    // A fresh store has no candidates in memory.
    let mut chain = ChainStore::open(kv.clone(), params()).unwrap();
    assert_eq!(chain.candidate_count(), 0);
    let b1 = child(&genesis, 3, &wb, vec![]);
    let b2 = child(&b1, 4, &wb, vec![]);
    let b3 = child(&b2, 5, &wb, vec![]);
    chain.push(b1.clone(), BlockSource::Network).unwrap();
    chain.push(b2.clone(), BlockSource::Network).unwrap();
    let outcome = chain.push(b3.clone(), BlockSource::Network).unwrap();
    assert!(matches!(
        outcome,
        PushOutcome::NewHead { ref detached, .. } if detached == &vec![a1.clone(), a2.clone()]
    ));

    assert!(chain.get_block(&a1.id()).unwrap().is_some());
    assert!(!chain.is_canonical(&a2.id()).unwrap());
    assert_eq!(chain.transaction_block(&transfer(1).id()).unwrap(), None);
    let (to_head, to_old) = chain.get_branch(&b3.id(), &a2.id()).unwrap();
    assert_eq!(to_head, vec![b1, b2, b3.clone()]);
    assert_eq!(to_old, vec![a1.clone(), a2.clone()]);

    let reopened = ChainStore::open(kv, params()).unwrap();
    assert_eq!(reopened.head().latest_block_hash, b3.id());
    assert_eq!(reopened.get_block(&a2.id()).unwrap(), Some(a2));
}

#[test]
fn reorg_recomputes_participation_from_the_new_branch() {
    let (_kv, mut chain) = open();
    let (wa, wb) = (witness(1), witness(2));
    let genesis = chain.head_block().unwrap();
    let a1 = child(&genesis, 1, &wa, vec![]);
    let a2 = child(&a1, 2, &wa, vec![]);
    chain.push(a1, BlockSource::Network).unwrap();
    chain.push(a2, BlockSource::Network).unwrap();
    assert_eq!(chain.head().recent_slots_filled, u128::MAX);

    let b1 = child(&genesis, 3, &wb, vec![]);
    let b2 = child(&b1, 4, &wb, vec![]);
    let b3 = child(&b2, 5, &wb, vec![]);
    for block in [&b1, &b2, &b3] {
        chain.push(block.clone(), BlockSource::Network).unwrap();
    }

    // Same bitmap as a chain that only ever saw the winning branch.
    let (_kv, mut fresh) = open();
    for block in [b1, b2, b3] {
        fresh.push(block, BlockSource::Network).unwrap();
    }
    assert_eq!(chain.head().recent_slots_filled, fresh.head().recent_slots_filled);
    // Slots 1 and 2 were empty on the winning branch.
    assert_eq!(chain.head().recent_slots_filled.count_ones(), 126);
}

#[test]
fn get_branch_of_same_block_is_empty() {
    let (_kv, chain) = open();
    let (a, b) = chain.get_branch(&chain.genesis_id(), &chain.genesis_id()).unwrap();
    assert!(a.is_empty() && b.is_empty());
}

#[test]
fn get_branch_with_unknown_block_is_unreachable() {
    let (_kv, chain) = open();
    assert!(matches!(
        chain.get_branch(&chain.genesis_id(), &BlockHash::new([3; 32])),
        Err(ChainError::ChainUnreachable(_))
    ));
}

#[test]
fn missed_slots_reduce_participation() {
    let (_kv, mut chain) = open();
    let genesis = chain.head_block().unwrap();
    // Slot 65 leaves slots 1..=64 empty.
    chain
        .push(child(&genesis, 65, &witness(1), vec![]), BlockSource::Network)
        .unwrap();
    assert_eq!(chain.head().participation_rate(), 50);
}

#[test]
fn deleting_head_falls_back_to_parent() {
    let (_kv, mut chain) = open();
    let w = witness(1);
    let genesis = chain.head_block().unwrap();
    let b1 = child(&genesis, 1, &w, vec![]);
    let b2 = child(&b1, 2, &w, vec![]);
    chain.push(b1.clone(), BlockSource::Network).unwrap();
    chain.push(b2.clone(), BlockSource::Network).unwrap();

    chain.delete_block(&b2.id()).unwrap();
    assert!(!chain.contains_block(&b2.id()).unwrap());
    assert_eq!(chain.head().latest_block_hash, b1.id());
    assert_eq!(chain.head().latest_block_number, 1);
    assert_eq!(chain.get_block_id_by_number(2).unwrap(), None);

    assert!(chain.delete_block(&chain.genesis_id()).is_err());
}

#[test]
fn pruning_keeps_recent_candidates() {
    let (_kv, mut chain) = open();
    let w = witness(1);
    let mut parent = chain.head_block().unwrap();
    for slot in 1..=10 {
        let block = child(&parent, slot, &w, vec![]);
        chain.push(block.clone(), BlockSource::Network).unwrap();
        parent = block;
    }
    assert_eq!(chain.candidate_count(), 10);
    // Head is 10 and the depth 4, so numbers below 6 go.
    assert_eq!(chain.prune_forks(), 5);
    assert_eq!(chain.candidate_count(), 5);
    // Pruned canonical blocks are still served from durable storage.
    let first = chain.get_block_id_by_number(1).unwrap().unwrap();
    assert!(chain.get_block(&first).unwrap().is_some());
}

#[test]
fn storage_failure_is_fatal_and_leaves_head() {
    let (kv, mut chain) = open();
    let genesis = chain.head_block().unwrap();
    kv.set_fail_writes(true);
    let err = chain
        .push(child(&genesis, 1, &witness(1), vec![]), BlockSource::Network)
        .unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(chain.head().latest_block_number, 0);
}
