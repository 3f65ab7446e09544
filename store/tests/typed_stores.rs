use std::sync::Arc;

use dpos_nullables::NullStore;
use dpos_store::{
    Account, AccountLedger, BlockStore, ChainProperties, KvStore, LedgerState, PropertiesStore,
    Witness, WitnessRegistry, WriteBatch,
};
use dpos_types::{Address, BlockHash, Timestamp, TxHash};

fn kv() -> Arc<dyn KvStore> {
    Arc::new(NullStore::new())
}

fn addr(byte: u8) -> Address {
    Address::new([byte; 32])
}

#[test]
fn account_votes_accumulate_per_witness() {
    let ledger = AccountLedger::new(kv());
    let mut account = Account::new(addr(1), 10);
    account.add_votes(addr(7), 3).unwrap();
    account.add_votes(addr(7), 4).unwrap();
    account.add_votes(addr(8), 1).unwrap();
    ledger.put(&account).unwrap();

    let stored = ledger.get(&addr(1)).unwrap().unwrap();
    assert_eq!(stored.votes_for(&addr(7)), 7);
    assert_eq!(stored.votes_for(&addr(8)), 1);
    assert_eq!(stored.votes_for(&addr(9)), 0);
}

#[test]
fn vote_overflow_leaves_account_untouched() {
    let mut account = Account::new(addr(1), 0);
    account.add_votes(addr(2), u64::MAX).unwrap();
    assert!(account.add_votes(addr(2), 1).is_none());
    assert_eq!(account.votes_for(&addr(2)), u64::MAX);
}

#[test]
fn account_ledger_iterates_in_address_order() {
    let ledger = AccountLedger::new(kv());
    for byte in [3u8, 1, 2] {
        ledger.put(&Account::new(addr(byte), byte as u64)).unwrap();
    }
    let order: Vec<u8> = ledger.iter().unwrap().iter().map(|a| a.address.as_bytes()[0]).collect();
    assert_eq!(order, vec![1, 2, 3]);
    assert_eq!(ledger.count().unwrap(), 3);
    ledger.delete(&addr(2)).unwrap();
    assert!(!ledger.exists(&addr(2)).unwrap());
}

#[test]
fn witness_registry_tracks_active_flags() {
    let registry = WitnessRegistry::new(kv());
    let mut a = Witness::new(addr(1), "https://a.example");
    a.is_active = true;
    let b = Witness::new(addr(2), "https://b.example");
    registry.put_all(&[a, b]).unwrap();

    assert_eq!(registry.active_addresses().unwrap(), vec![addr(1)]);
    assert_eq!(registry.get(&addr(2)).unwrap().unwrap().vote_count, 0);
    assert_eq!(registry.count().unwrap(), 2);
}

#[test]
fn ledger_state_shares_one_engine() {
    let store = kv();
    let state = LedgerState::new(store.clone());
    state.accounts.put(&Account::new(addr(5), 1)).unwrap();
    assert!(AccountLedger::new(store).exists(&addr(5)).unwrap());
}

#[test]
fn canonical_staging_and_removal() {
    let store = kv();
    let blocks = BlockStore::new(store.clone());
    let hash = BlockHash::new([1; 32]);
    let tx = TxHash::new([2; 32]);

    let mut batch = WriteBatch::new();
    BlockStore::stage_canonical(&mut batch, &hash, 1, vec![0xAA], &[tx]);
    blocks.commit(batch).unwrap();
    assert!(blocks.has_block(&hash).unwrap());
    assert_eq!(blocks.hash_at(1).unwrap(), Some(hash));

    let mut batch = WriteBatch::new();
    blocks.stage_removal(&mut batch, &hash, 1, &[tx]).unwrap();
    blocks.commit(batch).unwrap();
    assert!(!blocks.has_block(&hash).unwrap());
    assert_eq!(blocks.hash_at(1).unwrap(), None);
    assert_eq!(blocks.transaction_block(&tx).unwrap(), None);
}

#[test]
fn unindexing_keeps_block_bytes() {
    let store = kv();
    let blocks = BlockStore::new(store);
    let hash = BlockHash::new([1; 32]);
    let tx = TxHash::new([2; 32]);

    let mut batch = WriteBatch::new();
    BlockStore::stage_canonical(&mut batch, &hash, 1, vec![0xAA], &[tx]);
    blocks.commit(batch).unwrap();

    let mut batch = WriteBatch::new();
    blocks.stage_unindex(&mut batch, &hash, 1, &[tx]).unwrap();
    blocks.commit(batch).unwrap();
    assert_eq!(blocks.get_block(&hash).unwrap(), Some(vec![0xAA]));
    assert_eq!(blocks.hash_at(1).unwrap(), None);
    assert_eq!(blocks.transaction_block(&tx).unwrap(), None);
}

#[test]
fn removal_keeps_index_owned_by_another_block() {
    let store = kv();
    let blocks = BlockStore::new(store);
    let canonical = BlockHash::new([1; 32]);
    let orphan = BlockHash::new([2; 32]);

    let mut batch = WriteBatch::new();
    BlockStore::stage_canonical(&mut batch, &canonical, 1, vec![1], &[]);
    blocks.commit(batch).unwrap();

    let mut batch = WriteBatch::new();
    blocks.stage_removal(&mut batch, &orphan, 1, &[]).unwrap();
    blocks.commit(batch).unwrap();
    assert_eq!(blocks.hash_at(1).unwrap(), Some(canonical));
}

#[test]
fn properties_round_trip() {
    let store = PropertiesStore::new(kv());
    assert!(store.get().unwrap().is_none());
    let props = ChainProperties::genesis(BlockHash::new([9; 32]), Timestamp::from_millis(5));
    store.put(&props).unwrap();
    assert_eq!(store.get().unwrap(), Some(props));
}
