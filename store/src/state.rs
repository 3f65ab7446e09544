use std::sync::Arc;

use crate::{AccountLedger, KvStore, WitnessRegistry};

/// The mutable ledger state transactions operate on.
#[derive(Clone)]
pub struct LedgerState {
    pub accounts: AccountLedger,
    pub witnesses: WitnessRegistry,
}

impl LedgerState {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self {
            accounts: AccountLedger::new(kv.clone()),
            witnesses: WitnessRegistry::new(kv),
        }
    }
}
