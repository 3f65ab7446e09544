//! Vote tally and active-witness selection.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

use dpos_store::LedgerState;
use dpos_types::{Address, RankOrder};

use crate::TxError;

/// Count every account's votes, write the totals onto the witness records,
/// and flag the top `max_active` witnesses as active.
///
/// Returns the new active set in rank order, or `None` when no account has
/// voted for a registered witness; the stored active flags are then left
/// as they were. Votes for addresses that are not registered are ignored.
/// Ties rank by ascending address.
pub fn tally_and_rotate_active_witnesses(
    state: &LedgerState,
    max_active: usize,
    order: RankOrder,
) -> Result<Option<Vec<Address>>, TxError> {
    let mut witnesses = state.witnesses.iter()?;
    let registered: BTreeSet<Address> = witnesses.iter().map(|w| w.address).collect();

    let mut totals: BTreeMap<Address, u64> = BTreeMap::new();
    for account in state.accounts.iter()? {
        for (witness, count) in &account.votes {
            if registered.contains(witness) {
                let total = totals.entry(*witness).or_insert(0);
                *total = total.saturating_add(*count);
            }
        }
    }
    if totals.is_empty() {
        tracing::warn!("vote tally is empty, keeping the current active witnesses");
        return Ok(None);
    }

    for witness in &mut witnesses {
        witness.vote_count = totals.get(&witness.address).copied().unwrap_or(0);
    }

    let mut ranked: Vec<(u64, Address)> = witnesses
        .iter()
        .map(|w| (w.vote_count, w.address))
        .collect();
    match order {
        RankOrder::HighestVotes => ranked.sort_by_key(|(votes, addr)| (Reverse(*votes), *addr)),
        RankOrder::LowestVotes => ranked.sort_by_key(|(votes, addr)| (*votes, *addr)),
    }
    let active: Vec<Address> = ranked
        .into_iter()
        .take(max_active)
        .map(|(_, addr)| addr)
        .collect();

    for witness in &mut witnesses {
        witness.is_active = active.contains(&witness.address);
    }
    state.witnesses.put_all(&witnesses)?;

    tracing::info!(
        active = active.len(),
        registered = witnesses.len(),
        "active witness set rotated"
    );
    Ok(Some(active))
}
