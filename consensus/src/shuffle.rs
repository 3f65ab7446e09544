//! Deterministic witness shuffle.

use dpos_crypto::blake2b_256_multi;
use dpos_types::{Address, Timestamp};

const SHUFFLE_DOMAIN: &[u8] = b"dpos-witness-shuffle";

/// Shuffle `witnesses` with a seed derived from `seed_time`.
///
/// The input order matters: callers pass the active set sorted by address so
/// the result depends only on the set and the seed.
pub fn shuffle_witnesses(witnesses: &[Address], seed_time: Timestamp) -> Vec<Address> {
    let mut order = witnesses.to_vec();
    let seed = blake2b_256_multi(&[SHUFFLE_DOMAIN, &seed_time.as_millis().to_be_bytes()]);

    for i in (1..order.len()).rev() {
        let j = (draw(&seed, i as u64) % (i as u64 + 1)) as usize;
        order.swap(i, j);
    }
    order
}

/// One pseudo-random word per swap position.
fn draw(seed: &[u8; 32], position: u64) -> u64 {
    let digest = blake2b_256_multi(&[seed, &position.to_be_bytes()]);
    let mut word = [0u8; 8];
    word.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(word)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn witnesses(n: u8) -> Vec<Address> {
        (1..=n).map(|i| Address::new([i; 32])).collect()
    }

    #[test]
    fn same_seed_same_order() {
        let set = witnesses(21);
        let t = Timestamp::from_millis(1_514_764_863_000);
        assert_eq!(shuffle_witnesses(&set, t), shuffle_witnesses(&set, t));
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let set = witnesses(21);
        let mut shuffled = shuffle_witnesses(&set, Timestamp::from_millis(42));
        shuffled.sort();
        assert_eq!(shuffled, set);
    }

    #[test]
    fn different_seeds_reorder() {
        let set = witnesses(21);
        let orders: Vec<_> = (0..8)
            .map(|i| shuffle_witnesses(&set, Timestamp::from_millis(i * 3_000)))
            .collect();
        assert!(orders.windows(2).any(|w| w[0] != w[1]));
    }

    #[test]
    fn tiny_sets_are_untouched() {
        assert!(shuffle_witnesses(&[], Timestamp::EPOCH).is_empty());
        let one = witnesses(1);
        assert_eq!(shuffle_witnesses(&one, Timestamp::EPOCH), one);
    }
}
