use proptest::prelude::*;

use dpos_types::{Address, BlockHash, Timestamp, TxHash};

proptest! {
    /// Ids keep their bytes.
    #[test]
    fn id_bytes_are_preserved(bytes in prop::array::uniform32(0u8..)) {
        let block_hash = BlockHash::new(bytes);
        let tx_hash = TxHash::new(bytes);
        let address = Address::new(bytes);
        prop_assert_eq!(block_hash.as_bytes(), &bytes);
        prop_assert_eq!(tx_hash.as_bytes(), &bytes);
        prop_assert_eq!(address.as_bytes(), &bytes);
    }

    /// Ordering on ids follows byte ordering, which the tally relies on for ties.
    #[test]
    fn address_order_matches_bytes(a in prop::array::uniform32(0u8..), b in prop::array::uniform32(0u8..)) {
        prop_assert_eq!(Address::new(a).cmp(&Address::new(b)), a.cmp(&b));
    }

    /// Timestamp differences are antisymmetric.
    #[test]
    fn millis_until_antisymmetric(a in -1_000_000_000i64..1_000_000_000, b in -1_000_000_000i64..1_000_000_000) {
        let ta = Timestamp::from_millis(a);
        let tb = Timestamp::from_millis(b);
        prop_assert_eq!(ta.millis_until(tb), -tb.millis_until(ta));
    }

    /// Ids survive a bincode round trip through the storage encoding.
    #[test]
    fn hash_bincode_stable(bytes in prop::array::uniform32(0u8..)) {
        let id = BlockHash::new(bytes);
        let encoded = bincode::serialize(&id).unwrap();
        let decoded: BlockHash = bincode::deserialize(&encoded).unwrap();
        prop_assert_eq!(decoded, id);
    }
}
