use proptest::prelude::*;
use std::collections::HashMap;
use syncable::SyncableMap;

fn small_map() -> impl Strategy<Value = HashMap<u8, i32>> {
    prop::collection::hash_map(0u8..6, -10i32..10, 0..6)
}

proptest! {
    #[test]
    fn undo_redo_round_trips(base in small_map(), edits in prop::collection::vec((0u8..6, -10i32..10), 0..6)) {
        let mut m = SyncableMap::from_map(base.clone());
        for (k, v) in &edits {
            m.insert(*k, *v).unwrap();
        }
        let cs = m.changeset();
        let before_undo: HashMap<_, _> = m.iter().map(|(k, v)| (*k, *v)).collect();
        let redo = m.undo(&cs).unwrap();
        prop_assert_eq!(&base, &m.iter().map(|(k, v)| (*k, *v)).collect());
        m.undo(&redo).unwrap();
        prop_assert_eq!(&before_undo, &m.iter().map(|(k, v)| (*k, *v)).collect());
    }

    #[test]
    fn merge_is_associative(
        base in small_map(),
        e1 in prop::collection::vec((0u8..6, -10i32..10), 0..4),
        e2 in prop::collection::vec((0u8..6, -10i32..10), 0..4),
        e3 in prop::collection::vec((0u8..6, -10i32..10), 0..4),
    ) {
        let mut m = SyncableMap::from_map(base.clone());
        for (k, v) in &e1 { m.insert(*k, *v).unwrap(); }
        let c1 = m.changeset();
        for (k, v) in &e2 { m.insert(*k, *v).unwrap(); }
        let c2 = m.changeset();
        for (k, v) in &e3 { m.insert(*k, *v).unwrap(); }
        let c3 = m.changeset();

        let mut left = SyncableMap::from_map(base.clone());
        let left_fused = left.merge_changesets(&[c1.clone(), c2.clone(), c3.clone()]);

        let mut step = SyncableMap::from_map(base.clone());
        let c12 = step.merge_changesets(&[c1, c2]);
        let mut right = SyncableMap::from_map(base);
        let right_fused = right.merge_changesets(&[c12, c3]);

        prop_assert_eq!(left_fused.values, right_fused.values);
    }
}
