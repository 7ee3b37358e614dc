//! The changeset algebra (`spec.md` §4.8): the handful of free functions
//! that every container (record fields, map/ordered-map values, set/ordered-
//! set/array membership) builds its `changeset`/`undo`/`merge_changesets`
//! on top of.
//!
//! Factoring this out once, instead of letting every container kind
//! reimplement it, is the one generalization this crate makes over the
//! original header-only design (each of `ZDCRecord`, `ZDCDictionary`,
//! `ZDCSet`, `ZDCOrderedDictionary`, `ZDCArray`/`ZDCOrderedSet` restates the
//! same tracking-update rule in Objective-C).

use crate::error::{SyncError, SyncResult};
use crate::value::Tracked;
use std::collections::HashMap;
use std::collections::HashSet;
use std::hash::Hash;

/// The universal tracking-update rule (`spec.md` §3) applied to a single
/// scalar field on a record: captures `current` as the baseline the first
/// time the field is touched, and returns the "redo" value (what the field
/// held immediately before this call) for the caller to stash.
///
/// Does nothing (leaves `prior` untouched) if the field was already touched
/// earlier in this tracking window, per the rule's "if already present, do
/// nothing" clause.
pub fn touch_scalar_field<V: Clone>(prior: &mut Tracked<V>, current: &V) {
    if prior.is_untouched() {
        *prior = Tracked::Value(current.clone());
    }
}

/// Restores a scalar record field to the value recorded in `prior`,
/// returning the redo entry (the field's value just before the restore).
///
/// `prior` must be `Untouched` or `Value`; a scalar field changeset entry
/// of `Absent`/`NestedRef` can only arise from a hand-built or corrupted
/// changeset (struct fields, unlike map keys, always exist), and is
/// rejected as malformed.
pub fn restore_scalar_field<V: Clone>(current: &mut V, prior: &Tracked<V>) -> SyncResult<Tracked<V>> {
    match prior {
        Tracked::Untouched => Ok(Tracked::Untouched),
        Tracked::Value(old) => {
            let redo = Tracked::Value(std::mem::replace(current, old.clone()));
            Ok(redo)
        }
        Tracked::Absent | Tracked::NestedRef => Err(SyncError::MalformedChangeset {
            reason: "scalar field changeset entry cannot be Absent or NestedRef".into(),
        }),
    }
}

/// Fuses an ordered (oldest-first) list of per-field priors into one,
/// keeping the earliest recorded prior.
///
/// Deliberately does *not* elide the result against a current value: a
/// fused changeset may itself be folded into a later merge (`spec.md`
/// §4.8 requires merge to be associative), and a `Value` entry eclipsed
/// here because it happened to match *this* call's current would be lost
/// information that a later fusion step can no longer recover. Net-zero
/// elision only ever happens once, at the point a single mutation is
/// first captured (see [`touch_scalar_field`]) — merging never discards
/// an already-captured prior.
pub fn merge_scalar_field<V: Clone>(history: impl IntoIterator<Item = Tracked<V>>) -> Tracked<V> {
    history
        .into_iter()
        .find(|t| !t.is_untouched())
        .unwrap_or(Tracked::Untouched)
}

/// The tracking-update rule for a map/record key whose prior state is
/// `Absent` (key didn't exist) rather than just "some other value": captures
/// on first touch, then elides the entry if the net effect against
/// `new_current` is zero.
pub fn track_map_mutation<K, V>(
    original: &mut HashMap<K, Tracked<V>>,
    key: &K,
    baseline_if_untouched: Tracked<V>,
    new_current: Option<&V>,
) where
    K: Eq + Hash + Clone,
    V: Clone + PartialEq,
{
    if !original.contains_key(key) {
        original.insert(key.clone(), baseline_if_untouched);
    }
    let net_zero = match (original.get(key), new_current) {
        (Some(Tracked::Absent), None) => true,
        (Some(Tracked::Value(old)), Some(new)) => old == new,
        _ => false,
    };
    if net_zero {
        original.remove(key);
    }
}

/// Fuses an ordered list of per-key original-value maps into one, keeping
/// for each key the *earliest* recorded prior across the list.
///
/// Like [`merge_scalar_field`], this never elides against a current value:
/// doing so against whichever container happens to be performing *this*
/// fusion would make the result depend on which intermediate grouping the
/// caller chose, breaking associativity (`spec.md` §4.8, §8 property 5).
/// A caller that wants a net-zero-free changeset back should filter the
/// result against its own genuinely-current values after the fact; the
/// container's per-mutation tracking (`track_map_mutation`) already does
/// that filtering at the point it's actually sound to do it.
pub fn merge_map_originals<K, V>(history: &[HashMap<K, Tracked<V>>]) -> HashMap<K, Tracked<V>>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    let mut fused: HashMap<K, Tracked<V>> = HashMap::new();
    for original in history {
        for (key, prior) in original {
            fused.entry(key.clone()).or_insert_with(|| prior.clone());
        }
    }
    fused
}

/// The `spec.md` §4.4 add/remove tracking rule for unordered-set-like
/// membership: adding a member that's in `removed` cancels it there instead
/// of moving to `added`, and vice versa.
pub fn track_membership_add<V: Eq + Hash + Clone>(added: &mut HashSet<V>, removed: &mut HashSet<V>, member: V) {
    if !removed.remove(&member) {
        added.insert(member);
    }
}

pub fn track_membership_remove<V: Eq + Hash + Clone>(added: &mut HashSet<V>, removed: &mut HashSet<V>, member: V) {
    if !added.remove(&member) {
        removed.insert(member);
    }
}

/// Fuses an ordered list of `(added, removed)` pairs by replaying each
/// pair's events through [`track_membership_add`]/[`track_membership_remove`]
/// in order — this reproduces exactly the same disjoint-sets invariant a
/// live sequence of single mutations would, which is what makes merge
/// associative (`spec.md` §4.8).
pub fn merge_membership<V: Eq + Hash + Clone>(
    history: impl IntoIterator<Item = (HashSet<V>, HashSet<V>)>,
) -> (HashSet<V>, HashSet<V>) {
    let mut added = HashSet::new();
    let mut removed = HashSet::new();
    for (added_i, removed_i) in history {
        for m in added_i {
            track_membership_add(&mut added, &mut removed, m);
        }
        for m in removed_i {
            track_membership_remove(&mut added, &mut removed, m);
        }
    }
    (added, removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_touch_only_captures_first_write() {
        let mut prior: Tracked<i32> = Tracked::Untouched;
        touch_scalar_field(&mut prior, &1);
        assert_eq!(prior, Tracked::Value(1));
        touch_scalar_field(&mut prior, &2);
        // second touch must not overwrite the captured baseline
        assert_eq!(prior, Tracked::Value(1));
    }

    #[test]
    fn scalar_merge_skips_untouched_entries() {
        let fused = merge_scalar_field(vec![Tracked::Untouched, Tracked::Value(5)]);
        assert_eq!(fused, Tracked::Value(5));
    }

    #[test]
    fn scalar_merge_keeps_earliest_prior() {
        let fused = merge_scalar_field(vec![Tracked::Value(1), Tracked::Value(2)]);
        assert_eq!(fused, Tracked::Value(1));
    }

    #[test]
    fn scalar_merge_is_associative() {
        let direct = merge_scalar_field(vec![Tracked::Value(1), Tracked::Untouched, Tracked::Value(2)]);
        let staged = merge_scalar_field(vec![
            merge_scalar_field(vec![Tracked::Value(1), Tracked::Untouched]),
            Tracked::Value(2),
        ]);
        assert_eq!(direct, staged);
    }

    #[test]
    fn map_mutation_elides_add_then_remove() {
        let mut original: HashMap<&str, Tracked<i32>> = HashMap::new();
        // simulate: key "x" added (didn't exist before), then removed again
        track_map_mutation(&mut original, &"x", Tracked::Absent, Some(&1));
        assert_eq!(original.get("x"), Some(&Tracked::Absent));
        track_map_mutation(&mut original, &"x", Tracked::Absent, None);
        assert!(!original.contains_key("x"));
    }

    #[test]
    fn membership_add_then_remove_cancels() {
        let mut added = HashSet::new();
        let mut removed = HashSet::new();
        track_membership_remove(&mut added, &mut removed, "b");
        track_membership_add(&mut added, &mut removed, "c");
        track_membership_add(&mut added, &mut removed, "b");
        assert_eq!(added, HashSet::from(["c"]));
        assert!(removed.is_empty());
    }
}
