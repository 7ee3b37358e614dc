//! Unordered map (`spec.md` §4.3).

use crate::base::{ChangeLatch, Syncable};
use crate::changeset::{merge_map_originals, track_map_mutation};
use crate::error::{SyncError, SyncResult};
use crate::value::Tracked;
use std::collections::HashMap;
use std::hash::Hash;

#[cfg(feature = "serializing")]
use serde::{Deserialize, Serialize};

/// A changeset produced by [`SyncableMap`]: one prior-value entry per key
/// touched since the last baseline.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serializing", derive(Serialize, Deserialize))]
pub struct MapChangeset<K: Eq + Hash, V> {
    pub values: HashMap<K, Tracked<V>>,
}

impl<K: Eq + Hash, V> MapChangeset<K, V> {
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A mapping from keys to values that records add/remove/replace edits
/// since its last baseline.
#[derive(Clone, Debug)]
pub struct SyncableMap<K: Eq + Hash + Clone, V: Clone + PartialEq> {
    values: HashMap<K, V>,
    original: HashMap<K, Tracked<V>>,
    latch: ChangeLatch,
}

impl<K: Eq + Hash + Clone, V: Clone + PartialEq> Default for SyncableMap<K, V> {
    fn default() -> Self {
        SyncableMap {
            values: HashMap::new(),
            original: HashMap::new(),
            latch: ChangeLatch::default(),
        }
    }
}

impl<K: Eq + Hash + Clone, V: Clone + PartialEq> SyncableMap<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(values: HashMap<K, V>) -> Self {
        SyncableMap {
            values,
            original: HashMap::new(),
            latch: ChangeLatch::default(),
        }
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.values.get(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.values.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.values.keys()
    }

    /// Inserts or replaces the value at `key`, returning the previous value
    /// if any.
    pub fn insert(&mut self, key: K, value: V) -> SyncResult<Option<V>> {
        self.latch.check_mutable()?;
        let baseline = match self.values.get(&key) {
            Some(old) => Tracked::Value(old.clone()),
            None => Tracked::Absent,
        };
        track_map_mutation(&mut self.original, &key, baseline, Some(&value));
        Ok(self.values.insert(key, value))
    }

    /// Removes the value at `key`, returning it if present.
    pub fn remove(&mut self, key: &K) -> SyncResult<Option<V>> {
        self.latch.check_mutable()?;
        let Some(old) = self.values.remove(key) else {
            return Ok(None);
        };
        track_map_mutation(&mut self.original, key, Tracked::Value(old.clone()), None);
        Ok(Some(old))
    }

    pub fn peek_changeset(&self) -> MapChangeset<K, V> {
        MapChangeset {
            values: self.original.clone(),
        }
    }

    pub fn changeset(&mut self) -> MapChangeset<K, V> {
        let cs = self.peek_changeset();
        self.clear_change_tracking();
        cs
    }

    /// Restores the state recorded in `cs`, returning the redo changeset.
    ///
    /// Fails with [`SyncError::HasChanges`] if there is unsaved local
    /// tracking, and with [`SyncError::MismatchedChangeset`] if `cs` expects
    /// a key to currently be present (or absent) in a way the current state
    /// contradicts.
    pub fn undo(&mut self, cs: &MapChangeset<K, V>) -> SyncResult<MapChangeset<K, V>> {
        if self.has_changes() {
            return Err(SyncError::HasChanges);
        }
        let snapshot = self.values.clone();
        match self.try_undo(cs) {
            Ok(redo) => {
                self.clear_change_tracking();
                Ok(redo)
            }
            Err(e) => {
                self.values = snapshot;
                Err(e)
            }
        }
    }

    fn try_undo(&mut self, cs: &MapChangeset<K, V>) -> SyncResult<MapChangeset<K, V>> {
        let mut redo = HashMap::new();
        for (key, prior) in &cs.values {
            match prior {
                Tracked::Untouched => {}
                Tracked::Value(old) => {
                    let current = self.values.remove(key).ok_or_else(|| SyncError::MismatchedChangeset {
                        reason: format!("changeset expected a value at a key that is currently absent"),
                    })?;
                    redo.insert(key.clone(), Tracked::Value(current));
                    self.values.insert(key.clone(), old.clone());
                }
                Tracked::Absent => {
                    if let Some(current) = self.values.remove(key) {
                        redo.insert(key.clone(), Tracked::Value(current));
                    }
                }
                Tracked::NestedRef => {
                    return Err(SyncError::MalformedChangeset {
                        reason: "plain SyncableMap does not support nested values".into(),
                    });
                }
            }
        }
        Ok(MapChangeset { values: redo })
    }

    pub fn rollback(&mut self) {
        let cs = self.peek_changeset();
        let _ = self.try_undo(&cs);
        self.clear_change_tracking();
    }

    /// Fuses an ordered (oldest-first) list of changesets into one with
    /// equivalent effect; the map's own state is left unchanged.
    pub fn merge_changesets(&mut self, list: &[MapChangeset<K, V>]) -> MapChangeset<K, V> {
        let history: Vec<_> = list.iter().map(|cs| cs.values.clone()).collect();
        let fused = merge_map_originals(&history);
        self.original = fused.clone();
        MapChangeset { values: fused }
    }

    /// Three-way reconciliation (`spec.md` §4.3/§4.2): `pending` is the
    /// local edit history since the shared baseline; `remote` is the
    /// incoming cloud state. Local wins per-key conflicts.
    pub fn merge_cloud_version(
        &mut self,
        remote: &SyncableMap<K, V>,
        pending: &[MapChangeset<K, V>],
    ) -> SyncResult<MapChangeset<K, V>> {
        if self.has_changes() {
            return Err(SyncError::HasChanges);
        }
        let pending_fused = self.merge_changesets(pending);
        let local = self.values.clone();

        let mut baseline = local.clone();
        for (key, prior) in &pending_fused.values {
            match prior {
                Tracked::Value(old) => {
                    baseline.insert(key.clone(), old.clone());
                }
                Tracked::Absent => {
                    baseline.remove(key);
                }
                Tracked::Untouched | Tracked::NestedRef => {}
            }
        }

        let mut merged = baseline.clone();
        let mut keys: std::collections::HashSet<K> = baseline.keys().cloned().collect();
        keys.extend(local.keys().cloned());
        keys.extend(remote.values.keys().cloned());

        for key in &keys {
            let in_baseline = baseline.get(key);
            let in_local = local.get(key);
            let in_remote = remote.values.get(key);
            let locally_modified = in_local != in_baseline;
            let remotely_modified = in_remote != in_baseline;
            let resolved = match (locally_modified, remotely_modified) {
                (true, false) => in_local.cloned(),
                (false, true) => in_remote.cloned(),
                (true, true) => {
                    tracing::trace!("map cloud merge conflict resolved locally");
                    in_local.cloned()
                }
                (false, false) => in_baseline.cloned(),
            };
            match resolved {
                Some(v) => {
                    merged.insert(key.clone(), v);
                }
                None => {
                    merged.remove(key);
                }
            }
        }

        self.values = merged;
        self.original = local
            .iter()
            .filter_map(|(k, v)| {
                let new = self.values.get(k);
                if new != Some(v) {
                    Some((k.clone(), Tracked::Value(v.clone())))
                } else {
                    None
                }
            })
            .chain(self.values.keys().filter(|k| !local.contains_key(*k)).map(|k| (k.clone(), Tracked::Absent)))
            .collect();
        let redo = MapChangeset { values: self.original.clone() };
        Ok(redo)
    }
}

impl<K: Eq + Hash + Clone, V: Clone + PartialEq> Syncable for SyncableMap<K, V> {
    fn is_immutable(&self) -> bool {
        self.latch.is_immutable()
    }

    fn make_immutable(&mut self) {
        self.latch.make_immutable();
    }

    fn has_changes(&self) -> bool {
        !self.original.is_empty()
    }

    fn clear_change_tracking(&mut self) {
        self.original.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map_of(pairs: &[(&str, i32)]) -> SyncableMap<String, i32> {
        SyncableMap::from_map(pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect())
    }

    #[test]
    fn baseline_has_no_changes() {
        let m = map_of(&[("x", 1)]);
        assert!(!m.has_changes());
        assert!(m.peek_changeset().is_empty());
    }

    #[test]
    fn s2_delete_and_add() {
        // spec.md S2: {x:1, y:2}; delete x; set z=3.
        let mut m = map_of(&[("x", 1), ("y", 2)]);
        m.remove(&"x".to_string()).unwrap();
        m.insert("z".to_string(), 3).unwrap();
        let cs = m.peek_changeset();
        assert_eq!(cs.values.get("x"), Some(&Tracked::Value(1)));
        assert_eq!(cs.values.get("z"), Some(&Tracked::Absent));
        assert_eq!(cs.values.len(), 2);

        let mut m2 = m.clone();
        let redo = m2.undo(&cs).unwrap();
        assert_eq!(m2.get(&"x".to_string()), Some(&1));
        assert_eq!(m2.get(&"y".to_string()), Some(&2));
        assert_eq!(m2.get(&"z".to_string()), None);
        assert!(!m2.has_changes());

        m2.merge_changesets(&[redo]);
        m2.clear_change_tracking();
        m2.remove(&"x".to_string()).unwrap();
        m2.insert("z".to_string(), 3).unwrap();
        assert_eq!(m2.get(&"x".to_string()), None);
        assert_eq!(m2.get(&"z".to_string()), Some(&3));
    }

    #[test]
    fn zero_net_change_elides() {
        let mut m = map_of(&[("x", 1)]);
        m.insert("x".to_string(), 2).unwrap();
        m.insert("x".to_string(), 1).unwrap();
        assert!(!m.has_changes());
        assert!(m.peek_changeset().is_empty());
    }

    #[test]
    fn immutable_rejects_mutation() {
        let mut m = map_of(&[("x", 1)]);
        m.make_immutable();
        assert_eq!(m.insert("y".to_string(), 1), Err(SyncError::Immutable));
    }

    #[test]
    fn s6_cloud_merge_disjoint_edits() {
        // spec.md S6: baseline {x=1,y=1}; local edits x=2; remote sets y=3.
        let mut local = map_of(&[("x", 1), ("y", 1)]);
        local.insert("x".to_string(), 2).unwrap();
        let pending = vec![local.changeset()];

        let remote = map_of(&[("x", 1), ("y", 3)]);
        local.merge_cloud_version(&remote, &pending).unwrap();
        assert_eq!(local.get(&"x".to_string()), Some(&2));
        assert_eq!(local.get(&"y".to_string()), Some(&3));
    }

    #[test]
    fn s7_cloud_merge_conflict_local_wins() {
        // spec.md S7: baseline {x=1}; local x=2, remote x=3 -> local wins.
        let mut local = map_of(&[("x", 1), ("y", 1)]);
        local.insert("x".to_string(), 2).unwrap();
        let pending = vec![local.changeset()];

        let mut remote = map_of(&[("x", 1), ("y", 1)]);
        remote.insert("x".to_string(), 3).unwrap();

        let redo = local.merge_cloud_version(&remote, &pending).unwrap();
        assert_eq!(local.get(&"x".to_string()), Some(&2));
        assert!(!redo.is_empty());
    }

    #[test]
    fn merge_associativity() {
        let mut a = map_of(&[("x", 1), ("y", 1)]);
        a.insert("x".to_string(), 2).unwrap();
        let c1 = a.changeset();
        a.insert("y".to_string(), 5).unwrap();
        let c2 = a.changeset();
        a.insert("x".to_string(), 9).unwrap();
        let c3 = a.changeset();

        let mut left = map_of(&[("x", 1), ("y", 1)]);
        left.merge_changesets(&[c1.clone(), c2.clone(), c3.clone()]);
        let left_fused = left.peek_changeset();

        let mut right_step = map_of(&[("x", 1), ("y", 1)]);
        right_step.merge_changesets(&[c1, c2]);
        let c12 = right_step.peek_changeset();
        let mut right = map_of(&[("x", 1), ("y", 1)]);
        right.merge_changesets(&[c12, c3]);
        let right_fused = right.peek_changeset();

        assert_eq!(left_fused.values.get("x"), right_fused.values.get("x"));
        assert_eq!(left_fused.values.get("y"), right_fused.values.get("y"));
    }
}
