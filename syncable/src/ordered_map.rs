//! Ordered map (`spec.md` §4.5): a [`crate::map::SyncableMap`]-like value
//! store plus a tracked key order.

use crate::base::{ChangeLatch, Syncable};
use crate::changeset::{merge_map_originals, track_map_mutation};
use crate::error::{SyncError, SyncResult};
use crate::estimator::estimate_moves;
use crate::value::Tracked;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

#[cfg(feature = "serializing")]
use serde::{Deserialize, Serialize};

/// A changeset produced by [`SyncableOrderedMap`]: per-key value edits plus,
/// if the order itself changed, the order as it stood at baseline.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serializing", derive(Serialize, Deserialize))]
pub struct OrderedMapChangeset<K: Eq + Hash, V> {
    pub values: HashMap<K, Tracked<V>>,
    pub original_order: Option<Vec<K>>,
}

impl<K: Eq + Hash, V> OrderedMapChangeset<K, V> {
    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.original_order.is_none()
    }
}

/// A key/value mapping that also tracks the order of its keys, recording
/// both value edits and reorderings since its last baseline.
#[derive(Clone, Debug)]
pub struct SyncableOrderedMap<K: Eq + Hash + Clone, V: Clone + PartialEq> {
    values: HashMap<K, V>,
    order: Vec<K>,
    original_values: HashMap<K, Tracked<V>>,
    original_order: Option<Vec<K>>,
    latch: ChangeLatch,
}

impl<K: Eq + Hash + Clone, V: Clone + PartialEq> Default for SyncableOrderedMap<K, V> {
    fn default() -> Self {
        SyncableOrderedMap {
            values: HashMap::new(),
            order: Vec::new(),
            original_values: HashMap::new(),
            original_order: None,
            latch: ChangeLatch::default(),
        }
    }
}

impl<K: Eq + Hash + Clone, V: Clone + PartialEq> SyncableOrderedMap<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (K, V)>) -> Self {
        let mut values = HashMap::new();
        let mut order = Vec::new();
        for (k, v) in pairs {
            if !values.contains_key(&k) {
                order.push(k.clone());
            }
            values.insert(k, v);
        }
        SyncableOrderedMap {
            values,
            order,
            ..Self::default()
        }
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.values.get(key)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.order.iter()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.order.iter().map(move |k| (k, &self.values[k]))
    }

    fn capture_order(&mut self) {
        if self.original_order.is_none() {
            self.original_order = Some(self.order.clone());
        }
    }

    /// Inserts or replaces the value at `key`. Newly inserted keys are
    /// appended to the end of the order.
    pub fn insert(&mut self, key: K, value: V) -> SyncResult<Option<V>> {
        self.latch.check_mutable()?;
        let baseline = match self.values.get(&key) {
            Some(old) => Tracked::Value(old.clone()),
            None => {
                self.capture_order();
                self.order.push(key.clone());
                Tracked::Absent
            }
        };
        track_map_mutation(&mut self.original_values, &key, baseline, Some(&value));
        Ok(self.values.insert(key, value))
    }

    pub fn remove(&mut self, key: &K) -> SyncResult<Option<V>> {
        self.latch.check_mutable()?;
        let Some(old) = self.values.remove(key) else {
            return Ok(None);
        };
        self.capture_order();
        self.order.retain(|k| k != key);
        track_map_mutation(&mut self.original_values, key, Tracked::Value(old.clone()), None);
        Ok(Some(old))
    }

    /// Moves `key` to `new_index`, clamped to the current length. A no-op
    /// (including for tracking purposes) if `key` is already at `new_index`.
    pub fn move_to_index(&mut self, key: &K, new_index: usize) -> SyncResult<()> {
        self.latch.check_mutable()?;
        let Some(pos) = self.order.iter().position(|k| k == key) else {
            return Ok(());
        };
        let target = new_index.min(self.order.len() - 1);
        if pos == target {
            return Ok(());
        }
        self.capture_order();
        let k = self.order.remove(pos);
        self.order.insert(target, k);
        Ok(())
    }

    pub fn peek_changeset(&self) -> OrderedMapChangeset<K, V> {
        OrderedMapChangeset {
            values: self.original_values.clone(),
            original_order: self.original_order.clone(),
        }
    }

    pub fn changeset(&mut self) -> OrderedMapChangeset<K, V> {
        let cs = self.peek_changeset();
        self.clear_change_tracking();
        cs
    }

    /// The moves that would carry the baseline order to the current order,
    /// per the `spec.md` §4.7 estimator. Exposed for introspection/testing;
    /// not part of the changeset encoding itself.
    pub fn pending_moves(&self) -> Vec<K> {
        match &self.original_order {
            Some(baseline) => {
                let touched: HashSet<K> = self.original_values.keys().cloned().collect();
                estimate_moves(baseline, &self.order, &touched)
            }
            None => Vec::new(),
        }
    }

    pub fn undo(&mut self, cs: &OrderedMapChangeset<K, V>) -> SyncResult<OrderedMapChangeset<K, V>> {
        if self.has_changes() {
            return Err(SyncError::HasChanges);
        }
        let values_snapshot = self.values.clone();
        let order_snapshot = self.order.clone();
        match self.try_undo(cs) {
            Ok(redo) => {
                self.clear_change_tracking();
                Ok(redo)
            }
            Err(e) => {
                self.values = values_snapshot;
                self.order = order_snapshot;
                Err(e)
            }
        }
    }

    fn try_undo(&mut self, cs: &OrderedMapChangeset<K, V>) -> SyncResult<OrderedMapChangeset<K, V>> {
        let mut redo_values = HashMap::new();
        for (key, prior) in &cs.values {
            match prior {
                Tracked::Untouched => {}
                Tracked::Value(old) => {
                    let current = self.values.remove(key).ok_or_else(|| SyncError::MismatchedChangeset {
                        reason: "changeset expected a value at a key that is currently absent".into(),
                    })?;
                    redo_values.insert(key.clone(), Tracked::Value(current));
                    self.values.insert(key.clone(), old.clone());
                }
                Tracked::Absent => {
                    if let Some(current) = self.values.remove(key) {
                        redo_values.insert(key.clone(), Tracked::Value(current));
                    }
                    self.order.retain(|k| k != key);
                }
                Tracked::NestedRef => {
                    return Err(SyncError::MalformedChangeset {
                        reason: "plain SyncableOrderedMap does not support nested values".into(),
                    });
                }
            }
        }
        // keys that came back from Absent must regain an order slot if they
        // aren't already present in the restored order.
        for key in cs.values.keys() {
            if self.values.contains_key(key) && !self.order.contains(key) {
                self.order.push(key.clone());
            }
        }
        let redo_order = cs.original_order.as_ref().map(|order| {
            let redo = self.order.clone();
            self.order = order.clone();
            redo
        });
        Ok(OrderedMapChangeset {
            values: redo_values,
            original_order: redo_order,
        })
    }

    pub fn rollback(&mut self) {
        let cs = self.peek_changeset();
        let _ = self.try_undo(&cs);
        self.clear_change_tracking();
    }

    pub fn merge_changesets(&mut self, list: &[OrderedMapChangeset<K, V>]) -> OrderedMapChangeset<K, V> {
        let history: Vec<_> = list.iter().map(|cs| cs.values.clone()).collect();
        let fused_values = merge_map_originals(&history);
        let fused_order = list
            .iter()
            .find_map(|cs| cs.original_order.clone())
            .filter(|order| order != &self.order);
        self.original_values = fused_values.clone();
        self.original_order = fused_order.clone();
        OrderedMapChangeset {
            values: fused_values,
            original_order: fused_order,
        }
    }

    /// Three-way reconciliation. Values merge like [`crate::map::SyncableMap`]
    /// (local wins conflicts). Order is reconciled per `spec.md` §4.5: the
    /// move list implied by the local log (baseline order to current local
    /// order) is computed via the §4.7 estimator and replayed onto the
    /// remote order, restricted to the keys that survive the value merge.
    pub fn merge_cloud_version(
        &mut self,
        remote: &SyncableOrderedMap<K, V>,
        pending: &[OrderedMapChangeset<K, V>],
    ) -> SyncResult<OrderedMapChangeset<K, V>> {
        if self.has_changes() {
            return Err(SyncError::HasChanges);
        }
        let pending_fused = self.merge_changesets(pending);
        let local_values = self.values.clone();
        let local_order = self.order.clone();

        let mut baseline_values = local_values.clone();
        for (key, prior) in &pending_fused.values {
            match prior {
                Tracked::Value(old) => {
                    baseline_values.insert(key.clone(), old.clone());
                }
                Tracked::Absent => {
                    baseline_values.remove(key);
                }
                Tracked::Untouched | Tracked::NestedRef => {}
            }
        }

        let mut merged_values = baseline_values.clone();
        let mut all_keys: HashSet<K> = baseline_values.keys().cloned().collect();
        all_keys.extend(local_values.keys().cloned());
        all_keys.extend(remote.values.keys().cloned());

        for key in &all_keys {
            let in_baseline = baseline_values.get(key);
            let in_local = local_values.get(key);
            let in_remote = remote.values.get(key);
            let locally_modified = in_local != in_baseline;
            let remotely_modified = in_remote != in_baseline;
            let resolved = match (locally_modified, remotely_modified) {
                (true, false) => in_local.cloned(),
                (false, true) => in_remote.cloned(),
                (true, true) => {
                    tracing::trace!("ordered map cloud merge conflict resolved locally");
                    in_local.cloned()
                }
                (false, false) => in_baseline.cloned(),
            };
            match resolved {
                Some(v) => {
                    merged_values.insert(key.clone(), v);
                }
                None => {
                    merged_values.remove(key);
                }
            }
        }

        // `spec.md` §4.5: compute the move list the local log implies (from
        // `originalOrder` to the current local order), then apply that move
        // list to the remote order, restricted to keys that survive the
        // value merge above.
        let touched: HashSet<K> = pending_fused.values.keys().cloned().collect();
        let moves = match &pending_fused.original_order {
            Some(baseline_order) => estimate_moves(baseline_order, &local_order, &touched),
            None => Vec::new(),
        };

        let mut merged_order: Vec<K> = remote
            .order
            .iter()
            .filter(|k| merged_values.contains_key(k))
            .cloned()
            .collect();
        for key in &local_order {
            if merged_values.contains_key(key) && !merged_order.contains(key) {
                merged_order.push(key.clone());
            }
        }
        for key in &moves {
            if let Some(target) = local_order.iter().position(|k| k == key) {
                if let Some(pos) = merged_order.iter().position(|k| k == key) {
                    let clamped = target.min(merged_order.len() - 1);
                    let moved = merged_order.remove(pos);
                    merged_order.insert(clamped, moved);
                }
            }
        }
        for key in merged_values.keys() {
            if !merged_order.contains(key) {
                merged_order.push(key.clone());
            }
        }

        self.values = merged_values;
        self.order = merged_order;

        self.original_values = local_values
            .iter()
            .filter_map(|(k, v)| {
                let new = self.values.get(k);
                if new != Some(v) {
                    Some((k.clone(), Tracked::Value(v.clone())))
                } else {
                    None
                }
            })
            .chain(
                self.values
                    .keys()
                    .filter(|k| !local_values.contains_key(*k))
                    .map(|k| (k.clone(), Tracked::Absent)),
            )
            .collect();
        self.original_order = if self.order != local_order { Some(local_order) } else { None };

        let redo = OrderedMapChangeset {
            values: self.original_values.clone(),
            original_order: self.original_order.clone(),
        };
        Ok(redo)
    }
}

impl<K: Eq + Hash + Clone, V: Clone + PartialEq> Syncable for SyncableOrderedMap<K, V> {
    fn is_immutable(&self) -> bool {
        self.latch.is_immutable()
    }

    fn make_immutable(&mut self) {
        self.latch.make_immutable();
    }

    fn has_changes(&self) -> bool {
        !self.original_values.is_empty() || self.original_order.is_some()
    }

    fn clear_change_tracking(&mut self) {
        self.original_values.clear();
        self.original_order = None;
    }
}
