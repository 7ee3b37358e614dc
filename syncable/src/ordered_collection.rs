//! Ordered set and array (`spec.md` §4.6): two sequence containers sharing
//! the same append/remove/move shape as [`crate::ordered_map`], but without
//! a value payload per slot.
//!
//! [`SyncableOrderedSet`] forbids duplicates, so membership is tracked the
//! same way [`crate::set::SyncableSet`] does (add/remove sets that cancel
//! each other out) plus a tracked order. [`SyncableArray`] allows
//! duplicates, which makes per-element identity ambiguous during a
//! cloud-merge reconciliation; rather than inventing a synthetic per-slot
//! identity the original header-only design doesn't specify, this crate
//! captures the *whole* baseline sequence the first time an array is
//! touched and restores/merges against that snapshot wholesale — the
//! baseline index is the only identity an array element has.

use crate::base::{ChangeLatch, Syncable};
use crate::changeset::{merge_membership, track_membership_add, track_membership_remove};
use crate::error::{SyncError, SyncResult};
use crate::estimator::estimate_moves;
use std::collections::HashSet;
use std::hash::Hash;

#[cfg(feature = "serializing")]
use serde::{Deserialize, Serialize};

/// A changeset produced by [`SyncableOrderedSet`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serializing", derive(Serialize, Deserialize))]
pub struct OrderedSetChangeset<V: Eq + Hash> {
    pub added: HashSet<V>,
    pub removed: HashSet<V>,
    pub original_order: Option<Vec<V>>,
}

impl<V: Eq + Hash> OrderedSetChangeset<V> {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.original_order.is_none()
    }
}

/// A set with a tracked insertion order and no duplicate members.
#[derive(Clone, Debug)]
pub struct SyncableOrderedSet<V: Eq + Hash + Clone> {
    order: Vec<V>,
    members: HashSet<V>,
    added: HashSet<V>,
    removed: HashSet<V>,
    original_order: Option<Vec<V>>,
    latch: ChangeLatch,
}

impl<V: Eq + Hash + Clone> Default for SyncableOrderedSet<V> {
    fn default() -> Self {
        SyncableOrderedSet {
            order: Vec::new(),
            members: HashSet::new(),
            added: HashSet::new(),
            removed: HashSet::new(),
            original_order: None,
            latch: ChangeLatch::default(),
        }
    }
}

impl<V: Eq + Hash + Clone> SyncableOrderedSet<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_order(order: Vec<V>) -> Self {
        let members = order.iter().cloned().collect();
        SyncableOrderedSet {
            order,
            members,
            ..Self::default()
        }
    }

    pub fn contains(&self, member: &V) -> bool {
        self.members.contains(member)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &V> {
        self.order.iter()
    }

    fn capture_order(&mut self) {
        if self.original_order.is_none() {
            self.original_order = Some(self.order.clone());
        }
    }

    /// Appends `member` if not already present. Returns `true` if inserted.
    pub fn insert(&mut self, member: V) -> SyncResult<bool> {
        self.latch.check_mutable()?;
        if self.members.contains(&member) {
            return Ok(false);
        }
        self.capture_order();
        self.order.push(member.clone());
        self.members.insert(member.clone());
        track_membership_add(&mut self.added, &mut self.removed, member);
        Ok(true)
    }

    pub fn remove(&mut self, member: &V) -> SyncResult<bool> {
        self.latch.check_mutable()?;
        if !self.members.remove(member) {
            return Ok(false);
        }
        self.capture_order();
        self.order.retain(|m| m != member);
        track_membership_remove(&mut self.added, &mut self.removed, member.clone());
        Ok(true)
    }

    pub fn move_to_index(&mut self, member: &V, new_index: usize) -> SyncResult<()> {
        self.latch.check_mutable()?;
        let Some(pos) = self.order.iter().position(|m| m == member) else {
            return Ok(());
        };
        let target = new_index.min(self.order.len() - 1);
        if pos == target {
            return Ok(());
        }
        self.capture_order();
        let m = self.order.remove(pos);
        self.order.insert(target, m);
        Ok(())
    }

    pub fn peek_changeset(&self) -> OrderedSetChangeset<V> {
        OrderedSetChangeset {
            added: self.added.clone(),
            removed: self.removed.clone(),
            original_order: self.original_order.clone(),
        }
    }

    pub fn changeset(&mut self) -> OrderedSetChangeset<V> {
        let cs = self.peek_changeset();
        self.clear_change_tracking();
        cs
    }

    pub fn pending_moves(&self) -> Vec<V> {
        match &self.original_order {
            Some(baseline) => estimate_moves(baseline, &self.order, &self.added),
            None => Vec::new(),
        }
    }

    pub fn undo(&mut self, cs: &OrderedSetChangeset<V>) -> SyncResult<OrderedSetChangeset<V>> {
        if self.has_changes() {
            return Err(SyncError::HasChanges);
        }
        let members_snapshot = self.members.clone();
        let order_snapshot = self.order.clone();
        match self.try_undo(cs) {
            Ok(redo) => {
                self.clear_change_tracking();
                Ok(redo)
            }
            Err(e) => {
                self.members = members_snapshot;
                self.order = order_snapshot;
                Err(e)
            }
        }
    }

    fn try_undo(&mut self, cs: &OrderedSetChangeset<V>) -> SyncResult<OrderedSetChangeset<V>> {
        let mut redo_added = HashSet::new();
        let mut redo_removed = HashSet::new();
        for m in &cs.added {
            if !self.members.remove(m) {
                return Err(SyncError::MismatchedChangeset {
                    reason: "changeset recorded an add for a member no longer present".into(),
                });
            }
            self.order.retain(|x| x != m);
            redo_removed.insert(m.clone());
        }
        for m in &cs.removed {
            if !self.members.insert(m.clone()) {
                return Err(SyncError::MismatchedChangeset {
                    reason: "changeset recorded a remove for a member already present".into(),
                });
            }
            self.order.push(m.clone());
            redo_added.insert(m.clone());
        }
        let redo_order = cs.original_order.as_ref().map(|order| {
            let redo = self.order.clone();
            self.order = order.clone();
            redo
        });
        Ok(OrderedSetChangeset {
            added: redo_added,
            removed: redo_removed,
            original_order: redo_order,
        })
    }

    pub fn rollback(&mut self) {
        let cs = self.peek_changeset();
        for m in &cs.added {
            self.members.remove(m);
            self.order.retain(|x| x != m);
        }
        for m in &cs.removed {
            self.members.insert(m.clone());
        }
        if let Some(order) = &cs.original_order {
            self.order = order.clone();
        }
        self.clear_change_tracking();
    }

    pub fn merge_changesets(&mut self, list: &[OrderedSetChangeset<V>]) -> OrderedSetChangeset<V> {
        let history = list.iter().map(|cs| (cs.added.clone(), cs.removed.clone()));
        let (added, removed) = merge_membership(history);
        let order = list
            .iter()
            .find_map(|cs| cs.original_order.clone())
            .filter(|o| o != &self.order);
        self.added = added.clone();
        self.removed = removed.clone();
        self.original_order = order.clone();
        OrderedSetChangeset {
            added,
            removed,
            original_order: order,
        }
    }

    /// Three-way reconciliation, composing the §4.4 set merge-cloud logic
    /// with the §4.5 order-replay logic used by [`crate::ordered_map`].
    pub fn merge_cloud_version(
        &mut self,
        remote: &SyncableOrderedSet<V>,
        pending: &[OrderedSetChangeset<V>],
    ) -> SyncResult<OrderedSetChangeset<V>> {
        if self.has_changes() {
            return Err(SyncError::HasChanges);
        }
        let pending_fused = self.merge_changesets(pending);
        let local_members = self.members.clone();
        let local_order = self.order.clone();

        let mut baseline_members = local_members.clone();
        for m in &pending_fused.added {
            baseline_members.remove(m);
        }
        for m in &pending_fused.removed {
            baseline_members.insert(m.clone());
        }

        let mut merged_members = baseline_members.clone();
        let mut all: HashSet<V> = baseline_members.iter().cloned().collect();
        all.extend(local_members.iter().cloned());
        all.extend(remote.members.iter().cloned());
        for m in &all {
            let in_baseline = baseline_members.contains(m);
            let in_local = local_members.contains(m);
            let in_remote = remote.members.contains(m);
            let locally_modified = in_local != in_baseline;
            let remotely_modified = in_remote != in_baseline;
            let present = match (locally_modified, remotely_modified) {
                (true, false) => in_local,
                (false, true) => in_remote,
                (true, true) => {
                    tracing::trace!("ordered set cloud merge conflict resolved locally");
                    in_local
                }
                (false, false) => in_baseline,
            };
            if present {
                merged_members.insert(m.clone());
            } else {
                merged_members.remove(m);
            }
        }

        let touched: HashSet<V> = pending_fused.added.union(&pending_fused.removed).cloned().collect();
        let moves = match &pending_fused.original_order {
            Some(baseline_order) => estimate_moves(baseline_order, &local_order, &touched),
            None => Vec::new(),
        };
        let mut merged_order: Vec<V> = remote
            .order
            .iter()
            .filter(|m| merged_members.contains(*m))
            .cloned()
            .collect();
        for m in &local_order {
            if merged_members.contains(m) && !merged_order.contains(m) {
                merged_order.push(m.clone());
            }
        }
        for m in &moves {
            if let Some(target) = local_order.iter().position(|x| x == m) {
                if let Some(pos) = merged_order.iter().position(|x| x == m) {
                    let clamped = target.min(merged_order.len() - 1);
                    let moved = merged_order.remove(pos);
                    merged_order.insert(clamped, moved);
                }
            }
        }
        for m in &merged_members {
            if !merged_order.contains(m) {
                merged_order.push(m.clone());
            }
        }

        self.members = merged_members;
        self.order = merged_order;

        let mut added = HashSet::new();
        let mut removed = HashSet::new();
        for m in self.members.difference(&local_members) {
            added.insert(m.clone());
        }
        for m in local_members.difference(&self.members) {
            removed.insert(m.clone());
        }
        self.added = added.clone();
        self.removed = removed.clone();
        self.original_order = if self.order != local_order { Some(local_order.clone()) } else { None };

        Ok(OrderedSetChangeset {
            added,
            removed,
            original_order: self.original_order.clone(),
        })
    }
}

impl<V: Eq + Hash + Clone> Syncable for SyncableOrderedSet<V> {
    fn is_immutable(&self) -> bool {
        self.latch.is_immutable()
    }

    fn make_immutable(&mut self) {
        self.latch.make_immutable();
    }

    fn has_changes(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty() || self.original_order.is_some()
    }

    fn clear_change_tracking(&mut self) {
        self.added.clear();
        self.removed.clear();
        self.original_order = None;
    }
}

/// An ordered sequence that allows duplicate elements.
///
/// Because elements aren't unique, a touched array captures its *entire*
/// baseline sequence the first time it's mutated rather than tracking
/// per-element add/remove/move deltas — see the module doc comment.
#[derive(Clone, Debug)]
pub struct SyncableArray<V: Clone + PartialEq> {
    items: Vec<V>,
    original: Option<Vec<V>>,
    latch: ChangeLatch,
}

/// A changeset produced by [`SyncableArray`]: the array's full contents at
/// baseline, if it was touched at all since.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serializing", derive(Serialize, Deserialize))]
pub struct ArrayChangeset<V> {
    pub original: Option<Vec<V>>,
}

impl<V> ArrayChangeset<V> {
    pub fn is_empty(&self) -> bool {
        self.original.is_none()
    }
}

impl<V: Clone + PartialEq> Default for SyncableArray<V> {
    fn default() -> Self {
        SyncableArray {
            items: Vec::new(),
            original: None,
            latch: ChangeLatch::default(),
        }
    }
}

impl<V: Clone + PartialEq> SyncableArray<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_vec(items: Vec<V>) -> Self {
        SyncableArray {
            items,
            ..Self::default()
        }
    }

    pub fn as_slice(&self) -> &[V] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn capture(&mut self) {
        if self.original.is_none() {
            self.original = Some(self.items.clone());
        }
    }

    pub fn push(&mut self, item: V) -> SyncResult<()> {
        self.latch.check_mutable()?;
        self.capture();
        self.items.push(item);
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> SyncResult<V> {
        self.latch.check_mutable()?;
        self.capture();
        Ok(self.items.remove(index))
    }

    pub fn insert(&mut self, index: usize, item: V) -> SyncResult<()> {
        self.latch.check_mutable()?;
        self.capture();
        self.items.insert(index, item);
        Ok(())
    }

    pub fn move_item(&mut self, from: usize, to: usize) -> SyncResult<()> {
        self.latch.check_mutable()?;
        if from == to {
            return Ok(());
        }
        self.capture();
        let item = self.items.remove(from);
        let target = to.min(self.items.len());
        self.items.insert(target, item);
        Ok(())
    }

    pub fn set(&mut self, index: usize, item: V) -> SyncResult<V> {
        self.latch.check_mutable()?;
        self.capture();
        Ok(std::mem::replace(&mut self.items[index], item))
    }

    pub fn peek_changeset(&self) -> ArrayChangeset<V> {
        ArrayChangeset {
            original: self.original.clone(),
        }
    }

    pub fn changeset(&mut self) -> ArrayChangeset<V> {
        let cs = self.peek_changeset();
        self.clear_change_tracking();
        cs
    }

    pub fn undo(&mut self, cs: &ArrayChangeset<V>) -> SyncResult<ArrayChangeset<V>> {
        if self.has_changes() {
            return Err(SyncError::HasChanges);
        }
        let Some(baseline) = &cs.original else {
            return Ok(ArrayChangeset { original: None });
        };
        let redo = self.items.clone();
        self.items = baseline.clone();
        self.clear_change_tracking();
        Ok(ArrayChangeset { original: Some(redo) })
    }

    pub fn rollback(&mut self) {
        if let Some(baseline) = self.original.take() {
            self.items = baseline;
        }
    }

    /// Keeps the earliest baseline recorded across the list (an array can
    /// only ever have a single outstanding baseline, since any touch
    /// captures the whole sequence).
    pub fn merge_changesets(&mut self, list: &[ArrayChangeset<V>]) -> ArrayChangeset<V> {
        let fused = list.iter().find_map(|cs| cs.original.clone()).filter(|o| o != &self.items);
        self.original = fused.clone();
        ArrayChangeset { original: fused }
    }

    /// Three-way reconciliation: whichever side touched the array at all
    /// wins wholesale (`spec.md` §9, resolved open question — the same
    /// local-wins rule as [`SyncableOrderedMap::merge_cloud_version`],
    /// specialized to "untouched loses" since arrays have no per-element
    /// identity to merge finer-grained than that).
    pub fn merge_cloud_version(
        &mut self,
        remote: &SyncableArray<V>,
        pending: &[ArrayChangeset<V>],
    ) -> SyncResult<ArrayChangeset<V>> {
        if self.has_changes() {
            return Err(SyncError::HasChanges);
        }
        let pending_fused = self.merge_changesets(pending);
        let local_touched = pending_fused.original.is_some();
        let before = self.items.clone();
        if local_touched {
            tracing::trace!("array cloud merge conflict resolved locally");
        } else {
            self.items = remote.items.clone();
        }
        self.original = if self.items != before { Some(before.clone()) } else { None };
        Ok(ArrayChangeset {
            original: if self.items != before { Some(before) } else { None },
        })
    }
}

impl<V: Clone + PartialEq> Syncable for SyncableArray<V> {
    fn is_immutable(&self) -> bool {
        self.latch.is_immutable()
    }

    fn make_immutable(&mut self) {
        self.latch.make_immutable();
    }

    fn has_changes(&self) -> bool {
        self.original.is_some()
    }

    fn clear_change_tracking(&mut self) {
        self.original = None;
    }
}
