//! Unordered set (`spec.md` §4.4).

use crate::base::{ChangeLatch, Syncable};
use crate::changeset::{merge_membership, track_membership_add, track_membership_remove};
use crate::error::{SyncError, SyncResult};
use std::collections::HashSet;
use std::hash::Hash;

#[cfg(feature = "serializing")]
use serde::{Deserialize, Serialize};

/// A changeset produced by [`SyncableSet`]: members added and removed since
/// the last baseline. The two sets are always disjoint.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serializing", derive(Serialize, Deserialize))]
pub struct SetChangeset<V: Eq + Hash> {
    pub added: HashSet<V>,
    pub removed: HashSet<V>,
}

impl<V: Eq + Hash> SetChangeset<V> {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// A set that records member add/remove edits since its last baseline.
#[derive(Clone, Debug)]
pub struct SyncableSet<V: Eq + Hash + Clone> {
    members: HashSet<V>,
    added: HashSet<V>,
    removed: HashSet<V>,
    latch: ChangeLatch,
}

impl<V: Eq + Hash + Clone> Default for SyncableSet<V> {
    fn default() -> Self {
        SyncableSet {
            members: HashSet::new(),
            added: HashSet::new(),
            removed: HashSet::new(),
            latch: ChangeLatch::default(),
        }
    }
}

impl<V: Eq + Hash + Clone> SyncableSet<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_set(members: HashSet<V>) -> Self {
        SyncableSet {
            members,
            ..Self::default()
        }
    }

    pub fn contains(&self, member: &V) -> bool {
        self.members.contains(member)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &V> {
        self.members.iter()
    }

    /// Adds `member`; returns `true` if it was not already present.
    pub fn insert(&mut self, member: V) -> SyncResult<bool> {
        self.latch.check_mutable()?;
        let inserted = self.members.insert(member.clone());
        if inserted {
            track_membership_add(&mut self.added, &mut self.removed, member);
        }
        Ok(inserted)
    }

    /// Removes `member`; returns `true` if it was present.
    pub fn remove(&mut self, member: &V) -> SyncResult<bool> {
        self.latch.check_mutable()?;
        let removed = self.members.remove(member);
        if removed {
            track_membership_remove(&mut self.added, &mut self.removed, member.clone());
        }
        Ok(removed)
    }

    pub fn peek_changeset(&self) -> SetChangeset<V> {
        SetChangeset {
            added: self.added.clone(),
            removed: self.removed.clone(),
        }
    }

    pub fn changeset(&mut self) -> SetChangeset<V> {
        let cs = self.peek_changeset();
        self.clear_change_tracking();
        cs
    }

    pub fn undo(&mut self, cs: &SetChangeset<V>) -> SyncResult<SetChangeset<V>> {
        if self.has_changes() {
            return Err(SyncError::HasChanges);
        }
        let snapshot = self.members.clone();
        match self.try_undo(cs) {
            Ok(redo) => {
                self.clear_change_tracking();
                Ok(redo)
            }
            Err(e) => {
                self.members = snapshot;
                Err(e)
            }
        }
    }

    // Undo means: members we added get removed, members we removed get re-added.
    fn try_undo(&mut self, cs: &SetChangeset<V>) -> SyncResult<SetChangeset<V>> {
        let mut redo_added = HashSet::new();
        let mut redo_removed = HashSet::new();
        for m in &cs.added {
            if !self.members.remove(m) {
                return Err(SyncError::MismatchedChangeset {
                    reason: "changeset recorded an add for a member no longer present".into(),
                });
            }
            redo_removed.insert(m.clone());
        }
        for m in &cs.removed {
            if !self.members.insert(m.clone()) {
                return Err(SyncError::MismatchedChangeset {
                    reason: "changeset recorded a remove for a member already present".into(),
                });
            }
            redo_added.insert(m.clone());
        }
        Ok(SetChangeset {
            added: redo_added,
            removed: redo_removed,
        })
    }

    pub fn rollback(&mut self) {
        let cs = self.peek_changeset();
        for m in &cs.added {
            self.members.remove(m);
        }
        for m in &cs.removed {
            self.members.insert(m.clone());
        }
        self.clear_change_tracking();
    }

    pub fn merge_changesets(&mut self, list: &[SetChangeset<V>]) -> SetChangeset<V> {
        let history = list.iter().map(|cs| (cs.added.clone(), cs.removed.clone()));
        let (added, removed) = merge_membership(history);
        self.added = added.clone();
        self.removed = removed.clone();
        SetChangeset { added, removed }
    }

    /// Three-way reconciliation: replays the local pending add/removes onto
    /// the remote membership, then re-applies local-only edits so that
    /// concurrent adds/removes of distinct members both survive.
    pub fn merge_cloud_version(
        &mut self,
        remote: &SyncableSet<V>,
        pending: &[SetChangeset<V>],
    ) -> SyncResult<SetChangeset<V>> {
        if self.has_changes() {
            return Err(SyncError::HasChanges);
        }
        let pending_fused = self.merge_changesets(pending);
        let before = self.members.clone();

        let mut merged = remote.members.clone();
        for m in &pending_fused.added {
            merged.insert(m.clone());
        }
        for m in &pending_fused.removed {
            merged.remove(m);
        }

        self.members = merged;
        let mut redo = SetChangeset::default();
        for m in before.difference(&self.members) {
            redo.added.insert(m.clone());
        }
        for m in self.members.difference(&before) {
            redo.removed.insert(m.clone());
        }
        self.clear_change_tracking();
        Ok(redo)
    }
}

impl<V: Eq + Hash + Clone> Syncable for SyncableSet<V> {
    fn is_immutable(&self) -> bool {
        self.latch.is_immutable()
    }

    fn make_immutable(&mut self) {
        self.latch.make_immutable();
    }

    fn has_changes(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }

    fn clear_change_tracking(&mut self) {
        self.added.clear();
        self.removed.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s3_add_remove_mix() {
        // spec.md S3: {a,b}; remove a, add c.
        let mut s = SyncableSet::from_set(HashSet::from(["a", "b"]));
        s.remove(&"a").unwrap();
        s.insert("c").unwrap();
        let cs = s.peek_changeset();
        assert_eq!(cs.added, HashSet::from(["c"]));
        assert_eq!(cs.removed, HashSet::from(["a"]));

        let redo = s.undo(&cs).unwrap();
        assert!(s.contains(&"a"));
        assert!(!s.contains(&"c"));

        let mut s2 = s.clone();
        s2.undo(&redo).unwrap();
        assert!(!s2.contains(&"a"));
        assert!(s2.contains(&"c"));
    }

    #[test]
    fn add_then_remove_same_member_cancels() {
        let mut s: SyncableSet<&str> = SyncableSet::new();
        s.insert("x").unwrap();
        s.remove(&"x").unwrap();
        assert!(!s.has_changes());
    }

    #[test]
    fn immutable_rejects_mutation() {
        let mut s: SyncableSet<&str> = SyncableSet::new();
        s.make_immutable();
        assert_eq!(s.insert("a"), Err(SyncError::Immutable));
    }

    #[test]
    fn undo_failure_leaves_members_unchanged() {
        // "a" undoes cleanly (it's present), but "b" is bogus as a `removed`
        // entry (it's still present, so re-inserting it is a contradiction) —
        // the partial undo of "a" must not stick once the second half fails.
        let mut s = SyncableSet::from_set(HashSet::from(["a", "b"]));
        let bogus = SetChangeset {
            added: HashSet::from(["a"]),
            removed: HashSet::from(["b"]),
        };
        let before: HashSet<&str> = s.iter().copied().collect();
        assert!(s.undo(&bogus).is_err());
        let after: HashSet<&str> = s.iter().copied().collect();
        assert_eq!(before, after);
    }

    #[test]
    fn merge_fuses_in_order() {
        let mut s: SyncableSet<&str> = SyncableSet::new();
        s.insert("a").unwrap();
        let c1 = s.changeset();
        s.remove(&"a").unwrap();
        s.insert("b").unwrap();
        let c2 = s.changeset();

        let mut target: SyncableSet<&str> = SyncableSet::new();
        let fused = target.merge_changesets(&[c1, c2]);
        assert!(!fused.added.contains("a"));
        assert!(fused.added.contains("b"));
    }

    #[test]
    fn cloud_merge_disjoint_members() {
        let base = HashSet::from(["x"]);
        let mut local = SyncableSet::from_set(base.clone());
        local.insert("y").unwrap();
        let pending = vec![local.changeset()];

        let mut remote = SyncableSet::from_set(base);
        remote.insert("z").unwrap();

        local.merge_cloud_version(&remote, &pending).unwrap();
        assert!(local.contains(&"x"));
        assert!(local.contains(&"y"));
        assert!(local.contains(&"z"));
    }
}
