//! Record (`spec.md` §4.2): the struct-shaped container whose per-field
//! tracking is generated by `#[derive(SyncableRecord)]` (`syncable-macros`).
//!
//! A derive macro cannot add storage fields to the struct it's attached to,
//! so the annotated struct stays a plain data type and [`Record<T>`] is the
//! container that actually does the tracking: it keeps the live value
//! alongside a frozen baseline copy, and every changeset operation is a
//! diff (or diff-and-apply) against that baseline rather than an
//! intercepted per-field write. `RecordFields::diff`'s "earliest value that
//! differs from current" rule gives the same observable capture-on-first-
//! touch/elide-net-zero behavior as `spec.md` §3 describes, without needing
//! per-field sentinel storage on the struct itself.

use crate::error::{SyncError, SyncResult};

/// Marker implemented by a generated `<Struct>Changeset` type.
pub trait RecordChangeset {
    fn is_empty(&self) -> bool;
}

/// Implemented by `#[derive(SyncableRecord)]` for the plain struct it's
/// applied to. Every method is generated per-field by the derive; [`Record`]
/// builds the full `changeset`/`undo`/`merge`/`merge_cloud_version` surface
/// on top of these four.
pub trait RecordFields: Clone {
    type Changeset: RecordChangeset + Clone;

    /// Per-field diff of `current` against `baseline`: a field's entry is
    /// populated with `baseline`'s value if it differs from `current`'s,
    /// and left untouched/empty otherwise. Fields marked `#[syncable(nested)]`
    /// recurse via the field type's own `RecordFields::diff`.
    fn diff(baseline: &Self, current: &Self) -> Self::Changeset;

    /// Applies `cs` to `current` as an undo, returning the changeset that
    /// would redo it.
    fn apply_undo(current: &mut Self, cs: &Self::Changeset) -> SyncResult<Self::Changeset>;

    /// Fuses an ordered (oldest-first) changeset history into one, keeping
    /// the earliest recorded prior per field and eliding fields whose fused
    /// prior matches `current`.
    fn merge(history: &[Self::Changeset], current: &Self) -> Self::Changeset;

    /// Per-field three-way reconciliation: for each field, compares `local`
    /// and `remote` against `baseline`; if only one side changed a field it
    /// wins, if both changed it the local value wins (`spec.md` §9, resolved
    /// open question), and conflict-free fields are left alone. Mutates
    /// `local` in place and returns the changeset that would undo the
    /// reconciliation.
    fn merge_cloud(baseline: &Self, local: &mut Self, remote: &Self) -> SyncResult<Self::Changeset>;
}

/// The change-tracking wrapper around a `#[derive(SyncableRecord)]` struct.
#[derive(Clone, Debug)]
pub struct Record<T: RecordFields> {
    data: T,
    baseline: T,
    immutable: bool,
}

impl<T: RecordFields> Record<T> {
    pub fn new(data: T) -> Self {
        Record {
            baseline: data.clone(),
            data,
            immutable: false,
        }
    }

    pub fn get(&self) -> &T {
        &self.data
    }

    /// Mutable access to the wrapped struct. Fails if the record has been
    /// made immutable.
    pub fn get_mut(&mut self) -> SyncResult<&mut T> {
        if self.immutable {
            tracing::trace!("rejected mutation: record is immutable");
            return Err(SyncError::Immutable);
        }
        Ok(&mut self.data)
    }

    pub fn is_immutable(&self) -> bool {
        self.immutable
    }

    pub fn make_immutable(&mut self) {
        self.immutable = true;
    }

    pub fn immutable_copy(&self) -> Self {
        let mut copy = self.clone();
        copy.make_immutable();
        copy
    }

    pub fn has_changes(&self) -> bool {
        !T::diff(&self.baseline, &self.data).is_empty()
    }

    pub fn clear_change_tracking(&mut self) {
        self.baseline = self.data.clone();
    }

    pub fn peek_changeset(&self) -> T::Changeset {
        T::diff(&self.baseline, &self.data)
    }

    pub fn changeset(&mut self) -> T::Changeset {
        let cs = self.peek_changeset();
        self.clear_change_tracking();
        cs
    }

    /// Restores the state recorded in `cs` and returns the changeset that
    /// would redo it. Fails with [`SyncError::HasChanges`] if there is
    /// unsaved local tracking.
    pub fn undo(&mut self, cs: &T::Changeset) -> SyncResult<T::Changeset> {
        if self.has_changes() {
            return Err(SyncError::HasChanges);
        }
        let redo = T::apply_undo(&mut self.data, cs)?;
        self.clear_change_tracking();
        Ok(redo)
    }

    pub fn rollback(&mut self) {
        let cs = self.peek_changeset();
        let _ = T::apply_undo(&mut self.data, &cs);
        self.clear_change_tracking();
    }

    pub fn merge_changesets(&self, list: &[T::Changeset]) -> T::Changeset {
        T::merge(list, &self.data)
    }

    /// Three-way reconciliation (`spec.md` §4.2): `remote` is the cloud's
    /// version of this record; `pending` is the local edit history since
    /// the last synced baseline.
    pub fn merge_cloud_version(&mut self, remote: &Record<T>, pending: &[T::Changeset]) -> SyncResult<T::Changeset> {
        if self.has_changes() {
            return Err(SyncError::HasChanges);
        }
        let merged_baseline = {
            let mut reconstructed = self.data.clone();
            T::apply_undo(&mut reconstructed, &T::merge(pending, &self.data))?;
            reconstructed
        };
        let redo = T::merge_cloud(&merged_baseline, &mut self.data, &remote.data)?;
        self.clear_change_tracking();
        Ok(redo)
    }
}

/// Logs a per-field cloud-merge conflict resolution. Called from derive-
/// generated [`RecordFields::merge_cloud`] impls so the macro doesn't need
/// to assume the consuming crate depends on `tracing` directly.
#[doc(hidden)]
pub fn trace_cloud_merge_conflict(field: &str) {
    tracing::trace!(field, "record field cloud merge conflict resolved locally");
}

impl<T: RecordFields> std::ops::Deref for Record<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.data
    }
}
