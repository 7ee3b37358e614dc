//! The base object: the immutability latch and `hasChanges` flag shared by
//! every container kind.
//!
//! Rust has no base classes, so each container embeds a [`ChangeLatch`]
//! field and forwards [`Syncable`] to it, the same way `AttributeAny` in the
//! teacher's model carries its own `rev: u64` instead of inheriting tracking
//! behavior from a common superclass.

use crate::error::{SyncError, SyncResult};

/// Common surface for every syncable container: the immutability latch and
/// the `hasChanges` flag (`spec.md` §4.1).
pub trait Syncable {
    /// Whether the object has been marked immutable.
    fn is_immutable(&self) -> bool;

    /// Marks the object (and, for containers with nested syncable children,
    /// those children too) as immutable. Once immutable, every mutating
    /// operation fails with [`SyncError::Immutable`].
    fn make_immutable(&mut self);

    /// Whether there are any changes relative to the last baseline.
    fn has_changes(&self) -> bool;

    /// Drops all tracking state; the current state becomes the new baseline.
    fn clear_change_tracking(&mut self);

    /// `[obj copy] then makeImmutable` in one step. The copy starts mutable
    /// and shares no tracking state with `self`; only the returned copy is
    /// frozen.
    fn immutable_copy(&self) -> Self
    where
        Self: Clone + Sized,
    {
        let mut copy = self.clone();
        copy.make_immutable();
        copy
    }
}

/// The mutable-by-default / opt-in-immutable latch embedded by every
/// container. Mirrors `ZDCObject`'s `isImmutable`/`hasChanges` pair.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct ChangeLatch {
    immutable: bool,
}

impl ChangeLatch {
    pub(crate) fn is_immutable(&self) -> bool {
        self.immutable
    }

    pub(crate) fn make_immutable(&mut self) {
        self.immutable = true;
    }

    /// The "will-change" half of the mutation-notifier contract (`spec.md`
    /// §6): called before any mutating operation actually touches state.
    pub(crate) fn check_mutable(&self) -> SyncResult<()> {
        if self.immutable {
            tracing::trace!("rejected mutation: object is immutable");
            Err(SyncError::Immutable)
        } else {
            Ok(())
        }
    }
}
