use thiserror::Error;

/// Failure modes for syncable operations.
///
/// All operations that accept an externally-supplied changeset or remote
/// value validate first, snapshot the instance, then apply; on any error
/// here the snapshot is restored and the instance is left unchanged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Mutation attempted on a frozen instance (see [`crate::Syncable::make_immutable`]).
    #[error("object is immutable")]
    Immutable,

    /// `undo` was called while local tracking is non-empty; the caller must
    /// `rollback` first so the baseline for the undo is unambiguous.
    #[error("object has uncommitted changes; call rollback() first")]
    HasChanges,

    /// A supplied changeset is structurally invalid, or refers to a field
    /// or key that does not exist on the target.
    #[error("malformed changeset: {reason}")]
    MalformedChangeset { reason: String },

    /// The prior value recorded in a changeset disagrees with the current
    /// value at that location — the changeset was produced against a
    /// different state than the one it is being applied to.
    #[error("mismatched changeset: {reason}")]
    MismatchedChangeset { reason: String },

    /// `merge_cloud_version` was handed a remote value of incompatible shape.
    #[error("incorrect object class for cloud merge")]
    IncorrectObjectClass,
}

pub type SyncResult<T> = Result<T, SyncError>;
