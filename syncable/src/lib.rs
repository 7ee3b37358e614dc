//! Syncable data containers: change-tracking record/map/set/ordered-map/
//! ordered-set/array types with undo, merge, and cloud-version
//! reconciliation.
//!
//! Every container here follows the same four-operation shape
//! ([`Syncable`] plus `changeset`/`undo`/`merge_changesets`/
//! `merge_cloud_version`): capture a baseline the first time a location is
//! touched, elide net-zero edits, and let an ordered list of changesets be
//! fused into one or replayed as an undo/redo pair.
//!
//! `Record`-shaped containers are generated with `#[derive(SyncableRecord)]`
//! from `syncable-macros`; the collection containers ([`SyncableMap`],
//! [`SyncableSet`], [`SyncableOrderedMap`], [`SyncableOrderedSet`],
//! [`SyncableArray`]) are plain generic types.

mod base;
mod changeset;
mod error;
mod estimator;
mod map;
mod ordered_collection;
mod ordered_map;
mod record;
mod set;
mod value;

pub use base::Syncable;
#[doc(hidden)]
pub use changeset::merge_scalar_field;
pub use error::{SyncError, SyncResult};
pub use estimator::estimate_moves;
pub use map::{MapChangeset, SyncableMap};
pub use ordered_collection::{
    ArrayChangeset, OrderedSetChangeset, SyncableArray, SyncableOrderedSet,
};
pub use ordered_map::{OrderedMapChangeset, SyncableOrderedMap};
pub use record::{trace_cloud_merge_conflict, Record, RecordChangeset, RecordFields};
pub use set::{SetChangeset, SyncableSet};
pub use value::Tracked;

/// Derives [`SyncableRecord`] for a struct whose fields should each be
/// independently change-tracked. See `syncable-macros` for the generated
/// shape.
pub use syncable_macros::SyncableRecord;
