/// The prior-value encoding for a single tracked location (a record field,
/// a map key, a set/array entry's baseline membership, ...).
///
/// `Untouched` is not part of the conceptual model in `spec.md` — it is the
/// Rust-only way of saying "this location has no entry in the
/// original-values map" without needing a `HashMap<K, Tracked<V>>` to also
/// carry an `Option` wrapper. The other three variants are exactly the
/// `Absent` / `NestedRef` / concrete-value sentinels described in the
/// spec's data model (§3).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Tracked<V> {
    /// No entry recorded yet for this location.
    Untouched,
    /// The location had no value at baseline.
    Absent,
    /// The location held a nested syncable whose own changeset carries the detail.
    NestedRef,
    /// A concrete prior value was captured at baseline.
    Value(V),
}

impl<V> Tracked<V> {
    pub fn is_untouched(&self) -> bool {
        matches!(self, Tracked::Untouched)
    }

    pub fn as_value(&self) -> Option<&V> {
        match self {
            Tracked::Value(v) => Some(v),
            _ => None,
        }
    }
}

impl<V> Default for Tracked<V> {
    fn default() -> Self {
        Tracked::Untouched
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_untouched() {
        let t: Tracked<i32> = Default::default();
        assert!(t.is_untouched());
    }

    #[test]
    fn as_value_only_for_value_variant() {
        assert_eq!(Tracked::Value(3).as_value(), Some(&3));
        assert_eq!(Tracked::<i32>::Absent.as_value(), None);
        assert_eq!(Tracked::<i32>::NestedRef.as_value(), None);
        assert_eq!(Tracked::<i32>::Untouched.as_value(), None);
    }
}
