use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// A name-hygienic identifier for a binder position.
///
/// Two kinds exist: [`Slot::fresh`] allocates a globally-unique slot whose
/// identity is the allocation itself (used for binder positions as callers
/// see them); `Slot::numeric` is a de-Bruijn-style index used only inside a
/// canonical [`crate::Slot`] "shape" (see `foresight-egraph::ShapeCall`),
/// where slots are renamed to their first-occurrence position. Both kinds
/// compare equal only to themselves/the same index: a fresh slot is never
/// equal to a numeric slot, even if their raw ids coincide.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Slot(Repr);

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum Repr {
    // Numeric first so that, within a fully-numeric `SlotSet` (i.e. a
    // shape's parameter signature), sorting also orders slots by
    // first-occurrence index.
    Numeric(u32),
    Fresh(u32),
}

static NEXT_FRESH: AtomicU32 = AtomicU32::new(0);

impl Slot {
    /// Allocate a new, globally-unique fresh slot.
    ///
    /// Allocation is a monotonic counter, not a random id: as long as all
    /// callers run on a single driver thread, allocation
    /// order is deterministic given deterministic traversal order, which is
    /// what gives the engine its overall reproducibility guarantee.
    pub fn fresh() -> Slot {
        let id = NEXT_FRESH.fetch_add(1, Ordering::Relaxed);
        assert!(id != u32::MAX, "exhausted fresh slot id space");
        Slot(Repr::Fresh(id))
    }

    /// Construct the numeric slot at `index`, for use inside a canonical
    /// shape only.
    pub fn numeric(index: u32) -> Slot {
        Slot(Repr::Numeric(index))
    }

    /// True if this is a fresh (identity-based) slot.
    pub fn is_fresh(&self) -> bool {
        matches!(self.0, Repr::Fresh(_))
    }

    /// True if this is a numeric (shape-position) slot.
    pub fn is_numeric(&self) -> bool {
        matches!(self.0, Repr::Numeric(_))
    }

    /// The numeric index, if this is a numeric slot.
    pub fn numeric_index(&self) -> Option<u32> {
        match self.0 {
            Repr::Numeric(i) => Some(i),
            Repr::Fresh(_) => None,
        }
    }

    /// A stable `(kind, id)` pair used by `SlotSet`'s FNV-1a hash so that
    /// hashing never needs to go through `std::hash::Hash` (and its
    /// per-platform `SipHash` seeding, which would defeat determinism).
    pub(crate) fn raw_key(&self) -> (u8, u32) {
        match self.0 {
            Repr::Numeric(i) => (0, i),
            Repr::Fresh(i) => (1, i),
        }
    }
}

impl PartialOrd for Slot {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Slot {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Repr::Fresh(id) => write!(f, "$s{id}"),
            Repr::Numeric(i) => write!(f, "${i}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_slots_are_distinct() {
        let a = Slot::fresh();
        let b = Slot::fresh();
        assert_ne!(a, b);
    }

    #[test]
    fn numeric_slots_compare_by_index() {
        let a = Slot::numeric(0);
        let b = Slot::numeric(1);
        assert!(a < b);
        assert_eq!(a, Slot::numeric(0));
    }

    #[test]
    fn numeric_and_fresh_never_equal() {
        let n = Slot::numeric(0);
        let f = Slot::fresh();
        assert_ne!(n, f);
    }
}
