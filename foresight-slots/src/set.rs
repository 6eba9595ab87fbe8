use crate::Slot;
use std::fmt;

/// A sorted, duplicate-free immutable set of slots, backed by a sorted
/// array.
///
/// This makes equality, hashing and set operations linear in size without
/// hashing individual slots, which matters because `SlotSet` equality/
/// hashing sits on the rebuild hot path (comparing e-class slot
/// signatures). A `HashSet<Slot>` would make every comparison pay for
/// per-element hashing and give nondeterministic iteration order; the
/// sorted array gives both for free.
#[derive(Clone, Eq)]
pub struct SlotSet {
    slots: Vec<Slot>,
}

impl SlotSet {
    /// The empty set.
    pub fn empty() -> SlotSet {
        SlotSet { slots: Vec::new() }
    }

    /// Build a set from an arbitrary iterator of slots, sorting and
    /// deduplicating.
    pub fn from_iter(iter: impl IntoIterator<Item = Slot>) -> SlotSet {
        let mut slots: Vec<Slot> = iter.into_iter().collect();
        slots.sort_unstable();
        slots.dedup();
        SlotSet { slots }
    }

    pub fn singleton(slot: Slot) -> SlotSet {
        SlotSet { slots: vec![slot] }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, slot: Slot) -> bool {
        self.slots.binary_search(&slot).is_ok()
    }

    /// Return a new set with `slot` included.
    pub fn incl(&self, slot: Slot) -> SlotSet {
        match self.slots.binary_search(&slot) {
            Ok(_) => self.clone(),
            Err(pos) => {
                let mut slots = self.slots.clone();
                slots.insert(pos, slot);
                SlotSet { slots }
            }
        }
    }

    /// Return a new set with `slot` excluded.
    pub fn excl(&self, slot: Slot) -> SlotSet {
        match self.slots.binary_search(&slot) {
            Ok(pos) => {
                let mut slots = self.slots.clone();
                slots.remove(pos);
                SlotSet { slots }
            }
            Err(_) => self.clone(),
        }
    }

    pub fn union(&self, other: &SlotSet) -> SlotSet {
        let mut slots = Vec::with_capacity(self.slots.len() + other.slots.len());
        let (mut i, mut j) = (0, 0);
        while i < self.slots.len() && j < other.slots.len() {
            match self.slots[i].cmp(&other.slots[j]) {
                std::cmp::Ordering::Less => {
                    slots.push(self.slots[i]);
                    i += 1;
                }
                std::cmp::Ordering::Greater => {
                    slots.push(other.slots[j]);
                    j += 1;
                }
                std::cmp::Ordering::Equal => {
                    slots.push(self.slots[i]);
                    i += 1;
                    j += 1;
                }
            }
        }
        slots.extend_from_slice(&self.slots[i..]);
        slots.extend_from_slice(&other.slots[j..]);
        SlotSet { slots }
    }

    pub fn intersect(&self, other: &SlotSet) -> SlotSet {
        let mut slots = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < self.slots.len() && j < other.slots.len() {
            match self.slots[i].cmp(&other.slots[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    slots.push(self.slots[i]);
                    i += 1;
                    j += 1;
                }
            }
        }
        SlotSet { slots }
    }

    pub fn diff(&self, other: &SlotSet) -> SlotSet {
        let mut slots = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < self.slots.len() && j < other.slots.len() {
            match self.slots[i].cmp(&other.slots[j]) {
                std::cmp::Ordering::Less => {
                    slots.push(self.slots[i]);
                    i += 1;
                }
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    i += 1;
                    j += 1;
                }
            }
        }
        slots.extend_from_slice(&self.slots[i..]);
        SlotSet { slots }
    }

    pub fn subset_of(&self, other: &SlotSet) -> bool {
        self.diff(other).is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Slot> + '_ {
        self.slots.iter().copied()
    }

    pub fn as_slice(&self) -> &[Slot] {
        &self.slots
    }
}

impl PartialEq for SlotSet {
    fn eq(&self, other: &Self) -> bool {
        self.slots == other.slots
    }
}

/// FNV-1a, as specified, run over each slot's `(kind, id)` raw key rather
/// than over `std::hash::Hash`, so the hash is stable across process runs
/// (no `SipHash` random seed) and depends only on set contents, never on
/// construction/insertion order (the array is always kept sorted).
impl std::hash::Hash for SlotSet {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        const FNV_OFFSET: u64 = 0xcbf29ce484222325;
        const FNV_PRIME: u64 = 0x100000001b3;
        let mut hash = FNV_OFFSET;
        for slot in &self.slots {
            let (kind, id) = slot.raw_key();
            for byte in [kind].into_iter().chain(id.to_le_bytes()) {
                hash ^= u64::from(byte);
                hash = hash.wrapping_mul(FNV_PRIME);
            }
        }
        state.write_u64(hash);
    }
}

impl fmt::Debug for SlotSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.slots.iter()).finish()
    }
}

impl FromIterator<Slot> for SlotSet {
    fn from_iter<T: IntoIterator<Item = Slot>>(iter: T) -> Self {
        SlotSet::from_iter(iter)
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn arb_slot() -> impl Strategy<Value = Slot> {
        (0u32..20).prop_map(Slot::numeric)
    }

    fn arb_set() -> impl Strategy<Value = SlotSet> {
        prop::collection::vec(arb_slot(), 0..15).prop_map(SlotSet::from_iter)
    }

    proptest! {
        #[test]
        fn union_is_commutative(a in arb_set(), b in arb_set()) {
            prop_assert_eq!(a.union(&b), b.union(&a));
        }

        #[test]
        fn intersect_is_commutative(a in arb_set(), b in arb_set()) {
            prop_assert_eq!(a.intersect(&b), b.intersect(&a));
        }

        #[test]
        fn union_is_associative(a in arb_set(), b in arb_set(), c in arb_set()) {
            prop_assert_eq!(a.union(&b).union(&c), a.union(&b.union(&c)));
        }

        #[test]
        fn intersect_is_associative(a in arb_set(), b in arb_set(), c in arb_set()) {
            prop_assert_eq!(a.intersect(&b).intersect(&c), a.intersect(&b.intersect(&c)));
        }

        /// Equality and hashing must never depend on construction order,
        /// for arbitrary inputs, not just the one hand-picked pair above.
        #[test]
        fn equality_and_hash_are_order_independent(slots in prop::collection::vec(arb_slot(), 0..15)) {
            use std::collections::hash_map::DefaultHasher;
            use std::hash::{Hash, Hasher};

            let mut shuffled = slots.clone();
            shuffled.reverse();
            let original = SlotSet::from_iter(slots);
            let reordered = SlotSet::from_iter(shuffled);
            prop_assert_eq!(&original, &reordered);

            let mut h1 = DefaultHasher::new();
            original.hash(&mut h1);
            let mut h2 = DefaultHasher::new();
            reordered.hash(&mut h2);
            prop_assert_eq!(h1.finish(), h2.finish());
        }
    }
}
