use crate::{Slot, SlotSet};
use std::fmt;

/// Precondition violations for [`SlotMap`] construction/composition.
///
/// These are the "precondition violation" error kind: they signal a caller
/// fatal at the call site, never a state the map itself can silently
/// tolerate.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotMapError {
    #[error("duplicate key {0:?} in slot map")]
    DuplicateKey(Slot),
    #[error("inverse() requires a bijective slot map")]
    NotBijection,
}

/// An ordered finite partial function `Slot -> Slot`.
///
/// Backed by an insertion-ordered `Vec<(Slot, Slot)>` rather than a hash map:
/// slot maps are small (bounded by a node's `defs`/`uses`/argument arity) and
/// are compared/iterated far more often than looked up by a single key, so a
/// linear scan is both simpler and faster than hashing here — the same
/// tradeoff `cranelift_entity`'s dense `SecondaryMap` makes for small,
/// locally-scoped key spaces.
///
/// Equality and hashing are order-independent (two maps with the same pairs
/// inserted in different orders compare equal and hash equal): a `SlotMap`
/// is used as part of a hash-cons key (inside `EClassCall`/`ShapeCall`) where
/// only its content, never its construction history, is semantically
/// meaningful.
#[derive(Clone, Default)]
pub struct SlotMap {
    pairs: Vec<(Slot, Slot)>,
}

impl PartialEq for SlotMap {
    fn eq(&self, other: &Self) -> bool {
        self.pairs.len() == other.pairs.len()
            && self
                .pairs
                .iter()
                .all(|&(k, v)| other.get(k) == Some(v))
    }
}

impl Eq for SlotMap {}

impl std::hash::Hash for SlotMap {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        let mut acc: u64 = 0;
        for &(k, v) in &self.pairs {
            let (kk, ki) = k.raw_key();
            let (vk, vi) = v.raw_key();
            let mut h = std::collections::hash_map::DefaultHasher::new();
            use std::hash::Hasher;
            h.write_u8(kk);
            h.write_u32(ki);
            h.write_u8(vk);
            h.write_u32(vi);
            // XOR-combine so the total is independent of pair order.
            acc ^= h.finish();
        }
        state.write_u64(acc);
    }
}

impl SlotMap {
    pub fn new() -> SlotMap {
        SlotMap { pairs: Vec::new() }
    }

    pub fn from_pairs(
        iter: impl IntoIterator<Item = (Slot, Slot)>,
    ) -> Result<SlotMap, SlotMapError> {
        let mut map = SlotMap::new();
        for (k, v) in iter {
            map.insert(k, v)?;
        }
        Ok(map)
    }

    /// Insert `k -> v`. Fails if `k` is already a key (no duplicate keys,
    /// per the bijection invariant below).
    pub fn insert(&mut self, k: Slot, v: Slot) -> Result<(), SlotMapError> {
        if self.pairs.iter().any(|&(existing, _)| existing == k) {
            return Err(SlotMapError::DuplicateKey(k));
        }
        crate::trace!("slotmap: insert {:?} -> {:?}", k, v);
        self.pairs.push((k, v));
        Ok(())
    }

    pub fn get(&self, k: Slot) -> Option<Slot> {
        self.pairs
            .iter()
            .find(|&&(existing, _)| existing == k)
            .map(|&(_, v)| v)
    }

    pub fn contains_key(&self, k: Slot) -> bool {
        self.get(k).is_some()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Slot, Slot)> + '_ {
        self.pairs.iter().copied()
    }

    pub fn keys(&self) -> impl Iterator<Item = Slot> + '_ {
        self.pairs.iter().map(|&(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = Slot> + '_ {
        self.pairs.iter().map(|&(_, v)| v)
    }

    pub fn domain(&self) -> SlotSet {
        SlotSet::from_iter(self.keys())
    }

    pub fn codomain(&self) -> SlotSet {
        SlotSet::from_iter(self.values())
    }

    /// `self` then `other`, keeping only keys whose image under `self` is
    /// also in `other`'s domain (domains are intersected).
    pub fn compose(&self, other: &SlotMap) -> SlotMap {
        let mut result = SlotMap::new();
        for (k, v) in self.iter() {
            if let Some(v2) = other.get(v) {
                result
                    .insert(k, v2)
                    .expect("keys from self are already unique");
            }
        }
        result
    }

    /// Like [`Self::compose`], but keys whose image isn't in `other`'s
    /// domain keep their original (unrewritten) image instead of being
    /// dropped.
    pub fn compose_partial(&self, other: &SlotMap) -> SlotMap {
        let mut result = SlotMap::new();
        for (k, v) in self.iter() {
            let v2 = other.get(v).unwrap_or(v);
            result
                .insert(k, v2)
                .expect("keys from self are already unique");
        }
        result
    }

    /// Like [`Self::compose_partial`], but keys whose image isn't in
    /// `other`'s domain are instead renamed to a newly-allocated fresh
    /// slot. Used when extending a renaming to cover slots the caller
    /// didn't anticipate (e.g. rebuild's slot-signature merging).
    pub fn compose_fresh(&self, other: &SlotMap) -> SlotMap {
        let mut result = SlotMap::new();
        for (k, v) in self.iter() {
            let v2 = other.get(v).unwrap_or_else(Slot::fresh);
            result
                .insert(k, v2)
                .expect("keys from self are already unique");
        }
        result
    }

    /// True iff every value is distinct (the map can be inverted).
    pub fn is_bijection(&self) -> bool {
        let mut values: Vec<Slot> = self.values().collect();
        values.sort_unstable();
        let before = values.len();
        values.dedup();
        values.len() == before
    }

    /// True iff domain and codomain are equal as sets (a bijection that
    /// maps a set onto itself — e.g. a slot renaming used inside a single
    /// e-class's signature).
    pub fn is_permutation(&self) -> bool {
        self.is_bijection() && self.domain() == self.codomain()
    }

    /// Swap keys and values. Fails unless [`Self::is_bijection`].
    pub fn inverse(&self) -> Result<SlotMap, SlotMapError> {
        if !self.is_bijection() {
            return Err(SlotMapError::NotBijection);
        }
        let mut result = SlotMap::new();
        for (k, v) in self.iter() {
            result
                .insert(v, k)
                .expect("bijection guarantees distinct values become distinct keys");
        }
        Ok(result)
    }

    /// The identity renaming over `set`.
    pub fn identity(set: &SlotSet) -> SlotMap {
        let mut result = SlotMap::new();
        for s in set.iter() {
            result.insert(s, s).expect("set has no duplicates");
        }
        result
    }

    /// A fresh bijection from every slot in `set` to a newly-allocated
    /// fresh slot. Used to give a pattern/shape's numeric parameters
    /// concrete, globally-unique identities when it's instantiated.
    pub fn bijection_from_set_to_fresh(set: &SlotSet) -> SlotMap {
        let mut result = SlotMap::new();
        for s in set.iter() {
            result
                .insert(s, Slot::fresh())
                .expect("set has no duplicates");
        }
        result
    }

    /// Apply this map to a single slot, leaving slots outside the domain
    /// unchanged. This is the common case used when rewriting a node's
    /// `uses`/`defs` through a renaming.
    pub fn apply(&self, slot: Slot) -> Slot {
        self.get(slot).unwrap_or(slot)
    }
}

impl fmt::Debug for SlotMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.pairs.iter().copied()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(i: u32) -> Slot {
        Slot::numeric(i)
    }

    #[test]
    fn duplicate_key_rejected() {
        let mut m = SlotMap::new();
        m.insert(n(0), n(1)).unwrap();
        assert_eq!(m.insert(n(0), n(2)), Err(SlotMapError::DuplicateKey(n(0))));
    }

    #[test]
    fn compose_intersects_domains() {
        let f = SlotMap::from_pairs([(n(0), n(1)), (n(2), n(3))]).unwrap();
        let g = SlotMap::from_pairs([(n(1), n(10))]).unwrap();
        let composed = f.compose(&g);
        assert_eq!(composed.get(n(0)), Some(n(10)));
        assert_eq!(composed.get(n(2)), None);
    }

    #[test]
    fn compose_partial_keeps_unmatched() {
        let f = SlotMap::from_pairs([(n(0), n(1)), (n(2), n(3))]).unwrap();
        let g = SlotMap::from_pairs([(n(1), n(10))]).unwrap();
        let composed = f.compose_partial(&g);
        assert_eq!(composed.get(n(0)), Some(n(10)));
        assert_eq!(composed.get(n(2)), Some(n(3)));
    }

    #[test]
    fn compose_fresh_allocates_for_unmatched() {
        let f = SlotMap::from_pairs([(n(0), n(1))]).unwrap();
        let g = SlotMap::new();
        let composed = f.compose_fresh(&g);
        let v = composed.get(n(0)).unwrap();
        assert!(v.is_fresh());
    }

    #[test]
    fn inverse_requires_bijection() {
        let not_bij = SlotMap::from_pairs([(n(0), n(1)), (n(2), n(1))]).unwrap();
        assert_eq!(not_bij.inverse(), Err(SlotMapError::NotBijection));

        let bij = SlotMap::from_pairs([(n(0), n(1)), (n(2), n(3))]).unwrap();
        let inv = bij.inverse().unwrap();
        assert_eq!(inv.get(n(1)), Some(n(0)));
        assert_eq!(inv.get(n(3)), Some(n(2)));
    }

    #[test]
    fn identity_and_permutation() {
        let set = SlotSet::from_iter([n(0), n(1)]);
        let id = SlotMap::identity(&set);
        assert!(id.is_permutation());
        assert_eq!(id.get(n(0)), Some(n(0)));
    }

    #[test]
    fn bijection_from_set_to_fresh_is_bijective() {
        let set = SlotSet::from_iter([n(0), n(1), n(2)]);
        let m = SlotMap::bijection_from_set_to_fresh(&set);
        assert!(m.is_bijection());
        assert_eq!(m.len(), 3);
    }
}
