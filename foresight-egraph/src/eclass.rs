use foresight_slots::{Slot, SlotMap, SlotSet};
use std::fmt;

/// A stable handle into the e-class arena.
///
/// Grounded on `cranelift_entity`'s entity-reference idiom
/// (`cranelift-entity/src/map.rs`): a plain newtype over a dense `u32`
/// index, `Copy`, ordered, hashable. Unlike cranelift's `EntityRef`, we
/// don't pull in the full `cranelift-entity` crate (its packed-option and
/// `bforest`-facing API is more than this engine needs); this is the same
/// idiom, implemented locally.
///
/// An `EClassRef` is never invalidated:
/// e-classes are created by `add` and never deleted. After a `union`, the
/// absorbed id stops being *canonical* but `tryCanonicalize` still resolves
/// it to the survivor.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EClassRef(u32);

impl EClassRef {
    pub(crate) fn new(index: u32) -> EClassRef {
        EClassRef(index)
    }

    pub fn index(&self) -> u32 {
        self.0
    }
}

impl fmt::Debug for EClassRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// A reference to an e-class plus a renaming from the class's canonical
/// slot parameters to the caller's slots.
///
/// This is the mechanism by which slotted e-graphs factor alpha-equivalence
/// out of hashing while still letting each caller see the slots it actually
/// used: the class itself is stored once, in a canonical numeric-slot form,
/// and every site that refers to it carries its own `subst` projecting that
/// canonical form onto concrete names.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct EClassCall {
    pub class: EClassRef,
    pub subst: SlotMap,
}

impl EClassCall {
    pub fn new(class: EClassRef, subst: SlotMap) -> EClassCall {
        EClassCall { class, subst }
    }

    /// An identity call: used right after a class is created, before any
    /// caller-specific renaming is known.
    pub fn identity(class: EClassRef, signature: &SlotSet) -> EClassCall {
        EClassCall {
            class,
            subst: SlotMap::identity(signature),
        }
    }

    /// The free slots this call contributes to its parent node, given the
    /// callee class's slot signature: the image of `subst` restricted to
    /// `signature`'s domain.
    pub fn free_slots(&self, signature: &SlotSet) -> SlotSet {
        SlotSet::from_iter(signature.iter().map(|s| self.subst.apply(s)))
    }

    /// Rewrite this call through a renaming of the *caller's* slots (e.g.
    /// when the enclosing node's slots are themselves being renamed during
    /// rebuild).
    pub fn rename(&self, renaming: &SlotMap) -> EClassCall {
        EClassCall {
            class: self.class,
            subst: self.subst.compose_partial(renaming),
        }
    }

    /// Compose this call with a renaming of the *callee's* canonical slots
    /// (e.g. when the callee class's slot signature itself gets permuted by
    /// rebuild).
    pub fn compose_callee(&self, renaming: &SlotMap) -> EClassCall {
        let mut subst = SlotMap::new();
        for (k, v) in renaming.iter() {
            if let Some(orig) = self.subst.get(k) {
                subst.insert(v, orig).expect("renaming has distinct keys");
            }
        }
        EClassCall {
            class: self.class,
            subst,
        }
    }

    /// Redirect this call to a new canonical class, typically the survivor
    /// of a union.
    pub fn with_class(&self, class: EClassRef) -> EClassCall {
        EClassCall {
            class,
            subst: self.subst.clone(),
        }
    }

    /// Apply `slot` through this call's substitution (used when walking a
    /// `MixedTree`/pattern atom back out to a concrete slot name).
    pub fn apply_slot(&self, slot: Slot) -> Slot {
        self.subst.apply(slot)
    }
}
