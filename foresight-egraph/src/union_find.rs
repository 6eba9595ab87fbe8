use crate::EClassRef;
use foresight_slots::{Slot, SlotMap, SlotSet};
use std::cell::{Cell, RefCell};

/// Union-find over [`EClassRef`] identities, extended to carry a renaming
/// of each class's numeric slot signature along every union edge.
///
/// A plain union-find would be enough if classes had no slot parameters,
/// but here two classes can only be merged when their signatures line up,
/// and which numeric position means what can differ between them. Rather
/// than bolt that bookkeeping onto the hash-cons layer, each edge in the
/// forest carries the permutation taking the child's signature to its
/// parent's, and `find` composes those permutations on every path walk —
/// the same trick as weighted union-find, with a group element instead of
/// a rank delta.
///
/// This implementation requires the two classes passed to `union` to have
/// equal-arity signatures, aligned by numeric position at the time of the
/// call. That covers every union this engine ever performs internally
/// (congruence closure always discovers pairs that are already aligned,
/// since they collided in the hash-cons table under the same numbering)
/// and is the documented contract for callers requesting an explicit
/// union of two classes directly.
pub struct DisjointSet {
    parent: Vec<Cell<u32>>,
    // Renaming from this class's own numeric signature to `parent`'s.
    // Identity, over this class's own signature, while parent == self.
    renaming_to_parent: Vec<RefCell<SlotMap>>,
    arity: Vec<u32>,
    size: Vec<u32>,
}

impl DisjointSet {
    pub fn new() -> DisjointSet {
        DisjointSet {
            parent: Vec::new(),
            renaming_to_parent: Vec::new(),
            arity: Vec::new(),
            size: Vec::new(),
        }
    }

    pub fn with_capacity(cap: usize) -> DisjointSet {
        DisjointSet {
            parent: Vec::with_capacity(cap),
            renaming_to_parent: Vec::with_capacity(cap),
            arity: Vec::with_capacity(cap),
            size: Vec::with_capacity(cap),
        }
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    fn signature(arity: u32) -> SlotSet {
        SlotSet::from_iter((0..arity).map(Slot::numeric))
    }

    /// Allocate a brand-new singleton set with the given number of numeric
    /// slot parameters. E-classes are never deleted, so this is the only
    /// way new ids are introduced.
    pub fn make_set(&mut self, arity: u32) -> EClassRef {
        let id = self.parent.len() as u32;
        self.parent.push(Cell::new(id));
        self.renaming_to_parent
            .push(RefCell::new(SlotMap::identity(&Self::signature(arity))));
        self.arity.push(arity);
        self.size.push(1);
        EClassRef::new(id)
    }

    /// True iff `r` is a live, in-range ref.
    pub fn is_live(&self, r: EClassRef) -> bool {
        (r.index() as usize) < self.parent.len()
    }

    pub fn arity_of(&self, r: EClassRef) -> u32 {
        self.arity[r.index() as usize]
    }

    /// Walk to the canonical representative, returning it together with the
    /// composed renaming from `r`'s own numeric signature to the
    /// representative's. Compresses the path (and the cached renamings) as
    /// it goes.
    pub fn find(&self, r: EClassRef) -> (EClassRef, SlotMap) {
        let mut chain = vec![r.index()];
        let mut cur = r.index();
        loop {
            let next = self.parent[cur as usize].get();
            if next == cur {
                break;
            }
            chain.push(next);
            cur = next;
        }
        let root = cur;

        if chain.len() == 1 {
            let renaming = self.renaming_to_parent[chain[0] as usize].borrow().clone();
            return (EClassRef::new(root), renaming);
        }

        // partial[i] = renaming from chain[i]'s signature to root's.
        let mut partial: Vec<SlotMap> = vec![SlotMap::new(); chain.len()];
        let last = chain.len() - 1;
        partial[last] = SlotMap::identity(&Self::signature(self.arity[root as usize]));
        for i in (0..last).rev() {
            let step = self.renaming_to_parent[chain[i] as usize].borrow().clone();
            partial[i] = step.compose(&partial[i + 1]);
        }

        for i in 0..last {
            self.parent[chain[i] as usize].set(root);
            *self.renaming_to_parent[chain[i] as usize].borrow_mut() = partial[i].clone();
        }

        (EClassRef::new(root), partial[0].clone())
    }

    /// Union the sets containing `a` and `b`, which must have equal arity
    /// once canonicalized. Returns `(survivor, loser, renaming)` where
    /// `renaming` maps `loser`'s own numeric signature to `survivor`'s,
    /// assuming `a`'s and `b`'s signatures were aligned by numeric position.
    /// No-op (`(find(a).0, find(a).0, identity)`) if already unioned.
    ///
    /// Ties in size are broken by lower id so that which class survives is
    /// a pure function of the two ids, not of call history.
    pub fn union(&mut self, a: EClassRef, b: EClassRef) -> Result<(EClassRef, EClassRef, SlotMap), ArityMismatch> {
        let (ra, rena_a) = self.find(a);
        let (rb, rena_b) = self.find(b);
        if ra == rb {
            return Ok((ra, ra, SlotMap::identity(&Self::signature(self.arity[ra.index() as usize]))));
        }
        if self.arity[ra.index() as usize] != self.arity[rb.index() as usize] {
            return Err(ArityMismatch {
                a: self.arity[ra.index() as usize],
                b: self.arity[rb.index() as usize],
            });
        }

        let (survivor, loser, renaming) = if self.size[ra.index() as usize] > self.size[rb.index() as usize]
            || (self.size[ra.index() as usize] == self.size[rb.index() as usize] && ra.index() <= rb.index())
        {
            // rb (loser) -> ra (survivor): rena_b^-1 then rena_a.
            let renaming = rena_b
                .inverse()
                .expect("union-find renamings are always bijections")
                .compose(&rena_a);
            (ra, rb, renaming)
        } else {
            let renaming = rena_a
                .inverse()
                .expect("union-find renamings are always bijections")
                .compose(&rena_b);
            (rb, ra, renaming)
        };

        self.parent[loser.index() as usize].set(survivor.index());
        *self.renaming_to_parent[loser.index() as usize].borrow_mut() = renaming.clone();
        self.size[survivor.index() as usize] += self.size[loser.index() as usize];
        Ok((survivor, loser, renaming))
    }
}

impl Default for DisjointSet {
    fn default() -> Self {
        Self::new()
    }
}

/// Two classes can't be unioned because their numeric slot signatures
/// disagree in size. This engine only supports unioning classes whose
/// signatures can be aligned positionally; a client unioning classes with
/// genuinely different free-slot counts needs to pad one side first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArityMismatch {
    pub a: u32,
    pub b: u32,
}

impl std::fmt::Display for ArityMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cannot union classes of arity {} and {}", self.a, self.b)
    }
}

impl std::error::Error for ArityMismatch {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_find_basic() {
        let mut ds = DisjointSet::new();
        let a = ds.make_set(0);
        let b = ds.make_set(0);
        let c = ds.make_set(0);
        assert_ne!(ds.find(a).0, ds.find(b).0);
        ds.union(a, b).unwrap();
        assert_eq!(ds.find(a).0, ds.find(b).0);
        assert_ne!(ds.find(a).0, ds.find(c).0);
        ds.union(b, c).unwrap();
        assert_eq!(ds.find(a).0, ds.find(c).0);
    }

    #[test]
    fn union_is_idempotent() {
        let mut ds = DisjointSet::new();
        let a = ds.make_set(0);
        ds.union(a, a).unwrap();
        assert_eq!(ds.find(a).0, a);
    }

    #[test]
    fn arity_mismatch_rejected() {
        let mut ds = DisjointSet::new();
        let a = ds.make_set(0);
        let b = ds.make_set(1);
        assert!(ds.union(a, b).is_err());
    }

    #[test]
    fn renaming_composes_along_multi_hop_chains() {
        let mut ds = DisjointSet::new();
        let a = ds.make_set(2);
        let b = ds.make_set(2);
        let c = ds.make_set(2);
        ds.union(a, b).unwrap();
        ds.union(b, c).unwrap();
        let (ra, rena_a) = ds.find(a);
        let (rc, rena_c) = ds.find(c);
        assert_eq!(ra, rc);
        // Both renamings are permutations of {0,1} into the survivor's frame.
        assert_eq!(rena_a.len(), 2);
        assert_eq!(rena_c.len(), 2);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    /// Naive reference connectivity over `n` elements: repeatedly expands a
    /// set of already-merged groups by unioning one pair at a time, with no
    /// path compression or union-by-size, so it can't share a bug with
    /// `DisjointSet` itself.
    fn reference_components(n: usize, pairs: &[(usize, usize)]) -> Vec<usize> {
        let mut label: Vec<usize> = (0..n).collect();
        for &(a, b) in pairs {
            let (la, lb) = (label[a], label[b]);
            if la != lb {
                for l in label.iter_mut() {
                    if *l == lb {
                        *l = la;
                    }
                }
            }
        }
        label
    }

    fn arbitrary_union_sequence(max_n: usize) -> impl Strategy<Value = (usize, Vec<(usize, usize)>)> {
        (2..max_n).prop_flat_map(|n| {
            prop::collection::vec((0..n, 0..n), 0..30).prop_map(move |pairs| (n, pairs))
        })
    }

    proptest! {
        /// `find` agrees with the reflexive-transitive closure of every
        /// union performed, for any order and any pair of elements —
        /// the defining correctness property of union-find, independent of
        /// the slot-renaming machinery layered on top of it here.
        #[test]
        fn find_matches_the_transitive_closure_of_unions((n, pairs) in arbitrary_union_sequence(12)) {
            let mut ds = DisjointSet::new();
            let refs: Vec<EClassRef> = (0..n).map(|_| ds.make_set(0)).collect();
            for &(a, b) in &pairs {
                ds.union(refs[a], refs[b]).unwrap();
            }
            let expected = reference_components(n, &pairs);
            for i in 0..n {
                for j in 0..n {
                    let same_in_ds = ds.find(refs[i]).0 == ds.find(refs[j]).0;
                    let same_in_reference = expected[i] == expected[j];
                    prop_assert_eq!(same_in_ds, same_in_reference, "i={}, j={}", i, j);
                }
            }
        }

        /// Unioning a class with itself never changes what it's connected to.
        #[test]
        fn self_union_is_a_no_op((n, pairs) in arbitrary_union_sequence(10)) {
            let mut ds = DisjointSet::new();
            let refs: Vec<EClassRef> = (0..n).map(|_| ds.make_set(0)).collect();
            for &(a, b) in &pairs {
                ds.union(refs[a], refs[b]).unwrap();
            }
            let before: Vec<EClassRef> = refs.iter().map(|&r| ds.find(r).0).collect();
            for &r in &refs {
                ds.union(r, r).unwrap();
            }
            let after: Vec<EClassRef> = refs.iter().map(|&r| ds.find(r).0).collect();
            prop_assert_eq!(before, after);
        }

        /// `union(a, b)` is symmetric: unioning in either order produces the
        /// same partition (though not necessarily the same survivor id).
        #[test]
        fn union_order_does_not_affect_the_resulting_partition((n, pairs) in arbitrary_union_sequence(10)) {
            let mut forward = DisjointSet::new();
            let forward_refs: Vec<EClassRef> = (0..n).map(|_| forward.make_set(0)).collect();
            for &(a, b) in &pairs {
                forward.union(forward_refs[a], forward_refs[b]).unwrap();
            }

            let mut backward = DisjointSet::new();
            let backward_refs: Vec<EClassRef> = (0..n).map(|_| backward.make_set(0)).collect();
            for &(a, b) in &pairs {
                backward.union(backward_refs[b], backward_refs[a]).unwrap();
            }

            for i in 0..n {
                for j in 0..n {
                    let forward_same = forward.find(forward_refs[i]).0 == forward.find(forward_refs[j]).0;
                    let backward_same = backward.find(backward_refs[i]).0 == backward.find(backward_refs[j]).0;
                    prop_assert_eq!(forward_same, backward_same, "i={}, j={}", i, j);
                }
            }
        }
    }
}
