use crate::union_find::DisjointSet;
use crate::{Analysis, EClassCall, EClassRef, EGraphError, ENode, MixedTree, NodeOp, ShapeCall};
use foresight_slots::{Slot, SlotMap, SlotSet};
use smallvec::SmallVec;
use std::collections::{BTreeSet, HashMap, VecDeque};

/// Split a shape's numeric slots at `defs.len()`: `to_shape_call` always
/// numbers `defs` first, so every defs-derived index occupies the
/// contiguous low range and the free parameters (`uses` plus whatever
/// escapes from args) are exactly the contiguous tail. Returns the class's
/// arity (the free-slot count) and the caller-facing subst, renumbered so
/// the class's own parameters start back at `0`.
fn free_subst<N: NodeOp>(shape_call: &ShapeCall<N>) -> (u32, SlotMap) {
    let defs_len = shape_call.shape.defs.len() as u32;
    let total = shape_call.slots.len() as u32;
    let mut subst = SlotMap::new();
    for i in defs_len..total {
        let orig = shape_call.slots.apply(Slot::numeric(i));
        subst
            .insert(Slot::numeric(i - defs_len), orig)
            .expect("shifted numeric slots are distinct");
    }
    (total - defs_len, subst)
}

/// The arity at which a class's member-node list stops living inline in the
/// entry and spills to the heap. Most e-classes end up with a handful of
/// congruent members, matching the same small-vector tradeoff
/// `cranelift-codegen`'s traversal stacks make.
type NodeList<N> = SmallVec<[ENode<N>; 4]>;

#[derive(Clone)]
struct EClassEntry<N, V> {
    nodes: NodeList<N>,
    signature: SlotSet,
    parents: BTreeSet<EClassRef>,
    value: V,
}

/// A slotted, hash-consed e-graph over opaque operator type `N`, optionally
/// carrying one [`Analysis`] (compose [`crate::PairAnalysis`] for more than
/// one).
///
/// Every e-class is stored exactly once, in a canonical form where its free
/// slots are numeric parameters `0..arity`; every reference to it
/// ([`EClassCall`]) carries the substitution projecting that canonical form
/// onto the caller's concrete slots. Unions are deferred: `union` only
/// records a pending pair, and `rebuild` is the only operation that walks
/// the worklist, merges classes, and restores congruence.
///
/// This type exposes the consuming ("immutable") API: every mutator takes
/// `self` by value and hands it back alongside the result, so an e-graph
/// reads like a persistent value at call sites even though the underlying
/// representation is mutated in place. [`MutEGraph`] is the same engine
/// exposed through `&mut self` for hot loops that don't need that
/// threading.
#[derive(Clone)]
pub struct EGraph<N: NodeOp, A: Analysis<N> = crate::NoAnalysis> {
    uf: DisjointSet,
    hashcons: HashMap<ENode<N>, EClassRef>,
    classes: Vec<EClassEntry<N, A::Value>>,
    pending: Vec<(EClassRef, EClassRef)>,
    analysis: A,
}

impl<N: NodeOp> EGraph<N, crate::NoAnalysis> {
    pub fn empty() -> Self {
        EGraph::with_analysis(crate::NoAnalysis)
    }
}

impl<N: NodeOp, A: Analysis<N>> EGraph<N, A> {
    pub fn with_analysis(analysis: A) -> Self {
        EGraph {
            uf: DisjointSet::new(),
            hashcons: HashMap::new(),
            classes: Vec::new(),
            pending: Vec::new(),
            analysis,
        }
    }

    pub fn with_capacity(cap: usize, analysis: A) -> Self {
        EGraph {
            uf: DisjointSet::with_capacity(cap),
            hashcons: HashMap::with_capacity(cap),
            classes: Vec::with_capacity(cap),
            pending: Vec::new(),
            analysis,
        }
    }

    // ---- canonicalization -------------------------------------------------

    fn canonicalize_call_unchecked(&self, call: &EClassCall) -> EClassCall {
        let (canon, renaming) = self.uf.find(call.class);
        call.compose_callee(&renaming).with_class(canon)
    }

    fn canonicalize_node_args_unchecked(&self, node: &ENode<N>) -> ENode<N> {
        let args = node
            .args
            .iter()
            .map(|c| self.canonicalize_call_unchecked(c))
            .collect();
        ENode {
            op: node.op.clone(),
            defs: node.defs.clone(),
            uses: node.uses.clone(),
            args,
        }
    }

    pub fn try_canonicalize(&self, r: EClassRef) -> Option<EClassRef> {
        if self.uf.is_live(r) {
            Some(self.uf.find(r).0)
        } else {
            None
        }
    }

    pub fn canonicalize_ref(&self, r: EClassRef) -> Result<EClassRef, EGraphError> {
        self.try_canonicalize(r).ok_or(EGraphError::NoSuchClass(r))
    }

    pub fn canonicalize_call(&self, call: &EClassCall) -> Result<EClassCall, EGraphError> {
        if !self.uf.is_live(call.class) {
            return Err(EGraphError::NoSuchClass(call.class));
        }
        Ok(self.canonicalize_call_unchecked(call))
    }

    pub fn canonicalize_node(&self, node: &ENode<N>) -> Result<ENode<N>, EGraphError> {
        for call in &node.args {
            if !self.uf.is_live(call.class) {
                return Err(EGraphError::NoSuchClass(call.class));
            }
        }
        Ok(self.canonicalize_node_args_unchecked(node))
    }

    pub fn area_same(&self, a: EClassRef, b: EClassRef) -> Result<bool, EGraphError> {
        Ok(self.canonicalize_ref(a)? == self.canonicalize_ref(b)?)
    }

    pub fn contains_ref(&self, r: EClassRef) -> bool {
        self.uf.is_live(r)
    }

    pub fn contains_node(&self, node: &ENode<N>) -> bool {
        self.find_node(node).is_some()
    }

    /// Look up a node without adding it. `None` if no congruent node has
    /// been added.
    pub fn find_node(&self, node: &ENode<N>) -> Option<EClassCall> {
        let canon = self.canonicalize_node_args_unchecked(node);
        let shape_call = canon.to_shape_call();
        self.hashcons.get(&shape_call.shape).map(|&r| {
            let (_, subst) = free_subst(&shape_call);
            EClassCall::new(r, subst)
        })
    }

    // ---- mutation (hot-loop, `&mut self`) ---------------------------------

    /// Add a node, returning the call that refers to it (a freshly-created
    /// class if no congruent node existed, otherwise the existing one).
    pub fn add_enode(&mut self, node: ENode<N>) -> EClassCall {
        let canon = self.canonicalize_node_args_unchecked(&node);
        let shape_call = canon.to_shape_call();
        let (arity, subst) = free_subst(&shape_call);
        if let Some(&existing) = self.hashcons.get(&shape_call.shape) {
            return EClassCall::new(existing, subst);
        }

        let arg_refs: Vec<EClassRef> = shape_call.shape.args.iter().map(|c| c.class).collect();
        let class_ref = self.uf.make_set(arity);
        debug_assert_eq!(class_ref.index() as usize, self.classes.len());

        let arg_values: Vec<A::Value> = arg_refs
            .iter()
            .map(|&r| self.classes[r.index() as usize].value.clone())
            .collect();
        let value = self.analysis.make(
            &shape_call.shape.op,
            &shape_call.shape.defs,
            &shape_call.shape.uses,
            &arg_values,
        );

        let signature = SlotSet::from_iter((0..arity).map(Slot::numeric));
        let mut nodes = NodeList::new();
        nodes.push(shape_call.shape.clone());
        self.classes.push(EClassEntry {
            nodes,
            signature,
            parents: BTreeSet::new(),
            value,
        });

        for argref in arg_refs {
            self.classes[argref.index() as usize]
                .parents
                .insert(class_ref);
        }
        self.hashcons.insert(shape_call.shape, class_ref);
        crate::trace!("add: new class {:?}", class_ref);
        EClassCall::new(class_ref, subst)
    }

    /// Add a tree bottom-up, interning every subtree along the way.
    pub fn add_tree_mut(&mut self, tree: &MixedTree<N, EClassCall>) -> EClassCall {
        match tree {
            MixedTree::Atom(call) => self.canonicalize_call_unchecked(call),
            MixedTree::Node {
                op,
                defs,
                uses,
                children,
            } => {
                let args: Vec<EClassCall> = children.iter().map(|c| self.add_tree_mut(c)).collect();
                let node = ENode {
                    op: op.clone(),
                    defs: defs.clone(),
                    uses: uses.clone(),
                    args,
                };
                self.add_enode(node)
            }
        }
    }

    /// Record a pending union of `a` and `b`. Has no visible effect on
    /// `find`/`canonicalize` until `rebuild` runs.
    pub fn union_mut(&mut self, a: EClassRef, b: EClassRef) {
        self.pending.push((a, b));
    }

    pub fn requires_rebuild(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Drain the pending-union worklist to a fixpoint, restoring congruence.
    /// Returns the groups of classes that became newly equivalent in this
    /// pass (singletons excluded).
    pub fn rebuild_mut(&mut self) -> Vec<Vec<EClassRef>> {
        let mut worklist: VecDeque<(EClassRef, EClassRef)> =
            std::mem::take(&mut self.pending).into_iter().collect();
        let mut groups: HashMap<EClassRef, Vec<EClassRef>> = HashMap::new();

        while let Some((a, b)) = worklist.pop_front() {
            let (ra, _) = self.uf.find(a);
            let (rb, _) = self.uf.find(b);
            if ra == rb {
                continue;
            }
            let (survivor, loser, renaming) = self.uf.union(ra, rb).unwrap_or_else(|e| {
                panic!(
                    "union requires classes of equal arity once canonicalized: {e}"
                )
            });
            crate::trace!("rebuild: union {:?} <- {:?}", survivor, loser);

            let mut loser_group = groups.remove(&loser).unwrap_or_else(|| vec![loser]);
            groups
                .entry(survivor)
                .or_insert_with(|| vec![survivor])
                .append(&mut loser_group);

            // Move the loser's member nodes into the survivor, rewritten
            // through the merge renaming, re-hashconsing each one.
            let loser_nodes = std::mem::take(&mut self.classes[loser.index() as usize].nodes);
            for node in loser_nodes {
                let rewritten = node.rename(&renaming);
                let rewritten = self.canonicalize_node_args_unchecked(&rewritten);
                self.hashcons.remove(&node);
                match self.hashcons.get(&rewritten) {
                    Some(&existing) if existing != survivor => {
                        worklist.push_back((survivor, existing));
                    }
                    _ => {
                        self.hashcons.insert(rewritten.clone(), survivor);
                    }
                }
                self.classes[survivor.index() as usize].nodes.push(rewritten);
            }

            // Merge parent sets, then re-canonicalize every parent's member
            // nodes: one of their arguments just changed class, so they may
            // now be congruent to something that wasn't before (upward
            // merge).
            let loser_parents: Vec<EClassRef> =
                std::mem::take(&mut self.classes[loser.index() as usize].parents)
                    .into_iter()
                    .collect();
            for &p in &loser_parents {
                self.classes[survivor.index() as usize].parents.insert(p);
            }
            for raw_parent in loser_parents {
                let (parent, _) = self.uf.find(raw_parent);
                self.recanonicalize_class_nodes(parent, &mut worklist);
            }

            // Analysis: join the two pre-union values, renaming the loser's
            // through the merge renaming first.
            let loser_value = self.classes[loser.index() as usize].value.clone();
            let survivor_value = self.classes[survivor.index() as usize].value.clone();
            let loser_value = self.analysis.rename(&loser_value, &renaming);
            self.classes[survivor.index() as usize].value =
                self.analysis.join(&survivor_value, &loser_value);

            self.classes[loser.index() as usize].signature = SlotSet::empty();
        }

        groups.into_values().filter(|g| g.len() > 1).collect()
    }

    fn recanonicalize_class_nodes(
        &mut self,
        class_ref: EClassRef,
        worklist: &mut VecDeque<(EClassRef, EClassRef)>,
    ) {
        let nodes = std::mem::take(&mut self.classes[class_ref.index() as usize].nodes);
        for node in nodes {
            let rewritten = self.canonicalize_node_args_unchecked(&node);
            if rewritten != node {
                self.hashcons.remove(&node);
            }
            match self.hashcons.get(&rewritten) {
                Some(&existing) if existing != class_ref => {
                    worklist.push_back((class_ref, existing));
                }
                _ => {
                    self.hashcons.insert(rewritten.clone(), class_ref);
                }
            }
            self.classes[class_ref.index() as usize].nodes.push(rewritten);
        }
    }

    // ---- queries ------------------------------------------------------

    /// Canonical class refs currently live in the graph (absorbed classes
    /// excluded).
    pub fn classes(&self) -> impl Iterator<Item = EClassRef> + '_ {
        (0..self.uf.len() as u32)
            .map(EClassRef::new)
            .filter(move |&r| self.uf.find(r).0 == r)
    }

    pub fn nodes(&self, r: EClassRef) -> Result<Vec<ENode<N>>, EGraphError> {
        let canon = self.canonicalize_ref(r)?;
        Ok(self.classes[canon.index() as usize].nodes.to_vec())
    }

    pub fn analysis_value(&self, r: EClassRef) -> Result<A::Value, EGraphError> {
        let canon = self.canonicalize_ref(r)?;
        Ok(self.classes[canon.index() as usize].value.clone())
    }

    pub fn analysis(&self) -> &A {
        &self.analysis
    }

    /// The class's numeric slot-parameter signature (`{0, .., arity-1}` as
    /// numeric slots).
    pub fn signature(&self, r: EClassRef) -> Result<SlotSet, EGraphError> {
        let canon = self.canonicalize_ref(r)?;
        Ok(self.classes[canon.index() as usize].signature.clone())
    }

    /// Walks every currently-live class and checks the core structural
    /// invariants: each member node canonicalizes to itself, the hash-cons
    /// table agrees with class membership, and parent sets are consistent.
    /// Intended for tests and debug assertions, not hot-path use.
    pub fn check_invariants(&self) -> Result<(), String> {
        for r in self.classes() {
            let entry = &self.classes[r.index() as usize];
            for node in entry.nodes.iter() {
                let canon = self.canonicalize_node_args_unchecked(node);
                if &canon != node {
                    return Err(format!(
                        "class {r:?} contains non-canonical member {node:?} (canonicalizes to {canon:?})"
                    ));
                }
                match self.hashcons.get(node) {
                    Some(&owner) if owner == r => {}
                    Some(&owner) => {
                        return Err(format!(
                            "hash-cons entry for {node:?} points at {owner:?}, not owning class {r:?}"
                        ))
                    }
                    None => {
                        return Err(format!("member node {node:?} of {r:?} missing from hash-cons table"))
                    }
                }
                for arg in &node.args {
                    let parent_set = &self.classes[arg.class.index() as usize].parents;
                    if !parent_set.contains(&r) {
                        return Err(format!(
                            "{:?} is a child of {r:?} but doesn't list it as a parent",
                            arg.class
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    // ---- by-value ("immutable presentation") convenience wrappers --------

    pub fn add(mut self, node: ENode<N>) -> (EClassCall, Self) {
        let call = self.add_enode(node);
        (call, self)
    }

    pub fn add_tree(mut self, tree: &MixedTree<N, EClassCall>) -> (EClassCall, Self) {
        let call = self.add_tree_mut(tree);
        (call, self)
    }

    pub fn union(self, a: EClassRef, b: EClassRef) -> EGraphWithPendingUnions<N, A> {
        EGraphWithPendingUnions(self).union(a, b)
    }
}

/// The result of [`EGraph::union`]: a graph with at least one union not yet
/// folded into the hash-cons table. Queries still reflect the pre-union
/// state; call [`Self::rebuilt`] (or [`Self::rebuilt_with_report`]) to
/// restore congruence.
pub struct EGraphWithPendingUnions<N: NodeOp, A: Analysis<N>>(EGraph<N, A>);

impl<N: NodeOp, A: Analysis<N>> EGraphWithPendingUnions<N, A> {
    pub fn union(mut self, a: EClassRef, b: EClassRef) -> Self {
        self.0.pending.push((a, b));
        self
    }

    pub fn requires_rebuild(&self) -> bool {
        self.0.requires_rebuild()
    }

    pub fn rebuilt(mut self) -> EGraph<N, A> {
        self.0.rebuild_mut();
        self.0
    }

    /// Like [`Self::rebuilt`], but also returns the groups of classes that
    /// became newly equivalent in this pass.
    pub fn rebuilt_with_report(mut self) -> (EGraph<N, A>, Vec<Vec<EClassRef>>) {
        let groups = self.0.rebuild_mut();
        (self.0, groups)
    }
}

impl<N: NodeOp, A: Analysis<N>> std::ops::Deref for EGraphWithPendingUnions<N, A> {
    type Target = EGraph<N, A>;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// The mutable ("freezable") presentation of the same engine: every
/// operation takes `&mut self` directly, with no value threading. Useful in
/// hot loops (rule application, strategy combinators) that would otherwise
/// pay for moving the graph in and out of every call. [`Self::freeze`]
/// produces an [`EGraph`] snapshot when a read-only, shareable view is
/// needed (e.g. for parallel search over a fixed graph state).
pub struct MutEGraph<N: NodeOp, A: Analysis<N> = crate::NoAnalysis>(EGraph<N, A>);

impl<N: NodeOp> MutEGraph<N, crate::NoAnalysis> {
    pub fn empty() -> Self {
        MutEGraph(EGraph::empty())
    }
}

impl<N: NodeOp, A: Analysis<N>> MutEGraph<N, A> {
    pub fn new(analysis: A) -> Self {
        MutEGraph(EGraph::with_analysis(analysis))
    }

    /// Resumes mutable operation on a previously-frozen snapshot, the
    /// inverse of [`Self::into_egraph`].
    pub fn from_egraph(egraph: EGraph<N, A>) -> Self {
        MutEGraph(egraph)
    }

    pub fn add(&mut self, node: ENode<N>) -> EClassCall {
        self.0.add_enode(node)
    }

    pub fn add_tree(&mut self, tree: &MixedTree<N, EClassCall>) -> EClassCall {
        self.0.add_tree_mut(tree)
    }

    pub fn union(&mut self, a: EClassRef, b: EClassRef) {
        self.0.union_mut(a, b);
    }

    pub fn rebuild(&mut self) -> Vec<Vec<EClassRef>> {
        self.0.rebuild_mut()
    }

    pub fn freeze(&self) -> EGraph<N, A> {
        self.0.clone()
    }

    pub fn into_egraph(self) -> EGraph<N, A> {
        self.0
    }

    /// Direct access to the underlying core, for callers (e.g. a command
    /// queue) that drive `&mut EGraph` directly instead of through this
    /// wrapper's method set.
    pub fn core_mut(&mut self) -> &mut EGraph<N, A> {
        &mut self.0
    }
}

impl<N: NodeOp, A: Analysis<N>> std::ops::Deref for MutEGraph<N, A> {
    type Target = EGraph<N, A>;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
