use crate::command::{CommandQueue, UnionTarget};
use crate::pattern::{Pattern, PatternVar};
use crate::vm::{RootedMatch, Searcher};
use foresight_egraph::{Analysis, EClassCall, EClassRef, EGraph, MixedTree, NodeOp};
use foresight_slots::{Slot, SlotMap};
use std::collections::HashSet;

/// Turns a single match into the commands that realize a rewrite's
/// right-hand side. Appliers never touch the e-graph directly — see
/// [`crate::CommandQueue`].
pub trait Applier<N: NodeOp, A: Analysis<N>> {
    fn apply(&self, rooted_match: &RootedMatch, egraph: &EGraph<N, A>) -> CommandQueue<N>;
}

/// A named rewrite: a searcher producing candidate matches and an applier
/// turning each one into commands.
pub struct Rule<N: NodeOp, A: Analysis<N>> {
    pub name: String,
    pub searcher: Box<dyn Searcher<N, A>>,
    pub applier: Box<dyn Applier<N, A>>,
}

impl<N: NodeOp, A: Analysis<N>> Rule<N, A> {
    pub fn new(
        name: impl Into<String>,
        searcher: Box<dyn Searcher<N, A>>,
        applier: Box<dyn Applier<N, A>>,
    ) -> Rule<N, A> {
        Rule {
            name: name.into(),
            searcher,
            applier,
        }
    }

    /// Search, then apply every match, returning the combined command queue.
    /// A single saturation step runs every rule's commands through one
    /// `rebuild`, so rules see a consistent snapshot of the graph they
    /// matched against.
    pub fn fire(&self, egraph: &EGraph<N, A>) -> CommandQueue<N> {
        let matches = self.searcher.search(egraph);
        crate::trace!("rule {}: {} matches", self.name, matches.len());
        let mut queue = CommandQueue::new();
        for m in &matches {
            queue.append(self.applier.apply(m, egraph));
        }
        queue
    }
}

/// Runs several searchers and concatenates their matches. Used to fire an
/// entire rule set's searchers in one sweep over the e-graph, or to combine
/// a disjunction of patterns into one logical searcher.
pub struct AggregateSearcher<N: NodeOp, A: Analysis<N>> {
    searchers: Vec<Box<dyn Searcher<N, A>>>,
}

impl<N: NodeOp, A: Analysis<N>> AggregateSearcher<N, A> {
    pub fn new(searchers: Vec<Box<dyn Searcher<N, A>>>) -> Self {
        AggregateSearcher { searchers }
    }
}

impl<N: NodeOp, A: Analysis<N>> Searcher<N, A> for AggregateSearcher<N, A> {
    fn search(&self, egraph: &EGraph<N, A>) -> Vec<RootedMatch> {
        self.searchers.iter().flat_map(|s| s.search(egraph)).collect()
    }
}

/// Wraps a searcher, discarding matches a predicate rejects. Used to express
/// a rule's applicability side-condition (the pattern matched, but a
/// analysis-derived fact about the bound e-classes doesn't hold).
pub struct FilteredSearcher<N: NodeOp, A: Analysis<N>> {
    inner: Box<dyn Searcher<N, A>>,
    predicate: Box<dyn Fn(&RootedMatch, &EGraph<N, A>) -> bool>,
}

impl<N: NodeOp, A: Analysis<N>> FilteredSearcher<N, A> {
    pub fn new(
        inner: Box<dyn Searcher<N, A>>,
        predicate: Box<dyn Fn(&RootedMatch, &EGraph<N, A>) -> bool>,
    ) -> Self {
        FilteredSearcher { inner, predicate }
    }
}

impl<N: NodeOp, A: Analysis<N>> Searcher<N, A> for FilteredSearcher<N, A> {
    fn search(&self, egraph: &EGraph<N, A>) -> Vec<RootedMatch> {
        self.inner
            .search(egraph)
            .into_iter()
            .filter(|m| (self.predicate)(m, egraph))
            .collect()
    }
}

/// Wraps an applier, only running it when a predicate over the match holds;
/// otherwise contributes no commands. Distinct from [`FilteredSearcher`]
/// because the side-condition may depend on what the applier would produce,
/// not just on the match itself.
pub struct FilteredApplier<N: NodeOp, A: Analysis<N>> {
    inner: Box<dyn Applier<N, A>>,
    predicate: Box<dyn Fn(&RootedMatch, &EGraph<N, A>) -> bool>,
}

impl<N: NodeOp, A: Analysis<N>> FilteredApplier<N, A> {
    pub fn new(
        inner: Box<dyn Applier<N, A>>,
        predicate: Box<dyn Fn(&RootedMatch, &EGraph<N, A>) -> bool>,
    ) -> Self {
        FilteredApplier { inner, predicate }
    }
}

impl<N: NodeOp, A: Analysis<N>> Applier<N, A> for FilteredApplier<N, A> {
    fn apply(&self, rooted_match: &RootedMatch, egraph: &EGraph<N, A>) -> CommandQueue<N> {
        if (self.predicate)(rooted_match, egraph) {
            self.inner.apply(rooted_match, egraph)
        } else {
            CommandQueue::new()
        }
    }
}

/// The common case: instantiate a right-hand-side pattern against a match's
/// bindings and union the result with the match's root.
pub struct PatternApplier<N> {
    rhs: Pattern<N>,
}

impl<N: NodeOp> PatternApplier<N> {
    pub fn new(rhs: Pattern<N>) -> Self {
        PatternApplier { rhs }
    }
}

impl<N: NodeOp, A: Analysis<N>> Applier<N, A> for PatternApplier<N> {
    fn apply(&self, rooted_match: &RootedMatch, _egraph: &EGraph<N, A>) -> CommandQueue<N> {
        let tree = self
            .rhs
            .map_atoms(&mut |var| rooted_match.pattern_match.bindings[var].clone());
        let mut queue = CommandQueue::new();
        queue.push_union(rooted_match.root, UnionTarget::AddResult(tree));
        queue
    }
}

/// Like [`PatternApplier`], but also renames the instantiated tree's own
/// `defs`/`uses` occurrences through the match's recovered slot
/// substitution, and threads a capture-avoiding substitution through one
/// bound pattern variable before it's spliced into the right-hand side.
///
/// `substitute(var, slot, replacement)`: a representative tree is extracted
/// for `var`'s binding, every bare occurrence of `slot` within it (a leaf
/// node whose entire content is that one `uses` slot — the shape a free
/// variable reference takes once its binder is out of scope) is rewritten
/// to `replacement`'s binding, and the result is threaded back as `var`'s
/// contribution to `rhs` instead of `var`'s raw match binding. This is the
/// classic beta-reduction case: `(lam x body) arg -> body[x := arg]`, where
/// `var` is `body`, `slot` is `x`, and `replacement` is `arg`.
pub struct SubstituteApplier<N> {
    rhs: Pattern<N>,
    var: PatternVar,
    slot: Slot,
    replacement: PatternVar,
}

impl<N: NodeOp> SubstituteApplier<N> {
    pub fn new(rhs: Pattern<N>, var: PatternVar, slot: Slot, replacement: PatternVar) -> Self {
        SubstituteApplier {
            rhs,
            var,
            slot,
            replacement,
        }
    }
}

impl<N: NodeOp, A: Analysis<N>> Applier<N, A> for SubstituteApplier<N> {
    fn apply(&self, rooted_match: &RootedMatch, egraph: &EGraph<N, A>) -> CommandQueue<N> {
        let bindings = &rooted_match.pattern_match.bindings;
        let (Some(body), Some(replacement)) =
            (bindings.get(&self.var), bindings.get(&self.replacement))
        else {
            return CommandQueue::new();
        };
        let Some(representative) = representative_tree(egraph, body) else {
            return CommandQueue::new();
        };
        // `self.slot` is the pattern's own placeholder for the binder;
        // `slot_subst` recovers the concrete slot the match actually bound
        // it to, which is what the representative tree's leaves mention.
        let concrete_slot = rooted_match.pattern_match.slot_subst.apply(self.slot);
        let substituted = substitute_slot(&representative, concrete_slot, replacement);

        let renamed = rename_pattern(&self.rhs, &rooted_match.pattern_match.slot_subst);
        let tree = renamed.splice_atoms(&mut |var| {
            if *var == self.var {
                substituted.clone()
            } else {
                MixedTree::Atom(bindings[var].clone())
            }
        });
        let mut queue = CommandQueue::new();
        queue.push_union(rooted_match.root, UnionTarget::AddResult(tree));
        queue
    }
}

/// Instantiates a right-hand side that introduces a binder the left-hand
/// side never matched on — one fresh concrete slot per firing, standing in
/// for a `placeholder` the pattern author wrote into `rhs` but that no
/// searcher ever binds.
///
/// Eta-expansion is the motivating case: `f -> lam(x, app(f, var(x)))` needs
/// an `x` that is not part of the match at all, only freshly minted for each
/// instance of the rewrite, the same way [`foresight_egraph::Slot::fresh`]
/// mints one for a node's own binders during [`foresight_egraph::ENode::instantiate`].
/// Reusing `PatternApplier`'s plain `map_atoms` would require the searcher to
/// have bound `x` to something, which defeats the point — there is nothing
/// on the left-hand side to bind it to.
pub struct FreshBinderApplier<N> {
    rhs: Pattern<N>,
    placeholder: Slot,
}

impl<N: NodeOp> FreshBinderApplier<N> {
    pub fn new(rhs: Pattern<N>, placeholder: Slot) -> Self {
        FreshBinderApplier { rhs, placeholder }
    }
}

impl<N: NodeOp, A: Analysis<N>> Applier<N, A> for FreshBinderApplier<N> {
    fn apply(&self, rooted_match: &RootedMatch, _egraph: &EGraph<N, A>) -> CommandQueue<N> {
        let mut renaming = SlotMap::new();
        renaming
            .insert(self.placeholder, Slot::fresh())
            .expect("a single fresh key cannot collide with an empty map");
        let renamed = rename_pattern(&self.rhs, &renaming);
        let renamed = rename_pattern(&renamed, &rooted_match.pattern_match.slot_subst);
        let tree = renamed
            .map_atoms(&mut |var| rooted_match.pattern_match.bindings[var].clone());
        let mut queue = CommandQueue::new();
        queue.push_union(rooted_match.root, UnionTarget::AddResult(tree));
        queue
    }
}

fn rename_pattern<N: Clone>(
    pattern: &Pattern<N>,
    renaming: &foresight_slots::SlotMap,
) -> Pattern<N> {
    match pattern {
        MixedTree::Atom(var) => MixedTree::Atom(*var),
        MixedTree::Node {
            op,
            defs,
            uses,
            children,
        } => MixedTree::Node {
            op: op.clone(),
            defs: defs.iter().map(|&s| renaming.apply(s)).collect(),
            uses: uses.iter().map(|&s| renaming.apply(s)).collect(),
            children: children.iter().map(|c| rename_pattern(c, renaming)).collect(),
        },
    }
}

/// Picks one member node per class, recursively, fully resolving every
/// argument through [`foresight_egraph::ENode::instantiate`] so the result
/// is a concrete tree with no hidden slot occurrences left inside an
/// unexpanded call's substitution. `None` on a cycle (every path to a
/// representative for some reachable class runs back through itself) or a
/// class that no longer exists.
fn representative_tree<N: NodeOp, A: Analysis<N>>(
    egraph: &EGraph<N, A>,
    call: &EClassCall,
) -> Option<MixedTree<N, EClassCall>> {
    let mut visiting = HashSet::new();
    representative_tree_rec(egraph, call, &mut visiting)
}

fn representative_tree_rec<N: NodeOp, A: Analysis<N>>(
    egraph: &EGraph<N, A>,
    call: &EClassCall,
    visiting: &mut HashSet<EClassRef>,
) -> Option<MixedTree<N, EClassCall>> {
    let canon = egraph.canonicalize_call(call).ok()?;
    if !visiting.insert(canon.class) {
        return None;
    }
    let member = egraph.nodes(canon.class).ok()?.into_iter().next()?;
    let concrete = member.instantiate(&canon);

    let mut children = Vec::with_capacity(concrete.args.len());
    for arg in &concrete.args {
        children.push(representative_tree_rec(egraph, arg, visiting)?);
    }
    visiting.remove(&canon.class);
    Some(MixedTree::Node {
        op: concrete.op,
        defs: concrete.defs,
        uses: concrete.uses,
        children,
    })
}

/// Rewrites every bare occurrence of `slot` in `tree` — a leaf node (no
/// `defs`, no children) whose entire `uses` list is exactly `[slot]` — into
/// `replacement`. Occurrences of `slot` mixed in with other content at a
/// node are structural, not a free variable reference on their own, and are
/// left alone; only the bare-leaf shape is a generic, op-agnostic
/// substitution point.
fn substitute_slot<N: Clone>(
    tree: &MixedTree<N, EClassCall>,
    slot: Slot,
    replacement: &EClassCall,
) -> MixedTree<N, EClassCall> {
    match tree {
        MixedTree::Atom(call) => MixedTree::Atom(call.clone()),
        MixedTree::Node {
            op,
            defs,
            uses,
            children,
        } => {
            if defs.is_empty() && children.is_empty() && uses.len() == 1 && uses[0] == slot {
                return MixedTree::Atom(replacement.clone());
            }
            MixedTree::Node {
                op: op.clone(),
                defs: defs.clone(),
                uses: uses.clone(),
                children: children
                    .iter()
                    .map(|c| substitute_slot(c, slot, replacement))
                    .collect(),
            }
        }
    }
}
