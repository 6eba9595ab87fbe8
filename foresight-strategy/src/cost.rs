use foresight_egraph::{Analysis, EClassCall, EClassRef, EGraph, EGraphError, MixedTree, NodeOp};
use foresight_slots::Slot;
use std::collections::{HashMap, HashSet};
use std::convert::Infallible;

/// Maps an operator application, given the costs already chosen for its
/// children, to a cost in a totally ordered scale `C`. Grounded on
/// `cranelift-codegen/src/egraph/cost.rs`'s fixed opcode cost table,
/// generalized to a pluggable function instead of one hardwired CLIF
/// instruction set.
pub trait CostFunction<N, C> {
    fn cost(&self, op: &N, defs: &[Slot], uses: &[Slot], children: &[C]) -> C;
}

/// Tracks, per e-class, the cost of the cheapest node known to produce it.
/// `join` keeps the smaller of the two pre-union costs (a class that turns
/// out congruent to a cheaper one inherits the cheaper cost); `rename`
/// leaves the cost untouched since cost never depends on which concrete
/// slots a call happens to use.
#[derive(Clone)]
pub struct ExtractionAnalysis<F> {
    cost_fn: F,
}

impl<F> ExtractionAnalysis<F> {
    pub fn new(cost_fn: F) -> ExtractionAnalysis<F> {
        ExtractionAnalysis { cost_fn }
    }

    /// The cheapest known cost for `class`, as maintained by this analysis.
    pub fn smallest<N: NodeOp, C: Ord + Clone>(
        &self,
        egraph: &EGraph<N, ExtractionAnalysis<F>>,
        class: EClassRef,
    ) -> Result<C, EGraphError>
    where
        F: CostFunction<N, C>,
    {
        egraph.analysis_value(class)
    }
}

impl<N: NodeOp, C: Ord + Clone, F: CostFunction<N, C> + Clone> Analysis<N> for ExtractionAnalysis<F> {
    type Value = C;

    fn name(&self) -> &str {
        "extraction-cost"
    }

    fn make(&self, op: &N, defs: &[Slot], uses: &[Slot], args: &[C]) -> C {
        self.cost_fn.cost(op, defs, uses, args)
    }

    fn join(&self, a: &C, b: &C) -> C {
        if a <= b {
            a.clone()
        } else {
            b.clone()
        }
    }

    fn rename(&self, value: &C, _renaming: &foresight_slots::SlotMap) -> C {
        value.clone()
    }
}

/// A fully concrete tree: no open atoms, since `Infallible` can never be
/// constructed. The result of [`extract`] — as opposed to
/// [`foresight_egraph::MixedTree`] with `EClassCall` atoms, which still
/// bottoms out in e-graph references.
pub type ExtractedTree<N> = MixedTree<N, Infallible>;

/// Finds the minimum-cost representative of `root` under `cost_fn` and
/// reconstructs it as a concrete tree. `None` if `root` doesn't exist, or if
/// every path to a representative runs through a cycle (every member node
/// of some reachable class recursively depends on itself).
pub fn extract<N: NodeOp, A: Analysis<N>, C: Ord + Clone, F: CostFunction<N, C>>(
    egraph: &EGraph<N, A>,
    root: EClassRef,
    cost_fn: &F,
) -> Option<ExtractedTree<N>> {
    let mut memo: HashMap<EClassRef, Option<(C, foresight_egraph::ENode<N>)>> = HashMap::new();
    let mut visiting: HashSet<EClassRef> = HashSet::new();
    best_for_class(egraph, root, cost_fn, &mut memo, &mut visiting)?;

    let canon = egraph.canonicalize_ref(root).ok()?;
    let signature = egraph.signature(canon).ok()?;
    let root_call = EClassCall::identity(canon, &signature);
    build_tree(egraph, &root_call, &memo)
}

fn best_for_class<N: NodeOp, A: Analysis<N>, C: Ord + Clone, F: CostFunction<N, C>>(
    egraph: &EGraph<N, A>,
    class: EClassRef,
    cost_fn: &F,
    memo: &mut HashMap<EClassRef, Option<(C, foresight_egraph::ENode<N>)>>,
    visiting: &mut HashSet<EClassRef>,
) -> Option<(C, foresight_egraph::ENode<N>)> {
    let canon = egraph.canonicalize_ref(class).ok()?;
    if let Some(cached) = memo.get(&canon) {
        return cached.clone();
    }
    if !visiting.insert(canon) {
        return None;
    }

    let nodes = egraph.nodes(canon).ok().unwrap_or_default();
    let mut best: Option<(C, foresight_egraph::ENode<N>)> = None;
    for node in nodes {
        let mut children_costs = Vec::with_capacity(node.args.len());
        let mut all_found = true;
        for arg in &node.args {
            match best_for_class(egraph, arg.class, cost_fn, memo, visiting) {
                Some((c, _)) => children_costs.push(c),
                None => {
                    all_found = false;
                    break;
                }
            }
        }
        if !all_found {
            continue;
        }
        let cost = cost_fn.cost(&node.op, &node.defs, &node.uses, &children_costs);
        if best.as_ref().map_or(true, |(best_cost, _)| cost < *best_cost) {
            best = Some((cost, node));
        }
    }

    visiting.remove(&canon);
    memo.insert(canon, best.clone());
    best
}

fn build_tree<N: NodeOp, A: Analysis<N>, C>(
    egraph: &EGraph<N, A>,
    call: &EClassCall,
    memo: &HashMap<EClassRef, Option<(C, foresight_egraph::ENode<N>)>>,
) -> Option<ExtractedTree<N>> {
    let canon_call = egraph.canonicalize_call(call).ok()?;
    let (_, node) = memo.get(&canon_call.class)?.clone()?;
    let concrete = node.instantiate(&canon_call);

    let mut children = Vec::with_capacity(concrete.args.len());
    for arg_call in &concrete.args {
        children.push(build_tree(egraph, arg_call, memo)?);
    }
    Some(MixedTree::Node {
        op: concrete.op,
        defs: concrete.defs,
        uses: concrete.uses,
        children,
    })
}
