use crate::parallel::ParallelMap;
use crate::strategy::Strategy;
use foresight_egraph::{
    Analysis, EClassCall, EClassRef, EGraph, ENode, MutEGraph, NodeOp, PairAnalysis,
};
use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;

/// Rebuilds `source` under a different analysis by replaying one member node
/// of every live class, composing child substitutions along the way.
/// Needed because the analysis type is baked into `EGraph`'s type
/// parameter rather than attached through a runtime registry, so moving a
/// graph from one analysis to another means reconstructing it.
///
/// Only handles acyclic term structure — a class whose chosen member node's
/// arguments never recurse back through the class itself. Returns `None` if
/// a cycle is hit; `addAnalysis`/`closeMetadata`/`dropData` inherit that
/// limitation from this helper.
pub fn reanalyze<N: NodeOp, A: Analysis<N>, B: Analysis<N>>(
    source: &EGraph<N, A>,
    new_analysis: B,
) -> Option<EGraph<N, B>> {
    let mut target = MutEGraph::new(new_analysis);
    let mut memo: HashMap<EClassRef, EClassCall> = HashMap::new();
    let mut visiting: HashSet<EClassRef> = HashSet::new();
    for class in source.classes() {
        copy_class(source, &mut target, class, &mut memo, &mut visiting)?;
    }
    target.rebuild();
    Some(target.into_egraph())
}

fn copy_class<N: NodeOp, A: Analysis<N>, B: Analysis<N>>(
    source: &EGraph<N, A>,
    target: &mut MutEGraph<N, B>,
    class: EClassRef,
    memo: &mut HashMap<EClassRef, EClassCall>,
    visiting: &mut HashSet<EClassRef>,
) -> Option<EClassCall> {
    let canon = source.canonicalize_ref(class).ok()?;
    if let Some(call) = memo.get(&canon) {
        return Some(call.clone());
    }
    if !visiting.insert(canon) {
        return None;
    }

    let node = source.nodes(canon).ok()?.into_iter().next()?;
    let mut new_args = Vec::with_capacity(node.args.len());
    for arg in &node.args {
        let resolved = copy_class(source, target, arg.class, memo, visiting)?;
        new_args.push(EClassCall::new(resolved.class, arg.subst.clone()));
    }
    let new_node = ENode::new(node.op.clone(), node.defs.clone(), node.uses.clone(), new_args).ok()?;
    let call = target.add(new_node);

    visiting.remove(&canon);
    memo.insert(canon, call.clone());
    Some(call)
}

/// Runs `inner` against the `A`-only projection of a graph that also carries
/// a `B` analysis, then reattaches `B` to whatever `inner` returns. The
/// `addAnalysis` combinator: a rule set written against a plain e-graph
/// keeps working once a caller starts tracking an extra analysis alongside
/// it.
pub struct AddAnalysis<N, A, B, D, S>
where
    N: NodeOp,
    A: Analysis<N>,
    B: Analysis<N>,
    S: Strategy<N, A, D>,
{
    inner: S,
    extra: B,
    _marker: PhantomData<(N, A, D)>,
}

impl<N, A, B, D, S> AddAnalysis<N, A, B, D, S>
where
    N: NodeOp,
    A: Analysis<N>,
    B: Analysis<N>,
    S: Strategy<N, A, D>,
{
    pub fn new(inner: S, extra: B) -> Self {
        AddAnalysis {
            inner,
            extra,
            _marker: PhantomData,
        }
    }
}

impl<N, A, B, D, S> Strategy<N, PairAnalysis<A, B>, D> for AddAnalysis<N, A, B, D, S>
where
    N: NodeOp,
    A: Analysis<N>,
    B: Analysis<N>,
    S: Strategy<N, A, D>,
{
    fn apply(
        &self,
        egraph: &EGraph<N, PairAnalysis<A, B>>,
        data: D,
        parallel: &dyn ParallelMap,
    ) -> (Option<EGraph<N, PairAnalysis<A, B>>>, D) {
        let plain_analysis = egraph.analysis().0.clone();
        let Some(plain) = reanalyze(egraph, plain_analysis) else {
            return (None, data);
        };
        let (result, data) = self.inner.apply(&plain, data, parallel);
        match result {
            Some(next) => {
                let paired = PairAnalysis(next.analysis().clone(), self.extra.clone());
                match reanalyze(&next, paired) {
                    Some(reattached) => (Some(reattached), data),
                    None => (None, data),
                }
            }
            None => (None, data),
        }
    }
}

/// Drops an e-graph's analysis down to [`foresight_egraph::NoAnalysis`]
/// around `inner`, then carries the analysis back afterward. `dropData`:
/// for a strategy that never reads the analysis and would rather not pay
/// `make`/`join`/`rename` costs while it runs.
pub struct DropData<N, A, D, S>
where
    N: NodeOp,
    A: Analysis<N>,
    S: Strategy<N, foresight_egraph::NoAnalysis, D>,
{
    inner: S,
    _marker: PhantomData<(N, A, D)>,
}

impl<N, A, D, S> DropData<N, A, D, S>
where
    N: NodeOp,
    A: Analysis<N>,
    S: Strategy<N, foresight_egraph::NoAnalysis, D>,
{
    pub fn new(inner: S) -> Self {
        DropData {
            inner,
            _marker: PhantomData,
        }
    }
}

impl<N, A, D, S> Strategy<N, A, D> for DropData<N, A, D, S>
where
    N: NodeOp,
    A: Analysis<N>,
    S: Strategy<N, foresight_egraph::NoAnalysis, D>,
{
    fn apply(
        &self,
        egraph: &EGraph<N, A>,
        data: D,
        parallel: &dyn ParallelMap,
    ) -> (Option<EGraph<N, A>>, D) {
        let Some(bare) = reanalyze(egraph, foresight_egraph::NoAnalysis) else {
            return (None, data);
        };
        let (result, data) = self.inner.apply(&bare, data, parallel);
        match result {
            Some(next) => match reanalyze(&next, egraph.analysis().clone()) {
                Some(reattached) => (Some(reattached), data),
                None => (None, data),
            },
            None => (None, data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foresight_egraph::NoAnalysis;

    #[test]
    fn reanalyze_preserves_shape_under_a_trivial_switch() {
        let mut egraph = MutEGraph::<&'static str>::empty();
        let a = egraph.add(ENode::leaf("a"));
        let b = egraph.add(ENode::leaf("b"));
        egraph.add(ENode::new("add", vec![], vec![], vec![a, b]).unwrap());
        egraph.rebuild();

        let frozen = egraph.freeze();
        let moved = reanalyze(&frozen, NoAnalysis).expect("acyclic graph reanalyzes");
        assert_eq!(moved.classes().count(), frozen.classes().count());
    }
}
