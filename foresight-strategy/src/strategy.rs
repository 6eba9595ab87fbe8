use crate::parallel::ParallelMap;
use foresight_egraph::{Analysis, EClassCall, EClassRef, EGraph, NodeOp};
use foresight_pattern::{CommandQueue, PatternVar, Rule};
use std::collections::HashSet;
use std::marker::PhantomData;

/// `(E, D, ParallelMap) -> (Option[E'], D')`: run against `egraph`, returning
/// a new graph when progress was made or `None` when nothing changed.
/// `None` is a control-flow signal, not an error — callers keep using the
/// `egraph` they already had.
pub trait Strategy<N: NodeOp, A: Analysis<N>, D> {
    fn apply(
        &self,
        egraph: &EGraph<N, A>,
        data: D,
        parallel: &dyn ParallelMap,
    ) -> (Option<EGraph<N, A>>, D);
}

/// A cheap structural fingerprint used to decide whether a round actually
/// changed anything: live class count and total member-node count. Two
/// e-graphs with the same fingerprint may still differ in slot naming, but
/// never in which nodes or classes exist — which is exactly "queue produced
/// at least one new node or a new union whose endpoints weren't already
/// congruent".
fn fingerprint<N: NodeOp, A: Analysis<N>>(egraph: &EGraph<N, A>) -> (usize, usize) {
    let mut classes = 0usize;
    let mut nodes = 0usize;
    for r in egraph.classes() {
        classes += 1;
        nodes += egraph.nodes(r).map(|v| v.len()).unwrap_or(0);
    }
    (classes, nodes)
}

/// Searches every rule against a read-only snapshot, applies every match
/// found, and rebuilds once. Grounded on `cranelift-codegen`'s
/// build-then-optimize e-graph pass, generalized from a single hardwired
/// optimization function to a client-supplied rule list.
pub struct MaximalRuleApplication<N: NodeOp, A: Analysis<N>> {
    rules: Vec<Rule<N, A>>,
}

impl<N: NodeOp, A: Analysis<N>> MaximalRuleApplication<N, A> {
    pub fn new(rules: Vec<Rule<N, A>>) -> Self {
        MaximalRuleApplication { rules }
    }

    /// Collects every rule's command queue, optionally in parallel. Each
    /// rule searches its own read-only clone of the snapshot (the e-graph is
    /// never shared mutably, nor shared *immutably* across threads either —
    /// every worker gets its own owned copy, matching the "ParallelMap
    /// receives a read-only snapshot" contract without requiring the engine
    /// itself to be thread-safe to read from multiple threads at once).
    fn search_all(&self, egraph: &EGraph<N, A>, parallel: &dyn ParallelMap) -> CommandQueue<N>
    where
        N: Send,
        A: Send,
        A::Value: Send,
    {
        let tasks: Vec<Box<dyn FnOnce() -> CommandQueue<N> + Send + '_>> = self
            .rules
            .iter()
            .map(|rule| {
                let snapshot = egraph.clone();
                let boxed: Box<dyn FnOnce() -> CommandQueue<N> + Send + '_> =
                    Box::new(move || rule.fire(&snapshot));
                boxed
            })
            .collect();
        let queues = parallel.apply(tasks, |task| task());
        let mut combined = CommandQueue::new();
        for q in queues {
            combined.append(q);
        }
        combined
    }
}

impl<N, A> Strategy<N, A, ()> for MaximalRuleApplication<N, A>
where
    N: NodeOp + Send,
    A: Analysis<N> + Send,
    A::Value: Send,
{
    fn apply(
        &self,
        egraph: &EGraph<N, A>,
        data: (),
        parallel: &dyn ParallelMap,
    ) -> (Option<EGraph<N, A>>, ()) {
        let before = fingerprint(egraph);
        let queue = self.search_all(egraph, parallel);
        crate::trace!("maximal rule application: {} commands queued", queue.len());
        if queue.is_empty() {
            return (None, data);
        }

        let mut next = egraph.clone();
        queue.apply(&mut next);
        let mut m = foresight_egraph::MutEGraph::from_egraph(next);
        m.rebuild();
        let rebuilt = m.into_egraph();

        if fingerprint(&rebuilt) == before {
            (None, data)
        } else {
            (Some(rebuilt), data)
        }
    }
}

/// Identity of a single rule firing against a single match: which rule, and
/// which concrete e-classes it bound. Used by
/// [`MaximalRuleApplicationWithCaching`] to skip matches it has already
/// turned into commands, so repeated outer iterations only pay for genuinely
/// new matches.
#[derive(Clone, PartialEq, Eq, Hash)]
struct MatchKey {
    rule: usize,
    root: EClassRef,
    bindings: Vec<(PatternVar, EClassCall)>,
}

/// The accumulator threaded through
/// [`MaximalRuleApplicationWithCaching`]'s iterations. Must be carried
/// across `repeatUntilStableWithState` rounds — resetting it would make the
/// cache pointless, since it exists precisely to avoid re-deriving commands
/// for matches already seen.
#[derive(Clone, Default)]
pub struct RuleApplicationCache {
    seen: HashSet<MatchKey>,
}

/// Like [`MaximalRuleApplication`], but remembers which (rule, match) pairs
/// it has already turned into commands, so a repeat loop built on
/// `repeatUntilStableWithState` doesn't re-pay the cost of re-applying
/// matches nothing new invalidated.
pub struct MaximalRuleApplicationWithCaching<N: NodeOp, A: Analysis<N>> {
    rules: Vec<Rule<N, A>>,
}

impl<N: NodeOp, A: Analysis<N>> MaximalRuleApplicationWithCaching<N, A> {
    pub fn new(rules: Vec<Rule<N, A>>) -> Self {
        MaximalRuleApplicationWithCaching { rules }
    }
}

impl<N, A> Strategy<N, A, RuleApplicationCache> for MaximalRuleApplicationWithCaching<N, A>
where
    N: NodeOp,
    A: Analysis<N>,
{
    fn apply(
        &self,
        egraph: &EGraph<N, A>,
        mut data: RuleApplicationCache,
        parallel: &dyn ParallelMap,
    ) -> (Option<EGraph<N, A>>, RuleApplicationCache) {
        let _ = parallel;
        let before = fingerprint(egraph);
        let mut queue = CommandQueue::new();
        let mut found_new = false;

        for (idx, rule) in self.rules.iter().enumerate() {
            for rooted_match in rule.searcher.search(egraph) {
                let mut bindings: Vec<(PatternVar, EClassCall)> = rooted_match
                    .pattern_match
                    .bindings
                    .iter()
                    .map(|(k, v)| (*k, v.clone()))
                    .collect();
                bindings.sort_by_key(|(var, _)| *var);
                let key = MatchKey {
                    rule: idx,
                    root: rooted_match.root,
                    bindings,
                };
                if !data.seen.insert(key) {
                    continue;
                }
                found_new = true;
                queue.append(rule.applier.apply(&rooted_match, egraph));
            }
        }

        if !found_new {
            return (None, data);
        }

        let mut next = egraph.clone();
        queue.apply(&mut next);
        let mut m = foresight_egraph::MutEGraph::from_egraph(next);
        m.rebuild();
        let rebuilt = m.into_egraph();

        if fingerprint(&rebuilt) == before {
            (None, data)
        } else {
            (Some(rebuilt), data)
        }
    }
}

/// `repeatUntilStable[WithState]` / `untilFixpoint` / `withIterationLimit` /
/// `betweenIterations` / `withChangeLogger`, all as one configurable
/// combinator rather than a tower of single-purpose wrapper types — the
/// knobs compose freely and a caller only pays for the ones it sets.
pub struct Repeat<N, A, D, S>
where
    N: NodeOp,
    A: Analysis<N>,
    S: Strategy<N, A, D>,
{
    inner: S,
    limit: Option<usize>,
    retain_state: bool,
    between: Option<Box<dyn Strategy<N, A, ()> + Send + Sync>>,
    change_logger: Option<Box<dyn Fn(&EGraph<N, A>, &EGraph<N, A>) + Send + Sync>>,
    _data: PhantomData<D>,
}

impl<N, A, D, S> Repeat<N, A, D, S>
where
    N: NodeOp,
    A: Analysis<N>,
    S: Strategy<N, A, D>,
{
    fn bare(inner: S, retain_state: bool) -> Self {
        Repeat {
            inner,
            limit: None,
            retain_state,
            between: None,
            change_logger: None,
            _data: PhantomData,
        }
    }

    /// Re-runs `inner` with a fresh `D::default()` every iteration.
    pub fn repeat_until_stable(inner: S) -> Self
    where
        D: Default,
    {
        Repeat::bare(inner, false)
    }

    /// Re-runs `inner`, threading the same accumulator across iterations —
    /// required for caches like [`MaximalRuleApplicationWithCaching`]'s
    /// [`RuleApplicationCache`] that must not be reset between rounds.
    pub fn repeat_until_stable_with_state(inner: S) -> Self {
        Repeat::bare(inner, true)
    }

    /// Unbounded `repeat_until_stable`.
    pub fn until_fixpoint(inner: S) -> Self
    where
        D: Default,
    {
        Repeat::repeat_until_stable(inner)
    }

    pub fn with_iteration_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn between_iterations(
        mut self,
        other: Box<dyn Strategy<N, A, ()> + Send + Sync>,
    ) -> Self {
        self.between = Some(other);
        self
    }

    pub fn with_change_logger(
        mut self,
        logger: Box<dyn Fn(&EGraph<N, A>, &EGraph<N, A>) + Send + Sync>,
    ) -> Self {
        self.change_logger = Some(logger);
        self
    }
}

impl<N, A, D, S> Strategy<N, A, D> for Repeat<N, A, D, S>
where
    N: NodeOp,
    A: Analysis<N>,
    D: Default,
    S: Strategy<N, A, D>,
{
    fn apply(
        &self,
        egraph: &EGraph<N, A>,
        data: D,
        parallel: &dyn ParallelMap,
    ) -> (Option<EGraph<N, A>>, D) {
        let mut current = egraph.clone();
        let mut state = data;
        let mut changed_at_all = false;
        let mut iterations = 0usize;

        loop {
            if let Some(limit) = self.limit {
                if iterations >= limit {
                    break;
                }
            }

            let step_state = if self.retain_state {
                std::mem::take(&mut state)
            } else {
                D::default()
            };
            let before = current.clone();
            let (result, new_state) = self.inner.apply(&current, step_state, parallel);
            state = new_state;

            match result {
                Some(next) => {
                    if let Some(logger) = &self.change_logger {
                        logger(&before, &next);
                    }
                    current = next;
                    changed_at_all = true;
                    iterations += 1;

                    let will_continue = self.limit.map_or(true, |limit| iterations < limit);
                    if will_continue {
                        if let Some(between) = &self.between {
                            let (next, _) = between.apply(&current, (), parallel);
                            if let Some(next) = next {
                                current = next;
                            }
                        }
                    }
                }
                None => break,
            }
        }

        if changed_at_all {
            (Some(current), state)
        } else {
            (None, state)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::Sequential;
    use foresight_egraph::{ENode, MutEGraph, NoAnalysis};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Counts its own invocations and always reports progress by adding a
    /// fresh leaf, so it never reaches a fixpoint on its own — only
    /// `with_iteration_limit`/`between_iterations`'s own bound stops it.
    /// `Arc<AtomicUsize>` rather than `Rc<Cell<_>>` because `between_iterations`
    /// requires `Send + Sync`.
    struct CountApplications {
        count: Arc<AtomicUsize>,
    }

    impl Strategy<&'static str, NoAnalysis, ()> for CountApplications {
        fn apply(
            &self,
            egraph: &EGraph<&'static str, NoAnalysis>,
            data: (),
            _parallel: &dyn ParallelMap,
        ) -> (Option<EGraph<&'static str, NoAnalysis>>, ()) {
            self.count.fetch_add(1, Ordering::SeqCst);
            let mut next = MutEGraph::from_egraph(egraph.clone());
            next.add(ENode::leaf("tick"));
            next.rebuild();
            (Some(next.freeze()), data)
        }
    }

    #[test]
    fn iteration_limit_runs_the_body_exactly_the_limit() {
        let counter = Arc::new(AtomicUsize::new(0));
        let body = CountApplications { count: counter.clone() };
        let strategy = Repeat::repeat_until_stable(body).with_iteration_limit(3);

        let egraph = MutEGraph::<&'static str>::empty().freeze();
        let (result, ()) = strategy.apply(&egraph, (), &Sequential);
        assert!(result.is_some());
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn between_iterations_runs_one_fewer_time_than_the_body() {
        let body_counter = Arc::new(AtomicUsize::new(0));
        let between_counter = Arc::new(AtomicUsize::new(0));
        let body = CountApplications { count: body_counter.clone() };
        let between = CountApplications { count: between_counter.clone() };

        let strategy = Repeat::repeat_until_stable(body)
            .with_iteration_limit(3)
            .between_iterations(Box::new(between));

        let egraph = MutEGraph::<&'static str>::empty().freeze();
        let (result, ()) = strategy.apply(&egraph, (), &Sequential);
        assert!(result.is_some());
        assert_eq!(body_counter.load(Ordering::SeqCst), 3);
        assert_eq!(between_counter.load(Ordering::SeqCst), 2);
    }
}
