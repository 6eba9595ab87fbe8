use foresight_egraph::{ENode, MutEGraph, NoAnalysis};
use foresight_pattern::{compile, MachineSearcherPhase, Pattern, PatternApplier, PatternVar, Rule};
use foresight_strategy::{MaximalRuleApplication, Repeat, Sequential, Strategy};

fn mul_rule() -> Rule<&'static str, NoAnalysis> {
    // (x * x) * x  ~>  x * (x * x), re-associating a chain of multiplications.
    let x = PatternVar::fresh();
    let lhs: Pattern<&'static str> = Pattern::node(
        "mul",
        vec![],
        vec![],
        vec![
            Pattern::node("mul", vec![], vec![], vec![Pattern::atom(x), Pattern::atom(x)]),
            Pattern::atom(x),
        ],
    );
    let rhs: Pattern<&'static str> = Pattern::node(
        "mul",
        vec![],
        vec![],
        vec![
            Pattern::atom(x),
            Pattern::node("mul", vec![], vec![], vec![Pattern::atom(x), Pattern::atom(x)]),
        ],
    );
    Rule::new(
        "reassociate-square-times-x",
        Box::new(MachineSearcherPhase::new(compile(&lhs))),
        Box::new(PatternApplier::new(rhs)),
    )
}

#[test]
fn saturation_merges_both_associations_of_a_cubed_term() {
    let mut egraph = MutEGraph::<&'static str>::empty();
    let x = egraph.add(ENode::leaf("x"));
    let x_squared = egraph.add(ENode::new("mul", vec![], vec![], vec![x.clone(), x.clone()]).unwrap());
    let left_assoc = egraph
        .add(ENode::new("mul", vec![], vec![], vec![x_squared.clone(), x.clone()]).unwrap());
    egraph.rebuild();

    let strategy = Repeat::repeat_until_stable(MaximalRuleApplication::new(vec![mul_rule()]));
    let frozen = egraph.freeze();
    let (result, ()) = strategy.apply(&frozen, (), &Sequential);
    let saturated = result.expect("the rewrite should fire at least once");

    let right_assoc = {
        let mut m = MutEGraph::from_egraph(saturated.clone());
        let x = m.add(ENode::leaf("x"));
        let x_squared = m.add(ENode::new("mul", vec![], vec![], vec![x.clone(), x.clone()]).unwrap());
        let term = m.add(ENode::new("mul", vec![], vec![], vec![x.clone(), x_squared.clone()]).unwrap());
        m.rebuild();
        (m.into_egraph(), term)
    };
    let (with_right_assoc, right_assoc_call) = right_assoc;

    assert_eq!(
        with_right_assoc.canonicalize_ref(left_assoc.class).unwrap(),
        with_right_assoc.canonicalize_ref(right_assoc_call.class).unwrap(),
    );
}

#[test]
fn repeat_with_iteration_limit_runs_between_exactly_k_minus_one_times() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct AlwaysProgresses;

    impl Strategy<&'static str, NoAnalysis, ()> for AlwaysProgresses {
        fn apply(
            &self,
            egraph: &foresight_egraph::EGraph<&'static str, NoAnalysis>,
            data: (),
            _parallel: &dyn foresight_strategy::ParallelMap,
        ) -> (Option<foresight_egraph::EGraph<&'static str, NoAnalysis>>, ()) {
            (Some(egraph.clone()), data)
        }
    }

    let between_calls = Arc::new(AtomicUsize::new(0));
    struct CountBetween(Arc<AtomicUsize>);
    impl Strategy<&'static str, NoAnalysis, ()> for CountBetween {
        fn apply(
            &self,
            egraph: &foresight_egraph::EGraph<&'static str, NoAnalysis>,
            data: (),
            _parallel: &dyn foresight_strategy::ParallelMap,
        ) -> (Option<foresight_egraph::EGraph<&'static str, NoAnalysis>>, ()) {
            self.0.fetch_add(1, Ordering::SeqCst);
            (Some(egraph.clone()), data)
        }
    }

    let egraph = foresight_egraph::EGraph::<&'static str>::empty();
    let strategy = Repeat::repeat_until_stable(AlwaysProgresses)
        .with_iteration_limit(5)
        .between_iterations(Box::new(CountBetween(between_calls.clone())));

    let (_result, ()) = strategy.apply(&egraph, (), &Sequential);
    assert_eq!(between_calls.load(Ordering::SeqCst), 4);
}
