use foresight_egraph::{ENode, MutEGraph};
use foresight_pattern::{compile, FreshBinderApplier, MachineSearcherPhase, Pattern, PatternVar, Rule};
use foresight_slots::Slot;

/// `f -> lam(x, app(f, var(x)))` for a fresh `x` not present anywhere in the
/// match: the canonical use case `FreshBinderApplier` exists for. Firing it
/// twice on the same class must not reuse the same `x`, or the two
/// expansions would hash-cons to the same node and the distinctness
/// assertion below would be vacuous.
#[test]
fn eta_expansion_wraps_a_value_in_a_fresh_binder() {
    let mut egraph = MutEGraph::<&'static str>::empty();
    let f = egraph.add(ENode::leaf("f"));
    egraph.rebuild();

    let matched = PatternVar::fresh();
    let lhs: Pattern<&'static str> = Pattern::atom(matched);

    let placeholder = Slot::fresh();
    let rhs: Pattern<&'static str> = Pattern::node(
        "lam",
        vec![placeholder],
        vec![],
        vec![Pattern::node(
            "app",
            vec![],
            vec![],
            vec![
                Pattern::atom(matched),
                Pattern::node("var", vec![], vec![placeholder], vec![]),
            ],
        )],
    );

    let rule = Rule::new(
        "eta",
        Box::new(MachineSearcherPhase::new(compile(&lhs))),
        Box::new(FreshBinderApplier::new(rhs, placeholder)),
    );

    let frozen = egraph.freeze();
    let queue = rule.fire(&frozen);
    assert!(!queue.is_empty(), "the atom pattern matches every class");
    queue.apply(egraph.core_mut());
    egraph.rebuild();

    let frozen = egraph.freeze();
    let f_class = frozen.canonicalize_ref(f.class).unwrap();
    let members = frozen.nodes(f_class).unwrap();
    let lam_member = members
        .iter()
        .find(|n| n.op == "lam")
        .expect("eta-expansion produces a lam alongside the original leaf");
    assert_eq!(lam_member.defs.len(), 1);
    assert_eq!(frozen.signature(f_class).unwrap().len(), 0);
}
