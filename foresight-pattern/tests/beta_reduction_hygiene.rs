use foresight_egraph::{ENode, MutEGraph};
use foresight_pattern::{
    compile, MachineSearcherPhase, Pattern, PatternVar, Rule, SubstituteApplier,
};
use foresight_slots::Slot;

/// `App(Lam(x, Lam(y, Var(x))), Var(y))` beta-reduces to `body[x := Var(y)]`.
/// A capture-unsafe substitution would let the inner `Lam(y, ...)` bind the
/// substituted-in `y`, losing the reference to the outer free variable. A
/// hygienic one gives the inner binder a fresh identity instead, so the
/// result's `Var(y)` stays free.
#[test]
fn substitution_avoids_capturing_the_replacement() {
    let mut egraph = MutEGraph::<&'static str>::empty();

    let x = Slot::fresh();
    let y = Slot::fresh();

    let var_x = egraph.add(ENode::new("var", vec![], vec![x], vec![]).unwrap());
    let inner_lam = egraph.add(ENode::new("lam", vec![y], vec![], vec![var_x]).unwrap());
    let outer_lam = egraph.add(ENode::new("lam", vec![x], vec![], vec![inner_lam]).unwrap());
    let var_y = egraph.add(ENode::new("var", vec![], vec![y], vec![]).unwrap());
    let redex = egraph.add(ENode::new("app", vec![], vec![], vec![outer_lam, var_y.clone()]).unwrap());
    egraph.rebuild();

    let pattern_x = Slot::fresh();
    let body = PatternVar::fresh();
    let arg = PatternVar::fresh();
    let lam_pat: Pattern<&'static str> =
        Pattern::node("lam", vec![pattern_x], vec![], vec![Pattern::atom(body)]);
    let lhs: Pattern<&'static str> =
        Pattern::node("app", vec![], vec![], vec![lam_pat, Pattern::atom(arg)]);
    let rhs: Pattern<&'static str> = Pattern::atom(body);

    let rule = Rule::new(
        "beta",
        Box::new(MachineSearcherPhase::new(compile(&lhs))),
        Box::new(SubstituteApplier::new(rhs, body, pattern_x, arg)),
    );

    let frozen = egraph.freeze();
    let queue = rule.fire(&frozen);
    assert!(!queue.is_empty(), "beta-redex should match");
    queue.apply(egraph.core_mut());
    egraph.rebuild();

    let frozen = egraph.freeze();
    let result_class = frozen.canonicalize_ref(redex.class).unwrap();
    let members = frozen.nodes(result_class).unwrap();
    let lam_member = members
        .iter()
        .find(|n| n.op == "lam")
        .expect("reduction produces a lam");
    assert_eq!(lam_member.args.len(), 1);
    // The reconstructed lam's own binder must be a fresh slot, distinct
    // from the free `y` it now encloses: a capture bug would fold `y`
    // into this node's `defs`, collapsing the class's signature to arity
    // 0 the same way a leaked binder does in `foresight-egraph`.
    assert_eq!(frozen.signature(result_class).unwrap().len(), 1);

    let reduced_body_class = frozen.canonicalize_ref(lam_member.args[0].class).unwrap();
    // The substituted-in `y` must stay free: if the inner binder had
    // captured it, this class's signature would collapse to arity 0 (the
    // same bug shape as `binder_does_not_leak_into_the_class_signature` in
    // `foresight-egraph`, but from the other direction — capture, not
    // leak).
    assert_eq!(frozen.signature(reduced_body_class).unwrap().len(), 1);

    let var_members = frozen.nodes(reduced_body_class).unwrap();
    assert!(var_members.iter().any(|n| n.op == "var" && n.uses == vec![y]));
    assert_eq!(
        frozen.canonicalize_ref(reduced_body_class).unwrap(),
        frozen.canonicalize_ref(var_y.class).unwrap()
    );
}

#[test]
fn substitution_replaces_the_bound_occurrence() {
    // App(Lam(x, Var(x)), Var(y)) -> Var(y): the identity-function case,
    // with no nested binder to worry about capturing anything.
    let mut egraph = MutEGraph::<&'static str>::empty();
    let x = Slot::fresh();
    let y = Slot::fresh();

    let var_x = egraph.add(ENode::new("var", vec![], vec![x], vec![]).unwrap());
    let identity_lam = egraph.add(ENode::new("lam", vec![x], vec![], vec![var_x]).unwrap());
    let var_y = egraph.add(ENode::new("var", vec![], vec![y], vec![]).unwrap());
    let redex =
        egraph.add(ENode::new("app", vec![], vec![], vec![identity_lam, var_y.clone()]).unwrap());
    egraph.rebuild();

    let pattern_x = Slot::fresh();
    let body = PatternVar::fresh();
    let arg = PatternVar::fresh();
    let lam_pat: Pattern<&'static str> =
        Pattern::node("lam", vec![pattern_x], vec![], vec![Pattern::atom(body)]);
    let lhs: Pattern<&'static str> =
        Pattern::node("app", vec![], vec![], vec![lam_pat, Pattern::atom(arg)]);
    let rhs: Pattern<&'static str> = Pattern::atom(body);

    let rule = Rule::new(
        "beta",
        Box::new(MachineSearcherPhase::new(compile(&lhs))),
        Box::new(SubstituteApplier::new(rhs, body, pattern_x, arg)),
    );

    let frozen = egraph.freeze();
    let queue = rule.fire(&frozen);
    queue.apply(egraph.core_mut());
    egraph.rebuild();

    let frozen = egraph.freeze();
    assert_eq!(
        frozen.canonicalize_ref(redex.class).unwrap(),
        frozen.canonicalize_ref(var_y.class).unwrap()
    );
}
