use foresight_egraph::{ENode, MutEGraph};
use foresight_slots::{Slot, SlotSet};

/// A node that only binds a slot (no uses, no args) must hash-cons to a
/// class with arity 0: the bound slot is not one of the class's free
/// parameters, so it must not leak into the returned call's substitution.
#[test]
fn a_pure_binder_node_produces_an_arity_zero_class() {
    let mut egraph = MutEGraph::<&'static str>::empty();
    let x = Slot::fresh();
    let call = egraph.add(ENode::new("lam", vec![x], vec![], vec![]).unwrap());

    assert_eq!(call.subst.keys().count(), 0);
    assert_eq!(egraph.signature(call.class).unwrap(), SlotSet::empty());
}

/// A slot used directly by a child, but not bound by the parent, escapes
/// into the parent's own free-slot signature.
#[test]
fn a_free_reference_in_a_child_escapes_into_the_parent_signature() {
    let mut egraph = MutEGraph::<&'static str>::empty();
    let bound = Slot::fresh();
    let free = Slot::fresh();

    let reference = egraph.add(ENode::new("var", vec![], vec![free], vec![]).unwrap());
    let lam = egraph.add(ENode::new("lam", vec![bound], vec![], vec![reference]).unwrap());

    assert_eq!(lam.subst.keys().count(), 1);
    assert_eq!(lam.subst.apply(Slot::numeric(0)), free);
    assert_eq!(egraph.signature(lam.class).unwrap().len(), 1);
}

/// Two nodes that bind different concrete slots but are otherwise
/// structurally identical hash-cons to the same class (alpha-equivalence),
/// and neither binder appears in the shared class's signature.
#[test]
fn alpha_equivalent_binders_share_a_class_with_no_free_slots() {
    let mut egraph = MutEGraph::<&'static str>::empty();
    let x1 = Slot::fresh();
    let x2 = Slot::fresh();

    let first = egraph.add(ENode::new("lam", vec![x1], vec![], vec![]).unwrap());
    let second = egraph.add(ENode::new("lam", vec![x2], vec![], vec![]).unwrap());

    assert_eq!(first.class, second.class);
    assert_eq!(egraph.signature(first.class).unwrap(), SlotSet::empty());
}
