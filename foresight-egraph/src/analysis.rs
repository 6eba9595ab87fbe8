use crate::NodeOp;
use foresight_slots::{Slot, SlotMap};

/// A per-e-class lattice value maintained through `add`/`union`/`rebuild`.
///
/// Grounded directly on `cranelift-codegen/src/egraph.rs`'s `Analysis` trait
/// (`for_node`/`meet`), extended with `rename`: unlike a CLIF value (which
/// has no binder positions), a Foresight e-class carries slot parameters
/// that must be renamed whenever rebuild permutes the class's numeric
/// signature, so the analysis needs a hook for that too.
///
/// `join` must be associative, commutative and idempotent, exactly as
/// an analysis must satisfy — it's what lets rebuild merge two classes'
/// values pairwise regardless of the order unions happen to be processed
/// in.
pub trait Analysis<N: NodeOp>: Clone {
    type Value: Clone;

    fn name(&self) -> &str;

    /// Compute the value for a freshly-added node, given the
    /// already-computed values of its arguments (in argument order).
    fn make(&self, op: &N, defs: &[Slot], uses: &[Slot], args: &[Self::Value]) -> Self::Value;

    /// Combine two values that have just been proven to describe the same
    /// e-class.
    fn join(&self, a: &Self::Value, b: &Self::Value) -> Self::Value;

    /// Rewrite a value through a renaming of its owning class's numeric
    /// slot signature.
    fn rename(&self, value: &Self::Value, renaming: &SlotMap) -> Self::Value;
}

/// The trivial analysis: every class gets `()`. Used as `EGraph`'s default
/// analysis type parameter when a client has no use for the framework.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoAnalysis;

impl<N: NodeOp> Analysis<N> for NoAnalysis {
    type Value = ();

    fn name(&self) -> &str {
        "none"
    }

    fn make(&self, _op: &N, _defs: &[Slot], _uses: &[Slot], _args: &[()]) -> () {}

    fn join(&self, _a: &(), _b: &()) {}

    fn rename(&self, _value: &(), _renaming: &SlotMap) {}
}

/// Runs two analyses side by side, as a single analysis over `(A::Value,
/// B::Value)`. This is how Foresight supports attaching more than one
/// analysis to an e-graph without a dynamically-typed registry: compose
/// pairs (nested, for more than two) rather than registering heterogeneous
/// analyses at runtime. The strategy layer's `addAnalysis`/`addAnalyses`
/// combinators build on top of this type.
#[derive(Clone)]
pub struct PairAnalysis<A, B>(pub A, pub B);

impl<N, A, B> Analysis<N> for PairAnalysis<A, B>
where
    N: NodeOp,
    A: Analysis<N>,
    B: Analysis<N>,
{
    type Value = (A::Value, B::Value);

    fn name(&self) -> &str {
        "pair"
    }

    fn make(&self, op: &N, defs: &[Slot], uses: &[Slot], args: &[(A::Value, B::Value)]) -> Self::Value {
        let a_args: Vec<A::Value> = args.iter().map(|(a, _)| a.clone()).collect();
        let b_args: Vec<B::Value> = args.iter().map(|(_, b)| b.clone()).collect();
        (
            self.0.make(op, defs, uses, &a_args),
            self.1.make(op, defs, uses, &b_args),
        )
    }

    fn join(&self, a: &Self::Value, b: &Self::Value) -> Self::Value {
        (self.0.join(&a.0, &b.0), self.1.join(&a.1, &b.1))
    }

    fn rename(&self, value: &Self::Value, renaming: &SlotMap) -> Self::Value {
        (
            self.0.rename(&value.0, renaming),
            self.1.rename(&value.1, renaming),
        )
    }
}
