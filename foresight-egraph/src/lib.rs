#![deny(unsafe_code)]

//! A slotted, hash-consed e-graph: nodes are interned up to alpha-equivalence
//! of their binder slots, unions are deferred into a worklist, and
//! `rebuild` restores congruence by walking that worklist to a fixpoint.

mod analysis;
mod eclass;
mod egraph;
mod error;
mod mixed_tree;
mod node;
mod union_find;

pub use analysis::{Analysis, NoAnalysis, PairAnalysis};
pub use eclass::{EClassCall, EClassRef};
pub use egraph::{EGraph, EGraphWithPendingUnions, MutEGraph};
pub use error::EGraphError;
pub use mixed_tree::MixedTree;
pub use node::{ENode, NodeOp, ShapeCall};

macro_rules! trace {
    ($($arg:tt)*) => {
        if cfg!(feature = "trace-log") {
            log::trace!($($arg)*);
        }
    };
}
pub(crate) use trace;
