use foresight_egraph::MixedTree;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// A fresh identity standing for an unknown subtree inside a pattern. Two
/// `PatternVar`s are equal only if they're the same allocation, exactly like
/// a fresh [`foresight_slots::Slot`] — the same "compare by identity, not by
/// structure" idea, applied to pattern holes instead of binder names.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PatternVar(u32);

static NEXT_VAR: AtomicU32 = AtomicU32::new(0);

impl PatternVar {
    pub fn fresh() -> PatternVar {
        PatternVar(NEXT_VAR.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Debug for PatternVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?{}", self.0)
    }
}

/// A pattern is a [`MixedTree`] whose atoms are pattern variables rather
/// than concrete e-class calls.
pub type Pattern<N> = MixedTree<N, PatternVar>;
