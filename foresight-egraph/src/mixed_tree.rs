use foresight_slots::Slot;

/// A tree that bottoms out in either an e-class call or some other atom
/// type `A`. Used both for concrete input trees (`A = EClassCall`, see
/// `EGraph::add_tree`) and for patterns (`A = Pattern::Var`, see
/// `foresight-pattern`).
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum MixedTree<N, A> {
    Node {
        op: N,
        defs: Vec<Slot>,
        uses: Vec<Slot>,
        children: Vec<MixedTree<N, A>>,
    },
    Atom(A),
}

impl<N, A> MixedTree<N, A> {
    pub fn node(op: N, defs: Vec<Slot>, uses: Vec<Slot>, children: Vec<MixedTree<N, A>>) -> Self {
        MixedTree::Node {
            op,
            defs,
            uses,
            children,
        }
    }

    pub fn leaf(op: N) -> Self {
        MixedTree::Node {
            op,
            defs: Vec::new(),
            uses: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn atom(a: A) -> Self {
        MixedTree::Atom(a)
    }

    pub fn as_atom(&self) -> Option<&A> {
        match self {
            MixedTree::Atom(a) => Some(a),
            MixedTree::Node { .. } => None,
        }
    }

    /// Rebuild this tree with every atom mapped through `f`, e.g.
    /// converting a pattern variable into a concrete e-class call once a
    /// match has bound it.
    pub fn map_atoms<B>(&self, f: &mut impl FnMut(&A) -> B) -> MixedTree<N, B>
    where
        N: Clone,
    {
        match self {
            MixedTree::Atom(a) => MixedTree::Atom(f(a)),
            MixedTree::Node {
                op,
                defs,
                uses,
                children,
            } => MixedTree::Node {
                op: op.clone(),
                defs: defs.clone(),
                uses: uses.clone(),
                children: children.iter().map(|c| c.map_atoms(f)).collect(),
            },
        }
    }

    /// Like [`Self::map_atoms`], but `f` produces a whole tree per atom
    /// instead of a single replacement atom, spliced in at that position.
    /// Used when one pattern variable's contribution to a rewrite isn't a
    /// single e-class call but a reconstructed subterm (e.g. the result of
    /// a capture-avoiding substitution).
    pub fn splice_atoms<B>(&self, f: &mut impl FnMut(&A) -> MixedTree<N, B>) -> MixedTree<N, B>
    where
        N: Clone,
    {
        match self {
            MixedTree::Atom(a) => f(a),
            MixedTree::Node {
                op,
                defs,
                uses,
                children,
            } => MixedTree::Node {
                op: op.clone(),
                defs: defs.clone(),
                uses: uses.clone(),
                children: children.iter().map(|c| c.splice_atoms(f)).collect(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_atoms_preserves_shape() {
        let t: MixedTree<&str, u32> = MixedTree::node(
            "add",
            vec![],
            vec![],
            vec![MixedTree::atom(1), MixedTree::atom(2)],
        );
        let mapped = t.map_atoms(&mut |a| a.to_string());
        match mapped {
            MixedTree::Node { children, .. } => {
                assert_eq!(children.len(), 2);
                assert_eq!(children[0].as_atom(), Some(&"1".to_string()));
            }
            MixedTree::Atom(_) => panic!("expected node"),
        }
    }
}
