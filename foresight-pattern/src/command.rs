use foresight_egraph::{Analysis, EClassCall, EClassRef, EGraph, MixedTree, NodeOp};

/// Where a union command's second operand comes from: an e-class that
/// already existed when the command was queued, or the result of an earlier
/// `Add` in the same queue (resolved once that add actually runs).
#[derive(Clone, Debug)]
pub enum UnionTarget<N> {
    Class(EClassRef),
    AddResult(MixedTree<N, EClassCall>),
}

/// A deferred graph mutation produced by an [`crate::Applier`]. Appliers
/// never touch the e-graph directly: every rewrite is queued here and
/// applied in one batch, so every rule in a round sees the same snapshot of
/// the graph it matched against.
#[derive(Clone, Debug)]
pub enum Command<N> {
    Add(MixedTree<N, EClassCall>),
    Union(EClassRef, UnionTarget<N>),
}

/// A batch of pending commands from one or more appliers, applied together
/// against a mutable e-graph.
#[derive(Clone, Debug, Default)]
pub struct CommandQueue<N> {
    commands: Vec<Command<N>>,
}

impl<N> CommandQueue<N> {
    pub fn new() -> CommandQueue<N> {
        CommandQueue {
            commands: Vec::new(),
        }
    }

    pub fn push_add(&mut self, tree: MixedTree<N, EClassCall>) {
        self.commands.push(Command::Add(tree));
    }

    pub fn push_union(&mut self, a: EClassRef, b: UnionTarget<N>) {
        self.commands.push(Command::Union(a, b));
    }

    pub fn append(&mut self, other: CommandQueue<N>) {
        self.commands.extend(other.commands);
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Run every command against `egraph`, queuing the resulting unions for
    /// the caller to `rebuild`. A bare `Add` interns its tree and discards
    /// the result; an `AddResult` union target interns its tree and unions
    /// with what it produced.
    pub fn apply<A: Analysis<N>>(self, egraph: &mut EGraph<N, A>)
    where
        N: NodeOp,
    {
        for command in self.commands {
            match command {
                Command::Add(tree) => {
                    egraph.add_tree_mut(&tree);
                }
                Command::Union(a, target) => {
                    let b = match target {
                        UnionTarget::Class(r) => r,
                        UnionTarget::AddResult(tree) => egraph.add_tree_mut(&tree).class,
                    };
                    egraph.union_mut(a, b);
                }
            }
        }
    }
}
