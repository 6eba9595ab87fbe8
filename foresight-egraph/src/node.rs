use crate::{EClassCall, EGraphError};
use foresight_slots::{Slot, SlotMap};
use std::collections::HashMap;
use std::fmt;

/// The opaque operator type a client's surface language plugs in. The core
/// never interprets `N`; it only needs it to support equality, hashing and
/// debug printing so it can be used inside a hash-consed node.
pub trait NodeOp: Clone + PartialEq + Eq + std::hash::Hash + fmt::Debug {}
impl<T: Clone + PartialEq + Eq + std::hash::Hash + fmt::Debug> NodeOp for T {}

/// A slotted e-node: an operator application together with the binder
/// slots it introduces (`defs`), the free slots it mentions directly
/// (`uses`), and its child e-classes, each carried as an [`EClassCall`].
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ENode<N> {
    pub op: N,
    pub defs: Vec<Slot>,
    pub uses: Vec<Slot>,
    pub args: Vec<EClassCall>,
}

impl<N: NodeOp> ENode<N> {
    /// Construct a node, checking the `defs`/`uses` disjointness
    /// precondition.
    pub fn new(
        op: N,
        defs: Vec<Slot>,
        uses: Vec<Slot>,
        args: Vec<EClassCall>,
    ) -> Result<ENode<N>, EGraphError> {
        for &d in &defs {
            if uses.contains(&d) {
                return Err(EGraphError::DefsUsesOverlap(d));
            }
        }
        Ok(ENode {
            op,
            defs,
            uses,
            args,
        })
    }

    /// A leaf node with no binders, free slots or children.
    pub fn leaf(op: N) -> ENode<N> {
        ENode {
            op,
            defs: Vec::new(),
            uses: Vec::new(),
            args: Vec::new(),
        }
    }

    /// Rewrite every slot this node mentions directly (`defs`/`uses`) and
    /// every argument call through `renaming`, leaving argument class refs
    /// untouched. Used when merging a node into a class whose slot
    /// signature has been permuted.
    pub fn rename(&self, renaming: &SlotMap) -> ENode<N> {
        ENode {
            op: self.op.clone(),
            defs: self.defs.iter().map(|&s| renaming.apply(s)).collect(),
            uses: self.uses.iter().map(|&s| renaming.apply(s)).collect(),
            args: self.args.iter().map(|c| c.rename(renaming)).collect(),
        }
    }

    /// Decompose this node into its canonical `(shape, args)` form: every
    /// distinct slot occurrence (across `defs`, then `uses`, then each
    /// argument's substitution, scanned in canonical-key order) is replaced
    /// by a numeric slot in first-occurrence order. `shape` is the
    /// hash-cons key; the returned `slots` map recovers the originals.
    pub fn to_shape_call(&self) -> crate::ShapeCall<N> {
        let mut pairs: Vec<(Slot, Slot)> = Vec::new();
        let mut next = 0u32;

        let defs: Vec<Slot> = self
            .defs
            .iter()
            .map(|&s| assign_numeric(s, &mut pairs, &mut next))
            .collect();
        let uses: Vec<Slot> = self
            .uses
            .iter()
            .map(|&s| assign_numeric(s, &mut pairs, &mut next))
            .collect();
        let args: Vec<EClassCall> = self
            .args
            .iter()
            .map(|call| {
                let mut keys: Vec<Slot> = call.subst.keys().collect();
                keys.sort_unstable();
                let mut new_subst = SlotMap::new();
                for k in keys {
                    let orig_val = call.subst.get(k).expect("key came from this map");
                    let num_val = assign_numeric(orig_val, &mut pairs, &mut next);
                    new_subst
                        .insert(k, num_val)
                        .expect("keys are distinct by construction");
                }
                EClassCall::new(call.class, new_subst)
            })
            .collect();

        let shape = ENode {
            op: self.op.clone(),
            defs,
            uses,
            args,
        };
        let mut slots = SlotMap::new();
        for (orig, num) in pairs {
            slots.insert(num, orig).expect("numeric slots are distinct");
        }
        crate::ShapeCall { shape, slots }
    }

    /// Resolve this stored (canonical) member node against a concrete
    /// e-class call. `call.subst` maps the class's free-parameter
    /// numbering (`0..arity-1`) onto the caller's concrete slots; every
    /// numeric slot below `self.defs.len()` is one of this node's own
    /// binders rather than a free parameter, so it gets a fresh,
    /// instantiation-local slot instead, giving each instantiation its own
    /// hygienic copy of the bound names.
    pub fn instantiate(&self, call: &EClassCall) -> ENode<N> {
        let defs_len = self.defs.len() as u32;
        let mut binders: HashMap<Slot, Slot> = HashMap::new();
        let mut resolve = |s: Slot| -> Slot {
            match s.numeric_index() {
                Some(i) if i < defs_len => *binders.entry(s).or_insert_with(Slot::fresh),
                Some(i) => call.subst.apply(Slot::numeric(i - defs_len)),
                None => s,
            }
        };
        let defs: Vec<Slot> = self.defs.iter().map(|&s| resolve(s)).collect();
        let uses: Vec<Slot> = self.uses.iter().map(|&s| resolve(s)).collect();
        let args: Vec<EClassCall> = self
            .args
            .iter()
            .map(|arg| {
                let mut subst = SlotMap::new();
                for (k, v) in arg.subst.iter() {
                    subst
                        .insert(k, resolve(v))
                        .expect("shape subst keys are distinct");
                }
                EClassCall::new(arg.class, subst)
            })
            .collect();
        ENode {
            op: self.op.clone(),
            defs,
            uses,
            args,
        }
    }
}

fn assign_numeric(orig: Slot, pairs: &mut Vec<(Slot, Slot)>, next: &mut u32) -> Slot {
    if let Some(&(_, num)) = pairs.iter().find(|&&(o, _)| o == orig) {
        return num;
    }
    let num = Slot::numeric(*next);
    *next += 1;
    pairs.push((orig, num));
    num
}

impl<N: fmt::Debug> fmt::Debug for ENode<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ENode")
            .field("op", &self.op)
            .field("defs", &self.defs)
            .field("uses", &self.uses)
            .field("args", &self.args)
            .finish()
    }
}

/// The canonical decomposition of an [`ENode`]: `shape` has every slot
/// replaced by a numeric position in first-occurrence order, and `slots`
/// (numeric -> original) recovers the concrete node.
///
/// `shape` depends only on the node's alpha-equivalence class, which is
/// exactly what makes it safe to use as a hash-cons key: two nodes that
/// differ only in which concrete (fresh) slots they use, but agree on
/// binder structure, produce the same `shape`.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct ShapeCall<N> {
    pub shape: ENode<N>,
    pub slots: SlotMap,
}

impl<N: NodeOp> ShapeCall<N> {
    /// Recover the concrete node this shape was computed from.
    pub fn as_node(&self) -> ENode<N> {
        let defs = self
            .shape
            .defs
            .iter()
            .map(|&s| self.slots.apply(s))
            .collect();
        let uses = self
            .shape
            .uses
            .iter()
            .map(|&s| self.slots.apply(s))
            .collect();
        let args = self
            .shape
            .args
            .iter()
            .map(|call| {
                let mut subst = SlotMap::new();
                for (k, v) in call.subst.iter() {
                    subst
                        .insert(k, self.slots.apply(v))
                        .expect("shape subst keys are distinct");
                }
                EClassCall::new(call.class, subst)
            })
            .collect();
        ENode {
            op: self.shape.op.clone(),
            defs,
            uses,
            args,
        }
    }
}
