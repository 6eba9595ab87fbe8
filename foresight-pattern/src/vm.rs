use crate::compile::{Instruction, Program};
use crate::PatternVar;
use foresight_egraph::{Analysis, EClassCall, EClassRef, EGraph, NodeOp};
use foresight_slots::SlotMap;
use std::collections::HashMap;

/// A successful match: pattern variable bindings plus the slot substitution
/// that fixes the pattern's `defs`/`uses` occurrences to the concrete slots
/// actually used at the match site.
#[derive(Clone, Debug, Default)]
pub struct PatternMatch {
    pub bindings: HashMap<PatternVar, EClassCall>,
    pub slot_subst: SlotMap,
}

/// A match together with the e-class its pattern's root matched against.
/// Appliers need `root` to know what to union their result with.
#[derive(Clone, Debug)]
pub struct RootedMatch {
    pub root: EClassRef,
    pub pattern_match: PatternMatch,
}

/// Produces matches by running a searcher against an e-graph.
pub trait Searcher<N: NodeOp, A: Analysis<N>> {
    fn search(&self, egraph: &EGraph<N, A>) -> Vec<RootedMatch>;
}

/// A searcher backed by a single compiled pattern, run against every live
/// e-class in turn.
pub struct MachineSearcherPhase<N: NodeOp> {
    program: Program<N>,
}

impl<N: NodeOp> MachineSearcherPhase<N> {
    pub fn new(program: Program<N>) -> Self {
        MachineSearcherPhase { program }
    }

    pub fn from_pattern(pattern: &crate::Pattern<N>) -> Self {
        MachineSearcherPhase::new(crate::compile(pattern))
    }
}

impl<N: NodeOp, A: Analysis<N>> Searcher<N, A> for MachineSearcherPhase<N> {
    fn search(&self, egraph: &EGraph<N, A>) -> Vec<RootedMatch> {
        let mut out = Vec::new();
        for class in egraph.classes() {
            let Ok(signature) = egraph.signature(class) else {
                continue;
            };
            let root_call = EClassCall::identity(class, &signature);
            let mut regs: Vec<Option<EClassCall>> = vec![None; self.program.num_registers];
            regs[0] = Some(root_call);
            run(
                &self.program.instructions,
                0,
                &mut regs,
                egraph,
                &mut HashMap::new(),
                &SlotMap::new(),
                class,
                &mut out,
            );
        }
        out
    }
}

#[allow(clippy::too_many_arguments)]
fn run<N: NodeOp, A: Analysis<N>>(
    instrs: &[Instruction<N>],
    idx: usize,
    regs: &mut [Option<EClassCall>],
    egraph: &EGraph<N, A>,
    bindings: &mut HashMap<PatternVar, EClassCall>,
    slot_subst: &SlotMap,
    root: EClassRef,
    out: &mut Vec<RootedMatch>,
) {
    if idx == instrs.len() {
        out.push(RootedMatch {
            root,
            pattern_match: PatternMatch {
                bindings: bindings.clone(),
                slot_subst: slot_subst.clone(),
            },
        });
        return;
    }

    match &instrs[idx] {
        Instruction::BindVar { out: r, var } => {
            let call = regs[*r].clone().expect("register bound before use");
            let already = bindings.insert(*var, call);
            run(instrs, idx + 1, regs, egraph, bindings, slot_subst, root, out);
            match already {
                Some(prev) => {
                    bindings.insert(*var, prev);
                }
                None => {
                    bindings.remove(var);
                }
            }
        }
        Instruction::Compare { out: r, i } => {
            let a = regs[*r].clone().expect("register bound before use");
            let b = regs[*i].clone().expect("register bound before use");
            let (Ok(ca), Ok(cb)) = (egraph.canonicalize_call(&a), egraph.canonicalize_call(&b)) else {
                return;
            };
            if ca == cb {
                run(instrs, idx + 1, regs, egraph, bindings, slot_subst, root, out);
            }
        }
        Instruction::BindNode {
            out: r,
            op,
            defs,
            uses,
            arity,
            child_base,
        } => {
            let call = regs[*r].clone().expect("register bound before use");
            let Ok(candidates) = egraph.nodes(call.class) else {
                return;
            };
            for candidate in candidates {
                if &candidate.op != op
                    || candidate.defs.len() != defs.len()
                    || candidate.uses.len() != uses.len()
                    || candidate.args.len() != *arity
                {
                    continue;
                }

                // Resolve the stored member against this call: its own
                // binders (`defs`) get fresh, match-local identities, and
                // everything else (`uses`, args) is shifted onto the
                // caller's concrete slots. This is what keeps a pattern's
                // `defs` bindings from being confused with slots the
                // pattern merely uses.
                let concrete = candidate.instantiate(&call);

                let mut local_subst = slot_subst.clone();
                let mut ok = true;
                for (&pat_slot, &concrete_slot) in defs.iter().zip(concrete.defs.iter()) {
                    if !bind_slot(&mut local_subst, pat_slot, concrete_slot) {
                        ok = false;
                        break;
                    }
                }
                if ok {
                    for (&pat_slot, &concrete_slot) in uses.iter().zip(concrete.uses.iter()) {
                        if !bind_slot(&mut local_subst, pat_slot, concrete_slot) {
                            ok = false;
                            break;
                        }
                    }
                }
                if !ok {
                    continue;
                }

                let saved: Vec<Option<EClassCall>> =
                    regs[*child_base..*child_base + *arity].to_vec();
                let mut child_ok = true;
                for (i, arg_call) in concrete.args.iter().enumerate() {
                    match egraph.canonicalize_call(arg_call) {
                        Ok(canon) => regs[*child_base + i] = Some(canon),
                        Err(_) => {
                            child_ok = false;
                            break;
                        }
                    }
                }
                if child_ok {
                    run(
                        instrs,
                        idx + 1,
                        regs,
                        egraph,
                        bindings,
                        &local_subst,
                        root,
                        out,
                    );
                }
                regs[*child_base..*child_base + *arity].clone_from_slice(&saved);
            }
        }
    }
}

/// Extend `subst` with `pat -> concrete`, requiring consistency if `pat` is
/// already bound (the pattern reused the same slot in two positions).
fn bind_slot(
    subst: &mut SlotMap,
    pat: foresight_slots::Slot,
    concrete: foresight_slots::Slot,
) -> bool {
    match subst.get(pat) {
        Some(existing) => existing == concrete,
        None => subst.insert(pat, concrete).is_ok(),
    }
}
