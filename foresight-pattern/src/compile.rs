use crate::{Pattern, PatternVar};
use foresight_egraph::{MixedTree, NodeOp};
use foresight_slots::Slot;
use std::collections::HashMap;

/// A single VM instruction. Registers hold e-class calls (bound top-down as
/// matching proceeds); register 0 always holds the call being matched
/// against the pattern's root.
#[derive(Clone, Debug)]
pub enum Instruction<N> {
    /// The class in register `out` must contain a node with operator `op`
    /// and `defs.len()`/`uses.len()` matching shape; its children populate
    /// registers `child_base..child_base + arity`.
    BindNode {
        out: usize,
        op: N,
        defs: Vec<Slot>,
        uses: Vec<Slot>,
        arity: usize,
        child_base: usize,
    },
    /// First occurrence of a pattern variable: bind it to register `out`.
    BindVar { out: usize, var: PatternVar },
    /// Subsequent occurrence of a variable already bound to register `i`:
    /// require register `out` to denote the same e-class call.
    Compare { out: usize, i: usize },
}

/// A compiled pattern: a flat, preorder instruction tape plus the number of
/// registers it uses.
#[derive(Clone, Debug)]
pub struct Program<N> {
    pub instructions: Vec<Instruction<N>>,
    pub num_registers: usize,
}

/// Compile a pattern into a register program. The root occupies register 0.
pub fn compile<N: NodeOp>(pattern: &Pattern<N>) -> Program<N> {
    let mut instructions = Vec::new();
    let mut next_reg = 1usize;
    let mut seen: HashMap<PatternVar, usize> = HashMap::new();
    compile_rec(pattern, 0, &mut instructions, &mut next_reg, &mut seen);
    Program {
        instructions,
        num_registers: next_reg,
    }
}

fn compile_rec<N: NodeOp>(
    pattern: &Pattern<N>,
    reg: usize,
    instructions: &mut Vec<Instruction<N>>,
    next_reg: &mut usize,
    seen: &mut HashMap<PatternVar, usize>,
) {
    match pattern {
        MixedTree::Atom(var) => {
            if let Some(&first) = seen.get(var) {
                instructions.push(Instruction::Compare { out: reg, i: first });
            } else {
                seen.insert(*var, reg);
                instructions.push(Instruction::BindVar { out: reg, var: *var });
            }
        }
        MixedTree::Node {
            op,
            defs,
            uses,
            children,
        } => {
            let arity = children.len();
            let child_base = *next_reg;
            *next_reg += arity;
            instructions.push(Instruction::BindNode {
                out: reg,
                op: op.clone(),
                defs: defs.clone(),
                uses: uses.clone(),
                arity,
                child_base,
            });
            for (i, child) in children.iter().enumerate() {
                compile_rec(child, child_base + i, instructions, next_reg, seen);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_pattern_compiles_to_single_bind_node() {
        let p: Pattern<&str> = MixedTree::leaf("x");
        let prog = compile(&p);
        assert_eq!(prog.instructions.len(), 1);
        assert_eq!(prog.num_registers, 1);
    }

    #[test]
    fn repeated_var_compiles_to_compare() {
        let v = PatternVar::fresh();
        let p: Pattern<&str> = MixedTree::node(
            "add",
            vec![],
            vec![],
            vec![MixedTree::atom(v), MixedTree::atom(v)],
        );
        let prog = compile(&p);
        assert_eq!(prog.instructions.len(), 3);
        assert!(matches!(prog.instructions[1], Instruction::BindVar { .. }));
        assert!(matches!(prog.instructions[2], Instruction::Compare { .. }));
    }
}
