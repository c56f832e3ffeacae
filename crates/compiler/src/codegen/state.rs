//! The `CodeGen` struct and small shared helpers (spec.md §4.5).
//!
//! Carries the two integer contexts the recursive lowering needs --
//! `params` (the parameter count of the innermost enclosing lambda, 0 at
//! program top) and `env_depth` (the number of enclosing lambdas) -- plus
//! the output buffer, the resolved tables, and a label counter per
//! label-category. The label counter is the only mutable state in the
//! whole compiler (spec.md §5): it is initialized fresh per compilation
//! and never shared across one.

use crate::tables::{ConstantsTable, FreeVarsTable};
use std::collections::HashMap;

pub struct CodeGen<'a> {
    pub(super) out: String,
    /// Lambda bodies can't be emitted inline where their `Lambda` node
    /// appears -- each is its own labeled block, reached by `call`/`jmp`,
    /// never by falling through. `codegen::closure` appends each body here
    /// as it is generated; `codegen::program` splices this in after the
    /// translated top-level forms.
    pub(super) lambda_bodies: String,
    pub(super) constants: &'a ConstantsTable,
    pub(super) free_vars: &'a FreeVarsTable,
    /// Parameter count of the innermost enclosing lambda; 0 at program top.
    pub(super) params: usize,
    /// Number of enclosing lambdas.
    pub(super) env_depth: usize,
    label_counters: HashMap<&'static str, usize>,
}

impl<'a> CodeGen<'a> {
    pub fn new(constants: &'a ConstantsTable, free_vars: &'a FreeVarsTable) -> CodeGen<'a> {
        CodeGen {
            out: String::new(),
            lambda_bodies: String::new(),
            constants,
            free_vars,
            params: 0,
            env_depth: 0,
            label_counters: HashMap::new(),
        }
    }

    /// Mint a fresh, unique label in `category` (e.g. `"if"`, `"or"`,
    /// `"closure"`), used for every fresh-label need in §4.5's per-node
    /// lowering rules.
    pub(super) fn fresh_label(&mut self, category: &'static str) -> String {
        let counter = self.label_counters.entry(category).or_insert(0);
        let label = format!("L_{category}_{counter}");
        *counter += 1;
        label
    }

    pub fn into_output(self) -> String {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Ast;
    use crate::tables::{ConstantsTable, FreeVarsTable};

    #[test]
    fn fresh_labels_are_unique_per_category() {
        let program: Vec<Ast> = Vec::new();
        let constants = ConstantsTable::collect(&program);
        let free_vars = FreeVarsTable::collect(&program, &[]);
        let mut cg = CodeGen::new(&constants, &free_vars);
        let a = cg.fresh_label("if");
        let b = cg.fresh_label("if");
        let c = cg.fresh_label("or");
        assert_ne!(a, b);
        assert_eq!(c, "L_or_0");
    }
}
