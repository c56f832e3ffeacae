//! Free-variables table (spec.md §4.4).
//!
//! Collects the unique names that appear as a free-variable reference
//! anywhere in the program, unions them with the fixed primitive name set,
//! sorts lexicographically, and assigns each a `free_var_i` label. At run
//! time each slot holds either a pointer to the current value or a
//! sentinel `T_undefined` cell; the primitive-binding bootstrap overwrites
//! the slots of built-in names with closures over the runtime's code
//! pointers before the user program runs.

use crate::ast::{Address, Ast, Var};
use std::collections::BTreeSet;

/// One free-variable slot: its Scheme name and the label its storage slot
/// is emitted under.
#[derive(Debug, Clone)]
pub struct FreeVarEntry {
    pub name: String,
    pub label: String,
}

/// The free-variables table for one compilation, in lexicographic order.
#[derive(Debug, Clone, Default)]
pub struct FreeVarsTable {
    entries: Vec<FreeVarEntry>,
}

impl FreeVarsTable {
    /// Build the table from `program`'s free references unioned with
    /// `primitives` (typically the Scheme names of
    /// [`crate::codegen::runtime::PRIMITIVES`]).
    pub fn collect(program: &[Ast], primitives: &[&str]) -> FreeVarsTable {
        let mut names: BTreeSet<String> = primitives.iter().map(|s| s.to_string()).collect();
        for ast in program {
            collect_names(ast, &mut names);
        }
        let entries = names
            .into_iter()
            .enumerate()
            .map(|(i, name)| FreeVarEntry {
                name,
                label: format!("free_var_{i}"),
            })
            .collect();
        FreeVarsTable { entries }
    }

    /// The label bound to `name`'s slot, if it has one.
    pub fn label(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.label.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.label(name).is_some()
    }

    /// All entries, in the lexicographic order their labels were assigned in.
    pub fn entries(&self) -> &[FreeVarEntry] {
        &self.entries
    }
}

fn collect_names(ast: &Ast, names: &mut BTreeSet<String>) {
    match ast {
        Ast::Const(_) => {}
        Ast::VarGet(v) => note(v, names),
        Ast::VarSet(v, e) => {
            note(v, names);
            collect_names(e, names);
        }
        Ast::VarDef(v, e) => {
            note(v, names);
            collect_names(e, names);
        }
        Ast::If(t, c, a) => {
            collect_names(t, names);
            collect_names(c, names);
            collect_names(a, names);
        }
        Ast::Seq(xs) | Ast::Or(xs) => xs.iter().for_each(|x| collect_names(x, names)),
        Ast::Applic { proc, args, .. } => {
            collect_names(proc, names);
            args.iter().for_each(|a| collect_names(a, names));
        }
        Ast::Lambda { body, .. } => collect_names(body, names),
        Ast::Box(v) => note(v, names),
        Ast::BoxGet(v) => note(v, names),
        Ast::BoxSet(v, e) => {
            note(v, names);
            collect_names(e, names);
        }
    }
}

fn note(v: &Var, names: &mut BTreeSet<String>) {
    if v.address == Address::Free {
        names.insert(v.name.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::reader::read_all;
    use crate::semantic;

    fn table_for(src: &str, primitives: &[&str]) -> FreeVarsTable {
        let forms = read_all(src).unwrap();
        let program: Vec<Ast> = forms
            .iter()
            .map(|f| semantic::analyze(parse(f).unwrap()))
            .collect();
        FreeVarsTable::collect(&program, primitives)
    }

    #[test]
    fn labels_are_assigned_in_lexicographic_order() {
        let table = table_for("(+ a b)", &["+"]);
        let names: Vec<&str> = table.entries().iter().map(|e| e.name.as_str()).collect();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(names, sorted);
        for (i, entry) in table.entries().iter().enumerate() {
            assert_eq!(entry.label, format!("free_var_{i}"));
        }
    }

    #[test]
    fn primitive_names_are_present_even_if_unreferenced() {
        let table = table_for("1", &["car", "cdr"]);
        assert!(table.contains("car"));
        assert!(table.contains("cdr"));
    }

    #[test]
    fn program_referenced_free_names_are_collected() {
        let table = table_for("(display unbound-name)", &["display"]);
        assert!(table.contains("unbound-name"));
    }

    #[test]
    fn lambda_parameters_are_not_free() {
        let table = table_for("(lambda (x) x)", &[]);
        assert!(!table.contains("x"));
    }

    #[test]
    fn duplicate_references_collapse_to_one_entry() {
        let table = table_for("(begin unbound unbound unbound)", &[]);
        let count = table.entries().iter().filter(|e| e.name == "unbound").count();
        assert_eq!(count, 1);
    }
}
