//! Constants table (spec.md §4.4).
//!
//! Walks the enriched program collecting every literal appearing in a
//! `Const`, plus the name string of every free-variable reference (the
//! runtime needs it to report undefined references, and `define` needs it
//! to record that a global now exists). Sub-objects are added before their
//! composites (pairs: car, then cdr, then the pair; vectors: elements, then
//! the vector; symbols: the name string, then the symbol), so a composite's
//! pointer fields always address a strictly smaller offset.

use crate::ast::{Address, Ast, Var};
use schemec_core::{Number, Sexpr};

/// One surviving, deduplicated constants-table entry and its byte offset
/// from `L_constants`.
#[derive(Debug, Clone)]
pub struct ConstEntry {
    pub value: Sexpr,
    pub loc: usize,
    pub size: usize,
}

/// The constants table for one compilation: every object `Const` or a free
/// variable's name needs at codegen time, in emission order.
#[derive(Debug, Clone, Default)]
pub struct ConstantsTable {
    entries: Vec<ConstEntry>,
}

impl ConstantsTable {
    /// Build the table for `program`, seeded with the fixed prologue
    /// objects spec.md §4.4 names (`void`, `nil`, `#f`, `#t`, `char 0x00`,
    /// and every primitive name as a string literal) before walking.
    pub fn collect(program: &[Ast]) -> ConstantsTable {
        let mut table = ConstantsTable::default();
        table.push(Sexpr::Void);
        table.push(Sexpr::Nil);
        table.push(Sexpr::Bool(false));
        table.push(Sexpr::Bool(true));
        table.push(Sexpr::Char(0));
        for (name, _label) in crate::codegen::runtime::PRIMITIVES {
            table.push(Sexpr::str(name.as_bytes().to_vec()));
        }
        for ast in program {
            table.walk(ast);
        }
        table
    }

    /// The byte offset of `s` from `L_constants`, if present.
    pub fn loc(&self, s: &Sexpr) -> Option<usize> {
        self.entries.iter().find(|e| &e.value == s).map(|e| e.loc)
    }

    /// All surviving entries, in emission order.
    pub fn entries(&self) -> &[ConstEntry] {
        &self.entries
    }

    fn walk(&mut self, ast: &Ast) {
        match ast {
            Ast::Const(s) => self.push_recursive(s),
            Ast::VarGet(v) => self.note_free(v),
            Ast::VarSet(v, e) => {
                self.note_free(v);
                self.walk(e);
            }
            Ast::VarDef(v, e) => {
                self.note_free(v);
                self.walk(e);
            }
            Ast::If(t, c, a) => {
                self.walk(t);
                self.walk(c);
                self.walk(a);
            }
            Ast::Seq(xs) | Ast::Or(xs) => xs.iter().for_each(|x| self.walk(x)),
            Ast::Applic { proc, args, .. } => {
                self.walk(proc);
                args.iter().for_each(|a| self.walk(a));
            }
            Ast::Lambda { body, .. } => self.walk(body),
            Ast::Box(v) => self.note_free(v),
            Ast::BoxGet(v) => self.note_free(v),
            Ast::BoxSet(v, e) => {
                self.note_free(v);
                self.walk(e);
            }
        }
    }

    fn note_free(&mut self, v: &Var) {
        if v.address == Address::Free {
            self.push(Sexpr::str(v.name.clone().into_bytes()));
        }
    }

    /// Add `s` and, in post-order, every sub-object it is built from.
    fn push_recursive(&mut self, s: &Sexpr) {
        match s {
            Sexpr::Pair(p) => {
                self.push_recursive(&p.0);
                self.push_recursive(&p.1);
                self.push(s.clone());
            }
            Sexpr::Vector(items) => {
                for item in items.iter() {
                    self.push_recursive(item);
                }
                self.push(s.clone());
            }
            Sexpr::Symbol(name) => {
                self.push(Sexpr::str(name.as_bytes().to_vec()));
                self.push(s.clone());
            }
            _ => self.push(s.clone()),
        }
    }

    fn push(&mut self, s: Sexpr) {
        if self.entries.iter().any(|e| e.value == s) {
            return;
        }
        let size = Self::size_of(&s);
        let loc = self.entries.last().map_or(0, |e| e.loc + e.size);
        self.entries.push(ConstEntry {
            value: s,
            loc,
            size,
        });
    }

    fn size_of(s: &Sexpr) -> usize {
        match s {
            Sexpr::Void | Sexpr::Nil | Sexpr::Bool(_) => 1,
            Sexpr::Char(_) => 2,
            Sexpr::Str(bytes) => 1 + 8 + bytes.len(),
            Sexpr::Symbol(_) => 1 + 8,
            Sexpr::Number(Number::Fraction(_, _)) => 1 + 16,
            Sexpr::Number(Number::Integer(_) | Number::Real(_)) => 1 + 8,
            Sexpr::Vector(items) => 1 + 8 + 8 * items.len(),
            Sexpr::Pair(_) => 1 + 16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::reader::read_all;
    use crate::semantic;

    fn table_for(src: &str) -> ConstantsTable {
        let forms = read_all(src).unwrap();
        let program: Vec<Ast> = forms
            .iter()
            .map(|f| semantic::analyze(parse(f).unwrap()))
            .collect();
        ConstantsTable::collect(&program)
    }

    #[test]
    fn prologue_objects_come_first_in_fixed_order() {
        let table = table_for("1");
        assert_eq!(table.entries()[0].value, Sexpr::Void);
        assert_eq!(table.entries()[1].value, Sexpr::Nil);
        assert_eq!(table.entries()[2].value, Sexpr::Bool(false));
        assert_eq!(table.entries()[3].value, Sexpr::Bool(true));
        assert_eq!(table.entries()[4].value, Sexpr::Char(0));
    }

    #[test]
    fn prologue_objects_have_their_spec_byte_sizes() {
        let table = table_for("1");
        assert_eq!(table.entries()[0].size, 1); // void
        assert_eq!(table.entries()[4].size, 2); // char
    }

    #[test]
    fn integer_constant_is_collected_and_addressable() {
        let table = table_for("42");
        let loc = table.loc(&Sexpr::Number(Number::Integer(42)));
        assert!(loc.is_some());
    }

    #[test]
    fn duplicate_constants_collapse_to_one_entry() {
        let table = table_for("(begin 7 7 7)");
        let count = table
            .entries()
            .iter()
            .filter(|e| e.value == Sexpr::Number(Number::Integer(7)))
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn pair_constant_adds_car_and_cdr_before_itself() {
        let pair = Sexpr::cons(
            Sexpr::Number(Number::Integer(1)),
            Sexpr::Number(Number::Integer(2)),
        );
        let table = table_for("'(1 . 2)");
        let pair_loc = table.loc(&pair).unwrap();
        let car_loc = table.loc(&Sexpr::Number(Number::Integer(1))).unwrap();
        let cdr_loc = table.loc(&Sexpr::Number(Number::Integer(2))).unwrap();
        assert!(car_loc < pair_loc);
        assert!(cdr_loc < pair_loc);
    }

    #[test]
    fn symbol_constant_adds_its_name_string_before_itself() {
        let table = table_for("'foo");
        let symbol_loc = table.loc(&Sexpr::symbol("foo")).unwrap();
        let name_loc = table.loc(&Sexpr::str(b"foo".to_vec())).unwrap();
        assert!(name_loc < symbol_loc);
    }

    #[test]
    fn free_variable_name_is_collected_as_a_string_constant() {
        let table = table_for("(define x undefined-name)");
        assert!(table.loc(&Sexpr::str(b"undefined-name".to_vec())).is_some());
    }
}
