//! Top-level assembly (spec.md §6): the one entry point that assembles a
//! whole program into a single NASM-syntax `.asm` text, in a fixed order.

use super::error::CodeGenError;
use super::expr;
use super::runtime::{self, L_CONSTANTS, L_UNDEFINED_OBJECT, PRINT_IF_NOT_VOID};
use super::state::CodeGen;
use crate::ast::Ast;
use crate::config::CompilerConfig;
use crate::tables::{ConstantsTable, ConstEntry, FreeVarsTable};
use schemec_core::{Number, Sexpr};
use std::fmt::Write as _;

/// Lower `program` (already run through [`crate::semantic::analyze`]) into
/// the full text of an assembly file, per spec.md §6. Equivalent to
/// [`emit_program_with_config`] with the default (empty) configuration.
pub fn emit_program(program: &[Ast]) -> Result<String, CodeGenError> {
    emit_program_with_config(program, &CompilerConfig::default())
}

/// Lower `program` into the full text of an assembly file, folding in any
/// [`ExternalPrimitive`](crate::config::ExternalPrimitive)s registered on
/// `config` (SPEC_FULL.md §9) as though they were ordinary entries of
/// [`runtime::PRIMITIVES`]:
///
/// 1. the fixed prologue and its `extern` declarations (one per built-in
///    and external primitive label),
/// 2. the constants table, laid out at `L_constants`,
/// 3. the free-variables table, each slot starting at the shared
///    "undefined" sentinel,
/// 4. the second prologue fragment (`main:`'s own frame setup),
/// 5. the primitive-binding loop (built-ins, then external primitives),
/// 6. each top-level form, followed by a print-if-not-void call,
/// 7. the fixed epilogue,
/// 8. every lambda body collected along the way.
///
/// External primitive names are not pre-seeded into the constants table the
/// way `runtime::PRIMITIVES`'s names are (spec.md's constants-table seeding
/// only covers the fixed built-in set); one still gets a constant string if
/// the program actually refers to it, via the ordinary free-variable walk.
pub fn emit_program_with_config(program: &[Ast], config: &CompilerConfig) -> Result<String, CodeGenError> {
    let extra_primitives = config.as_pairs();
    let constants = ConstantsTable::collect(program);
    let mut primitive_names: Vec<&str> = runtime::PRIMITIVES.iter().map(|(name, _)| *name).collect();
    primitive_names.extend(config.external_names());
    let free_vars = FreeVarsTable::collect(program, &primitive_names);
    let mut cg = CodeGen::new(&constants, &free_vars);

    writeln!(cg.out, "{}", runtime::PROLOGUE)?;
    for (_, label) in runtime::PRIMITIVES.iter().copied().chain(extra_primitives.iter().copied()) {
        writeln!(cg.out, "extern {label}")?;
    }

    writeln!(cg.out, "section .data")?;
    writeln!(cg.out, "{L_CONSTANTS}:")?;
    for entry in constants.entries() {
        emit_constant(&mut cg.out, &constants, entry)?;
    }
    writeln!(cg.out, "{L_UNDEFINED_OBJECT}:")?;
    writeln!(cg.out, "    db T_undefined")?;
    for entry in free_vars.entries() {
        writeln!(cg.out, "{}: dq {L_UNDEFINED_OBJECT}", entry.label)?;
    }

    writeln!(cg.out, "{}", runtime::SECOND_PROLOGUE)?;

    for (name, code_label) in runtime::PRIMITIVES.iter().copied().chain(extra_primitives.iter().copied()) {
        let slot = free_vars
            .label(name)
            .ok_or_else(|| CodeGenError::Logic(format!("primitive {name} missing its free-var slot")))?;
        writeln!(cg.out, "    mov rdi, {slot}")?;
        writeln!(cg.out, "    mov rsi, {code_label}")?;
        writeln!(cg.out, "    call bind_primitive")?;
    }

    for form in program {
        expr::emit(&mut cg, form)?;
        writeln!(cg.out, "    mov rdi, rax")?;
        writeln!(cg.out, "    call {PRINT_IF_NOT_VOID}")?;
    }

    writeln!(cg.out, "{}", runtime::EPILOGUE)?;

    let mut out = cg.out;
    out.push_str(&cg.lambda_bodies);
    Ok(out)
}

/// Serialize one constants-table entry at its reserved offset, in the
/// exact byte layout spec.md §4.4 fixes per kind. Pointer fields address
/// a sibling entry's offset from `L_constants`; every sibling an entry
/// points to was inserted earlier by `ConstantsTable::collect`'s
/// post-order walk, so `table.loc` always finds it.
fn emit_constant(out: &mut String, table: &ConstantsTable, entry: &ConstEntry) -> Result<(), CodeGenError> {
    match &entry.value {
        Sexpr::Void => writeln!(out, "    db T_void")?,
        Sexpr::Nil => writeln!(out, "    db T_nil")?,
        Sexpr::Bool(false) => writeln!(out, "    db T_boolean_false")?,
        Sexpr::Bool(true) => writeln!(out, "    db T_boolean_true")?,
        Sexpr::Char(b) => writeln!(out, "    db T_char, {b}")?,
        Sexpr::Str(bytes) => {
            writeln!(out, "    db T_string")?;
            writeln!(out, "    dq {}", bytes.len())?;
            if !bytes.is_empty() {
                let list = bytes
                    .iter()
                    .map(|b| b.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                writeln!(out, "    db {list}")?;
            }
        }
        Sexpr::Symbol(name) => {
            let name_loc = loc_of(table, &Sexpr::str(name.as_bytes().to_vec()))?;
            writeln!(out, "    db T_interned_symbol")?;
            writeln!(out, "    dq {L_CONSTANTS} + {name_loc}")?;
        }
        Sexpr::Number(Number::Integer(n)) => {
            writeln!(out, "    db T_integer")?;
            writeln!(out, "    dq {n}")?;
        }
        Sexpr::Number(num @ Number::Real(_)) => {
            writeln!(out, "    db T_real")?;
            writeln!(out, "    dq {num}")?;
        }
        Sexpr::Number(Number::Fraction(p, q)) => {
            writeln!(out, "    db T_fraction")?;
            writeln!(out, "    dq {p}")?;
            writeln!(out, "    dq {q}")?;
        }
        Sexpr::Vector(items) => {
            writeln!(out, "    db T_vector")?;
            writeln!(out, "    dq {}", items.len())?;
            for item in items.iter() {
                let item_loc = loc_of(table, item)?;
                writeln!(out, "    dq {L_CONSTANTS} + {item_loc}")?;
            }
        }
        Sexpr::Pair(p) => {
            let car_loc = loc_of(table, &p.0)?;
            let cdr_loc = loc_of(table, &p.1)?;
            writeln!(out, "    db T_pair")?;
            writeln!(out, "    dq {L_CONSTANTS} + {car_loc}")?;
            writeln!(out, "    dq {L_CONSTANTS} + {cdr_loc}")?;
        }
    }
    Ok(())
}

fn loc_of(table: &ConstantsTable, s: &Sexpr) -> Result<usize, CodeGenError> {
    table
        .loc(s)
        .ok_or_else(|| CodeGenError::Logic(format!("constant {s} missing from constants table")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::reader::read_all;
    use crate::semantic;

    fn asm_for(src: &str) -> String {
        let forms = read_all(src).unwrap();
        let program: Vec<Ast> = forms
            .iter()
            .map(|f| semantic::analyze(parse(f).unwrap()))
            .collect();
        emit_program(&program).unwrap()
    }

    #[test]
    fn emits_fixed_sections_in_order() {
        let asm = asm_for("1");
        let prologue_pos = asm.find("global main").unwrap();
        let constants_pos = asm.find("L_constants:").unwrap();
        let second_prologue_pos = asm.find("main:").unwrap();
        let epilogue_pos = asm.rfind("leave").unwrap();
        assert!(prologue_pos < constants_pos);
        assert!(constants_pos < second_prologue_pos);
        assert!(second_prologue_pos < epilogue_pos);
    }

    #[test]
    fn binds_every_primitive_before_translating_the_program() {
        let asm = asm_for("1");
        assert!(asm.contains("call bind_primitive"));
        let bind_pos = asm.find("call bind_primitive").unwrap();
        let epilogue_pos = asm.rfind("leave").unwrap();
        assert!(bind_pos < epilogue_pos);
    }

    #[test]
    fn every_top_level_form_is_followed_by_a_print_call() {
        let asm = asm_for("1 2");
        let count = asm.matches("call print_if_not_void").count();
        assert_eq!(count, 2);
    }

    #[test]
    fn lambda_bodies_are_spliced_in_after_the_epilogue() {
        let asm = asm_for("(lambda (x) x)");
        let epilogue_pos = asm.rfind("leave").unwrap();
        let body_pos = asm.find("_code:").unwrap();
        assert!(epilogue_pos < body_pos);
    }
}
