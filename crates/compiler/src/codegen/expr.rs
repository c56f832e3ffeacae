//! Per-node lowering for every `Ast` variant except `Lambda`/`Applic`
//! (spec.md §4.5, which `codegen::closure` handles). Every emitted
//! expression leaves a pointer to its resulting boxed object in `rax`;
//! this is the one calling convention assumed throughout the emitter.

use super::closure;
use super::error::CodeGenError;
use super::runtime::L_ERROR_FVAR_UNDEFINED;
use super::state::CodeGen;
use crate::ast::{Address, Ast, Var};
use schemec_core::Sexpr;
use std::fmt::Write as _;

pub(super) fn emit(cg: &mut CodeGen, ast: &Ast) -> Result<(), CodeGenError> {
    match ast {
        Ast::Const(s) => emit_const(cg, s),
        Ast::VarGet(v) => emit_var_get(cg, v),
        Ast::VarSet(v, e) => emit_var_set(cg, v, e),
        Ast::VarDef(v, e) => emit_var_def(cg, v, e),
        Ast::If(t, c, a) => emit_if(cg, t, c, a),
        Ast::Seq(xs) => emit_seq(cg, xs),
        Ast::Or(xs) => emit_or(cg, xs),
        Ast::Box(v) => emit_bare_box(v),
        Ast::BoxGet(v) => emit_box_get(cg, v),
        Ast::BoxSet(v, e) => emit_box_set(cg, v, e),
        Ast::Lambda { params, kind, body } => closure::emit_lambda(cg, params, kind, body),
        Ast::Applic { proc, args, tail } => closure::emit_applic(cg, proc, args, *tail),
    }
}

fn emit_const(cg: &mut CodeGen, s: &Sexpr) -> Result<(), CodeGenError> {
    let loc = cg
        .constants
        .loc(s)
        .ok_or_else(|| CodeGenError::Logic(format!("constant {s} missing from constants table")))?;
    writeln!(cg.out, "    lea rax, [L_constants + {loc}]")?;
    Ok(())
}

fn emit_var_get(cg: &mut CodeGen, v: &Var) -> Result<(), CodeGenError> {
    match v.address {
        Address::Free => {
            let label = cg.free_vars.label(&v.name).ok_or_else(|| {
                CodeGenError::Logic(format!(
                    "free variable {} missing from free-vars table",
                    v.name
                ))
            })?;
            writeln!(cg.out, "    mov rax, [{label}]")?;
            writeln!(cg.out, "    cmp byte [rax], T_undefined")?;
            writeln!(cg.out, "    je {L_ERROR_FVAR_UNDEFINED}")?;
        }
        Address::Param(i) => {
            writeln!(cg.out, "    mov rax, PARAM({i})")?;
        }
        Address::Bound(m, n) => {
            writeln!(cg.out, "    mov rax, ENV")?;
            writeln!(cg.out, "    mov rax, [rax + 8 * {m}]")?;
            writeln!(cg.out, "    mov rax, [rax + 8 * {n}]")?;
        }
    }
    Ok(())
}

/// The boxing prologue `VarSet(Param i, Box _)` is matched before the
/// general case: allocate 8 bytes, capture the current parameter value
/// there, and replace the parameter slot with the freshly allocated
/// pointer (spec.md §4.5).
fn emit_var_set(cg: &mut CodeGen, v: &Var, e: &Ast) -> Result<(), CodeGenError> {
    if let (Address::Param(i), Ast::Box(_)) = (&v.address, e) {
        writeln!(cg.out, "    mov rdi, 8")?;
        writeln!(cg.out, "    call malloc")?;
        writeln!(cg.out, "    mov rbx, PARAM({i})")?;
        writeln!(cg.out, "    mov [rax], rbx")?;
        writeln!(cg.out, "    mov PARAM({i}), rax")?;
        writeln!(cg.out, "    mov rax, sob_void")?;
        return Ok(());
    }
    emit(cg, e)?;
    store_to_address(cg, &v.address, &v.name)?;
    writeln!(cg.out, "    mov rax, sob_void")?;
    Ok(())
}

/// `VarDef` lowers exactly like `VarSet` on a `Free` address (spec.md
/// §4.5): the global is "now defined" simply because its slot no longer
/// holds the undefined sentinel.
fn emit_var_def(cg: &mut CodeGen, v: &Var, e: &Ast) -> Result<(), CodeGenError> {
    emit(cg, e)?;
    store_to_address(cg, &v.address, &v.name)?;
    writeln!(cg.out, "    mov rax, sob_void")?;
    Ok(())
}

fn store_to_address(cg: &mut CodeGen, address: &Address, name: &str) -> Result<(), CodeGenError> {
    match address {
        Address::Free => {
            let label = cg.free_vars.label(name).ok_or_else(|| {
                CodeGenError::Logic(format!("free variable {name} missing from free-vars table"))
            })?;
            writeln!(cg.out, "    mov [{label}], rax")?;
        }
        Address::Param(i) => {
            writeln!(cg.out, "    mov PARAM({i}), rax")?;
        }
        Address::Bound(m, n) => {
            writeln!(cg.out, "    mov rbx, ENV")?;
            writeln!(cg.out, "    mov rbx, [rbx + 8 * {m}]")?;
            writeln!(cg.out, "    mov [rbx + 8 * {n}], rax")?;
        }
    }
    Ok(())
}

/// A bare `Box(v)` node only ever appears as the RHS of the `VarSet`
/// boxing prologue, handled in [`emit_var_set`] before recursing;
/// reaching this function means that invariant broke.
fn emit_bare_box(v: &Var) -> Result<(), CodeGenError> {
    Err(CodeGenError::Logic(format!(
        "internal error: Box({}) encountered outside a boxing prologue VarSet",
        v.name
    )))
}

fn emit_box_get(cg: &mut CodeGen, v: &Var) -> Result<(), CodeGenError> {
    emit_var_get(cg, v)?;
    writeln!(cg.out, "    mov rax, [rax]")?;
    Ok(())
}

fn emit_box_set(cg: &mut CodeGen, v: &Var, e: &Ast) -> Result<(), CodeGenError> {
    emit(cg, e)?;
    writeln!(cg.out, "    push rax")?;
    emit_var_get(cg, v)?;
    writeln!(cg.out, "    pop rbx")?;
    writeln!(cg.out, "    mov [rax], rbx")?;
    writeln!(cg.out, "    mov rax, sob_void")?;
    Ok(())
}

fn emit_if(cg: &mut CodeGen, t: &Ast, c: &Ast, a: &Ast) -> Result<(), CodeGenError> {
    let else_label = cg.fresh_label("if_else");
    let end_label = cg.fresh_label("if_end");
    emit(cg, t)?;
    writeln!(cg.out, "    cmp byte [rax], T_boolean_false")?;
    writeln!(cg.out, "    je {else_label}")?;
    emit(cg, c)?;
    writeln!(cg.out, "    jmp {end_label}")?;
    writeln!(cg.out, "{else_label}:")?;
    emit(cg, a)?;
    writeln!(cg.out, "{end_label}:")?;
    Ok(())
}

fn emit_seq(cg: &mut CodeGen, xs: &[Ast]) -> Result<(), CodeGenError> {
    for x in xs {
        emit(cg, x)?;
    }
    Ok(())
}

/// `Or` short-circuits on the first non-`#f` value (spec.md §4.5: "any
/// non-false-non-void" -- `#void` is truthy too, only `#f` is false).
fn emit_or(cg: &mut CodeGen, xs: &[Ast]) -> Result<(), CodeGenError> {
    let Some((last, rest)) = xs.split_last() else {
        writeln!(cg.out, "    mov rax, sob_boolean_false")?;
        return Ok(());
    };
    let end_label = cg.fresh_label("or_end");
    for x in rest {
        emit(cg, x)?;
        writeln!(cg.out, "    cmp byte [rax], T_boolean_false")?;
        writeln!(cg.out, "    jne {end_label}")?;
    }
    emit(cg, last)?;
    writeln!(cg.out, "{end_label}:")?;
    Ok(())
}
