//! `Lambda` and `Applic` lowering (spec.md §4.5).
//!
//! Every other `Ast` node lowers to a handful of straight-line
//! instructions; these two carry the compiler's only real control-flow
//! and memory-layout machinery: closure allocation and environment
//! extension for `Lambda`, and the two calling conventions -- an
//! ordinary `call` for a non-tail `Applic`, stack-frame overlay ("frame
//! recycling") for a tail one -- that keep tail-recursive Scheme loops
//! from growing the native stack.

use super::error::CodeGenError;
use super::expr;
use super::runtime::{L_ERROR_INCORRECT_ARITY_OPT, L_ERROR_INCORRECT_ARITY_SIMPLE, L_ERROR_NON_CLOSURE};
use super::state::CodeGen;
use crate::ast::{Ast, LambdaKind, Tail};
use std::fmt::Write as _;

/// Allocate a closure over the current environment and register its body
/// for later emission into `cg.lambda_bodies`. Leaves the new closure
/// pointer in `rax`.
pub(super) fn emit_lambda(
    cg: &mut CodeGen,
    params: &[String],
    kind: &LambdaKind,
    body: &Ast,
) -> Result<(), CodeGenError> {
    let tag = cg.fresh_label("closure");
    let body_label = format!("{tag}_code");

    // New rib: copy this lambda's own incoming arguments (the enclosing
    // frame's params) so the closure's body can address them via `ENV`
    // once it is itself the innermost lambda.
    writeln!(cg.out, "    mov rdi, {}", 8 * cg.params)?;
    writeln!(cg.out, "    call malloc")?;
    writeln!(cg.out, "    mov rbx, rax")?;
    for i in 0..cg.params {
        writeln!(cg.out, "    mov rax, PARAM({i})")?;
        writeln!(cg.out, "    mov [rbx + {}], rax", 8 * i)?;
    }

    // Extended env array: new rib at index 0, each outer rib shifted up
    // by one slot.
    writeln!(cg.out, "    mov rdi, {}", 8 * (cg.env_depth + 1))?;
    writeln!(cg.out, "    call malloc")?;
    writeln!(cg.out, "    mov [rax], rbx")?;
    writeln!(cg.out, "    mov r12, rax")?;
    for i in 0..cg.env_depth {
        writeln!(cg.out, "    mov rax, ENV")?;
        writeln!(cg.out, "    mov rax, [rax + {}]", 8 * i)?;
        writeln!(cg.out, "    mov [r12 + {}], rax", 8 * (i + 1))?;
    }

    // The closure object itself: RTTI byte, env pointer, code pointer.
    writeln!(cg.out, "    mov rdi, 17")?;
    writeln!(cg.out, "    call malloc")?;
    writeln!(cg.out, "    mov byte [rax], T_closure")?;
    writeln!(cg.out, "    mov SOB_CLOSURE_ENV(rax), r12")?;
    writeln!(cg.out, "    mov SOB_CLOSURE_CODE(rax), {body_label}")?;

    emit_lambda_body(cg, &body_label, params, kind, body)
}

/// Render `body_label`'s code into `cg.lambda_bodies`, with `cg.params`
/// and `cg.env_depth` temporarily updated to the lambda's own frame, then
/// restore the caller's context.
fn emit_lambda_body(
    cg: &mut CodeGen,
    body_label: &str,
    params: &[String],
    kind: &LambdaKind,
    body: &Ast,
) -> Result<(), CodeGenError> {
    let outer_params = cg.params;
    let outer_env_depth = cg.env_depth;
    let outer_out = std::mem::take(&mut cg.out);

    let nfixed = params.len();
    writeln!(cg.out, "{body_label}:")?;
    writeln!(cg.out, "    push rbp")?;
    writeln!(cg.out, "    mov rbp, rsp")?;

    let body_params = match kind {
        LambdaKind::Simple => {
            writeln!(cg.out, "    cmp COUNT, {nfixed}")?;
            writeln!(cg.out, "    jne {L_ERROR_INCORRECT_ARITY_SIMPLE}")?;
            nfixed
        }
        LambdaKind::Opt(_) => {
            emit_opt_arity_fixup(cg, nfixed)?;
            nfixed + 1
        }
    };

    cg.params = body_params;
    cg.env_depth = outer_env_depth + 1;
    expr::emit(cg, body)?;
    cg.params = outer_params;
    cg.env_depth = outer_env_depth;

    writeln!(cg.out, "    leave")?;
    writeln!(cg.out, "    ret {}", 8 * (body_params + 3))?;

    let body_text = std::mem::replace(&mut cg.out, outer_out);
    cg.lambda_bodies.push_str(&body_text);
    Ok(())
}

/// The variadic-arity normalization from spec.md §4.5: an `Opt` lambda's
/// body always runs with exactly `|fixed| + 1` parameters, the last one
/// holding the "rest" list. The caller may have passed exactly `|fixed|`
/// arguments (no rest arguments at all -- widen by one nil slot) or more
/// than `|fixed|` (fold the excess into a proper list).
fn emit_opt_arity_fixup(cg: &mut CodeGen, nfixed: usize) -> Result<(), CodeGenError> {
    let tag = cg.fresh_label("opt_arity");
    let widen_label = format!("{tag}_widen");
    let fold_label = format!("{tag}_fold");
    let done_label = format!("{tag}_done");

    writeln!(cg.out, "    cmp COUNT, {nfixed}")?;
    writeln!(cg.out, "    jl {L_ERROR_INCORRECT_ARITY_OPT}")?;
    writeln!(cg.out, "    je {widen_label}")?;
    writeln!(cg.out, "    jg {fold_label}")?;

    // COUNT == nfixed: there is no free slot past the last fixed argument
    // to hold the (empty) rest list -- it would belong to the caller's
    // own frame. Shift the whole header (saved rbp, return address, env)
    // and every fixed argument down by one word, ascending so each read
    // happens before the slot it targets is overwritten, then point the
    // freed top slot at `sob_nil` and rebase `rbp` onto the new frame.
    writeln!(cg.out, "{widen_label}:")?;
    writeln!(cg.out, "    mov r10, rbp")?;
    writeln!(cg.out, "    sub rsp, 8")?;
    writeln!(cg.out, "    mov rax, [r10]")?;
    writeln!(cg.out, "    mov [r10 - 8], rax")?;
    writeln!(cg.out, "    mov rax, [r10 + 8]")?;
    writeln!(cg.out, "    mov [r10], rax")?;
    writeln!(cg.out, "    mov rax, [r10 + 16]")?;
    writeln!(cg.out, "    mov [r10 + 8], rax")?;
    writeln!(cg.out, "    mov qword [r10 + 16], {}", nfixed + 1)?;
    for i in 0..nfixed {
        writeln!(cg.out, "    mov rax, [r10 + {}]", 32 + 8 * i)?;
        writeln!(cg.out, "    mov [r10 + {}], rax", 24 + 8 * i)?;
    }
    writeln!(cg.out, "    mov rax, sob_nil")?;
    writeln!(cg.out, "    mov [r10 + {}], rax", 24 + 8 * nfixed)?;
    writeln!(cg.out, "    sub rbp, 8")?;
    writeln!(cg.out, "    jmp {done_label}")?;

    // COUNT > nfixed: fold arguments nfixed..COUNT-1 into a proper list,
    // right to left, then drop it straight into the first excess slot --
    // no relocation needed, since the new frame (nfixed + 1 args) is
    // never larger than the one the caller already built.
    writeln!(cg.out, "{fold_label}:")?;
    writeln!(cg.out, "    mov rax, sob_nil")?;
    writeln!(cg.out, "    mov r11, COUNT")?;
    writeln!(cg.out, "    dec r11")?;
    writeln!(cg.out, "{fold_label}_loop:")?;
    writeln!(cg.out, "    cmp r11, {nfixed}")?;
    writeln!(cg.out, "    jl {fold_label}_done")?;
    writeln!(cg.out, "    push rax")?;
    writeln!(cg.out, "    push r11")?;
    writeln!(cg.out, "    mov rdi, 17")?;
    writeln!(cg.out, "    call malloc")?;
    writeln!(cg.out, "    pop r11")?;
    writeln!(cg.out, "    pop rbx")?;
    writeln!(cg.out, "    mov byte [rax], T_pair")?;
    writeln!(cg.out, "    mov r9, [rbp + 32 + r11 * 8]")?;
    writeln!(cg.out, "    mov [rax + 1], r9")?;
    writeln!(cg.out, "    mov [rax + 9], rbx")?;
    writeln!(cg.out, "    dec r11")?;
    writeln!(cg.out, "    jmp {fold_label}_loop")?;
    writeln!(cg.out, "{fold_label}_done:")?;
    writeln!(cg.out, "    mov qword [rbp + 24], {}", nfixed + 1)?;
    writeln!(cg.out, "    mov [rbp + {}], rax", 32 + 8 * nfixed)?;
    writeln!(cg.out, "    jmp {done_label}")?;

    writeln!(cg.out, "{done_label}:")?;
    Ok(())
}

/// Call lowering. A non-tail call uses the ordinary convention (push
/// args right-to-left, then the count, then the closure's environment,
/// then `call`); a tail call instead overlays the new argument block onto
/// the current frame and `jmp`s to the callee's code, so a self- or
/// mutually-tail-recursive Scheme loop runs in bounded stack space.
pub(super) fn emit_applic(
    cg: &mut CodeGen,
    proc: &Ast,
    args: &[Ast],
    tail: Tail,
) -> Result<(), CodeGenError> {
    match tail {
        Tail::NonTail => emit_applic_nontail(cg, proc, args),
        Tail::Tail => emit_applic_tail(cg, proc, args),
    }
}

fn emit_applic_nontail(cg: &mut CodeGen, proc: &Ast, args: &[Ast]) -> Result<(), CodeGenError> {
    for arg in args.iter().rev() {
        expr::emit(cg, arg)?;
        writeln!(cg.out, "    push rax")?;
    }
    writeln!(cg.out, "    push {}", args.len())?;
    expr::emit(cg, proc)?;
    writeln!(cg.out, "    cmp byte [rax], T_closure")?;
    writeln!(cg.out, "    jne {L_ERROR_NON_CLOSURE}")?;
    writeln!(cg.out, "    mov rbx, SOB_CLOSURE_CODE(rax)")?;
    writeln!(cg.out, "    push SOB_CLOSURE_ENV(rax)")?;
    writeln!(cg.out, "    call rbx")?;
    Ok(())
}

/// Frame-recycling tail call (spec.md §4.5). `cg.params` is the current
/// frame's own argument count; both it and `args.len()` are known at
/// compile time, so the destination of the overlay is a fixed
/// displacement from the current `rbp` -- no runtime arithmetic needed to
/// find it, only to move the evaluated argument values into place.
fn emit_applic_tail(cg: &mut CodeGen, proc: &Ast, args: &[Ast]) -> Result<(), CodeGenError> {
    let old_n = cg.params as i64;
    let new_n = args.len() as i64;
    let shift = old_n - new_n; // new_rbp = rbp + 8 * shift

    for arg in args.iter().rev() {
        expr::emit(cg, arg)?;
        writeln!(cg.out, "    push rax")?;
    }
    expr::emit(cg, proc)?;
    writeln!(cg.out, "    cmp byte [rax], T_closure")?;
    writeln!(cg.out, "    jne {L_ERROR_NON_CLOSURE}")?;
    writeln!(cg.out, "    mov r14, SOB_CLOSURE_CODE(rax)")?;
    writeln!(cg.out, "    mov r15, SOB_CLOSURE_ENV(rax)")?;

    // Read the words that must survive the overlay (the caller we must
    // eventually return to) before anything below is overwritten.
    writeln!(cg.out, "    mov r12, rbp")?;
    writeln!(cg.out, "    mov r13, [rbp]")?;

    writeln!(cg.out, "    mov [{}], r15", offset("r12", 16 + 8 * shift))?;
    writeln!(
        cg.out,
        "    mov qword [{}], {new_n}",
        offset("r12", 24 + 8 * shift)
    )?;
    for i in 0..args.len() {
        writeln!(cg.out, "    pop rax")?;
        writeln!(
            cg.out,
            "    mov [{}], rax",
            offset("r12", 32 + 8 * shift + 8 * i as i64)
        )?;
    }

    writeln!(cg.out, "    mov rbp, r13")?;
    writeln!(cg.out, "    lea rsp, [{}]", offset("r12", 8 * shift))?;
    writeln!(cg.out, "    jmp r14")?;
    Ok(())
}

/// `{reg} + n`/`{reg} - n` with a valid NASM sign, since a negative
/// displacement (the tail-called closure takes more arguments than the
/// current frame has) can't be spelled `reg + -8`.
fn offset(reg: &str, n: i64) -> String {
    if n >= 0 {
        format!("{reg} + {n}")
    } else {
        format!("{reg} - {}", -n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::reader::read_all;
    use crate::semantic;
    use crate::tables::{ConstantsTable, FreeVarsTable};

    fn codegen_for(src: &str) -> String {
        let forms = read_all(src).unwrap();
        let program: Vec<Ast> = forms
            .iter()
            .map(|f| semantic::analyze(parse(f).unwrap()))
            .collect();
        let constants = ConstantsTable::collect(&program);
        let free_vars = FreeVarsTable::collect(&program, &[]);
        let mut cg = CodeGen::new(&constants, &free_vars);
        for form in &program {
            expr::emit(&mut cg, form).unwrap();
        }
        let mut out = cg.out.clone();
        out.push_str(&cg.lambda_bodies);
        out
    }

    #[test]
    fn simple_lambda_checks_exact_arity() {
        let asm = codegen_for("(lambda (x y) x)");
        assert!(asm.contains("cmp COUNT, 2"));
        assert!(asm.contains(L_ERROR_INCORRECT_ARITY_SIMPLE));
    }

    #[test]
    fn opt_lambda_branches_on_widen_vs_fold() {
        let asm = codegen_for("(lambda (x . rest) rest)");
        assert!(asm.contains("cmp COUNT, 1"));
        assert!(asm.contains(L_ERROR_INCORRECT_ARITY_OPT));
        assert!(asm.contains("_widen"));
        assert!(asm.contains("_fold"));
    }

    #[test]
    fn nontail_call_pushes_args_right_to_left_then_count_then_calls() {
        let asm = codegen_for("(f a b)");
        let push_count_pos = asm.find("push 2").expect("arg count pushed");
        let call_pos = asm.find("call rbx").expect("call emitted");
        assert!(push_count_pos < call_pos);
        assert!(asm.contains(L_ERROR_NON_CLOSURE));
    }

    #[test]
    fn tail_call_jumps_instead_of_calling() {
        let asm = codegen_for("(lambda (x) (f x))");
        assert!(asm.contains("jmp r14"));
        assert!(!asm.contains("call rbx"));
    }

    #[test]
    fn closure_allocation_wires_env_and_code_pointer() {
        let asm = codegen_for("(lambda (x) x)");
        assert!(asm.contains("mov byte [rax], T_closure"));
        assert!(asm.contains("SOB_CLOSURE_ENV(rax), r12"));
        assert!(asm.contains("SOB_CLOSURE_CODE(rax)"));
    }
}
