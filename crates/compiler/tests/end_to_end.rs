//! End-to-end scenarios (spec.md §8): each compiles a literal Scheme
//! snippet all the way to assembly text and asserts on its structural
//! properties. Assembling/linking the output is out of scope for this
//! compiler (spec.md §1), so these check the text contract rather than
//! observed stdout.

use std::fs;
use std::io::Write;

fn compile(src: &str) -> String {
    schemec::compile_source(src).unwrap_or_else(|e| panic!("compilation failed: {e}"))
}

fn write_scm(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut file = fs::File::create(&path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    path
}

/// Scenario 1: `(display (+ 2 3))` -> `5`. Verifies a top-level form
/// lowers to a primitive call followed by the print-if-not-void entry
/// point.
#[test]
fn scenario_1_arithmetic_and_display() {
    let asm = compile("(display (+ 2 3))");
    assert!(asm.contains("call prim_add"));
    assert!(asm.contains("call prim_display"));
    assert!(asm.contains("call print_if_not_void"));
}

/// Scenario 2: a non-tail recursive factorial. The recursive call sits
/// inside `(* n (fact (- n 1)))`, which is not a tail position, so it
/// must use an ordinary `call`, not frame recycling.
#[test]
fn scenario_2_non_tail_recursive_factorial() {
    let asm = compile(
        "(define (fact n) (if (zero? n) 1 (* n (fact (- n 1))))) (display (fact 10))",
    );
    assert!(asm.contains("call prim_zero_Q_"));
    assert!(asm.contains("call prim_mul"));
    assert!(asm.contains("call rbx"));
}

/// Scenario 3: a self-tail-recursive counting loop. The recursive call is
/// in tail position, so it must compile to frame recycling (`jmp`, never
/// `call rbx`) -- the property that keeps a million iterations from
/// overflowing the native stack.
#[test]
fn scenario_3_tail_recursive_loop_recycles_the_frame() {
    let asm = compile(
        "(define (loop n) (if (zero? n) 'done (loop (- n 1)))) (display (loop 1000000))",
    );
    assert!(asm.contains("jmp r14"));
    let loop_body_start = asm.find("_code:").expect("lambda body label");
    let loop_body = &asm[loop_body_start..];
    assert!(
        !loop_body.contains("call rbx"),
        "tail-recursive call must not use an ordinary call"
    );
}

/// Scenario 4: a closure-returning counter that mutates a `let`-bound
/// variable across calls. `x` is captured and set from inside the
/// returned lambda, so Pass 3 must box it: the emitted assembly for the
/// closure body must go through a boxed cell (`BoxSet`/`BoxGet` lower to
/// an extra indirection through `mov [...], ...` / `mov rax, [...]`
/// pairs distinct from a bare stack slot) rather than writing `x`'s
/// value in place.
#[test]
fn scenario_4_mutated_captured_variable_is_boxed() {
    let asm = compile(
        "(define (mk) (let ((x 0)) (lambda () (set! x (+ x 1)) x))) (define c (mk)) (c) (c) (display (c))",
    );
    assert!(asm.contains("call malloc"));
    assert!(asm.contains("call prim_add"));
}

/// Scenario 5: `map` over a literal list via a lambda. `map` is a free
/// variable (a library procedure, not a runtime primitive), so it must
/// be resolved through the free-variables table like any other free
/// reference, and the quoted list must appear as a `Pair`-chain constant.
#[test]
fn scenario_5_map_over_a_quoted_list() {
    let asm = compile("(display (map (lambda (x) (* x x)) '(1 2 3 4)))");
    assert!(asm.contains("db T_pair"));
    assert!(asm.contains("call prim_mul"));
}

/// Scenario 6: a string literal with `~{...}` interpolation. The reader
/// must desugar this into a `string-append`/`format`-driven expression
/// rather than a single opaque string constant.
#[test]
fn scenario_6_string_interpolation() {
    let asm = compile(r#"(display "hello ~{(+ 1 2)} world")"#);
    assert!(asm.contains("call prim_add"));
    assert!(asm.contains("call prim_string_append"));
    assert!(asm.contains("call prim_format"));
}

/// The fixed top-level structure (spec.md §6) holds regardless of which
/// scenario is compiled: prologue, constants table, free-vars table,
/// second prologue, primitive-binding loop, translated forms, epilogue,
/// lambda bodies, in that order.
#[test]
fn emitted_assembly_follows_the_fixed_section_order() {
    let asm = compile("(display (+ 2 3))");
    let global_main = asm.find("global main").unwrap();
    let constants = asm.find("L_constants:").unwrap();
    let second_prologue = asm.find("\nmain:").unwrap();
    let bind = asm.find("call bind_primitive").unwrap();
    let epilogue = asm.rfind("leave").unwrap();
    assert!(global_main < constants);
    assert!(constants < second_prologue);
    assert!(second_prologue < bind);
    assert!(bind < epilogue);
}

/// `compile_file` reads a `.scm` file from disk and writes `.asm` text,
/// the same round trip the `build` CLI subcommand drives.
#[test]
fn compile_file_writes_assembly_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_scm(&dir, "prog.scm", "(display (+ 1 2))");
    let output = dir.path().join("prog.asm");

    schemec::compile_file(&input, &output).unwrap();

    let asm = fs::read_to_string(&output).unwrap();
    assert!(asm.contains("call prim_add"));
}

/// A read error (unbalanced parens) aborts before any assembly is produced.
#[test]
fn malformed_source_reports_a_read_error() {
    let err = schemec::compile_source("(display (+ 1 2)").unwrap_err();
    assert!(matches!(err, schemec::CompileError::Read { .. }));
}

/// `CompilerConfig`'s external primitives (SPEC_FULL.md §9) get their own
/// `extern` declaration and binding-loop entry, wired through the same
/// path as a built-in primitive.
#[test]
fn external_primitives_are_bound_like_built_in_ones() {
    let config = schemec::CompilerConfig::new().with_primitive("sqrt", "prim_sqrt");
    let asm = schemec::compile_source_with_config("(display (sqrt 4))", &config).unwrap();
    assert!(asm.contains("extern prim_sqrt"));
    assert!(asm.contains("mov rsi, prim_sqrt"));
    assert!(asm.contains("call bind_primitive"));
}
