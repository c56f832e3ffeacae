//! The runtime contract this compiler consumes but never generates
//! (spec.md §6 "Runtime contract (consumed)").
//!
//! Everything here is a fixed string fragment or a fixed table: the macros
//! `PARAM`/`ENV`/`COUNT`/`AND_KILL_FRAME`, the RTTI byte constants, the
//! allocator, the error labels, and the mapping from Scheme primitive names
//! to runtime code-pointer labels. None of it is reimplemented; the emitter
//! only ever quotes these names into the assembly text it writes.

/// RTTI byte constant names, in the order spec.md §6 lists them. Codegen
/// never needs their numeric values -- the runtime prologue `equ`s them --
/// only their names, to emit `db T_xxx, ...` directives.
pub const RTTI_NAMES: &[&str] = &[
    "T_void",
    "T_nil",
    "T_boolean_false",
    "T_boolean_true",
    "T_char",
    "T_string",
    "T_interned_symbol",
    "T_integer",
    "T_fraction",
    "T_real",
    "T_vector",
    "T_pair",
    "T_closure",
    "T_undefined",
];

/// Shared error-handler labels the runtime defines and the generated
/// program jumps to (spec.md §6).
pub const L_ERROR_FVAR_UNDEFINED: &str = "L_error_fvar_undefined";
pub const L_ERROR_NON_CLOSURE: &str = "L_error_non_closure";
pub const L_ERROR_INCORRECT_ARITY_SIMPLE: &str = "L_error_incorrect_arity_simple";
pub const L_ERROR_INCORRECT_ARITY_OPT: &str = "L_error_incorrect_arity_opt";

/// The runtime routine that prints a top-level result unless it is
/// `#void` (spec.md §6(g)) -- `display`/`write`/`newline` share this same
/// entry point but are ordinary bound primitives besides.
pub const PRINT_IF_NOT_VOID: &str = "print_if_not_void";

/// The shared sentinel every free-variable slot starts out pointing at.
pub const L_UNDEFINED_OBJECT: &str = "L_undefined_object";

/// The constants table's base label.
pub const L_CONSTANTS: &str = "L_constants";

/// `(Scheme name, runtime code-pointer label)` pairs (spec.md §6, enumerated
/// by SPEC_FULL.md §8). This is the single source of truth for both the
/// primitive-binding loop emitted at program start and the initial name set
/// `tables::free_vars` seeds itself with.
pub const PRIMITIVES: &[(&str, &str)] = &[
    // Type predicates
    ("eq?", "prim_eq_Q_"),
    ("boolean?", "prim_boolean_Q_"),
    ("null?", "prim_null_Q_"),
    ("pair?", "prim_pair_Q_"),
    ("vector?", "prim_vector_Q_"),
    ("string?", "prim_string_Q_"),
    ("symbol?", "prim_symbol_Q_"),
    ("char?", "prim_char_Q_"),
    ("integer?", "prim_integer_Q_"),
    ("rational?", "prim_rational_Q_"),
    ("real?", "prim_real_Q_"),
    ("number?", "prim_number_Q_"),
    ("procedure?", "prim_procedure_Q_"),
    ("zero?", "prim_zero_Q_"),
    ("not", "prim_not"),
    // Pairs & lists
    ("cons", "prim_cons"),
    ("car", "prim_car"),
    ("cdr", "prim_cdr"),
    ("set-car!", "prim_set_car_BANG_"),
    ("set-cdr!", "prim_set_cdr_BANG_"),
    // Vectors
    ("vector", "prim_vector"),
    ("make-vector", "prim_make_vector"),
    ("vector-length", "prim_vector_length"),
    ("vector-ref", "prim_vector_ref"),
    ("vector-set!", "prim_vector_set_BANG_"),
    // Strings
    ("string-length", "prim_string_length"),
    ("string-ref", "prim_string_ref"),
    ("string-set!", "prim_string_set_BANG_"),
    ("make-string", "prim_make_string"),
    ("string->symbol", "prim_string_GT_symbol"),
    ("symbol->string", "prim_symbol_GT_string"),
    ("string-append", "prim_string_append"),
    ("format", "prim_format"),
    // Arithmetic
    ("+", "prim_add"),
    ("-", "prim_sub"),
    ("*", "prim_mul"),
    ("/", "prim_div"),
    ("=", "prim_num_eq"),
    ("<", "prim_num_lt"),
    (">", "prim_num_gt"),
    ("<=", "prim_num_le"),
    (">=", "prim_num_ge"),
    ("quotient", "prim_quotient"),
    ("remainder", "prim_remainder"),
    ("modulo", "prim_modulo"),
    ("numerator", "prim_numerator"),
    ("denominator", "prim_denominator"),
    ("exact->inexact", "prim_exact_GT_inexact"),
    ("inexact->exact", "prim_inexact_GT_exact"),
    // Symbols/chars
    ("char->integer", "prim_char_GT_integer"),
    ("integer->char", "prim_integer_GT_char"),
    ("gensym", "prim_gensym"),
    // display/write/newline share the print-if-not-void runtime entry point
    // (spec.md §6(g)) but are still ordinary bound primitives.
    ("display", "prim_display"),
    ("write", "prim_write"),
    ("newline", "prim_newline"),
];

/// Higher-order list helpers seeded as Scheme-level library procedures
/// rather than runtime primitives (SPEC_FULL.md §8): they are free
/// variables like any other until a prelude defines them, so they are not
/// part of `PRIMITIVES`, but their names are still reserved here as the one
/// place that enumerates them.
pub const LIBRARY_PROCEDURES: &[&str] = &["map", "apply", "list", "append", "length"];

/// The first prologue fragment: NASM macros for frame access, the program
/// entry point, and `extern` declarations for the runtime support routines
/// this compiler calls but does not define.
pub const PROLOGUE: &str = r#"; ---- generated by schemec; runtime contract per spec.md §6 ----
%define PARAM(i) qword [rbp + 32 + 8 * (i)]
%define ENV qword [rbp + 16]
%define COUNT qword [rbp + 24]
%macro AND_KILL_FRAME 1
    add rsp, 8 * (%1)
%endmacro

; A closure object is 17 bytes: RTTI byte, environment pointer, code pointer.
%define SOB_CLOSURE_ENV(r) qword [r + 1]
%define SOB_CLOSURE_CODE(r) qword [r + 9]

extern malloc
extern bind_primitive
extern print_if_not_void
extern sob_boolean_false
extern sob_nil
extern sob_void
extern L_error_fvar_undefined
extern L_error_non_closure
extern L_error_incorrect_arity_simple
extern L_error_incorrect_arity_opt

global main
"#;

/// The second prologue fragment, emitted after the free-vars table and
/// before the primitive-binding loop (spec.md §6(d)).
pub const SECOND_PROLOGUE: &str = r#"section .text
main:
    push rbp
    mov rbp, rsp
"#;

/// The fixed epilogue fragment, emitted after the final print-if-not-void
/// call (spec.md §6(g)).
pub const EPILOGUE: &str = r#"    mov rax, 0
    leave
    ret
"#;
