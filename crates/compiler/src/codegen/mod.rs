//! x86-64 (NASM-syntax) code generation (spec.md §4.5, §6).
//!
//! # Calling convention
//!
//! From the callee's own `rbp`: `[rbp+16]` is the environment pointer,
//! `[rbp+24]` is the argument count, `[rbp+32+8*i]` is the `i`-th actual
//! argument. A closure is a 17-byte object: an RTTI byte, an environment
//! pointer, and a code pointer. Every lowered expression leaves a pointer
//! to its resulting boxed value in `rax` and nothing else on the stack --
//! that convention is what lets `expr.rs` compose nodes with no separate
//! bookkeeping.
//!
//! Non-tail calls use an ordinary `call`/return. Tail calls overlay the
//! new argument block onto the caller's own frame and `jmp` directly to
//! the callee's code, so tail-recursive Scheme loops run in bounded
//! native stack space (spec.md §4.5).
//!
//! # Module structure
//!
//! - `state.rs`: the `CodeGen` struct, label minting, name mangling.
//! - `program.rs`: the top-level entry point assembling the whole `.asm`
//!   file in spec.md §6's fixed order.
//! - `expr.rs`: per-node lowering for every `Ast` variant except `Lambda`
//!   and `Applic`.
//! - `closure.rs`: `Lambda` (closure allocation, arity normalization) and
//!   `Applic` (both calling conventions).
//! - `runtime.rs`: the fixed runtime contract this compiler consumes --
//!   RTTI names, error labels, the primitive table, the prologue/epilogue
//!   text fragments -- but never generates.
//! - `error.rs`: `CodeGenError`.

mod closure;
mod error;
mod expr;
mod program;
pub mod runtime;
mod state;

pub use error::CodeGenError;
pub use program::{emit_program, emit_program_with_config};
pub use state::CodeGen;
