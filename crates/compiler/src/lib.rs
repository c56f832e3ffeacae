//! schemec: a Scheme-to-x86-64 compiler.
//!
//! Four sequential stages (spec.md §1): read source into S-expressions,
//! expand tag forms and macros into an AST, run three fixed semantic
//! passes, then lower to NASM-syntax assembly text. Every stage returns
//! `Result<_, error::CompileError>`; the first error aborts the pipeline.
//!
//! # Extending the compiler
//!
//! External projects can register additional runtime primitives without
//! forking the compiler, via [`CompilerConfig`]:
//!
//! ```rust,ignore
//! use schemec::CompilerConfig;
//!
//! let config = CompilerConfig::new()
//!     .with_primitive("sqrt", "prim_sqrt")
//!     .with_primitive("string-reverse", "prim_string_reverse");
//!
//! let asm = schemec::compile_source_with_config(source, &config)?;
//! ```

pub mod ast;
pub mod codegen;
pub mod config;
pub mod error;
pub mod parser;
pub mod reader;
pub mod reserved;
pub mod semantic;
pub mod tables;

pub use ast::Ast;
pub use codegen::{emit_program, emit_program_with_config, CodeGen, CodeGenError};
pub use config::{CompilerConfig, ExternalPrimitive};
pub use error::CompileError;

use std::fs;
use std::path::Path;

/// Read, parse, and analyze `source`, stopping short of code generation
/// (the `check` CLI subcommand's pipeline, SPEC_FULL.md §9).
pub fn analyze_source(source: &str) -> Result<Vec<Ast>, CompileError> {
    let forms = reader::read_all(source)?;
    let program = parser::parse_program(&forms)?;
    Ok(program.into_iter().map(semantic::analyze).collect())
}

/// Compile `source` all the way to NASM-syntax assembly text, with the
/// default (empty) [`CompilerConfig`].
pub fn compile_source(source: &str) -> Result<String, CompileError> {
    compile_source_with_config(source, &CompilerConfig::default())
}

/// Compile `source` to assembly text, folding `config`'s external
/// primitives into the free-variables table and the primitive-binding
/// loop (SPEC_FULL.md §9).
pub fn compile_source_with_config(source: &str, config: &CompilerConfig) -> Result<String, CompileError> {
    let program = analyze_source(source)?;
    let asm = emit_program_with_config(&program, config)?;
    Ok(asm)
}

/// Compile a `.scm` source file and write the resulting assembly to
/// `output_path`, with the default (empty) [`CompilerConfig`].
pub fn compile_file(source_path: &Path, output_path: &Path) -> Result<(), CompileError> {
    compile_file_with_config(source_path, output_path, &CompilerConfig::default())
}

/// Compile a `.scm` source file and write the resulting assembly to
/// `output_path`, with a custom [`CompilerConfig`].
pub fn compile_file_with_config(
    source_path: &Path,
    output_path: &Path,
    config: &CompilerConfig,
) -> Result<(), CompileError> {
    let source = fs::read_to_string(source_path).map_err(|e| {
        CompileError::internal(format!("failed to read '{}': {e}", source_path.display()))
    })?;
    let asm = compile_source_with_config(&source, config)?;
    fs::write(output_path, asm).map_err(|e| {
        CompileError::internal(format!("failed to write '{}': {e}", output_path.display()))
    })?;
    Ok(())
}
