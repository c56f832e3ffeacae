//! Semantic analyzer: three sequential total transformations of the AST
//! (spec.md §4.3), split into sibling submodules mirroring the three passes.

pub mod boxing;
pub mod lexical;
pub mod tail;

use crate::ast::Ast;

/// Run all three passes in order. This is the only entry point the rest of
/// the pipeline calls.
pub fn analyze(ast: Ast) -> Ast {
    let ast = lexical::analyze(ast);
    let ast = tail::analyze(ast);
    boxing::analyze(ast)
}
