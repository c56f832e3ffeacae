//! Constants & free-variables tables (spec.md §4.4).
//!
//! Both tables are pure functions of the enriched AST (plus the fixed
//! primitive name list in [`crate::codegen::runtime::PRIMITIVES`]) -- no
//! shared mutable registry, per spec.md §9's preference for no global state.

pub mod constants;
pub mod free_vars;

pub use constants::{ConstEntry, ConstantsTable};
pub use free_vars::{FreeVarEntry, FreeVarsTable};
