//! Abstract syntax tree for the core Scheme forms (spec.md §3).
//!
//! A single `Ast` sum type carries both the pre-analysis shape the tag
//! parser produces and the post-analysis fields the semantic analyzer fills
//! in: `Var::address` starts life as [`Address::Free`] and [`Applic::tail`]
//! starts as [`Tail::NonTail`] (the sentinel a not-yet-analyzed node would
//! have if it only ever saw the top level); `semantic::analyze` overwrites
//! both in place. This keeps one flat tagged sum and one `lower(node, ctx)`
//! dispatch in codegen, per spec.md §9's "AST as a tagged sum" note, rather
//! than two parallel node types connected by a second traversal.

use schemec_core::Sexpr;

/// Where a variable reference resolves (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Address {
    /// Not bound by any enclosing lambda; resolved against the free-variable
    /// table at run time.
    Free,
    /// The `i`-th parameter of the enclosing lambda (0-based).
    Param(usize),
    /// The `minor`-th slot of the rib `major` frames up the lexical environment.
    Bound(usize, usize),
}

/// A lexical reference: a name plus where it was resolved to.
#[derive(Debug, Clone, PartialEq)]
pub struct Var {
    pub name: String,
    pub address: Address,
}

impl Var {
    /// A variable as it appears fresh out of the tag parser: the name is
    /// known, the address is not yet resolved.
    pub fn unresolved(name: impl Into<String>) -> Var {
        Var {
            name: name.into(),
            address: Address::Free,
        }
    }
}

/// Whether a lambda takes a fixed argument list or a fixed list plus a rest
/// parameter (spec.md §3, §4.2 "Lambda parameter parsing").
#[derive(Debug, Clone, PartialEq)]
pub enum LambdaKind {
    Simple,
    /// The rest parameter's name.
    Opt(String),
}

/// Whether an application occupies tail position (spec.md §4.3 Pass 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tail {
    Tail,
    NonTail,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Ast {
    Const(Sexpr),
    VarGet(Var),
    VarSet(Var, Box<Ast>),
    VarDef(Var, Box<Ast>),
    If(Box<Ast>, Box<Ast>, Box<Ast>),
    Seq(Vec<Ast>),
    Or(Vec<Ast>),
    Lambda {
        params: Vec<String>,
        kind: LambdaKind,
        body: Box<Ast>,
    },
    Applic {
        proc: Box<Ast>,
        args: Vec<Ast>,
        tail: Tail,
    },
    /// Allocate a box for `var` and bind it; emitted as the boxing prologue
    /// by `semantic::boxing` (spec.md §4.3 Pass 3).
    Box(Var),
    BoxGet(Var),
    BoxSet(Var, Box<Ast>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_var_is_unresolved_free() {
        let v = Var::unresolved("x");
        assert_eq!(v.address, Address::Free);
        assert_eq!(v.name, "x");
    }
}
