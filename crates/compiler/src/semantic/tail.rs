//! Pass 2 — tail-call annotation (spec.md §4.3).
//!
//! Carries a single boolean, `in_tail`, false at the program root. A lambda
//! body is always entered in tail position; everything else propagates
//! `in_tail` only into its own tail sub-expression and forces `false`
//! everywhere else.

use crate::ast::{Ast, Tail};

pub fn analyze(ast: Ast) -> Ast {
    annotate(ast, false)
}

fn annotate(ast: Ast, in_tail: bool) -> Ast {
    match ast {
        Ast::Const(s) => Ast::Const(s),
        Ast::VarGet(v) => Ast::VarGet(v),
        Ast::VarSet(v, e) => Ast::VarSet(v, Box::new(annotate(*e, false))),
        Ast::VarDef(v, e) => Ast::VarDef(v, Box::new(annotate(*e, false))),
        Ast::If(t, c, a) => Ast::If(
            Box::new(annotate(*t, false)),
            Box::new(annotate(*c, in_tail)),
            Box::new(annotate(*a, in_tail)),
        ),
        Ast::Seq(xs) => Ast::Seq(annotate_sequence(xs, in_tail)),
        Ast::Or(xs) => Ast::Or(annotate_sequence(xs, in_tail)),
        Ast::Lambda { params, kind, body } => Ast::Lambda {
            params,
            kind,
            body: Box::new(annotate(*body, true)),
        },
        Ast::Applic { proc, args, .. } => Ast::Applic {
            proc: Box::new(annotate(*proc, false)),
            args: args.into_iter().map(|a| annotate(a, false)).collect(),
            tail: if in_tail { Tail::Tail } else { Tail::NonTail },
        },
        Ast::Box(v) => Ast::Box(v),
        Ast::BoxGet(v) => Ast::BoxGet(v),
        Ast::BoxSet(v, e) => Ast::BoxSet(v, Box::new(annotate(*e, false))),
    }
}

fn annotate_sequence(xs: Vec<Ast>, in_tail: bool) -> Vec<Ast> {
    let last = xs.len().saturating_sub(1);
    xs.into_iter()
        .enumerate()
        .map(|(i, x)| annotate(x, in_tail && i == last))
        .collect()
}
