//! Pass 3 — automatic boxing (spec.md §4.3).
//!
//! A parameter `x` of lambda `L` is boxed iff its body contains a read and a
//! write that cannot both see the same runtime binding through parameter
//! slots alone. Concretely, classify every occurrence of `x` in `L`'s body
//! by *which immediate child lambda of `L`* contains it (`None` if the
//! occurrence sits directly in `L`'s body with no intervening lambda; deeper
//! nesting under the same immediate child keeps that child's tag, since one
//! invocation of that child always sees the same captured rib of `L`). `x`
//! is boxed iff some read's tag differs from some write's tag.
//!
//! Implemented as the reference compiler's capture-analysis module is: a
//! handful of pure functions over the enriched AST, each independently
//! testable, rather than one monolithic mutating visitor. `collect`/`decide`
//! inspect; `rewrite`/`prepend_box_prologue` build the replacement tree.

use crate::ast::{Address, Ast, LambdaKind, Var};
use std::collections::HashSet;

pub fn analyze(ast: Ast) -> Ast {
    apply(ast)
}

fn apply(ast: Ast) -> Ast {
    match ast {
        Ast::Const(s) => Ast::Const(s),
        Ast::VarGet(v) => Ast::VarGet(v),
        Ast::VarSet(v, e) => Ast::VarSet(v, Box::new(apply(*e))),
        Ast::VarDef(v, e) => Ast::VarDef(v, Box::new(apply(*e))),
        Ast::If(t, c, a) => Ast::If(Box::new(apply(*t)), Box::new(apply(*c)), Box::new(apply(*a))),
        Ast::Seq(xs) => Ast::Seq(xs.into_iter().map(apply).collect()),
        Ast::Or(xs) => Ast::Or(xs.into_iter().map(apply).collect()),
        Ast::Applic { proc, args, tail } => Ast::Applic {
            proc: Box::new(apply(*proc)),
            args: args.into_iter().map(apply).collect(),
            tail,
        },
        Ast::Lambda { params, kind, body } => Ast::Lambda {
            params: params.clone(),
            kind: kind.clone(),
            body: Box::new(box_lambda_body(&params, &kind, *body)),
        },
        Ast::Box(v) => Ast::Box(v),
        Ast::BoxGet(v) => Ast::BoxGet(v),
        Ast::BoxSet(v, e) => Ast::BoxSet(v, Box::new(apply(*e))),
    }
}

fn full_param_names(params: &[String], kind: &LambdaKind) -> Vec<String> {
    let mut names = params.to_vec();
    if let LambdaKind::Opt(rest) = kind {
        names.push(rest.clone());
    }
    names
}

fn box_lambda_body(params: &[String], kind: &LambdaKind, body: Ast) -> Ast {
    let full_names = full_param_names(params, kind);
    let occurrences = collect(&body);
    let boxed_indices = decide(&occurrences, full_names.len());
    let boxed_set: HashSet<usize> = boxed_indices.iter().copied().collect();
    let rewritten = rewrite(body, 0, &boxed_set);
    let with_prologue = prepend_box_prologue(rewritten, &boxed_indices, &full_names);
    apply(with_prologue)
}

struct Occurrence {
    idx: usize,
    is_write: bool,
    tag: Option<usize>,
}

/// `addr` is an occurrence of parameter `idx` of the lambda currently being
/// analyzed iff it is a direct `Param(idx)` at `depth` 0, or a `Bound(depth -
/// 1, idx)` at a positive depth (one level of `Bound` major per intervening
/// lambda crossed while descending from that lambda's own body).
fn logical_index_at_depth(addr: &Address, depth: usize) -> Option<usize> {
    match (addr, depth) {
        (Address::Param(idx), 0) => Some(*idx),
        (Address::Bound(major, idx), d) if d > 0 && *major == d - 1 => Some(*idx),
        _ => None,
    }
}

fn collect(body: &Ast) -> Vec<Occurrence> {
    let mut out = Vec::new();
    walk_collect(body, 0, None, &mut out);
    out
}

fn walk_collect(ast: &Ast, depth: usize, tag: Option<usize>, out: &mut Vec<Occurrence>) {
    match ast {
        Ast::Const(_) | Ast::Box(_) | Ast::BoxGet(_) => {}
        Ast::VarGet(v) => {
            if let Some(idx) = logical_index_at_depth(&v.address, depth) {
                out.push(Occurrence { idx, is_write: false, tag });
            }
        }
        Ast::VarSet(v, e) => {
            if let Some(idx) = logical_index_at_depth(&v.address, depth) {
                out.push(Occurrence { idx, is_write: true, tag });
            }
            walk_collect(e, depth, tag, out);
        }
        Ast::BoxSet(_, e) => walk_collect(e, depth, tag, out),
        Ast::VarDef(_, e) => walk_collect(e, depth, tag, out),
        Ast::If(t, c, a) => {
            walk_collect(t, depth, tag, out);
            walk_collect(c, depth, tag, out);
            walk_collect(a, depth, tag, out);
        }
        Ast::Seq(xs) | Ast::Or(xs) => {
            for x in xs {
                walk_collect(x, depth, tag, out);
            }
        }
        Ast::Applic { proc, args, .. } => {
            walk_collect(proc, depth, tag, out);
            for a in args {
                walk_collect(a, depth, tag, out);
            }
        }
        Ast::Lambda { body, .. } => {
            let new_depth = depth + 1;
            let new_tag = if depth == 0 {
                Some(ast as *const Ast as usize)
            } else {
                tag
            };
            walk_collect(body, new_depth, new_tag, out);
        }
    }
}

fn decide(occurrences: &[Occurrence], total_params: usize) -> Vec<usize> {
    let mut boxed = Vec::new();
    for idx in 0..total_params {
        let mut reads = occurrences.iter().filter(|o| o.idx == idx && !o.is_write);
        let writes: Vec<_> = occurrences
            .iter()
            .filter(|o| o.idx == idx && o.is_write)
            .map(|o| o.tag)
            .collect();
        if reads.any(|r| writes.iter().any(|w| *w != r.tag)) {
            boxed.push(idx);
        }
    }
    boxed
}

fn rewrite(ast: Ast, depth: usize, boxed: &HashSet<usize>) -> Ast {
    match ast {
        Ast::Const(s) => Ast::Const(s),
        Ast::VarGet(v) => match logical_index_at_depth(&v.address, depth) {
            Some(idx) if boxed.contains(&idx) => Ast::BoxGet(v),
            _ => Ast::VarGet(v),
        },
        Ast::VarSet(v, e) => {
            let e = Box::new(rewrite(*e, depth, boxed));
            match logical_index_at_depth(&v.address, depth) {
                Some(idx) if boxed.contains(&idx) => Ast::BoxSet(v, e),
                _ => Ast::VarSet(v, e),
            }
        }
        Ast::VarDef(v, e) => Ast::VarDef(v, Box::new(rewrite(*e, depth, boxed))),
        Ast::If(t, c, a) => Ast::If(
            Box::new(rewrite(*t, depth, boxed)),
            Box::new(rewrite(*c, depth, boxed)),
            Box::new(rewrite(*a, depth, boxed)),
        ),
        Ast::Seq(xs) => Ast::Seq(xs.into_iter().map(|x| rewrite(x, depth, boxed)).collect()),
        Ast::Or(xs) => Ast::Or(xs.into_iter().map(|x| rewrite(x, depth, boxed)).collect()),
        Ast::Applic { proc, args, tail } => Ast::Applic {
            proc: Box::new(rewrite(*proc, depth, boxed)),
            args: args.into_iter().map(|a| rewrite(a, depth, boxed)).collect(),
            tail,
        },
        Ast::Lambda { params, kind, body } => Ast::Lambda {
            params,
            kind,
            body: Box::new(rewrite(*body, depth + 1, boxed)),
        },
        Ast::Box(v) => Ast::Box(v),
        Ast::BoxGet(v) => Ast::BoxGet(v),
        Ast::BoxSet(v, e) => Ast::BoxSet(v, Box::new(rewrite(*e, depth, boxed))),
    }
}

/// Preserves left-to-right parameter order (`boxed_indices` is built in
/// ascending order by `decide`).
fn prepend_box_prologue(body: Ast, boxed_indices: &[usize], full_names: &[String]) -> Ast {
    if boxed_indices.is_empty() {
        return body;
    }
    let mut prologue: Vec<Ast> = boxed_indices
        .iter()
        .map(|&idx| {
            let var = Var {
                name: full_names[idx].clone(),
                address: Address::Param(idx),
            };
            Ast::VarSet(var.clone(), Box::new(Ast::Box(var)))
        })
        .collect();
    match body {
        Ast::Seq(mut rest) => {
            prologue.append(&mut rest);
            Ast::Seq(prologue)
        }
        other => {
            prologue.push(other);
            Ast::Seq(prologue)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::reader::read_all;
    use crate::semantic::lexical;

    fn boxed_analyze(src: &str) -> Ast {
        let form = read_all(src).unwrap().into_iter().next().unwrap();
        analyze(lexical::analyze(parse(&form).unwrap()))
    }

    #[test]
    fn unboxed_when_read_and_write_both_direct() {
        match boxed_analyze("(lambda (x) (begin (set! x 1) x))") {
            Ast::Lambda { body, .. } => {
                assert!(!contains_box_node(&body));
            }
            other => panic!("expected Lambda, got {other:?}"),
        }
    }

    #[test]
    fn boxed_when_write_direct_and_read_in_nested_closure() {
        match boxed_analyze("(lambda (x) (begin (set! x 1) (lambda () x)))") {
            Ast::Lambda { body, .. } => assert!(contains_box_node(&body)),
            other => panic!("expected Lambda, got {other:?}"),
        }
    }

    #[test]
    fn boxed_when_read_and_write_in_different_sibling_closures() {
        let src = "(lambda (x) (begin (lambda () (set! x 1)) (lambda () x)))";
        match boxed_analyze(src) {
            Ast::Lambda { body, .. } => assert!(contains_box_node(&body)),
            other => panic!("expected Lambda, got {other:?}"),
        }
    }

    #[test]
    fn unboxed_when_read_and_write_share_the_same_nested_closure() {
        let src = "(lambda (x) (lambda () (begin (set! x 1) x)))";
        match boxed_analyze(src) {
            Ast::Lambda { body, .. } => assert!(!contains_box_node(&body)),
            other => panic!("expected Lambda, got {other:?}"),
        }
    }

    #[test]
    fn read_only_parameter_is_never_boxed() {
        match boxed_analyze("(lambda (x) (lambda () x))") {
            Ast::Lambda { body, .. } => assert!(!contains_box_node(&body)),
            other => panic!("expected Lambda, got {other:?}"),
        }
    }

    #[test]
    fn box_prologue_precedes_rest_of_body_and_preserves_order() {
        let src = "(lambda (x y) (begin (set! x 1) (set! y 2) (lambda () (+ x y))))";
        match boxed_analyze(src) {
            Ast::Lambda { body, .. } => match *body {
                Ast::Seq(items) => {
                    assert!(matches!(&items[0], Ast::VarSet(v, boxed) if v.name == "x" && matches!(**boxed, Ast::Box(_))));
                    assert!(matches!(&items[1], Ast::VarSet(v, boxed) if v.name == "y" && matches!(**boxed, Ast::Box(_))));
                }
                other => panic!("expected Seq prologue, got {other:?}"),
            },
            other => panic!("expected Lambda, got {other:?}"),
        }
    }

    fn contains_box_node(ast: &Ast) -> bool {
        match ast {
            Ast::Box(_) | Ast::BoxGet(_) | Ast::BoxSet(_, _) => true,
            Ast::VarSet(_, e) | Ast::VarDef(_, e) => contains_box_node(e),
            Ast::If(t, c, a) => contains_box_node(t) || contains_box_node(c) || contains_box_node(a),
            Ast::Seq(xs) | Ast::Or(xs) => xs.iter().any(contains_box_node),
            Ast::Applic { proc, args, .. } => {
                contains_box_node(proc) || args.iter().any(contains_box_node)
            }
            Ast::Lambda { body, .. } => contains_box_node(body),
            Ast::Const(_) | Ast::VarGet(_) => false,
        }
    }
}
