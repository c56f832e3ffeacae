//! Tag parser and macro expansion (spec.md §4.2).
//!
//! Every derived form expands to a plain `Sexpr` and is re-fed to [`parse`]
//! rather than built directly as an `Ast` -- this is what makes macro
//! expansion idempotent (Testable Property 2): printing an already-analyzed
//! `Ast` back to source and re-parsing it reaches the same fixpoint, because
//! there is exactly one path from source text to `Ast` regardless of how
//! many derived forms were involved.

use crate::ast::{Ast, LambdaKind, Tail, Var};
use crate::error::CompileError;
use crate::reserved::is_reserved;
use schemec_core::Sexpr;
use std::collections::HashSet;

/// Parse every top-level form independently, so a later form's error never
/// hides an earlier form's offending text (spec.md §7).
pub fn parse_program(forms: &[Sexpr]) -> Result<Vec<Ast>, CompileError> {
    forms.iter().map(parse).collect()
}

pub fn parse(form: &Sexpr) -> Result<Ast, CompileError> {
    match form {
        Sexpr::Void | Sexpr::Bool(_) | Sexpr::Char(_) | Sexpr::Str(_) | Sexpr::Number(_) => {
            Ok(Ast::Const(form.clone()))
        }
        Sexpr::Symbol(name) => {
            if is_reserved(name) {
                return Err(CompileError::syntax_at(
                    format!("reserved word '{name}' used as a variable"),
                    form,
                ));
            }
            Ok(Ast::VarGet(Var::unresolved(name.to_string())))
        }
        Sexpr::Nil => Err(CompileError::syntax_at("empty application", form)),
        Sexpr::Vector(_) => Err(CompileError::syntax_at(
            "a vector literal must be quoted",
            form,
        )),
        Sexpr::Pair(_) => parse_pair(form),
    }
}

fn parse_pair(form: &Sexpr) -> Result<Ast, CompileError> {
    let (head, tail) = form.as_pair().expect("Pair variant");
    let (args, dotted_tail) = tail.list_items();
    if !dotted_tail.is_nil() {
        return Err(CompileError::syntax_at("improper combination", form));
    }
    if let Some(name) = head.as_symbol() {
        match name {
            "quote" => {
                return match args.as_slice() {
                    [x] => Ok(Ast::Const(x.clone())),
                    _ => Err(CompileError::syntax_at(
                        "quote requires exactly one argument",
                        form,
                    )),
                };
            }
            "if" => return parse_if(&args),
            "or" => return parse_or(&args),
            "begin" => return parse_begin(&args),
            "and" => return parse(&expand_and(&args)),
            "cond" => return parse(&expand_cond(&args)?),
            "quasiquote" => {
                return match args.as_slice() {
                    [t] => parse(&expand_quasiquote(t)),
                    _ => Err(CompileError::syntax_at(
                        "quasiquote requires exactly one argument",
                        form,
                    )),
                };
            }
            "let" => {
                let (bindings, body) = split_let_form(&args)?;
                return parse(&expand_let(&bindings, &body)?);
            }
            "let*" => {
                let (bindings, body) = split_let_form(&args)?;
                return parse(&expand_let_star(&bindings, &body)?);
            }
            "letrec" => {
                let (bindings, body) = split_let_form(&args)?;
                return parse(&expand_letrec(&bindings, &body)?);
            }
            "define" => return parse_define(&args),
            "set!" => return parse_set(&args),
            "lambda" => return parse_lambda(&args),
            "do" => return Err(CompileError::not_yet_implemented("do loops")),
            _ if is_reserved(name) => {
                return Err(CompileError::syntax_at(
                    format!("reserved word '{name}' used in operator position"),
                    form,
                ));
            }
            _ => {}
        }
    }
    parse_application(head, &args)
}

fn parse_application(head: &Sexpr, args: &[Sexpr]) -> Result<Ast, CompileError> {
    let proc = parse(head)?;
    let args = args.iter().map(parse).collect::<Result<Vec<_>, _>>()?;
    Ok(Ast::Applic {
        proc: Box::new(proc),
        args,
        tail: Tail::NonTail,
    })
}

fn parse_if(args: &[Sexpr]) -> Result<Ast, CompileError> {
    match args {
        [test, then] => Ok(Ast::If(
            Box::new(parse(test)?),
            Box::new(parse(then)?),
            Box::new(Ast::Const(Sexpr::Void)),
        )),
        [test, then, otherwise] => Ok(Ast::If(
            Box::new(parse(test)?),
            Box::new(parse(then)?),
            Box::new(parse(otherwise)?),
        )),
        _ => Err(CompileError::syntax("if requires two or three arguments")),
    }
}

fn parse_or(args: &[Sexpr]) -> Result<Ast, CompileError> {
    match args {
        [] => Ok(Ast::Const(Sexpr::Bool(false))),
        [only] => parse(only),
        many => Ok(Ast::Or(many.iter().map(parse).collect::<Result<_, _>>()?)),
    }
}

fn parse_begin(args: &[Sexpr]) -> Result<Ast, CompileError> {
    match args {
        [] => Ok(Ast::Const(Sexpr::Void)),
        [only] => parse(only),
        many => Ok(Ast::Seq(many.iter().map(parse).collect::<Result<_, _>>()?)),
    }
}

/// `(and e1 e2 … en)` right-folds into `(if e1 (if e2 … en #f) #f)` (spec.md §4.2).
fn expand_and(args: &[Sexpr]) -> Sexpr {
    match args {
        [] => Sexpr::Bool(true),
        [only] => only.clone(),
        [first, rest @ ..] => Sexpr::list(vec![
            Sexpr::symbol("if"),
            first.clone(),
            expand_and(rest),
            Sexpr::Bool(false),
        ]),
    }
}

fn expand_cond(clauses: &[Sexpr]) -> Result<Sexpr, CompileError> {
    let Some((clause, rest)) = clauses.split_first() else {
        return Ok(Sexpr::Void);
    };
    let (head, tail) = clause
        .as_pair()
        .ok_or_else(|| CompileError::syntax_at("malformed cond clause", clause))?;
    let (body, dotted) = tail.list_items();
    if !dotted.is_nil() {
        return Err(CompileError::syntax_at("malformed cond clause", clause));
    }
    if head.as_symbol() == Some("else") {
        return Ok(begin_wrap(&body));
    }
    if body.len() == 2 && body[0].as_symbol() == Some("=>") {
        let rest_expanded = expand_cond(rest)?;
        return Ok(expand_cond_arrow(head.clone(), body[1].clone(), rest_expanded));
    }
    let rest_expanded = expand_cond(rest)?;
    Ok(Sexpr::list(vec![
        Sexpr::symbol("if"),
        head.clone(),
        begin_wrap(&body),
        rest_expanded,
    ]))
}

/// `(cond (t => f) …rest)` → `(let ((value t)(f (lambda () f))(rest (lambda
/// () rest‑expanded))) (if value ((f) value) (rest)))`. This reuses the bare
/// names `value`, `f`, `rest` exactly as spec.md §4.2's table does -- an
/// unhygienic expansion preserved deliberately (spec.md §9).
fn expand_cond_arrow(test: Sexpr, receiver: Sexpr, rest_expanded: Sexpr) -> Sexpr {
    let value = Sexpr::symbol("value");
    let f = Sexpr::symbol("f");
    let rest = Sexpr::symbol("rest");
    Sexpr::list(vec![
        Sexpr::symbol("let"),
        Sexpr::list(vec![
            Sexpr::list(vec![value.clone(), test]),
            Sexpr::list(vec![
                f.clone(),
                Sexpr::list(vec![Sexpr::symbol("lambda"), Sexpr::Nil, receiver]),
            ]),
            Sexpr::list(vec![
                rest.clone(),
                Sexpr::list(vec![Sexpr::symbol("lambda"), Sexpr::Nil, rest_expanded]),
            ]),
        ]),
        Sexpr::list(vec![
            Sexpr::symbol("if"),
            value.clone(),
            Sexpr::list(vec![Sexpr::list(vec![f.clone()]), value]),
            Sexpr::list(vec![rest]),
        ]),
    ])
}

fn begin_wrap(body: &[Sexpr]) -> Sexpr {
    Sexpr::list(std::iter::once(Sexpr::symbol("begin")).chain(body.iter().cloned()))
}

fn split_let_form(args: &[Sexpr]) -> Result<(Vec<Sexpr>, Vec<Sexpr>), CompileError> {
    let (bindings_form, body) = args
        .split_first()
        .ok_or_else(|| CompileError::syntax("let requires a binding list"))?;
    if !bindings_form.is_proper_list() {
        return Err(CompileError::syntax_at("malformed binding list", bindings_form));
    }
    let (bindings, _) = bindings_form.list_items();
    Ok((bindings, body.to_vec()))
}

fn parse_binding(b: &Sexpr) -> Result<(String, Sexpr), CompileError> {
    let (items, tail) = b.list_items();
    if !tail.is_nil() || items.len() != 2 {
        return Err(CompileError::syntax_at("malformed binding", b));
    }
    let name = items[0]
        .as_symbol()
        .ok_or_else(|| CompileError::syntax_at("binding name must be a symbol", &items[0]))?;
    if is_reserved(name) {
        return Err(CompileError::syntax_at(
            format!("reserved word '{name}' used as a binding name"),
            &items[0],
        ));
    }
    Ok((name.to_string(), items[1].clone()))
}

/// `(let () body…)` → `((lambda () (begin body…)))`; `(let ((x e)…) body…)`
/// → `((lambda (x…) (begin body…)) e…)` (spec.md §4.2).
fn expand_let(bindings: &[Sexpr], body: &[Sexpr]) -> Result<Sexpr, CompileError> {
    let mut names = Vec::new();
    let mut inits = Vec::new();
    for binding in bindings {
        let (name, init) = parse_binding(binding)?;
        names.push(Sexpr::symbol(name));
        inits.push(init);
    }
    let lambda = Sexpr::list(vec![
        Sexpr::symbol("lambda"),
        Sexpr::list(names),
        begin_wrap(body),
    ]);
    Ok(Sexpr::list(
        std::iter::once(lambda).chain(inits),
    ))
}

/// `(let* ((x e) rest…) body…)` → `((lambda (x) (let* (rest…) body…)) e)`,
/// computed directly rather than re-emitted and re-parsed (spec.md §4.2).
fn expand_let_star(bindings: &[Sexpr], body: &[Sexpr]) -> Result<Sexpr, CompileError> {
    match bindings.split_first() {
        None => expand_let(&[], body),
        Some((first, rest)) => {
            let (name, init) = parse_binding(first)?;
            let inner = expand_let_star(rest, body)?;
            let lambda = Sexpr::list(vec![
                Sexpr::symbol("lambda"),
                Sexpr::list(vec![Sexpr::symbol(name)]),
                inner,
            ]);
            Ok(Sexpr::list(vec![lambda, init]))
        }
    }
}

/// `(letrec ((x e)…) body…)` → `(let ((x (quote whatever))…) (set! x e)… body…)`.
fn expand_letrec(bindings: &[Sexpr], body: &[Sexpr]) -> Result<Sexpr, CompileError> {
    let mut let_bindings = Vec::new();
    let mut sets = Vec::new();
    for binding in bindings {
        let (name, init) = parse_binding(binding)?;
        let_bindings.push(Sexpr::list(vec![
            Sexpr::symbol(name.clone()),
            Sexpr::list(vec![Sexpr::symbol("quote"), Sexpr::symbol("whatever")]),
        ]));
        sets.push(Sexpr::list(vec![
            Sexpr::symbol("set!"),
            Sexpr::symbol(name),
            init,
        ]));
    }
    let mut let_body = sets;
    let_body.extend(body.iter().cloned());
    Ok(Sexpr::list(
        std::iter::once(Sexpr::symbol("let"))
            .chain(std::iter::once(Sexpr::list(let_bindings)))
            .chain(let_body),
    ))
}

fn parse_define(args: &[Sexpr]) -> Result<Ast, CompileError> {
    let (target, rest) = args
        .split_first()
        .ok_or_else(|| CompileError::syntax("define requires a target"))?;
    match target {
        Sexpr::Pair(_) => {
            let (name_expr, params) = target.as_pair().expect("Pair variant");
            let name = name_expr.as_symbol().ok_or_else(|| {
                CompileError::syntax_at("define target must be a symbol", name_expr)
            })?;
            if is_reserved(name) {
                return Err(CompileError::syntax_at(
                    format!("reserved word '{name}' used as a definition target"),
                    name_expr,
                ));
            }
            let lambda = Sexpr::list(vec![
                Sexpr::symbol("lambda"),
                params.clone(),
                begin_wrap(rest),
            ]);
            let value = parse(&lambda)?;
            Ok(Ast::VarDef(Var::unresolved(name.to_string()), Box::new(value)))
        }
        Sexpr::Symbol(name) => {
            if is_reserved(name) {
                return Err(CompileError::syntax_at(
                    format!("reserved word '{name}' used as a definition target"),
                    target,
                ));
            }
            if rest.len() != 1 {
                return Err(CompileError::syntax("define requires exactly one value expression"));
            }
            let value = parse(&rest[0])?;
            Ok(Ast::VarDef(Var::unresolved(name.to_string()), Box::new(value)))
        }
        _ => Err(CompileError::syntax_at("malformed define target", target)),
    }
}

fn parse_set(args: &[Sexpr]) -> Result<Ast, CompileError> {
    let [name_expr, value_expr] = args else {
        return Err(CompileError::syntax("set! requires exactly two arguments"));
    };
    let name = name_expr
        .as_symbol()
        .ok_or_else(|| CompileError::syntax_at("set! target must be a symbol", name_expr))?;
    if is_reserved(name) {
        return Err(CompileError::syntax_at(
            format!("reserved word '{name}' used as a set! target"),
            name_expr,
        ));
    }
    let value = parse(value_expr)?;
    Ok(Ast::VarSet(Var::unresolved(name.to_string()), Box::new(value)))
}

fn parse_lambda(args: &[Sexpr]) -> Result<Ast, CompileError> {
    let (header, body) = args
        .split_first()
        .ok_or_else(|| CompileError::syntax("lambda requires a parameter list"))?;
    let (params, kind) = parse_lambda_header(header)?;
    reject_nested_define(body)?;
    let body_ast = parse(&begin_wrap(body))?;
    Ok(Ast::Lambda {
        params,
        kind,
        body: Box::new(body_ast),
    })
}

/// Nested `define` inside a non-top-level body is explicitly out of scope
/// (spec.md §1 Non-goals, §7 `NotYetImplemented`). `begin` doesn't introduce
/// a new body position, so its sub-forms are checked too; a nested `lambda`
/// does, so its own body gets this same check when it is itself parsed.
fn reject_nested_define(body: &[Sexpr]) -> Result<(), CompileError> {
    for form in body {
        if let Some((head, tail)) = form.as_pair() {
            match head.as_symbol() {
                Some("define") => {
                    return Err(CompileError::not_yet_implemented(format!(
                        "nested define in a non-top-level body position: {form}"
                    )));
                }
                Some("begin") => {
                    let (items, _) = tail.list_items();
                    reject_nested_define(&items)?;
                }
                _ => {}
            }
        }
    }
    Ok(())
}

/// Accepts a proper list (`Simple`), a bare symbol (zero fixed + rest), or an
/// improper list (n fixed + rest); rejects duplicate parameter names across
/// the combined set (spec.md §4.2).
fn parse_lambda_header(header: &Sexpr) -> Result<(Vec<String>, LambdaKind), CompileError> {
    match header {
        Sexpr::Symbol(name) => {
            check_param_name(name, header)?;
            Ok((Vec::new(), LambdaKind::Opt(name.to_string())))
        }
        Sexpr::Nil => Ok((Vec::new(), LambdaKind::Simple)),
        Sexpr::Pair(_) => {
            let (items, tail) = header.list_items();
            let mut names = Vec::new();
            for item in &items {
                let name = item.as_symbol().ok_or_else(|| {
                    CompileError::syntax_at("lambda parameter must be a symbol", item)
                })?;
                check_param_name(name, item)?;
                names.push(name.to_string());
            }
            let kind = match &tail {
                Sexpr::Nil => LambdaKind::Simple,
                Sexpr::Symbol(rest_name) => {
                    check_param_name(rest_name, &tail)?;
                    LambdaKind::Opt(rest_name.to_string())
                }
                _ => return Err(CompileError::syntax_at("malformed lambda parameter list", header)),
            };
            let mut seen = HashSet::new();
            for name in names.iter().chain(match &kind {
                LambdaKind::Opt(rest_name) => Some(rest_name),
                LambdaKind::Simple => None,
            }) {
                if !seen.insert(name) {
                    return Err(CompileError::syntax_at(
                        format!("duplicate parameter name '{name}'"),
                        header,
                    ));
                }
            }
            Ok((names, kind))
        }
        _ => Err(CompileError::syntax_at("malformed lambda parameter list", header)),
    }
}

fn check_param_name(name: &str, form: &Sexpr) -> Result<(), CompileError> {
    if is_reserved(name) {
        Err(CompileError::syntax_at(
            format!("reserved word '{name}' used as a parameter"),
            form,
        ))
    } else {
        Ok(())
    }
}

/// Recursively rewrites a quasiquote template per spec.md §4.2.
fn expand_quasiquote(template: &Sexpr) -> Sexpr {
    match template {
        Sexpr::Nil => Sexpr::list(vec![Sexpr::symbol("quote"), Sexpr::Nil]),
        Sexpr::Symbol(_) => Sexpr::list(vec![Sexpr::symbol("quote"), template.clone()]),
        Sexpr::Pair(_) => expand_quasiquote_pair(template),
        Sexpr::Vector(items) => expand_quasiquote_vector(items),
        other => Sexpr::list(vec![Sexpr::symbol("quote"), other.clone()]),
    }
}

fn expand_quasiquote_pair(template: &Sexpr) -> Sexpr {
    let (head, tail) = template.as_pair().expect("Pair variant");
    if head.as_symbol() == Some("unquote") {
        let (items, _) = tail.list_items();
        return items.into_iter().next().unwrap_or(Sexpr::Void);
    }
    if let Some((inner_head, inner_tail)) = head.as_pair() {
        if inner_head.as_symbol() == Some("unquote") {
            let (items, _) = inner_tail.list_items();
            let e = items.into_iter().next().unwrap_or(Sexpr::Void);
            return Sexpr::list(vec![Sexpr::symbol("cons"), e, expand_quasiquote(tail)]);
        }
        if inner_head.as_symbol() == Some("unquote-splicing") {
            let (items, _) = inner_tail.list_items();
            let e = items.into_iter().next().unwrap_or(Sexpr::Void);
            return if tail.is_nil() {
                e
            } else {
                Sexpr::list(vec![Sexpr::symbol("append"), e, expand_quasiquote(tail)])
            };
        }
    }
    Sexpr::list(vec![
        Sexpr::symbol("cons"),
        expand_quasiquote(head),
        expand_quasiquote(tail),
    ])
}

fn expand_quasiquote_vector(items: &[Sexpr]) -> Sexpr {
    let has_splice = items.iter().any(|item| {
        item.as_pair()
            .and_then(|(h, _)| h.as_symbol())
            .is_some_and(|s| s == "unquote-splicing")
    });
    if has_splice {
        let list_template = Sexpr::list(items.to_vec());
        Sexpr::list(vec![
            Sexpr::symbol("list->vector"),
            expand_quasiquote(&list_template),
        ])
    } else {
        let mut call = vec![Sexpr::symbol("vector")];
        call.extend(items.iter().map(expand_quasiquote));
        Sexpr::list(call)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemec_core::Number;

    fn p(src: &str) -> Ast {
        let form = crate::reader::read_all(src).unwrap().into_iter().next().unwrap();
        parse(&form).unwrap()
    }

    #[test]
    fn literals_parse_to_const() {
        assert_eq!(p("42"), Ast::Const(Sexpr::Number(Number::Integer(42))));
        assert_eq!(p("#t"), Ast::Const(Sexpr::Bool(true)));
    }

    #[test]
    fn reserved_word_as_variable_errors() {
        let form = crate::reader::read_all("if").unwrap().into_iter().next().unwrap();
        assert!(parse(&form).is_err());
    }

    #[test]
    fn quote_yields_const_unevaluated() {
        assert_eq!(
            p("(quote (a b))"),
            Ast::Const(Sexpr::list(vec![Sexpr::symbol("a"), Sexpr::symbol("b")]))
        );
    }

    #[test]
    fn if_two_arg_defaults_else_to_void() {
        match p("(if #t 1)") {
            Ast::If(_, _, els) => assert_eq!(*els, Ast::Const(Sexpr::Void)),
            other => panic!("expected If, got {other:?}"),
        }
    }

    #[test]
    fn or_collapses_empty_and_singleton() {
        assert_eq!(p("(or)"), Ast::Const(Sexpr::Bool(false)));
        assert_eq!(p("(or 1)"), Ast::Const(Sexpr::Number(Number::Integer(1))));
        assert!(matches!(p("(or 1 2)"), Ast::Or(items) if items.len() == 2));
    }

    #[test]
    fn and_expands_to_nested_if() {
        match p("(and 1 2)") {
            Ast::If(test, then, els) => {
                assert_eq!(*test, Ast::Const(Sexpr::Number(Number::Integer(1))));
                assert_eq!(*then, Ast::Const(Sexpr::Number(Number::Integer(2))));
                assert_eq!(*els, Ast::Const(Sexpr::Bool(false)));
            }
            other => panic!("expected If, got {other:?}"),
        }
    }

    #[test]
    fn begin_collapses_empty_and_singleton() {
        assert_eq!(p("(begin)"), Ast::Const(Sexpr::Void));
        assert_eq!(p("(begin 1)"), Ast::Const(Sexpr::Number(Number::Integer(1))));
        assert!(matches!(p("(begin 1 2)"), Ast::Seq(items) if items.len() == 2));
    }

    #[test]
    fn cond_else_expands_to_begin() {
        assert_eq!(p("(cond (else 1 2))"), p("(begin 1 2)"));
    }

    #[test]
    fn cond_predicate_clause_expands_to_if_chain() {
        assert_eq!(p("(cond (#t 1) (#f 2))"), p("(if #t (begin 1) (if #f (begin 2) #void))"));
    }

    #[test]
    fn cond_arrow_clause_builds_receiver_let() {
        match p("(cond ((assv 1 '()) => cdr))") {
            Ast::Applic { .. } => {}
            other => panic!("expected the let to parse to an application, got {other:?}"),
        }
    }

    #[test]
    fn lambda_simple_params_resolve_to_unresolved_free_vars() {
        match p("(lambda (x y) x)") {
            Ast::Lambda { params, kind, .. } => {
                assert_eq!(params, vec!["x".to_string(), "y".to_string()]);
                assert_eq!(kind, LambdaKind::Simple);
            }
            other => panic!("expected Lambda, got {other:?}"),
        }
    }

    #[test]
    fn lambda_bare_symbol_header_is_rest_only() {
        match p("(lambda args args)") {
            Ast::Lambda { params, kind, .. } => {
                assert!(params.is_empty());
                assert_eq!(kind, LambdaKind::Opt("args".to_string()));
            }
            other => panic!("expected Lambda, got {other:?}"),
        }
    }

    #[test]
    fn lambda_improper_header_has_fixed_and_rest() {
        match p("(lambda (a b . rest) a)") {
            Ast::Lambda { params, kind, .. } => {
                assert_eq!(params, vec!["a".to_string(), "b".to_string()]);
                assert_eq!(kind, LambdaKind::Opt("rest".to_string()));
            }
            other => panic!("expected Lambda, got {other:?}"),
        }
    }

    #[test]
    fn lambda_duplicate_param_is_syntax_error() {
        let form = crate::reader::read_all("(lambda (x x) x)")
            .unwrap()
            .into_iter()
            .next()
            .unwrap();
        assert!(parse(&form).is_err());
    }

    #[test]
    fn nested_define_in_lambda_body_is_not_yet_implemented() {
        let form = crate::reader::read_all("(lambda (x) (define y 1) y)")
            .unwrap()
            .into_iter()
            .next()
            .unwrap();
        match parse(&form) {
            Err(CompileError::NotYetImplemented { .. }) => {}
            other => panic!("expected NotYetImplemented, got {other:?}"),
        }
    }

    #[test]
    fn nested_define_inside_begin_in_lambda_body_is_rejected() {
        let form = crate::reader::read_all("(lambda (x) (begin (define y 1) y))")
            .unwrap()
            .into_iter()
            .next()
            .unwrap();
        match parse(&form) {
            Err(CompileError::NotYetImplemented { .. }) => {}
            other => panic!("expected NotYetImplemented, got {other:?}"),
        }
    }

    #[test]
    fn nested_define_in_let_body_is_rejected_via_lambda_desugaring() {
        let form = crate::reader::read_all("(let ((x 1)) (define y 2) y)")
            .unwrap()
            .into_iter()
            .next()
            .unwrap();
        match parse(&form) {
            Err(CompileError::NotYetImplemented { .. }) => {}
            other => panic!("expected NotYetImplemented, got {other:?}"),
        }
    }

    #[test]
    fn top_level_define_is_still_accepted() {
        let form = crate::reader::read_all("(define y 1)")
            .unwrap()
            .into_iter()
            .next()
            .unwrap();
        assert!(parse(&form).is_ok());
    }

    #[test]
    fn define_function_shorthand_expands_to_lambda_def() {
        match p("(define (f x) x)") {
            Ast::VarDef(var, value) => {
                assert_eq!(var.name, "f");
                assert!(matches!(*value, Ast::Lambda { .. }));
            }
            other => panic!("expected VarDef, got {other:?}"),
        }
    }

    #[test]
    fn let_expands_to_immediate_lambda_application() {
        match p("(let ((x 1)) x)") {
            Ast::Applic { proc, args, .. } => {
                assert!(matches!(*proc, Ast::Lambda { .. }));
                assert_eq!(args.len(), 1);
            }
            other => panic!("expected Applic, got {other:?}"),
        }
    }

    #[test]
    fn let_star_nests_one_lambda_per_binding() {
        match p("(let* ((x 1) (y x)) y)") {
            Ast::Applic { proc, .. } => match *proc {
                Ast::Lambda { body, .. } => assert!(matches!(*body, Ast::Applic { .. })),
                other => panic!("expected nested Lambda, got {other:?}"),
            },
            other => panic!("expected Applic, got {other:?}"),
        }
    }

    #[test]
    fn letrec_expands_to_let_with_set_bang_prologue() {
        match p("(letrec ((f (lambda () 1))) (f))") {
            Ast::Applic { proc, .. } => assert!(matches!(*proc, Ast::Lambda { .. })),
            other => panic!("expected Applic, got {other:?}"),
        }
    }

    #[test]
    fn quasiquote_unquote_splices_a_value_in() {
        assert_eq!(p("`(1 ,(+ 1 1))"), p("(cons (quote 1) (cons (+ 1 1) (quote ())))"));
    }

    #[test]
    fn quasiquote_plain_symbol_is_quoted() {
        assert_eq!(p("`a"), Ast::Const(Sexpr::symbol("a")));
    }

    #[test]
    fn quasiquote_unquote_splicing_uses_append() {
        assert_eq!(
            p("`(,@(list 1 2) 3)"),
            p("(append (list 1 2) (cons (quote 3) (quote ())))")
        );
    }

    #[test]
    fn set_on_reserved_word_is_rejected() {
        let form = crate::reader::read_all("(set! if 1)")
            .unwrap()
            .into_iter()
            .next()
            .unwrap();
        assert!(parse(&form).is_err());
    }

    #[test]
    fn macro_expansion_is_idempotent_on_a_closed_example() {
        let first = p("(cond ((eq? 1 1) 'yes) (else 'no))");
        let printed_source = "(cond ((eq? 1 1) 'yes) (else 'no))";
        let second = p(printed_source);
        assert_eq!(first, second);
    }
}
