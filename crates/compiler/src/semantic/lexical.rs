//! Pass 1 — lexical addressing (spec.md §4.3).
//!
//! `Scope` carries the innermost parameter list and the list of outer
//! parameter lists, innermost first. Ribs are `Rc`-shared so that Pass 3
//! (boxing) could in principle compare them by `Rc::ptr_eq`; in practice the
//! boxing pass tracks rib identity via the enclosing `Lambda` node's address
//! instead (simpler, and it only ever needs identity, not contents), but the
//! sharing is kept here because it is cheap and documents the intent.

use crate::ast::{Address, Ast, LambdaKind, Var};
use std::rc::Rc;

#[derive(Debug, Clone)]
struct Scope {
    params: Rc<Vec<String>>,
    env: Vec<Rc<Vec<String>>>,
}

impl Scope {
    fn top() -> Scope {
        Scope {
            params: Rc::new(Vec::new()),
            env: Vec::new(),
        }
    }

    fn lookup(&self, name: &str) -> Address {
        if let Some(i) = self.params.iter().position(|p| p == name) {
            return Address::Param(i);
        }
        for (major, rib) in self.env.iter().enumerate() {
            if let Some(minor) = rib.iter().position(|p| p == name) {
                return Address::Bound(major, minor);
            }
        }
        Address::Free
    }
}

/// Entry point: resolve every `VarGet`/`VarSet` in `ast` against an initially
/// empty top-level scope. `VarDef` always addresses `Free` (spec.md §4.3).
pub fn analyze(ast: Ast) -> Ast {
    resolve(ast, &Scope::top())
}

fn resolve(ast: Ast, scope: &Scope) -> Ast {
    match ast {
        Ast::Const(s) => Ast::Const(s),
        Ast::VarGet(var) => Ast::VarGet(resolved(var, scope)),
        Ast::VarSet(var, value) => {
            Ast::VarSet(resolved(var, scope), Box::new(resolve(*value, scope)))
        }
        Ast::VarDef(var, value) => Ast::VarDef(
            Var {
                name: var.name,
                address: Address::Free,
            },
            Box::new(resolve(*value, scope)),
        ),
        Ast::If(t, c, a) => Ast::If(
            Box::new(resolve(*t, scope)),
            Box::new(resolve(*c, scope)),
            Box::new(resolve(*a, scope)),
        ),
        Ast::Seq(xs) => Ast::Seq(xs.into_iter().map(|x| resolve(x, scope)).collect()),
        Ast::Or(xs) => Ast::Or(xs.into_iter().map(|x| resolve(x, scope)).collect()),
        Ast::Applic { proc, args, tail } => Ast::Applic {
            proc: Box::new(resolve(*proc, scope)),
            args: args.into_iter().map(|a| resolve(a, scope)).collect(),
            tail,
        },
        Ast::Lambda { params, kind, body } => {
            let mut full_params = params.clone();
            if let LambdaKind::Opt(rest) = &kind {
                full_params.push(rest.clone());
            }
            let mut new_env = Vec::with_capacity(scope.env.len() + 1);
            new_env.push(scope.params.clone());
            new_env.extend(scope.env.iter().cloned());
            let inner = Scope {
                params: Rc::new(full_params),
                env: new_env,
            };
            let new_body = resolve(*body, &inner);
            Ast::Lambda {
                params,
                kind,
                body: Box::new(new_body),
            }
        }
        // Boxing runs after lexical addressing; these nodes don't exist yet.
        boxed @ (Ast::Box(_) | Ast::BoxGet(_) | Ast::BoxSet(_, _)) => boxed,
    }
}

fn resolved(var: Var, scope: &Scope) -> Var {
    let address = scope.lookup(&var.name);
    Var {
        name: var.name,
        address,
    }
}
