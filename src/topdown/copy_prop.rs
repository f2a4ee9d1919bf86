//! Equality analysis of the top-level query body.
//!
//! Top-level `var = var` and `var = constant` expressions are folded into a
//! union-find. Contradictory constants abort the query before evaluation;
//! afterwards the classes simplify result rows so that aliased variables
//! report their shared constant.

use std::collections::{BTreeMap, BTreeSet};

use crate::ast::Expr;
use crate::bindings::{Bindings, ScopeId};
use crate::error::{EvalError, EvalResult};
use crate::term::{Term, Var};
use crate::union_find::UnionFind;

#[derive(Debug, Default)]
pub(super) struct CopyPropagation {
    classes: UnionFind,
}

impl CopyPropagation {
    pub(super) fn analyze(body: &[Expr]) -> EvalResult<Self> {
        let mut classes = UnionFind::new();
        for expr in body {
            let Expr::Eq(a, b) = expr else {
                continue;
            };
            let outcome = match (a, b) {
                (Term::Var(x), Term::Var(y)) if !x.is_wildcard() && !y.is_wildcard() => {
                    classes.merge(a, b).map(drop)
                }
                (Term::Var(x), c) | (c, Term::Var(x)) if !x.is_wildcard() && c.is_ground() => {
                    classes.bind_constant(&Term::Var(x.clone()), c.clone()).map(drop)
                }
                _ => Ok(()),
            };
            if let Err(conflict) = outcome {
                return Err(EvalError::conflict(
                    "query",
                    format!(
                        "{} cannot equal both {} and {}",
                        conflict.root.key, conflict.left, conflict.right
                    ),
                ));
            }
        }
        Ok(Self { classes })
    }

    /// Builds one result row. Unbound variables fall back to the constant
    /// (or bound alias) of their class and are omitted otherwise.
    pub(super) fn simplify(
        &self,
        bindings: &Bindings,
        vars: &BTreeSet<Var>,
        scope: ScopeId,
    ) -> BTreeMap<String, Term> {
        let mut row = BTreeMap::new();
        for var in vars {
            let term = Term::Var(var.clone());
            let value = Some(bindings.plug(&term, scope))
                .filter(Term::is_ground)
                .or_else(|| {
                    let root = self.classes.find(&term)?;
                    root.constant
                        .or_else(|| Some(bindings.plug(&root.key, scope)).filter(Term::is_ground))
                });
            if let Some(value) = value {
                row.insert(var.name().to_string(), value);
            }
        }
        row
    }
}
