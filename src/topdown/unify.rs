//! Structural unification with trail-based undo.

use crate::bindings::ScopeId;
use crate::error::EvalResult;
use crate::term::{Term, Var};

use super::eval::{Cont, Evaluator};
use super::Flow;

impl<'q> Evaluator<'q> {
    /// Unifies `a` (in `a_scope`) with `b` (in `b_scope`) and calls `k` once
    /// if they unify. Bindings made here are undone before returning.
    pub(super) fn unify(
        &mut self,
        a: &Term,
        a_scope: ScopeId,
        b: &Term,
        b_scope: ScopeId,
        k: Cont<'_, 'q>,
    ) -> EvalResult<Flow> {
        let (a, a_scope) = self.bindings.resolve(a, a_scope);
        let (b, b_scope) = self.bindings.resolve(b, b_scope);
        match (&a, &b) {
            (Term::Var(x), Term::Var(y)) if x == y && a_scope == b_scope => k(self),
            (Term::Var(x), _) => self.bind(x, a_scope, b.clone(), b_scope, k),
            (_, Term::Var(y)) => self.bind(y, b_scope, a.clone(), a_scope, k),
            (Term::Array(xs), Term::Array(ys)) => {
                if xs.len() != ys.len() {
                    return Ok(Flow::Continue);
                }
                self.unify_slices(xs, a_scope, ys, b_scope, k)
            }
            (Term::Object(xm), Term::Object(ym)) => {
                if xm.len() != ym.len() {
                    return Ok(Flow::Continue);
                }
                let mut left = Vec::with_capacity(xm.len());
                let mut right = Vec::with_capacity(ym.len());
                for (key, x_value) in xm.iter() {
                    let key = self.bindings.plug(key, a_scope);
                    let Some(y_value) = ym.get(&key) else {
                        return Ok(Flow::Continue);
                    };
                    left.push(x_value.clone());
                    right.push(y_value.clone());
                }
                self.unify_slices(&left, a_scope, &right, b_scope, k)
            }
            _ => {
                if self.bindings.plug(&a, a_scope) == self.bindings.plug(&b, b_scope) {
                    k(self)
                } else {
                    Ok(Flow::Continue)
                }
            }
        }
    }

    /// Unifies two equally long term lists pairwise.
    pub(super) fn unify_slices(
        &mut self,
        xs: &[Term],
        xs_scope: ScopeId,
        ys: &[Term],
        ys_scope: ScopeId,
        k: Cont<'_, 'q>,
    ) -> EvalResult<Flow> {
        match (xs.split_first(), ys.split_first()) {
            (Some((x, x_rest)), Some((y, y_rest))) => self.unify(x, xs_scope, y, ys_scope, &mut |ev| {
                ev.unify_slices(x_rest, xs_scope, y_rest, ys_scope, &mut *k)
            }),
            _ => k(self),
        }
    }

    fn bind(&mut self, var: &Var, scope: ScopeId, value: Term, value_scope: ScopeId, k: Cont<'_, 'q>) -> EvalResult<Flow> {
        let mark = self.bindings.mark();
        self.bindings.put(var, scope, value, value_scope);
        let flow = k(self);
        self.bindings.undo(mark);
        flow
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::Expr;
    use crate::term::Term;
    use crate::topdown::QueryBuilder;

    fn rows(body: Vec<Expr>) -> Vec<String> {
        let results = QueryBuilder::new().body(body).build().unwrap().run().unwrap();
        results
            .iter()
            .map(|row| {
                row.bindings()
                    .iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect::<Vec<_>>()
                    .join(",")
            })
            .collect()
    }

    #[test]
    fn test_unify_array_patterns() {
        let out = rows(vec![Expr::unify(
            Term::array(vec![Term::var("a"), Term::number(2), Term::var("b")]),
            Term::array(vec![Term::number(1), Term::number(2), Term::string("x")]),
        )]);
        assert_eq!(out, vec![r#"a=1,b="x""#]);
    }

    #[test]
    fn test_unify_mismatch_is_undefined() {
        let out = rows(vec![Expr::unify(
            Term::array(vec![Term::var("a"), Term::number(3)]),
            Term::array(vec![Term::number(1), Term::number(2)]),
        )]);
        assert!(out.is_empty());

        let out = rows(vec![Expr::unify(
            Term::array(vec![Term::var("a")]),
            Term::array(vec![Term::number(1), Term::number(2)]),
        )]);
        assert!(out.is_empty());
    }

    #[test]
    fn test_unify_objects_by_key() {
        let pattern = Term::object(vec![
            (Term::string("name"), Term::var("n")),
            (Term::string("age"), Term::number(30)),
        ]);
        let value = Term::from_json(&serde_json::json!({"name": "ada", "age": 30}));
        assert_eq!(rows(vec![Expr::unify(pattern, value)]), vec![r#"n="ada""#]);
    }

    #[test]
    fn test_var_to_var_chains_resolve() {
        let out = rows(vec![
            Expr::unify(Term::var("x"), Term::var("y")),
            Expr::unify(Term::var("y"), Term::number(7)),
        ]);
        assert_eq!(out, vec!["x=7,y=7"]);
    }
}
