//! Array, set and object comprehensions.

use std::collections::{BTreeMap, BTreeSet};

use tracing::trace;

use crate::ast::{Comprehension, ComprehensionKind};
use crate::bindings::ScopeId;
use crate::error::{EvalError, EvalResult};
use crate::term::Term;

use super::eval::{Evaluator, TermCont};
use super::Flow;

/// Values collected by a comprehension body.
enum Collected {
    Array(Vec<Term>),
    Set(BTreeSet<Term>),
    Object(BTreeMap<Term, Term>),
}

impl Collected {
    fn new(kind: &ComprehensionKind) -> Self {
        match kind {
            ComprehensionKind::Array { .. } => Self::Array(Vec::new()),
            ComprehensionKind::Set { .. } => Self::Set(BTreeSet::new()),
            ComprehensionKind::Object { .. } => Self::Object(BTreeMap::new()),
        }
    }

    fn add(&mut self, key: Option<Term>, value: Term) -> EvalResult<()> {
        match self {
            Self::Array(items) => items.push(value),
            Self::Set(items) => {
                items.insert(value);
            }
            Self::Object(map) => {
                let key = key.ok_or_else(|| EvalError::internal("object comprehension head without key"))?;
                if let Some(existing) = map.get(&key) {
                    if *existing != value {
                        return Err(EvalError::conflict(
                            "object comprehension",
                            format!("object keys must be unique: {key}"),
                        ));
                    }
                }
                map.insert(key, value);
            }
        }
        Ok(())
    }

    fn finish(self) -> Term {
        match self {
            Self::Array(items) => Term::array(items),
            Self::Set(items) => Term::set(items),
            Self::Object(map) => Term::object(map),
        }
    }
}

impl<'q> Evaluator<'q> {
    /// Yields the collection built by `compr`. Results are memoized per
    /// comprehension and per values of the variables it shares with the
    /// enclosing body.
    pub(super) fn eval_comprehension(
        &mut self,
        term: &Term,
        compr: &Comprehension,
        scope: ScopeId,
        k: TermCont<'_, 'q>,
    ) -> EvalResult<Flow> {
        if !self.config.index_comprehensions {
            let value = self.comprehension_value(compr, scope)?;
            return k(self, value);
        }
        let key = self.comprehension_key(compr, scope);
        if let Some(value) = self.compr_cache.get(term, &key).cloned() {
            trace!("comprehension cache hit");
            return k(self, value);
        }
        let value = self.comprehension_value(compr, scope)?;
        self.compr_cache.put(term, key, value.clone());
        k(self, value)
    }

    /// Outer bindings the comprehension can observe, as `[var, value, ...]`.
    fn comprehension_key(&self, compr: &Comprehension, scope: ScopeId) -> Vec<Term> {
        let mut vars = BTreeSet::new();
        compr.collect_vars(&mut vars);
        let mut key = Vec::new();
        for var in vars {
            if self.bindings.get(&var, scope).is_some() {
                let term = Term::Var(var);
                key.push(self.bindings.plug(&term, scope));
                key.push(term);
            }
        }
        key
    }

    fn comprehension_value(&mut self, compr: &Comprehension, scope: ScopeId) -> EvalResult<Term> {
        let child = self.bindings.push_scope(Some(scope));
        let mark = self.bindings.mark();
        let isolate = compr.references_data();
        if isolate {
            self.vcache.push();
        }

        let mut collected = Collected::new(&compr.kind);
        let result = self.eval_body(&compr.body, child, &mut |ev| {
            ev.comprehension_head(&compr.kind, child, &mut collected)
        });

        let popped = if isolate { self.vcache.pop() } else { Ok(()) };
        self.bindings.undo(mark);
        let scope_popped = self.bindings.pop_scope(child);
        result?;
        popped?;
        scope_popped?;
        Ok(collected.finish())
    }

    fn comprehension_head(
        &mut self,
        kind: &ComprehensionKind,
        scope: ScopeId,
        collected: &mut Collected,
    ) -> EvalResult<Flow> {
        match kind {
            ComprehensionKind::Array { term } | ComprehensionKind::Set { term } => {
                self.eval_term(term, scope, &mut |_, value| {
                    ensure_ground(&value)?;
                    collected.add(None, value)?;
                    Ok(Flow::Continue)
                })
            }
            ComprehensionKind::Object { key, value } => self.eval_term(key, scope, &mut |ev, key| {
                ev.eval_term(value, scope, &mut |_, value| {
                    ensure_ground(&key)?;
                    ensure_ground(&value)?;
                    collected.add(Some(key.clone()), value)?;
                    Ok(Flow::Continue)
                })
            }),
        }
    }
}

fn ensure_ground(term: &Term) -> EvalResult<()> {
    if term.is_ground() {
        Ok(())
    } else {
        Err(EvalError::validation(format!(
            "comprehension produced non-ground value {term}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use crate::ast::{Expr, Rule};
    use crate::ruleset::RuleSet;
    use crate::term::{Ref, Term};
    use crate::topdown::QueryBuilder;

    fn input() -> Term {
        Term::from_json(&json!({"users": [
            {"name": "ada", "role": "admin"},
            {"name": "bob", "role": "dev"},
            {"name": "cyd", "role": "admin"}
        ]}))
    }

    fn users_at(i: &str) -> Term {
        Term::reference(vec![
            Term::var("input"),
            Term::string("users"),
            Term::var(i),
        ])
    }

    #[test]
    fn test_array_comprehension_keeps_order() {
        let compr = Term::array_compr(
            Term::var("n"),
            vec![
                Expr::unify(Term::var("u"), users_at("_")),
                Expr::unify(Term::var("u"), Term::object(vec![
                    (Term::string("name"), Term::var("n")),
                    (Term::string("role"), Term::string("admin")),
                ])),
            ],
        );
        let results = QueryBuilder::new()
            .input(input())
            .expr(Expr::unify(Term::var("admins"), compr))
            .build()
            .unwrap()
            .run()
            .unwrap();
        assert_eq!(
            results.rows()[0].get("admins"),
            Some(&Term::array(vec![Term::string("ada"), Term::string("cyd")]))
        );
    }

    #[test]
    fn test_object_comprehension_and_outer_bindings() {
        let compr = Term::object_compr(
            Term::var("n"),
            Term::var("r"),
            vec![
                Expr::unify(Term::var("u"), users_at("_")),
                Expr::unify(Term::var("u"), Term::object(vec![
                    (Term::string("name"), Term::var("n")),
                    (Term::string("role"), Term::var("r")),
                ])),
                Expr::unify(Term::var("r"), Term::var("wanted")),
            ],
        );
        let results = QueryBuilder::new()
            .input(input())
            .expr(Expr::unify(Term::var("wanted"), Term::string("dev")))
            .expr(Expr::unify(Term::var("by_name"), compr))
            .build()
            .unwrap()
            .run()
            .unwrap();
        assert_eq!(
            results.rows()[0].get("by_name"),
            Some(&Term::from_json(&json!({"bob": "dev"})))
        );
    }

    #[test]
    fn test_empty_comprehension_is_defined() {
        let compr = Term::set_compr(Term::var("x"), vec![Expr::unify(Term::var("x"), users_at("_")), Expr::term(false)]);
        let results = QueryBuilder::new()
            .input(input())
            .expr(Expr::unify(Term::var("s"), compr))
            .build()
            .unwrap()
            .run()
            .unwrap();
        assert_eq!(results.rows()[0].get("s"), Some(&Term::set(Vec::new())));
    }

    #[test]
    fn test_documents_read_inside_comprehension_stay_out_of_outer_cache() {
        let rules = RuleSet::new(vec![
            Rule::boolean(&["test", "outer"], Vec::new()),
            Rule::complete(&["test", "inner"], Term::number(3), Vec::new()),
        ])
        .unwrap();
        let compr = Term::array_compr(
            Term::var("x"),
            vec![Expr::unify(Term::var("x"), Term::data_ref(&["test", "inner"]))],
        );
        let evaluation = QueryBuilder::new()
            .rules(Arc::new(rules))
            .expr(Expr::term(Term::data_ref(&["test", "outer"])))
            .expr(Expr::unify(Term::var("xs"), compr))
            .build()
            .unwrap()
            .run_detailed()
            .unwrap();

        assert_eq!(
            evaluation.results.rows()[0].get("xs"),
            Some(&Term::array(vec![Term::number(3)]))
        );
        assert_eq!(evaluation.virtual_documents, vec![Ref::data(&["test", "outer"])]);
    }
}
