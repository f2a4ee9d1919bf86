//! Reference evaluation over input, locals, base and virtual documents.

use std::collections::{BTreeMap, BTreeSet};

use tracing::trace;

use crate::bindings::ScopeId;
use crate::error::EvalResult;
use crate::ruleset::{PackageNode, RuleSet};
use crate::term::{Ref, Term};

use super::eval::{Evaluator, TermCont};
use super::Flow;

impl<'q> Evaluator<'q> {
    /// Yields every value of `r`. Unbound variables in the reference are
    /// bound to each key that leads to a defined value.
    pub(super) fn eval_ref(&mut self, r: &Ref, scope: ScopeId, k: TermCont<'_, 'q>) -> EvalResult<Flow> {
        let Some((head, path)) = r.terms().split_first() else {
            return Ok(Flow::Continue);
        };
        if path.iter().any(Term::needs_eval) {
            let mut acc = Vec::with_capacity(path.len());
            return self.eval_terms(path, scope, &mut acc, &mut |ev, segments| {
                ev.eval_ref_head(head, segments, scope, &mut *k)
            });
        }
        self.eval_ref_head(head, path, scope, k)
    }

    fn eval_ref_head(&mut self, head: &Term, path: &[Term], scope: ScopeId, k: TermCont<'_, 'q>) -> EvalResult<Flow> {
        match head {
            Term::Var(v) if v.name() == "data" => {
                let rules: &'q RuleSet = self.rules;
                let mut prefix = vec![head.clone()];
                self.eval_tree(rules.root(), &mut prefix, path, scope, k)
            }
            Term::Var(v) if v.name() == "input" => match self.input.clone() {
                Some(input) => self.walk(input, path, scope, k),
                None => Ok(Flow::Continue),
            },
            Term::Var(_) => {
                let (value, value_scope) = self.bindings.resolve(head, scope);
                if let Term::Var(_) = value {
                    return Ok(Flow::Continue);
                }
                let value = self.bindings.plug(&value, value_scope);
                self.walk(value, path, scope, k)
            }
            other => self.eval_term(other, scope, &mut |ev, value| ev.walk(value, path, scope, &mut *k)),
        }
    }

    /// Descends into an already computed value.
    pub(super) fn walk(&mut self, value: Term, path: &[Term], scope: ScopeId, k: TermCont<'_, 'q>) -> EvalResult<Flow> {
        let Some((segment, rest)) = path.split_first() else {
            return k(self, value);
        };
        let segment = self.bindings.plug(segment, scope);
        if segment.is_ground() {
            return match value.get(&segment) {
                Some(child) => self.walk(child, rest, scope, k),
                None => Ok(Flow::Continue),
            };
        }
        if !value.is_collection() {
            return Ok(Flow::Continue);
        }
        for (key, child) in value.entries() {
            self.tick()?;
            let flow = self.unify(&segment, scope, &key, scope, &mut |ev| {
                ev.walk(child.clone(), rest, scope, &mut *k)
            })?;
            if flow == Flow::Halt {
                return Ok(Flow::Halt);
            }
        }
        Ok(Flow::Continue)
    }

    /// Walks the package tree under `data`. A node carrying rules hands the
    /// rest of the path to the virtual document; a missing child falls back
    /// to the base document at the same path.
    fn eval_tree(
        &mut self,
        node: &'q PackageNode,
        prefix: &mut Vec<Term>,
        path: &[Term],
        scope: ScopeId,
        k: TermCont<'_, 'q>,
    ) -> EvalResult<Flow> {
        if let Some(group) = node.group() {
            return self.eval_virtual(group, path, scope, k);
        }
        let Some((segment, rest)) = path.split_first() else {
            let package = Ref::new(prefix.clone());
            let value = self.eval_package(node, &package)?;
            return k(self, value);
        };
        let segment = self.bindings.plug(segment, scope);
        if segment.is_ground() {
            return self.eval_tree_key(node, prefix, &segment, rest, scope, k);
        }

        let mut keys: BTreeSet<Term> = node.children().map(|(name, _)| Term::string(name)).collect();
        if let Some(base) = self.read_base(&Ref::new(prefix.clone()))? {
            keys.extend(base.entries().map(|(key, _)| key));
        }
        for key in keys {
            self.tick()?;
            let flow = self.unify(&segment, scope, &key, scope, &mut |ev| {
                ev.eval_tree_key(node, &mut *prefix, &key, rest, scope, &mut *k)
            })?;
            if flow == Flow::Halt {
                return Ok(Flow::Halt);
            }
        }
        Ok(Flow::Continue)
    }

    fn eval_tree_key(
        &mut self,
        node: &'q PackageNode,
        prefix: &mut Vec<Term>,
        key: &Term,
        rest: &[Term],
        scope: ScopeId,
        k: TermCont<'_, 'q>,
    ) -> EvalResult<Flow> {
        prefix.push(key.clone());
        let result = match key.as_str().and_then(|name| node.child(name)) {
            Some(child) => self.eval_tree(child, prefix, rest, scope, k),
            None => self.eval_base(prefix, rest, scope, k),
        };
        prefix.pop();
        result
    }

    fn eval_base(&mut self, prefix: &[Term], rest: &[Term], scope: ScopeId, k: TermCont<'_, 'q>) -> EvalResult<Flow> {
        match self.read_base(&Ref::new(prefix.to_vec()))? {
            Some(value) => self.walk(value, rest, scope, k),
            None => Ok(Flow::Continue),
        }
    }

    /// Reads a base document through the base cache.
    pub(super) fn read_base(&mut self, reference: &Ref) -> EvalResult<Option<Term>> {
        if let Some(value) = self.base_cache.get(reference) {
            trace!(path = %reference, "base cache hit");
            return Ok(Some(value));
        }
        let Some(path) = reference.to_store_path() else {
            return Ok(None);
        };
        let value = self.store.read(&self.txn, &path)?;
        if let Some(value) = &value {
            self.base_cache.put(reference, value.clone());
        }
        Ok(value)
    }

    /// The object a package denotes: its base document merged with every
    /// virtual document beneath it. Always defined.
    fn eval_package(&mut self, node: &'q PackageNode, package: &Ref) -> EvalResult<Term> {
        let mut map = match self.read_base(package)? {
            Some(Term::Object(map)) => (*map).clone(),
            _ => BTreeMap::new(),
        };
        for (name, child) in node.children() {
            let value = match child.group() {
                Some(group) => self.virtual_document(group)?,
                None => Some(self.eval_package(child, &package.append(Term::string(name)))?),
            };
            if let Some(value) = value {
                map.insert(Term::string(name), value);
            }
        }
        Ok(Term::object(map))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use crate::ast::{Expr, Rule};
    use crate::ruleset::RuleSet;
    use crate::store::{InMemoryStore, Store};
    use crate::term::Term;
    use crate::topdown::QueryBuilder;

    fn store() -> Arc<dyn Store> {
        let doc = json!({
            "servers": [
                {"id": "web", "ports": [80, 443]},
                {"id": "db", "ports": [5432]}
            ],
            "app": {"owner": "ops"}
        });
        Arc::new(InMemoryStore::from_json(&doc).unwrap())
    }

    #[test]
    fn test_enumerates_unbound_segments() {
        let results = QueryBuilder::new()
            .store(store())
            .expr(Expr::unify(
                Term::var("id"),
                Term::reference(vec![
                    Term::var("data"),
                    Term::string("servers"),
                    Term::var("i"),
                    Term::string("id"),
                ]),
            ))
            .build()
            .unwrap()
            .run()
            .unwrap();
        let ids: Vec<_> = results.iter().map(|r| r.get("id").cloned()).collect();
        assert_eq!(ids, vec![Some(Term::string("web")), Some(Term::string("db"))]);
        assert_eq!(results.rows()[1].get("i"), Some(&Term::number(1)));
    }

    #[test]
    fn test_package_merges_base_and_virtual_documents() {
        let rules = RuleSet::new(vec![Rule::complete(&["app", "name"], Term::string("portal"), Vec::new())]).unwrap();
        let results = QueryBuilder::new()
            .store(store())
            .rules(Arc::new(rules))
            .expr(Expr::unify(Term::var("x"), Term::data_ref(&["app"])))
            .build()
            .unwrap()
            .run()
            .unwrap();
        assert_eq!(
            results.rows()[0].get("x"),
            Some(&Term::from_json(&json!({"owner": "ops", "name": "portal"})))
        );
    }

    #[test]
    fn test_missing_input_is_undefined() {
        let results = QueryBuilder::new()
            .expr(Expr::unify(Term::var("x"), Term::input_ref(&["user"])))
            .build()
            .unwrap()
            .run()
            .unwrap();
        assert!(results.is_empty());
    }
}
