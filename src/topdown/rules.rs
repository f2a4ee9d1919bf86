//! Virtual documents, user functions and builtin calls.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{trace, warn};

use crate::ast::{Rule, RuleKind};
use crate::bindings::ScopeId;
use crate::builtins::{BuiltinError, BuiltinFn, BuiltinRegistry};
use crate::error::{EvalError, EvalResult};
use crate::ruleset::{RuleGroup, RuleSet};
use crate::term::{Ref, Term};
use crate::tracer::TraceOp;

use super::eval::{Evaluator, TermCont};
use super::Flow;

/// One head produced by a satisfied rule body: the set member or object key
/// (partial rules only) and the value.
type Head = (Option<Term>, Term);

impl<'q> Evaluator<'q> {
    /// Yields the value of the virtual document defined by `group`, or of
    /// the part of it selected by `path`.
    pub(super) fn eval_virtual(
        &mut self,
        group: &'q Arc<RuleGroup>,
        path: &[Term],
        scope: ScopeId,
        k: TermCont<'_, 'q>,
    ) -> EvalResult<Flow> {
        match group.kind() {
            RuleKind::Function => Err(EvalError::validation(format!(
                "function {} must be called with arguments",
                group.path()
            ))),
            RuleKind::Complete => match self.virtual_document(group)? {
                Some(value) => self.walk(value, path, scope, k),
                None => Ok(Flow::Continue),
            },
            RuleKind::PartialSet | RuleKind::PartialObject => {
                if let Some((segment, rest)) = path.split_first() {
                    let key = self.bindings.plug(segment, scope);
                    if key.is_ground() {
                        return match self.partial_entry(group, &key)? {
                            Some(value) => self.walk(value, rest, scope, k),
                            None => Ok(Flow::Continue),
                        };
                    }
                }
                match self.virtual_document(group)? {
                    Some(doc) => self.walk(doc, path, scope, k),
                    None => Ok(Flow::Continue),
                }
            }
        }
    }

    /// Computes (or recalls) the full document defined by `group`.
    pub(super) fn virtual_document(&mut self, group: &'q Arc<RuleGroup>) -> EvalResult<Option<Term>> {
        if matches!(group.kind(), RuleKind::Function) {
            return Ok(None);
        }
        let key = group.path();
        if let Some(hit) = self.cache_lookup(key) {
            return Ok(hit);
        }
        self.enter_rule(key)?;
        let result = match group.kind() {
            RuleKind::Complete => self.eval_complete(group),
            RuleKind::PartialSet => self.eval_partial_set(group).map(Some),
            RuleKind::PartialObject => self.eval_partial_object(group).map(Some),
            RuleKind::Function => Ok(None),
        };
        self.cache_store(key, &result);
        self.exit_rule();
        result
    }

    fn cache_lookup(&self, key: &Ref) -> Option<Option<Term>> {
        if !self.config.cache_virtual_documents {
            return None;
        }
        let hit = self.vcache.get(key)?;
        trace!(path = %key, "virtual cache hit");
        Some(hit.value().cloned())
    }

    fn cache_store(&mut self, key: &Ref, result: &EvalResult<Option<Term>>) {
        if let (true, Ok(value)) = (self.config.cache_virtual_documents, result) {
            self.vcache.put(key, value.clone());
        }
    }

    /// Records that `path` is being evaluated. Fails when `path` is already
    /// in progress or the call depth limit is reached.
    fn enter_rule(&mut self, path: &Ref) -> EvalResult<()> {
        if self.ref_stack.prefixed(path) {
            return Err(EvalError::Recursion {
                path: path.to_string(),
            });
        }
        if self.depth >= self.config.max_call_depth {
            return Err(EvalError::Recursion {
                path: format!("{path} (call depth limit {} reached)", self.config.max_call_depth),
            });
        }
        self.depth += 1;
        self.ref_stack.push(vec![path.clone()]);
        Ok(())
    }

    fn exit_rule(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        self.ref_stack.pop();
    }

    fn eval_complete(&mut self, group: &'q RuleGroup) -> EvalResult<Option<Term>> {
        let mut values = BTreeSet::new();
        for rule in group.rules() {
            self.tick()?;
            values.extend(self.chain_values(rule, &[])?);
            if values.len() > 1 {
                return Err(EvalError::conflict(
                    group.path().to_string(),
                    "complete rules must not produce multiple outputs",
                ));
            }
        }
        match values.into_iter().next() {
            Some(value) => Ok(Some(value)),
            None => Ok(group.default_rule().map(|rule| rule.head_value())),
        }
    }

    fn eval_partial_set(&mut self, group: &'q RuleGroup) -> EvalResult<Term> {
        let mut members = BTreeSet::new();
        for rule in group.rules() {
            self.tick()?;
            members.extend(self.rule_heads(rule, &[], None)?.into_iter().map(|(_, value)| value));
        }
        Ok(Term::set(members))
    }

    fn eval_partial_object(&mut self, group: &'q RuleGroup) -> EvalResult<Term> {
        let mut entries = BTreeMap::new();
        for rule in group.rules() {
            self.tick()?;
            for (key, value) in self.rule_heads(rule, &[], None)? {
                let key = key.ok_or_else(|| EvalError::internal("partial object head without key"))?;
                insert_unique(&mut entries, group.path(), key, value)?;
            }
        }
        Ok(Term::object(entries))
    }

    /// Looks up one member of a partial set or one key of a partial object
    /// without computing the whole document.
    fn partial_entry(&mut self, group: &'q Arc<RuleGroup>, key: &Term) -> EvalResult<Option<Term>> {
        if let Some(Some(doc)) = self.cache_lookup(group.path()) {
            return Ok(doc.get(key));
        }
        let cache_key = group.path().append(key.clone());
        if let Some(hit) = self.cache_lookup(&cache_key) {
            return Ok(hit);
        }
        self.enter_rule(group.path())?;
        let result = self.eval_partial_entry(group, key);
        self.cache_store(&cache_key, &result);
        self.exit_rule();
        result
    }

    fn eval_partial_entry(&mut self, group: &'q RuleGroup, key: &Term) -> EvalResult<Option<Term>> {
        let mut found: Option<Term> = None;
        for rule in group.rules() {
            self.tick()?;
            for (head_key, value) in self.rule_heads(rule, &[], Some(key))? {
                if head_key.as_ref() != Some(key) {
                    continue;
                }
                if let Some(existing) = &found {
                    if *existing != value {
                        return Err(EvalError::conflict(
                            group.path().to_string(),
                            format!("object keys must be unique: {key}"),
                        ));
                    }
                }
                found = Some(value);
            }
        }
        Ok(found)
    }

    /// Calls a user-defined function with ground arguments.
    fn function_value(&mut self, group: &'q Arc<RuleGroup>, args: &[Term]) -> EvalResult<Option<Term>> {
        let cache_key = group.path().concat(args);
        if let Some(hit) = self.cache_lookup(&cache_key) {
            return Ok(hit);
        }
        self.enter_rule(group.path())?;
        let result = self.eval_function(group, args);
        self.cache_store(&cache_key, &result);
        self.exit_rule();
        result
    }

    fn eval_function(&mut self, group: &'q RuleGroup, args: &[Term]) -> EvalResult<Option<Term>> {
        let mut values = BTreeSet::new();
        for rule in group.rules() {
            self.tick()?;
            values.extend(self.chain_values(rule, args)?);
            if values.len() > 1 {
                return Err(EvalError::conflict(
                    group.path().to_string(),
                    "functions must not produce multiple outputs for same inputs",
                ));
            }
        }
        Ok(values.into_iter().next())
    }

    /// Values of the first rule in an else chain whose body has a solution.
    fn chain_values(&mut self, rule: &'q Rule, args: &[Term]) -> EvalResult<Vec<Term>> {
        let mut current = Some(rule);
        while let Some(rule) = current {
            let heads = self.rule_heads(rule, args, None)?;
            if !heads.is_empty() {
                return Ok(heads.into_iter().map(|(_, value)| value).collect());
            }
            current = rule.else_rule.as_deref();
        }
        Ok(Vec::new())
    }

    /// Evaluates one rule body in a fresh scope and returns the plugged head
    /// of every solution. `key_hint` pre-binds the key of a partial rule.
    fn rule_heads(&mut self, rule: &'q Rule, args: &[Term], key_hint: Option<&Term>) -> EvalResult<Vec<Head>> {
        let saved = self.enter_query(rule.path.to_string());
        let scope = self.bindings.push_scope(None);
        let mark = self.bindings.mark();
        self.trace(TraceOp::Enter, || rule.to_string());

        let mut heads = Vec::new();
        let result = self.unify_slices(&rule.args, scope, args, scope, &mut |ev| match (key_hint, &rule.key) {
            (Some(hint), Some(key)) if !key.needs_eval() => ev.unify(key, scope, hint, scope, &mut |ev| {
                ev.rule_body(rule, scope, &mut heads)
            }),
            _ => ev.rule_body(rule, scope, &mut heads),
        });

        self.bindings.undo(mark);
        let popped = self.bindings.pop_scope(scope);
        if heads.is_empty() {
            self.trace(TraceOp::Fail, || format!("{} is undefined", rule.path));
        }
        self.exit_query(saved);
        result?;
        popped?;
        Ok(heads)
    }

    fn rule_body(&mut self, rule: &'q Rule, scope: ScopeId, heads: &mut Vec<Head>) -> EvalResult<Flow> {
        self.eval_body(&rule.body, scope, &mut |ev| {
            let value = rule.value.clone().unwrap_or(Term::Bool(true));
            match (&rule.key, rule.kind) {
                (Some(key), RuleKind::PartialSet) => ev.eval_term(key, scope, &mut |ev, member| {
                    ev.push_head(rule, &mut *heads, Some(member.clone()), member)
                }),
                (Some(key), _) => ev.eval_term(key, scope, &mut |ev, key_value| {
                    ev.eval_term(&value, scope, &mut |ev, value| {
                        ev.push_head(rule, &mut *heads, Some(key_value.clone()), value)
                    })
                }),
                (None, _) => ev.eval_term(&value, scope, &mut |ev, value| {
                    ev.push_head(rule, &mut *heads, None, value)
                }),
            }
        })
    }

    fn push_head(&mut self, rule: &Rule, heads: &mut Vec<Head>, key: Option<Term>, value: Term) -> EvalResult<Flow> {
        if let Some(unbound) = key.iter().chain(std::iter::once(&value)).find(|t| !t.is_ground()) {
            return Err(EvalError::validation(format!(
                "rule {} produced non-ground head {unbound}",
                rule.path
            )));
        }
        self.trace(TraceOp::Exit, || format!("{} = {value}", rule.path));
        heads.push((key, value));
        Ok(Flow::Continue)
    }

    /// Calls a function by name: `with` overrides first, then user functions
    /// under `data`, then builtins.
    pub(super) fn call(&mut self, name: &str, args: &[Term], k: TermCont<'_, 'q>) -> EvalResult<Flow> {
        self.tick()?;
        match self.mocks.get(name).cloned() {
            Some(Term::Ref(replacement)) => {
                let replacement = replacement.to_string();
                let mut results = Vec::new();
                self.mocks.push();
                let result = self.call_unmocked(&replacement, args, &mut |_, value| {
                    results.push(value);
                    Ok(Flow::Continue)
                });
                self.mocks.pop();
                result?;
                for value in results {
                    if k(self, value)? == Flow::Halt {
                        return Ok(Flow::Halt);
                    }
                }
                Ok(Flow::Continue)
            }
            Some(value) => k(self, value),
            None => self.call_unmocked(name, args, k),
        }
    }

    fn call_unmocked(&mut self, name: &str, args: &[Term], k: TermCont<'_, 'q>) -> EvalResult<Flow> {
        if let Some(i) = args.iter().position(|arg| !arg.is_ground()) {
            return Err(EvalError::validation(format!(
                "{name}: argument {} is not ground",
                i + 1
            )));
        }

        if name.starts_with("data.") {
            let rules: &'q RuleSet = self.rules;
            let group = rules
                .function(name)
                .ok_or_else(|| EvalError::validation(format!("unknown function {name}")))?;
            check_arity(name, group.arity(), args.len())?;
            return match self.function_value(group, args)? {
                Some(value) => k(self, value),
                None => Ok(Flow::Continue),
            };
        }

        let registry: &'q BuiltinRegistry = self.builtins;
        let builtin = registry
            .get(name)
            .ok_or_else(|| EvalError::validation(format!("unknown function {name}")))?;
        check_arity(name, builtin.arity, args.len())?;
        let ctx = self.builtin_context();
        match &builtin.func {
            BuiltinFn::Simple(func) => match func(&ctx, args) {
                Ok(Some(value)) => k(self, value),
                Ok(None) => Ok(Flow::Continue),
                Err(BuiltinError::Failed { name, message }) if !self.config.strict_builtin_errors => {
                    warn!(builtin = %name, error = %message, "builtin error treated as undefined");
                    Ok(Flow::Continue)
                }
                Err(err) => Err(err.into()),
            },
            BuiltinFn::Iter(func) => {
                let result = func(&ctx, args, &mut |value| k(self, value));
                match result {
                    Err(EvalError::Builtin { name, message }) if !self.config.strict_builtin_errors => {
                        warn!(builtin = %name, error = %message, "builtin error treated as undefined");
                        Ok(Flow::Continue)
                    }
                    other => other,
                }
            }
        }
    }
}

fn check_arity(name: &str, expected: usize, got: usize) -> EvalResult<()> {
    if expected == got {
        Ok(())
    } else {
        Err(EvalError::validation(format!(
            "{name}: expected {expected} arguments but got {got}"
        )))
    }
}

fn insert_unique(entries: &mut BTreeMap<Term, Term>, path: &Ref, key: Term, value: Term) -> EvalResult<()> {
    match entries.get(&key) {
        Some(existing) if *existing != value => Err(EvalError::conflict(
            path.to_string(),
            format!("object keys must be unique: {key}"),
        )),
        _ => {
            entries.insert(key, value);
            Ok(())
        }
    }
}
