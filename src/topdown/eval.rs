//! Evaluator state and expression evaluation.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::ast::{Expr, WithModifier, WithTarget};
use crate::bindings::{Bindings, ScopeId};
use crate::builtins::{BuiltinContext, BuiltinRegistry};
use crate::cache::{BaseCache, ComprehensionCache, VirtualCache};
use crate::cancel::CancelSignal;
use crate::config::EvalConfig;
use crate::error::{EvalError, EvalResult};
use crate::ruleset::RuleSet;
use crate::stack::{FunctionMocksStack, RefStack};
use crate::store::{Store, Transaction};
use crate::term::{Ref, Term, Var};
use crate::tracer::{QueryTracer, TraceEvent, TraceOp};

use super::copy_prop::CopyPropagation;
use super::{Flow, Query};

/// Continuation invoked once per solution.
pub(super) type Cont<'a, 'q> = &'a mut dyn FnMut(&mut Evaluator<'q>) -> EvalResult<Flow>;

/// Continuation receiving one value per solution.
pub(super) type TermCont<'a, 'q> = &'a mut dyn FnMut(&mut Evaluator<'q>, Term) -> EvalResult<Flow>;

/// Continuation receiving one list of values per solution.
pub(super) type TermsCont<'a, 'q> = &'a mut dyn FnMut(&mut Evaluator<'q>, &[Term]) -> EvalResult<Flow>;

/// Trace identity of the query (or rule body) being evaluated.
pub(super) struct TraceFrame {
    query_id: u64,
    parent_id: u64,
    location: String,
}

/// Mutable state of one evaluation.
pub(super) struct Evaluator<'q> {
    pub(super) rules: &'q RuleSet,
    pub(super) store: &'q dyn Store,
    pub(super) builtins: &'q BuiltinRegistry,
    tracer: Option<Arc<dyn QueryTracer>>,
    cancel: CancelSignal,
    pub(super) config: EvalConfig,
    pub(super) txn: Transaction,
    pub(super) input: Option<Term>,
    time_ns: i64,
    pub(super) bindings: Bindings,
    pub(super) vcache: VirtualCache,
    pub(super) base_cache: BaseCache,
    pub(super) compr_cache: ComprehensionCache,
    pub(super) ref_stack: RefStack,
    pub(super) mocks: FunctionMocksStack,
    pub(super) depth: usize,
    ticks: u32,
    query_id: u64,
    parent_id: u64,
    next_query_id: u64,
    location: String,
}

impl<'q> Evaluator<'q> {
    pub(super) fn new(query: &'q Query, txn: Transaction, time_ns: i64) -> Self {
        Self {
            rules: &query.rules,
            store: &*query.store,
            builtins: &query.builtins,
            tracer: query.tracer.clone(),
            cancel: query.cancel.clone(),
            config: query.config,
            txn,
            input: query.input.clone(),
            time_ns,
            bindings: Bindings::new(),
            vcache: VirtualCache::new(),
            base_cache: BaseCache::new(),
            compr_cache: ComprehensionCache::new(),
            ref_stack: RefStack::new(),
            mocks: FunctionMocksStack::new(),
            depth: 0,
            ticks: 0,
            query_id: 0,
            parent_id: 0,
            next_query_id: 0,
            location: "query".to_string(),
        }
    }

    /// Evaluates the top-level body and returns the simplified, distinct rows.
    pub(super) fn run_body(
        &mut self,
        body: &[Expr],
        propagation: &CopyPropagation,
    ) -> EvalResult<Vec<BTreeMap<String, Term>>> {
        let vars = result_vars(body);
        let mut rows = Vec::new();
        let mut seen = BTreeSet::new();
        self.trace(TraceOp::Enter, || {
            body.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
        });
        self.eval_body(body, ScopeId::ROOT, &mut |ev| {
            let row = propagation.simplify(&ev.bindings, &vars, ScopeId::ROOT);
            ev.trace(TraceOp::Exit, || format!("{row:?}"));
            if seen.insert(row.clone()) {
                rows.push(row);
            }
            Ok(Flow::Continue)
        })?;
        Ok(rows)
    }

    /// Counts one step of work and polls the cancel signal every
    /// `cancel_check_interval` steps.
    pub(super) fn tick(&mut self) -> EvalResult<()> {
        self.ticks = self.ticks.wrapping_add(1);
        if self.ticks % self.config.cancel_check_interval == 0 && self.cancel.is_cancelled() {
            return Err(EvalError::Cancelled);
        }
        Ok(())
    }

    pub(super) fn trace(&self, op: TraceOp, message: impl FnOnce() -> String) {
        if let Some(tracer) = self.tracer.as_ref().filter(|t| t.enabled()) {
            tracer.trace(&TraceEvent {
                op,
                query_id: self.query_id,
                parent_id: self.parent_id,
                location: self.location.clone(),
                message: message(),
            });
        }
    }

    /// Opens a child query for a rule body.
    pub(super) fn enter_query(&mut self, location: String) -> TraceFrame {
        self.next_query_id += 1;
        let saved = TraceFrame {
            query_id: self.query_id,
            parent_id: self.parent_id,
            location: std::mem::replace(&mut self.location, location),
        };
        self.parent_id = self.query_id;
        self.query_id = self.next_query_id;
        saved
    }

    pub(super) fn exit_query(&mut self, saved: TraceFrame) {
        self.query_id = saved.query_id;
        self.parent_id = saved.parent_id;
        self.location = saved.location;
    }

    pub(super) fn builtin_context(&self) -> BuiltinContext {
        let mut ctx = BuiltinContext::new(
            self.cancel.clone(),
            self.tracer.clone(),
            self.time_ns,
            self.query_id,
            self.config.cancel_check_interval,
        );
        ctx.set_location(self.query_id, &self.location);
        ctx
    }

    /// Evaluates a conjunction left to right.
    pub(super) fn eval_body(&mut self, body: &[Expr], scope: ScopeId, k: Cont<'_, 'q>) -> EvalResult<Flow> {
        let Some((expr, rest)) = body.split_first() else {
            return k(self);
        };
        self.tick()?;
        self.trace(TraceOp::Eval, || expr.to_string());
        let mut solved = false;
        let flow = self.eval_expr(expr, scope, &mut |ev| {
            solved = true;
            let flow = ev.eval_body(rest, scope, &mut *k)?;
            if flow == Flow::Continue {
                ev.trace(TraceOp::Redo, || expr.to_string());
            }
            Ok(flow)
        })?;
        if !solved {
            self.trace(TraceOp::Fail, || expr.to_string());
        }
        Ok(flow)
    }

    pub(super) fn eval_expr(&mut self, expr: &Expr, scope: ScopeId, k: Cont<'_, 'q>) -> EvalResult<Flow> {
        match expr {
            Expr::Term(term) => self.eval_term(term, scope, &mut |ev, value| match value {
                Term::Bool(false) | Term::Var(_) => Ok(Flow::Continue),
                _ => k(ev),
            }),
            Expr::Eq(a, b) => self.eval_term(a, scope, &mut |ev, left| {
                ev.eval_term(b, scope, &mut |ev, right| {
                    ev.unify(&left, scope, &right, scope, &mut *k)
                })
            }),
            Expr::Call { name, args, output } => {
                let mut acc = Vec::with_capacity(args.len());
                self.eval_terms(args, scope, &mut acc, &mut |ev, values| {
                    ev.call(name, values, &mut |ev, result| match output {
                        None if result == Term::Bool(false) => Ok(Flow::Continue),
                        None => k(ev),
                        Some(out) => ev.eval_term(out, scope, &mut |ev, target| {
                            ev.unify(&target, scope, &result, scope, &mut *k)
                        }),
                    })
                })
            }
            Expr::Not(inner) => {
                let mark = self.bindings.mark();
                let mut found = false;
                let result = self.eval_expr(inner, scope, &mut |_| {
                    found = true;
                    Ok(Flow::Halt)
                });
                self.bindings.undo(mark);
                result?;
                if found {
                    Ok(Flow::Continue)
                } else {
                    k(self)
                }
            }
            Expr::Every {
                key,
                value,
                domain,
                body,
            } => self.eval_term(domain, scope, &mut |ev, domain| {
                if !domain.is_collection() {
                    return Ok(Flow::Continue);
                }
                for (k_term, v_term) in domain.entries() {
                    ev.tick()?;
                    if !ev.every_element(key.as_ref(), value, k_term, v_term, body, scope)? {
                        return Ok(Flow::Continue);
                    }
                }
                k(ev)
            }),
            Expr::With { expr, modifiers } => self.eval_with(expr, modifiers, scope, k),
        }
    }

    /// Runs an `every` body for one domain element in a child scope.
    fn every_element(
        &mut self,
        key: Option<&Var>,
        value: &Var,
        k_term: Term,
        v_term: Term,
        body: &[Expr],
        scope: ScopeId,
    ) -> EvalResult<bool> {
        let child = self.bindings.push_scope(Some(scope));
        let mark = self.bindings.mark();
        if let Some(key) = key {
            self.bindings.put(key, child, k_term, child);
        }
        self.bindings.put(value, child, v_term, child);
        let mut found = false;
        let result = self.eval_body(body, child, &mut |_| {
            found = true;
            Ok(Flow::Halt)
        });
        self.bindings.undo(mark);
        self.bindings.pop_scope(child)?;
        result?;
        Ok(found)
    }

    /// Evaluates `expr` under overridden input and function mocks.
    ///
    /// Solutions are collected inside the overridden state and replayed to
    /// the continuation afterwards, so the rest of the body sees the
    /// original input, mocks and caches.
    fn eval_with(
        &mut self,
        expr: &Expr,
        modifiers: &[WithModifier],
        scope: ScopeId,
        k: Cont<'_, 'q>,
    ) -> EvalResult<Flow> {
        let mut input = self.input.clone();
        let mut pairs = Vec::new();
        for modifier in modifiers {
            let Some(value) = self.modifier_value(modifier, scope)? else {
                return Ok(Flow::Continue);
            };
            match &modifier.target {
                WithTarget::Input(path) => {
                    let path: Vec<Term> = path.iter().map(|t| self.bindings.plug(t, scope)).collect();
                    if let Some(segment) = path.iter().find(|t| !t.is_ground()) {
                        return Err(EvalError::validation(format!(
                            "with input path segment {segment} is not ground"
                        )));
                    }
                    let base = input.take().unwrap_or_else(|| Term::object(Vec::new()));
                    input = Some(base.with_path(&path, value));
                }
                WithTarget::Function(name) => {
                    self.check_mock_target(name)?;
                    pairs.push((Term::string(name), value));
                }
            }
        }

        let mut vars = BTreeSet::new();
        expr.collect_vars(&mut vars, false);
        let mut solutions: Vec<Vec<(Var, Term)>> = Vec::new();

        let saved_input = std::mem::replace(&mut self.input, input);
        self.mocks.put_pairs(&pairs);
        self.vcache.push();
        self.compr_cache.push();
        let result = self.eval_expr(expr, scope, &mut |ev| {
            let row = vars
                .iter()
                .map(|v| (v.clone(), ev.bindings.plug(&Term::Var(v.clone()), scope)))
                .collect();
            solutions.push(row);
            Ok(Flow::Continue)
        });
        self.compr_cache.pop();
        let popped = self.vcache.pop();
        self.mocks.pop_pairs();
        self.input = saved_input;
        result?;
        popped?;

        for row in solutions {
            self.tick()?;
            let mark = self.bindings.mark();
            for (var, value) in row {
                if value != Term::Var(var.clone()) && self.bindings.get(&var, scope).is_none() {
                    self.bindings.put(&var, scope, value, scope);
                }
            }
            let flow = k(self);
            self.bindings.undo(mark);
            if flow? == Flow::Halt {
                return Ok(Flow::Halt);
            }
        }
        Ok(Flow::Continue)
    }

    /// Resolves the replacement value of a `with` modifier. `None` means the
    /// value is undefined, which makes the whole expression undefined.
    fn modifier_value(&mut self, modifier: &WithModifier, scope: ScopeId) -> EvalResult<Option<Term>> {
        if let WithTarget::Function(_) = modifier.target {
            match &modifier.value {
                Term::Ref(r) if r.is_ground() && self.rules.function(&r.to_string()).is_some() => {
                    return Ok(Some(modifier.value.clone()));
                }
                Term::Var(v)
                    if self.bindings.get(v, scope).is_none() && self.builtins.contains(v.name()) =>
                {
                    return Ok(Some(Term::Ref(Ref::new(vec![modifier.value.clone()]))));
                }
                _ => {}
            }
        }
        let mut first = None;
        self.eval_term(&modifier.value, scope, &mut |_, value| {
            first = Some(value);
            Ok(Flow::Halt)
        })?;
        match first {
            Some(value) if !value.is_ground() => Err(EvalError::validation(format!(
                "with value {} is not ground",
                modifier.value
            ))),
            other => Ok(other),
        }
    }

    fn check_mock_target(&self, name: &str) -> EvalResult<()> {
        if name.starts_with("data.") {
            if self.rules.function(name).is_none() {
                return Err(EvalError::validation(format!(
                    "with target {name} is not a function; overriding data documents is not supported"
                )));
            }
        } else if !self.builtins.contains(name) {
            return Err(EvalError::validation(format!("with target {name} is not a known function")));
        }
        Ok(())
    }

    /// Evaluates a term, yielding each of its values.
    ///
    /// Terms without references or comprehensions yield themselves with
    /// bound variables substituted.
    pub(super) fn eval_term(&mut self, term: &Term, scope: ScopeId, k: TermCont<'_, 'q>) -> EvalResult<Flow> {
        if !term.needs_eval() {
            let value = self.bindings.plug(term, scope);
            return k(self, value);
        }
        match term {
            Term::Ref(r) => self.eval_ref(r, scope, k),
            Term::Compr(c) => self.eval_comprehension(term, c, scope, k),
            Term::Array(items) => {
                let mut acc = Vec::with_capacity(items.len());
                self.eval_terms(items, scope, &mut acc, &mut |ev, values| {
                    k(ev, Term::array(values.to_vec()))
                })
            }
            Term::Set(items) => {
                let items: Vec<Term> = items.iter().cloned().collect();
                let mut acc = Vec::with_capacity(items.len());
                self.eval_terms(&items, scope, &mut acc, &mut |ev, values| {
                    k(ev, Term::set(values.to_vec()))
                })
            }
            Term::Object(map) => {
                let flat: Vec<Term> = map.iter().flat_map(|(key, value)| [key.clone(), value.clone()]).collect();
                let mut acc = Vec::with_capacity(flat.len());
                self.eval_terms(&flat, scope, &mut acc, &mut |ev, values| {
                    let pairs = values.chunks_exact(2).map(|pair| (pair[0].clone(), pair[1].clone()));
                    k(ev, Term::object(pairs.collect::<Vec<_>>()))
                })
            }
            other => {
                let value = self.bindings.plug(other, scope);
                k(self, value)
            }
        }
    }

    /// Evaluates a list of terms, yielding every combination of their values.
    pub(super) fn eval_terms(
        &mut self,
        terms: &[Term],
        scope: ScopeId,
        acc: &mut Vec<Term>,
        k: TermsCont<'_, 'q>,
    ) -> EvalResult<Flow> {
        let Some((term, rest)) = terms.split_first() else {
            return k(self, acc.as_slice());
        };
        self.eval_term(term, scope, &mut |ev, value| {
            acc.push(value);
            let flow = ev.eval_terms(rest, scope, &mut *acc, &mut *k);
            acc.pop();
            flow
        })
    }
}

/// Variables reported in result rows: top-level, non-hidden.
fn result_vars(body: &[Expr]) -> BTreeSet<Var> {
    let mut vars = BTreeSet::new();
    for expr in body {
        expr.collect_vars(&mut vars, false);
    }
    vars.retain(|v| !v.is_hidden());
    vars
}
