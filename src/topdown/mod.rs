//! Top-down query evaluation.
//!
//! A [`Query`] is a conjunction of expressions evaluated against a
//! [`RuleSet`], a base-document [`Store`] and an optional input document.
//! Evaluation is depth-first with backtracking: every expression hands each of
//! its solutions to a continuation and undoes its bindings once the
//! continuation returns. Virtual documents are computed on first reference and
//! memoized for the rest of the query.
//!
//! # Example
//! ```rust,ignore
//! let rules = RuleSet::new(vec![Rule::boolean(&["authz", "allow"], vec![
//!     Expr::unify(Term::input_ref(&["role"]), Term::string("admin")),
//! ])])?;
//! let results = QueryBuilder::new()
//!     .rules(Arc::new(rules))
//!     .input(Term::from_json(&json!({"role": "admin"})))
//!     .expr(Expr::unify(Term::var("x"), Term::data_ref(&["authz", "allow"])))
//!     .build()?
//!     .run()?;
//! ```

mod comprehension;
mod copy_prop;
mod eval;
mod refs;
mod results;
mod rules;
mod unify;

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::ast::Expr;
use crate::builtins::BuiltinRegistry;
use crate::cancel::CancelSignal;
use crate::config::EvalConfig;
use crate::error::{EvalError, EvalResult};
use crate::ruleset::RuleSet;
use crate::store::{InMemoryStore, Store};
use crate::term::{Ref, Term};
use crate::tracer::QueryTracer;

pub use results::{QueryResult, ResultSet};

use copy_prop::CopyPropagation;
use eval::Evaluator;

/// Tells a producer whether to keep enumerating solutions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Backtrack and look for the next solution.
    Continue,
    /// Stop enumerating; propagated to the outermost caller.
    Halt,
}

/// Builder for [`Query`].
#[derive(Clone, Default)]
pub struct QueryBuilder {
    rules: Option<Arc<RuleSet>>,
    store: Option<Arc<dyn Store>>,
    builtins: Option<Arc<BuiltinRegistry>>,
    tracer: Option<Arc<dyn QueryTracer>>,
    cancel: Option<CancelSignal>,
    input: Option<Term>,
    config: EvalConfig,
    body: Vec<Expr>,
}

impl QueryBuilder {
    /// Creates a builder with an empty rule set, an empty store and the
    /// standard builtins.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rules defining virtual documents.
    #[must_use]
    pub fn rules(mut self, rules: Arc<RuleSet>) -> Self {
        self.rules = Some(rules);
        self
    }

    /// Store holding base documents.
    #[must_use]
    pub fn store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    /// Builtins callable from the query.
    #[must_use]
    pub fn builtins(mut self, builtins: Arc<BuiltinRegistry>) -> Self {
        self.builtins = Some(builtins);
        self
    }

    /// Observer receiving trace events.
    #[must_use]
    pub fn tracer(mut self, tracer: Arc<dyn QueryTracer>) -> Self {
        self.tracer = Some(tracer);
        self
    }

    /// Shares a cancel signal with the caller. A fresh one is created otherwise.
    #[must_use]
    pub fn cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Document visible as `input`.
    #[must_use]
    pub fn input(mut self, input: Term) -> Self {
        self.input = Some(input);
        self
    }

    /// Evaluation limits and switches.
    #[must_use]
    pub fn config(mut self, config: EvalConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the query body.
    #[must_use]
    pub fn body(mut self, body: Vec<Expr>) -> Self {
        self.body = body;
        self
    }

    /// Appends one expression to the query body.
    #[must_use]
    pub fn expr(mut self, expr: Expr) -> Self {
        self.body.push(expr);
        self
    }

    /// Validates the configuration and freezes the query.
    ///
    /// # Errors
    /// Returns [`EvalError::Config`] for an invalid configuration and
    /// [`EvalError::Validation`] for an empty body.
    pub fn build(self) -> EvalResult<Query> {
        self.config.validate()?;
        if self.body.is_empty() {
            return Err(EvalError::validation("query body must not be empty"));
        }
        Ok(Query {
            id: Uuid::new_v4(),
            rules: self.rules.unwrap_or_default(),
            store: self.store.unwrap_or_else(|| Arc::new(InMemoryStore::new())),
            builtins: self.builtins.unwrap_or_default(),
            tracer: self.tracer,
            cancel: self.cancel.unwrap_or_default(),
            input: self.input,
            config: self.config,
            body: self.body,
        })
    }
}

/// A ready-to-run query. Each [`Query::run`] is an independent evaluation.
pub struct Query {
    id: Uuid,
    rules: Arc<RuleSet>,
    store: Arc<dyn Store>,
    builtins: Arc<BuiltinRegistry>,
    tracer: Option<Arc<dyn QueryTracer>>,
    cancel: CancelSignal,
    input: Option<Term>,
    config: EvalConfig,
    body: Vec<Expr>,
}

impl std::fmt::Debug for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("id", &self.id)
            .field("body", &self.body)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Outcome of [`Query::run_detailed`].
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Distinct result rows.
    pub results: ResultSet,
    /// References memoized with a defined value in the outermost virtual
    /// document cache frame, in path order.
    pub virtual_documents: Vec<Ref>,
}

impl Query {
    /// Identifier used in logs and pool handles.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Expressions of the query body.
    #[must_use]
    pub fn body(&self) -> &[Expr] {
        &self.body
    }

    /// Signal that aborts a running evaluation of this query.
    #[must_use]
    pub fn cancel_signal(&self) -> CancelSignal {
        self.cancel.clone()
    }

    /// Evaluates the query and returns its distinct result rows.
    ///
    /// # Errors
    /// Any [`EvalError`]; an error aborts the whole evaluation and no partial
    /// results are returned.
    pub fn run(&self) -> EvalResult<ResultSet> {
        self.run_detailed().map(|evaluation| evaluation.results)
    }

    /// Like [`Query::run`], additionally reporting cache contents.
    ///
    /// # Errors
    /// See [`Query::run`].
    pub fn run_detailed(&self) -> EvalResult<Evaluation> {
        debug!(query_id = %self.id, exprs = self.body.len(), "evaluating query");
        let outcome = self.evaluate();
        match &outcome {
            Ok(evaluation) => debug!(
                query_id = %self.id,
                rows = evaluation.results.len(),
                "query finished"
            ),
            Err(err) => debug!(query_id = %self.id, error = %err, "query aborted"),
        }
        outcome
    }

    fn evaluate(&self) -> EvalResult<Evaluation> {
        if self.cancel.is_cancelled() {
            return Err(EvalError::Cancelled);
        }
        let propagation = CopyPropagation::analyze(&self.body)?;
        let txn = self.store.begin_read()?;
        let time_ns = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let mut evaluator = Evaluator::new(self, txn, time_ns);
        let rows = evaluator.run_body(&self.body, &propagation)?;
        Ok(Evaluation {
            results: ResultSet::new(rows),
            virtual_documents: evaluator.vcache.keys(),
        })
    }
}
