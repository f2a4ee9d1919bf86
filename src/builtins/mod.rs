//! Builtin function registry.
//!
//! Builtins are looked up by name in a [`BuiltinRegistry`] injected into each
//! query. A builtin receives fully evaluated operands and either returns one
//! optional result ([`BuiltinFn::Simple`]) or emits any number of results
//! through a callback ([`BuiltinFn::Iter`]), which is how nondeterministic
//! expansion is expressed.

mod aggregates;
mod compare;
mod numbers;
mod objects;
mod semver;
mod sets;
mod time;

use std::cell::Cell;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::cancel::CancelSignal;
use crate::error::{EvalError, EvalResult};
use crate::term::{Number, Term};
use crate::topdown::Flow;
use crate::tracer::{QueryTracer, TraceEvent, TraceOp};

/// Errors raised by builtin implementations.
#[derive(Debug, Error)]
pub enum BuiltinError {
    /// An operand has the wrong type. Always aborts the evaluation.
    #[error("{name}: operand {operand} must be {expected} but got {got}")]
    Type {
        /// Builtin name.
        name: String,
        /// 1-based operand index.
        operand: usize,
        /// Expected operand type.
        expected: String,
        /// Actual operand type.
        got: String,
    },

    /// Any other failure (invalid value, division by zero). Undefined unless
    /// strict builtin errors are enabled.
    #[error("{name}: {message}")]
    Failed { name: String, message: String },

    /// Cancellation was requested while the builtin was running.
    #[error("cancelled")]
    Cancelled,
}

impl BuiltinError {
    /// Creates a type error for operand `operand` (1-based).
    #[must_use]
    pub fn type_error(name: &str, operand: usize, expected: &str, got: &Term) -> Self {
        Self::Type {
            name: name.to_string(),
            operand,
            expected: expected.to_string(),
            got: got.type_name().to_string(),
        }
    }

    /// Creates a non-type failure.
    #[must_use]
    pub fn failed(name: &str, message: impl Into<String>) -> Self {
        Self::Failed {
            name: name.to_string(),
            message: message.into(),
        }
    }
}

impl From<BuiltinError> for EvalError {
    fn from(err: BuiltinError) -> Self {
        match err {
            BuiltinError::Type {
                name,
                operand,
                expected,
                got,
            } => Self::Type {
                location: name,
                operand: Some(operand),
                message: format!("operand {operand} must be {expected} but got {got}"),
            },
            BuiltinError::Failed { name, message } => Self::Builtin { name, message },
            BuiltinError::Cancelled => Self::Cancelled,
        }
    }
}

/// Evaluation state visible to builtins.
pub struct BuiltinContext {
    cancel: CancelSignal,
    tracer: Option<Arc<dyn QueryTracer>>,
    time_ns: i64,
    query_id: u64,
    location: String,
    check_interval: u32,
    ticks: Cell<u32>,
}

impl BuiltinContext {
    pub(crate) fn new(
        cancel: CancelSignal,
        tracer: Option<Arc<dyn QueryTracer>>,
        time_ns: i64,
        query_id: u64,
        check_interval: u32,
    ) -> Self {
        Self {
            cancel,
            tracer,
            time_ns,
            query_id,
            location: "query".to_string(),
            check_interval: check_interval.max(1),
            ticks: Cell::new(0),
        }
    }

    pub(crate) fn set_location(&mut self, query_id: u64, location: &str) {
        self.query_id = query_id;
        location.clone_into(&mut self.location);
    }

    /// Wall-clock time captured when the query started, in nanoseconds.
    #[must_use]
    pub const fn time_ns(&self) -> i64 {
        self.time_ns
    }

    /// Trace identifier of the calling query.
    #[must_use]
    pub const fn query_id(&self) -> u64 {
        self.query_id
    }

    /// Counts one loop iteration and polls the cancel signal every
    /// `cancel_check_interval` iterations.
    ///
    /// # Errors
    /// Returns [`BuiltinError::Cancelled`] once cancellation was requested.
    pub fn check_cancelled(&self) -> Result<(), BuiltinError> {
        let ticks = self.ticks.get().wrapping_add(1);
        self.ticks.set(ticks);
        if ticks % self.check_interval == 0 && self.cancel.is_cancelled() {
            return Err(BuiltinError::Cancelled);
        }
        Ok(())
    }

    /// Emits a `Note` trace event.
    pub fn note(&self, message: &str) {
        if let Some(tracer) = self.tracer.as_ref().filter(|t| t.enabled()) {
            tracer.trace(&TraceEvent {
                op: TraceOp::Note,
                query_id: self.query_id,
                parent_id: self.query_id,
                location: self.location.clone(),
                message: message.to_string(),
            });
        }
    }
}

/// Single-result builtin body.
pub type SimpleFn = dyn Fn(&BuiltinContext, &[Term]) -> Result<Option<Term>, BuiltinError> + Send + Sync;

/// Result callback handed to multi-result builtins.
pub type Emit<'a> = &'a mut dyn FnMut(Term) -> EvalResult<Flow>;

/// Multi-result builtin body.
pub type IterFn = dyn Fn(&BuiltinContext, &[Term], Emit<'_>) -> EvalResult<Flow> + Send + Sync;

/// Builtin implementation.
#[derive(Clone)]
pub enum BuiltinFn {
    /// Returns at most one result.
    Simple(Arc<SimpleFn>),
    /// Emits results through a callback.
    Iter(Arc<IterFn>),
}

impl fmt::Debug for BuiltinFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simple(_) => f.write_str("Simple(..)"),
            Self::Iter(_) => f.write_str("Iter(..)"),
        }
    }
}

/// A named builtin with fixed arity.
#[derive(Debug, Clone)]
pub struct Builtin {
    /// Name the builtin is called by.
    pub name: String,
    /// Number of operands.
    pub arity: usize,
    /// Implementation.
    pub func: BuiltinFn,
}

impl Builtin {
    /// Creates a builtin producing at most one result.
    pub fn simple<F>(name: impl Into<String>, arity: usize, func: F) -> Self
    where
        F: Fn(&BuiltinContext, &[Term]) -> Result<Option<Term>, BuiltinError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            arity,
            func: BuiltinFn::Simple(Arc::new(func)),
        }
    }

    /// Creates a builtin emitting any number of results.
    pub fn iter<F>(name: impl Into<String>, arity: usize, func: F) -> Self
    where
        F: Fn(&BuiltinContext, &[Term], Emit<'_>) -> EvalResult<Flow> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            arity,
            func: BuiltinFn::Iter(Arc::new(func)),
        }
    }
}

/// Name-indexed set of builtins.
#[derive(Debug, Clone)]
pub struct BuiltinRegistry {
    builtins: HashMap<String, Builtin>,
}

impl Default for BuiltinRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl BuiltinRegistry {
    /// Registry without any builtins.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            builtins: HashMap::new(),
        }
    }

    /// Registry with the standard builtins.
    #[must_use]
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        compare::register(&mut registry);
        numbers::register(&mut registry);
        aggregates::register(&mut registry);
        sets::register(&mut registry);
        objects::register(&mut registry);
        semver::register(&mut registry);
        time::register(&mut registry);
        registry.register(Builtin::simple("trace", 1, |ctx, args| {
            let message = string_operand("trace", 1, &args[0])?;
            ctx.note(message);
            Ok(Some(Term::Bool(true)))
        }));
        registry
    }

    /// Adds or replaces a builtin.
    pub fn register(&mut self, builtin: Builtin) {
        self.builtins.insert(builtin.name.clone(), builtin);
    }

    /// Looks up a builtin by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Builtin> {
        self.builtins.get(name)
    }

    /// True if `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.builtins.contains_key(name)
    }

    /// Number of registered builtins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.builtins.len()
    }

    /// True when no builtin is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.builtins.is_empty()
    }
}

pub(crate) fn number_operand(name: &str, operand: usize, term: &Term) -> Result<Number, BuiltinError> {
    term.as_number()
        .ok_or_else(|| BuiltinError::type_error(name, operand, "number", term))
}

pub(crate) fn string_operand<'a>(name: &str, operand: usize, term: &'a Term) -> Result<&'a str, BuiltinError> {
    term.as_str()
        .ok_or_else(|| BuiltinError::type_error(name, operand, "string", term))
}

#[cfg(test)]
pub(crate) fn test_context() -> BuiltinContext {
    BuiltinContext::new(CancelSignal::new(), None, 0, 0, 1)
}

#[cfg(test)]
pub(crate) fn call(name: &str, args: &[Term]) -> Result<Option<Term>, BuiltinError> {
    let registry = BuiltinRegistry::standard();
    let Some(builtin) = registry.get(name) else {
        panic!("unknown builtin {name}");
    };
    assert_eq!(builtin.arity, args.len(), "arity of {name}");
    match &builtin.func {
        BuiltinFn::Simple(f) => f(&test_context(), args),
        BuiltinFn::Iter(_) => panic!("{name} is not a simple builtin"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracer::BufferTracer;

    #[test]
    fn test_standard_registry_contents() {
        let registry = BuiltinRegistry::standard();
        for name in [
            "equal", "neq", "lt", "lte", "gt", "gte", "plus", "minus", "mul", "div", "rem",
            "count", "sum", "max", "min", "and", "or", "intersection", "union",
            "object.union", "object.union_n", "object.get", "object.keys",
            "semver.is_valid", "semver.compare", "numbers.range", "numbers.each",
            "time.now_ns", "trace",
        ] {
            assert!(registry.contains(name), "missing builtin {name}");
        }
        assert!(BuiltinRegistry::empty().is_empty());
    }

    #[test]
    fn test_type_error_converts_with_operand_index() {
        let err: EvalError = BuiltinError::type_error("count", 1, "collection", &Term::number(3)).into();
        let EvalError::Type { location, operand, message } = err else {
            panic!("expected type error");
        };
        assert_eq!(location, "count");
        assert_eq!(operand, Some(1));
        assert!(message.contains("got number"));
    }

    #[test]
    fn test_check_cancelled_respects_interval() {
        let cancel = CancelSignal::new();
        let ctx = BuiltinContext::new(cancel.clone(), None, 0, 0, 4);
        cancel.cancel();
        let mut iterations = 0;
        while ctx.check_cancelled().is_ok() {
            iterations += 1;
        }
        assert_eq!(iterations, 3);
    }

    #[test]
    fn test_trace_builtin_emits_note() {
        let tracer = Arc::new(BufferTracer::new());
        let ctx = BuiltinContext::new(
            CancelSignal::new(),
            Some(tracer.clone() as Arc<dyn QueryTracer>),
            0,
            7,
            1,
        );
        let registry = BuiltinRegistry::standard();
        let Some(BuiltinFn::Simple(f)) = registry.get("trace").map(|b| b.func.clone()) else {
            panic!("trace must be simple");
        };
        let out = f(&ctx, &[Term::string("hello")]).unwrap();
        assert_eq!(out, Some(Term::Bool(true)));

        let notes = tracer.events_of(TraceOp::Note);
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].message, "hello");
        assert_eq!(notes[0].query_id, 7);
    }
}
