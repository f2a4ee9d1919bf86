//! # Regula - Top-down Policy Evaluation
//!
//! Regula evaluates compiled policy rules against JSON-like documents. A
//! query is a conjunction of expressions; the evaluator searches for every
//! assignment of its variables that makes all expressions true, resolving
//! references into base documents (a [`Store`]), virtual documents (rules in
//! a [`RuleSet`]) and the per-query input.
//!
//! ## Core Concepts
//!
//! - **Term**: the value model (scalars, collections, variables, references, comprehensions)
//! - **Bindings**: scoped variable assignments with undo on backtracking
//! - **Virtual documents**: values defined by rules, memoized per evaluation
//! - **Builtins**: named functions supplied through a [`BuiltinRegistry`]
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use regula::{Expr, QueryBuilder, Rule, RuleSet, Term};
//!
//! let rules = RuleSet::new(vec![
//!     Rule::default_value(&["authz", "allow"], false),
//!     Rule::boolean(&["authz", "allow"], vec![
//!         Expr::unify(Term::input_ref(&["role"]), Term::string("admin")),
//!     ]),
//! ])?;
//!
//! let results = QueryBuilder::new()
//!     .rules(Arc::new(rules))
//!     .input(Term::from_json(&serde_json::json!({"role": "admin"})))
//!     .expr(Expr::unify(Term::var("allow"), Term::data_ref(&["authz", "allow"])))
//!     .build()?
//!     .run()?;
//! assert_eq!(results.rows()[0].get("allow"), Some(&Term::Bool(true)));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Value model and compiled policy
pub mod ast;
pub mod error;
pub mod ruleset;
pub mod term;

// Evaluation state
pub mod bindings;
pub mod cache;
pub mod stack;
pub mod union_find;

// Evaluation
pub mod builtins;
pub mod cancel;
pub mod config;
pub mod runtime;
pub mod store;
pub mod topdown;
pub mod tracer;

pub use ast::{Comprehension, ComprehensionKind, Expr, Rule, RuleKind, WithModifier, WithTarget};
pub use bindings::{Binding, BindingMap, Bindings, ScopeId};
pub use builtins::{Builtin, BuiltinContext, BuiltinError, BuiltinFn, BuiltinRegistry};
pub use cache::{BaseCache, CachedValue, ComprehensionCache, VirtualCache};
pub use cancel::CancelSignal;
pub use config::EvalConfig;
pub use error::{ConfigError, EvalError, EvalResult, PoolError};
pub use ruleset::{PackageNode, PathLookup, RuleGroup, RuleSet};
pub use runtime::{EvalHandle, EvalPool, PoolConfig};
pub use stack::{FunctionMocksStack, RefStack};
pub use store::{InMemoryStore, Store, StoreError, Transaction};
pub use term::{Number, Ref, Term, Var};
pub use topdown::{Evaluation, Flow, Query, QueryBuilder, QueryResult, ResultSet};
pub use tracer::{BufferTracer, QueryTracer, TraceEvent, TraceOp};
pub use union_find::{MergeConflict, UnionFind, UnionFindRoot};
