//! Compiled rule representation.
//!
//! Policies reach the evaluator already compiled: rule bodies are ordered
//! lists of [`Expr`] and rule heads are ground `data.*` references. Nothing
//! here parses source text; rules are built programmatically.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{EvalError, EvalResult};
use crate::term::{Ref, Term, Var};

/// Result shape of a comprehension.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ComprehensionKind {
    /// `[term | body]`, elements in derivation order.
    Array { term: Term },
    /// `{term | body}`, elements in term order.
    Set { term: Term },
    /// `{key: value | body}`, keys in term order.
    Object { key: Term, value: Term },
}

/// An array, set or object comprehension.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Comprehension {
    /// Array, set or object.
    pub kind: ComprehensionKind,
    /// Expressions generating the members.
    pub body: Vec<Expr>,
}

impl Comprehension {
    /// Collects every variable mentioned by the head terms and the body.
    pub fn collect_vars(&self, out: &mut BTreeSet<Var>) {
        match &self.kind {
            ComprehensionKind::Array { term } | ComprehensionKind::Set { term } => {
                term.collect_vars(out, true);
            }
            ComprehensionKind::Object { key, value } => {
                key.collect_vars(out, true);
                value.collect_vars(out, true);
            }
        }
        for expr in &self.body {
            expr.collect_vars(out, true);
        }
    }

    /// Returns true if the body or head reads from `data`.
    #[must_use]
    pub fn references_data(&self) -> bool {
        let head = match &self.kind {
            ComprehensionKind::Array { term } | ComprehensionKind::Set { term } => {
                term_references_data(term)
            }
            ComprehensionKind::Object { key, value } => {
                term_references_data(key) || term_references_data(value)
            }
        };
        head || self.body.iter().any(Expr::references_data)
    }
}

fn term_references_data(term: &Term) -> bool {
    match term {
        Term::Ref(r) => {
            matches!(r.head(), Some(Term::Var(v)) if v.name() == "data")
                || r.terms().iter().any(term_references_data)
        }
        Term::Array(items) => items.iter().any(term_references_data),
        Term::Set(items) => items.iter().any(term_references_data),
        Term::Object(map) => map
            .iter()
            .any(|(k, v)| term_references_data(k) || term_references_data(v)),
        Term::Compr(c) => c.references_data(),
        _ => false,
    }
}

impl fmt::Display for Comprehension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = join(&self.body, "; ");
        match &self.kind {
            ComprehensionKind::Array { term } => write!(f, "[{term} | {body}]"),
            ComprehensionKind::Set { term } => write!(f, "{{{term} | {body}}}"),
            ComprehensionKind::Object { key, value } => write!(f, "{{{key}: {value} | {body}}}"),
        }
    }
}

impl Term {
    /// Creates an array comprehension `[term | body]`.
    #[must_use]
    pub fn array_compr(term: Term, body: Vec<Expr>) -> Self {
        Self::Compr(Arc::new(Comprehension {
            kind: ComprehensionKind::Array { term },
            body,
        }))
    }

    /// Creates a set comprehension `{term | body}`.
    #[must_use]
    pub fn set_compr(term: Term, body: Vec<Expr>) -> Self {
        Self::Compr(Arc::new(Comprehension {
            kind: ComprehensionKind::Set { term },
            body,
        }))
    }

    /// Creates an object comprehension `{key: value | body}`.
    #[must_use]
    pub fn object_compr(key: Term, value: Term, body: Vec<Expr>) -> Self {
        Self::Compr(Arc::new(Comprehension {
            kind: ComprehensionKind::Object { key, value },
            body,
        }))
    }
}

/// Target of a `with` modifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WithTarget {
    /// Replace `input`, or the document at the given path under it.
    Input(Vec<Term>),
    /// Replace a builtin (`count`) or user function (`data.pkg.f`) by name.
    Function(String),
}

impl WithTarget {
    /// Builds a target from a reference such as `input.user` or `data.pkg.f`.
    ///
    /// # Errors
    /// Returns a validation error for references that are neither rooted at
    /// `input`, `data` nor a bare builtin name.
    pub fn from_ref(target: &Ref) -> EvalResult<Self> {
        match target.head() {
            Some(Term::Var(v)) if v.name() == "input" => {
                Ok(Self::Input(target.terms()[1..].to_vec()))
            }
            Some(Term::Var(v)) if v.name() == "data" => {
                if target.is_ground() && target.len() > 1 {
                    Ok(Self::Function(target.to_string()))
                } else {
                    Err(EvalError::validation(format!(
                        "with target {target} must be a ground reference"
                    )))
                }
            }
            Some(Term::Var(_)) => Ok(Self::Function(target.to_string())),
            _ => Err(EvalError::validation(format!(
                "with target {target} is not supported"
            ))),
        }
    }
}

impl fmt::Display for WithTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input(path) => {
                let mut terms = vec![Term::var("input")];
                terms.extend(path.iter().cloned());
                write!(f, "{}", Ref::new(terms))
            }
            Self::Function(name) => f.write_str(name),
        }
    }
}

/// One `with <target> as <value>` clause.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WithModifier {
    /// What is replaced.
    pub target: WithTarget,
    /// Replacement value, or the name of a replacement function.
    pub value: Term,
}

/// A body expression.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Expr {
    /// Succeeds once per defined, non-false value of the term.
    Term(Term),
    /// Unification `a = b`.
    Eq(Term, Term),
    /// Builtin or user-function call. Without an output term the call
    /// succeeds when its result is defined and not `false`.
    Call {
        /// Builtin name or `data.…` function path.
        name: String,
        /// Operand terms.
        args: Vec<Term>,
        /// Term unified with the result; `None` tests the result for truthiness.
        output: Option<Term>,
    },
    /// Succeeds once, without binding anything, iff the inner expression has
    /// no solution.
    Not(Box<Expr>),
    /// Universal quantification `every key, value in domain { body }`.
    Every {
        /// Variable bound to each key of the domain.
        key: Option<Var>,
        /// Variable bound to each value of the domain.
        value: Var,
        /// Collection iterated over.
        domain: Term,
        /// Body that must hold for every element.
        body: Vec<Expr>,
    },
    /// Evaluates `expr` with input and function overrides in place.
    With {
        /// Expression evaluated under the overrides.
        expr: Box<Expr>,
        /// Overrides, applied in order.
        modifiers: Vec<WithModifier>,
    },
}

impl Expr {
    /// Truthiness test of a single term.
    #[must_use]
    pub fn term(term: impl Into<Term>) -> Self {
        Self::Term(term.into())
    }

    /// Unification `a = b`.
    #[must_use]
    pub fn unify(a: impl Into<Term>, b: impl Into<Term>) -> Self {
        Self::Eq(a.into(), b.into())
    }

    /// A call used as a condition, e.g. `lt(x, 3)`.
    #[must_use]
    pub fn call(name: impl Into<String>, args: Vec<Term>) -> Self {
        Self::Call {
            name: name.into(),
            args,
            output: None,
        }
    }

    /// A call whose result is unified with `output`, e.g. `count(xs, n)`.
    #[must_use]
    pub fn call_output(name: impl Into<String>, args: Vec<Term>, output: impl Into<Term>) -> Self {
        Self::Call {
            name: name.into(),
            args,
            output: Some(output.into()),
        }
    }

    /// Negation `not expr`.
    #[must_use]
    pub fn negate(expr: Self) -> Self {
        Self::Not(Box::new(expr))
    }

    /// `every key, value in domain { body }`.
    #[must_use]
    pub fn every(key: Option<&str>, value: &str, domain: impl Into<Term>, body: Vec<Self>) -> Self {
        Self::Every {
            key: key.map(Var::new),
            value: Var::new(value),
            domain: domain.into(),
            body,
        }
    }

    /// Adds a `with` modifier. Modifiers accumulate on an existing `with`.
    #[must_use]
    pub fn with(self, target: WithTarget, value: impl Into<Term>) -> Self {
        let modifier = WithModifier {
            target,
            value: value.into(),
        };
        match self {
            Self::With { expr, mut modifiers } => {
                modifiers.push(modifier);
                Self::With { expr, modifiers }
            }
            other => Self::With {
                expr: Box::new(other),
                modifiers: vec![modifier],
            },
        }
    }

    /// Collects variables of the expression. Closure bodies (comprehensions
    /// and `every`) are only visited when `closures` is true.
    pub fn collect_vars(&self, out: &mut BTreeSet<Var>, closures: bool) {
        match self {
            Self::Term(t) => t.collect_vars(out, closures),
            Self::Eq(a, b) => {
                a.collect_vars(out, closures);
                b.collect_vars(out, closures);
            }
            Self::Call { args, output, .. } => {
                for arg in args {
                    arg.collect_vars(out, closures);
                }
                if let Some(output) = output {
                    output.collect_vars(out, closures);
                }
            }
            Self::Not(inner) => inner.collect_vars(out, closures),
            Self::Every {
                key,
                value,
                domain,
                body,
            } => {
                domain.collect_vars(out, closures);
                if closures {
                    out.extend(key.iter().cloned());
                    out.insert(value.clone());
                    for expr in body {
                        expr.collect_vars(out, closures);
                    }
                }
            }
            Self::With { expr, modifiers } => {
                expr.collect_vars(out, closures);
                for m in modifiers {
                    m.value.collect_vars(out, closures);
                }
            }
        }
    }

    /// Returns true if evaluating the expression may read from `data`.
    #[must_use]
    pub fn references_data(&self) -> bool {
        match self {
            Self::Term(t) => term_references_data(t),
            Self::Eq(a, b) => term_references_data(a) || term_references_data(b),
            Self::Call { name, args, output } => {
                name.starts_with("data.")
                    || args.iter().any(term_references_data)
                    || output.as_ref().is_some_and(term_references_data)
            }
            Self::Not(inner) => inner.references_data(),
            Self::Every { domain, body, .. } => {
                term_references_data(domain) || body.iter().any(Self::references_data)
            }
            Self::With { expr, modifiers } => {
                expr.references_data() || modifiers.iter().any(|m| term_references_data(&m.value))
            }
        }
    }
}

fn join<T: fmt::Display>(items: &[T], sep: &str) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(sep)
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Term(t) => write!(f, "{t}"),
            Self::Eq(a, b) => write!(f, "{a} = {b}"),
            Self::Call { name, args, output } => {
                write!(f, "{name}({})", join(args, ", "))?;
                if let Some(output) = output {
                    write!(f, " = {output}")?;
                }
                Ok(())
            }
            Self::Not(inner) => write!(f, "not {inner}"),
            Self::Every {
                key,
                value,
                domain,
                body,
            } => {
                f.write_str("every ")?;
                if let Some(key) = key {
                    write!(f, "{key}, ")?;
                }
                write!(f, "{value} in {domain} {{ {} }}", join(body, "; "))
            }
            Self::With { expr, modifiers } => {
                write!(f, "{expr}")?;
                for m in modifiers {
                    write!(f, " with {} as {}", m.target, m.value)?;
                }
                Ok(())
            }
        }
    }
}

/// Kind of document a rule defines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// Single value; all satisfied bodies must agree.
    Complete,
    /// Each satisfied body contributes one set member.
    PartialSet,
    /// Each satisfied body contributes one key/value pair.
    PartialObject,
    /// Parameterized complete rule.
    Function,
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Complete => "complete",
            Self::PartialSet => "partial_set",
            Self::PartialObject => "partial_object",
            Self::Function => "function",
        };
        f.write_str(s)
    }
}

/// A compiled rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    /// Document shape this rule contributes to.
    pub kind: RuleKind,
    /// Ground `data.*` reference naming the document this rule defines.
    pub path: Ref,
    /// Function parameters.
    pub args: Vec<Term>,
    /// Set member or object key.
    pub key: Option<Term>,
    /// Rule value; `true` when absent.
    pub value: Option<Term>,
    /// Conjunction that must hold for the head to apply.
    pub body: Vec<Expr>,
    /// A default rule supplies the value when no other body is satisfied.
    pub default: bool,
    /// Tried only when this rule's body has no solution.
    pub else_rule: Option<Box<Rule>>,
}

impl Rule {
    fn new<S: AsRef<str>>(kind: RuleKind, path: &[S], body: Vec<Expr>) -> Self {
        Self {
            kind,
            path: Ref::data(path),
            args: Vec::new(),
            key: None,
            value: None,
            body,
            default: false,
            else_rule: None,
        }
    }

    /// `path := value if { body }`.
    #[must_use]
    pub fn complete<S: AsRef<str>>(path: &[S], value: impl Into<Term>, body: Vec<Expr>) -> Self {
        let mut rule = Self::new(RuleKind::Complete, path, body);
        rule.value = Some(value.into());
        rule
    }

    /// `path if { body }`, i.e. a complete rule with value `true`.
    #[must_use]
    pub fn boolean<S: AsRef<str>>(path: &[S], body: Vec<Expr>) -> Self {
        Self::new(RuleKind::Complete, path, body)
    }

    /// `default path := value`.
    #[must_use]
    pub fn default_value<S: AsRef<str>>(path: &[S], value: impl Into<Term>) -> Self {
        let mut rule = Self::complete(path, value, Vec::new());
        rule.default = true;
        rule
    }

    /// `path contains key if { body }`.
    #[must_use]
    pub fn partial_set<S: AsRef<str>>(path: &[S], key: impl Into<Term>, body: Vec<Expr>) -> Self {
        let mut rule = Self::new(RuleKind::PartialSet, path, body);
        rule.key = Some(key.into());
        rule
    }

    /// `path[key] := value if { body }`.
    #[must_use]
    pub fn partial_object<S: AsRef<str>>(
        path: &[S],
        key: impl Into<Term>,
        value: impl Into<Term>,
        body: Vec<Expr>,
    ) -> Self {
        let mut rule = Self::new(RuleKind::PartialObject, path, body);
        rule.key = Some(key.into());
        rule.value = Some(value.into());
        rule
    }

    /// `path(args...) := value if { body }`.
    #[must_use]
    pub fn function<S: AsRef<str>>(
        path: &[S],
        args: Vec<Term>,
        value: impl Into<Term>,
        body: Vec<Expr>,
    ) -> Self {
        let mut rule = Self::new(RuleKind::Function, path, body);
        rule.args = args;
        rule.value = Some(value.into());
        rule
    }

    /// Appends `else := value if { body }` to the end of the else chain.
    #[must_use]
    pub fn with_else(mut self, value: impl Into<Term>, body: Vec<Expr>) -> Self {
        let branch = Self {
            kind: self.kind,
            path: self.path.clone(),
            args: self.args.clone(),
            key: None,
            value: Some(value.into()),
            body,
            default: false,
            else_rule: None,
        };
        append_else(&mut self.else_rule, branch);
        self
    }

    /// The value produced by the head.
    #[must_use]
    pub fn head_value(&self) -> Term {
        self.value.clone().unwrap_or(Term::Bool(true))
    }
}

fn append_else(slot: &mut Option<Box<Rule>>, branch: Rule) {
    match slot {
        Some(next) => append_else(&mut next.else_rule, branch),
        None => *slot = Some(Box::new(branch)),
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.default {
            f.write_str("default ")?;
        }
        write!(f, "{}", self.path)?;
        match self.kind {
            RuleKind::Function => write!(f, "({})", join(&self.args, ", "))?,
            RuleKind::PartialSet => {
                if let Some(key) = &self.key {
                    write!(f, " contains {key}")?;
                }
            }
            RuleKind::PartialObject => {
                if let Some(key) = &self.key {
                    write!(f, "[{key}]")?;
                }
            }
            RuleKind::Complete => {}
        }
        if self.kind != RuleKind::PartialSet {
            write!(f, " := {}", self.head_value())?;
        }
        if !self.body.is_empty() {
            write!(f, " if {{ {} }}", join(&self.body, "; "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_else_chain_appends_in_order() {
        let rule = Rule::complete(&["authz", "level"], 3, vec![Expr::term(false)])
            .with_else(2, vec![Expr::term(false)])
            .with_else(1, Vec::new());

        let first = rule.else_rule.as_ref().map(|r| r.head_value());
        let second = rule
            .else_rule
            .as_ref()
            .and_then(|r| r.else_rule.as_ref())
            .map(|r| r.head_value());
        assert_eq!(first, Some(Term::number(2)));
        assert_eq!(second, Some(Term::number(1)));
    }

    #[test]
    fn test_comprehension_reports_data_references() {
        let pure = Term::array_compr(Term::var("x"), vec![Expr::unify(Term::var("x"), 1)]);
        let reads = Term::set_compr(
            Term::var("x"),
            vec![Expr::unify(
                Term::var("x"),
                Term::reference(vec![Term::var("data"), Term::string("xs"), Term::wildcard()]),
            )],
        );
        let Term::Compr(pure) = pure else { panic!("expected comprehension") };
        let Term::Compr(reads) = reads else { panic!("expected comprehension") };
        assert!(!pure.references_data());
        assert!(reads.references_data());
    }

    #[test]
    fn test_with_target_from_ref() {
        let input = Ref::input(&["user", "name"]);
        assert_eq!(
            WithTarget::from_ref(&input).ok(),
            Some(WithTarget::Input(vec![Term::string("user"), Term::string("name")]))
        );

        let func = Ref::data(&["lib", "allowed"]);
        assert_eq!(
            WithTarget::from_ref(&func).ok(),
            Some(WithTarget::Function("data.lib.allowed".to_string()))
        );

        let builtin = Ref::new(vec![Term::var("count")]);
        assert_eq!(
            WithTarget::from_ref(&builtin).ok(),
            Some(WithTarget::Function("count".to_string()))
        );
    }

    #[test]
    fn test_display_renders_readable_rules() {
        let rule = Rule::boolean(
            &["authz", "allow"],
            vec![
                Expr::unify(Term::var("x"), Term::input_ref(&["role"])),
                Expr::negate(Expr::call("equal", vec![Term::var("x"), Term::string("guest")])),
            ],
        );
        assert_eq!(
            rule.to_string(),
            "data.authz.allow := true if { x = input.role; not equal(x, \"guest\") }"
        );
    }

    #[test]
    fn test_collect_vars_skips_closures_when_asked() {
        let expr = Expr::every(
            None,
            "x",
            Term::var("xs"),
            vec![Expr::call("gt", vec![Term::var("x"), Term::var("y")])],
        );
        let mut shallow = BTreeSet::new();
        expr.collect_vars(&mut shallow, false);
        assert_eq!(shallow.len(), 1);

        let mut deep = BTreeSet::new();
        expr.collect_vars(&mut deep, true);
        assert_eq!(deep.len(), 3);
    }
}
