//! Terms: the immutable values the evaluator binds, compares and plugs.
//!
//! Composite terms share their children through `Arc`, so cloning a term is
//! cheap regardless of its size. Every term has a total order
//! (null < boolean < number < string < var < ref < array < object < set <
//! comprehension), which gives sets, objects and result rows their
//! deterministic iteration order.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::ast::Comprehension;

/// A JSON number with a total order.
///
/// `-0.0` is normalized to `0.0` so that equal numbers hash identically.
#[derive(Debug, Clone, Copy)]
pub struct Number(f64);

impl Number {
    /// Largest integer exactly representable as `f64`.
    const MAX_SAFE_INT: f64 = 9_007_199_254_740_992.0;

    /// Creates a number.
    #[must_use]
    pub fn new(value: f64) -> Self {
        if value == 0.0 {
            Self(0.0)
        } else {
            Self(value)
        }
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn value(self) -> f64 {
        self.0
    }

    /// Returns the value as an integer if it is integral and exactly representable.
    #[must_use]
    pub fn as_i64(self) -> Option<i64> {
        if self.0.fract() == 0.0 && self.0.abs() <= Self::MAX_SAFE_INT {
            #[allow(clippy::cast_possible_truncation)]
            Some(self.0 as i64)
        } else {
            None
        }
    }

    /// Returns the value as an array index.
    #[must_use]
    pub fn as_index(self) -> Option<usize> {
        self.as_i64().and_then(|i| usize::try_from(i).ok())
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Number {}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Number {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Hash for Number {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_i64() {
            Some(i) => write!(f, "{i}"),
            None => write!(f, "{}", self.0),
        }
    }
}

impl From<f64> for Number {
    fn from(v: f64) -> Self {
        Self::new(v)
    }
}

impl From<i64> for Number {
    #[allow(clippy::cast_precision_loss)]
    fn from(v: i64) -> Self {
        Self::new(v as f64)
    }
}

impl From<i32> for Number {
    fn from(v: i32) -> Self {
        Self::new(f64::from(v))
    }
}

impl From<usize> for Number {
    #[allow(clippy::cast_precision_loss)]
    fn from(v: usize) -> Self {
        Self::new(v as f64)
    }
}

/// A named placeholder.
///
/// The name alone does not identify a variable: the binding environment keys
/// variables by `(name, scope)`, so closures may reuse names freely.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Var(Arc<str>);

impl Var {
    /// The wildcard name. Every occurrence is a fresh, never-bound variable.
    pub const WILDCARD: &'static str = "_";

    /// Creates a variable.
    #[must_use]
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// Returns the variable name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }

    /// Returns true for `_`.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        &*self.0 == Self::WILDCARD
    }

    /// Names starting with `_` or `$` are internal and never reported in results.
    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.0.starts_with('_') || self.0.starts_with('$')
    }

    /// Returns true for the `data` and `input` document roots.
    #[must_use]
    pub fn is_root_document(&self) -> bool {
        matches!(&*self.0, "data" | "input")
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A reference: an ordered sequence of terms addressing a path, e.g. `data.a.b[x]`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ref(Arc<[Term]>);

impl Ref {
    /// Creates a reference from its terms. The first term is the head.
    #[must_use]
    pub fn new(terms: impl Into<Vec<Term>>) -> Self {
        Self(Arc::from(terms.into()))
    }

    /// Creates a `data.<path>` reference.
    #[must_use]
    pub fn data<S: AsRef<str>>(path: &[S]) -> Self {
        Self::rooted("data", path)
    }

    /// Creates an `input.<path>` reference.
    #[must_use]
    pub fn input<S: AsRef<str>>(path: &[S]) -> Self {
        Self::rooted("input", path)
    }

    fn rooted<S: AsRef<str>>(head: &str, path: &[S]) -> Self {
        let mut terms = Vec::with_capacity(path.len() + 1);
        terms.push(Term::var(head));
        terms.extend(path.iter().map(|s| Term::string(s.as_ref())));
        Self::new(terms)
    }

    /// Returns all terms including the head.
    #[must_use]
    pub fn terms(&self) -> &[Term] {
        &self.0
    }

    /// Returns the head term.
    #[must_use]
    pub fn head(&self) -> Option<&Term> {
        self.0.first()
    }

    /// Returns the number of terms including the head.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the reference has no terms.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns true if `self` equals `other` or is a structural prefix of it.
    #[must_use]
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        self.len() <= other.len() && self.0.iter().zip(other.0.iter()).all(|(a, b)| a == b)
    }

    /// Returns a new reference with `term` appended.
    #[must_use]
    pub fn append(&self, term: Term) -> Self {
        self.concat(std::slice::from_ref(&term))
    }

    /// Returns a new reference with `rest` appended.
    #[must_use]
    pub fn concat(&self, rest: &[Term]) -> Self {
        let mut terms = Vec::with_capacity(self.len() + rest.len());
        terms.extend(self.0.iter().cloned());
        terms.extend(rest.iter().cloned());
        Self::new(terms)
    }

    /// Returns true if no term after the head contains a variable.
    #[must_use]
    pub fn is_ground(&self) -> bool {
        self.0.iter().skip(1).all(Term::is_ground)
    }

    /// Returns the longest prefix (head included) whose terms are all ground.
    #[must_use]
    pub fn ground_prefix(&self) -> Self {
        let end = self
            .0
            .iter()
            .skip(1)
            .position(|t| !t.is_ground())
            .map_or(self.len(), |i| i + 1);
        Self::new(self.0[..end].to_vec())
    }

    /// Returns the path segments after the head when they are all strings.
    #[must_use]
    pub fn string_path(&self) -> Option<Vec<String>> {
        self.0
            .iter()
            .skip(1)
            .map(|t| t.as_str().map(str::to_string))
            .collect()
    }

    /// Converts the segments after the head into store path segments.
    ///
    /// Strings are used as-is and non-negative integers become their decimal
    /// form; any other segment makes the path unaddressable.
    #[must_use]
    pub fn to_store_path(&self) -> Option<Vec<String>> {
        self.0.iter().skip(1).map(Term::to_store_segment).collect()
    }
}

impl From<Vec<Term>> for Ref {
    fn from(terms: Vec<Term>) -> Self {
        Self::new(terms)
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl fmt::Display for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut iter = self.0.iter();
        if let Some(head) = iter.next() {
            write!(f, "{head}")?;
        }
        for term in iter {
            match term {
                Term::String(s) if is_identifier(s) => write!(f, ".{s}")?,
                other => write!(f, "[{other}]")?,
            }
        }
        Ok(())
    }
}

/// An immutable, structurally compared term.
#[derive(Debug, Clone)]
pub enum Term {
    /// JSON `null`.
    Null,
    /// Boolean.
    Bool(bool),
    /// Number.
    Number(Number),
    /// UTF-8 string.
    String(Arc<str>),
    /// Variable.
    Var(Var),
    /// Reference into `data`, `input` or a local value.
    Ref(Ref),
    /// Ordered array.
    Array(Arc<Vec<Term>>),
    /// Object with term keys.
    Object(Arc<BTreeMap<Term, Term>>),
    /// Set of distinct terms.
    Set(Arc<BTreeSet<Term>>),
    /// Array, set or object comprehension. Only appears in rule bodies.
    Compr(Arc<Comprehension>),
}

impl Term {
    /// Creates a string term.
    #[must_use]
    pub fn string(s: impl AsRef<str>) -> Self {
        Self::String(Arc::from(s.as_ref()))
    }

    /// Creates a number term.
    #[must_use]
    pub fn number(n: impl Into<Number>) -> Self {
        Self::Number(n.into())
    }

    /// Creates a variable term.
    #[must_use]
    pub fn var(name: impl AsRef<str>) -> Self {
        Self::Var(Var::new(name))
    }

    /// Creates the wildcard variable `_`.
    #[must_use]
    pub fn wildcard() -> Self {
        Self::var(Var::WILDCARD)
    }

    /// Creates an array term.
    #[must_use]
    pub fn array(items: impl IntoIterator<Item = Term>) -> Self {
        Self::Array(Arc::new(items.into_iter().collect()))
    }

    /// Creates an object term. Later duplicates of a key win.
    #[must_use]
    pub fn object(pairs: impl IntoIterator<Item = (Term, Term)>) -> Self {
        Self::Object(Arc::new(pairs.into_iter().collect()))
    }

    /// Creates a set term.
    #[must_use]
    pub fn set(items: impl IntoIterator<Item = Term>) -> Self {
        Self::Set(Arc::new(items.into_iter().collect()))
    }

    /// Creates a reference term from its terms.
    #[must_use]
    pub fn reference(terms: impl Into<Vec<Term>>) -> Self {
        Self::Ref(Ref::new(terms))
    }

    /// Creates a `data.<path>` reference term.
    #[must_use]
    pub fn data_ref<S: AsRef<str>>(path: &[S]) -> Self {
        Self::Ref(Ref::data(path))
    }

    /// Creates an `input.<path>` reference term.
    #[must_use]
    pub fn input_ref<S: AsRef<str>>(path: &[S]) -> Self {
        Self::Ref(Ref::input(path))
    }

    const fn rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Bool(_) => 1,
            Self::Number(_) => 2,
            Self::String(_) => 3,
            Self::Var(_) => 4,
            Self::Ref(_) => 5,
            Self::Array(_) => 6,
            Self::Object(_) => 7,
            Self::Set(_) => 8,
            Self::Compr(_) => 9,
        }
    }

    /// Returns a human-readable type name.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Var(_) => "var",
            Self::Ref(_) => "ref",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
            Self::Set(_) => "set",
            Self::Compr(_) => "comprehension",
        }
    }

    /// Returns true for null, boolean, number and string terms.
    #[must_use]
    pub const fn is_scalar(&self) -> bool {
        matches!(self, Self::Null | Self::Bool(_) | Self::Number(_) | Self::String(_))
    }

    /// Returns true if the term contains no variables, references or comprehensions.
    #[must_use]
    pub fn is_ground(&self) -> bool {
        match self {
            Self::Var(_) | Self::Ref(_) | Self::Compr(_) => false,
            Self::Array(items) => items.iter().all(Self::is_ground),
            Self::Object(map) => map.iter().all(|(k, v)| k.is_ground() && v.is_ground()),
            Self::Set(items) => items.iter().all(Self::is_ground),
            _ => true,
        }
    }

    /// Returns true if evaluating the term requires resolving references or comprehensions.
    #[must_use]
    pub(crate) fn needs_eval(&self) -> bool {
        match self {
            Self::Ref(_) | Self::Compr(_) => true,
            Self::Array(items) => items.iter().any(Self::needs_eval),
            Self::Object(map) => map.iter().any(|(k, v)| k.needs_eval() || v.needs_eval()),
            Self::Set(items) => items.iter().any(Self::needs_eval),
            _ => false,
        }
    }

    /// Boolean value, if this is a boolean.
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Numeric value, if this is a number.
    pub const fn as_number(&self) -> Option<Number> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// String value, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The variable, if this is one.
    pub const fn as_var(&self) -> Option<&Var> {
        match self {
            Self::Var(v) => Some(v),
            _ => None,
        }
    }

    /// Elements, if this is an array.
    pub fn as_array(&self) -> Option<&[Term]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Entries, if this is an object.
    pub fn as_object(&self) -> Option<&BTreeMap<Term, Term>> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Members, if this is a set.
    pub fn as_set(&self) -> Option<&BTreeSet<Term>> {
        match self {
            Self::Set(items) => Some(items),
            _ => None,
        }
    }

    pub(crate) fn to_store_segment(&self) -> Option<String> {
        match self {
            Self::String(s) => Some(s.to_string()),
            Self::Number(n) => n.as_index().map(|i| i.to_string()),
            _ => None,
        }
    }

    /// Looks up one path segment: array index, object key or set member.
    #[must_use]
    pub fn get(&self, key: &Term) -> Option<Term> {
        match self {
            Self::Array(items) => {
                let idx = key.as_number()?.as_index()?;
                items.get(idx).cloned()
            }
            Self::Object(map) => map.get(key).cloned(),
            Self::Set(items) => items.get(key).cloned(),
            _ => None,
        }
    }

    /// Structural lookup of `path` inside this term.
    ///
    /// Returns `None` when any segment does not resolve (missing key,
    /// out-of-range index, scalar in the middle of the path).
    #[must_use]
    pub fn find(&self, path: &[Term]) -> Option<Term> {
        let mut current = self.clone();
        for segment in path {
            current = current.get(segment)?;
        }
        Some(current)
    }

    /// Iterates `(key, value)` pairs: array `(index, element)`, object
    /// `(key, value)`, set `(member, member)`. Scalars yield nothing.
    pub fn entries(&self) -> Box<dyn Iterator<Item = (Term, Term)> + '_> {
        match self {
            Self::Array(items) => Box::new(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, v)| (Term::number(i), v.clone())),
            ),
            Self::Object(map) => Box::new(map.iter().map(|(k, v)| (k.clone(), v.clone()))),
            Self::Set(items) => Box::new(items.iter().map(|v| (v.clone(), v.clone()))),
            _ => Box::new(std::iter::empty()),
        }
    }

    /// Returns true for arrays, objects and sets.
    #[must_use]
    pub const fn is_collection(&self) -> bool {
        matches!(self, Self::Array(_) | Self::Object(_) | Self::Set(_))
    }

    /// Returns a copy of this term with `value` stored at `path`.
    ///
    /// Missing or non-object intermediate nodes are replaced by objects.
    #[must_use]
    pub fn with_path(&self, path: &[Term], value: Term) -> Term {
        let Some((key, rest)) = path.split_first() else {
            return value;
        };
        let mut map = match self {
            Self::Object(map) => (**map).clone(),
            _ => BTreeMap::new(),
        };
        let child = map.get(key).cloned().unwrap_or(Term::Null);
        map.insert(key.clone(), child.with_path(rest, value));
        Term::Object(Arc::new(map))
    }

    /// Collects the variables occurring in this term.
    ///
    /// The heads `data` and `input` of references are not variables. With
    /// `closures` false, variables inside comprehensions are skipped.
    pub fn collect_vars(&self, out: &mut BTreeSet<Var>, closures: bool) {
        match self {
            Self::Var(v) => {
                out.insert(v.clone());
            }
            Self::Ref(r) => {
                for (i, t) in r.terms().iter().enumerate() {
                    match t {
                        Self::Var(v) if i == 0 && v.is_root_document() => {}
                        other => other.collect_vars(out, closures),
                    }
                }
            }
            Self::Array(items) => items.iter().for_each(|t| t.collect_vars(out, closures)),
            Self::Set(items) => items.iter().for_each(|t| t.collect_vars(out, closures)),
            Self::Object(map) => {
                for (k, v) in map.iter() {
                    k.collect_vars(out, closures);
                    v.collect_vars(out, closures);
                }
            }
            Self::Compr(c) => {
                if closures {
                    c.collect_vars(out);
                }
            }
            _ => {}
        }
    }

    /// Returns the variables occurring in this term, including closures.
    #[must_use]
    pub fn vars(&self) -> BTreeSet<Var> {
        let mut out = BTreeSet::new();
        self.collect_vars(&mut out, true);
        out
    }

    /// Converts a JSON document into a term.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => n.as_f64().map_or(Self::Null, |f| Self::Number(Number::new(f))),
            Value::String(s) => Self::string(s),
            Value::Array(items) => Self::array(items.iter().map(Self::from_json)),
            Value::Object(map) => {
                Self::object(map.iter().map(|(k, v)| (Self::string(k), Self::from_json(v))))
            }
        }
    }

    /// Converts a ground term into JSON. Sets become arrays and non-string
    /// object keys are rendered as their textual form.
    #[must_use]
    pub fn to_json(&self) -> Option<serde_json::Value> {
        use serde_json::Value;

        Some(match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Number(n) => match n.as_i64() {
                Some(i) => Value::from(i),
                None => serde_json::Number::from_f64(n.value()).map_or(Value::Null, Value::Number),
            },
            Self::String(s) => Value::String(s.to_string()),
            Self::Array(items) => Value::Array(items.iter().map(Self::to_json).collect::<Option<_>>()?),
            Self::Set(items) => Value::Array(items.iter().map(Self::to_json).collect::<Option<_>>()?),
            Self::Object(map) => {
                let mut out = serde_json::Map::with_capacity(map.len());
                for (k, v) in map.iter() {
                    let key = match k {
                        Self::String(s) => s.to_string(),
                        other if other.is_ground() => other.to_string(),
                        _ => return None,
                    };
                    out.insert(key, v.to_json()?);
                }
                Value::Object(out)
            }
            Self::Var(_) | Self::Ref(_) | Self::Compr(_) => return None,
        })
    }
}

impl PartialEq for Term {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Term {}

impl PartialOrd for Term {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Term {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Null, Self::Null) => Ordering::Equal,
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Number(a), Self::Number(b)) => a.cmp(b),
            (Self::String(a), Self::String(b)) => a.cmp(b),
            (Self::Var(a), Self::Var(b)) => a.cmp(b),
            (Self::Ref(a), Self::Ref(b)) => a.cmp(b),
            (Self::Array(a), Self::Array(b)) => {
                if Arc::ptr_eq(a, b) {
                    Ordering::Equal
                } else {
                    a.cmp(b)
                }
            }
            (Self::Object(a), Self::Object(b)) => {
                if Arc::ptr_eq(a, b) {
                    Ordering::Equal
                } else {
                    a.cmp(b)
                }
            }
            (Self::Set(a), Self::Set(b)) => {
                if Arc::ptr_eq(a, b) {
                    Ordering::Equal
                } else {
                    a.cmp(b)
                }
            }
            (Self::Compr(a), Self::Compr(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl Hash for Term {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Self::Null => {}
            Self::Bool(b) => b.hash(state),
            Self::Number(n) => n.hash(state),
            Self::String(s) => s.hash(state),
            Self::Var(v) => v.hash(state),
            Self::Ref(r) => r.hash(state),
            Self::Array(items) => items.hash(state),
            Self::Object(map) => map.hash(state),
            Self::Set(items) => items.hash(state),
            Self::Compr(c) => c.hash(state),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{:?}", s.as_ref()),
            Self::Var(v) => write!(f, "{v}"),
            Self::Ref(r) => write!(f, "{r}"),
            Self::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Object(map) => {
                f.write_str("{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
            Self::Set(items) => {
                if items.is_empty() {
                    return f.write_str("set()");
                }
                f.write_str("{")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("}")
            }
            Self::Compr(c) => write!(f, "{c}"),
        }
    }
}

impl Default for Term {
    fn default() -> Self {
        Self::Null
    }
}

impl Serialize for Term {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.to_json() {
            Some(value) => value.serialize(serializer),
            None => Err(serde::ser::Error::custom(format!(
                "cannot serialize non-ground term {self}"
            ))),
        }
    }
}

impl<'de> Deserialize<'de> for Term {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(Self::from_json(&value))
    }
}

impl From<bool> for Term {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Term {
    fn from(v: i32) -> Self {
        Self::number(v)
    }
}

impl From<i64> for Term {
    fn from(v: i64) -> Self {
        Self::number(v)
    }
}

impl From<f64> for Term {
    fn from(v: f64) -> Self {
        Self::number(v)
    }
}

impl From<&str> for Term {
    fn from(v: &str) -> Self {
        Self::string(v)
    }
}

impl From<String> for Term {
    fn from(v: String) -> Self {
        Self::string(v)
    }
}

impl From<Var> for Term {
    fn from(v: Var) -> Self {
        Self::Var(v)
    }
}

impl From<Ref> for Term {
    fn from(r: Ref) -> Self {
        Self::Ref(r)
    }
}

impl From<serde_json::Value> for Term {
    fn from(v: serde_json::Value) -> Self {
        Self::from_json(&v)
    }
}
