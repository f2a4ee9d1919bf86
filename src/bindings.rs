//! Binding environment.
//!
//! Variables are keyed by `(name, scope)`. Each rule body, function call and
//! closure (comprehension, `every`) evaluates in its own scope, so the same
//! variable name may be bound independently at several levels. Closure
//! scopes have a parent: lookups fall back to it, which is how a
//! comprehension sees the variables of its enclosing query.
//!
//! All writes go through a trail. The evaluator takes a [`Bindings::mark`]
//! before trying an alternative and calls [`Bindings::undo`] afterwards,
//! which restores the environment exactly.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::error::{EvalError, EvalResult};
use crate::term::{Ref, Term, Var};

/// Scopes with at most this many entries use a linear-scan map.
pub const LINEAR_SCAN_LIMIT: usize = 16;

/// Identifier of a binding scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScopeId(u32);

impl ScopeId {
    /// Scope of the top-level query.
    pub const ROOT: Self = Self(0);

    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A value together with the scope its variables belong to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    /// Bound term.
    pub value: Term,
    /// Scope the variables inside `value` belong to.
    pub scope: ScopeId,
}

/// Per-scope variable map.
///
/// Small scopes are scanned linearly; once a scope grows past
/// [`LINEAR_SCAN_LIMIT`] it is rehashed. Both representations answer every
/// operation identically.
#[derive(Debug, Clone)]
pub enum BindingMap {
    /// Unsorted entries scanned front to back.
    Linear(Vec<(Var, Binding)>),
    /// Hash map keyed by variable.
    Hashed(HashMap<Var, Binding>),
}

impl Default for BindingMap {
    fn default() -> Self {
        Self::Linear(Vec::new())
    }
}

impl BindingMap {
    /// Empty map in the linear representation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts in the hashed representation regardless of size.
    #[must_use]
    pub fn hashed() -> Self {
        Self::Hashed(HashMap::new())
    }

    /// Binding of `var`, if any.
    #[must_use]
    pub fn get(&self, var: &Var) -> Option<&Binding> {
        match self {
            Self::Linear(entries) => entries.iter().find(|(v, _)| v == var).map(|(_, b)| b),
            Self::Hashed(map) => map.get(var),
        }
    }

    /// Inserts or replaces the binding for `var`, returning the previous one.
    pub fn put(&mut self, var: Var, binding: Binding) -> Option<Binding> {
        match self {
            Self::Linear(entries) => {
                if let Some((_, existing)) = entries.iter_mut().find(|(v, _)| *v == var) {
                    return Some(std::mem::replace(existing, binding));
                }
                entries.push((var, binding));
                if entries.len() > LINEAR_SCAN_LIMIT {
                    let map = entries.drain(..).collect();
                    *self = Self::Hashed(map);
                }
                None
            }
            Self::Hashed(map) => map.insert(var, binding),
        }
    }

    /// Removes and returns the binding of `var`.
    pub fn delete(&mut self, var: &Var) -> Option<Binding> {
        match self {
            Self::Linear(entries) => {
                let pos = entries.iter().position(|(v, _)| v == var)?;
                Some(entries.swap_remove(pos).1)
            }
            Self::Hashed(map) => map.remove(var),
        }
    }

    /// Entries sorted by variable name.
    #[must_use]
    pub fn iter(&self) -> Vec<(&Var, &Binding)> {
        let mut out: Vec<(&Var, &Binding)> = match self {
            Self::Linear(entries) => entries.iter().map(|(v, b)| (v, b)).collect(),
            Self::Hashed(map) => map.iter().collect(),
        };
        out.sort_by(|a, b| a.0.cmp(b.0));
        out
    }

    /// Number of bound variables.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Linear(entries) => entries.len(),
            Self::Hashed(map) => map.len(),
        }
    }

    /// True when nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True once the map has switched to hashing.
    #[must_use]
    pub const fn is_hashed(&self) -> bool {
        matches!(self, Self::Hashed(_))
    }
}

#[derive(Debug, Default)]
struct Scope {
    parent: Option<ScopeId>,
    values: BindingMap,
}

/// Scoped substitution with an undo trail.
#[derive(Debug)]
pub struct Bindings {
    scopes: Vec<Scope>,
    trail: Vec<(ScopeId, Var, Option<Binding>)>,
}

impl Default for Bindings {
    fn default() -> Self {
        Self {
            scopes: vec![Scope::default()],
            trail: Vec::new(),
        }
    }
}

impl Bindings {
    /// Creates an environment holding only the empty root scope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a scope. Closures pass their enclosing scope as `parent`;
    /// rule and function bodies pass `None`.
    pub fn push_scope(&mut self, parent: Option<ScopeId>) -> ScopeId {
        #[allow(clippy::cast_possible_truncation)]
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope {
            parent,
            values: BindingMap::new(),
        });
        id
    }

    /// Closes the innermost scope.
    ///
    /// # Errors
    /// Returns an internal error if `id` is not the innermost scope or is the root.
    pub fn pop_scope(&mut self, id: ScopeId) -> EvalResult<()> {
        if id == ScopeId::ROOT || id.index() + 1 != self.scopes.len() {
            return Err(EvalError::internal(format!(
                "scope {id} popped out of order ({} scopes open)",
                self.scopes.len()
            )));
        }
        self.scopes.pop();
        Ok(())
    }

    /// Looks `var` up in `scope` and its ancestors.
    #[must_use]
    pub fn get(&self, var: &Var, scope: ScopeId) -> Option<&Binding> {
        if var.is_wildcard() {
            return None;
        }
        let mut current = Some(scope);
        while let Some(id) = current {
            let s = self.scopes.get(id.index())?;
            if let Some(binding) = s.values.get(var) {
                return Some(binding);
            }
            current = s.parent;
        }
        None
    }

    /// Binds `var`, which must be unbound as seen from `scope`, in `scope`.
    /// Binding the wildcard is a no-op.
    pub fn put(&mut self, var: &Var, scope: ScopeId, value: Term, value_scope: ScopeId) {
        if var.is_wildcard() {
            return;
        }
        let Some(s) = self.scopes.get_mut(scope.index()) else {
            return;
        };
        let previous = s.values.put(
            var.clone(),
            Binding {
                value,
                scope: value_scope,
            },
        );
        self.trail.push((scope, var.clone(), previous));
    }

    /// Removes the binding of `var` owned by `scope` itself.
    pub fn delete(&mut self, var: &Var, scope: ScopeId) -> Option<Binding> {
        let s = self.scopes.get_mut(scope.index())?;
        let previous = s.values.delete(var)?;
        self.trail.push((scope, var.clone(), Some(previous.clone())));
        Some(previous)
    }

    /// Current trail position.
    #[must_use]
    pub fn mark(&self) -> usize {
        self.trail.len()
    }

    /// Reverts every write made since `mark`.
    pub fn undo(&mut self, mark: usize) {
        while self.trail.len() > mark {
            let Some((scope, var, previous)) = self.trail.pop() else {
                break;
            };
            let Some(s) = self.scopes.get_mut(scope.index()) else {
                continue;
            };
            match previous {
                Some(binding) => {
                    s.values.put(var, binding);
                }
                None => {
                    s.values.delete(&var);
                }
            }
        }
    }

    /// Follows variable-to-variable bindings until reaching a non-variable
    /// term or an unbound variable. A chain that loops back on itself stops
    /// at the last variable before the loop closes.
    #[must_use]
    pub fn resolve(&self, term: &Term, scope: ScopeId) -> (Term, ScopeId) {
        match term {
            Term::Var(var) => match self.chase(var, scope) {
                Some((value, value_scope, _)) => (value, value_scope),
                None => (term.clone(), scope),
            },
            _ => (term.clone(), scope),
        }
    }

    /// Walks the alias chain starting at `var`. Returns `None` when `var` is
    /// unbound, otherwise the final value, its scope and the last bound
    /// variable of the chain.
    fn chase(&self, var: &Var, scope: ScopeId) -> Option<(Term, ScopeId, (Var, ScopeId))> {
        let mut binding = self.get(var, scope)?;
        let mut owner = (var.clone(), scope);
        let mut seen: HashSet<(Var, ScopeId)> = HashSet::new();
        while let Term::Var(next) = &binding.value {
            let next_key = (next.clone(), binding.scope);
            seen.insert(owner.clone());
            if seen.contains(&next_key) {
                break;
            }
            let Some(next_binding) = self.get(next, binding.scope) else {
                break;
            };
            owner = next_key;
            binding = next_binding;
        }
        Some((binding.value.clone(), binding.scope, owner))
    }

    /// Substitutes every bound variable in `term` with its resolved value.
    ///
    /// Unbound variables are left in place and comprehension bodies are not
    /// entered. Terms without variables are returned without rebuilding.
    #[must_use]
    pub fn plug(&self, term: &Term, scope: ScopeId) -> Term {
        let mut active = Vec::new();
        self.plug_inner(term, scope, &mut active)
            .unwrap_or_else(|| term.clone())
    }

    /// Returns `None` when `term` is unchanged by plugging.
    fn plug_inner(
        &self,
        term: &Term,
        scope: ScopeId,
        active: &mut Vec<(Var, ScopeId)>,
    ) -> Option<Term> {
        match term {
            Term::Var(var) => {
                let (value, value_scope, owner) = self.chase(var, scope)?;
                if let Term::Var(_) = value {
                    return Some(value);
                }
                // Only composite values can reach back to their own variable.
                if active.contains(&owner) {
                    return None;
                }
                active.push(owner);
                let plugged = self
                    .plug_inner(&value, value_scope, active)
                    .unwrap_or(value);
                active.pop();
                Some(plugged)
            }
            Term::Ref(r) => {
                let terms = self.plug_slice(r.terms(), scope, active)?;
                Some(Term::Ref(Ref::new(terms)))
            }
            Term::Array(items) => {
                let items = self.plug_slice(items, scope, active)?;
                Some(Term::Array(Arc::new(items)))
            }
            Term::Set(items) => {
                let mut changed = false;
                let plugged: Vec<Term> = items
                    .iter()
                    .map(|t| match self.plug_inner(t, scope, active) {
                        Some(p) => {
                            changed = true;
                            p
                        }
                        None => t.clone(),
                    })
                    .collect();
                changed.then(|| Term::set(plugged))
            }
            Term::Object(map) => {
                let mut changed = false;
                let plugged: Vec<(Term, Term)> = map
                    .iter()
                    .map(|(k, v)| {
                        let k2 = self.plug_inner(k, scope, active);
                        let v2 = self.plug_inner(v, scope, active);
                        changed |= k2.is_some() || v2.is_some();
                        (
                            k2.unwrap_or_else(|| k.clone()),
                            v2.unwrap_or_else(|| v.clone()),
                        )
                    })
                    .collect();
                changed.then(|| Term::object(plugged))
            }
            _ => None,
        }
    }

    fn plug_slice(
        &self,
        items: &[Term],
        scope: ScopeId,
        active: &mut Vec<(Var, ScopeId)>,
    ) -> Option<Vec<Term>> {
        let first = items
            .iter()
            .enumerate()
            .find_map(|(i, t)| self.plug_inner(t, scope, active).map(|p| (i, p)))?;
        let mut out = Vec::with_capacity(items.len());
        out.extend(items[..first.0].iter().cloned());
        out.push(first.1);
        for t in &items[first.0 + 1..] {
            out.push(
                self.plug_inner(t, scope, active)
                    .unwrap_or_else(|| t.clone()),
            );
        }
        Some(out)
    }

    /// Number of live bindings across all scopes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scopes.iter().map(|s| s.values.len()).sum()
    }

    /// True when no scope holds a binding.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bindings owned by `scope` itself, sorted by variable.
    #[must_use]
    pub fn scope_entries(&self, scope: ScopeId) -> Vec<(&Var, &Binding)> {
        self.scopes
            .get(scope.index())
            .map(|s| s.values.iter())
            .unwrap_or_default()
    }
}

impl fmt::Display for Bindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        let mut first = true;
        for (i, scope) in self.scopes.iter().enumerate() {
            for (var, binding) in scope.values.iter() {
                if !first {
                    f.write_str(", ")?;
                }
                first = false;
                write!(f, "{var}@{i}: {}", binding.value)?;
                if let Term::Var(_) = binding.value {
                    write!(f, "@{}", binding.scope)?;
                }
            }
        }
        f.write_str("}")
    }
}
