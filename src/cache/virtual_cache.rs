use std::collections::BTreeMap;

use crate::error::{EvalError, EvalResult};
use crate::term::{Ref, Term};

/// Outcome recorded for an evaluated virtual document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedValue {
    /// Evaluated to this value.
    Defined(Term),
    /// Evaluated, and no rule body produced a value.
    Undefined,
}

impl CachedValue {
    /// Returns the defined value, if any.
    #[must_use]
    pub fn value(&self) -> Option<&Term> {
        match self {
            Self::Defined(t) => Some(t),
            Self::Undefined => None,
        }
    }
}

#[derive(Debug, Default)]
struct Node {
    value: Option<CachedValue>,
    children: BTreeMap<Term, Node>,
}

/// Stack of independent memoization frames.
///
/// Lookups only consult the top frame: a pushed frame starts empty and sees
/// nothing cached below it.
#[derive(Debug)]
pub struct VirtualCache {
    frames: Vec<Node>,
}

impl Default for VirtualCache {
    fn default() -> Self {
        Self {
            frames: vec![Node::default()],
        }
    }
}

impl VirtualCache {
    /// Cache holding only the root frame.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a fresh frame.
    pub fn push(&mut self) {
        self.frames.push(Node::default());
    }

    /// Discards the top frame and everything cached in it.
    ///
    /// # Errors
    /// Returns an internal error when only the root frame is left.
    pub fn pop(&mut self) -> EvalResult<()> {
        if self.frames.len() <= 1 {
            return Err(EvalError::internal("virtual cache pop without matching push"));
        }
        self.frames.pop();
        Ok(())
    }

    /// Number of open frames, root included.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    fn top(&self) -> Option<&Node> {
        self.frames.last()
    }

    /// Returns `None` when `reference` was never recorded in the top frame,
    /// otherwise the recorded outcome.
    #[must_use]
    pub fn get(&self, reference: &Ref) -> Option<CachedValue> {
        let mut node = self.top()?;
        for term in reference.terms() {
            node = node.children.get(term)?;
        }
        node.value.clone()
    }

    /// Records `value` for `reference`; `None` records it as undefined.
    pub fn put(&mut self, reference: &Ref, value: Option<Term>) {
        let Some(mut node) = self.frames.last_mut() else {
            return;
        };
        for term in reference.terms() {
            node = node.children.entry(term.clone()).or_default();
        }
        node.value = Some(value.map_or(CachedValue::Undefined, CachedValue::Defined));
    }

    /// References holding a defined value in the top frame, depth first.
    #[must_use]
    pub fn keys(&self) -> Vec<Ref> {
        let mut out = Vec::new();
        if let Some(top) = self.top() {
            let mut path = Vec::new();
            collect_keys(top, &mut path, &mut out);
        }
        out
    }
}

fn collect_keys(node: &Node, path: &mut Vec<Term>, out: &mut Vec<Ref>) {
    if let Some(CachedValue::Defined(_)) = node.value {
        out.push(Ref::new(path.clone()));
    }
    for (term, child) in &node.children {
        path.push(term.clone());
        collect_keys(child, path, out);
        path.pop();
    }
}
