use std::collections::BTreeMap;

use crate::term::Term;

type Overrides = BTreeMap<String, Term>;

/// Stack of `with` function overrides.
///
/// Each frame is an ordered list of override maps. Nested `with` clauses in
/// the same frame append a map and remove it on exit; calling a replacement
/// function pushes a whole new frame so overrides do not apply inside it.
#[derive(Debug)]
pub struct FunctionMocksStack {
    frames: Vec<Vec<Overrides>>,
}

impl Default for FunctionMocksStack {
    fn default() -> Self {
        Self {
            frames: vec![Vec::new()],
        }
    }
}

impl FunctionMocksStack {
    /// Stack holding one empty frame.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a frame that hides every outer override.
    pub fn push(&mut self) {
        self.frames.push(Vec::new());
    }

    /// Drops the current frame. The initial frame is never dropped.
    pub fn pop(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    /// Appends one override map built from `(target, replacement)` pairs.
    /// Targets are named by string or by reference text.
    pub fn put_pairs(&mut self, pairs: &[(Term, Term)]) {
        let overrides: Overrides = pairs
            .iter()
            .filter_map(|(target, value)| {
                let name = match target {
                    Term::String(s) => s.to_string(),
                    Term::Ref(r) => r.to_string(),
                    Term::Var(v) => v.name().to_string(),
                    _ => return None,
                };
                Some((name, value.clone()))
            })
            .collect();
        if let Some(frame) = self.frames.last_mut() {
            frame.push(overrides);
        }
    }

    /// Removes the most recently appended override map of the current frame.
    pub fn pop_pairs(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            frame.pop();
        }
    }

    /// Newest override for `name` in the current frame.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Term> {
        self.frames
            .last()?
            .iter()
            .rev()
            .find_map(|overrides| overrides.get(name))
    }

    /// Like [`FunctionMocksStack::get`], treating a missing stack as empty.
    #[must_use]
    pub fn get_in<'a>(stack: Option<&'a Self>, name: &str) -> Option<&'a Term> {
        stack.and_then(|s| s.get(name))
    }
}
