use std::collections::{BTreeMap, HashMap};

use crate::term::Term;

type Frame = HashMap<Term, BTreeMap<Vec<Term>, Term>>;

/// Results of comprehension evaluations, keyed by the comprehension and the
/// values of its variables bound outside it.
///
/// Frames follow the virtual cache: a `with` scope pushes one so that results
/// computed under overrides do not leak out.
#[derive(Debug)]
pub struct ComprehensionCache {
    frames: Vec<Frame>,
}

impl Default for ComprehensionCache {
    fn default() -> Self {
        Self {
            frames: vec![Frame::new()],
        }
    }
}

impl ComprehensionCache {
    /// Cache holding only the root frame.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a fresh frame.
    pub fn push(&mut self) {
        self.frames.push(Frame::new());
    }

    /// Drops the top frame. The root frame is never dropped.
    pub fn pop(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    /// Cached result of `comprehension` for the outer values `key`.
    #[must_use]
    pub fn get(&self, comprehension: &Term, key: &[Term]) -> Option<&Term> {
        self.frames.last()?.get(comprehension)?.get(key)
    }

    /// Records a result in the top frame.
    pub fn put(&mut self, comprehension: &Term, key: Vec<Term>, value: Term) {
        if let Some(frame) = self.frames.last_mut() {
            frame
                .entry(comprehension.clone())
                .or_default()
                .insert(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Expr;

    #[test]
    fn test_results_are_keyed_by_outer_values() {
        let compr = Term::array_compr(Term::var("x"), vec![Expr::unify(Term::var("x"), Term::var("y"))]);
        let mut cache = ComprehensionCache::new();
        cache.put(&compr, vec![Term::number(1)], Term::array(vec![Term::number(1)]));

        assert_eq!(
            cache.get(&compr, &[Term::number(1)]),
            Some(&Term::array(vec![Term::number(1)]))
        );
        assert_eq!(cache.get(&compr, &[Term::number(2)]), None);

        cache.push();
        assert_eq!(cache.get(&compr, &[Term::number(1)]), None);
        cache.pop();
        assert!(cache.get(&compr, &[Term::number(1)]).is_some());
    }
}
