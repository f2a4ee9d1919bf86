use std::collections::BTreeMap;

use crate::term::{Ref, Term};

#[derive(Debug, Default)]
struct Node {
    value: Option<Term>,
    children: BTreeMap<Term, Node>,
}

/// Trie of documents read from the store.
///
/// Storing a value at a path drops everything cached beneath it, and a read
/// that reaches a stored ancestor is answered by looking inside that value.
#[derive(Debug, Default)]
pub struct BaseCache {
    root: Node,
}

impl BaseCache {
    /// Empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached document at `reference`, or `None` if nothing on
    /// the path is cached or the path does not resolve inside a cached ancestor.
    #[must_use]
    pub fn get(&self, reference: &Ref) -> Option<Term> {
        let terms = reference.terms();
        let mut node = &self.root;
        for (i, term) in terms.iter().enumerate() {
            if let Some(value) = &node.value {
                return value.find(&terms[i..]);
            }
            node = node.children.get(term)?;
        }
        node.value.clone()
    }

    /// Caches `value` at `reference`, superseding cached descendants.
    pub fn put(&mut self, reference: &Ref, value: Term) {
        let mut node = &mut self.root;
        for term in reference.terms() {
            node = node.children.entry(term.clone()).or_default();
        }
        node.value = Some(value);
        node.children.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn json(v: serde_json::Value) -> Term {
        Term::from_json(&v)
    }

    #[test]
    fn test_broader_put_supersedes_descendants() {
        let mut cache = BaseCache::new();
        let a = Ref::data(&["a"]);
        let child = Ref::data(&["a", "child"]);

        cache.put(&a, json(serde_json::json!({"child": 1})));
        cache.put(&child, Term::number(2));
        assert_eq!(cache.get(&child), Some(Term::number(1)));

        cache.put(&a, json(serde_json::json!({"child": 3})));
        assert_eq!(cache.get(&child), Some(Term::number(3)));
        assert_eq!(cache.get(&a), Some(json(serde_json::json!({"child": 3}))));
    }

    #[test]
    fn test_get_looks_inside_cached_ancestor() {
        let mut cache = BaseCache::new();
        cache.put(&Ref::data(&["servers"]), json(serde_json::json!([{"id": "s1"}, {"id": "s2"}])));

        let second = Ref::new(vec![
            Term::var("data"),
            Term::string("servers"),
            Term::number(1),
            Term::string("id"),
        ]);
        assert_eq!(cache.get(&second), Some(Term::string("s2")));

        let missing = Ref::new(vec![Term::var("data"), Term::string("servers"), Term::number(9)]);
        assert_eq!(cache.get(&missing), None);
    }

    #[test]
    fn test_narrow_entry_does_not_answer_broader_read() {
        let mut cache = BaseCache::new();
        cache.put(&Ref::data(&["a", "b"]), Term::number(1));
        assert_eq!(cache.get(&Ref::data(&["a"])), None);
        assert_eq!(cache.get(&Ref::data(&["a", "b"])), Some(Term::number(1)));
    }
}
