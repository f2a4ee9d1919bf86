//! Union-find over terms, used for copy propagation.
//!
//! Each equivalence class has a representative key and at most one constant.
//! The evaluator feeds it the top-level `x = y` and `x = <ground>` equalities
//! of a query so that aliased variables collapse to one class and result rows
//! can be reported in simplified, duplicate-free form.

use std::collections::BTreeMap;
use std::fmt;

use crate::term::Term;

/// Representative of an equivalence class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnionFindRoot {
    /// Representative term.
    pub key: Term,
    /// Constant carried by the class.
    pub constant: Option<Term>,
}

impl UnionFindRoot {
    fn new(key: Term) -> Self {
        Self {
            key,
            constant: None,
        }
    }
}

/// Two classes carried different constants.
///
/// The structural merge has already happened when this is returned: the
/// classes are joined under `root`, which keeps the winner's constant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeConflict {
    /// Root after the merge.
    pub root: UnionFindRoot,
    /// Constant kept by the root.
    pub left: Term,
    /// Constant of the absorbed class.
    pub right: Term,
}

/// Decides whether `a` becomes the parent of `b` on a merge.
pub type RankFn = fn(&UnionFindRoot, &UnionFindRoot) -> bool;

fn default_rank(a: &UnionFindRoot, b: &UnionFindRoot) -> bool {
    a.key <= b.key
}

/// Deterministic union-find keyed by terms.
#[derive(Debug, Clone)]
pub struct UnionFind {
    roots: BTreeMap<Term, UnionFindRoot>,
    parents: BTreeMap<Term, Term>,
    rank: RankFn,
}

impl Default for UnionFind {
    fn default() -> Self {
        Self::new()
    }
}

impl UnionFind {
    /// Creates a structure whose merges keep the smaller key as representative.
    #[must_use]
    pub fn new() -> Self {
        Self::with_rank(default_rank)
    }

    /// Structure using `rank` to choose representatives.
    #[must_use]
    pub fn with_rank(rank: RankFn) -> Self {
        Self {
            roots: BTreeMap::new(),
            parents: BTreeMap::new(),
            rank,
        }
    }

    /// Returns the root of `value`'s class, creating a singleton class if needed.
    pub fn make_set(&mut self, value: &Term) -> UnionFindRoot {
        if let Some(root) = self.find(value) {
            return root;
        }
        let root = UnionFindRoot::new(value.clone());
        self.parents.insert(value.clone(), value.clone());
        self.roots.insert(value.clone(), root.clone());
        root
    }

    /// Follows parent pointers to the representative. Never mutates.
    #[must_use]
    pub fn find(&self, value: &Term) -> Option<UnionFindRoot> {
        let mut current = value;
        for _ in 0..=self.parents.len() {
            let parent = self.parents.get(current)?;
            if parent == current {
                return self.roots.get(current).cloned();
            }
            current = parent;
        }
        None
    }

    /// Joins the classes of `a` and `b`.
    ///
    /// # Errors
    /// Returns [`MergeConflict`] when both classes already carry different
    /// constants. The classes are merged regardless.
    pub fn merge(&mut self, a: &Term, b: &Term) -> Result<UnionFindRoot, MergeConflict> {
        let r1 = self.make_set(a);
        let r2 = self.make_set(b);
        if r1.key == r2.key {
            return Ok(r1);
        }

        let (mut winner, loser) = if (self.rank)(&r1, &r2) {
            (r1, r2)
        } else {
            (r2, r1)
        };
        self.parents.insert(loser.key.clone(), winner.key.clone());
        self.roots.remove(&loser.key);

        let conflict = match (&winner.constant, &loser.constant) {
            (Some(w), Some(l)) if w != l => Some((w.clone(), l.clone())),
            (None, Some(l)) => {
                winner.constant = Some(l.clone());
                None
            }
            _ => None,
        };
        self.roots.insert(winner.key.clone(), winner.clone());

        match conflict {
            Some((left, right)) => Err(MergeConflict {
                root: winner,
                left,
                right,
            }),
            None => Ok(winner),
        }
    }

    /// Associates `constant` with `value`'s class.
    ///
    /// # Errors
    /// Returns [`MergeConflict`] if the class already has a different constant.
    pub fn bind_constant(&mut self, value: &Term, constant: Term) -> Result<UnionFindRoot, MergeConflict> {
        let mut root = self.make_set(value);
        match root.constant.clone() {
            Some(existing) if existing != constant => Err(MergeConflict {
                left: existing,
                right: constant,
                root,
            }),
            Some(_) => Ok(root),
            None => {
                root.constant = Some(constant);
                self.roots.insert(root.key.clone(), root.clone());
                Ok(root)
            }
        }
    }

    /// Every term inserted so far, in term order.
    pub fn members(&self) -> impl Iterator<Item = &Term> {
        self.parents.keys()
    }

    /// Number of equivalence classes.
    #[must_use]
    pub fn class_count(&self) -> usize {
        self.roots.len()
    }
}

impl fmt::Display for UnionFind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("roots: [")?;
        for (i, root) in self.roots.values().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match &root.constant {
                Some(c) => write!(f, "{}: {c}", root.key)?,
                None => write!(f, "{}: <none>", root.key)?,
            }
        }
        f.write_str("], parents: [")?;
        for (i, (child, parent)) in self.parents.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{child} -> {parent}")?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(name: &str) -> Term {
        Term::var(name)
    }

    #[test]
    fn test_make_set_is_idempotent() {
        let mut uf = UnionFind::new();
        let first = uf.make_set(&v("x"));
        uf.bind_constant(&v("x"), Term::number(1)).unwrap();
        let second = uf.make_set(&v("x"));
        assert_eq!(first.key, second.key);
        assert_eq!(second.constant, Some(Term::number(1)));
        assert_eq!(uf.class_count(), 1);
    }

    #[test]
    fn test_find_without_insert_has_no_side_effects() {
        let uf = UnionFind::new();
        assert!(uf.find(&v("nope")).is_none());
        assert_eq!(uf.members().count(), 0);
    }

    #[test]
    fn test_merge_propagates_single_constant() {
        let mut uf = UnionFind::new();
        uf.bind_constant(&v("b"), Term::string("k")).unwrap();
        let root = uf.merge(&v("a"), &v("b")).unwrap();
        assert_eq!(root.key, v("a"));
        assert_eq!(root.constant, Some(Term::string("k")));
        assert_eq!(uf.find(&v("b")).map(|r| r.key), Some(v("a")));
    }

    #[test]
    fn test_merge_with_matching_constants_succeeds() {
        let mut uf = UnionFind::new();
        uf.bind_constant(&v("a"), Term::number(1)).unwrap();
        uf.bind_constant(&v("b"), Term::number(1)).unwrap();
        let root = uf.merge(&v("a"), &v("b")).unwrap();
        assert_eq!(root.constant, Some(Term::number(1)));
    }

    #[test]
    fn test_conflicting_merge_still_joins_classes() {
        let mut uf = UnionFind::new();
        uf.bind_constant(&v("a"), Term::number(1)).unwrap();
        uf.bind_constant(&v("b"), Term::number(2)).unwrap();

        let conflict = uf.merge(&v("a"), &v("b")).unwrap_err();
        assert_eq!(conflict.left, Term::number(1));
        assert_eq!(conflict.right, Term::number(2));

        assert_eq!(uf.class_count(), 1);
        let root_b = uf.find(&v("b")).unwrap();
        assert_eq!(root_b.key, v("a"));
        assert_eq!(root_b.constant, Some(Term::number(1)));
    }

    #[test]
    fn test_merge_through_chains() {
        let mut uf = UnionFind::new();
        uf.merge(&v("c"), &v("d")).unwrap();
        uf.merge(&v("b"), &v("c")).unwrap();
        uf.merge(&v("a"), &v("d")).unwrap();
        for name in ["a", "b", "c", "d"] {
            assert_eq!(uf.find(&v(name)).map(|r| r.key), Some(v("a")));
        }
    }

    #[test]
    fn test_custom_rank_is_respected() {
        fn larger_wins(a: &UnionFindRoot, b: &UnionFindRoot) -> bool {
            a.key >= b.key
        }
        let mut uf = UnionFind::with_rank(larger_wins);
        let root = uf.merge(&v("a"), &v("z")).unwrap();
        assert_eq!(root.key, v("z"));
    }

    #[test]
    fn test_display_is_sorted() {
        let mut uf = UnionFind::new();
        uf.merge(&v("y"), &v("x")).unwrap();
        uf.bind_constant(&v("y"), Term::number(5)).unwrap();
        assert_eq!(uf.to_string(), "roots: [x: 5], parents: [x -> x, y -> x]");
    }
}
