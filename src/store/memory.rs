//! In-memory store backend.
//!
//! Thread-safe document tree intended for embedded usage, tests and as a
//! reference implementation of [`Store`].

use std::sync::RwLock;

use uuid::Uuid;

use crate::store::traits::{Store, StoreError, Transaction};
use crate::term::Term;

fn lock_err(context: &'static str) -> StoreError {
    StoreError::Backend(format!("poisoned lock: {context}"))
}

fn render(path: &[String]) -> String {
    path.join("/")
}

fn segment_term(node: &Term, segment: &str) -> Option<Term> {
    match node {
        Term::Object(_) => Some(Term::string(segment)),
        Term::Array(_) => segment.parse::<usize>().ok().map(|i| Term::number(i)),
        _ => None,
    }
}

/// `RwLock`-protected document tree rooted at an object.
#[derive(Debug)]
pub struct InMemoryStore {
    id: Uuid,
    root: RwLock<Term>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            root: RwLock::new(Term::object(Vec::new())),
        }
    }

    /// Creates a store holding `document` as its root.
    ///
    /// # Errors
    /// Returns `InvalidPath` if `document` is not a JSON object.
    pub fn from_json(document: &serde_json::Value) -> Result<Self, StoreError> {
        let store = Self::new();
        store.write::<&str>(&[], Term::from_json(document))?;
        Ok(store)
    }

    /// Identity checked against incoming transactions.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Stores `value` at `path`, creating intermediate objects.
    ///
    /// # Errors
    /// Returns `InvalidPath` when the root would not be an object, when an
    /// array index is not a valid position, or when a scalar lies on the path.
    pub fn write<S: AsRef<str>>(&self, path: &[S], value: Term) -> Result<(), StoreError> {
        let path: Vec<String> = path.iter().map(|s| s.as_ref().to_string()).collect();
        if path.is_empty() && value.as_object().is_none() {
            return Err(StoreError::InvalidPath {
                path: String::new(),
                reason: "root document must be an object".to_string(),
            });
        }
        let mut root = self.root.write().map_err(|_| lock_err("store.write"))?;
        let updated = write_at(&root, &path, &path, value)?;
        *root = updated;
        Ok(())
    }

    /// Removes the document at `path`. Returns false if nothing was there.
    ///
    /// # Errors
    /// Returns `InvalidPath` for the root path.
    pub fn remove<S: AsRef<str>>(&self, path: &[S]) -> Result<bool, StoreError> {
        let path: Vec<String> = path.iter().map(|s| s.as_ref().to_string()).collect();
        let Some((last, parent_path)) = path.split_last() else {
            return Err(StoreError::InvalidPath {
                path: String::new(),
                reason: "cannot remove the root document".to_string(),
            });
        };
        let mut root = self.root.write().map_err(|_| lock_err("store.remove"))?;
        let Some(parent) = lookup(&root, parent_path) else {
            return Ok(false);
        };
        let updated_parent = match &parent {
            Term::Object(map) => {
                let key = Term::string(last);
                if !map.contains_key(&key) {
                    return Ok(false);
                }
                let mut map = (**map).clone();
                map.remove(&key);
                Term::object(map)
            }
            Term::Array(items) => match last.parse::<usize>() {
                Ok(i) if i < items.len() => {
                    let mut items = (**items).clone();
                    items.remove(i);
                    Term::array(items)
                }
                _ => return Ok(false),
            },
            _ => return Ok(false),
        };
        let updated = write_at(&root, parent_path, parent_path, updated_parent)?;
        *root = updated;
        Ok(true)
    }
}

fn lookup(root: &Term, path: &[String]) -> Option<Term> {
    let mut current = root.clone();
    for segment in path {
        let key = segment_term(&current, segment)?;
        current = current.get(&key)?;
    }
    Some(current)
}

fn write_at(node: &Term, path: &[String], full: &[String], value: Term) -> Result<Term, StoreError> {
    let Some((segment, rest)) = path.split_first() else {
        return Ok(value);
    };
    match node {
        Term::Object(map) => {
            let key = Term::string(segment);
            let child = map.get(&key).cloned().unwrap_or_else(|| Term::object(Vec::new()));
            let child = write_at(&child, rest, full, value)?;
            let mut map = (**map).clone();
            map.insert(key, child);
            Ok(Term::object(map))
        }
        Term::Array(items) => {
            let index = segment
                .parse::<usize>()
                .ok()
                .filter(|i| *i < items.len())
                .ok_or_else(|| StoreError::InvalidPath {
                    path: render(full),
                    reason: format!("array index {segment} out of range"),
                })?;
            let child = write_at(&items[index], rest, full, value)?;
            let mut items = (**items).clone();
            items[index] = child;
            Ok(Term::array(items))
        }
        other => Err(StoreError::InvalidPath {
            path: render(full),
            reason: format!("cannot descend into {}", other.type_name()),
        }),
    }
}

impl Store for InMemoryStore {
    fn begin_read(&self) -> Result<Transaction, StoreError> {
        Ok(Transaction::new(self.id))
    }

    fn read(&self, txn: &Transaction, path: &[String]) -> Result<Option<Term>, StoreError> {
        if txn.store_id() != self.id {
            return Err(StoreError::InvalidTransaction(txn.id()));
        }
        let root = self.root.read().map_err(|_| lock_err("store.read"))?;
        Ok(lookup(&root, path))
    }
}
