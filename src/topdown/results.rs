//! Query result rows.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::term::Term;

/// Bindings of one solution, keyed by variable name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct QueryResult {
    bindings: BTreeMap<String, Term>,
}

impl QueryResult {
    /// Row from variable bindings.
    #[must_use]
    pub fn new(bindings: BTreeMap<String, Term>) -> Self {
        Self { bindings }
    }

    /// Value bound to `var`.
    #[must_use]
    pub fn get(&self, var: &str) -> Option<&Term> {
        self.bindings.get(var)
    }

    /// Every binding of the row.
    #[must_use]
    pub fn bindings(&self) -> &BTreeMap<String, Term> {
        &self.bindings
    }

    /// True when the row binds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Distinct result rows in the order they were found.
///
/// A query that succeeded without binding any variable yields one empty row;
/// an undefined query yields no rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ResultSet {
    rows: Vec<QueryResult>,
}

impl ResultSet {
    pub(super) fn new(rows: Vec<BTreeMap<String, Term>>) -> Self {
        Self {
            rows: rows.into_iter().map(QueryResult::new).collect(),
        }
    }

    /// Rows in discovery order.
    #[must_use]
    pub fn rows(&self) -> &[QueryResult] {
        &self.rows
    }

    /// Iterates over rows.
    pub fn iter(&self) -> std::slice::Iter<'_, QueryResult> {
        self.rows.iter()
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the query was undefined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// True when at least one row exists.
    #[must_use]
    pub fn is_defined(&self) -> bool {
        !self.rows.is_empty()
    }

    /// Values bound to `var`, one per row that binds it.
    #[must_use]
    pub fn values(&self, var: &str) -> Vec<&Term> {
        self.rows.iter().filter_map(|row| row.get(var)).collect()
    }

    /// JSON rendering; sets become arrays.
    ///
    /// # Errors
    /// Fails only if a bound value is not ground, which evaluation never
    /// produces.
    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

impl IntoIterator for ResultSet {
    type Item = QueryResult;
    type IntoIter = std::vec::IntoIter<QueryResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a QueryResult;
    type IntoIter = std::slice::Iter<'a, QueryResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_rendering() {
        let mut row = BTreeMap::new();
        row.insert("x".to_string(), Term::set(vec![Term::number(2), Term::number(1)]));
        let results = ResultSet::new(vec![row, BTreeMap::new()]);
        assert_eq!(
            results.to_json().unwrap(),
            serde_json::json!([{"x": [1, 2]}, {}])
        );
        assert_eq!(results.values("x").len(), 1);
    }
}
