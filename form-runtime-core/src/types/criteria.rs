//! Query criteria and paging request types

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single predicate on one item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "camelCase")]
pub enum Criterion {
    /// Exact match
    Equals(Value),
    /// SQL-style pattern, `%` matches any run of characters
    Like(String),
}

impl Criterion {
    /// Evaluate the predicate against a value.
    ///
    /// Used by in-memory services; persistence-backed services translate criteria instead.
    pub fn matches(&self, value: Option<&Value>) -> bool {
        match self {
            Self::Equals(expected) => value.unwrap_or(&Value::Null) == expected,
            Self::Like(pattern) => match value {
                Some(Value::String(s)) => like_match(pattern, s),
                Some(Value::Null) | None => false,
                Some(other) => like_match(pattern, &other.to_string()),
            },
        }
    }
}

/// Case-insensitive `%` wildcard matching
fn like_match(pattern: &str, text: &str) -> bool {
    let pattern = pattern.to_lowercase();
    let text = text.to_lowercase();
    let parts: Vec<&str> = pattern.split('%').collect();
    if parts.len() == 1 {
        return pattern == text;
    }

    let mut rest = text.as_str();
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if i == 0 {
            match rest.strip_prefix(part) {
                Some(r) => rest = r,
                None => return false,
            }
        } else if i == parts.len() - 1 {
            return rest.ends_with(part);
        } else {
            match rest.find(part) {
                Some(pos) => rest = &rest[pos + part.len()..],
                None => return false,
            }
        }
    }
    true
}

/// Ordered item -> criterion map for one block query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryCriteria {
    terms: IndexMap<String, Criterion>,
}

impl QueryCriteria {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_equals(mut self, item: impl Into<String>, value: Value) -> Self {
        self.set(item, Criterion::Equals(value));
        self
    }

    #[must_use]
    pub fn with_like(mut self, item: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.set(item, Criterion::Like(pattern.into()));
        self
    }

    /// Replace the criterion for an item
    pub fn set(&mut self, item: impl Into<String>, criterion: Criterion) {
        self.terms.insert(item.into(), criterion);
    }

    pub fn remove(&mut self, item: &str) -> Option<Criterion> {
        self.terms.shift_remove(item)
    }

    pub fn get(&self, item: &str) -> Option<&Criterion> {
        self.terms.get(item)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Criterion)> {
        self.terms.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Whether every criterion matches the given row
    pub fn matches(&self, row: &super::FieldValues) -> bool {
        self.terms
            .iter()
            .all(|(item, criterion)| criterion.matches(row.get(item)))
    }

    /// Stable key identifying these criteria, used by the post-query lookup cache.
    ///
    /// Term order does not matter: `a=1,b=2` and `b=2,a=1` share a key.
    pub fn cache_key(&self) -> String {
        let mut terms: Vec<(&String, &Criterion)> = self.terms.iter().collect();
        terms.sort_by(|a, b| a.0.cmp(b.0));
        serde_json::to_string(&terms).unwrap_or_default()
    }
}

/// One page of a paged query (page numbers are 1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    pub number: u32,
    pub size: u32,
}

impl PageRequest {
    /// Index of the first row of this page
    pub fn offset(&self) -> usize {
        self.number.saturating_sub(1) as usize * self.size as usize
    }
}

/// Everything a block service needs to run a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub criteria: QueryCriteria,
    /// `None` means all-rows mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<PageRequest>,
    /// Row cap for all-rows mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_results: Option<usize>,
}

impl QueryRequest {
    #[must_use]
    pub fn all_rows(criteria: QueryCriteria, max_results: Option<usize>) -> Self {
        Self {
            criteria,
            page: None,
            max_results,
        }
    }

    #[must_use]
    pub fn paged(criteria: QueryCriteria, page: PageRequest) -> Self {
        Self {
            criteria,
            page: Some(page),
            max_results: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn like_patterns() {
        assert!(like_match("ab%", "abc"));
        assert!(like_match("%bc", "abc"));
        assert!(like_match("%b%", "abc"));
        assert!(like_match("A%C", "abc"));
        assert!(!like_match("b%", "abc"));
        assert!(!like_match("abc", "abcd"));
        assert!(like_match("%", "anything"));
    }

    #[test]
    fn equals_treats_missing_as_null() {
        assert!(Criterion::Equals(Value::Null).matches(None));
        assert!(!Criterion::Equals(json!(1)).matches(None));
        assert!(Criterion::Equals(json!(1)).matches(Some(&json!(1))));
    }

    #[test]
    fn like_on_numbers_uses_their_text() {
        assert!(Criterion::Like("12%".into()).matches(Some(&json!(123))));
    }

    #[test]
    fn cache_key_ignores_term_order() {
        let a = QueryCriteria::new()
            .with_equals("a", json!(1))
            .with_equals("b", json!(2));
        let b = QueryCriteria::new()
            .with_equals("b", json!(2))
            .with_equals("a", json!(1));
        assert_eq!(a.cache_key(), b.cache_key());
        assert_ne!(a.cache_key(), QueryCriteria::new().cache_key());
    }

    #[test]
    fn page_offset() {
        assert_eq!(PageRequest { number: 1, size: 10 }.offset(), 0);
        assert_eq!(PageRequest { number: 3, size: 10 }.offset(), 20);
    }
}
