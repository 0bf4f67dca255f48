//! Predicate model consumed by the document-store contract.
//!
//! A [`Predicate`] carries a flat clause list (field-equality style, implicit
//! AND) plus an explicit conjunction list for range families that must not
//! overwrite each other. An empty predicate matches every document.

use std::cmp::Ordering;

use serde_json::Value;

#[derive(Clone, Debug, PartialEq)]
pub enum Condition {
    Eq(Value),
    Gte(Value),
    Lte(Value),
    In(Vec<Value>),
    /// Case-insensitive substring match against a string field.
    Contains(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Clause {
    pub field: String,
    pub condition: Condition,
}

impl Clause {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            condition: Condition::Eq(value.into()),
        }
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            condition: Condition::Gte(value.into()),
        }
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            condition: Condition::Lte(value.into()),
        }
    }

    pub fn any_of(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            field: field.into(),
            condition: Condition::In(values),
        }
    }

    pub fn contains(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            condition: Condition::Contains(pattern.into()),
        }
    }

    fn matches(&self, doc: &Value) -> bool {
        let field_value = doc.get(&self.field);
        match &self.condition {
            Condition::Eq(expected) => field_value == Some(expected),
            Condition::Gte(bound) => field_value
                .and_then(|v| compare_values(v, bound))
                .is_some_and(|ord| ord != Ordering::Less),
            Condition::Lte(bound) => field_value
                .and_then(|v| compare_values(v, bound))
                .is_some_and(|ord| ord != Ordering::Greater),
            Condition::In(values) => field_value.is_some_and(|v| values.contains(v)),
            Condition::Contains(pattern) => field_value
                .and_then(Value::as_str)
                .is_some_and(|s| s.to_lowercase().contains(&pattern.to_lowercase())),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Predicate {
    /// Flat field clauses, all of which must hold.
    pub clauses: Vec<Clause>,
    /// Explicit conjunction list; appended to, never overwritten, so the
    /// date and amount range families coexist.
    pub all_of: Vec<Clause>,
}

impl Predicate {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty() && self.all_of.is_empty()
    }

    pub fn with(mut self, clause: Clause) -> Self {
        self.clauses.push(clause);
        self
    }

    pub fn push(&mut self, clause: Clause) {
        self.clauses.push(clause);
    }

    pub fn push_conjunction(&mut self, clause: Clause) {
        self.all_of.push(clause);
    }

    /// True when any clause (flat or conjunction) targets `field`.
    pub fn constrains(&self, field: &str) -> bool {
        self.clauses
            .iter()
            .chain(self.all_of.iter())
            .any(|c| c.field == field)
    }

    pub fn matches(&self, doc: &Value) -> bool {
        self.clauses
            .iter()
            .chain(self.all_of.iter())
            .all(|c| c.matches(doc))
    }
}

/// Ordering between two JSON scalars. Numbers compare numerically; strings
/// that both parse as RFC 3339 timestamps compare as instants (mixed
/// sub-second precision would mis-sort lexicographically); other strings
/// compare lexicographically.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return x.partial_cmp(&y);
    }
    let (x, y) = (a.as_str()?, b.as_str()?);
    if let (Ok(dx), Ok(dy)) = (
        chrono::DateTime::parse_from_rfc3339(x),
        chrono::DateTime::parse_from_rfc3339(y),
    ) {
        return Some(dx.cmp(&dy));
    }
    Some(x.cmp(y))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub descending: bool,
}

impl Sort {
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }

    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct FindOptions {
    pub sort: Option<Sort>,
    pub skip: Option<usize>,
    pub limit: Option<usize>,
}

impl FindOptions {
    pub fn sorted(sort: Sort) -> Self {
        Self {
            sort: Some(sort),
            ..Default::default()
        }
    }

    pub fn skip(mut self, n: usize) -> Self {
        self.skip = Some(n);
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }
}

/// A single-call update: field sets and array appends applied atomically by
/// the store, so a status write and its history append cannot be split.
#[derive(Clone, Debug, Default)]
pub struct UpdateSpec {
    pub set: serde_json::Map<String, Value>,
    pub push: serde_json::Map<String, Value>,
}

impl UpdateSpec {
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.insert(field.into(), value.into());
        self
    }

    pub fn push(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push.insert(field.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.push.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_predicate_matches_everything() {
        let pred = Predicate::empty();
        assert!(pred.matches(&json!({"status": "pending"})));
        assert!(pred.matches(&json!({})));
    }

    #[test]
    fn eq_clause() {
        let pred = Predicate::empty().with(Clause::eq("status", "pending"));
        assert!(pred.matches(&json!({"status": "pending"})));
        assert!(!pred.matches(&json!({"status": "delivered"})));
        assert!(!pred.matches(&json!({})));
    }

    #[test]
    fn numeric_range_conjunction() {
        let mut pred = Predicate::empty();
        pred.push_conjunction(Clause::gte("total_amount", 100.0));
        pred.push_conjunction(Clause::lte("total_amount", 500.0));
        assert!(pred.matches(&json!({"total_amount": 250})));
        assert!(!pred.matches(&json!({"total_amount": 50})));
        assert!(!pred.matches(&json!({"total_amount": 750})));
    }

    #[test]
    fn timestamp_range_compares_as_instants() {
        let pred = Predicate::empty().with(Clause::gte("created_at", "2026-01-01T00:00:00Z"));
        // Sub-second precision would sort before "…00Z" lexicographically
        assert!(pred.matches(&json!({"created_at": "2026-01-01T00:00:00.250Z"})));
        assert!(!pred.matches(&json!({"created_at": "2025-12-31T23:59:59Z"})));
    }

    #[test]
    fn contains_is_case_insensitive() {
        let pred = Predicate::empty().with(Clause::contains("code", "abc12"));
        assert!(pred.matches(&json!({"code": "ORDABC123"})));
        assert!(pred.matches(&json!({"code": "abc12"})));
        assert!(!pred.matches(&json!({"code": "XYZ"})));
    }

    #[test]
    fn in_clause() {
        let pred = Predicate::empty().with(Clause::any_of(
            "id",
            vec![json!("usr_a"), json!("usr_b")],
        ));
        assert!(pred.matches(&json!({"id": "usr_a"})));
        assert!(!pred.matches(&json!({"id": "usr_c"})));
    }

    #[test]
    fn missing_field_fails_range() {
        let pred = Predicate::empty().with(Clause::gte("total_amount", 10));
        assert!(!pred.matches(&json!({"other": 99})));
    }

    #[test]
    fn constrains_covers_both_lists() {
        let mut pred = Predicate::empty().with(Clause::eq("status", "pending"));
        pred.push_conjunction(Clause::gte("created_at", "2026-01-01T00:00:00Z"));
        assert!(pred.constrains("status"));
        assert!(pred.constrains("created_at"));
        assert!(!pred.constrains("total_amount"));
    }

    #[test]
    fn update_spec_builder() {
        let spec = UpdateSpec::default()
            .set("status", "assigned")
            .push("status_change_history", json!({"status": "assigned"}));
        assert_eq!(spec.set.len(), 1);
        assert_eq!(spec.push.len(), 1);
        assert!(!spec.is_empty());
    }
}
