//! Data quality check definitions
//!
//! A check is a query plus a predicate over the first column of its first
//! row. Predicates are a closed set so pipelines stay plain data.

use crate::sql_utils::row_count_query;
use crate::table_name::TableName;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Predicate over a single numeric result
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    Equals(f64),
    GreaterThan(f64),
    AtLeast(f64),
    LessThan(f64),
    AtMost(f64),
    /// Inclusive on both ends
    Between { min: f64, max: f64 },
}

impl Predicate {
    /// `count >= n`
    pub fn row_count_at_least(n: u64) -> Self {
        Predicate::AtLeast(n as f64)
    }

    /// `nulls == n`
    pub fn null_count_equals(n: u64) -> Self {
        Predicate::Equals(n as f64)
    }

    /// Evaluate the predicate against an observed value
    pub fn evaluate(&self, observed: f64) -> bool {
        match *self {
            Predicate::Equals(v) => observed == v,
            Predicate::GreaterThan(v) => observed > v,
            Predicate::AtLeast(v) => observed >= v,
            Predicate::LessThan(v) => observed < v,
            Predicate::AtMost(v) => observed <= v,
            Predicate::Between { min, max } => observed >= min && observed <= max,
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Equals(v) => write!(f, "== {}", v),
            Predicate::GreaterThan(v) => write!(f, "> {}", v),
            Predicate::AtLeast(v) => write!(f, ">= {}", v),
            Predicate::LessThan(v) => write!(f, "< {}", v),
            Predicate::AtMost(v) => write!(f, "<= {}", v),
            Predicate::Between { min, max } => write!(f, "between {} and {}", min, max),
        }
    }
}

/// One quality check: a scalar query and the expectation on its result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QualityCheck {
    /// Human-readable name; defaults to the query text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub query: String,

    pub expect: Predicate,
}

impl QualityCheck {
    pub fn new(query: impl Into<String>, expect: Predicate) -> Self {
        Self {
            description: None,
            query: query.into(),
            expect,
        }
    }

    /// `SELECT COUNT(*) FROM <table>` must be greater than zero
    pub fn table_not_empty(table: &TableName) -> Self {
        Self {
            description: Some(format!("{} has rows", table)),
            query: row_count_query(table),
            expect: Predicate::GreaterThan(0.0),
        }
    }

    /// Description if set, otherwise the query
    pub fn label(&self) -> &str {
        self.description.as_deref().unwrap_or(&self.query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicates_evaluate() {
        assert!(Predicate::GreaterThan(0.0).evaluate(1.0));
        assert!(!Predicate::GreaterThan(0.0).evaluate(0.0));
        assert!(Predicate::row_count_at_least(10).evaluate(10.0));
        assert!(Predicate::null_count_equals(0).evaluate(0.0));
        assert!(!Predicate::null_count_equals(0).evaluate(3.0));
        assert!(Predicate::LessThan(5.0).evaluate(4.5));
        assert!(Predicate::AtMost(5.0).evaluate(5.0));
        assert!(Predicate::Between { min: 1.0, max: 3.0 }.evaluate(3.0));
        assert!(!Predicate::Between { min: 1.0, max: 3.0 }.evaluate(0.0));
    }

    #[test]
    fn test_predicate_display() {
        assert_eq!(Predicate::GreaterThan(0.0).to_string(), "> 0");
        assert_eq!(
            Predicate::Between { min: 1.0, max: 2.5 }.to_string(),
            "between 1 and 2.5"
        );
    }

    #[test]
    fn test_check_from_yaml() {
        let yaml = r#"
query: SELECT COUNT(*) FROM users WHERE userid IS NULL
expect:
  equals: 0
"#;
        let check: QualityCheck = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(check.expect, Predicate::Equals(0.0));
        assert_eq!(check.label(), "SELECT COUNT(*) FROM users WHERE userid IS NULL");
    }

    #[test]
    fn test_table_not_empty() {
        let check = QualityCheck::table_not_empty(&TableName::new("artists"));
        assert_eq!(check.query, r#"SELECT COUNT(*) FROM "artists""#);
        assert_eq!(check.label(), "artists has rows");
    }
}
