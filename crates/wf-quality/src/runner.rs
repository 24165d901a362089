//! Check execution

use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};
use wf_core::{Predicate, QualityCheck, Retryable};
use wf_db::{DbResult, Row, Warehouse};

/// Result of a single check execution
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    /// Check description, or its query when none was given
    pub description: String,

    pub query: String,

    pub expect: Predicate,

    /// First scalar of the first row, when it was numeric
    pub observed: Option<f64>,

    pub passed: bool,

    /// Why no value could be evaluated (query error, empty result)
    pub error: Option<String>,

    #[serde(skip)]
    pub duration: Duration,
}

impl CheckResult {
    fn evaluated(check: &QualityCheck, observed: f64, duration: Duration) -> Self {
        Self {
            description: check.label().to_string(),
            query: check.query.clone(),
            expect: check.expect,
            observed: Some(observed),
            passed: check.expect.evaluate(observed),
            error: None,
            duration,
        }
    }

    fn error(check: &QualityCheck, error: String, duration: Duration) -> Self {
        Self {
            description: check.label().to_string(),
            query: check.query.clone(),
            expect: check.expect,
            observed: None,
            passed: false,
            error: Some(error),
            duration,
        }
    }
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.error, self.observed) {
            (Some(error), _) => write!(f, "{}: {}", self.description, error),
            (None, Some(observed)) => write!(
                f,
                "{}: expected {}, got {}",
                self.description, self.expect, observed
            ),
            (None, None) => write!(f, "{}: no value", self.description),
        }
    }
}

/// Summary of a check run
#[derive(Debug, Clone)]
pub struct CheckSummary {
    pub total: usize,
    pub passed: usize,
    /// Predicate evaluated to false
    pub failed: usize,
    /// No value to evaluate
    pub errors: usize,
    pub duration: Duration,
}

impl CheckSummary {
    pub fn from_results(results: &[CheckResult], duration: Duration) -> Self {
        let passed = results.iter().filter(|r| r.passed).count();
        let errors = results.iter().filter(|r| r.error.is_some()).count();
        Self {
            total: results.len(),
            passed,
            failed: results.len() - passed - errors,
            errors,
            duration,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.passed == self.total
    }
}

/// Extract the value a predicate is evaluated against
fn first_scalar(rows: &[Row]) -> Result<f64, String> {
    let row = rows
        .first()
        .ok_or_else(|| "query returned no rows".to_string())?;
    let value = row
        .first()
        .ok_or_else(|| "query returned no columns".to_string())?;
    value
        .as_f64()
        .ok_or_else(|| format!("query returned non-numeric value '{}'", value))
}

/// Runs quality checks against a warehouse
pub struct QualityRunner<'a> {
    warehouse: &'a dyn Warehouse,
}

impl<'a> QualityRunner<'a> {
    pub fn new(warehouse: &'a dyn Warehouse) -> Self {
        Self { warehouse }
    }

    /// Run a single check.
    ///
    /// Transient warehouse errors are returned so the caller can retry the
    /// whole gate; any other query error becomes a failed result.
    pub async fn run_check(&self, check: &QualityCheck) -> DbResult<CheckResult> {
        let start = Instant::now();
        let rows = match self.warehouse.query(&check.query).await {
            Ok(rows) => rows,
            Err(e) if e.is_transient() => return Err(e),
            Err(e) => return Ok(CheckResult::error(check, e.to_string(), start.elapsed())),
        };

        let result = match first_scalar(&rows) {
            Ok(observed) => CheckResult::evaluated(check, observed, start.elapsed()),
            Err(reason) => CheckResult::error(check, reason, start.elapsed()),
        };
        if result.passed {
            log::debug!("Quality check passed: {}", result);
        } else {
            log::warn!("Quality check failed: {}", result);
        }
        Ok(result)
    }

    /// Run every check, in order, even after one fails
    pub async fn run_all(
        &self,
        checks: &[QualityCheck],
    ) -> DbResult<(Vec<CheckResult>, CheckSummary)> {
        let start = Instant::now();
        let mut results = Vec::with_capacity(checks.len());
        for check in checks {
            results.push(self.run_check(check).await?);
        }
        let summary = CheckSummary::from_results(&results, start.elapsed());
        Ok((results, summary))
    }
}

#[cfg(test)]
#[path = "runner_test.rs"]
mod tests;
