//! Error types for operator execution

use thiserror::Error;
use wf_core::Retryable;
use wf_db::DbError;
use wf_jinja::JinjaError;
use wf_quality::CheckResult;

/// Why one attempt of an operator failed
#[derive(Error, Debug)]
pub enum OperatorError {
    /// DDL failed (X001)
    #[error("[X001] Task '{task}' could not create table: {source}")]
    CreateTable { task: String, source: DbError },

    /// Bulk load from object storage failed (X002)
    #[error("[X002] Task '{task}' failed to stage data from {uri}: {source}")]
    Staging {
        task: String,
        uri: String,
        source: DbError,
    },

    /// Insert-select into a fact or dimension failed (X003)
    #[error("[X003] Task '{task}' failed to load {table}: {source}")]
    Load {
        task: String,
        table: String,
        source: DbError,
    },

    /// One or more quality checks did not hold (X004)
    #[error(
        "[X004] Task '{task}': {} of {total} quality checks failed: {}",
        .failures.len(),
        describe_failures(.failures)
    )]
    QualityCheck {
        task: String,
        total: usize,
        failures: Vec<CheckResult>,
    },

    /// Warehouse unreachable while running checks (X005)
    #[error("[X005] Task '{task}' lost the warehouse: {source}")]
    Gateway { task: String, source: DbError },

    /// Template could not be rendered (X006)
    #[error("[X006] Task '{task}' has an invalid template: {source}")]
    Template { task: String, source: JinjaError },

    /// Credential reference was not resolved before the run (X007)
    #[error("[X007] Task '{task}' references unresolved credentials '{reference}'")]
    Credentials { task: String, reference: String },

    /// The operator panicked (X008)
    #[error("[X008] Task '{task}' panicked: {message}")]
    Panicked { task: String, message: String },
}

fn describe_failures(failures: &[CheckResult]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl OperatorError {
    /// Task the error belongs to
    pub fn task(&self) -> &str {
        match self {
            OperatorError::CreateTable { task, .. }
            | OperatorError::Staging { task, .. }
            | OperatorError::Load { task, .. }
            | OperatorError::QualityCheck { task, .. }
            | OperatorError::Gateway { task, .. }
            | OperatorError::Template { task, .. }
            | OperatorError::Credentials { task, .. }
            | OperatorError::Panicked { task, .. } => task,
        }
    }
}

impl Retryable for OperatorError {
    fn is_transient(&self) -> bool {
        match self {
            OperatorError::CreateTable { source, .. }
            | OperatorError::Staging { source, .. }
            | OperatorError::Load { source, .. }
            | OperatorError::Gateway { source, .. } => source.is_transient(),
            OperatorError::QualityCheck { .. }
            | OperatorError::Template { .. }
            | OperatorError::Credentials { .. }
            | OperatorError::Panicked { .. } => false,
        }
    }
}
