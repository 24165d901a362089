//! Operator definitions
//!
//! An [`Operator`] is one named task in a pipeline. Its [`OperatorKind`] holds
//! the variant-specific configuration; execution lives in `wf-exec`, so the
//! definitions here are plain data that can be parsed from YAML, validated at
//! graph-build time and unit-tested without a warehouse.

use crate::error::{CoreError, CoreResult};
use crate::quality::{Predicate, QualityCheck};
use crate::serde_helpers::default_true;
use crate::table_name::TableName;
use crate::task_name::TaskName;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// A named unit of work in the task graph
#[derive(Debug, Clone, PartialEq)]
pub struct Operator {
    pub name: TaskName,
    pub kind: OperatorKind,
}

/// Variant-specific operator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operator", rename_all = "snake_case")]
pub enum OperatorKind {
    /// Run a DDL statement
    CreateTable(CreateTableSpec),
    /// Bulk-load raw files from object storage into a landing table
    StageExternalData(StageSpec),
    /// Append transformed rows to a fact table
    LoadFact(LoadFactSpec),
    /// Refresh a dimension table from an insert-select
    LoadDimension(LoadDimensionSpec),
    /// Run scalar checks and fail if any predicate is false
    ValidateQuality(ValidateQualitySpec),
}

/// Whether re-running a task with the same inputs converges to the same state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Idempotency {
    /// Repeated execution yields the same end state
    Idempotent,
    /// Repeated execution may duplicate rows unless the SQL filters them out
    AtLeastOnce,
}

impl fmt::Display for Idempotency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Idempotency::Idempotent => write!(f, "idempotent"),
            Idempotency::AtLeastOnce => write!(f, "at-least-once"),
        }
    }
}

/// `CREATE TABLE IF NOT EXISTS ...` style DDL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateTableSpec {
    pub table: TableName,
    pub sql: String,
}

/// Object-storage location of the files to stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceLocation {
    #[serde(default)]
    pub scheme: StorageScheme,

    /// Bucket name (or base directory for `file`)
    pub bucket: String,

    /// Object key or key pattern; a template when `render_key` is set
    pub key: String,

    /// Render `key` against the run's logical date before loading
    #[serde(default)]
    pub render_key: bool,
}

/// Storage backend for a source location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageScheme {
    #[default]
    S3,
    Gcs,
    /// Local filesystem, used for development and tests
    File,
}

impl SourceLocation {
    pub fn new(scheme: StorageScheme, bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            scheme,
            bucket: bucket.into(),
            key: key.into(),
            render_key: false,
        }
    }

    pub fn s3(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self::new(StorageScheme::S3, bucket, key)
    }

    /// Mark the key as a template rendered per run
    pub fn rendered(mut self) -> Self {
        self.render_key = true;
        self
    }

    /// Full URI for an already-resolved key
    pub fn uri_for_key(&self, key: &str) -> String {
        let bucket = self.bucket.trim_end_matches('/');
        let key = key.trim_start_matches('/');
        match self.scheme {
            StorageScheme::S3 => format!("s3://{}/{}", bucket, key),
            StorageScheme::Gcs => format!("gs://{}/{}", bucket, key),
            StorageScheme::File => format!("{}/{}", bucket, key),
        }
    }
}

/// File format of staged data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceFormat {
    /// Newline-delimited JSON records
    Json {
        #[serde(default)]
        mapping: ColumnMapping,
    },
    Csv {
        #[serde(default = "default_delimiter")]
        delimiter: char,
        #[serde(default = "default_true")]
        header: bool,
    },
}

impl Default for SourceFormat {
    fn default() -> Self {
        SourceFormat::Json {
            mapping: ColumnMapping::Auto,
        }
    }
}

fn default_delimiter() -> char {
    ','
}

/// How JSON fields map onto table columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ColumnMapping {
    /// Match fields to columns by name
    #[default]
    Auto,
    /// Explicit JSON-paths file at this location
    JsonPaths(String),
}

/// Staging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StageSpec {
    pub table: TableName,

    pub source: SourceLocation,

    #[serde(default)]
    pub format: SourceFormat,

    /// Credential reference resolved through the credential store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Empty the landing table before loading
    #[serde(default)]
    pub truncate: bool,
}

impl StageSpec {
    pub fn new(table: TableName, source: SourceLocation) -> Self {
        Self {
            table,
            source,
            format: SourceFormat::default(),
            credentials: None,
            region: None,
            truncate: false,
        }
    }

    pub fn format(mut self, format: SourceFormat) -> Self {
        self.format = format;
        self
    }

    pub fn credentials(mut self, reference: impl Into<String>) -> Self {
        self.credentials = Some(reference.into());
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn truncate(mut self, truncate: bool) -> Self {
        self.truncate = truncate;
        self
    }
}

/// Append-only fact load.
///
/// Facts accumulate across runs and are never truncated. Re-running a task
/// over the same window double-counts unless `select` restricts itself to the
/// run's logical date (`WHERE ts::date = '{{ ds }}'`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoadFactSpec {
    pub table: TableName,

    #[serde(default)]
    pub columns: Vec<String>,

    /// Select-transform producing the rows; rendered as a template
    pub select: String,
}

/// Dimension load, full refresh by default
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoadDimensionSpec {
    pub table: TableName,

    #[serde(default)]
    pub columns: Vec<String>,

    /// Select-transform producing the rows; rendered as a template
    pub select: String,

    #[serde(default = "default_true")]
    pub truncate: bool,
}

impl LoadDimensionSpec {
    pub fn new(table: TableName, columns: Vec<String>, select: impl Into<String>) -> Self {
        Self {
            table,
            columns,
            select: select.into(),
            truncate: true,
        }
    }

    pub fn truncate(mut self, truncate: bool) -> Self {
        self.truncate = truncate;
        self
    }
}

/// Quality gate configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ValidateQualitySpec {
    #[serde(default)]
    pub checks: Vec<QualityCheck>,

    /// Shorthand: each table must have at least one row
    #[serde(default)]
    pub tables: Vec<TableName>,
}

impl ValidateQualitySpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(mut self, query: impl Into<String>, expect: Predicate) -> Self {
        self.checks.push(QualityCheck::new(query, expect));
        self
    }

    pub fn table(mut self, table: TableName) -> Self {
        self.tables.push(table);
        self
    }

    /// Explicit checks followed by the expanded `tables` shorthand
    pub fn all_checks(&self) -> Vec<QualityCheck> {
        self.checks
            .iter()
            .cloned()
            .chain(self.tables.iter().map(QualityCheck::table_not_empty))
            .collect()
    }
}

impl Operator {
    pub fn new(name: TaskName, kind: OperatorKind) -> Self {
        Self { name, kind }
    }

    pub fn create_table(name: &str, table: &str, sql: impl Into<String>) -> Self {
        Self::new(
            TaskName::new(name),
            OperatorKind::CreateTable(CreateTableSpec {
                table: TableName::new(table),
                sql: sql.into(),
            }),
        )
    }

    pub fn stage(name: &str, spec: StageSpec) -> Self {
        Self::new(TaskName::new(name), OperatorKind::StageExternalData(spec))
    }

    pub fn load_fact(name: &str, table: &str, columns: &[&str], select: impl Into<String>) -> Self {
        Self::new(
            TaskName::new(name),
            OperatorKind::LoadFact(LoadFactSpec {
                table: TableName::new(table),
                columns: columns.iter().map(|c| c.to_string()).collect(),
                select: select.into(),
            }),
        )
    }

    pub fn load_dimension(name: &str, spec: LoadDimensionSpec) -> Self {
        Self::new(TaskName::new(name), OperatorKind::LoadDimension(spec))
    }

    pub fn validate_quality(name: &str, spec: ValidateQualitySpec) -> Self {
        Self::new(TaskName::new(name), OperatorKind::ValidateQuality(spec))
    }

    /// Short variant label used in logs and listings
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            OperatorKind::CreateTable(_) => "create_table",
            OperatorKind::StageExternalData(_) => "stage_external_data",
            OperatorKind::LoadFact(_) => "load_fact",
            OperatorKind::LoadDimension(_) => "load_dimension",
            OperatorKind::ValidateQuality(_) => "validate_quality",
        }
    }

    /// Table written by this operator, if any
    pub fn target_table(&self) -> Option<&TableName> {
        match &self.kind {
            OperatorKind::CreateTable(s) => Some(&s.table),
            OperatorKind::StageExternalData(s) => Some(&s.table),
            OperatorKind::LoadFact(s) => Some(&s.table),
            OperatorKind::LoadDimension(s) => Some(&s.table),
            OperatorKind::ValidateQuality(_) => None,
        }
    }

    /// Credential reference this operator needs resolved before the run
    pub fn credential_ref(&self) -> Option<&str> {
        match &self.kind {
            OperatorKind::StageExternalData(s) => s.credentials.as_deref(),
            _ => None,
        }
    }

    /// Re-run safety of this operator as configured
    pub fn idempotency(&self) -> Idempotency {
        match &self.kind {
            OperatorKind::CreateTable(_) | OperatorKind::ValidateQuality(_) => {
                Idempotency::Idempotent
            }
            OperatorKind::StageExternalData(s) if s.truncate => Idempotency::Idempotent,
            OperatorKind::LoadDimension(s) if s.truncate => Idempotency::Idempotent,
            OperatorKind::StageExternalData(_)
            | OperatorKind::LoadDimension(_)
            | OperatorKind::LoadFact(_) => Idempotency::AtLeastOnce,
        }
    }

    /// Reject configurations that can never execute successfully
    pub fn validate(&self) -> CoreResult<()> {
        let invalid = |message: String| CoreError::InvalidOperator {
            task: self.name.to_string(),
            message,
        };

        match &self.kind {
            OperatorKind::CreateTable(spec) => {
                if spec.sql.trim().is_empty() {
                    return Err(invalid("create_table requires a non-empty 'sql'".into()));
                }
            }
            OperatorKind::StageExternalData(spec) => {
                if spec.source.bucket.trim().is_empty() {
                    return Err(invalid("source.bucket must not be empty".into()));
                }
                if spec.source.key.trim().is_empty() {
                    return Err(invalid("source.key must not be empty".into()));
                }
                if matches!(spec.credentials.as_deref(), Some(c) if c.trim().is_empty()) {
                    return Err(invalid("credentials reference must not be empty".into()));
                }
                match &spec.format {
                    SourceFormat::Json {
                        mapping: ColumnMapping::JsonPaths(path),
                    } if path.trim().is_empty() => {
                        return Err(invalid("json_paths mapping must not be empty".into()));
                    }
                    SourceFormat::Csv { delimiter, .. }
                        if *delimiter == '\n' || *delimiter == '\r' =>
                    {
                        return Err(invalid("csv delimiter cannot be a line break".into()));
                    }
                    _ => {}
                }
            }
            OperatorKind::LoadFact(spec) => {
                validate_insert_select(&spec.columns, &spec.select).map_err(invalid)?;
            }
            OperatorKind::LoadDimension(spec) => {
                validate_insert_select(&spec.columns, &spec.select).map_err(invalid)?;
            }
            OperatorKind::ValidateQuality(spec) => {
                let checks = spec.all_checks();
                if checks.is_empty() {
                    return Err(invalid(
                        "validate_quality needs at least one entry in 'checks' or 'tables'".into(),
                    ));
                }
                for check in &checks {
                    if check.query.trim().is_empty() {
                        return Err(invalid("quality check query must not be empty".into()));
                    }
                    validate_predicate(&check.expect)
                        .map_err(|m| invalid(format!("check '{}': {}", check.label(), m)))?;
                }
            }
        }
        Ok(())
    }
}

fn validate_insert_select(columns: &[String], select: &str) -> Result<(), String> {
    if select.trim().is_empty() {
        return Err("'select' must not be empty".to_string());
    }
    let mut seen = HashSet::new();
    for column in columns {
        let column = column.trim();
        if column.is_empty() {
            return Err("column names must not be empty".to_string());
        }
        if !seen.insert(column.to_ascii_lowercase()) {
            return Err(format!("duplicate column '{}'", column));
        }
    }
    Ok(())
}

fn validate_predicate(predicate: &Predicate) -> Result<(), String> {
    let values = match *predicate {
        Predicate::Equals(v)
        | Predicate::GreaterThan(v)
        | Predicate::AtLeast(v)
        | Predicate::LessThan(v)
        | Predicate::AtMost(v) => vec![v],
        Predicate::Between { min, max } => {
            if min > max {
                return Err(format!("between bounds reversed ({} > {})", min, max));
            }
            vec![min, max]
        }
    };
    if values.iter().any(|v| v.is_nan()) {
        return Err("predicate value is NaN".to_string());
    }
    Ok(())
}

#[cfg(test)]
#[path = "operator_test.rs"]
mod tests;
