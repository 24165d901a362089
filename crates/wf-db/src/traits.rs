//! Warehouse trait definition

use crate::error::DbResult;
use async_trait::async_trait;
use std::fmt;
use wf_core::{Credentials, SourceFormat, TableName};

/// A single cell returned by [`Warehouse::query`]
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Numeric view of the cell, used by quality predicates
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Text(s) => s.trim().parse().ok(),
            Value::Null => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

/// One result row
pub type Row = Vec<Value>;

/// A bulk load from object storage into a table
#[derive(Debug, Clone)]
pub struct BulkLoad {
    pub target: TableName,
    /// Fully resolved source URI (`s3://bucket/key`, `gs://...` or a path)
    pub uri: String,
    pub format: SourceFormat,
    pub credentials: Option<Credentials>,
    pub region: Option<String>,
    /// Empty the target in the same transaction before loading
    pub truncate: bool,
}

impl BulkLoad {
    pub fn new(target: TableName, uri: impl Into<String>, format: SourceFormat) -> Self {
        Self {
            target,
            uri: uri.into(),
            format,
            credentials: None,
            region: None,
            truncate: false,
        }
    }
}

/// Warehouse gateway used by every operator.
///
/// Each call is atomic from the caller's view. Implementations must be
/// Send + Sync; one instance is shared by all tasks of a run.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Execute one or more statements in a single transaction
    async fn run(&self, sql: &str) -> DbResult<()>;

    /// Load external files into a table
    async fn bulk_load(&self, load: &BulkLoad) -> DbResult<()>;

    /// Execute a query and return every row
    async fn query(&self, sql: &str) -> DbResult<Vec<Row>>;

    /// Backend identifier for logging
    fn db_type(&self) -> &'static str;
}
