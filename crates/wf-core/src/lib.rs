//! wf-core - Core library for Wharf
//!
//! This crate provides the pipeline manifest, operator definitions, the task
//! DAG, the retry policy and the run-state types shared by every Wharf
//! component.

pub mod config;
pub mod credentials;
pub mod dag;
pub mod error;
mod newtype_string;
pub mod operator;
pub mod quality;
pub mod retry;
pub mod run_state;
pub(crate) mod serde_helpers;
pub mod sql_utils;
pub mod table_name;
pub mod task_name;

pub use config::{DbType, PipelineConfig, RetryConfig, TaskConfig, WarehouseConfig};
pub use credentials::{Credentials, CredentialStore, EnvCredentialStore, StaticCredentialStore};
pub use dag::{TaskGraph, TaskGraphBuilder};
pub use error::{CoreError, CoreResult};
pub use operator::{
    ColumnMapping, CreateTableSpec, Idempotency, LoadDimensionSpec, LoadFactSpec, Operator,
    OperatorKind, SourceFormat, SourceLocation, StageSpec, StorageScheme, ValidateQualitySpec,
};
pub use quality::{Predicate, QualityCheck};
pub use retry::{Backoff, RetryDecision, RetryPolicy, Retryable};
pub use run_state::{NodeFailure, NodeState, RunResult, RunStatus, RunSummary, StateTransition};
pub use table_name::TableName;
pub use task_name::TaskName;
