//! Error types for wf-core

use thiserror::Error;

/// Core error type for Wharf
#[derive(Error, Debug)]
pub enum CoreError {
    /// E001: Pipeline manifest not found
    #[error("[E001] Pipeline file not found: {path}")]
    ConfigNotFound { path: String },

    /// E002: Failed to parse the pipeline manifest
    #[error("[E002] Failed to parse pipeline: {message}")]
    ConfigParseError { message: String },

    /// E003: Invalid configuration value
    #[error("[E003] Invalid config: {message}")]
    ConfigInvalid { message: String },

    /// E004: Operator configuration rejected at graph-build time
    #[error("[E004] Invalid operator '{task}': {message}")]
    InvalidOperator { task: String, message: String },

    /// E005: Cycle detected while building the task graph
    #[error("[E005] Cyclic task graph: {cycle}")]
    CyclicGraph { cycle: String },

    /// E006: Edge references a task that was never registered
    #[error("[E006] Dangling edge {from} -> {to}: task '{missing}' is not registered")]
    DanglingEdge {
        from: String,
        to: String,
        missing: String,
    },

    /// E007: Two tasks share a name
    #[error("[E007] Duplicate task name: {name}")]
    DuplicateTask { name: String },

    /// E008: Credential reference could not be resolved
    #[error("[E008] Credentials '{name}' not found: {reason}")]
    CredentialNotFound { name: String, reason: String },

    /// E009: IO error
    #[error("[E009] IO error: {0}")]
    Io(#[from] std::io::Error),

    /// E010: IO error with file path context
    #[error("[E010] Failed to read '{path}': {source}")]
    IoWithPath {
        path: String,
        source: std::io::Error,
    },

    /// E011: Run results could not be (de)serialized
    #[error("[E011] JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for CoreError
pub type CoreResult<T> = Result<T, CoreError>;
