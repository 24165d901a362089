//! Pipeline manifest types and parsing for wharf.yml

use crate::dag::{TaskGraph, TaskGraphBuilder};
use crate::error::{CoreError, CoreResult};
use crate::operator::{Operator, OperatorKind};
use crate::retry::{Backoff, RetryPolicy};
use crate::task_name::TaskName;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Default manifest file names, checked in order
pub const MANIFEST_FILES: [&str; 2] = ["wharf.yml", "wharf.yaml"];

/// Pipeline definition loaded once at process start
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Pipeline name
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Trigger cadence, informational only (the host scheduler owns it)
    #[serde(default)]
    pub schedule: Option<String>,

    /// Maximum tasks executing at once
    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub warehouse: WarehouseConfig,

    /// Variables available to templates through `var()`
    #[serde(default)]
    pub vars: HashMap<String, serde_yaml::Value>,

    pub tasks: Vec<TaskConfig>,
}

/// Retry settings applied to every task
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Total attempts including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry
    #[serde(default = "default_delay_secs")]
    pub delay_secs: u64,

    #[serde(default)]
    pub backoff: Backoff,

    /// Cap for exponential backoff
    #[serde(default)]
    pub max_delay_secs: Option<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_secs: default_delay_secs(),
            backoff: Backoff::default(),
            max_delay_secs: None,
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            delay: Duration::from_secs(self.delay_secs),
            backoff: self.backoff,
            max_delay: self.max_delay_secs.map(Duration::from_secs),
        }
    }
}

/// Warehouse backend selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DbType {
    #[default]
    DuckDb,
}

/// Warehouse connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WarehouseConfig {
    #[serde(rename = "type", default)]
    pub db_type: DbType,

    /// Database file path, or `:memory:`
    #[serde(default = "default_db_path")]
    pub path: String,

    /// Connections shared by concurrently running tasks
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            db_type: DbType::default(),
            path: default_db_path(),
            pool_size: default_pool_size(),
        }
    }
}

/// One task entry in the manifest.
///
/// Deserialized by splitting off `name` and `depends_on` and parsing the rest
/// as the operator, so unknown operator keys are rejected instead of ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "serde_yaml::Mapping")]
pub struct TaskConfig {
    pub name: TaskName,

    /// Tasks that must succeed before this one starts
    #[serde(default)]
    pub depends_on: Vec<TaskName>,

    #[serde(flatten)]
    pub operator: OperatorKind,
}

impl TryFrom<serde_yaml::Mapping> for TaskConfig {
    type Error = String;

    fn try_from(mut map: serde_yaml::Mapping) -> Result<Self, Self::Error> {
        let name: TaskName = map
            .remove("name")
            .ok_or_else(|| "task is missing field `name`".to_string())
            .and_then(|value| serde_yaml::from_value(value).map_err(|e| e.to_string()))?;

        let depends_on = match map.remove("depends_on") {
            Some(value) => serde_yaml::from_value(value)
                .map_err(|e| format!("task '{}': depends_on: {}", name, e))?,
            None => Vec::new(),
        };

        let operator = serde_yaml::from_value(serde_yaml::Value::Mapping(map))
            .map_err(|e| format!("task '{}': {}", name, e))?;

        Ok(Self {
            name,
            depends_on,
            operator,
        })
    }
}

fn default_workers() -> usize {
    4
}

fn default_max_attempts() -> u32 {
    3
}

fn default_delay_secs() -> u64 {
    300
}

fn default_db_path() -> String {
    ":memory:".to_string()
}

fn default_pool_size() -> usize {
    4
}

impl PipelineConfig {
    /// Load a pipeline manifest from a file
    pub fn load(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            return Err(CoreError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| CoreError::IoWithPath {
            path: path.display().to_string(),
            source: e,
        })?;
        let config = Self::from_yaml(&content)?;
        log::debug!(
            "Loaded pipeline '{}' from {} ({} tasks)",
            config.name,
            path.display(),
            config.tasks.len()
        );
        Ok(config)
    }

    /// Load `wharf.yml` or `wharf.yaml` from a directory
    pub fn load_from_dir(dir: &Path) -> CoreResult<Self> {
        MANIFEST_FILES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.exists())
            .map(|path| Self::load(&path))
            .unwrap_or_else(|| {
                Err(CoreError::ConfigNotFound {
                    path: dir.join(MANIFEST_FILES[0]).display().to_string(),
                })
            })
    }

    /// Parse and validate a manifest from YAML text
    pub fn from_yaml(content: &str) -> CoreResult<Self> {
        let config: PipelineConfig =
            serde_yaml::from_str(content).map_err(|e| CoreError::ConfigParseError {
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> CoreResult<()> {
        if self.name.trim().is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: "Pipeline name cannot be empty".to_string(),
            });
        }
        if self.workers == 0 {
            return Err(CoreError::ConfigInvalid {
                message: "workers must be at least 1".to_string(),
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(CoreError::ConfigInvalid {
                message: "retry.max_attempts must be at least 1".to_string(),
            });
        }
        if self.warehouse.pool_size == 0 {
            return Err(CoreError::ConfigInvalid {
                message: "warehouse.pool_size must be at least 1".to_string(),
            });
        }
        if self.tasks.is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: "At least one task must be defined".to_string(),
            });
        }
        Ok(())
    }

    /// Build the task graph declared by `tasks`
    pub fn build_graph(&self) -> CoreResult<TaskGraph> {
        let mut builder = TaskGraphBuilder::new();
        for task in &self.tasks {
            builder.add_node(Operator::new(task.name.clone(), task.operator.clone()));
        }
        for task in &self.tasks {
            for dep in &task.depends_on {
                builder.add_edge(dep, &task.name);
            }
        }
        let graph = builder.build()?;
        log::debug!(
            "Built task graph for '{}': {} tasks, {} edges",
            self.name,
            graph.len(),
            graph.edges().len()
        );
        Ok(graph)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry.to_policy()
    }

    pub fn get_var(&self, name: &str) -> Option<&serde_yaml::Value> {
        self.vars.get(name)
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
