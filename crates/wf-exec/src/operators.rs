//! Operator execution
//!
//! Each operator variant renders its templates against the run, issues its
//! statements through the [`Warehouse`] and maps failures to an
//! [`OperatorError`] the retry policy can classify.

use crate::context::RunContext;
use crate::error::OperatorError;
use async_trait::async_trait;
use wf_core::sql_utils::{insert_select_statement, truncate_statement};
use wf_core::{
    CreateTableSpec, LoadDimensionSpec, LoadFactSpec, Operator, OperatorKind, QualityCheck,
    StageSpec, ValidateQualitySpec,
};
use wf_db::{BulkLoad, Warehouse};
use wf_quality::QualityRunner;

/// One attempt of a task
#[async_trait]
pub trait Execute {
    async fn execute(&self, warehouse: &dyn Warehouse, ctx: &RunContext)
        -> Result<(), OperatorError>;
}

#[async_trait]
impl Execute for Operator {
    async fn execute(
        &self,
        warehouse: &dyn Warehouse,
        ctx: &RunContext,
    ) -> Result<(), OperatorError> {
        let task = self.name.as_str();
        match &self.kind {
            OperatorKind::CreateTable(spec) => create_table(task, spec, warehouse, ctx).await,
            OperatorKind::StageExternalData(spec) => stage(task, spec, warehouse, ctx).await,
            OperatorKind::LoadFact(spec) => load_fact(task, spec, warehouse, ctx).await,
            OperatorKind::LoadDimension(spec) => load_dimension(task, spec, warehouse, ctx).await,
            OperatorKind::ValidateQuality(spec) => {
                validate_quality(task, spec, warehouse, ctx).await
            }
        }
    }
}

fn render(task: &str, ctx: &RunContext, template: &str) -> Result<String, OperatorError> {
    ctx.render(template).map_err(|source| OperatorError::Template {
        task: task.to_string(),
        source,
    })
}

async fn create_table(
    task: &str,
    spec: &CreateTableSpec,
    warehouse: &dyn Warehouse,
    ctx: &RunContext,
) -> Result<(), OperatorError> {
    let sql = render(task, ctx, &spec.sql)?;
    warehouse
        .run(&sql)
        .await
        .map_err(|source| OperatorError::CreateTable {
            task: task.to_string(),
            source,
        })?;
    log::info!("Ensured table {} exists", spec.table);
    Ok(())
}

/// Resolve the full source URI for this run
pub(crate) fn source_uri(
    task: &str,
    spec: &StageSpec,
    ctx: &RunContext,
) -> Result<String, OperatorError> {
    let key = if spec.source.render_key {
        render(task, ctx, &spec.source.key)?
    } else {
        spec.source.key.clone()
    };
    Ok(spec.source.uri_for_key(&key))
}

async fn stage(
    task: &str,
    spec: &StageSpec,
    warehouse: &dyn Warehouse,
    ctx: &RunContext,
) -> Result<(), OperatorError> {
    let uri = source_uri(task, spec, ctx)?;
    let credentials = match &spec.credentials {
        Some(reference) => Some(ctx.credentials(reference).cloned().ok_or_else(|| {
            OperatorError::Credentials {
                task: task.to_string(),
                reference: reference.clone(),
            }
        })?),
        None => None,
    };

    let load = BulkLoad {
        target: spec.table.clone(),
        uri: uri.clone(),
        format: spec.format.clone(),
        credentials,
        region: spec.region.clone(),
        truncate: spec.truncate,
    };

    log::info!("Staging {} into {}", uri, spec.table);
    warehouse
        .bulk_load(&load)
        .await
        .map_err(|source| OperatorError::Staging {
            task: task.to_string(),
            uri,
            source,
        })
}

async fn load_fact(
    task: &str,
    spec: &LoadFactSpec,
    warehouse: &dyn Warehouse,
    ctx: &RunContext,
) -> Result<(), OperatorError> {
    let select = render(task, ctx, &spec.select)?;
    let sql = insert_select_statement(&spec.table, &spec.columns, &select);
    warehouse
        .run(&sql)
        .await
        .map_err(|source| OperatorError::Load {
            task: task.to_string(),
            table: spec.table.to_string(),
            source,
        })?;
    log::info!("Appended rows to fact table {}", spec.table);
    Ok(())
}

/// Truncate (when configured) and insert in one warehouse call, so a failed
/// insert leaves the previous contents in place.
pub(crate) fn dimension_statement(spec: &LoadDimensionSpec, select: &str) -> String {
    let insert = insert_select_statement(&spec.table, &spec.columns, select);
    if spec.truncate {
        format!("{};\n{};", truncate_statement(&spec.table), insert)
    } else {
        insert
    }
}

async fn load_dimension(
    task: &str,
    spec: &LoadDimensionSpec,
    warehouse: &dyn Warehouse,
    ctx: &RunContext,
) -> Result<(), OperatorError> {
    let select = render(task, ctx, &spec.select)?;
    warehouse
        .run(&dimension_statement(spec, &select))
        .await
        .map_err(|source| OperatorError::Load {
            task: task.to_string(),
            table: spec.table.to_string(),
            source,
        })?;
    log::info!(
        "Loaded dimension {} ({})",
        spec.table,
        if spec.truncate { "refresh" } else { "append" }
    );
    Ok(())
}

async fn validate_quality(
    task: &str,
    spec: &ValidateQualitySpec,
    warehouse: &dyn Warehouse,
    ctx: &RunContext,
) -> Result<(), OperatorError> {
    let checks = spec
        .all_checks()
        .into_iter()
        .map(|check| {
            Ok(QualityCheck {
                query: render(task, ctx, &check.query)?,
                ..check
            })
        })
        .collect::<Result<Vec<_>, OperatorError>>()?;

    let (results, summary) = QualityRunner::new(warehouse)
        .run_all(&checks)
        .await
        .map_err(|source| OperatorError::Gateway {
            task: task.to_string(),
            source,
        })?;

    if summary.all_passed() {
        log::info!("All {} quality checks passed", summary.total);
        return Ok(());
    }

    Err(OperatorError::QualityCheck {
        task: task.to_string(),
        total: summary.total,
        failures: results.into_iter().filter(|r| !r.passed).collect(),
    })
}

#[cfg(test)]
#[path = "operators_test.rs"]
mod tests;
