//! Validate command implementation

use anyhow::Result;
use chrono::Utc;
use std::collections::HashSet;
use wf_core::{
    Idempotency, Operator, OperatorKind, PipelineConfig, StorageScheme, TaskGraph, TaskName,
};
use wf_jinja::{RenderContext, TemplateEnvironment};

use crate::cli::{GlobalArgs, ValidateArgs};
use crate::commands::common::{credential_store, load_pipeline, ExitCode};

/// Validation result severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Severity {
    Warning,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Warning => write!(f, "WARNING"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// A single validation issue
struct ValidationIssue {
    severity: Severity,
    code: &'static str,
    message: String,
    task: Option<TaskName>,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.task {
            Some(task) => write!(
                f,
                "[{}] {}: {} (task '{}')",
                self.severity, self.code, self.message, task
            ),
            None => write!(f, "[{}] {}: {}", self.severity, self.code, self.message),
        }
    }
}

#[derive(Default)]
struct ValidationContext {
    issues: Vec<ValidationIssue>,
}

impl ValidationContext {
    fn error(&mut self, code: &'static str, message: impl Into<String>, task: Option<&TaskName>) {
        self.push(Severity::Error, code, message.into(), task);
    }

    fn warning(&mut self, code: &'static str, message: impl Into<String>, task: Option<&TaskName>) {
        self.push(Severity::Warning, code, message.into(), task);
    }

    fn push(
        &mut self,
        severity: Severity,
        code: &'static str,
        message: String,
        task: Option<&TaskName>,
    ) {
        self.issues.push(ValidationIssue {
            severity,
            code,
            message,
            task: task.cloned(),
        });
    }

    fn count(&self, severity: Severity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }
}

/// Execute the validate command
pub async fn execute(args: &ValidateArgs, global: &GlobalArgs) -> Result<()> {
    let config = load_pipeline(global)?;
    println!("Validating pipeline: {}\n", config.name);

    let mut ctx = ValidationContext::default();
    match config.build_graph() {
        Ok(graph) => {
            validate_templates(&config, &graph, &mut ctx);
            validate_staging(&graph, &mut ctx);
            validate_rerun_safety(&graph, &mut ctx);
            validate_quality_coverage(&graph, &mut ctx);
            if args.check_credentials {
                validate_credentials(&graph, args.credentials_prefix.as_deref(), &mut ctx);
            }
        }
        Err(err) => ctx.error("G001", err.to_string(), None),
    }

    print_issues_and_summary(&ctx, args.strict)
}

/// Every template-bearing field of an operator, labelled for messages
fn operator_templates(operator: &Operator) -> Vec<(String, &str)> {
    match &operator.kind {
        OperatorKind::CreateTable(spec) => vec![("sql".to_string(), spec.sql.as_str())],
        OperatorKind::StageExternalData(spec) if spec.source.render_key => {
            vec![("source.key".to_string(), spec.source.key.as_str())]
        }
        OperatorKind::StageExternalData(_) => Vec::new(),
        OperatorKind::LoadFact(spec) => vec![("select".to_string(), spec.select.as_str())],
        OperatorKind::LoadDimension(spec) => vec![("select".to_string(), spec.select.as_str())],
        OperatorKind::ValidateQuality(spec) => spec
            .checks
            .iter()
            .map(|check| (format!("check '{}'", check.label()), check.query.as_str()))
            .collect(),
    }
}

/// Render against a sample run so unknown variables surface before a trigger
fn validate_templates(config: &PipelineConfig, graph: &TaskGraph, ctx: &mut ValidationContext) {
    let env = TemplateEnvironment::new(&config.vars);
    let sample = RenderContext::new("validate", Utc::now());

    for name in graph.topological_order() {
        let Some(operator) = graph.operator(&name) else {
            continue;
        };
        for (field, template) in operator_templates(operator) {
            if let Err(err) = env.render(template, &sample) {
                ctx.error("T001", format!("{} does not render: {}", field, err), Some(&name));
            }
        }
    }
}

fn validate_staging(graph: &TaskGraph, ctx: &mut ValidationContext) {
    for name in graph.names() {
        let Some(Operator {
            kind: OperatorKind::StageExternalData(spec),
            ..
        }) = graph.operator(&name)
        else {
            continue;
        };
        if spec.credentials.is_none() && spec.source.scheme != StorageScheme::File {
            ctx.warning(
                "S001",
                "no credentials reference; the warehouse's ambient credentials will be used",
                Some(&name),
            );
        }
        if spec.credentials.is_some() && spec.source.scheme == StorageScheme::File {
            ctx.error(
                "S002",
                "credentials cannot be used with a local file source",
                Some(&name),
            );
        }
    }
}

fn validate_rerun_safety(graph: &TaskGraph, ctx: &mut ValidationContext) {
    for name in graph.names() {
        let Some(operator) = graph.operator(&name) else {
            continue;
        };
        if operator.idempotency() == Idempotency::AtLeastOnce {
            ctx.warning(
                "W001",
                format!(
                    "{} is {}; re-running the same logical date may duplicate rows",
                    operator.kind_name(),
                    Idempotency::AtLeastOnce
                ),
                Some(&name),
            );
        }
    }
}

/// Tables a quality gate checks should be written by one of its ancestors
fn validate_quality_coverage(graph: &TaskGraph, ctx: &mut ValidationContext) {
    for name in graph.names() {
        let Some(Operator {
            kind: OperatorKind::ValidateQuality(spec),
            ..
        }) = graph.operator(&name)
        else {
            continue;
        };

        let upstream_tables: HashSet<String> = graph
            .names()
            .into_iter()
            .filter(|candidate| graph.descendants(candidate).contains(&name))
            .filter_map(|candidate| {
                graph
                    .operator(&candidate)
                    .and_then(|op| op.target_table())
                    .map(|t| t.to_string())
            })
            .collect();

        for table in &spec.tables {
            if !upstream_tables.contains(table.as_str()) {
                ctx.warning(
                    "W002",
                    format!("checks table '{}' but no upstream task writes it", table),
                    Some(&name),
                );
            }
        }
    }
}

fn validate_credentials(graph: &TaskGraph, prefix: Option<&str>, ctx: &mut ValidationContext) {
    let store = credential_store(prefix);
    let mut checked = HashSet::new();
    for name in graph.names() {
        let Some(reference) = graph.operator(&name).and_then(|op| op.credential_ref()) else {
            continue;
        };
        if !checked.insert(reference.to_string()) {
            continue;
        }
        if let Err(err) = store.resolve(reference) {
            ctx.error("C001", err.to_string(), Some(&name));
        }
    }
}

fn print_issues_and_summary(ctx: &ValidationContext, strict: bool) -> Result<()> {
    let mut issues: Vec<&ValidationIssue> = ctx.issues.iter().collect();
    issues.sort_by(|a, b| b.severity.cmp(&a.severity));
    for issue in &issues {
        println!("  {}", issue);
    }

    let errors = ctx.count(Severity::Error);
    let warnings = ctx.count(Severity::Warning);
    if !issues.is_empty() {
        println!();
    }
    println!("Validation complete: {} errors, {} warnings", errors, warnings);

    if errors > 0 || (strict && warnings > 0) {
        return Err(ExitCode(1).into());
    }
    Ok(())
}

#[cfg(test)]
#[path = "validate_test.rs"]
mod tests;
