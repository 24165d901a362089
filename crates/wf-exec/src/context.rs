//! Per-run context passed to every operator

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use wf_core::{CoreResult, CredentialStore, Credentials, TaskGraph};
use wf_jinja::{JinjaResult, RenderContext, TemplateEnvironment};

/// Everything an operator may read during a run.
///
/// Built once per trigger. Credentials referenced by the graph are resolved
/// up front so a missing secret fails the run before any task starts.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
    /// Logical timestamp the run covers; source paths and SQL render against it
    pub logical_date: DateTime<Utc>,
    credentials: HashMap<String, Credentials>,
    templates: Arc<TemplateEnvironment>,
}

impl RunContext {
    pub fn new(run_id: impl Into<String>, logical_date: DateTime<Utc>) -> Self {
        Self {
            run_id: run_id.into(),
            logical_date,
            credentials: HashMap::new(),
            templates: Arc::new(TemplateEnvironment::default()),
        }
    }

    /// Fresh run with a generated identifier
    pub fn for_logical_date(logical_date: DateTime<Utc>) -> Self {
        Self::new(generate_run_id(), logical_date)
    }

    pub fn with_templates(mut self, templates: Arc<TemplateEnvironment>) -> Self {
        self.templates = templates;
        self
    }

    pub fn with_credentials(mut self, name: impl Into<String>, credentials: Credentials) -> Self {
        self.credentials.insert(name.into(), credentials);
        self
    }

    /// Resolve every credential reference in `graph` through `store`
    pub fn resolve_credentials(
        mut self,
        graph: &TaskGraph,
        store: &dyn CredentialStore,
    ) -> CoreResult<Self> {
        for name in graph.names() {
            let Some(reference) = graph.operator(&name).and_then(|op| op.credential_ref()) else {
                continue;
            };
            if self.credentials.contains_key(reference) {
                continue;
            }
            let resolved = store.resolve(reference)?;
            log::debug!("Resolved credentials '{}' for task '{}'", reference, name);
            self.credentials.insert(reference.to_string(), resolved);
        }
        Ok(self)
    }

    pub fn credentials(&self, reference: &str) -> Option<&Credentials> {
        self.credentials.get(reference)
    }

    /// Render a template against this run
    pub fn render(&self, template: &str) -> JinjaResult<String> {
        self.templates.render(
            template,
            &RenderContext::new(self.run_id.clone(), self.logical_date),
        )
    }
}

/// New random run identifier
pub fn generate_run_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use wf_core::{
        CoreError, Operator, SourceLocation, StageSpec, StaticCredentialStore, TableName,
        TaskGraphBuilder,
    };

    fn staging_graph() -> TaskGraph {
        let mut builder = TaskGraphBuilder::new();
        builder.add_node(Operator::stage(
            "stage_events",
            StageSpec::new(
                TableName::new("staging_events"),
                SourceLocation::s3("udacity-dend", "log_data"),
            )
            .credentials("aws_credentials"),
        ));
        builder.build().unwrap()
    }

    #[test]
    fn test_resolve_credentials() {
        let store = StaticCredentialStore::new()
            .with("aws_credentials", Credentials::key_pair("AKIA", "secret"));
        let ctx = RunContext::new("run-1", Utc::now())
            .resolve_credentials(&staging_graph(), &store)
            .unwrap();
        assert_eq!(
            ctx.credentials("aws_credentials"),
            Some(&Credentials::key_pair("AKIA", "secret"))
        );
    }

    #[test]
    fn test_missing_credentials_fail_before_run() {
        let err = RunContext::new("run-1", Utc::now())
            .resolve_credentials(&staging_graph(), &StaticCredentialStore::new())
            .unwrap_err();
        assert!(matches!(err, CoreError::CredentialNotFound { .. }));
    }

    #[test]
    fn test_render_uses_logical_date() {
        let ctx = RunContext::new(
            "run-7",
            Utc.with_ymd_and_hms(2018, 11, 30, 0, 0, 0).unwrap(),
        );
        assert_eq!(
            ctx.render("log_data/{{ logical_date.year }}/{{ logical_date.month }}")
                .unwrap(),
            "log_data/2018/11"
        );
        assert_eq!(ctx.render("{{ run_id }}").unwrap(), "run-7");
    }

    #[test]
    fn test_generated_run_ids_are_unique() {
        assert_ne!(generate_run_id(), generate_run_id());
    }
}
