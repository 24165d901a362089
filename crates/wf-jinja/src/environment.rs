//! Jinja environment setup for Wharf

use crate::context::RenderContext;
use crate::error::{JinjaError, JinjaResult};
use crate::functions::{make_var_fn, yaml_to_value};
use minijinja::{Environment, UndefinedBehavior};
use std::collections::HashMap;

/// Jinja templating environment shared by every task in a run.
///
/// Undefined names are errors, so a typo in a source key fails the task
/// instead of loading from the wrong prefix.
pub struct TemplateEnvironment {
    env: Environment<'static>,
}

impl TemplateEnvironment {
    /// Create a new environment with variables from the manifest
    pub fn new(vars: &HashMap<String, serde_yaml::Value>) -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);

        let values = vars
            .iter()
            .map(|(k, v)| (k.clone(), yaml_to_value(v)))
            .collect();
        env.add_function("var", make_var_fn(values));

        Self { env }
    }

    /// Render a template string for one run
    pub fn render(&self, template: &str, ctx: &RenderContext) -> JinjaResult<String> {
        if !is_template(template) {
            return Ok(template.to_string());
        }
        self.env
            .render_str(template, ctx.globals())
            .map_err(|err| match err.kind() {
                minijinja::ErrorKind::UndefinedError => match undefined_name(&err) {
                    Some(name) => JinjaError::UnknownVariable { name },
                    None => JinjaError::from(err),
                },
                _ => JinjaError::from(err),
            })
    }
}

impl Default for TemplateEnvironment {
    fn default() -> Self {
        Self::new(&HashMap::new())
    }
}

impl std::fmt::Debug for TemplateEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateEnvironment").finish_non_exhaustive()
    }
}

/// Whether `text` contains any Jinja syntax
pub fn is_template(text: &str) -> bool {
    text.contains("{{") || text.contains("{%") || text.contains("{#")
}

/// Variable name from a `var()` lookup failure
fn undefined_name(err: &minijinja::Error) -> Option<String> {
    let detail = err.detail()?;
    let rest = detail.strip_prefix("Variable '")?;
    rest.split('\'').next().map(String::from)
}

#[cfg(test)]
#[path = "environment_test.rs"]
mod tests;
