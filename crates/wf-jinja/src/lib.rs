//! wf-jinja - Jinja templating layer for Wharf
//!
//! Renders source keys and SQL against a run: `logical_date.year`,
//! `logical_date.month`, `ds`, `ds_nodash`, `ts`, `run_id`, and `var()` for
//! variables declared in the pipeline manifest.

pub mod context;
pub mod environment;
pub mod error;
mod functions;

pub use context::RenderContext;
pub use environment::{is_template, TemplateEnvironment};
pub use error::{JinjaError, JinjaResult};
