//! Shared utilities for CLI commands

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use std::fmt;
use std::path::Path;
use wf_core::{CredentialStore, EnvCredentialStore, PipelineConfig};

use crate::cli::GlobalArgs;

/// Error type representing a non-zero process exit code.
///
/// Use `return Err(ExitCode(N).into())` instead of `std::process::exit(N)`
/// so that destructors run before the process ends.
#[derive(Debug)]
pub(crate) struct ExitCode(pub(crate) i32);

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Control flow only; main.rs maps it to the process status.
        write!(f, "")
    }
}

impl std::error::Error for ExitCode {}

/// Load the manifest named by `--pipeline`, a file or a directory
pub(crate) fn load_pipeline(global: &GlobalArgs) -> Result<PipelineConfig> {
    let path = Path::new(&global.pipeline);
    let config = if path.is_dir() {
        PipelineConfig::load_from_dir(path)
    } else {
        PipelineConfig::load(path)
    };
    config.with_context(|| format!("Failed to load pipeline from {}", path.display()))
}

/// Parse `--logical-date`: full RFC 3339, or a bare date meaning midnight UTC
pub(crate) fn parse_logical_date(input: &str) -> Result<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(input) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }
    bail!(
        "Invalid logical date '{}': expected RFC 3339 (2018-11-05T14:00:00Z) or YYYY-MM-DD",
        input
    )
}

pub(crate) fn credential_store(prefix: Option<&str>) -> Box<dyn CredentialStore> {
    match prefix {
        Some(prefix) => Box::new(EnvCredentialStore::with_prefix(prefix)),
        None => Box::new(EnvCredentialStore::new()),
    }
}

/// Shorten long values for one-line displays
pub(crate) fn truncate_display(text: &str, max: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        return flat;
    }
    let kept: String = flat.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept)
}
