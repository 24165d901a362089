//! Per-run values injected into templates

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::Serialize;

/// Identity of the run a template is rendered for.
///
/// Exposed to templates as:
///
/// ```jinja
/// log_data/{{ logical_date.year }}/{{ logical_date.month }}
/// WHERE start_time::date = '{{ ds }}'
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RenderContext {
    pub run_id: String,
    pub logical_date: DateTime<Utc>,
}

/// Date parts, unpadded
#[derive(Debug, Clone, Serialize)]
pub(crate) struct DateParts {
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
}

/// Everything a template can reference besides functions
#[derive(Debug, Clone, Serialize)]
pub(crate) struct TemplateGlobals {
    run_id: String,
    logical_date: DateParts,
    /// `YYYY-MM-DD`
    ds: String,
    /// `YYYYMMDD`
    ds_nodash: String,
    /// RFC 3339 timestamp
    ts: String,
}

impl RenderContext {
    pub fn new(run_id: impl Into<String>, logical_date: DateTime<Utc>) -> Self {
        Self {
            run_id: run_id.into(),
            logical_date,
        }
    }

    pub(crate) fn globals(&self) -> TemplateGlobals {
        let date = self.logical_date;
        TemplateGlobals {
            run_id: self.run_id.clone(),
            logical_date: DateParts {
                year: date.year(),
                month: date.month(),
                day: date.day(),
                hour: date.hour(),
                minute: date.minute(),
            },
            ds: date.format("%Y-%m-%d").to_string(),
            ds_nodash: date.format("%Y%m%d").to_string(),
            ts: date.to_rfc3339(),
        }
    }
}
