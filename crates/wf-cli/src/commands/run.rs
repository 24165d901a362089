//! Run command implementation

use anyhow::{Context, Result};
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use wf_core::{NodeState, RunResult, StateTransition};
use wf_db::{DuckDbBackend, Warehouse};
use wf_exec::context::generate_run_id;
use wf_exec::{CoordinatorOptions, EventSink, LogEventSink, RunContext, RunCoordinator};
use wf_jinja::TemplateEnvironment;

use crate::cli::{GlobalArgs, OutputFormat, RunArgs};
use crate::commands::common::{
    credential_store, load_pipeline, parse_logical_date, truncate_display, ExitCode,
};

/// Advances a progress bar as tasks reach a terminal state, and still logs
/// every transition.
struct ProgressEventSink {
    bar: ProgressBar,
    log: LogEventSink,
}

impl ProgressEventSink {
    fn new(total: usize) -> Self {
        let bar = ProgressBar::new(total as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        bar.enable_steady_tick(Duration::from_millis(120));
        Self {
            bar,
            log: LogEventSink,
        }
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl EventSink for ProgressEventSink {
    fn emit(&self, event: &StateTransition) {
        match event.to {
            NodeState::Running => self.bar.set_message(event.task.to_string()),
            state if state.is_terminal() => self.bar.inc(1),
            _ => {}
        }
        self.bar.suspend(|| self.log.emit(event));
    }
}

/// Execute the run command
pub async fn execute(args: &RunArgs, global: &GlobalArgs) -> Result<()> {
    let config = load_pipeline(global)?;
    let graph = config
        .build_graph()
        .context("Failed to build task graph")?;

    let logical_date = match &args.logical_date {
        Some(input) => parse_logical_date(input)?,
        None => Utc::now(),
    };
    let run_id = args.run_id.clone().unwrap_or_else(generate_run_id);

    let templates = Arc::new(TemplateEnvironment::new(&config.vars));
    let store = credential_store(args.credentials_prefix.as_deref());
    let ctx = RunContext::new(run_id, logical_date)
        .with_templates(templates)
        .resolve_credentials(&graph, store.as_ref())
        .context("Failed to resolve credentials")?;

    let db_path = args.db_path.as_deref().unwrap_or(&config.warehouse.path);
    let warehouse: Arc<dyn Warehouse> = Arc::new(
        DuckDbBackend::new(db_path, config.warehouse.pool_size)
            .with_context(|| format!("Failed to open warehouse at {}", db_path))?,
    );

    let options = CoordinatorOptions {
        workers: args.workers.unwrap_or(config.workers).max(1),
        retry: config.retry_policy(),
    };

    let show_progress = !args.quiet && args.output == OutputFormat::Text;
    let progress = show_progress.then(|| Arc::new(ProgressEventSink::new(graph.len())));
    let events: Arc<dyn EventSink> = match &progress {
        Some(sink) => Arc::clone(sink) as Arc<dyn EventSink>,
        None => Arc::new(LogEventSink),
    };

    let coordinator = RunCoordinator::new(warehouse, options).with_events(events);
    let cancel = coordinator.cancel_signal();

    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("Interrupt received, cancelling run");
                cancel.cancel();
            }
        })
    };
    let deadline = args.timeout_secs.map(|secs| {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            log::warn!("Run exceeded {}s, cancelling", secs);
            cancel.cancel();
        })
    });

    log::info!("Pipeline '{}' ({} tasks)", config.name, graph.len());
    let result = coordinator.execute(&graph, &ctx).await;

    interrupt.abort();
    if let Some(handle) = deadline {
        handle.abort();
    }
    if let Some(sink) = &progress {
        sink.finish();
    }

    if let Some(path) = &args.results_path {
        result
            .save(Path::new(path))
            .with_context(|| format!("Failed to write run results to {}", path))?;
        log::info!("Run results written to {}", path);
    }

    match args.output {
        OutputFormat::Text => print_summary(&result),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
    }

    if !result.is_success() {
        return Err(ExitCode(if result.cancelled { 130 } else { 1 }).into());
    }
    Ok(())
}

fn print_summary(result: &RunResult) {
    let summary = result.summary();

    println!();
    for (task, state) in &result.nodes {
        let marker = match state {
            NodeState::Succeeded => "✓",
            NodeState::Failed => "✗",
            NodeState::UpstreamFailed | NodeState::Skipped => "-",
            NodeState::Pending | NodeState::Running => "?",
        };
        println!("  {} {} ({})", marker, task, state);
    }

    if !result.failures.is_empty() {
        println!("\nFailures:");
        for failure in &result.failures {
            let attempts = match failure.attempts {
                0 => String::new(),
                1 => " after 1 attempt".to_string(),
                n => format!(" after {} attempts", n),
            };
            println!(
                "  {} [{}{}]: {}",
                failure.task,
                failure.state,
                attempts,
                truncate_display(&failure.error, 200)
            );
        }
    }

    println!(
        "\nRun {} {}: {} succeeded, {} failed, {} upstream failed, {} skipped of {} in {:.1}s{}",
        result.run_id,
        result.status,
        summary.succeeded,
        summary.failed,
        summary.upstream_failed,
        summary.skipped,
        summary.total,
        summary.duration_ms as f64 / 1000.0,
        if result.cancelled { " (cancelled)" } else { "" }
    );
}
