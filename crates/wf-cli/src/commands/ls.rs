//! List command implementation

use anyhow::{Context, Result};
use serde::Serialize;
use wf_core::TaskGraph;

use crate::cli::{GlobalArgs, LsArgs, LsOutput};
use crate::commands::common::load_pipeline;

/// Task information for display
#[derive(Debug, Serialize)]
struct TaskInfo {
    name: String,
    operator: &'static str,
    target: Option<String>,
    depends_on: Vec<String>,
    idempotency: String,
}

/// Execute the ls command
pub async fn execute(args: &LsArgs, global: &GlobalArgs) -> Result<()> {
    let config = load_pipeline(global)?;
    let graph = config
        .build_graph()
        .context("Failed to build task graph")?;

    let tasks = collect_tasks(&graph);
    match args.output {
        LsOutput::Table => print_table(&tasks),
        LsOutput::Json => println!("{}", serde_json::to_string_pretty(&tasks)?),
    }
    Ok(())
}

/// Tasks in execution order
fn collect_tasks(graph: &TaskGraph) -> Vec<TaskInfo> {
    graph
        .topological_order()
        .into_iter()
        .filter_map(|name| {
            let operator = graph.operator(&name)?;
            Some(TaskInfo {
                name: name.to_string(),
                operator: operator.kind_name(),
                target: operator.target_table().map(|t| t.to_string()),
                depends_on: graph
                    .predecessors_of(&name)
                    .into_iter()
                    .map(|p| p.into_inner())
                    .collect(),
                idempotency: operator.idempotency().to_string(),
            })
        })
        .collect()
}

fn print_table(tasks: &[TaskInfo]) {
    let name_width = tasks.iter().map(|t| t.name.len()).max().unwrap_or(4).max(4);
    let op_width = tasks
        .iter()
        .map(|t| t.operator.len())
        .max()
        .unwrap_or(8)
        .max(8);
    let target_width = tasks
        .iter()
        .map(|t| t.target.as_ref().map(|s| s.len()).unwrap_or(1))
        .max()
        .unwrap_or(6)
        .max(6);

    println!(
        "{:<name_width$}  {:<op_width$}  {:<target_width$}  DEPENDS_ON",
        "NAME", "OPERATOR", "TARGET",
    );
    println!(
        "{:-<name_width$}  {:-<op_width$}  {:-<target_width$}  {}",
        "",
        "",
        "",
        "-".repeat(40),
    );

    for task in tasks {
        let deps = if task.depends_on.is_empty() {
            "-".to_string()
        } else {
            task.depends_on.join(", ")
        };
        println!(
            "{:<name_width$}  {:<op_width$}  {:<target_width$}  {}",
            task.name,
            task.operator,
            task.target.as_deref().unwrap_or("-"),
            deps,
        );
    }

    println!("\n{} tasks", tasks.len());
}
