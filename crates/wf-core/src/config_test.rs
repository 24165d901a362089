use super::*;
use crate::operator::{ColumnMapping, SourceFormat};
use tempfile::tempdir;

const PIPELINE: &str = r#"
name: sparkify
description: Load and transform data in the warehouse
schedule: "@hourly"
workers: 2
retry:
  max_attempts: 2
  delay_secs: 60
  backoff: exponential
  max_delay_secs: 600
warehouse:
  type: duckdb
  path: ./warehouse.duckdb
vars:
  region: us-west-2
tasks:
  - name: create_staging_events
    operator: create_table
    table: staging_events
    sql: CREATE TABLE IF NOT EXISTS staging_events (artist VARCHAR)
  - name: stage_events
    depends_on: [create_staging_events]
    operator: stage_external_data
    table: staging_events
    source:
      bucket: udacity-dend
      key: "log_data/{{ logical_date.year }}/{{ logical_date.month }}"
      render_key: true
    format:
      type: json
      mapping:
        json_paths: s3://udacity-dend/log_json_path.json
    credentials: aws_credentials
    truncate: true
  - name: run_quality_checks
    depends_on: [stage_events]
    operator: validate_quality
    tables: [staging_events]
"#;

#[test]
fn test_parse_full_pipeline() {
    let config = PipelineConfig::from_yaml(PIPELINE).unwrap();
    assert_eq!(config.name, "sparkify");
    assert_eq!(config.schedule.as_deref(), Some("@hourly"));
    assert_eq!(config.workers, 2);
    assert_eq!(config.warehouse.path, "./warehouse.duckdb");
    assert_eq!(config.warehouse.pool_size, 4);
    assert_eq!(config.tasks.len(), 3);
    assert_eq!(config.tasks[1].depends_on, vec![TaskName::new("create_staging_events")]);
    assert!(config.get_var("region").is_some());

    let OperatorKind::StageExternalData(stage) = &config.tasks[1].operator else {
        panic!("expected staging task");
    };
    assert!(stage.source.render_key);
    assert_eq!(
        stage.format,
        SourceFormat::Json {
            mapping: ColumnMapping::JsonPaths("s3://udacity-dend/log_json_path.json".into())
        }
    );
}

#[test]
fn test_retry_policy_from_config() {
    let policy = PipelineConfig::from_yaml(PIPELINE).unwrap().retry_policy();
    assert_eq!(policy.max_attempts, 2);
    assert_eq!(policy.delay, Duration::from_secs(60));
    assert_eq!(policy.backoff, Backoff::Exponential);
    assert_eq!(policy.max_delay, Some(Duration::from_secs(600)));
}

#[test]
fn test_defaults() {
    let yaml = r#"
name: minimal
tasks:
  - name: ddl
    operator: create_table
    table: t
    sql: CREATE TABLE IF NOT EXISTS t (id INT)
"#;
    let config = PipelineConfig::from_yaml(yaml).unwrap();
    assert_eq!(config.workers, 4);
    assert_eq!(config.warehouse.path, ":memory:");
    assert_eq!(config.retry_policy(), RetryPolicy::default());
}

#[test]
fn test_build_graph_from_depends_on() {
    let graph = PipelineConfig::from_yaml(PIPELINE)
        .unwrap()
        .build_graph()
        .unwrap();
    assert_eq!(graph.roots(), vec![TaskName::new("create_staging_events")]);
    assert_eq!(
        graph.successors_of("stage_events"),
        vec![TaskName::new("run_quality_checks")]
    );
}

#[test]
fn test_unknown_dependency_is_dangling_edge() {
    let yaml = r#"
name: broken
tasks:
  - name: ddl
    depends_on: [nowhere]
    operator: create_table
    table: t
    sql: CREATE TABLE IF NOT EXISTS t (id INT)
"#;
    let err = PipelineConfig::from_yaml(yaml)
        .unwrap()
        .build_graph()
        .unwrap_err();
    assert!(matches!(err, CoreError::DanglingEdge { missing, .. } if missing == "nowhere"));
}

#[test]
fn test_rejects_zero_workers() {
    let yaml = r#"
name: p
workers: 0
tasks:
  - name: ddl
    operator: create_table
    table: t
    sql: CREATE TABLE IF NOT EXISTS t (id INT)
"#;
    assert!(matches!(
        PipelineConfig::from_yaml(yaml).unwrap_err(),
        CoreError::ConfigInvalid { .. }
    ));
}

#[test]
fn test_rejects_empty_task_list() {
    let err = PipelineConfig::from_yaml("name: p\ntasks: []").unwrap_err();
    assert!(err.to_string().contains("At least one task"));
}

#[test]
fn test_rejects_unknown_operator() {
    let yaml = r#"
name: p
tasks:
  - name: x
    operator: teleport
"#;
    assert!(matches!(
        PipelineConfig::from_yaml(yaml).unwrap_err(),
        CoreError::ConfigParseError { .. }
    ));
}

#[test]
fn test_load_from_dir() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("wharf.yaml"), PIPELINE).unwrap();
    let config = PipelineConfig::load_from_dir(dir.path()).unwrap();
    assert_eq!(config.name, "sparkify");
}

#[test]
fn test_load_missing_file() {
    let dir = tempdir().unwrap();
    let err = PipelineConfig::load(&dir.path().join("absent.yml")).unwrap_err();
    assert!(matches!(err, CoreError::ConfigNotFound { .. }));
    assert!(matches!(
        PipelineConfig::load_from_dir(dir.path()).unwrap_err(),
        CoreError::ConfigNotFound { .. }
    ));
}

#[test]
fn test_rejects_misspelled_operator_key() {
    let yaml = r#"
name: p
tasks:
  - name: load_users
    operator: load_dimension
    table: users
    select: SELECT 1
    truncte: false
"#;
    let err = PipelineConfig::from_yaml(yaml).unwrap_err();
    assert!(matches!(err, CoreError::ConfigParseError { .. }));
    let message = err.to_string();
    assert!(message.contains("load_users"), "{}", message);
    assert!(message.contains("truncte"), "{}", message);
}

#[test]
fn test_rejects_misspelled_source_key() {
    let yaml = r#"
name: p
tasks:
  - name: stage_events
    operator: stage_external_data
    table: staging_events
    source: { bucket: udacity-dend, key: log_data, render: true }
"#;
    let err = PipelineConfig::from_yaml(yaml).unwrap_err();
    assert!(err.to_string().contains("render"), "{}", err);
}

#[test]
fn test_task_without_name_is_rejected() {
    let yaml = r#"
name: p
tasks:
  - operator: create_table
    table: t
    sql: CREATE TABLE IF NOT EXISTS t (id INT)
"#;
    let err = PipelineConfig::from_yaml(yaml).unwrap_err();
    assert!(err.to_string().contains("`name`"), "{}", err);
}
