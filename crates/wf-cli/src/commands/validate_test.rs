use super::*;

fn pipeline(tasks: &str) -> PipelineConfig {
    PipelineConfig::from_yaml(&format!("name: test\nvars:\n  region: us-west-2\ntasks:\n{}", tasks))
        .unwrap()
}

fn codes(ctx: &ValidationContext) -> Vec<&'static str> {
    ctx.issues.iter().map(|i| i.code).collect()
}

#[test]
fn test_unknown_template_variable_is_an_error() {
    let config = pipeline(
        r#"
  - name: load_users
    operator: load_dimension
    table: users
    select: "SELECT * FROM staging_events WHERE region = '{{ var('region') }}' AND day = '{{ missing_thing }}'"
"#,
    );
    let graph = config.build_graph().unwrap();
    let mut ctx = ValidationContext::default();
    validate_templates(&config, &graph, &mut ctx);

    assert_eq!(codes(&ctx), vec!["T001"]);
    assert!(ctx.issues[0].message.starts_with("select does not render"));
    assert_eq!(ctx.issues[0].task.as_ref().unwrap(), "load_users");
}

#[test]
fn test_unrendered_stage_key_is_not_checked() {
    let config = pipeline(
        r#"
  - name: stage_events
    operator: stage_external_data
    table: staging_events
    source: { scheme: file, bucket: data, key: "{{ not_rendered }}" }
"#,
    );
    let graph = config.build_graph().unwrap();
    let op = graph.operator("stage_events").unwrap();
    assert!(operator_templates(op).is_empty());
}

#[test]
fn test_remote_stage_without_credentials_warns() {
    let config = pipeline(
        r#"
  - name: stage_songs
    operator: stage_external_data
    table: staging_songs
    source: { bucket: udacity-dend, key: song_data }
  - name: stage_events
    operator: stage_external_data
    table: staging_events
    source: { bucket: udacity-dend, key: log_data }
    format: { type: json, mapping: { json_paths: "s3://udacity-dend/log_json_path.json" } }
    credentials: aws_credentials
"#,
    );
    let graph = config.build_graph().unwrap();
    let mut ctx = ValidationContext::default();
    validate_staging(&graph, &mut ctx);
    assert_eq!(codes(&ctx), vec!["S001"]);
    assert_eq!(ctx.issues[0].task.as_ref().unwrap(), "stage_songs");
    assert_eq!(ctx.count(Severity::Warning), 1);
}

#[test]
fn test_local_stage_with_credentials_is_an_error() {
    let config = pipeline(
        r#"
  - name: stage_songs
    operator: stage_external_data
    table: staging_songs
    source: { scheme: file, bucket: data, key: song_data }
    credentials: aws_credentials
"#,
    );
    let graph = config.build_graph().unwrap();
    let mut ctx = ValidationContext::default();
    validate_staging(&graph, &mut ctx);
    assert_eq!(codes(&ctx), vec!["S002"]);
    assert_eq!(ctx.count(Severity::Error), 1);
}

#[test]
fn test_fact_load_flagged_as_at_least_once() {
    let config = pipeline(
        r#"
  - name: load_songplays
    operator: load_fact
    table: songplays
    select: SELECT 1
  - name: load_songs
    operator: load_dimension
    table: songs
    select: SELECT 1
"#,
    );
    let graph = config.build_graph().unwrap();
    let mut ctx = ValidationContext::default();
    validate_rerun_safety(&graph, &mut ctx);

    assert_eq!(codes(&ctx), vec!["W001"]);
    assert_eq!(ctx.issues[0].task.as_ref().unwrap(), "load_songplays");
    assert!(ctx.issues[0].message.contains("at-least-once"));
}

#[test]
fn test_quality_gate_on_table_nobody_loads() {
    let config = pipeline(
        r#"
  - name: load_songs
    operator: load_dimension
    table: songs
    select: SELECT 1
  - name: load_artists
    operator: load_dimension
    table: artists
    select: SELECT 1
  - name: quality
    depends_on: [load_songs]
    operator: validate_quality
    tables: [songs, artists]
"#,
    );
    let graph = config.build_graph().unwrap();
    let mut ctx = ValidationContext::default();
    validate_quality_coverage(&graph, &mut ctx);

    assert_eq!(codes(&ctx), vec!["W002"]);
    assert!(ctx.issues[0].message.contains("'artists'"));
}

#[test]
fn test_strict_turns_warnings_into_failure() {
    let mut ctx = ValidationContext::default();
    ctx.warning("W001", "something", None);

    assert!(print_issues_and_summary(&ctx, false).is_ok());
    let err = print_issues_and_summary(&ctx, true).unwrap_err();
    assert_eq!(err.downcast_ref::<ExitCode>().unwrap().0, 1);
}

#[test]
fn test_issue_display() {
    let issue = ValidationIssue {
        severity: Severity::Error,
        code: "G001",
        message: "cycle".to_string(),
        task: Some(TaskName::new("a")),
    };
    assert_eq!(issue.to_string(), "[ERROR] G001: cycle (task 'a')");
}
