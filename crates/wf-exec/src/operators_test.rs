use super::*;
use crate::test_utils::{CallKind, StubWarehouse};
use chrono::{TimeZone, Utc};
use wf_core::{
    Credentials, Predicate, Retryable, SourceLocation, StorageScheme, TableName,
};
use wf_db::{DuckDbBackend, Value};

fn ctx() -> RunContext {
    RunContext::new(
        "run-1",
        Utc.with_ymd_and_hms(2018, 11, 1, 0, 0, 0).unwrap(),
    )
}

async fn count(db: &DuckDbBackend, table: &str) -> Value {
    let rows = db
        .query(&format!("SELECT COUNT(*) FROM {}", table))
        .await
        .unwrap();
    rows[0][0].clone()
}

async fn sparkify_db() -> DuckDbBackend {
    let db = DuckDbBackend::in_memory().unwrap();
    db.run(
        "CREATE TABLE staging_songs (song_id VARCHAR, title VARCHAR, artist_id VARCHAR, year INT, duration DOUBLE);
         CREATE TABLE songs (songid VARCHAR, title VARCHAR, artistid VARCHAR, year INT, duration DOUBLE);
         CREATE TABLE artists (artistid VARCHAR, name VARCHAR);
         INSERT INTO staging_songs VALUES
            ('S1', 'Uprising', 'A1', 2009, 305.2),
            ('S2', 'Song 2', 'A2', 1997, 121.9),
            ('S2', 'Song 2', 'A2', 1997, 121.9);",
    )
    .await
    .unwrap();
    db
}

fn songs_dimension() -> Operator {
    Operator::load_dimension(
        "load_song_dim",
        LoadDimensionSpec::new(
            TableName::new("songs"),
            vec![
                "songid".into(),
                "title".into(),
                "artistid".into(),
                "year".into(),
                "duration".into(),
            ],
            "SELECT DISTINCT song_id, title, artist_id, year, duration FROM staging_songs",
        ),
    )
}

#[tokio::test]
async fn test_create_table_is_rerunnable() {
    let db = DuckDbBackend::in_memory().unwrap();
    let op = Operator::create_table(
        "create_users",
        "users",
        "CREATE TABLE IF NOT EXISTS users (userid INT, level VARCHAR)",
    );
    op.execute(&db, &ctx()).await.unwrap();
    op.execute(&db, &ctx()).await.unwrap();
    assert_eq!(count(&db, "users").await, Value::Int(0));
}

#[tokio::test]
async fn test_create_table_failure() {
    let db = DuckDbBackend::in_memory().unwrap();
    let op = Operator::create_table("bad_ddl", "t", "CREATE TABL t (id INT)");
    let err = op.execute(&db, &ctx()).await.unwrap_err();
    assert!(matches!(err, OperatorError::CreateTable { .. }));
    assert!(!err.is_transient());
    assert_eq!(err.task(), "bad_ddl");
}

#[tokio::test]
async fn test_load_dimension_is_idempotent() {
    let db = sparkify_db().await;
    let op = songs_dimension();

    op.execute(&db, &ctx()).await.unwrap();
    let first = db
        .query("SELECT songid, title FROM songs ORDER BY songid")
        .await
        .unwrap();
    op.execute(&db, &ctx()).await.unwrap();
    let second = db
        .query("SELECT songid, title FROM songs ORDER BY songid")
        .await
        .unwrap();

    assert_eq!(first.len(), 2);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_load_dimension_append_mode() {
    let db = sparkify_db().await;
    let Operator { name, kind } = songs_dimension();
    let OperatorKind::LoadDimension(spec) = kind else {
        panic!("expected dimension");
    };
    let op = Operator::load_dimension(name.as_str(), spec.truncate(false));

    op.execute(&db, &ctx()).await.unwrap();
    op.execute(&db, &ctx()).await.unwrap();
    assert_eq!(count(&db, "songs").await, Value::Int(4));
}

#[tokio::test]
async fn test_load_fact_appends() {
    let db = sparkify_db().await;
    db.run("CREATE TABLE songplays (songid VARCHAR, run_day VARCHAR)")
        .await
        .unwrap();
    let op = Operator::load_fact(
        "load_songplays",
        "songplays",
        &["songid", "run_day"],
        "SELECT song_id, '{{ ds }}' FROM staging_songs WHERE song_id = 'S1';",
    );

    op.execute(&db, &ctx()).await.unwrap();
    op.execute(&db, &ctx()).await.unwrap();

    assert_eq!(count(&db, "songplays").await, Value::Int(2));
    let rows = db.query("SELECT DISTINCT run_day FROM songplays").await.unwrap();
    assert_eq!(rows, vec![vec![Value::Text("2018-11-01".to_string())]]);
}

#[tokio::test]
async fn test_stage_renders_key_and_loads() {
    let dir = tempfile::tempdir().unwrap();
    let partition = dir.path().join("log_data/2018/11");
    std::fs::create_dir_all(&partition).unwrap();
    std::fs::write(
        partition.join("2018-11-01-events.json"),
        "{\"artist\": \"Muse\", \"song\": \"Uprising\"}\n{\"artist\": \"Blur\", \"song\": \"Song 2\"}\n",
    )
    .unwrap();

    let db = DuckDbBackend::in_memory().unwrap();
    db.run("CREATE TABLE staging_events (artist VARCHAR, song VARCHAR)")
        .await
        .unwrap();

    let op = Operator::stage(
        "stage_events",
        StageSpec::new(
            TableName::new("staging_events"),
            SourceLocation::new(
                StorageScheme::File,
                dir.path().display().to_string(),
                "log_data/{{ logical_date.year }}/{{ logical_date.month }}/*.json",
            )
            .rendered(),
        )
        .truncate(true),
    );

    op.execute(&db, &ctx()).await.unwrap();
    op.execute(&db, &ctx()).await.unwrap();
    assert_eq!(count(&db, "staging_events").await, Value::Int(2));
}

#[test]
fn test_source_uri_verbatim_without_render_flag() {
    let spec = StageSpec::new(
        TableName::new("staging_songs"),
        SourceLocation::s3("udacity-dend", "song_data/{{ ds }}"),
    );
    assert_eq!(
        source_uri("stage_songs", &spec, &ctx()).unwrap(),
        "s3://udacity-dend/song_data/{{ ds }}"
    );
}

#[tokio::test]
async fn test_stage_passes_resolved_credentials() {
    let stub = StubWarehouse::new();
    let op = Operator::stage(
        "stage_events",
        StageSpec::new(
            TableName::new("staging_events"),
            SourceLocation::s3("udacity-dend", "log_data/{{ logical_date.year }}").rendered(),
        )
        .credentials("aws_credentials"),
    );
    let ctx = ctx().with_credentials("aws_credentials", Credentials::key_pair("AKIA", "s"));

    op.execute(&stub, &ctx).await.unwrap();
    let calls = stub.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].kind, CallKind::BulkLoad);
    assert_eq!(calls[0].text, "s3://udacity-dend/log_data/2018");
}

#[tokio::test]
async fn test_stage_without_resolved_credentials() {
    let stub = StubWarehouse::new();
    let op = Operator::stage(
        "stage_events",
        StageSpec::new(
            TableName::new("staging_events"),
            SourceLocation::s3("udacity-dend", "log_data"),
        )
        .credentials("aws_credentials"),
    );

    let err = op.execute(&stub, &ctx()).await.unwrap_err();
    assert!(matches!(err, OperatorError::Credentials { .. }));
    assert!(stub.calls().is_empty());
}

#[tokio::test]
async fn test_stage_failure_keeps_gateway_classification() {
    let stub = StubWarehouse::new().fail_transient("log_data");
    let op = Operator::stage(
        "stage_events",
        StageSpec::new(
            TableName::new("staging_events"),
            SourceLocation::s3("udacity-dend", "log_data"),
        ),
    );

    let err = op.execute(&stub, &ctx()).await.unwrap_err();
    assert!(matches!(err, OperatorError::Staging { .. }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_template_error_is_permanent() {
    let stub = StubWarehouse::new();
    let op = Operator::load_fact(
        "load_songplays",
        "songplays",
        &[],
        "SELECT * FROM staging_events WHERE day = '{{ logical_day }}'",
    );

    let err = op.execute(&stub, &ctx()).await.unwrap_err();
    assert!(matches!(err, OperatorError::Template { .. }));
    assert!(!err.is_transient());
    assert!(stub.calls().is_empty());
}

#[tokio::test]
async fn test_quality_gate_reports_only_failing_checks() {
    let db = sparkify_db().await;
    db.run("INSERT INTO songs VALUES ('S1', 'Uprising', 'A1', 2009, 305.2)")
        .await
        .unwrap();
    let op = Operator::validate_quality(
        "run_quality_checks",
        ValidateQualitySpec::new()
            .check("SELECT COUNT(*) FROM artists", Predicate::GreaterThan(0.0))
            .check("SELECT COUNT(*) FROM songs", Predicate::GreaterThan(0.0)),
    );

    let err = op.execute(&db, &ctx()).await.unwrap_err();
    let OperatorError::QualityCheck {
        total, failures, ..
    } = &err
    else {
        panic!("expected quality failure, got {err}");
    };
    assert_eq!(*total, 2);
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].query, "SELECT COUNT(*) FROM artists");
    assert!(!err.is_transient());
    assert!(err.to_string().contains("1 of 2 quality checks failed"));
}

#[tokio::test]
async fn test_quality_gate_table_shorthand_passes() {
    let db = sparkify_db().await;
    let op = Operator::validate_quality(
        "run_quality_checks",
        ValidateQualitySpec::new().table(TableName::new("staging_songs")),
    );
    op.execute(&db, &ctx()).await.unwrap();
}

#[tokio::test]
async fn test_quality_gate_transient_error_is_gateway() {
    let stub = StubWarehouse::new().fail_transient("artists");
    let op = Operator::validate_quality(
        "run_quality_checks",
        ValidateQualitySpec::new().table(TableName::new("artists")),
    );

    let err = op.execute(&stub, &ctx()).await.unwrap_err();
    assert!(matches!(err, OperatorError::Gateway { .. }));
    assert!(err.is_transient());
}

#[test]
fn test_dimension_statement() {
    let spec = LoadDimensionSpec::new(
        TableName::new("users"),
        vec!["userid".into(), "level".into()],
        "SELECT userid, level FROM staging_events",
    );
    assert_eq!(
        dimension_statement(&spec, "SELECT userid, level FROM staging_events"),
        "TRUNCATE TABLE \"users\";\nINSERT INTO \"users\" (\"userid\", \"level\")\nSELECT userid, level FROM staging_events;"
    );
    assert_eq!(
        dimension_statement(&spec.clone().truncate(false), "SELECT 1"),
        "INSERT INTO \"users\" (\"userid\", \"level\")\nSELECT 1"
    );
}
