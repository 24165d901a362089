use super::*;
use wf_core::TableName;
use wf_db::DuckDbBackend;

async fn sparkify_db() -> DuckDbBackend {
    let db = DuckDbBackend::in_memory().unwrap();
    db.run(
        "CREATE TABLE artists (artistid VARCHAR, name VARCHAR);
         CREATE TABLE songs (songid VARCHAR, title VARCHAR);
         INSERT INTO songs VALUES ('S1', 'Uprising'), ('S2', 'Song 2');",
    )
    .await
    .unwrap();
    db
}

#[tokio::test]
async fn test_reports_only_the_empty_table() {
    let db = sparkify_db().await;
    let checks = vec![
        QualityCheck::new("SELECT COUNT(*) FROM artists", Predicate::GreaterThan(0.0)),
        QualityCheck::new("SELECT COUNT(*) FROM songs", Predicate::GreaterThan(0.0)),
    ];

    let runner = QualityRunner::new(&db);
    let (results, summary) = runner.run_all(&checks).await.unwrap();

    let failing: Vec<&str> = results
        .iter()
        .filter(|r| !r.passed)
        .map(|r| r.query.as_str())
        .collect();
    assert_eq!(failing, vec!["SELECT COUNT(*) FROM artists"]);
    assert_eq!(results[0].observed, Some(0.0));
    assert_eq!(results[1].observed, Some(2.0));
    assert_eq!(summary.total, 2);
    assert_eq!(summary.failed, 1);
    assert!(!summary.all_passed());
}

#[tokio::test]
async fn test_table_shorthand_passes() {
    let db = sparkify_db().await;
    let check = QualityCheck::table_not_empty(&TableName::new("songs"));

    let result = QualityRunner::new(&db).run_check(&check).await.unwrap();
    assert!(result.passed);
    assert_eq!(result.description, "songs has rows");
}

#[tokio::test]
async fn test_null_count_check() {
    let db = sparkify_db().await;
    db.run("INSERT INTO artists VALUES (NULL, 'Unknown')")
        .await
        .unwrap();
    let check = QualityCheck::new(
        "SELECT COUNT(*) FROM artists WHERE artistid IS NULL",
        Predicate::null_count_equals(0),
    );

    let result = QualityRunner::new(&db).run_check(&check).await.unwrap();
    assert!(!result.passed);
    assert_eq!(
        result.to_string(),
        "SELECT COUNT(*) FROM artists WHERE artistid IS NULL: expected == 0, got 1"
    );
}

#[tokio::test]
async fn test_zero_rows_is_a_failure() {
    let db = sparkify_db().await;
    let check = QualityCheck::new(
        "SELECT songid FROM songs WHERE false",
        Predicate::AtLeast(0.0),
    );

    let result = QualityRunner::new(&db).run_check(&check).await.unwrap();
    assert!(!result.passed);
    assert_eq!(result.error.as_deref(), Some("query returned no rows"));
}

#[tokio::test]
async fn test_non_numeric_result_is_a_failure() {
    let db = sparkify_db().await;
    let check = QualityCheck::new(
        "SELECT title FROM songs ORDER BY songid LIMIT 1",
        Predicate::GreaterThan(0.0),
    );

    let result = QualityRunner::new(&db).run_check(&check).await.unwrap();
    assert!(!result.passed);
    assert!(result.error.unwrap().contains("non-numeric"));
}

#[tokio::test]
async fn test_query_error_is_recorded_not_raised() {
    let db = sparkify_db().await;
    let checks = vec![
        QualityCheck::new("SELECT COUNT(*) FROM time", Predicate::GreaterThan(0.0)),
        QualityCheck::new("SELECT COUNT(*) FROM songs", Predicate::GreaterThan(0.0)),
    ];

    let (results, summary) = QualityRunner::new(&db).run_all(&checks).await.unwrap();
    assert!(results[0].error.is_some());
    assert!(results[1].passed);
    assert_eq!(summary.errors, 1);
    assert_eq!(summary.failed, 0);
}

#[test]
fn test_first_scalar() {
    assert_eq!(first_scalar(&[vec![wf_db::Value::Int(3)]]), Ok(3.0));
    assert!(first_scalar(&[]).is_err());
    assert_eq!(
        first_scalar(&[vec![]]),
        Err("query returned no columns".to_string())
    );
}
