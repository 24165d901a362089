use super::*;
use serial_test::serial;

#[test]
fn test_static_store_resolves_registered_entry() {
    let store =
        StaticCredentialStore::new().with("aws_credentials", Credentials::key_pair("AKIA", "s3cr3t"));
    assert_eq!(
        store.resolve("aws_credentials").unwrap(),
        Credentials::key_pair("AKIA", "s3cr3t")
    );
}

#[test]
fn test_static_store_missing_entry() {
    let err = StaticCredentialStore::new().resolve("nope").unwrap_err();
    assert!(matches!(err, CoreError::CredentialNotFound { ref name, .. } if name == "nope"));
}

#[test]
fn test_debug_hides_secrets() {
    let creds = Credentials::key_pair("AKIA", "s3cr3t");
    let rendered = format!("{:?}", creds);
    assert!(rendered.contains("AKIA"));
    assert!(!rendered.contains("s3cr3t"));

    let conn = Credentials::ConnectionString("postgres://u:p@host/db".to_string());
    assert!(!format!("{:?}", conn).contains("u:p"));
}

#[test]
#[serial]
fn test_env_store_key_pair() {
    std::env::set_var("WFTEST_AWS_CREDENTIALS_ACCESS_KEY_ID", "AKIA");
    std::env::set_var("WFTEST_AWS_CREDENTIALS_SECRET_ACCESS_KEY", "s3cr3t");
    std::env::remove_var("WFTEST_AWS_CREDENTIALS_SESSION_TOKEN");

    let store = EnvCredentialStore::with_prefix("WFTEST");
    let creds = store.resolve("aws-credentials").unwrap();
    assert_eq!(creds, Credentials::key_pair("AKIA", "s3cr3t"));

    std::env::remove_var("WFTEST_AWS_CREDENTIALS_ACCESS_KEY_ID");
    std::env::remove_var("WFTEST_AWS_CREDENTIALS_SECRET_ACCESS_KEY");
}

#[test]
#[serial]
fn test_env_store_half_configured_pair_is_an_error() {
    std::env::set_var("WFTEST_HALF_ACCESS_KEY_ID", "AKIA");
    std::env::remove_var("WFTEST_HALF_SECRET_ACCESS_KEY");

    let err = EnvCredentialStore::with_prefix("WFTEST")
        .resolve("half")
        .unwrap_err();
    assert!(err.to_string().contains("WFTEST_HALF_SECRET_ACCESS_KEY"));

    std::env::remove_var("WFTEST_HALF_ACCESS_KEY_ID");
}

#[test]
#[serial]
fn test_env_store_connection_string() {
    std::env::set_var("WFTEST_WAREHOUSE_CONNECTION_STRING", "host=localhost");
    let creds = EnvCredentialStore::with_prefix("WFTEST")
        .resolve("warehouse")
        .unwrap();
    assert_eq!(creds, Credentials::ConnectionString("host=localhost".to_string()));
    std::env::remove_var("WFTEST_WAREHOUSE_CONNECTION_STRING");
}
