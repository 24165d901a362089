use super::*;
use chrono::{TimeZone, Utc};

fn ctx() -> RenderContext {
    RenderContext::new(
        "run-42",
        Utc.with_ymd_and_hms(2018, 11, 5, 7, 30, 0).unwrap(),
    )
}

#[test]
fn test_plain_text_is_untouched() {
    let env = TemplateEnvironment::default();
    let result = env.render("SELECT * FROM users", &ctx()).unwrap();
    assert_eq!(result, "SELECT * FROM users");
}

#[test]
fn test_render_partitioned_key() {
    let env = TemplateEnvironment::default();
    let result = env
        .render(
            "log_data/{{ logical_date.year }}/{{ logical_date.month }}/{{ ds }}-events.json",
            &ctx(),
        )
        .unwrap();
    assert_eq!(result, "log_data/2018/11/2018-11-05-events.json");
}

#[test]
fn test_month_and_day_are_unpadded() {
    let env = TemplateEnvironment::default();
    let result = env
        .render(
            "{{ logical_date.month }}/{{ logical_date.day }}/{{ logical_date.hour }}",
            &ctx(),
        )
        .unwrap();
    assert_eq!(result, "11/5/7");
}

#[test]
fn test_run_identity_placeholders() {
    let env = TemplateEnvironment::default();
    let result = env
        .render("{{ run_id }} {{ ds_nodash }} {{ ts }}", &ctx())
        .unwrap();
    assert_eq!(result, "run-42 20181105 2018-11-05T07:30:00+00:00");
}

#[test]
fn test_render_with_var() {
    let mut vars = HashMap::new();
    vars.insert(
        "region".to_string(),
        serde_yaml::Value::String("us-west-2".to_string()),
    );
    let env = TemplateEnvironment::new(&vars);
    let result = env.render("{{ var('region') }}", &ctx()).unwrap();
    assert_eq!(result, "us-west-2");
}

#[test]
fn test_render_with_var_default() {
    let env = TemplateEnvironment::default();
    let result = env
        .render("{{ var('schema', 'public') }}", &ctx())
        .unwrap();
    assert_eq!(result, "public");
}

#[test]
fn test_missing_var_is_unknown_variable() {
    let env = TemplateEnvironment::default();
    let err = env.render("{{ var('region') }}", &ctx()).unwrap_err();
    assert!(
        matches!(&err, JinjaError::UnknownVariable { name } if name == "region"),
        "unexpected error: {err}"
    );
}

#[test]
fn test_undefined_placeholder_is_an_error() {
    let env = TemplateEnvironment::default();
    let result = env.render("log_data/{{ logical_date.yaer }}", &ctx());
    assert!(result.is_err());
}

#[test]
fn test_is_template() {
    assert!(is_template("a/{{ ds }}"));
    assert!(is_template("{% if true %}x{% endif %}"));
    assert!(!is_template("song_data/A/B/C"));
}
