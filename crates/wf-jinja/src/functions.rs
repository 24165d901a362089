//! Template functions

use minijinja::value::Value;
use minijinja::{Error, ErrorKind};
use std::collections::{BTreeMap, HashMap};

/// Create the `var(name, default?)` function.
///
/// ```jinja
/// {{ var('region') }}
/// {{ var('schema', 'public') }}
/// ```
pub(crate) fn make_var_fn(
    vars: HashMap<String, Value>,
) -> impl Fn(&str, Option<Value>) -> Result<Value, Error> + Send + Sync + Clone + 'static {
    move |name: &str, default: Option<Value>| match (vars.get(name), default) {
        (Some(value), _) => Ok(value.clone()),
        (None, Some(default)) => Ok(default),
        (None, None) => Err(Error::new(
            ErrorKind::UndefinedError,
            format!("Variable '{}' is not defined and no default provided", name),
        )),
    }
}

/// Convert a manifest variable into a template value
pub(crate) fn yaml_to_value(yaml: &serde_yaml::Value) -> Value {
    match yaml {
        serde_yaml::Value::Null => Value::from(()),
        serde_yaml::Value::Bool(b) => Value::from(*b),
        serde_yaml::Value::Number(n) => convert_yaml_number(n),
        serde_yaml::Value::String(s) => Value::from(s.as_str()),
        serde_yaml::Value::Sequence(seq) => {
            Value::from(seq.iter().map(yaml_to_value).collect::<Vec<_>>())
        }
        serde_yaml::Value::Mapping(map) => {
            let entries: BTreeMap<String, Value> = map
                .iter()
                .filter_map(|(k, v)| k.as_str().map(|key| (key.to_string(), yaml_to_value(v))))
                .collect();
            Value::from_iter(entries)
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_value(&tagged.value),
    }
}

fn convert_yaml_number(n: &serde_yaml::Number) -> Value {
    if let Some(i) = n.as_i64() {
        return Value::from(i);
    }
    match n.as_f64() {
        Some(f) if f.is_finite() => Value::from(f),
        Some(f) => {
            log::warn!("YAML number {} is NaN or Infinity; rendering as none", f);
            Value::from(())
        }
        None => Value::from(()),
    }
}
