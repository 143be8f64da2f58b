use super::SchemaError;
use serde_json::Value;

/// Marker that turns a template string into a parameter reference.
pub const PARAMS_PREFIX: &str = "$params.";

/// Deep-copy `template`, replacing every `$params.<a.b.c>` string with the value found at
/// that path in `params`.
pub(crate) fn populate_params(
    template: &Value,
    params: &Value,
    prefix: &str,
) -> Result<Value, SchemaError> {
    match template {
        Value::Object(fields) => {
            let mut populated = serde_json::Map::with_capacity(fields.len());
            for (key, value) in fields {
                populated.insert(key.clone(), populate_params(value, params, prefix)?);
            }
            Ok(Value::Object(populated))
        }
        Value::Array(items) => items
            .iter()
            .map(|item| populate_params(item, params, prefix))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::String(raw) => match raw.strip_prefix(prefix) {
            Some(path) => resolve_path(path, params).cloned(),
            None => Ok(template.clone()),
        },
        other => Ok(other.clone()),
    }
}

/// Descend `params` one dot-separated segment at a time.
fn resolve_path<'a>(path: &str, params: &'a Value) -> Result<&'a Value, SchemaError> {
    let not_found = || SchemaError::ParameterKeyNotFound {
        path: path.to_string(),
    };

    if path.is_empty() {
        return Err(not_found());
    }

    path.split('.').try_fold(params, |current, segment| {
        let next = match current {
            Value::Object(fields) => fields.get(segment),
            Value::Array(items) => segment
                .parse::<usize>()
                .ok()
                .and_then(|index| items.get(index)),
            _ => None,
        };
        next.ok_or_else(not_found)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_placeholders_are_substituted() {
        let template = json!({
            "rules": [{ "options": "$params.quantitative" }],
            "bucket": "$params.engine.PASS",
            "untouched": "params.engine.PASS",
            "count": 3
        });
        let params = json!({
            "quantitative": [{ "code": "scope_1_emissions" }],
            "engine": { "PASS": "PASS" }
        });

        let populated = populate_params(&template, &params, PARAMS_PREFIX).expect("populates");

        assert_eq!(populated["rules"][0]["options"][0]["code"], "scope_1_emissions");
        assert_eq!(populated["bucket"], "PASS");
        assert_eq!(populated["untouched"], "params.engine.PASS");
        assert_eq!(populated["count"], 3);
    }

    #[test]
    fn missing_segment_at_any_depth_fails() {
        let params = json!({ "engine": { "PASS": "PASS" } });

        for placeholder in [
            "$params.engine.NONE",
            "$params.missing",
            "$params.engine.PASS.x",
            "$params.",
        ] {
            let template = json!({ "bucket": placeholder });
            match populate_params(&template, &params, PARAMS_PREFIX) {
                Err(SchemaError::ParameterKeyNotFound { path }) => {
                    assert_eq!(format!("{PARAMS_PREFIX}{path}"), placeholder);
                }
                other => panic!("expected missing key for {placeholder}, got {other:?}"),
            }
        }
    }

    #[test]
    fn array_segments_index_into_lists() {
        let params = json!({ "pais": [{ "code": "a" }, { "code": "b" }] });
        let template = json!("$params.pais.1.code");

        let populated = populate_params(&template, &params, PARAMS_PREFIX).expect("populates");
        assert_eq!(populated, json!("b"));
    }
}
