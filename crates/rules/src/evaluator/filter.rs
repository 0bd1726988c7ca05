//! JMESPath evaluation over resource collections and response bodies.
//!
//! jmespath values are reference counted and not `Send`, so everything here
//! is synchronous and converts back to `serde_json::Value` before returning.

use azca_core::Resource;
use serde_json::Value;

use super::render::normalize_legacy_literals;

/// Run a rendered collection filter and return the selected resources.
pub(crate) fn select(filter: &str, resources: &[Resource]) -> Result<Vec<Resource>, String> {
    let expr = jmespath::compile(filter).map_err(|e| e.to_string())?;
    let found = expr.search(resources).map_err(|e| e.to_string())?;

    match serde_json::to_value(&*found).map_err(|e| e.to_string())? {
        Value::Array(items) => Ok(items),
        Value::Null => Ok(Vec::new()),
        other => Err(format!("expected a list of resources, got {}", kind_of(&other))),
    }
}

/// Whether `expression` evaluates to a truthy value on `body`.
pub fn is_truthy(expression: &str, body: &Value) -> Result<bool, String> {
    let expr = jmespath::compile(&normalize_legacy_literals(expression)).map_err(|e| e.to_string())?;
    let found = expr.search(body).map_err(|e| e.to_string())?;
    Ok(found.is_truthy())
}

/// Check that a rendered expression compiles.
pub(crate) fn compile_check(filter: &str) -> Result<(), String> {
    jmespath::compile(filter).map(|_| ()).map_err(|e| e.to_string())
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn select_returns_matching_resources() {
        let resources = vec![
            json!({ "type": "A", "name": "one" }),
            json!({ "type": "B", "name": "two" }),
            json!({ "type": "A", "name": "three" }),
        ];
        let selected = select("[?type == 'A']", &resources).unwrap();
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0]["name"], "one");
        assert_eq!(selected[1]["name"], "three");
    }

    #[test]
    fn select_rejects_non_list_results() {
        let resources = vec![json!({ "type": "A" })];
        let err = select("length(@)", &resources).unwrap_err();
        assert!(err.contains("a number"));
    }

    #[test]
    fn select_reports_compile_errors() {
        assert!(select("[?type == ", &[]).is_err());
    }

    #[test]
    fn truthiness_follows_jmespath() {
        let body = json!({ "value": [], "enabled": true, "name": "" });
        assert!(is_truthy("enabled", &body).unwrap());
        assert!(!is_truthy("value", &body).unwrap());
        assert!(!is_truthy("name", &body).unwrap());
        assert!(!is_truthy("missing", &body).unwrap());
        assert!(is_truthy("name == ''", &body).unwrap());
    }

    #[test]
    fn truthiness_accepts_legacy_literals() {
        let body = json!({ "kind": "functionapp" });
        assert!(is_truthy("kind == `functionapp`", &body).unwrap());
    }
}
