//! Resource records as handed over by the data sources.

/// One cloud object: an opaque JSON record.
///
/// Template and graph resources carry `type` and `name` (plus an optional
/// `apiVersion`), graph rows carry `id`, plan resources carry `address`.
pub type Resource = serde_json::Value;

/// Read a top-level string field from a resource.
pub fn field_str<'a>(resource: &'a Resource, field: &str) -> Option<&'a str> {
    resource.get(field).and_then(|v| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_string_fields_only() {
        let r = json!({ "name": "sa1", "count": 3 });
        assert_eq!(field_str(&r, "name"), Some("sa1"));
        assert_eq!(field_str(&r, "count"), None);
        assert_eq!(field_str(&r, "missing"), None);
    }
}
