//! Tests for schema types.

use super::*;

const STORAGE_RULE_JSON: &str = r#"
{
  "name": "accidental-public-storage",
  "description": "Storage account has a private endpoint but the public endpoint is still enabled",
  "recommendation": "https://docs.example.com/storage",
  "type": "ARM",
  "evaluation": {
    "query": "type == 'Microsoft.Storage/storageAccounts' && properties.networkAcls.defaultAction == 'Allow'",
    "and": [
      {
        "query": "type == 'Microsoft.Storage/storageAccounts/privateEndpointConnections' && starts_with(name, '{{parent.name}}/')"
      }
    ]
  }
}
"#;

const FUNCTION_APP_RULE_YAML: &str = r#"
name: function-app-vnet-integration-misconfiguration
description: Function app routes traffic through a VNet without the Azure DNS server
type: ResourceGraph
evaluation:
  query: "Resources | where type =~ 'Microsoft.Web/sites'"
  request:
    - operation: config/appsettings/list
      httpMethod: POST
      query: "properties.WEBSITE_DNS_SERVER != '168.63.129.16'"
    - operation: virtualNetworkConnections
      httpMethod: GET
      query: exists
"#;

#[test]
fn parse_conjunctive_rule() {
    let rule: Rule = serde_json::from_str(STORAGE_RULE_JSON).unwrap();

    assert_eq!(rule.name, "accidental-public-storage");
    assert_eq!(rule.source, Some(SourceKind::Arm));
    assert_eq!(rule.recommendation.as_deref(), Some("https://docs.example.com/storage"));
    assert!(matches!(rule.evaluation, Evaluation::WithAnd { .. }));
    assert_eq!(rule.evaluation.and().len(), 1);
    assert!(rule.evaluation.request().is_empty());
    assert_eq!(rule.evaluation.depth(), 2);
}

#[test]
fn parse_request_rule_from_yaml() {
    let rule: Rule = serde_yaml::from_str(FUNCTION_APP_RULE_YAML).unwrap();

    assert_eq!(rule.source, Some(SourceKind::ResourceGraph));
    let steps = rule.evaluation.request();
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0].operation, "config/appsettings/list");
    assert_eq!(steps[0].http_method, HttpMethod::Post);
    assert!(matches!(steps[0].query, StepQuery::Filter(_)));
    assert_eq!(steps[1].http_method, HttpMethod::Get);
    assert_eq!(steps[1].query, StepQuery::Exists);
}

#[test]
fn missing_http_method_defaults_to_post() {
    let step: RequestStep =
        serde_json::from_str(r#"{ "operation": "listKeys", "query": "keys" }"#).unwrap();
    assert_eq!(step.http_method, HttpMethod::Post);
}

#[test]
fn empty_lists_collapse_to_leaf() {
    let evaluation: Evaluation =
        serde_json::from_str(r#"{ "query": "type == 'A'", "and": [], "request": [] }"#).unwrap();
    assert_eq!(evaluation, Evaluation::leaf("type == 'A'"));
}

#[test]
fn nested_leaf_may_carry_request_steps() {
    let evaluation: Evaluation = serde_json::from_str(
        r#"{
            "query": "type == 'A'",
            "and": [
                { "query": "type == 'B'", "request": [{ "operation": "x", "httpMethod": "GET", "query": "exists" }] }
            ]
        }"#,
    )
    .unwrap();

    assert!(evaluation.request().is_empty());
    let child = &evaluation.and()[0];
    assert_eq!(child.query(), "type == 'B'");
    assert_eq!(child.request().len(), 1);
    assert!(child.and().is_empty());
}

#[test]
fn nested_request_with_children_is_rejected() {
    let err = serde_json::from_str::<Evaluation>(
        r#"{
            "query": "type == 'A'",
            "and": [
                {
                    "query": "type == 'B'",
                    "and": [{ "query": "type == 'C'" }],
                    "request": [{ "operation": "x", "query": "exists" }]
                }
            ]
        }"#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("only allowed on the root or on a leaf"));
}

#[test]
fn empty_query_is_rejected() {
    let err = serde_json::from_str::<Evaluation>(r#"{ "query": "  " }"#).unwrap_err();
    assert!(err.to_string().contains("must not be empty"));
}

#[test]
fn unknown_evaluation_field_is_rejected() {
    assert!(serde_json::from_str::<Evaluation>(r#"{ "query": "a", "or": [] }"#).is_err());
}

#[test]
fn evaluation_serializes_back_to_flat_form() {
    let evaluation = Evaluation::with_request(
        "type == 'A'",
        vec![Evaluation::leaf("type == 'B'")],
        vec![RequestStep::new("list", HttpMethod::Get, StepQuery::Exists)],
    );
    let json = serde_json::to_value(&evaluation).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "query": "type == 'A'",
            "and": [{ "query": "type == 'B'" }],
            "request": [{ "operation": "list", "httpMethod": "GET", "query": "exists" }]
        })
    );
}

#[test]
fn untyped_rule_applies_everywhere() {
    let rule = Rule::new("r", "d", Evaluation::leaf("a"));
    assert!(rule.applies_to(SourceKind::Arm));
    assert!(rule.applies_to(SourceKind::Terraform));

    let typed = rule.for_source(SourceKind::Terraform);
    assert!(typed.applies_to(SourceKind::Terraform));
    assert!(!typed.applies_to(SourceKind::ResourceGraph));
}

#[test]
fn scan_result_total_tracks_ids() {
    let rule = Rule::new("r", "d", Evaluation::leaf("a")).with_recommendation("fix it");
    let result = ScanResult::new(&rule, vec!["id1".to_string(), "id2".to_string()]);

    assert_eq!(result.total(), 2);
    assert!(!result.passed());
    assert_eq!(
        serde_json::to_value(&result).unwrap(),
        serde_json::json!({
            "ruleName": "r",
            "description": "d",
            "recommendation": "fix it",
            "total": 2,
            "resourceIds": ["id1", "id2"]
        })
    );

    let clean = ScanResult::new(&Rule::new("r", "d", Evaluation::leaf("a")), Vec::new());
    assert!(clean.passed());
    assert!(serde_json::to_value(&clean).unwrap().get("recommendation").is_none());
}
