//! Integration tests that run the bundled rules in `data/rules/builtin.json`
//! against fixture templates, plans and a fake resource graph.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use azca_rules::loader::RuleLoader;
use azca_rules::schema::HttpMethod;
use azca_rules::target::{
    ArmTarget, GraphResponse, ResourceGraph, ResourceGraphTarget, TerraformTarget,
};
use azca_rules::verification::{ApiResponse, ManagementApi};
use azca_rules::{Rule, ScanResult, Scanner, Target, TransportError};
use serde_json::{json, Value};

const SUBSCRIPTION: &str = "0000-000-000-000";
const GROUP: &str = "aza-demo";

/// Resolve the built-in rules file relative to the workspace root.
fn builtin_rules() -> Vec<Rule> {
    let manifest = std::path::Path::new(env!("CARGO_MANIFEST_DIR"));
    let mut loader = RuleLoader::new(manifest.join("../../data/rules/builtin.json"));
    loader.load_all().expect("built-in rules load");
    loader.into_rules()
}

fn rule(name: &str) -> Rule {
    builtin_rules()
        .into_iter()
        .find(|r| r.name == name)
        .unwrap_or_else(|| panic!("missing built-in rule {name}"))
}

fn arm_id(resource_type: &str, name: &str) -> String {
    format!("subscriptions/{SUBSCRIPTION}/resourceGroups/{GROUP}/providers/{resource_type}/{name}")
}

fn exported_template() -> Value {
    json!({
        "$schema": "https://schema.management.azure.com/schemas/2019-04-01/deploymentTemplate.json#",
        "contentVersion": "1.0.0.0",
        "parameters": {},
        "variables": {},
        "resources": [
            {
                "type": "Microsoft.Storage/storageAccounts",
                "apiVersion": "2021-01-01",
                "name": "publicwithendpoint",
                "properties": { "networkAcls": { "bypass": "AzureServices", "ipRules": [], "defaultAction": "Allow" } }
            },
            {
                "type": "Microsoft.Storage/storageAccounts/privateEndpointConnections",
                "apiVersion": "2021-01-01",
                "name": "publicwithendpoint/endpoint1",
                "properties": {}
            },
            {
                "type": "Microsoft.Storage/storageAccounts",
                "apiVersion": "2021-01-01",
                "name": "publicnoendpoint",
                "properties": { "networkAcls": { "defaultAction": "Allow" } }
            },
            {
                "type": "Microsoft.EventHub/namespaces/networkRuleSets",
                "apiVersion": "2021-01-01-preview",
                "name": "misconfigRule1/default",
                "properties": { "defaultAction": "Deny", "ipRules": [], "virtualNetworkRules": [] }
            },
            {
                "type": "Microsoft.EventHub/namespaces/networkRuleSets",
                "apiVersion": "2021-01-01-preview",
                "name": "misconfigRule2/default",
                "properties": {
                    "defaultAction": "Allow",
                    "ipRules": [{ "ipMask": "10.0.0.1", "action": "Allow" }],
                    "virtualNetworkRules": []
                }
            },
            {
                "type": "Microsoft.EventHub/namespaces/networkRuleSets",
                "apiVersion": "2021-01-01-preview",
                "name": "lockedDown/default",
                "properties": {
                    "defaultAction": "Deny",
                    "ipRules": [{ "ipMask": "10.0.0.1", "action": "Allow" }],
                    "virtualNetworkRules": []
                }
            }
        ]
    })
}

fn arm_target() -> Target {
    Target::Arm(ArmTarget::from_template(&exported_template()).in_group(SUBSCRIPTION, GROUP))
}

async fn run(rule_name: &str, target: &Target) -> ScanResult {
    Scanner::new()
        .execute(&rule(rule_name), target)
        .await
        .unwrap_or_else(|e| panic!("{rule_name} failed: {e}"))
}

#[test]
fn builtin_rules_parse_and_are_unique() {
    let rules = builtin_rules();
    assert!(rules.len() >= 4);
    assert!(rules.iter().all(|r| r.source.is_some()));
}

#[tokio::test]
async fn accidental_public_storage() {
    let result = run("accidental-public-storage", &arm_target()).await;
    assert_eq!(result.total(), 1);
    assert_eq!(
        result.resource_ids(),
        [arm_id("Microsoft.Storage/storageAccounts", "publicwithendpoint")]
    );
}

#[tokio::test]
async fn event_hubs_without_rules() {
    let result = run("event-hubs-not-locked-down-1", &arm_target()).await;
    assert_eq!(
        result.resource_ids(),
        [arm_id("Microsoft.EventHub/namespaces/networkRuleSets", "misconfigRule1/default")]
    );
}

#[tokio::test]
async fn event_hubs_with_rules_but_open() {
    let result = run("event-hubs-not-locked-down-2", &arm_target()).await;
    assert_eq!(
        result.resource_ids(),
        [arm_id("Microsoft.EventHub/namespaces/networkRuleSets", "misconfigRule2/default")]
    );
}

#[tokio::test]
async fn terraform_public_storage() {
    let target = Target::Terraform(TerraformTarget::new(vec![
        json!({ "address": "azurerm_storage_account.default", "type": "azurerm_storage_account", "values": { "name": "a" } }),
        json!({ "address": "azurerm_storage_account.open", "type": "azurerm_storage_account", "values": { "public_network_access_enabled": true } }),
        json!({ "address": "azurerm_storage_account.closed", "type": "azurerm_storage_account", "values": { "public_network_access_enabled": false } }),
    ]));
    let result = run("terraform-public-storage", &target).await;
    assert_eq!(
        result.resource_ids(),
        ["azurerm_storage_account.default", "azurerm_storage_account.open"]
    );
}

#[tokio::test]
async fn scan_only_runs_rules_for_the_target_kind() {
    let outcomes = Scanner::new().scan(&builtin_rules(), &arm_target()).await;
    assert!(outcomes.iter().all(|o| o.result.is_ok()));
    assert!(outcomes
        .iter()
        .all(|o| rule(&o.rule_name).source == Some(azca_rules::SourceKind::Arm)));
}

// ── Resource graph ──────────────────────────────────────────────────

struct SitesGraph;

#[async_trait]
impl ResourceGraph for SitesGraph {
    async fn query(&self, _query: &str, _subscriptions: &[String]) -> Result<GraphResponse, TransportError> {
        let site = |name: &str| {
            vec![
                json!(format!("/subscriptions/{SUBSCRIPTION}/resourceGroups/{GROUP}/providers/Microsoft.Web/sites/{name}")),
                json!(name),
                json!("Microsoft.Web/sites"),
                json!("functionapp"),
            ]
        };
        Ok(GraphResponse::new(
            &["id", "name", "type", "kind"],
            vec![site("integrated-bad-dns"), site("integrated-ok"), site("not-integrated")],
        ))
    }
}

/// Serves site settings and VNet connections; the first lookup uses an
/// api-version the fake rejects, so every step exercises the retry.
struct SitesApi {
    calls: AtomicUsize,
}

#[async_trait]
impl ManagementApi for SitesApi {
    fn endpoint(&self) -> &str {
        "https://management.example"
    }

    async fn send(&self, method: HttpMethod, url: &str) -> Result<ApiResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if url.ends_with("api-version=2015-08-01") {
            return Ok(ApiResponse::new(
                400,
                json!({ "error": {
                    "code": "NoRegisteredProviderFound",
                    "message": "No registered resource provider found for location 'westus' and API version '2015-08-01' for type 'sites'. The supported api-versions are '2016-08-01, 2018-11-01, 2022-03-01'. The supported locations are 'westus'."
                } }),
            ));
        }
        assert!(url.ends_with("api-version=2022-03-01"), "unexpected retry url {url}");

        let body = if url.contains("/virtualNetworkConnections") {
            assert_eq!(method, HttpMethod::Get);
            if url.contains("sites/not-integrated/") {
                json!([])
            } else {
                json!([{ "name": "vnet1" }])
            }
        } else {
            assert_eq!(method, HttpMethod::Post);
            let dns = if url.contains("sites/integrated-ok/") { "168.63.129.16" } else { "10.1.0.4" };
            json!({ "properties": { "WEBSITE_DNS_SERVER": dns, "WEBSITE_VNET_ROUTE_ALL": "1" } })
        };
        Ok(ApiResponse::new(200, body))
    }

    async fn default_api_version(
        &self,
        _subscription_id: &str,
        _provider: &str,
        _resource_type: &str,
    ) -> Result<Option<String>, TransportError> {
        Ok(Some("2015-08-01".to_string()))
    }

    async fn export_template(&self, _subscription_id: &str, _group_name: &str) -> Result<Value, TransportError> {
        Ok(exported_template())
    }
}

#[tokio::test]
async fn function_app_vnet_integration_misconfiguration() {
    let api = Arc::new(SitesApi {
        calls: AtomicUsize::new(0),
    });
    let target = Target::ResourceGraph(ResourceGraphTarget::new(
        vec![SUBSCRIPTION.to_string()],
        Arc::new(SitesGraph),
        api.clone(),
    ));

    let result = run("function-app-vnet-integration-misconfiguration", &target).await;
    assert_eq!(
        result.resource_ids(),
        [format!(
            "/subscriptions/{SUBSCRIPTION}/resourceGroups/{GROUP}/providers/Microsoft.Web/sites/integrated-bad-dns"
        )]
    );
    // 3 connection checks + 2 settings checks, each rejected once then retried.
    assert_eq!(api.calls.load(Ordering::SeqCst), 10);
}

#[tokio::test]
async fn exported_group_scans_like_a_local_template() {
    let api: Arc<dyn ManagementApi> = Arc::new(SitesApi {
        calls: AtomicUsize::new(0),
    });
    let target = Target::Arm(ArmTarget::export(api, SUBSCRIPTION, GROUP).await.unwrap());
    let result = run("accidental-public-storage", &target).await;
    assert_eq!(result.total(), 1);
}
