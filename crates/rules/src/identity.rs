//! Identifier resolution for matched resources.
//!
//! Every matched resource is reported by a canonical string that depends on
//! where it came from: graph rows carry their full `id`, template resources
//! get a subscription-scoped id built from `type` and `name`, and plan
//! resources are reported by their `address`.

use azca_core::{field_str, Resource};
use tracing::debug;

use crate::error::{Result, ScanError};
use crate::target::{ArmTarget, Target};

/// Canonical identifier of a matched resource.
pub fn resolve_id(resource: &Resource, target: &Target) -> String {
    match target {
        Target::ResourceGraph(_) => field_str(resource, "id").unwrap_or_default().to_string(),
        Target::Arm(arm) => arm_resource_id(resource, arm),
        Target::Terraform(_) => field_str(resource, "address")
            .or_else(|| field_str(resource, "name"))
            .unwrap_or_default()
            .to_string(),
    }
}

/// `subscriptions/{sub}/resourceGroups/{group}/providers/{type}/{name}`.
///
/// Falls back to the bare resource name when the target has no
/// subscription or group, or when the name is a template expression.
pub fn arm_resource_id(resource: &Resource, target: &ArmTarget) -> String {
    let name = field_str(resource, "name").unwrap_or_default();
    let resource_type = field_str(resource, "type").unwrap_or_default();

    match (&target.subscription_id, &target.group_name) {
        (Some(subscription), Some(group)) if !is_deployment_function(name) => format!(
            "subscriptions/{subscription}/resourceGroups/{group}/providers/{resource_type}/{name}"
        ),
        _ => {
            debug!(name, "no resolvable scope for template resource, reporting bare name");
            name.to_string()
        }
    }
}

/// Render a template resource as a `[resourceId(...)]` deployment function.
///
/// `someName/default` becomes `'someName', 'default'`; a bracketed
/// expression name is passed through with its brackets removed.
pub fn to_deployment_function_reference(resource: &Resource) -> String {
    let name = field_str(resource, "name").unwrap_or_default();
    let resource_type = field_str(resource, "type").unwrap_or_default();

    let path = if is_deployment_function(name) {
        name[1..name.len() - 1].to_string()
    } else {
        name.split('/')
            .map(|segment| format!("'{segment}'"))
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!("[resourceId('{resource_type}', {path})]")
}

/// Whether a template value is a deployment-time expression like `[parameters('x')]`.
///
/// A leading `[[` escapes a literal bracket and is not an expression.
pub fn is_deployment_function(value: &str) -> bool {
    value.len() >= 2 && value.starts_with('[') && value.ends_with(']') && !value.starts_with("[[")
}

// ── Resource ids ────────────────────────────────────────────────────

/// Components of a fully qualified resource id
/// `/subscriptions/{sub}/resourceGroups/{group}/providers/{provider}/{type}/{name}[/{type}/{name}]...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceIdParts {
    pub subscription_id: String,
    pub resource_group: String,
    pub provider: String,
    /// Type segments joined by `/`, without the provider (e.g. `namespaces/networkRuleSets`).
    pub resource_type: String,
    /// Name segments joined by `/`.
    pub name: String,
}

impl ResourceIdParts {
    pub fn parse(id: &str) -> Option<Self> {
        let segments: Vec<&str> = id.trim_matches('/').split('/').collect();
        if segments.len() < 8 || segments.iter().any(|s| s.is_empty()) {
            return None;
        }
        if !segments[0].eq_ignore_ascii_case("subscriptions")
            || !segments[2].eq_ignore_ascii_case("resourceGroups")
            || !segments[4].eq_ignore_ascii_case("providers")
        {
            return None;
        }

        let typed = &segments[6..];
        if typed.len() % 2 != 0 {
            return None;
        }
        let types: Vec<&str> = typed.iter().step_by(2).copied().collect();
        let names: Vec<&str> = typed.iter().skip(1).step_by(2).copied().collect();

        Some(Self {
            subscription_id: segments[1].to_string(),
            resource_group: segments[3].to_string(),
            provider: segments[5].to_string(),
            resource_type: types.join("/"),
            name: names.join("/"),
        })
    }
}

/// Where a candidate lives in the management API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLocation {
    /// Request path without a leading slash.
    pub path: String,
    pub subscription_id: String,
    pub provider: String,
    pub resource_type: String,
    /// `apiVersion` declared on a template resource.
    pub declared_api_version: Option<String>,
}

impl ResourceLocation {
    /// Locate a matched resource for live verification.
    pub fn of(resource: &Resource, target: &Target, rule: &str) -> Result<Self> {
        match target {
            Target::ResourceGraph(_) => {
                let id = field_str(resource, "id").unwrap_or_default();
                let parts = ResourceIdParts::parse(id).ok_or_else(|| invalid_id(rule, id))?;
                Ok(Self {
                    path: id.trim_matches('/').to_string(),
                    subscription_id: parts.subscription_id,
                    provider: parts.provider,
                    resource_type: parts.resource_type,
                    declared_api_version: field_str(resource, "apiVersion").map(str::to_string),
                })
            }
            Target::Arm(arm) => Self::of_template_resource(resource, arm, rule),
            Target::Terraform(_) => Err(ScanError::VerificationUnavailable {
                rule: rule.to_string(),
                reason: "live verification is not supported for Terraform plans".to_string(),
            }),
        }
    }

    /// Template resources name nested children as `parent/child` with type
    /// `ns/parentType/childType`; the request path interleaves the two.
    fn of_template_resource(resource: &Resource, arm: &ArmTarget, rule: &str) -> Result<Self> {
        let (Some(subscription), Some(group)) = (&arm.subscription_id, &arm.group_name) else {
            return Err(ScanError::VerificationUnavailable {
                rule: rule.to_string(),
                reason: "the template has no subscription and resource group to verify against"
                    .to_string(),
            });
        };

        let id = arm_resource_id(resource, arm);
        let full_type = field_str(resource, "type").unwrap_or_default();
        let name = field_str(resource, "name").unwrap_or_default();
        let Some((provider, resource_type)) = full_type.split_once('/') else {
            return Err(invalid_id(rule, &id));
        };

        let types: Vec<&str> = resource_type.split('/').collect();
        let names: Vec<&str> = name.split('/').collect();
        if is_deployment_function(name)
            || types.len() != names.len()
            || types.iter().chain(&names).any(|s| s.is_empty())
        {
            return Err(invalid_id(rule, &id));
        }

        let typed_path = types
            .iter()
            .zip(&names)
            .map(|(t, n)| format!("{t}/{n}"))
            .collect::<Vec<_>>()
            .join("/");

        Ok(Self {
            path: format!(
                "subscriptions/{subscription}/resourceGroups/{group}/providers/{provider}/{typed_path}"
            ),
            subscription_id: subscription.clone(),
            provider: provider.to_string(),
            resource_type: resource_type.to_string(),
            declared_api_version: field_str(resource, "apiVersion").map(str::to_string),
        })
    }
}

fn invalid_id(rule: &str, id: &str) -> ScanError {
    ScanError::InvalidResourceId {
        rule: rule.to_string(),
        id: id.to_string(),
    }
}
