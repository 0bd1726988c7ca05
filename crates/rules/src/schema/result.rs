//! Per-rule scan outcome.

use serde::Serialize;

use super::Rule;

/// Violating resources found by one rule.
///
/// `total` always equals `resource_ids.len()`; the fields are only set
/// through [`ScanResult::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    rule_name: String,
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    recommendation: Option<String>,
    total: usize,
    resource_ids: Vec<String>,
}

impl ScanResult {
    pub fn new(rule: &Rule, resource_ids: Vec<String>) -> Self {
        Self {
            rule_name: rule.name.clone(),
            description: rule.description.clone(),
            recommendation: rule.recommendation.clone(),
            total: resource_ids.len(),
            resource_ids,
        }
    }

    pub fn rule_name(&self) -> &str {
        &self.rule_name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn recommendation(&self) -> Option<&str> {
        self.recommendation.as_deref()
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn resource_ids(&self) -> &[String] {
        &self.resource_ids
    }

    /// A rule passes when it found nothing violating.
    pub fn passed(&self) -> bool {
        self.total == 0
    }
}
