//! Scan targets: where resource data comes from.
//!
//! - [`ResourceGraphTarget`]: live subscriptions queried with KQL.
//! - [`ArmTarget`]: the resources of an exported or local ARM template.
//! - [`TerraformTarget`]: the resources of a Terraform plan.

mod graph;
mod terraform;

use std::path::Path;
use std::sync::Arc;

use azca_core::Resource;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::schema::SourceKind;
use crate::verification::ManagementApi;

pub use graph::{
    scope_query_to_groups, GraphColumn, GraphResponse, ResourceGraph, RESOURCE_GROUPS_QUERY,
};
pub use terraform::{load_plan, parse_plan, PlanError};

/// A scan target. Immutable once built; shared across concurrently
/// executing rules.
pub enum Target {
    ResourceGraph(ResourceGraphTarget),
    Arm(ArmTarget),
    Terraform(TerraformTarget),
}

impl Target {
    pub fn kind(&self) -> SourceKind {
        match self {
            Target::ResourceGraph(_) => SourceKind::ResourceGraph,
            Target::Arm(_) => SourceKind::Arm,
            Target::Terraform(_) => SourceKind::Terraform,
        }
    }

    /// Management API used for live verification, if the target has one.
    pub fn management(&self) -> Option<&dyn ManagementApi> {
        match self {
            Target::ResourceGraph(t) => Some(t.management.as_ref()),
            Target::Arm(t) => t.management.as_deref(),
            Target::Terraform(_) => None,
        }
    }
}

// ── Resource graph ──────────────────────────────────────────────────

pub struct ResourceGraphTarget {
    pub subscription_ids: Vec<String>,
    /// Limits results to these groups. Only meaningful with a single subscription.
    pub group_names: Option<Vec<String>>,
    pub graph: Arc<dyn ResourceGraph>,
    pub management: Arc<dyn ManagementApi>,
}

impl ResourceGraphTarget {
    pub fn new(
        subscription_ids: Vec<String>,
        graph: Arc<dyn ResourceGraph>,
        management: Arc<dyn ManagementApi>,
    ) -> Self {
        Self {
            subscription_ids,
            group_names: None,
            graph,
            management,
        }
    }

    pub fn with_groups(mut self, group_names: Vec<String>) -> Self {
        self.group_names = if group_names.is_empty() {
            None
        } else {
            Some(group_names)
        };
        self
    }

    /// The query actually sent, with group scoping applied.
    pub fn scoped_query(&self, query: &str) -> Result<String> {
        match &self.group_names {
            Some(groups) => scope_query_to_groups(query, groups),
            None => Ok(query.to_string()),
        }
    }

    /// Run a rule's root query and return the rows as resources.
    pub async fn fetch(&self, rule: &str, query: &str) -> Result<Vec<Resource>> {
        let query = self.scoped_query(query)?;
        debug!(rule, query = %query, subscriptions = self.subscription_ids.len(), "querying resource graph");

        let response = self.graph.query(&query, &self.subscription_ids).await?;
        response.into_resources(rule)
    }

    /// Requested groups that do not exist in the first subscription.
    pub async fn missing_resource_groups(&self) -> std::result::Result<Vec<String>, TransportError> {
        let Some(groups) = &self.group_names else {
            return Ok(Vec::new());
        };
        let Some(subscription) = self.subscription_ids.first() else {
            return Ok(groups.clone());
        };

        let response = self
            .graph
            .query(RESOURCE_GROUPS_QUERY, std::slice::from_ref(subscription))
            .await?;
        let existing = response.column_strings("name");

        Ok(groups
            .iter()
            .filter(|g| !existing.iter().any(|e| e.eq_ignore_ascii_case(g)))
            .cloned()
            .collect())
    }
}

// ── ARM template ────────────────────────────────────────────────────

pub struct ArmTarget {
    pub resources: Vec<Resource>,
    pub subscription_id: Option<String>,
    pub group_name: Option<String>,
    pub management: Option<Arc<dyn ManagementApi>>,
}

impl ArmTarget {
    /// A template scanned offline: ids fall back to bare names and
    /// verification is unavailable.
    pub fn from_template(template: &Value) -> Self {
        Self {
            resources: template_resources(template),
            subscription_id: None,
            group_name: None,
            management: None,
        }
    }

    pub fn in_group(mut self, subscription_id: impl Into<String>, group_name: impl Into<String>) -> Self {
        self.subscription_id = Some(subscription_id.into());
        self.group_name = Some(group_name.into());
        self
    }

    pub fn with_management(mut self, management: Arc<dyn ManagementApi>) -> Self {
        self.management = Some(management);
        self
    }

    /// Export a live resource group and scan its template.
    pub async fn export(
        management: Arc<dyn ManagementApi>,
        subscription_id: &str,
        group_name: &str,
    ) -> std::result::Result<Self, TransportError> {
        let template = management.export_template(subscription_id, group_name).await?;
        let target = Self::from_template(&template)
            .in_group(subscription_id, group_name)
            .with_management(management);
        info!(
            subscription = subscription_id,
            group = group_name,
            resources = target.resources.len(),
            "exported resource group template"
        );
        Ok(target)
    }
}

/// The `resources` array of a template; a bare array is taken as-is.
pub fn template_resources(template: &Value) -> Vec<Resource> {
    match template {
        Value::Array(resources) => resources.clone(),
        _ => template
            .get("resources")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
    }
}

// ── Terraform ───────────────────────────────────────────────────────

pub struct TerraformTarget {
    pub resources: Vec<Resource>,
}

impl TerraformTarget {
    pub fn new(resources: Vec<Resource>) -> Self {
        Self { resources }
    }

    pub fn from_plan_file(path: &Path) -> std::result::Result<Self, PlanError> {
        load_plan(path).map(Self::new)
    }
}
