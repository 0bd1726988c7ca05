//! Resource graph seam and query helpers.

use async_trait::async_trait;
use azca_core::Resource;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, ScanError, TransportError};

/// Lists the resource groups that exist in a subscription.
pub const RESOURCE_GROUPS_QUERY: &str =
    "ResourceContainers | where type =~ 'microsoft.resources/subscriptions/resourcegroups' | project name";

/// Executes resource graph (KQL) queries.
///
/// Implemented over HTTP by the Azure client crate and by in-memory fakes
/// in tests.
#[async_trait]
pub trait ResourceGraph: Send + Sync {
    async fn query(
        &self,
        query: &str,
        subscription_ids: &[String],
    ) -> std::result::Result<GraphResponse, TransportError>;
}

/// Tabular query result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphResponse {
    pub columns: Vec<GraphColumn>,
    pub rows: Vec<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphColumn {
    pub name: String,
    #[serde(rename = "type", default)]
    pub column_type: Value,
}

impl GraphResponse {
    pub fn new(columns: &[&str], rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns: columns
                .iter()
                .map(|name| GraphColumn {
                    name: name.to_string(),
                    column_type: Value::String("string".to_string()),
                })
                .collect(),
            rows,
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Turn rows into objects keyed by column name.
    ///
    /// The `id` column is required; its absence is an error even when the
    /// query returned no rows.
    pub fn into_resources(self, rule: &str) -> Result<Vec<Resource>> {
        if self.column_index("id").is_none() {
            return Err(ScanError::MissingIdColumn {
                rule: rule.to_string(),
            });
        }

        let names: Vec<String> = self.columns.into_iter().map(|c| c.name).collect();
        Ok(self
            .rows
            .into_iter()
            .map(|row| {
                let object: Map<String, Value> = names.iter().cloned().zip(row).collect();
                Value::Object(object)
            })
            .collect())
    }

    /// Values of one column, as strings.
    pub fn column_strings(&self, name: &str) -> Vec<String> {
        let Some(index) = self.column_index(name) else {
            return Vec::new();
        };
        self.rows
            .iter()
            .filter_map(|row| row.get(index))
            .filter_map(|value| value.as_str().map(str::to_string))
            .collect()
    }
}

/// Restrict a KQL query to the given resource groups.
///
/// A `| where resourceGroup in~ (...)` clause is spliced in before the first
/// pipe. Queries without a pipe cannot be scoped.
pub fn scope_query_to_groups(query: &str, groups: &[String]) -> Result<String> {
    let Some(pipe) = query.find('|') else {
        return Err(ScanError::InvalidGraphQuery {
            query: query.to_string(),
        });
    };

    let (table, rest) = query.split_at(pipe);
    let formatted = groups
        .iter()
        .map(|g| format!("'{}'", g.replace('\'', "\\'")))
        .collect::<Vec<_>>()
        .join(", ");

    Ok(format!(
        "{} | where resourceGroup in~ ({}) {}",
        table.trim_end(),
        formatted,
        rest
    ))
}
