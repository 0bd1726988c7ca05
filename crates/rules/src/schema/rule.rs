//! Rule definition as loaded from rule files.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::Evaluation;

/// A named compliance check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Rule {
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
    /// Restricts the rule to one data source. Untyped rules run everywhere.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceKind>,
    pub evaluation: Evaluation,
}

impl Rule {
    pub fn new(name: impl Into<String>, description: impl Into<String>, evaluation: Evaluation) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            recommendation: None,
            source: None,
            evaluation,
        }
    }

    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendation = Some(recommendation.into());
        self
    }

    pub fn for_source(mut self, source: SourceKind) -> Self {
        self.source = Some(source);
        self
    }

    /// Whether this rule should run against a target of the given kind.
    pub fn applies_to(&self, kind: SourceKind) -> bool {
        self.source.map_or(true, |s| s == kind)
    }
}

/// The three resource-data sources a rule can be evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    ResourceGraph,
    #[serde(rename = "ARM")]
    Arm,
    Terraform,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::ResourceGraph => write!(f, "ResourceGraph"),
            SourceKind::Arm => write!(f, "ARM"),
            SourceKind::Terraform => write!(f, "Terraform"),
        }
    }
}
