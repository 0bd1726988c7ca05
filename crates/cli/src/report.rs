//! Machine-readable scan report for `--output json`.

use azca_rules::{RuleOutcome, ScanResult, SourceKind};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::terminal::Summary;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport<'a> {
    pub generated_at: DateTime<Utc>,
    pub target: SourceKind,
    pub passing: usize,
    pub failing: usize,
    pub results: Vec<&'a ScanResult>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<RuleFailure<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleFailure<'a> {
    pub rule_name: &'a str,
    pub error: String,
}

impl<'a> ScanReport<'a> {
    pub fn new(target: SourceKind, outcomes: &'a [RuleOutcome]) -> Self {
        let summary = Summary::of(outcomes);
        let mut results = Vec::new();
        let mut errors = Vec::new();
        for outcome in outcomes {
            match &outcome.result {
                Ok(result) => results.push(result),
                Err(e) => errors.push(RuleFailure {
                    rule_name: &outcome.rule_name,
                    error: e.to_string(),
                }),
            }
        }

        Self {
            generated_at: Utc::now(),
            target,
            passing: summary.passing,
            failing: summary.failing,
            results,
            errors,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
