//! Rule execution against a target.
//!
//! For each applicable rule the scanner picks the evaluation path for the
//! target kind, runs live verification when the rule asks for it, and
//! resolves the surviving resources into identifiers. Rules run
//! concurrently and independently: one rule failing never aborts the rest.

use std::sync::Arc;

use azca_core::{FailurePolicy, Resource, ScanConfig};
use futures::StreamExt;
use tracing::{info, warn};

use crate::error::{Result, ScanError};
use crate::evaluator::RuleMatcher;
use crate::identity::resolve_id;
use crate::schema::{Rule, ScanResult};
use crate::target::Target;
use crate::verification::{SupportedVersionsMessage, VerificationClient, VersionExtractor};

/// Outcome of one rule in a scan.
#[derive(Debug)]
pub struct RuleOutcome {
    pub rule_name: String,
    pub result: Result<ScanResult>,
}

impl RuleOutcome {
    pub fn is_failure(&self) -> bool {
        match &self.result {
            Ok(result) => !result.passed(),
            Err(_) => true,
        }
    }
}

pub struct Scanner {
    rule_concurrency: usize,
    verification_concurrency: usize,
    failure_policy: FailurePolicy,
    versions: Arc<dyn VersionExtractor>,
}

impl Scanner {
    pub fn new() -> Self {
        Self::from_config(&ScanConfig::default())
    }

    pub fn from_config(config: &ScanConfig) -> Self {
        Self {
            rule_concurrency: config.rule_concurrency.max(1),
            verification_concurrency: config.verification_concurrency.max(1),
            failure_policy: config.failure_policy,
            versions: Arc::new(SupportedVersionsMessage),
        }
    }

    pub fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    pub fn with_version_extractor(mut self, versions: Arc<dyn VersionExtractor>) -> Self {
        self.versions = versions;
        self
    }

    /// Execute one rule against `target`.
    pub async fn execute(&self, rule: &Rule, target: &Target) -> Result<ScanResult> {
        let matcher = RuleMatcher::new(&rule.name);
        let evaluation = &rule.evaluation;

        let matched = match target {
            Target::ResourceGraph(graph) => {
                let rows = graph.fetch(&rule.name, evaluation.query()).await?;
                if evaluation.and().is_empty() {
                    rows
                } else {
                    matcher.retain_conjunctive(evaluation.and(), rows.clone(), &rows)?
                }
            }
            Target::Arm(arm) => matcher.evaluate(evaluation, &arm.resources, None)?,
            Target::Terraform(plan) => matcher.evaluate(evaluation, &plan.resources, None)?,
        };

        let survivors = self.verify(rule, target, matched).await?;
        let resource_ids: Vec<String> = survivors.iter().map(|r| resolve_id(r, target)).collect();

        info!(
            rule = %rule.name,
            target = %target.kind(),
            total = resource_ids.len(),
            "rule evaluated"
        );
        Ok(ScanResult::new(rule, resource_ids))
    }

    /// Execute every rule that applies to the target kind.
    ///
    /// Outcomes come back in rule order, one per applicable rule.
    pub async fn scan(&self, rules: &[Rule], target: &Target) -> Vec<RuleOutcome> {
        let kind = target.kind();
        let applicable: Vec<&Rule> = rules.iter().filter(|r| r.applies_to(kind)).collect();
        info!(
            target = %kind,
            rules = applicable.len(),
            skipped = rules.len() - applicable.len(),
            "starting scan"
        );

        futures::stream::iter(applicable)
            .map(|rule| async move {
                let result = self.execute(rule, target).await;
                if let Err(e) = &result {
                    warn!(rule = %rule.name, error = %e, "rule failed");
                }
                RuleOutcome {
                    rule_name: rule.name.clone(),
                    result,
                }
            })
            .buffered(self.rule_concurrency)
            .collect()
            .await
    }

    async fn verify(&self, rule: &Rule, target: &Target, matched: Vec<Resource>) -> Result<Vec<Resource>> {
        let steps = rule.evaluation.request();
        if steps.is_empty() || matched.is_empty() {
            return Ok(matched);
        }

        let Some(api) = target.management() else {
            return Err(ScanError::VerificationUnavailable {
                rule: rule.name.clone(),
                reason: format!("{} targets cannot run live verification requests", target.kind()),
            });
        };

        VerificationClient::new(&rule.name, api, self.versions.as_ref())
            .with_concurrency(self.verification_concurrency)
            .with_failure_policy(self.failure_policy)
            .verify_all(target, matched, steps)
            .await
    }
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new()
    }
}
