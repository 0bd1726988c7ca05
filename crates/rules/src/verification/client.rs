//! Per-resource live verification.

use std::collections::HashMap;
use std::pin::pin;
use std::sync::{Arc, Mutex, PoisonError};

use azca_core::{FailurePolicy, Resource};
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::error::{Result, ScanError};
use crate::evaluator::is_truthy;
use crate::identity::ResourceLocation;
use crate::schema::{RequestStep, StepQuery};
use crate::target::Target;

use super::{ApiResponse, ManagementApi, VersionExtractor};

/// Provider default api-version for one (provider, type), looked up once.
type DefaultVersion = Arc<OnceCell<Option<String>>>;

/// Confirms matched resources against the live management API.
///
/// Scoped to one rule execution; the default api-version cache lives and
/// dies with it. Concurrent candidates of the same type share one lookup.
pub struct VerificationClient<'a> {
    rule: &'a str,
    api: &'a dyn ManagementApi,
    versions: &'a dyn VersionExtractor,
    concurrency: usize,
    failure_policy: FailurePolicy,
    default_versions: Mutex<HashMap<(String, String), DefaultVersion>>,
}

impl<'a> VerificationClient<'a> {
    pub fn new(rule: &'a str, api: &'a dyn ManagementApi, versions: &'a dyn VersionExtractor) -> Self {
        Self {
            rule,
            api,
            versions,
            concurrency: 8,
            failure_policy: FailurePolicy::default(),
            default_versions: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    /// Run every step against one resource. Steps run in order and stop at
    /// the first that does not pass.
    pub async fn verify(&self, target: &Target, resource: &Resource, steps: &[RequestStep]) -> Result<bool> {
        let location = ResourceLocation::of(resource, target, self.rule)?;

        for step in steps {
            if !self.run_step(&location, step).await? {
                debug!(
                    rule = self.rule,
                    resource = %location.path,
                    operation = %step.operation,
                    "verification step did not pass"
                );
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Keep the candidates that pass every step, in input order.
    ///
    /// At most `concurrency` resources are verified at once. Under
    /// [`FailurePolicy::FailFast`] the first error is returned and pending
    /// verifications are dropped; under [`FailurePolicy::SkipResource`] the
    /// failing resource is logged and excluded.
    pub async fn verify_all(
        &self,
        target: &Target,
        candidates: Vec<Resource>,
        steps: &[RequestStep],
    ) -> Result<Vec<Resource>> {
        if candidates.is_empty() || steps.is_empty() {
            return Ok(candidates);
        }

        let mut outcomes = pin!(futures::stream::iter(candidates)
            .map(|candidate| async move {
                let outcome = self.verify(target, &candidate, steps).await;
                (candidate, outcome)
            })
            .buffered(self.concurrency));

        let mut kept = Vec::new();
        while let Some((candidate, outcome)) = outcomes.next().await {
            match outcome {
                Ok(true) => kept.push(candidate),
                Ok(false) => {}
                Err(e) => match self.failure_policy {
                    FailurePolicy::FailFast => return Err(e),
                    FailurePolicy::SkipResource => {
                        warn!(rule = self.rule, error = %e, "verification failed, skipping resource");
                    }
                },
            }
        }
        Ok(kept)
    }

    async fn run_step(&self, location: &ResourceLocation, step: &RequestStep) -> Result<bool> {
        let version = self.initial_version(location).await?;
        let mut url = self.request_url(location, step, &version);
        let mut response = self.api.send(step.http_method, &url).await?;

        if response.is_unsupported_api_version() {
            let message = response.error_message().unwrap_or_default();
            let Some(retry_version) = self.versions.supported_version(message) else {
                return Err(self.unresolved(
                    location,
                    format!("api-version '{version}' was rejected and no supported version could be read from: {message}"),
                ));
            };

            warn!(
                rule = self.rule,
                resource = %location.path,
                rejected = %version,
                retry = %retry_version,
                "api-version not supported, retrying"
            );
            url = self.request_url(location, step, &retry_version);
            response = self.api.send(step.http_method, &url).await?;

            if response.is_unsupported_api_version() {
                return Err(self.unresolved(
                    location,
                    format!("api-version '{retry_version}' was rejected as well"),
                ));
            }
        }

        if !response.is_success() {
            return Err(unexpected_status(step, url, response));
        }

        step_passes(&step.query, &response.body).map_err(|reason| ScanError::MalformedQuery {
            rule: self.rule.to_string(),
            query: String::from(step.query.clone()),
            reason,
        })
    }

    /// Provider default first, then the version declared on the resource.
    async fn initial_version(&self, location: &ResourceLocation) -> Result<String> {
        let key = (
            location.provider.to_lowercase(),
            location.resource_type.to_lowercase(),
        );
        let slot = self
            .default_versions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key)
            .or_default()
            .clone();

        let default = slot
            .get_or_try_init(|| {
                self.api.default_api_version(
                    &location.subscription_id,
                    &location.provider,
                    &location.resource_type,
                )
            })
            .await?
            .clone();

        default
            .or_else(|| location.declared_api_version.clone())
            .ok_or_else(|| {
                self.unresolved(
                    location,
                    "the provider declares no default api-version and the resource declares none".to_string(),
                )
            })
    }

    fn request_url(&self, location: &ResourceLocation, step: &RequestStep, version: &str) -> String {
        format!(
            "{}/{}/{}?api-version={}",
            self.api.endpoint().trim_end_matches('/'),
            location.path,
            step.operation.trim_matches('/'),
            version
        )
    }

    fn unresolved(&self, location: &ResourceLocation, reason: String) -> ScanError {
        ScanError::ApiVersionResolution {
            rule: self.rule.to_string(),
            resource_id: location.path.clone(),
            reason,
        }
    }
}

fn unexpected_status(step: &RequestStep, url: String, response: ApiResponse) -> ScanError {
    ScanError::UnexpectedStatus {
        method: step.http_method,
        url,
        status: response.status,
        body: response.body.to_string(),
    }
}

/// Judge a successful response body.
///
/// `exists` passes on a non-empty list, either the body itself or the
/// `value` array of a list envelope.
pub fn step_passes(query: &StepQuery, body: &Value) -> std::result::Result<bool, String> {
    match query {
        StepQuery::Exists => Ok(match body {
            Value::Array(items) => !items.is_empty(),
            Value::Object(object) => object
                .get("value")
                .and_then(Value::as_array)
                .is_some_and(|items| !items.is_empty()),
            _ => false,
        }),
        StepQuery::Filter(expression) => is_truthy(expression, body),
    }
}
