//! Resource manager client: verification calls, provider metadata and
//! resource group template export.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use azca_core::AzureConfig;
use azca_rules::schema::HttpMethod;
use azca_rules::verification::{ApiResponse, ManagementApi};
use azca_rules::TransportError;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION, RETRY_AFTER};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::credential::TokenCredential;
use crate::http::{build_client, decode_body, transport_error};

/// Upper bound on export status polls.
const MAX_EXPORT_POLLS: usize = 60;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
const MAX_POLL_INTERVAL_SECS: u64 = 30;

/// [`ManagementApi`] over HTTPS.
pub struct ManagementClient {
    endpoint: String,
    provider_api_version: String,
    template_api_version: String,
    timeout_secs: u64,
    credential: Arc<dyn TokenCredential>,
    http: reqwest::Client,
}

impl ManagementClient {
    pub fn new(config: &AzureConfig, credential: Arc<dyn TokenCredential>) -> Result<Self, TransportError> {
        Ok(Self {
            endpoint: config.management_endpoint.trim_end_matches('/').to_string(),
            provider_api_version: config.provider_api_version.clone(),
            template_api_version: config.template_api_version.clone(),
            timeout_secs: config.request_timeout_secs,
            credential,
            http: build_client(config.request_timeout_secs)?,
        })
    }

    async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<reqwest::Response, TransportError> {
        let token = self.credential.token().await?;
        let mut request = self
            .http
            .request(method.clone(), url)
            .bearer_auth(token)
            .header(CONTENT_TYPE, "application/json");

        request = match body {
            Some(body) => request.json(body),
            None if method == Method::POST => request.header(CONTENT_LENGTH, 0),
            None => request,
        };

        request
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout_secs))
    }

    async fn read(&self, response: reqwest::Response) -> Result<ApiResponse, TransportError> {
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| transport_error(e, self.timeout_secs))?;
        Ok(ApiResponse::new(status, decode_body(&text)))
    }

    async fn poll_export(&self, mut location: String, mut wait: Duration) -> Result<Value, TransportError> {
        for attempt in 1..=MAX_EXPORT_POLLS {
            tokio::time::sleep(wait).await;
            debug!(attempt, "polling template export");

            let response = self.request(Method::GET, &location, None).await?;
            let status = response.status();
            if status == StatusCode::ACCEPTED {
                wait = retry_after(response.headers());
                if let Some(next) = header_str(response.headers(), LOCATION) {
                    location = next;
                }
                continue;
            }

            let response = self.read(response).await?;
            if !response.is_success() {
                return Err(status_error("template export", &response));
            }
            return extract_template(response.body);
        }

        Err(TransportError::Timeout(
            MAX_EXPORT_POLLS as u64 * wait.as_secs().max(1),
        ))
    }
}

#[async_trait]
impl ManagementApi for ManagementClient {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send(&self, method: HttpMethod, url: &str) -> Result<ApiResponse, TransportError> {
        let method = match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
        };
        debug!(%method, url, "management request");
        let response = self.request(method, url, None).await?;
        self.read(response).await
    }

    async fn default_api_version(
        &self,
        subscription_id: &str,
        provider: &str,
        resource_type: &str,
    ) -> Result<Option<String>, TransportError> {
        let url = format!(
            "{}/subscriptions/{}/providers/{}?api-version={}",
            self.endpoint, subscription_id, provider, self.provider_api_version
        );
        let response = self.request(Method::GET, &url, None).await?;
        let response = self.read(response).await?;
        if !response.is_success() {
            return Err(status_error(&format!("provider lookup for {provider}"), &response));
        }

        let info: ProviderInfo = serde_json::from_value(response.body)
            .map_err(|e| TransportError::Decode(format!("provider metadata for {provider}: {e}")))?;
        let version = info.default_version(resource_type);
        debug!(provider, resource_type, version = ?version, "resolved provider default api-version");
        Ok(version)
    }

    async fn export_template(&self, subscription_id: &str, group_name: &str) -> Result<Value, TransportError> {
        let url = format!(
            "{}/subscriptions/{}/resourcegroups/{}/exportTemplate?api-version={}",
            self.endpoint, subscription_id, group_name, self.template_api_version
        );
        let body = json!({
            "resources": ["*"],
            "options": "SkipAllParameterization",
        });

        info!(subscription = subscription_id, group = group_name, "exporting resource group template");
        let response = self.request(Method::POST, &url, Some(&body)).await?;

        if response.status() == StatusCode::ACCEPTED {
            let wait = retry_after(response.headers());
            let Some(location) = header_str(response.headers(), LOCATION) else {
                return Err(TransportError::Decode(
                    "template export accepted without a Location header".to_string(),
                ));
            };
            return self.poll_export(location, wait).await;
        }

        let response = self.read(response).await?;
        if !response.is_success() {
            return Err(status_error("template export", &response));
        }
        extract_template(response.body)
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ProviderInfo {
    #[serde(rename = "resourceTypes", default)]
    resource_types: Vec<ProviderResourceType>,
}

#[derive(Debug, Deserialize)]
struct ProviderResourceType {
    #[serde(rename = "resourceType")]
    resource_type: String,
    #[serde(rename = "defaultApiVersion")]
    default_api_version: Option<String>,
}

impl ProviderInfo {
    fn default_version(&self, resource_type: &str) -> Option<String> {
        self.resource_types
            .iter()
            .find(|t| t.resource_type.eq_ignore_ascii_case(resource_type))
            .and_then(|t| t.default_api_version.clone())
    }
}

fn extract_template(mut body: Value) -> Result<Value, TransportError> {
    if let Some(error) = body.get("error").filter(|e| !e.is_null()) {
        warn!(error = %error, "template export reported errors for some resources");
    }
    match body.get_mut("template").map(Value::take) {
        Some(template) if template.is_object() => Ok(template),
        _ => Err(TransportError::Decode(
            "template export response has no template".to_string(),
        )),
    }
}

fn header_str(headers: &reqwest::header::HeaderMap, name: reqwest::header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn retry_after(headers: &reqwest::header::HeaderMap) -> Duration {
    let secs = header_str(headers, RETRY_AFTER)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_POLL_INTERVAL_SECS)
        .min(MAX_POLL_INTERVAL_SECS);
    Duration::from_secs(secs)
}

fn status_error(what: &str, response: &ApiResponse) -> TransportError {
    TransportError::Http(format!("{what} returned {}: {}", response.status, response.body))
}
