//! Resource graph query client.

use std::sync::Arc;

use async_trait::async_trait;
use azca_core::AzureConfig;
use azca_rules::target::{GraphColumn, GraphResponse, ResourceGraph};
use azca_rules::TransportError;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::credential::TokenCredential;
use crate::http::{build_client, decode_body, transport_error};

/// Rows requested per page.
const PAGE_SIZE: u32 = 1000;

/// [`ResourceGraph`] over HTTPS. Follows `$skipToken` paging until all
/// rows are collected.
pub struct ResourceGraphClient {
    url: String,
    timeout_secs: u64,
    credential: Arc<dyn TokenCredential>,
    http: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    subscriptions: &'a [String],
    query: &'a str,
    options: QueryOptions,
}

#[derive(Debug, Serialize)]
struct QueryOptions {
    #[serde(rename = "resultFormat")]
    result_format: &'static str,
    #[serde(rename = "$top")]
    top: u32,
    #[serde(rename = "$skipToken", skip_serializing_if = "Option::is_none")]
    skip_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryPage {
    data: PageData,
    #[serde(rename = "$skipToken", default)]
    skip_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PageData {
    #[serde(default)]
    columns: Vec<GraphColumn>,
    #[serde(default)]
    rows: Vec<Vec<serde_json::Value>>,
}

impl ResourceGraphClient {
    pub fn new(config: &AzureConfig, credential: Arc<dyn TokenCredential>) -> Result<Self, TransportError> {
        Ok(Self {
            url: format!(
                "{}/providers/Microsoft.ResourceGraph/resources?api-version={}",
                config.management_endpoint.trim_end_matches('/'),
                config.graph_api_version
            ),
            timeout_secs: config.request_timeout_secs,
            credential,
            http: build_client(config.request_timeout_secs)?,
        })
    }

    async fn fetch_page(&self, body: &QueryRequest<'_>) -> Result<QueryPage, TransportError> {
        let token = self.credential.token().await?;
        let response = self
            .http
            .post(&self.url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout_secs))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| transport_error(e, self.timeout_secs))?;
        if !status.is_success() {
            return Err(TransportError::Http(format!(
                "resource graph query returned {}: {}",
                status,
                decode_body(&text)
            )));
        }

        serde_json::from_str(&text)
            .map_err(|e| TransportError::Decode(format!("resource graph response: {e}")))
    }
}

#[async_trait]
impl ResourceGraph for ResourceGraphClient {
    async fn query(&self, query: &str, subscription_ids: &[String]) -> Result<GraphResponse, TransportError> {
        let mut request = QueryRequest {
            subscriptions: subscription_ids,
            query,
            options: QueryOptions {
                result_format: "table",
                top: PAGE_SIZE,
                skip_token: None,
            },
        };

        let mut response = GraphResponse::default();
        let mut pages = 0usize;
        loop {
            let page = self.fetch_page(&request).await?;
            pages += 1;
            if response.columns.is_empty() {
                response.columns = page.data.columns;
            }
            response.rows.extend(page.data.rows);

            match page.skip_token {
                Some(token) if !token.is_empty() => request.options.skip_token = Some(token),
                _ => break,
            }
        }

        debug!(rows = response.rows.len(), pages, "resource graph query complete");
        Ok(response)
    }
}
