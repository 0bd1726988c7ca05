//! In-memory fakes for the management API and resource graph seams.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::TransportError;
use crate::schema::HttpMethod;
use crate::target::{GraphResponse, ResourceGraph};
use crate::verification::{ApiResponse, ManagementApi};

pub(crate) const ENDPOINT: &str = "https://management.test";

type Responder = Box<dyn Fn(HttpMethod, &str) -> ApiResponse + Send + Sync>;

/// Management API whose responses come from a closure over (method, url).
pub(crate) struct FakeManagement {
    respond: Responder,
    default_versions: HashMap<String, String>,
    template: Value,
    delay: Option<Duration>,
    pub calls: Mutex<Vec<(HttpMethod, String)>>,
    pub version_lookups: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeManagement {
    pub fn new(respond: impl Fn(HttpMethod, &str) -> ApiResponse + Send + Sync + 'static) -> Self {
        Self {
            respond: Box::new(respond),
            default_versions: HashMap::new(),
            template: Value::Null,
            delay: None,
            calls: Mutex::new(Vec::new()),
            version_lookups: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_default_version(mut self, provider: &str, resource_type: &str, version: &str) -> Self {
        self.default_versions.insert(
            format!("{provider}/{resource_type}").to_lowercase(),
            version.to_string(),
        );
        self
    }

    pub fn with_template(mut self, template: Value) -> Self {
        self.template = template;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn urls(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(_, u)| u.clone()).collect()
    }
}

#[async_trait]
impl ManagementApi for FakeManagement {
    fn endpoint(&self) -> &str {
        ENDPOINT
    }

    async fn send(&self, method: HttpMethod, url: &str) -> Result<ApiResponse, TransportError> {
        self.calls.lock().unwrap().push((method, url.to_string()));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok((self.respond)(method, url))
    }

    async fn default_api_version(
        &self,
        _subscription_id: &str,
        provider: &str,
        resource_type: &str,
    ) -> Result<Option<String>, TransportError> {
        self.version_lookups.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self
            .default_versions
            .get(&format!("{provider}/{resource_type}").to_lowercase())
            .cloned())
    }

    async fn export_template(
        &self,
        _subscription_id: &str,
        _group_name: &str,
    ) -> Result<Value, TransportError> {
        Ok(self.template.clone())
    }
}

/// Resource graph whose responses come from a closure over the query text.
pub(crate) struct FakeGraph {
    respond: Box<dyn Fn(&str) -> GraphResponse + Send + Sync>,
    pub queries: Mutex<Vec<String>>,
}

impl FakeGraph {
    pub fn new(respond: impl Fn(&str) -> GraphResponse + Send + Sync + 'static) -> Self {
        Self {
            respond: Box::new(respond),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn last_query(&self) -> Option<String> {
        self.queries.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl ResourceGraph for FakeGraph {
    async fn query(
        &self,
        query: &str,
        _subscription_ids: &[String],
    ) -> Result<GraphResponse, TransportError> {
        self.queries.lock().unwrap().push(query.to_string());
        Ok((self.respond)(query))
    }
}
