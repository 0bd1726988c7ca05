//! Management API seam.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::TransportError;
use crate::schema::HttpMethod;

/// Error code returned when the requested api-version is not served.
pub const NO_REGISTERED_PROVIDER: &str = "NoRegisteredProviderFound";

/// Response of a management API call. The body is decoded JSON, or `Null`
/// when the response had none.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn error_code(&self) -> Option<&str> {
        self.body.pointer("/error/code").and_then(Value::as_str)
    }

    pub fn error_message(&self) -> Option<&str> {
        self.body.pointer("/error/message").and_then(Value::as_str)
    }

    /// The api-version in the request URL is not available for the resource type.
    pub fn is_unsupported_api_version(&self) -> bool {
        self.status == 400 && self.error_code() == Some(NO_REGISTERED_PROVIDER)
    }
}

/// Authenticated access to the cloud management API.
#[async_trait]
pub trait ManagementApi: Send + Sync {
    /// Base URL, without a trailing slash.
    fn endpoint(&self) -> &str;

    async fn send(&self, method: HttpMethod, url: &str) -> Result<ApiResponse, TransportError>;

    /// Default api-version the provider declares for `resource_type`
    /// (e.g. `namespaces` under `Microsoft.EventHub`).
    async fn default_api_version(
        &self,
        subscription_id: &str,
        provider: &str,
        resource_type: &str,
    ) -> Result<Option<String>, TransportError>;

    /// Export a resource group as an ARM template with all values inlined.
    async fn export_template(
        &self,
        subscription_id: &str,
        group_name: &str,
    ) -> Result<Value, TransportError>;
}
