//! Bearer token sources for management and resource graph calls.

use std::sync::Arc;

use async_trait::async_trait;
use azca_core::AzureConfig;
use azca_rules::TransportError;
use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::debug;

/// A cached token is refreshed once it is this close to expiring.
const REFRESH_MARGIN_MINUTES: i64 = 5;
/// Assumed lifetime when the az cli output carries no usable expiry.
const FALLBACK_LIFETIME_MINUTES: i64 = 30;

/// Supplies bearer tokens for the management endpoint.
#[async_trait]
pub trait TokenCredential: Send + Sync {
    async fn token(&self) -> Result<String, TransportError>;
}

/// A pre-issued token, e.g. from `AZURE_ACCESS_TOKEN`.
pub struct StaticTokenCredential {
    token: String,
}

impl StaticTokenCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenCredential for StaticTokenCredential {
    async fn token(&self) -> Result<String, TransportError> {
        Ok(self.token.clone())
    }
}

/// Asks the signed-in Azure CLI for a token and reuses it until shortly
/// before it expires.
pub struct AzureCliCredential {
    scope: String,
    cached: Mutex<Option<CachedToken>>,
}

#[derive(Debug, Clone, PartialEq)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::minutes(REFRESH_MARGIN_MINUTES) < self.expires_at
    }
}

#[derive(Deserialize)]
struct CliToken {
    #[serde(rename = "accessToken")]
    access_token: String,
    /// Unix seconds, present in newer az releases.
    #[serde(default)]
    expires_on: Option<i64>,
    /// Local time `YYYY-MM-DD HH:MM:SS.ffffff`.
    #[serde(rename = "expiresOn", default)]
    expires_on_local: Option<String>,
}

impl AzureCliCredential {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            cached: Mutex::new(None),
        }
    }

    async fn fetch(&self) -> Result<CachedToken, TransportError> {
        debug!(scope = %self.scope, "requesting token from az cli");
        let output = Command::new("az")
            .args(["account", "get-access-token", "--scope", self.scope.as_str(), "--output", "json"])
            .output()
            .await
            .map_err(|e| TransportError::Credential(format!("failed to run az cli: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TransportError::Credential(format!(
                "az account get-access-token failed (run `az login`?): {}",
                stderr.trim()
            )));
        }
        parse_cli_token(&output.stdout, Utc::now())
    }
}

#[async_trait]
impl TokenCredential for AzureCliCredential {
    async fn token(&self) -> Result<String, TransportError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(Utc::now())) {
            return Ok(token.token.clone());
        }

        let fresh = self.fetch().await?;
        debug!(expires_at = %fresh.expires_at, "cached az cli token");
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }
}

fn parse_cli_token(stdout: &[u8], now: DateTime<Utc>) -> Result<CachedToken, TransportError> {
    let token: CliToken = serde_json::from_slice(stdout)
        .map_err(|e| TransportError::Credential(format!("unexpected az cli output: {e}")))?;

    let expires_at = token
        .expires_on
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .or_else(|| token.expires_on_local.as_deref().and_then(parse_local_expiry))
        .unwrap_or_else(|| now + Duration::minutes(FALLBACK_LIFETIME_MINUTES));

    Ok(CachedToken {
        token: token.access_token,
        expires_at,
    })
}

fn parse_local_expiry(raw: &str) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(raw.trim(), "%Y-%m-%d %H:%M:%S%.f").ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}

/// Static token when configured, the Azure CLI otherwise.
pub fn credential_from_config(config: &AzureConfig) -> Arc<dyn TokenCredential> {
    match &config.access_token {
        Some(token) => Arc::new(StaticTokenCredential::new(token.clone())),
        None => Arc::new(AzureCliCredential::new(config.token_scope())),
    }
}
