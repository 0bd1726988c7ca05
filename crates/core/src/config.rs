use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_usize(profile: &str, key: &str, default: usize) -> usize {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub azure: AzureConfig,
    pub scan: ScanConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `AZCA_PROFILE`. When set (e.g. `PROD`), every key
    /// is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("AZCA_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            azure: AzureConfig::from_env_profiled(p),
            scan: ScanConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::debug!("Config loaded (profile: {}):", self.profile_label());
        tracing::debug!(
            "  azure:  endpoint={}, token={}",
            self.azure.management_endpoint,
            if self.azure.access_token.is_some() { "static" } else { "az cli" }
        );
        tracing::debug!(
            "  scan:   rules={}, verify_concurrency={}, rule_concurrency={}, failure_policy={}",
            self.scan.rules_path.display(),
            self.scan.verification_concurrency,
            self.scan.rule_concurrency,
            self.scan.failure_policy
        );
    }

    /// Return a redacted view safe for printing (no secrets).
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "azure": {
                "management_endpoint": self.azure.management_endpoint,
                "graph_api_version": self.azure.graph_api_version,
                "provider_api_version": self.azure.provider_api_version,
                "template_api_version": self.azure.template_api_version,
                "request_timeout_secs": self.azure.request_timeout_secs,
                "static_token": self.azure.access_token.is_some(),
            },
            "scan": {
                "rules_path": self.scan.rules_path,
                "verification_concurrency": self.scan.verification_concurrency,
                "rule_concurrency": self.scan.rule_concurrency,
                "failure_policy": self.scan.failure_policy.to_string(),
            },
        })
    }
}

// ── Azure ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzureConfig {
    /// Resource manager endpoint, without trailing slash.
    pub management_endpoint: String,
    pub graph_api_version: String,
    pub provider_api_version: String,
    pub template_api_version: String,
    /// Pre-issued bearer token. When absent the Azure CLI is asked for one.
    pub access_token: Option<String>,
    pub request_timeout_secs: u64,
}

impl AzureConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            management_endpoint: profiled_env_or(
                p,
                "AZURE_MANAGEMENT_ENDPOINT",
                "https://management.azure.com",
            )
            .trim_end_matches('/')
            .to_string(),
            graph_api_version: profiled_env_or(p, "AZURE_GRAPH_API_VERSION", "2021-03-01"),
            provider_api_version: profiled_env_or(p, "AZURE_PROVIDER_API_VERSION", "2021-04-01"),
            template_api_version: profiled_env_or(p, "AZURE_TEMPLATE_API_VERSION", "2021-04-01"),
            access_token: profiled_env_opt(p, "AZURE_ACCESS_TOKEN"),
            request_timeout_secs: profiled_env_u64(p, "AZURE_REQUEST_TIMEOUT_SECS", 30),
        }
    }

    /// Token audience derived from the management endpoint.
    pub fn token_scope(&self) -> String {
        format!("{}/.default", self.management_endpoint)
    }
}

// ── Scan ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Rule file or directory of rule files.
    pub rules_path: PathBuf,
    /// Max candidates verified in parallel within one rule.
    pub verification_concurrency: usize,
    /// Max rules executed in parallel.
    pub rule_concurrency: usize,
    pub failure_policy: FailurePolicy,
}

impl ScanConfig {
    fn from_env_profiled(p: &str) -> Self {
        let raw_policy = profiled_env_or(p, "AZCA_FAILURE_POLICY", "fail-fast");
        let failure_policy = raw_policy.parse().unwrap_or_else(|e: ConfigError| {
            tracing::warn!(error = %e, "falling back to fail-fast");
            FailurePolicy::FailFast
        });
        Self {
            rules_path: PathBuf::from(profiled_env_or(p, "AZCA_RULES_PATH", "data/rules")),
            verification_concurrency: profiled_env_usize(p, "AZCA_VERIFY_CONCURRENCY", 8),
            rule_concurrency: profiled_env_usize(p, "AZCA_RULE_CONCURRENCY", 4),
            failure_policy,
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            rules_path: PathBuf::from("data/rules"),
            verification_concurrency: 8,
            rule_concurrency: 4,
            failure_policy: FailurePolicy::FailFast,
        }
    }
}

/// What a rule does when verifying one candidate fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// The whole rule fails and in-flight sibling verifications are dropped.
    #[default]
    FailFast,
    /// The failing candidate is logged and left out; the others continue.
    SkipResource,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::FailFast => write!(f, "fail-fast"),
            FailurePolicy::SkipResource => write!(f, "skip"),
        }
    }
}

impl FromStr for FailurePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail-fast" | "failfast" | "fail_fast" => Ok(FailurePolicy::FailFast),
            "skip" | "skip-resource" | "skip_resource" => Ok(FailurePolicy::SkipResource),
            other => Err(ConfigError::UnknownFailurePolicy(other.to_string())),
        }
    }
}
