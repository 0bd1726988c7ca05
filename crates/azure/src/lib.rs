//! HTTPS clients for the Azure management plane.
//!
//! Implements the rule engine's [`ResourceGraph`](azca_rules::target::ResourceGraph)
//! and [`ManagementApi`](azca_rules::verification::ManagementApi) seams with
//! reqwest, authenticated through a [`TokenCredential`].

pub mod credential;
pub mod graph;
mod http;
pub mod management;

use std::sync::Arc;

use azca_core::AzureConfig;
use azca_rules::TransportError;

pub use credential::{credential_from_config, AzureCliCredential, StaticTokenCredential, TokenCredential};
pub use graph::ResourceGraphClient;
pub use management::ManagementClient;

/// Both clients, sharing one credential.
pub struct AzureClients {
    pub graph: Arc<ResourceGraphClient>,
    pub management: Arc<ManagementClient>,
}

impl AzureClients {
    pub fn from_config(config: &AzureConfig) -> Result<Self, TransportError> {
        let credential = credential_from_config(config);
        Ok(Self {
            graph: Arc::new(ResourceGraphClient::new(config, credential.clone())?),
            management: Arc::new(ManagementClient::new(config, credential)?),
        })
    }
}
