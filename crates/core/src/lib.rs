pub mod config;
pub mod error;
pub mod resource;

pub use config::{AzureConfig, Config, FailurePolicy, ScanConfig};
pub use error::*;
pub use resource::*;
