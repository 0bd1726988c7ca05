//! Compliance rule engine for cloud resource configurations.
//!
//! This crate provides:
//! - JSON/YAML rule definitions with a recursive evaluation tree
//! - Filesystem rule loader
//! - A parent-aware JMESPath tree matcher
//! - Live verification against the management API with api-version discovery
//! - Identifier resolution for resource graph, ARM template and Terraform targets
//! - A scanner that runs rules concurrently and reports per-rule outcomes
//!
//! HTTP access lives behind the [`target::ResourceGraph`] and
//! [`verification::ManagementApi`] traits; `azca-azure` implements them.

pub mod error;
pub mod evaluator;
pub mod identity;
pub mod loader;
pub mod scanner;
pub mod schema;
pub mod target;
pub mod verification;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{Result, ScanError, TransportError};
pub use scanner::{RuleOutcome, Scanner};
pub use schema::{Evaluation, Rule, ScanResult, SourceKind};
pub use target::Target;
