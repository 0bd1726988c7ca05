//! Live verification of matched resources.
//!
//! Rules with `request` steps confirm each match by calling the management
//! API (`{endpoint}/{resourceId}/{operation}?api-version=...`) and judging
//! the response. The api-version comes from provider metadata; when the API
//! rejects it, one retry is made with a version read from the error.

mod client;
mod types;
mod versions;

pub use client::{step_passes, VerificationClient};
pub use types::{ApiResponse, ManagementApi, NO_REGISTERED_PROVIDER};
pub use versions::{pick_version, SupportedVersionsMessage, VersionExtractor};
