//! Error taxonomy for rule execution.
//!
//! Every variant is scoped to the rule that raised it: the scanner reports
//! it next to that rule and keeps running the others.

use crate::schema::HttpMethod;

/// Failure reported by an external data source or transport.
///
/// The HTTP crate maps its client errors into these variants so the rules
/// crate stays free of any HTTP dependency.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("credential error: {0}")]
    Credential(String),

    #[error("unexpected response: {0}")]
    Decode(String),
}

/// Errors that abort a single rule's execution.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// A filter expression failed to render or compile.
    #[error("rule '{rule}': malformed query `{query}`: {reason}")]
    MalformedQuery {
        rule: String,
        query: String,
        reason: String,
    },

    /// The resource graph response had no `id` column.
    #[error("rule '{rule}': id column was not returned from the resource graph")]
    MissingIdColumn { rule: String },

    /// Group scoping needs a `<table> |` prefix the query does not have.
    #[error("invalid query `{query}`: all queries must start with '<tableName> |'")]
    InvalidGraphQuery { query: String },

    /// Neither provider metadata nor the error-message retry produced a usable api-version.
    #[error("rule '{rule}': unable to find a valid api version for '{resource_id}': {reason}")]
    ApiVersionResolution {
        rule: String,
        resource_id: String,
        reason: String,
    },

    /// A verification call returned a status other than success or the api-version error.
    #[error("{method} {url} returned {status}: {body}")]
    UnexpectedStatus {
        method: HttpMethod,
        url: String,
        status: u16,
        body: String,
    },

    #[error("rule '{rule}': the resource id '{id}' is invalid")]
    InvalidResourceId { rule: String, id: String },

    /// The rule needs live verification but the target cannot provide it.
    #[error("rule '{rule}': {reason}")]
    VerificationUnavailable { rule: String, reason: String },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

pub type Result<T> = std::result::Result<T, ScanError>;
