//! Evaluation tree and live-verification step types.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// The rule predicate: a JMESPath filter with optional conjunctive children
/// and optional live-verification steps.
///
/// Rule files use the flat form `{ query, and?, request? }`; it is parsed
/// through [`RawEvaluation`] into one of these variants. Empty `and` or
/// `request` lists collapse to the simpler variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEvaluation", into = "RawEvaluation")]
pub enum Evaluation {
    /// A single filter expression.
    Leaf { query: String },
    /// Each child must match at least one resource with the current match as parent.
    WithAnd { query: String, and: Vec<Evaluation> },
    /// At the root, matched resources are confirmed against the live API.
    /// A nested leaf may carry steps too; only the root's are executed.
    WithRequest {
        query: String,
        and: Vec<Evaluation>,
        request: Vec<RequestStep>,
    },
}

impl Evaluation {
    pub fn leaf(query: impl Into<String>) -> Self {
        Evaluation::Leaf {
            query: query.into(),
        }
    }

    pub fn with_and(query: impl Into<String>, and: Vec<Evaluation>) -> Self {
        let query = query.into();
        if and.is_empty() {
            Evaluation::Leaf { query }
        } else {
            Evaluation::WithAnd { query, and }
        }
    }

    pub fn with_request(
        query: impl Into<String>,
        and: Vec<Evaluation>,
        request: Vec<RequestStep>,
    ) -> Self {
        if request.is_empty() {
            Self::with_and(query, and)
        } else {
            Evaluation::WithRequest {
                query: query.into(),
                and,
                request,
            }
        }
    }

    pub fn query(&self) -> &str {
        match self {
            Evaluation::Leaf { query }
            | Evaluation::WithAnd { query, .. }
            | Evaluation::WithRequest { query, .. } => query,
        }
    }

    /// Conjunctive children (empty for leaves).
    pub fn and(&self) -> &[Evaluation] {
        match self {
            Evaluation::Leaf { .. } => &[],
            Evaluation::WithAnd { and, .. } | Evaluation::WithRequest { and, .. } => and,
        }
    }

    /// Verification steps (empty unless this is a `WithRequest` root).
    pub fn request(&self) -> &[RequestStep] {
        match self {
            Evaluation::WithRequest { request, .. } => request,
            _ => &[],
        }
    }

    /// Tree depth, counting this node as 1.
    pub fn depth(&self) -> usize {
        1 + self.and().iter().map(Evaluation::depth).max().unwrap_or(0)
    }

    fn from_raw(raw: RawEvaluation, root: bool) -> Result<Self, String> {
        if raw.query.trim().is_empty() {
            return Err("evaluation query must not be empty".to_string());
        }

        let and = raw
            .and
            .unwrap_or_default()
            .into_iter()
            .map(|child| Self::from_raw(child, false))
            .collect::<Result<Vec<_>, _>>()?;

        let request = raw.request.unwrap_or_default();
        if !request.is_empty() && !root {
            if !and.is_empty() {
                return Err(format!(
                    "request steps are only allowed on the root or on a leaf evaluation (found under `{}`)",
                    raw.query
                ));
            }
            warn!(
                query = %raw.query,
                steps = request.len(),
                "request steps on a nested evaluation are kept but never executed"
            );
        }

        Ok(Self::with_request(raw.query, and, request))
    }
}

/// Wire form of [`Evaluation`] as it appears in rule files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawEvaluation {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub and: Option<Vec<RawEvaluation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<Vec<RequestStep>>,
}

impl TryFrom<RawEvaluation> for Evaluation {
    type Error = String;

    fn try_from(raw: RawEvaluation) -> Result<Self, Self::Error> {
        Evaluation::from_raw(raw, true)
    }
}

impl From<Evaluation> for RawEvaluation {
    fn from(evaluation: Evaluation) -> Self {
        match evaluation {
            Evaluation::Leaf { query } => RawEvaluation {
                query,
                and: None,
                request: None,
            },
            Evaluation::WithAnd { query, and } => RawEvaluation {
                query,
                and: Some(and.into_iter().map(Into::into).collect()),
                request: None,
            },
            Evaluation::WithRequest {
                query,
                and,
                request,
            } => RawEvaluation {
                query,
                and: if and.is_empty() {
                    None
                } else {
                    Some(and.into_iter().map(Into::into).collect())
                },
                request: Some(request),
            },
        }
    }
}

// ── Request steps ───────────────────────────────────────────────────

/// One follow-up management API call made for each candidate resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestStep {
    /// Path appended to the resource id, e.g. `config/appsettings/list`.
    pub operation: String,
    #[serde(rename = "httpMethod", default)]
    pub http_method: HttpMethod,
    pub query: StepQuery,
}

impl RequestStep {
    pub fn new(operation: impl Into<String>, http_method: HttpMethod, query: StepQuery) -> Self {
        Self {
            operation: operation.into(),
            http_method,
            query,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    /// List-style operations (`.../list`) are POSTs, hence the default.
    #[default]
    Post,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpMethod::Get => write!(f, "GET"),
            HttpMethod::Post => write!(f, "POST"),
        }
    }
}

/// How a verification response is judged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StepQuery {
    /// Pass iff the response is a non-empty list.
    Exists,
    /// Pass iff the JMESPath expression is truthy on the response body.
    Filter(String),
}

const EXISTS: &str = "exists";

impl From<String> for StepQuery {
    fn from(value: String) -> Self {
        if value == EXISTS {
            StepQuery::Exists
        } else {
            StepQuery::Filter(value)
        }
    }
}

impl From<StepQuery> for String {
    fn from(value: StepQuery) -> Self {
        match value {
            StepQuery::Exists => EXISTS.to_string(),
            StepQuery::Filter(expr) => expr,
        }
    }
}
