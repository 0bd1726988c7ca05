//! Error types and load result structures for the rule loader.

use std::path::PathBuf;

/// Errors that can occur while loading rule files.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    /// Filesystem I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Rule set validation error (duplicate names, unknown selections).
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("rules path not found: {}", .0.display())]
    NotFound(PathBuf),
}

/// Result alias for rule loading.
pub type Result<T> = std::result::Result<T, RuleError>;

/// Outcome of loading a single rule file.
#[derive(Debug)]
pub struct LoadResult {
    pub path: PathBuf,
    pub status: LoadStatus,
}

/// Status of a single file load attempt.
#[derive(Debug)]
pub enum LoadStatus {
    /// The file parsed; it contributed this many rules.
    Loaded { rules: usize },
    /// File was skipped (dotfile, unsupported extension).
    Skipped { reason: String },
    /// Parse error.
    Failed { error: String },
}
