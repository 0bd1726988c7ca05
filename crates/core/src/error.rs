use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("unknown failure policy '{0}' (expected 'fail-fast' or 'skip')")]
    UnknownFailurePolicy(String),
}
