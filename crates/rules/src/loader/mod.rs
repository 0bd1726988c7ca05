//! Filesystem rule loader.
//!
//! Reads rule definitions from a JSON/YAML file or a directory tree of them
//! into an in-memory rule set.

mod core;
mod error;


pub use self::core::{parse_rules, RuleFormat, RuleLoader};
pub use self::error::{LoadResult, LoadStatus, Result, RuleError};
