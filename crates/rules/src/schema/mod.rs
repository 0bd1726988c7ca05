//! Rule file schema types with serde deserialization.
//!
//! Defines the type hierarchy for rule documents:
//! - `Rule`: name, description, optional recommendation and source restriction
//! - `Evaluation`: the predicate tree (leaf, conjunctive, or verified)
//! - `RequestStep`: one live management API call used to confirm a match
//! - `ScanResult`: the per-rule outcome handed to presentation

mod evaluation;
mod result;
mod rule;

pub use evaluation::*;
pub use result::*;
pub use rule::*;

#[cfg(test)]
mod tests;
