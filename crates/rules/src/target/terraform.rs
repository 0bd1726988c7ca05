//! Terraform plan loading.
//!
//! Two shapes are accepted: a bare JSON array of resources, or the output
//! of `terraform show -json <plan>`, whose `planned_values.root_module`
//! (including nested `child_modules`) is flattened into one list.

use std::path::{Path, PathBuf};

use azca_core::Resource;
use serde_json::Value;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("failed to read plan {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("plan is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unrecognized plan format: expected a resource array or `terraform show -json` output")]
    UnrecognizedFormat,
}

/// Read and flatten a plan file.
pub fn load_plan(path: &Path) -> Result<Vec<Resource>, PlanError> {
    let content = std::fs::read_to_string(path).map_err(|source| PlanError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let resources = parse_plan(serde_json::from_str(&content)?)?;
    debug!(path = %path.display(), resources = resources.len(), "loaded terraform plan");
    Ok(resources)
}

/// Flatten an already-parsed plan document.
pub fn parse_plan(plan: Value) -> Result<Vec<Resource>, PlanError> {
    match plan {
        Value::Array(resources) => Ok(resources),
        Value::Object(mut document) => {
            let root = document
                .get_mut("planned_values")
                .and_then(|v| v.get_mut("root_module"))
                .map(Value::take)
                .ok_or(PlanError::UnrecognizedFormat)?;
            let mut resources = Vec::new();
            collect_module(root, &mut resources);
            Ok(resources)
        }
        _ => Err(PlanError::UnrecognizedFormat),
    }
}

fn collect_module(mut module: Value, out: &mut Vec<Resource>) {
    if let Some(Value::Array(resources)) = module.get_mut("resources").map(Value::take) {
        out.extend(resources);
    }
    if let Some(Value::Array(children)) = module.get_mut("child_modules").map(Value::take) {
        for child in children {
            collect_module(child, out);
        }
    }
}
