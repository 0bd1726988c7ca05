//! Core [`RuleLoader`] struct: filesystem-backed rule loading.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::schema::Rule;

use super::error::{LoadResult, LoadStatus, Result, RuleError};

/// Rule file formats, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleFormat {
    Json,
    Yaml,
}

impl RuleFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Some(RuleFormat::Json),
            Some("yml") | Some("yaml") => Some(RuleFormat::Yaml),
            _ => None,
        }
    }
}

/// Filesystem-backed rule loader.
///
/// The rules path is either a single rule file or a directory scanned
/// recursively for `*.json`, `*.yml` and `*.yaml` files. A file holds one
/// rule object or an array of rules. Rule names must be unique across
/// everything loaded.
pub struct RuleLoader {
    rules_path: PathBuf,
    rules: Vec<Rule>,
}

impl RuleLoader {
    pub fn new(rules_path: impl Into<PathBuf>) -> Self {
        Self {
            rules_path: rules_path.into(),
            rules: Vec::new(),
        }
    }

    pub fn rules_path(&self) -> &Path {
        &self.rules_path
    }

    /// Load every rule under the rules path, replacing anything loaded before.
    ///
    /// A single file must parse. In a directory, dotfiles and unsupported
    /// extensions are skipped and parse errors are reported per file
    /// without aborting the scan. Files load in name order.
    pub fn load_all(&mut self) -> Result<Vec<LoadResult>> {
        if !self.rules_path.exists() {
            return Err(RuleError::NotFound(self.rules_path.clone()));
        }

        let mut rules = Vec::new();
        let mut results = Vec::new();

        if self.rules_path.is_file() {
            let loaded = self.load_file(&self.rules_path)?;
            results.push(LoadResult {
                path: self.rules_path.clone(),
                status: LoadStatus::Loaded {
                    rules: loaded.len(),
                },
            });
            rules.extend(loaded);
        } else {
            self.scan_dir_recursive(&self.rules_path, &mut rules, &mut results)?;
        }

        ensure_unique_names(&rules)?;
        info!(path = %self.rules_path.display(), rules = rules.len(), "rules loaded");
        self.rules = rules;
        Ok(results)
    }

    fn scan_dir_recursive(
        &self,
        dir: &Path,
        rules: &mut Vec<Rule>,
        results: &mut Vec<LoadResult>,
    ) -> Result<()> {
        let mut paths = fs::read_dir(dir)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()?;
        paths.sort();

        for path in paths {
            // Skip dotfiles/dotdirs
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if name.starts_with('.') {
                    if path.is_file() {
                        results.push(LoadResult {
                            path,
                            status: LoadStatus::Skipped {
                                reason: "dotfile".to_string(),
                            },
                        });
                    }
                    continue;
                }
            }

            if path.is_dir() {
                self.scan_dir_recursive(&path, rules, results)?;
                continue;
            }

            if RuleFormat::from_path(&path).is_none() {
                results.push(LoadResult {
                    path,
                    status: LoadStatus::Skipped {
                        reason: "not a JSON or YAML file".to_string(),
                    },
                });
                continue;
            }

            match self.load_file(&path) {
                Ok(loaded) => {
                    info!(path = %path.display(), rules = loaded.len(), "loaded rule file");
                    results.push(LoadResult {
                        path,
                        status: LoadStatus::Loaded {
                            rules: loaded.len(),
                        },
                    });
                    rules.extend(loaded);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to load rule file");
                    results.push(LoadResult {
                        path,
                        status: LoadStatus::Failed {
                            error: e.to_string(),
                        },
                    });
                }
            }
        }

        Ok(())
    }

    /// Parse one rule file.
    pub fn load_file(&self, path: &Path) -> Result<Vec<Rule>> {
        let format = RuleFormat::from_path(path).ok_or_else(|| {
            RuleError::Validation(format!(
                "unsupported rule file extension: {}",
                path.display()
            ))
        })?;
        let contents = fs::read_to_string(path)?;
        parse_rules(&contents, format)
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn into_rules(self) -> Vec<Rule> {
        self.rules
    }

    /// The loaded rules with the given names, in load order.
    ///
    /// An empty selection means every rule; an unknown name is an error.
    pub fn select(&self, names: &[String]) -> Result<Vec<Rule>> {
        if names.is_empty() {
            return Ok(self.rules.clone());
        }

        let unknown: Vec<&str> = names
            .iter()
            .filter(|n| !self.rules.iter().any(|r| &r.name == *n))
            .map(String::as_str)
            .collect();
        if !unknown.is_empty() {
            return Err(RuleError::Validation(format!(
                "unknown rule(s): {}",
                unknown.join(", ")
            )));
        }

        Ok(self
            .rules
            .iter()
            .filter(|r| names.contains(&r.name))
            .cloned()
            .collect())
    }
}

/// Parse a rule document: a single rule or an array of rules.
pub fn parse_rules(contents: &str, format: RuleFormat) -> Result<Vec<Rule>> {
    match format {
        RuleFormat::Json => {
            let value: serde_json::Value = serde_json::from_str(contents)?;
            if value.is_array() {
                Ok(serde_json::from_value(value)?)
            } else {
                Ok(vec![serde_json::from_value(value)?])
            }
        }
        RuleFormat::Yaml => {
            let value: serde_yaml::Value = serde_yaml::from_str(contents)?;
            if value.is_sequence() {
                Ok(serde_yaml::from_value(value)?)
            } else {
                Ok(vec![serde_yaml::from_value(value)?])
            }
        }
    }
}

fn ensure_unique_names(rules: &[Rule]) -> Result<()> {
    let mut seen = HashSet::new();
    for rule in rules {
        if !seen.insert(rule.name.as_str()) {
            return Err(RuleError::Validation(format!(
                "duplicate rule name '{}'",
                rule.name
            )));
        }
    }
    Ok(())
}
