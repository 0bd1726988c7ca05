//! Evaluation-tree matcher.
//!
//! A node selects the resources its query matches. When the node has `and`
//! children, a match survives only if every child, rendered with that match
//! as `parent`, selects at least one resource from the full collection.
//! Children are evaluated recursively the same way, so depth is unbounded.

mod filter;
mod render;

use azca_core::Resource;

use crate::error::{Result, ScanError};
use crate::schema::Evaluation;

pub use filter::is_truthy;
pub use render::render;

/// Matches resources against one rule's evaluation tree.
///
/// Pure: the same tree over the same collection always yields the same
/// matches in the same order.
#[derive(Debug, Clone, Copy)]
pub struct RuleMatcher<'r> {
    rule: &'r str,
}

impl<'r> RuleMatcher<'r> {
    pub fn new(rule: &'r str) -> Self {
        Self { rule }
    }

    /// Evaluate `node` over `resources`, binding `parent` into its query.
    ///
    /// Every query in the tree is checked up front, so a malformed child
    /// fails the rule even if no resource would ever reach it.
    pub fn evaluate(
        &self,
        node: &Evaluation,
        resources: &[Resource],
        parent: Option<&Resource>,
    ) -> Result<Vec<Resource>> {
        self.check_node(node, parent.is_some())?;
        self.evaluate_node(node, resources, parent)
    }

    /// Keep the candidates for which every child matches something in `resources`.
    ///
    /// Used when the root selection comes from elsewhere (a resource graph
    /// query) and only the conjunctive children run locally.
    pub fn retain_conjunctive(
        &self,
        children: &[Evaluation],
        candidates: Vec<Resource>,
        resources: &[Resource],
    ) -> Result<Vec<Resource>> {
        for child in children {
            self.check_node(child, true)?;
        }
        self.retain_matching(children, candidates, resources)
    }

    fn evaluate_node(
        &self,
        node: &Evaluation,
        resources: &[Resource],
        parent: Option<&Resource>,
    ) -> Result<Vec<Resource>> {
        let rendered = render(node.query(), parent).map_err(|e| self.malformed(node.query(), e))?;
        let matched =
            filter::select(&rendered, resources).map_err(|e| self.malformed(node.query(), e))?;

        self.retain_matching(node.and(), matched, resources)
    }

    fn retain_matching(
        &self,
        children: &[Evaluation],
        candidates: Vec<Resource>,
        resources: &[Resource],
    ) -> Result<Vec<Resource>> {
        if children.is_empty() {
            return Ok(candidates);
        }

        let mut kept = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if self.all_children_match(children, resources, &candidate)? {
                kept.push(candidate);
            }
        }
        Ok(kept)
    }

    fn all_children_match(
        &self,
        children: &[Evaluation],
        resources: &[Resource],
        parent: &Resource,
    ) -> Result<bool> {
        for child in children {
            if self.evaluate_node(child, resources, Some(parent))?.is_empty() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Render and compile every query under `node`. Placeholders in nodes
    /// that will receive a parent are filled with a sample identifier.
    fn check_node(&self, node: &Evaluation, with_parent: bool) -> Result<()> {
        let rendered = if with_parent {
            render::render_unbound(node.query())
        } else {
            render(node.query(), None)
        };

        rendered
            .and_then(|rendered| filter::compile_check(&rendered))
            .map_err(|e| self.malformed(node.query(), e))?;

        for child in node.and() {
            self.check_node(child, true)?;
        }
        Ok(())
    }

    fn malformed(&self, query: &str, reason: String) -> ScanError {
        ScanError::MalformedQuery {
            rule: self.rule.to_string(),
            query: query.to_string(),
            reason,
        }
    }
}
