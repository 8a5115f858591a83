//! Path expression evaluation
//!
//! Supports the location-path subset that selector compilation produces:
//!
//! - axes: `self`, `child`, `descendant`, `descendant-or-self`, `parent`,
//!   `ancestor`, `following-sibling`, `preceding-sibling`
//! - node tests: names, `*`, `node()`, `text()`, `comment()`
//! - abbreviations: `//`, `.`, `..`, a leading `/`
//! - predicates: positions, `@attr`, literals, `=`, `!=`, `and`, `or`,
//!   `not()`, `contains()`, `starts-with()`, `concat()`, `normalize-space()`
//!
//! Results are deduplicated and in document order.

mod eval;
pub mod parser;

pub use parser::{parse, Expression};

use crate::engine::TreeEngine;
use crate::error::Result;
use crate::types::NodeId;
use tracing::trace;

/// `evaluate(expression, context) -> ordered node set`
pub trait PathEvaluator {
    fn evaluate(
        &self,
        tree: &dyn TreeEngine,
        expression: &str,
        context: NodeId,
    ) -> Result<Vec<NodeId>>;
}

/// Evaluator for the supported XPath 1.0 subset
#[derive(Debug, Clone, Copy)]
pub struct XPathEvaluator {
    /// Match element names ignoring ASCII case (HTML behaviour)
    pub case_insensitive_names: bool,
}

impl XPathEvaluator {
    pub fn new(case_insensitive_names: bool) -> Self {
        Self {
            case_insensitive_names,
        }
    }

    /// Evaluate an already parsed expression
    pub fn evaluate_parsed(
        &self,
        tree: &dyn TreeEngine,
        expression: &Expression,
        context: NodeId,
    ) -> Result<Vec<NodeId>> {
        eval::Evaluation::new(tree, self.case_insensitive_names).run(expression, context)
    }
}

impl Default for XPathEvaluator {
    fn default() -> Self {
        Self::new(true)
    }
}

impl PathEvaluator for XPathEvaluator {
    fn evaluate(
        &self,
        tree: &dyn TreeEngine,
        expression: &str,
        context: NodeId,
    ) -> Result<Vec<NodeId>> {
        let parsed = parse(expression)?;
        let nodes = self.evaluate_parsed(tree, &parsed, context)?;
        trace!(expression, context, matched = nodes.len(), "evaluated path");
        Ok(nodes)
    }
}
