//! Error types for DOM operations
//!
//! Simple, flat error hierarchy. No over-engineering.

use crate::types::NodeId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DomError>;

#[derive(Debug, Error)]
pub enum DomError {
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Invalid node type: expected {expected}, got {actual}")]
    InvalidNodeType { expected: String, actual: String },

    #[error("Invalid selector '{selector}': {message}")]
    SelectorSyntax { selector: String, message: String },

    #[error("Invalid path expression '{expression}': {message}")]
    PathSyntax { expression: String, message: String },

    #[error("Node {0} has no owner document")]
    DetachedContext(NodeId),

    #[error("Node {child} cannot be inserted into {parent}")]
    HierarchyRequest { parent: NodeId, child: NodeId },

    #[error("Node {child} is not a child of {parent}")]
    NotAChild { parent: NodeId, child: NodeId },

    #[error("Parse error: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Invalid fixture: {0}")]
    InvalidFixture(String),
}

impl DomError {
    pub(crate) fn selector(selector: &str, message: impl Into<String>) -> Self {
        DomError::SelectorSyntax {
            selector: selector.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn path(expression: &str, message: impl Into<String>) -> Self {
        DomError::PathSyntax {
            expression: expression.to_string(),
            message: message.into(),
        }
    }
}
