//! Tree engine contract
//!
//! Everything the traversal layer and the path evaluator know about a tree
//! goes through this trait. Parent/child links are only ever rewired by the
//! mutation primitives below.

use crate::error::{DomError, Result};
use crate::types::{NodeId, NodeType};

pub trait TreeEngine {
    /// Whether `node` exists in this tree's storage
    fn contains(&self, node: NodeId) -> bool;

    fn node_type(&self, node: NodeId) -> Result<NodeType>;

    fn node_name(&self, node: NodeId) -> Result<&str>;

    fn attribute(&self, node: NodeId, name: &str) -> Result<Option<&str>>;

    fn parent_node(&self, node: NodeId) -> Result<Option<NodeId>>;

    fn previous_sibling(&self, node: NodeId) -> Result<Option<NodeId>>;

    fn next_sibling(&self, node: NodeId) -> Result<Option<NodeId>>;

    /// Ordered child list (a live view: copy it before mutating)
    fn child_nodes(&self, node: NodeId) -> Result<&[NodeId]>;

    fn text_content(&self, node: NodeId) -> Result<String>;

    fn owner_document(&self, node: NodeId) -> Result<Option<NodeId>>;

    /// Move `child` to the end of `parent`'s children
    fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()>;

    /// Move `new_child` in front of `reference`, or to the end when None
    fn insert_before(
        &mut self,
        parent: NodeId,
        new_child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<()>;

    /// Substitute `new_child` for `old_child`, keeping the position
    fn replace_child(&mut self, parent: NodeId, new_child: NodeId, old_child: NodeId)
        -> Result<()>;

    /// Detach `child` from `parent`; the node stays valid
    fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<()>;

    /// Deep copy of `node` as a new detached subtree
    fn clone_subtree(&mut self, node: NodeId) -> Result<NodeId>;

    /// True when `ancestor` is `node` or one of its ancestors
    fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> Result<bool> {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return Ok(true);
            }
            current = self.parent_node(id)?;
        }
        Ok(false)
    }

    /// Siblings before and after `node` in document order, found with one
    /// lookup in the parent's child list. Both are empty when detached.
    fn split_siblings(&self, node: NodeId) -> Result<(&[NodeId], &[NodeId])> {
        let Some(parent) = self.parent_node(node)? else {
            return Ok((&[], &[]));
        };
        let children = self.child_nodes(parent)?;
        let index = children
            .iter()
            .position(|&id| id == node)
            .ok_or(DomError::NotAChild {
                parent,
                child: node,
            })?;
        Ok((&children[..index], &children[index + 1..]))
    }

    /// Topmost ancestor of `node` (itself when detached)
    fn root_of(&self, node: NodeId) -> Result<NodeId> {
        let mut current = node;
        while let Some(parent) = self.parent_node(current)? {
            current = parent;
        }
        Ok(current)
    }
}
