//! Arena-backed tree engine
//!
//! Nodes live in one `Vec` and link to each other by index. Siblings are not
//! stored; they are read from the parent's ordered child list, so a
//! structural edit only ever touches one list and one parent link.
//!
//! ```text
//! nodes: [#document][html][body][#text]...
//!             └─ children_ids: [1]
//! ```
//!
//! Walks are iterative, so deep trees cannot overflow the stack.

use crate::engine::TreeEngine;
use crate::error::{DomError, Result};
use crate::types::{DomNode, NodeId, NodeType};
use tracing::{debug, trace};

/// Arena of DOM nodes
///
/// Nodes are never freed. Detaching clears links, so every id handed out
/// stays valid for the arena's lifetime.
#[derive(Debug)]
pub struct DomArena {
    /// All nodes stored sequentially (cache-friendly)
    nodes: Vec<DomNode>,
}

impl DomArena {
    /// Create a new empty arena
    pub fn new() -> Self {
        Self::with_capacity(1024) // Pre-allocate for typical document
    }

    /// Create arena with specific capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
        }
    }

    /// Add a node to the arena, returns its ID
    ///
    /// The stored record's `node_id` is rewritten to its slot index. Links
    /// are left as given; use the mutation primitives to attach it.
    pub fn add_node(&mut self, mut node: DomNode) -> NodeId {
        let node_id = self.nodes.len() as NodeId;
        node.node_id = node_id;
        self.nodes.push(node);
        node_id
    }

    /// Get node by ID (immutable)
    pub fn get(&self, node_id: NodeId) -> Result<&DomNode> {
        self.nodes
            .get(node_id as usize)
            .ok_or(DomError::NodeNotFound(node_id))
    }

    /// Get node by ID (mutable)
    ///
    /// For payload edits. Structural changes belong to the `TreeEngine`
    /// primitives so that parent and child lists stay in step.
    pub fn get_mut(&mut self, node_id: NodeId) -> Result<&mut DomNode> {
        self.nodes
            .get_mut(node_id as usize)
            .ok_or(DomError::NodeNotFound(node_id))
    }

    /// Total number of nodes (attached or not)
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if arena is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterator over all node IDs
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(|i| i as NodeId)
    }

    /// Traverse a subtree depth-first in document order (iterative, no recursion)
    pub fn traverse_df<F>(&self, start_id: NodeId, mut visit: F) -> Result<()>
    where
        F: FnMut(&DomNode) -> Result<()>,
    {
        let mut stack = vec![start_id];

        while let Some(node_id) = stack.pop() {
            let node = self.get(node_id)?;
            visit(node)?;

            // Push children in reverse order (so they're visited left-to-right)
            for &child_id in node.children_ids.iter().rev() {
                stack.push(child_id);
            }
        }

        Ok(())
    }

    /// Find nodes matching predicate, in arena order
    pub fn find<F>(&self, predicate: F) -> Vec<NodeId>
    where
        F: Fn(&DomNode) -> bool,
    {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(idx, node)| {
                if predicate(node) {
                    Some(idx as NodeId)
                } else {
                    None
                }
            })
            .collect()
    }

    /// Find first node matching predicate
    pub fn find_one<F>(&self, predicate: F) -> Option<NodeId>
    where
        F: Fn(&DomNode) -> bool,
    {
        self.nodes.iter().enumerate().find_map(|(idx, node)| {
            if predicate(node) {
                Some(idx as NodeId)
            } else {
                None
            }
        })
    }

    /// Find all elements by tag name
    pub fn find_by_tag(&self, tag: &str) -> Vec<NodeId> {
        self.find(|node| node.tag_name().is_some_and(|name| name.eq_ignore_ascii_case(tag)))
    }

    /// Find element by ID attribute
    pub fn find_by_id(&self, id: &str) -> Option<NodeId> {
        self.find_one(|node| node.is_element() && node.attr("id") == Some(id))
    }

    fn child_index(&self, parent: NodeId, child: NodeId) -> Result<usize> {
        self.get(parent)?
            .children_ids
            .iter()
            .position(|&id| id == child)
            .ok_or(DomError::NotAChild { parent, child })
    }

    /// Unlink `node` from its parent, if it has one
    fn detach(&mut self, node: NodeId) -> Result<()> {
        if let Some(parent) = self.get(node)?.parent_id {
            let index = self.child_index(parent, node)?;
            self.get_mut(parent)?.children_ids.remove(index);
            self.get_mut(node)?.parent_id = None;
        }
        Ok(())
    }

    /// `child` may not be `parent`, one of its ancestors, or a document node
    pub(crate) fn ensure_insertable(&self, parent: NodeId, child: NodeId) -> Result<()> {
        self.get(child)?;
        if self.is_inclusive_ancestor(child, parent)? {
            return Err(DomError::HierarchyRequest { parent, child });
        }
        if self.get(child)?.node_type == NodeType::Document {
            return Err(DomError::HierarchyRequest { parent, child });
        }
        Ok(())
    }
}

impl Default for DomArena {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeEngine for DomArena {
    fn contains(&self, node: NodeId) -> bool {
        (node as usize) < self.nodes.len()
    }

    fn node_type(&self, node: NodeId) -> Result<NodeType> {
        Ok(self.get(node)?.node_type)
    }

    fn node_name(&self, node: NodeId) -> Result<&str> {
        Ok(&self.get(node)?.node_name)
    }

    fn attribute(&self, node: NodeId, name: &str) -> Result<Option<&str>> {
        Ok(self.get(node)?.attr(name))
    }

    fn parent_node(&self, node: NodeId) -> Result<Option<NodeId>> {
        Ok(self.get(node)?.parent_id)
    }

    fn previous_sibling(&self, node: NodeId) -> Result<Option<NodeId>> {
        Ok(self.split_siblings(node)?.0.last().copied())
    }

    fn next_sibling(&self, node: NodeId) -> Result<Option<NodeId>> {
        Ok(self.split_siblings(node)?.1.first().copied())
    }

    fn child_nodes(&self, node: NodeId) -> Result<&[NodeId]> {
        Ok(&self.get(node)?.children_ids)
    }

    fn text_content(&self, node: NodeId) -> Result<String> {
        let record = self.get(node)?;
        match record.node_type {
            t if t.is_character_data() => Ok(record.node_value.clone()),
            NodeType::Element | NodeType::DocumentFragment => {
                let mut text = String::new();
                self.traverse_df(node, |n| {
                    if matches!(n.node_type, NodeType::Text | NodeType::CdataSection) {
                        text.push_str(&n.node_value);
                    }
                    Ok(())
                })?;
                Ok(text)
            }
            _ => Ok(String::new()),
        }
    }

    fn owner_document(&self, node: NodeId) -> Result<Option<NodeId>> {
        Ok(self.get(node)?.owner_document)
    }

    fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.insert_before(parent, child, None)
    }

    fn insert_before(
        &mut self,
        parent: NodeId,
        new_child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<()> {
        self.get(parent)?;
        self.ensure_insertable(parent, new_child)?;

        // Inserting a node before itself means "before its next sibling"
        let reference = match reference {
            Some(r) if r == new_child => self.next_sibling(new_child)?,
            other => other,
        };
        if let Some(r) = reference {
            self.child_index(parent, r)?;
        }

        self.detach(new_child)?;
        let index = match reference {
            Some(r) => self.child_index(parent, r)?,
            None => self.get(parent)?.children_ids.len(),
        };
        self.get_mut(parent)?.children_ids.insert(index, new_child);
        self.get_mut(new_child)?.parent_id = Some(parent);

        debug!(parent, child = new_child, index, "inserted child");
        Ok(())
    }

    fn replace_child(
        &mut self,
        parent: NodeId,
        new_child: NodeId,
        old_child: NodeId,
    ) -> Result<()> {
        self.child_index(parent, old_child)?;
        if new_child == old_child {
            return Ok(());
        }
        self.ensure_insertable(parent, new_child)?;

        // Detaching first may shift old_child's index when both share a parent
        self.detach(new_child)?;
        let index = self.child_index(parent, old_child)?;
        self.get_mut(parent)?.children_ids[index] = new_child;
        self.get_mut(new_child)?.parent_id = Some(parent);
        self.get_mut(old_child)?.parent_id = None;

        debug!(parent, new_child, old_child, "replaced child");
        Ok(())
    }

    fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.child_index(parent, child)?;
        self.detach(child)?;
        debug!(parent, child, "removed child");
        Ok(())
    }

    fn clone_subtree(&mut self, node: NodeId) -> Result<NodeId> {
        let mut copy_root = None;
        // (source, parent of the copy)
        let mut stack: Vec<(NodeId, Option<NodeId>)> = vec![(node, None)];

        while let Some((source, copy_parent)) = stack.pop() {
            let original = self.get(source)?;
            let mut copy = DomNode::new(0, original.node_type, original.node_name.clone());
            copy.node_value = original.node_value.clone();
            copy.attributes = original.attributes.clone();
            copy.owner_document = original.owner_document;
            let children = original.children_ids.clone();

            let copy_id = self.add_node(copy);
            match copy_parent {
                Some(parent) => {
                    self.get_mut(parent)?.children_ids.push(copy_id);
                    self.get_mut(copy_id)?.parent_id = Some(parent);
                }
                None => copy_root = Some(copy_id),
            }

            for &child in children.iter().rev() {
                stack.push((child, Some(copy_id)));
            }
        }

        trace!(source = node, copy = ?copy_root, "cloned subtree");
        copy_root.ok_or(DomError::NodeNotFound(node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(arena: &mut DomArena, name: &str) -> NodeId {
        arena.add_node(DomNode::new(0, NodeType::Element, name))
    }

    fn text(arena: &mut DomArena, value: &str) -> NodeId {
        let mut node = DomNode::new(0, NodeType::Text, "#text");
        node.node_value = value.to_string();
        arena.add_node(node)
    }

    #[test]
    fn test_arena_basic() {
        let mut arena = DomArena::new();

        let id = element(&mut arena, "div");
        assert_eq!(id, 0);

        let retrieved = arena.get(id).unwrap();
        assert_eq!(retrieved.node_name, "div");
        assert_eq!(retrieved.node_id, 0);
        assert!(matches!(arena.get(7), Err(DomError::NodeNotFound(7))));
    }

    #[test]
    fn test_traverse_df() {
        let mut arena = DomArena::new();

        // Create tree: root -> [child1 -> [grandchild], child2]
        let root = element(&mut arena, "div");
        let child1 = element(&mut arena, "span");
        let child2 = element(&mut arena, "p");
        let grandchild = element(&mut arena, "b");

        arena.append_child(root, child1).unwrap();
        arena.append_child(root, child2).unwrap();
        arena.append_child(child1, grandchild).unwrap();

        let mut visited = Vec::new();
        arena
            .traverse_df(root, |node| {
                visited.push(node.node_name.clone());
                Ok(())
            })
            .unwrap();

        assert_eq!(visited, vec!["div", "span", "b", "p"]);
    }

    #[test]
    fn test_siblings_follow_child_order() {
        let mut arena = DomArena::new();
        let root = element(&mut arena, "ul");
        let a = element(&mut arena, "li");
        let b = element(&mut arena, "li");
        arena.append_child(root, a).unwrap();
        arena.append_child(root, b).unwrap();

        assert_eq!(arena.next_sibling(a).unwrap(), Some(b));
        assert_eq!(arena.previous_sibling(b).unwrap(), Some(a));
        assert_eq!(arena.previous_sibling(a).unwrap(), None);
        assert_eq!(arena.next_sibling(b).unwrap(), None);
        assert_eq!(arena.next_sibling(root).unwrap(), None);
    }

    #[test]
    fn test_append_moves_node() {
        let mut arena = DomArena::new();
        let first = element(&mut arena, "div");
        let second = element(&mut arena, "div");
        let item = element(&mut arena, "span");

        arena.append_child(first, item).unwrap();
        arena.append_child(second, item).unwrap();

        assert!(arena.child_nodes(first).unwrap().is_empty());
        assert_eq!(arena.child_nodes(second).unwrap(), &[item]);
        assert_eq!(arena.parent_node(item).unwrap(), Some(second));
    }

    #[test]
    fn test_append_rejects_ancestor() {
        let mut arena = DomArena::new();
        let outer = element(&mut arena, "div");
        let inner = element(&mut arena, "div");
        arena.append_child(outer, inner).unwrap();

        assert!(matches!(
            arena.append_child(inner, outer),
            Err(DomError::HierarchyRequest { .. })
        ));
        assert!(matches!(
            arena.append_child(inner, inner),
            Err(DomError::HierarchyRequest { .. })
        ));
    }

    #[test]
    fn test_replace_child_keeps_position() {
        let mut arena = DomArena::new();
        let root = element(&mut arena, "div");
        let a = element(&mut arena, "a");
        let b = element(&mut arena, "b");
        let c = element(&mut arena, "c");
        let fresh = element(&mut arena, "em");
        for id in [a, b, c] {
            arena.append_child(root, id).unwrap();
        }

        arena.replace_child(root, fresh, b).unwrap();

        assert_eq!(arena.child_nodes(root).unwrap(), &[a, fresh, c]);
        assert_eq!(arena.parent_node(b).unwrap(), None);
        assert_eq!(arena.parent_node(fresh).unwrap(), Some(root));
    }

    #[test]
    fn test_replace_child_with_sibling() {
        let mut arena = DomArena::new();
        let root = element(&mut arena, "div");
        let a = element(&mut arena, "a");
        let b = element(&mut arena, "b");
        let c = element(&mut arena, "c");
        for id in [a, b, c] {
            arena.append_child(root, id).unwrap();
        }

        arena.replace_child(root, a, c).unwrap();

        assert_eq!(arena.child_nodes(root).unwrap(), &[b, a]);
        assert_eq!(arena.parent_node(c).unwrap(), None);
    }

    #[test]
    fn test_remove_child_requires_child() {
        let mut arena = DomArena::new();
        let root = element(&mut arena, "div");
        let stray = element(&mut arena, "span");

        assert!(matches!(
            arena.remove_child(root, stray),
            Err(DomError::NotAChild { .. })
        ));
    }

    #[test]
    fn test_insert_before() {
        let mut arena = DomArena::new();
        let root = element(&mut arena, "ol");
        let a = element(&mut arena, "li");
        let b = element(&mut arena, "li");
        let c = element(&mut arena, "li");
        arena.append_child(root, a).unwrap();
        arena.append_child(root, c).unwrap();

        arena.insert_before(root, b, Some(c)).unwrap();
        assert_eq!(arena.child_nodes(root).unwrap(), &[a, b, c]);

        arena.insert_before(root, b, Some(b)).unwrap();
        assert_eq!(arena.child_nodes(root).unwrap(), &[a, b, c]);
    }

    #[test]
    fn test_text_content_concatenates_descendants() {
        let mut arena = DomArena::new();
        let root = element(&mut arena, "p");
        let bold = element(&mut arena, "b");
        let t1 = text(&mut arena, "Hello ");
        let t2 = text(&mut arena, "world");
        let mut comment = DomNode::new(0, NodeType::Comment, "#comment");
        comment.node_value = "ignored".to_string();
        let comment = arena.add_node(comment);

        arena.append_child(root, t1).unwrap();
        arena.append_child(root, bold).unwrap();
        arena.append_child(bold, t2).unwrap();
        arena.append_child(root, comment).unwrap();

        assert_eq!(arena.text_content(root).unwrap(), "Hello world");
        assert_eq!(arena.text_content(comment).unwrap(), "ignored");
    }

    #[test]
    fn test_clone_subtree_is_detached_copy() {
        let mut arena = DomArena::new();
        let root = element(&mut arena, "div");
        let item = element(&mut arena, "span");
        let t = text(&mut arena, "x");
        arena.get_mut(item).unwrap().set_attr("class", "tag");
        arena.append_child(root, item).unwrap();
        arena.append_child(item, t).unwrap();

        let copy = arena.clone_subtree(item).unwrap();

        assert_ne!(copy, item);
        assert_eq!(arena.parent_node(copy).unwrap(), None);
        assert_eq!(arena.attribute(copy, "class").unwrap(), Some("tag"));
        assert_eq!(arena.text_content(copy).unwrap(), "x");
        assert_eq!(arena.child_nodes(root).unwrap(), &[item]);
    }

    #[test]
    fn test_find_by_tag_ignores_case() {
        let mut arena = DomArena::new();
        element(&mut arena, "DIV");
        element(&mut arena, "span");
        element(&mut arena, "div");

        assert_eq!(arena.find_by_tag("div"), vec![0, 2]);
    }
}
