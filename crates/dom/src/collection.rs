//! Ordered node sets
//!
//! A `NodeCollection` holds node ids, never the nodes themselves. Every bulk
//! mutation copies the membership first and mutates the tree from that copy,
//! so a collection can hold both a node and its descendants safely.

use crate::arena::DomArena;
use crate::document::Document;
use crate::engine::TreeEngine;
use crate::error::{DomError, Result};
use crate::node::TraversableNode;
use crate::types::{NodeId, NodeType, TextFlags};
use ahash::AHashSet;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::ops::Index;
use tracing::{debug, trace};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeCollection {
    nodes: SmallVec<[NodeId; 8]>,
}

impl NodeCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Alias of `len`
    pub fn count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<NodeId> {
        self.nodes.get(index).copied()
    }

    pub fn first(&self) -> Option<NodeId> {
        self.nodes.first().copied()
    }

    pub fn last(&self) -> Option<NodeId> {
        self.nodes.last().copied()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, NodeId> {
        self.nodes.iter()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }

    pub fn as_slice(&self) -> &[NodeId] {
        &self.nodes
    }

    /// Append in place; duplicates are allowed
    pub fn push(&mut self, node: NodeId) {
        self.nodes.push(node);
    }

    /// Union by identity: our members first, then new members of `other`
    pub fn merge(&self, other: &NodeCollection) -> NodeCollection {
        let mut seen: AHashSet<NodeId> = self.nodes.iter().copied().collect();
        let mut merged = self.clone();
        for &node in other.iter() {
            if seen.insert(node) {
                merged.push(node);
            }
        }
        merged
    }

    pub fn reverse(&self) -> NodeCollection {
        self.nodes.iter().rev().copied().collect()
    }

    /// Descendants of any member matching `selector`, in document order
    pub fn filter(&self, doc: &Document, selector: &str) -> Result<NodeCollection> {
        let mut found = Vec::new();
        for &node in self.iter() {
            found.extend(doc.node(node)?.filter(selector)?);
        }
        doc.sort_document_order(&mut found)?;
        Ok(found.into())
    }

    /// Whether any member itself matches `selector`
    pub fn is(&self, doc: &Document, selector: &str) -> Result<bool> {
        for &node in self.iter() {
            if doc.node(node)?.is(selector)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Whether any member has a descendant matching `selector`
    pub fn has(&self, doc: &Document, selector: &str) -> Result<bool> {
        for &node in self.iter() {
            if doc.node(node)?.has(selector)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Members' raw text joined in collection order, then `flags` applied once
    pub fn text(&self, doc: &Document, flags: TextFlags) -> Result<String> {
        let mut text = String::new();
        for &node in self.iter() {
            text.push_str(&doc.node(node)?.text(TextFlags::NONE)?);
        }
        Ok(crate::utils::apply_text_flags(text, flags))
    }

    /// Detach every member, then empty the collection
    ///
    /// Members without a parent, or inside a subtree detached earlier in the
    /// same pass, are skipped.
    pub fn remove(&mut self, doc: &mut Document) -> Result<()> {
        let snapshot = self.nodes.clone();
        let arena = doc.arena_mut();
        let mut removed = AHashSet::with_capacity(snapshot.len());

        for node in snapshot {
            let Some(parent) = arena.parent_node(node)? else {
                trace!(node, "remove skipped, already detached");
                continue;
            };
            if has_removed_ancestor(&*arena, parent, &removed)? {
                trace!(node, "remove skipped, inside a removed subtree");
                continue;
            }
            arena.remove_child(parent, node)?;
            removed.insert(node);
        }

        debug!(removed = removed.len(), "removed collection members");
        self.nodes.clear();
        Ok(())
    }

    /// Put `node` in place of every attached member
    ///
    /// Every member but the last receives a deep clone. The collection then
    /// holds the inserted nodes. Nothing is changed when any slot would be
    /// rejected.
    pub fn replace_with(&mut self, doc: &mut Document, node: NodeId) -> Result<()> {
        let snapshot = self.nodes.clone();
        let arena = doc.arena_mut();

        let last = snapshot.len().saturating_sub(1);
        for (index, &member) in snapshot.iter().enumerate() {
            if let Some(parent) = arena.parent_node(member)? {
                check_insert(arena, parent, node, index != last)?;
            }
        }

        let mut inserted = NodeCollection::new();
        for (index, &member) in snapshot.iter().enumerate() {
            let Some(parent) = arena.parent_node(member)? else {
                trace!(node = member, "replace skipped, no parent");
                continue;
            };
            let replacement = if index == last {
                node
            } else {
                arena.clone_subtree(node)?
            };
            arena.replace_child(parent, replacement, member)?;
            inserted.push(replacement);
        }

        *self = inserted;
        Ok(())
    }

    /// Append `nodes` to every member, cloning for all members but the last
    ///
    /// Nothing is changed when any append would be rejected.
    pub fn append_to_each(&self, doc: &mut Document, nodes: impl Into<NodeCollection>) -> Result<()> {
        let nodes: NodeCollection = nodes.into();
        let snapshot = self.nodes.clone();
        let arena = doc.arena_mut();

        let last = snapshot.len().saturating_sub(1);
        for (index, &member) in snapshot.iter().enumerate() {
            arena.get(member)?;
            for &node in nodes.iter() {
                check_insert(arena, member, node, index != last)?;
            }
        }

        for (index, &member) in snapshot.iter().enumerate() {
            for &node in nodes.iter() {
                let child = if index == last {
                    node
                } else {
                    arena.clone_subtree(node)?
                };
                arena.append_child(member, child)?;
            }
        }
        Ok(())
    }
}

/// Whether `node`, or a fresh clone of it, may be inserted under `parent`
fn check_insert(arena: &DomArena, parent: NodeId, node: NodeId, as_clone: bool) -> Result<()> {
    if !as_clone {
        return arena.ensure_insertable(parent, node);
    }
    // A clone is detached, so only its type can be rejected
    if arena.node_type(node)? == NodeType::Document {
        return Err(DomError::HierarchyRequest {
            parent,
            child: node,
        });
    }
    Ok(())
}

fn has_removed_ancestor(
    tree: &dyn TreeEngine,
    start: NodeId,
    removed: &AHashSet<NodeId>,
) -> Result<bool> {
    let mut current = Some(start);
    while let Some(id) = current {
        if removed.contains(&id) {
            return Ok(true);
        }
        current = tree.parent_node(id)?;
    }
    Ok(false)
}

impl From<NodeId> for NodeCollection {
    fn from(node: NodeId) -> Self {
        let mut nodes = SmallVec::new();
        nodes.push(node);
        Self { nodes }
    }
}

impl From<Vec<NodeId>> for NodeCollection {
    fn from(nodes: Vec<NodeId>) -> Self {
        Self {
            nodes: SmallVec::from_vec(nodes),
        }
    }
}

impl From<&[NodeId]> for NodeCollection {
    fn from(nodes: &[NodeId]) -> Self {
        Self {
            nodes: SmallVec::from_slice(nodes),
        }
    }
}

impl FromIterator<NodeId> for NodeCollection {
    fn from_iter<I: IntoIterator<Item = NodeId>>(iter: I) -> Self {
        Self {
            nodes: iter.into_iter().collect(),
        }
    }
}

impl Extend<NodeId> for NodeCollection {
    fn extend<I: IntoIterator<Item = NodeId>>(&mut self, iter: I) {
        self.nodes.extend(iter);
    }
}

impl IntoIterator for NodeCollection {
    type Item = NodeId;
    type IntoIter = smallvec::IntoIter<[NodeId; 8]>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.into_iter()
    }
}

impl<'a> IntoIterator for &'a NodeCollection {
    type Item = &'a NodeId;
    type IntoIter = std::slice::Iter<'a, NodeId>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}

impl Index<usize> for NodeCollection {
    type Output = NodeId;

    fn index(&self, index: usize) -> &NodeId {
        &self.nodes[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// <ul id="menu"><li class="x">a</li><li>b <b>!</b></li><li class="x">c</li></ul><p>tail</p>
    fn fixture() -> (Document, NodeId, Vec<NodeId>) {
        let mut doc = Document::new();
        let ul = doc.create_element("ul");
        doc.set_attribute(ul, "id", "menu").unwrap();
        doc.append_child(doc.root(), ul).unwrap();

        let mut items = Vec::new();
        for (class, label) in [(Some("x"), "a"), (None, "b "), (Some("x"), "c")] {
            let li = doc.create_element("li");
            if let Some(class) = class {
                doc.set_attribute(li, "class", class).unwrap();
            }
            let text = doc.create_text(label);
            doc.append_child(li, text).unwrap();
            doc.append_child(ul, li).unwrap();
            items.push(li);
        }
        let bold = doc.create_element("b");
        let bang = doc.create_text("!");
        doc.append_child(bold, bang).unwrap();
        doc.append_child(items[1], bold).unwrap();

        let p = doc.create_element("p");
        let tail = doc.create_text("tail");
        doc.append_child(p, tail).unwrap();
        doc.append_child(doc.root(), p).unwrap();

        (doc, ul, items)
    }

    #[test]
    fn test_construction_and_access() {
        let empty = NodeCollection::new();
        assert!(empty.is_empty());
        assert_eq!(empty.first(), None);

        let one = NodeCollection::from(7);
        assert_eq!(one.count(), 1);
        assert_eq!(one[0], 7);

        let mut many: NodeCollection = vec![3, 1, 2].into();
        many.push(9);
        many.extend([4, 5]);
        assert_eq!(many.as_slice(), &[3, 1, 2, 9, 4, 5]);
        assert_eq!(many.get(3), Some(9));
        assert_eq!(many.get(6), None);
        assert_eq!(many.last(), Some(5));
        assert!(many.contains(2));
        assert_eq!((&many).into_iter().count(), 6);
        assert_eq!(many.into_iter().sum::<u32>(), 24);
    }

    #[test]
    fn test_merge_keeps_order_and_identity() {
        let a: NodeCollection = vec![1, 2, 3].into();
        let b: NodeCollection = vec![4, 2, 5, 1].into();

        assert_eq!(a.merge(&b).as_slice(), &[1, 2, 3, 4, 5]);
        assert_eq!(b.merge(&a).as_slice(), &[4, 2, 5, 1, 3]);
        assert_eq!(a.merge(&a), a);
        assert_eq!(a.merge(&NodeCollection::new()), a);
    }

    #[test]
    fn test_reverse_leaves_original() {
        let a: NodeCollection = vec![1, 2, 3].into();
        assert_eq!(a.reverse().as_slice(), &[3, 2, 1]);
        assert_eq!(a.as_slice(), &[1, 2, 3]);
    }

    #[test]
    fn test_bulk_queries() {
        let (doc, ul, items) = fixture();
        let all: NodeCollection = items.clone().into();

        assert!(all.is(&doc, ".x").unwrap());
        assert!(!all.is(&doc, "ul").unwrap());
        assert!(all.has(&doc, "b").unwrap());
        assert!(!NodeCollection::from(items[0]).has(&doc, "b").unwrap());

        assert_eq!(all.text(&doc, TextFlags::NONE).unwrap(), "ab !c");
        assert_eq!(
            NodeCollection::from(vec![items[1], items[0]])
                .text(&doc, TextFlags::NORMALIZE)
                .unwrap(),
            "b !a"
        );

        let found = NodeCollection::from(vec![ul, items[1]]).filter(&doc, "b").unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_filter_union_in_document_order() {
        let (doc, ul, items) = fixture();
        let body = doc.node(doc.root()).unwrap().children().unwrap();
        let p = body[1];

        // Members out of order, overlapping results
        let members = NodeCollection::from(vec![p, ul, doc.root()]);
        let found = members.filter(&doc, "li, p").unwrap();

        assert_eq!(found.as_slice(), &[items[0], items[1], items[2], p]);
    }

    #[test]
    fn test_filter_propagates_selector_errors() {
        let (doc, ul, _) = fixture();
        let result = NodeCollection::from(ul).filter(&doc, "li::before");
        assert!(matches!(result, Err(DomError::SelectorSyntax { .. })));
    }

    #[test]
    fn test_remove_parent_and_child_once() {
        let (mut doc, ul, items) = fixture();
        let bold = doc.arena().child_nodes(items[1]).unwrap()[1];

        let mut targets = NodeCollection::from(vec![items[1], bold, items[2]]);
        targets.remove(&mut doc).unwrap();

        assert!(targets.is_empty());
        assert_eq!(doc.arena().child_nodes(ul).unwrap(), &[items[0]]);
        // The child stays inside its removed parent
        assert_eq!(doc.arena().parent_node(bold).unwrap(), Some(items[1]));
    }

    #[test]
    fn test_remove_skips_parentless_members() {
        let (mut doc, ul, items) = fixture();
        let loose = doc.create_element("span");

        let mut targets = NodeCollection::from(vec![loose, items[0]]);
        targets.remove(&mut doc).unwrap();
        assert_eq!(doc.arena().child_nodes(ul).unwrap(), &[items[1], items[2]]);

        // Removing again is a no-op
        let mut again = NodeCollection::from(items[0]);
        again.remove(&mut doc).unwrap();
    }

    #[test]
    fn test_remove_children_snapshot() {
        let (mut doc, ul, _) = fixture();
        let mut children = doc.node(ul).unwrap().children().unwrap();
        children.remove(&mut doc).unwrap();
        assert!(doc.arena().child_nodes(ul).unwrap().is_empty());
    }

    #[test]
    fn test_replace_with_clones_all_but_last() {
        let (mut doc, ul, items) = fixture();
        let hr = doc.create_element("hr");
        doc.set_attribute(hr, "class", "sep").unwrap();

        let mut targets = NodeCollection::from(vec![items[0], items[2]]);
        targets.replace_with(&mut doc, hr).unwrap();

        let children = doc.arena().child_nodes(ul).unwrap().to_vec();
        assert_eq!(children.len(), 3);
        assert_ne!(children[0], hr);
        assert_eq!(children[1], items[1]);
        assert_eq!(children[2], hr);
        assert_eq!(doc.arena().attribute(children[0], "class").unwrap(), Some("sep"));
        assert_eq!(targets.as_slice(), &[children[0], hr]);
    }

    #[test]
    fn test_replace_with_rejected_slot_changes_nothing() {
        let (mut doc, ul, items) = fixture();
        let bold = doc.arena().child_nodes(items[1]).unwrap()[1];
        let nodes_before = doc.arena().len();

        // The last slot would put `ul` inside itself
        let mut targets = NodeCollection::from(vec![items[0], bold]);
        let result = targets.replace_with(&mut doc, ul);

        assert!(matches!(result, Err(DomError::HierarchyRequest { .. })));
        assert_eq!(targets.as_slice(), &[items[0], bold]);
        assert_eq!(doc.arena().child_nodes(ul).unwrap(), items.as_slice());
        assert_eq!(doc.arena().len(), nodes_before, "no clone was made");
    }

    #[test]
    fn test_replace_with_document_node_is_rejected() {
        let (mut doc, ul, items) = fixture();
        let root = doc.root();

        let mut targets = NodeCollection::from(vec![items[0], items[1]]);
        assert!(targets.replace_with(&mut doc, root).is_err());
        assert_eq!(doc.arena().child_nodes(ul).unwrap(), items.as_slice());
    }

    #[test]
    fn test_append_to_each_rejected_member_changes_nothing() {
        let (mut doc, ul, items) = fixture();
        let nodes_before = doc.arena().len();

        let result = NodeCollection::from(vec![items[0], items[2]]).append_to_each(&mut doc, ul);

        assert!(matches!(result, Err(DomError::HierarchyRequest { .. })));
        assert_eq!(doc.arena().child_nodes(items[0]).unwrap().len(), 1);
        assert_eq!(doc.arena().len(), nodes_before);
    }

    #[test]
    fn test_append_to_each() {
        let (mut doc, _, items) = fixture();
        let marker = doc.create_text("*");

        NodeCollection::from(vec![items[0], items[2]])
            .append_to_each(&mut doc, marker)
            .unwrap();

        assert_eq!(doc.node(items[0]).unwrap().text(TextFlags::NONE).unwrap(), "a*");
        assert_eq!(doc.node(items[2]).unwrap().text(TextFlags::NONE).unwrap(), "c*");
        assert_eq!(doc.arena().parent_node(marker).unwrap(), Some(items[2]));
    }

    #[test]
    fn test_serde_is_a_plain_list() {
        let nodes: NodeCollection = vec![4, 8, 15].into();
        let json = serde_json::to_string(&nodes).unwrap();
        assert_eq!(json, "[4,8,15]");
        let back: NodeCollection = serde_json::from_str(&json).unwrap();
        assert_eq!(back, nodes);
    }
}
