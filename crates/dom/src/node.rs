//! Node traversal handles
//!
//! `TraversableNode` answers "what is related to me" without touching raw
//! tree links. `NodeRef` is the shared handle; `NodeMut` additionally owns the
//! document mutably and adds `remove`, `replace` and `append`.
//!
//! ```text
//! doc.node(id)?.next_all(Some(NodeType::Element))?   → NodeCollection
//! doc.node_mut(id)?.append(fresh)?.remove(Some("em"))?
//! ```

use crate::collection::NodeCollection;
use crate::document::Document;
use crate::engine::TreeEngine;
use crate::error::{DomError, Result};
use crate::selector::{DESCENDANT_PREFIX, SELF_PREFIX};
use crate::types::{NodeId, NodeType, TextFlags};
use crate::utils::{apply_text_flags, cap_text_length};
use std::fmt;
use tracing::trace;

/// Per-node traversal vocabulary
///
/// Implementors only provide the document and the node id; everything else
/// is derived from the document's tree engine and collaborators.
pub trait TraversableNode {
    fn doc(&self) -> &Document;

    fn id(&self) -> NodeId;

    fn node_type(&self) -> Result<NodeType> {
        self.doc().arena().node_type(self.id())
    }

    /// The owning document node; a document node is its own context
    fn document(&self) -> Result<Option<NodeId>> {
        let arena = self.doc().arena();
        if arena.node_type(self.id())? == NodeType::Document {
            return Ok(Some(self.id()));
        }
        arena.owner_document(self.id())
    }

    /// Descendants matching a CSS selector
    fn filter(&self, selector: &str) -> Result<NodeCollection> {
        self.filter_with_prefix(selector, DESCENDANT_PREFIX)
    }

    /// Compile `selector` with an explicit axis prefix and evaluate it here
    fn filter_with_prefix(&self, selector: &str, prefix: &str) -> Result<NodeCollection> {
        let expression = self.doc().compile(selector, prefix)?;
        self.filter_xpath(&expression)
    }

    /// Evaluate a raw path expression with this node as context
    fn filter_xpath(&self, expression: &str) -> Result<NodeCollection> {
        if self.document()?.is_none() {
            return Err(DomError::DetachedContext(self.id()));
        }
        Ok(self.doc().evaluate(expression, self.id())?.into())
    }

    /// Nearest preceding sibling, optionally of one node type
    fn previous(&self, node_type: Option<NodeType>) -> Result<Option<NodeId>> {
        let arena = self.doc().arena();
        let (before, _) = arena.split_siblings(self.id())?;
        // Nearest first, each sibling visited once
        for &id in before.iter().rev() {
            if type_matches(arena.node_type(id)?, node_type) {
                return Ok(Some(id));
            }
        }
        Ok(None)
    }

    /// Nearest following sibling, optionally of one node type
    fn next(&self, node_type: Option<NodeType>) -> Result<Option<NodeId>> {
        let arena = self.doc().arena();
        let (_, after) = arena.split_siblings(self.id())?;
        for &id in after {
            if type_matches(arena.node_type(id)?, node_type) {
                return Ok(Some(id));
            }
        }
        Ok(None)
    }

    /// Every matching preceding sibling, in document order
    fn previous_all(&self, node_type: Option<NodeType>) -> Result<NodeCollection> {
        let arena = self.doc().arena();
        let (before, _) = arena.split_siblings(self.id())?;
        matching(arena, before, node_type)
    }

    /// Every matching following sibling, in document order
    fn next_all(&self, node_type: Option<NodeType>) -> Result<NodeCollection> {
        let arena = self.doc().arena();
        let (_, after) = arena.split_siblings(self.id())?;
        matching(arena, after, node_type)
    }

    /// All matching siblings except this node, in document order
    fn siblings(&self, node_type: Option<NodeType>) -> Result<NodeCollection> {
        Ok(self.previous_all(node_type)?.merge(&self.next_all(node_type)?))
    }

    /// Snapshot of the direct children
    ///
    /// Mutate through the returned collection, never by walking the live
    /// child list while removing from it.
    fn children(&self) -> Result<NodeCollection> {
        Ok(self.doc().arena().child_nodes(self.id())?.into())
    }

    /// Parent node, or None when detached or directly under the document node
    fn parent(&self) -> Result<Option<NodeId>> {
        let arena = self.doc().arena();
        match arena.parent_node(self.id())? {
            Some(parent) if arena.node_type(parent)? == NodeType::Document => Ok(None),
            other => Ok(other),
        }
    }

    /// Text content with the given flags applied
    fn text(&self, flags: TextFlags) -> Result<String> {
        let text = apply_text_flags(self.doc().arena().text_content(self.id())?, flags);
        trace!(node = self.id(), flags = flags.bits(), text = %cap_text_length(&text, 40), "extracted text");
        Ok(text)
    }

    /// Whether this node itself matches `selector`
    fn is(&self, selector: &str) -> Result<bool> {
        Ok(!self.filter_with_prefix(selector, SELF_PREFIX)?.is_empty())
    }

    /// Whether any descendant matches `selector`
    fn has(&self, selector: &str) -> Result<bool> {
        Ok(!self.filter(selector)?.is_empty())
    }
}

fn type_matches(actual: NodeType, wanted: Option<NodeType>) -> bool {
    wanted.map_or(true, |wanted| wanted == actual)
}

fn matching(
    tree: &dyn TreeEngine,
    nodes: &[NodeId],
    node_type: Option<NodeType>,
) -> Result<NodeCollection> {
    let mut found = NodeCollection::new();
    for &id in nodes {
        if type_matches(tree.node_type(id)?, node_type) {
            found.push(id);
        }
    }
    Ok(found)
}

/// Shared handle to a node
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    doc: &'a Document,
    id: NodeId,
}

impl<'a> NodeRef<'a> {
    pub(crate) fn new(doc: &'a Document, id: NodeId) -> Self {
        Self { doc, id }
    }

    /// Handle to another node of the same document
    pub fn at(&self, id: NodeId) -> Result<NodeRef<'a>> {
        self.doc.node(id)
    }
}

impl TraversableNode for NodeRef<'_> {
    fn doc(&self) -> &Document {
        self.doc
    }

    fn id(&self) -> NodeId {
        self.id
    }
}

impl fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NodeRef").field(&self.id).finish()
    }
}

/// Exclusive handle to a node; mutations return the handle for chaining
pub struct NodeMut<'a> {
    doc: &'a mut Document,
    id: NodeId,
}

impl<'a> NodeMut<'a> {
    pub(crate) fn new(doc: &'a mut Document, id: NodeId) -> Self {
        Self { doc, id }
    }

    /// Reborrow as a shared handle
    pub fn reborrow(&self) -> NodeRef<'_> {
        NodeRef::new(self.doc, self.id)
    }

    /// Detach this node, or with a selector, the matching descendants
    pub fn remove(self, selector: Option<&str>) -> Result<Self> {
        let mut targets = match selector {
            Some(selector) => self.filter(selector)?,
            None => NodeCollection::from(self.id),
        };
        targets.remove(self.doc)?;
        Ok(self)
    }

    /// Put `new_node` where this node is
    ///
    /// No-op when `parent()` is None, which includes the children of the
    /// document node.
    pub fn replace(self, new_node: NodeId) -> Result<Self> {
        match self.parent()? {
            Some(parent) => self.doc.arena_mut().replace_child(parent, new_node, self.id)?,
            None => trace!(node = self.id, "replace without a parent ignored"),
        }
        Ok(self)
    }

    /// Append a node or every member of a collection, in order
    ///
    /// Appended nodes move: they leave their previous parent.
    pub fn append(self, nodes: impl Into<NodeCollection>) -> Result<Self> {
        let nodes: NodeCollection = nodes.into();
        for &node in nodes.iter() {
            self.doc.arena_mut().append_child(self.id, node)?;
        }
        Ok(self)
    }
}

impl TraversableNode for NodeMut<'_> {
    fn doc(&self) -> &Document {
        self.doc
    }

    fn id(&self) -> NodeId {
        self.id
    }
}

impl fmt::Debug for NodeMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NodeMut").field(&self.id).finish()
    }
}
