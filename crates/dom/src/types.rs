//! Core type definitions
//!
//! Node records are plain data. Relations are u32 indices into the arena,
//! and child lists are inline `SmallVec`s since most nodes have few children.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Node identifier (index into arena)
/// u32 allows 4 billion nodes, enough for any document
pub type NodeId = u32;

/// Node type, with the DOM `nodeType` values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum NodeType {
    Element = 1,
    Attribute = 2,
    Text = 3,
    CdataSection = 4,
    EntityReference = 5,
    Entity = 6,
    ProcessingInstruction = 7,
    Comment = 8,
    Document = 9,
    DocumentType = 10,
    DocumentFragment = 11,
    Notation = 12,
}

impl NodeType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(NodeType::Element),
            2 => Some(NodeType::Attribute),
            3 => Some(NodeType::Text),
            4 => Some(NodeType::CdataSection),
            5 => Some(NodeType::EntityReference),
            6 => Some(NodeType::Entity),
            7 => Some(NodeType::ProcessingInstruction),
            8 => Some(NodeType::Comment),
            9 => Some(NodeType::Document),
            10 => Some(NodeType::DocumentType),
            11 => Some(NodeType::DocumentFragment),
            12 => Some(NodeType::Notation),
            _ => None,
        }
    }

    /// Nodes whose own value is their text content
    pub fn is_character_data(self) -> bool {
        matches!(
            self,
            NodeType::Text
                | NodeType::CdataSection
                | NodeType::Comment
                | NodeType::ProcessingInstruction
        )
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// The stored node record
///
/// Design philosophy:
/// - Small fixed-size fields first (better packing)
/// - Use indices instead of pointers
/// - Siblings are derived from the parent's child list, never stored twice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomNode {
    pub node_id: NodeId,
    pub node_type: NodeType,

    // Navigation indices
    pub parent_id: Option<NodeId>,
    pub children_ids: SmallVec<[NodeId; 4]>, // Most nodes have <4 children

    /// Document node this node was created for, None for free-standing nodes
    pub owner_document: Option<NodeId>,

    pub node_name: String,
    pub node_value: String,

    /// Attributes in insertion order
    pub attributes: Vec<(String, String)>,
}

impl DomNode {
    /// Create a new node with required fields
    pub fn new(node_id: NodeId, node_type: NodeType, node_name: impl Into<String>) -> Self {
        Self {
            node_id,
            node_type,
            parent_id: None,
            children_ids: SmallVec::new(),
            owner_document: None,
            node_name: node_name.into(),
            node_value: String::new(),
            attributes: Vec::new(),
        }
    }

    /// Get tag name for element nodes
    pub fn tag_name(&self) -> Option<&str> {
        if self.node_type == NodeType::Element {
            Some(&self.node_name)
        } else {
            None
        }
    }

    /// Check if node is an element
    pub fn is_element(&self) -> bool {
        self.node_type == NodeType::Element
    }

    /// Get attribute value
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Set an attribute, keeping the position of an existing one
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(key, _)| *key == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }
}

/// Text extraction modes for `text()`
///
/// Flags combine with `|`. `NORMALIZE` collapses whitespace runs to a single
/// space and always trims, whether or not `TRIM` is also set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TextFlags(u8);

impl TextFlags {
    /// Raw text content, unmodified
    pub const NONE: TextFlags = TextFlags(0);
    /// Strip leading and trailing whitespace
    pub const TRIM: TextFlags = TextFlags(1);
    /// Collapse whitespace runs into one space, then trim
    pub const NORMALIZE: TextFlags = TextFlags(2);

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, other: TextFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for TextFlags {
    type Output = TextFlags;

    fn bitor(self, rhs: TextFlags) -> TextFlags {
        TextFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for TextFlags {
    fn bitor_assign(&mut self, rhs: TextFlags) {
        self.0 |= rhs.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_type_roundtrip() {
        assert_eq!(NodeType::from_u8(1), Some(NodeType::Element));
        assert_eq!(NodeType::from_u8(9), Some(NodeType::Document));
        assert_eq!(NodeType::from_u8(0), None);
        assert_eq!(NodeType::from_u8(13), None);
        assert_eq!(NodeType::Comment as u8, 8);
    }

    #[test]
    fn test_set_attr_keeps_position() {
        let mut node = DomNode::new(0, NodeType::Element, "a");
        node.set_attr("href", "/one");
        node.set_attr("class", "link");
        node.set_attr("href", "/two");

        assert_eq!(node.attr("href"), Some("/two"));
        assert_eq!(node.attributes[0].0, "href");
        assert_eq!(node.attr("missing"), None);
    }

    #[test]
    fn test_text_flags_combine() {
        let flags = TextFlags::TRIM | TextFlags::NORMALIZE;
        assert!(flags.contains(TextFlags::TRIM));
        assert!(flags.contains(TextFlags::NORMALIZE));
        assert!(!TextFlags::TRIM.contains(TextFlags::NORMALIZE));
        assert!(TextFlags::NONE.is_empty());
        assert_eq!(flags.bits(), 3);
    }
}
