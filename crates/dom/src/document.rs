//! Document - main entry point
//!
//! This handles:
//! - Owning the arena and its `#document` root node
//! - Node construction (builder methods and JSON fixture loading)
//! - Routing selectors through the compiler and evaluator collaborators
//! - Handing out `NodeRef` / `NodeMut` traversal handles
//!
//! JSON fixtures use the CDP `DOM.getDocument` node shape:
//! ```json
//! {
//!   "nodeType": 1,
//!   "nodeName": "ul",
//!   "attributes": ["class", "menu"],
//!   "children": [{ "nodeType": 3, "nodeValue": "hi" }]
//! }
//! ```

use crate::arena::DomArena;
use crate::engine::TreeEngine;
use crate::error::{DomError, Result};
use crate::node::{NodeMut, NodeRef};
use crate::selector::{CssSelectorCompiler, SelectorCompiler};
use crate::types::{DomNode, NodeId, NodeType};
use crate::xpath::{PathEvaluator, XPathEvaluator};
use ahash::AHashMap;
use serde_json::Value;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use tracing::{debug, trace};

/// Configuration for a document
#[derive(Debug, Clone)]
pub struct DocumentConfig {
    /// Element names match ignoring ASCII case
    pub case_insensitive_names: bool,
    /// Compiled selectors kept per (selector, prefix); 0 disables the cache
    pub selector_cache_capacity: usize,
    /// Arena pre-allocation
    pub initial_capacity: usize,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            case_insensitive_names: true,
            selector_cache_capacity: 128,
            initial_capacity: 1024,
        }
    }
}

/// A tree plus the collaborators needed to query it
pub struct Document {
    config: DocumentConfig,
    arena: DomArena,
    root: NodeId,
    compiler: Box<dyn SelectorCompiler>,
    evaluator: Box<dyn PathEvaluator>,
    selector_cache: RefCell<AHashMap<(String, String), String>>,
}

impl Document {
    /// Create an empty document with default config
    pub fn new() -> Self {
        Self::with_config(DocumentConfig::default())
    }

    /// Create an empty document with custom config
    pub fn with_config(config: DocumentConfig) -> Self {
        let mut arena = DomArena::with_capacity(config.initial_capacity);
        let root = arena.add_node(DomNode::new(0, NodeType::Document, "#document"));

        Self {
            evaluator: Box::new(XPathEvaluator::new(config.case_insensitive_names)),
            compiler: Box::new(CssSelectorCompiler::new()),
            selector_cache: RefCell::new(AHashMap::new()),
            config,
            arena,
            root,
        }
    }

    /// Replace the selector compiler
    pub fn with_compiler(mut self, compiler: impl SelectorCompiler + 'static) -> Self {
        self.compiler = Box::new(compiler);
        self.selector_cache.borrow_mut().clear();
        self
    }

    /// Replace the path evaluator
    pub fn with_evaluator(mut self, evaluator: impl PathEvaluator + 'static) -> Self {
        self.evaluator = Box::new(evaluator);
        self
    }

    /// Load a JSON fixture tree under a fresh document
    pub fn from_json(value: &Value) -> Result<Self> {
        let mut document = Self::new();
        document.load_json(value)?;
        Ok(document)
    }

    /// Parse and load a JSON fixture string
    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_json(&value)
    }

    pub fn config(&self) -> &DocumentConfig {
        &self.config
    }

    /// Get reference to internal arena
    pub fn arena(&self) -> &DomArena {
        &self.arena
    }

    /// Get mutable reference to internal arena
    pub fn arena_mut(&mut self) -> &mut DomArena {
        &mut self.arena
    }

    /// The `#document` node
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// First element child of the document node
    pub fn document_element(&self) -> Option<NodeId> {
        self.arena.get(self.root).ok().and_then(|root| {
            root.children_ids
                .iter()
                .copied()
                .find(|&id| self.arena.node_type(id).ok() == Some(NodeType::Element))
        })
    }

    /// Shared traversal handle
    pub fn node(&self, id: NodeId) -> Result<NodeRef<'_>> {
        self.arena.get(id)?;
        Ok(NodeRef::new(self, id))
    }

    /// Exclusive traversal handle, for mutation
    pub fn node_mut(&mut self, id: NodeId) -> Result<NodeMut<'_>> {
        self.arena.get(id)?;
        Ok(NodeMut::new(self, id))
    }

    fn create_node(&mut self, node_type: NodeType, name: &str, value: &str) -> NodeId {
        let mut node = DomNode::new(0, node_type, name);
        node.node_value = value.to_string();
        node.owner_document = Some(self.root);
        self.arena.add_node(node)
    }

    /// New detached element owned by this document
    pub fn create_element(&mut self, name: &str) -> NodeId {
        self.create_node(NodeType::Element, name, "")
    }

    /// New detached text node owned by this document
    pub fn create_text(&mut self, value: &str) -> NodeId {
        self.create_node(NodeType::Text, "#text", value)
    }

    /// New detached comment owned by this document
    pub fn create_comment(&mut self, value: &str) -> NodeId {
        self.create_node(NodeType::Comment, "#comment", value)
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> Result<()> {
        let record = self.arena.get_mut(node)?;
        if record.node_type != NodeType::Element {
            return Err(DomError::InvalidNodeType {
                expected: NodeType::Element.to_string(),
                actual: record.node_type.to_string(),
            });
        }
        record.set_attr(name, value);
        Ok(())
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.arena.append_child(parent, child)
    }

    /// Compile a selector through the configured compiler, cached per (selector, prefix)
    pub fn compile(&self, selector: &str, prefix: &str) -> Result<String> {
        let capacity = self.config.selector_cache_capacity;
        if capacity == 0 {
            return self.compiler.compile(selector, prefix);
        }

        let key = (selector.to_string(), prefix.to_string());
        if let Some(hit) = self.selector_cache.borrow().get(&key) {
            trace!(selector, prefix, "selector cache hit");
            return Ok(hit.clone());
        }

        let expression = self.compiler.compile(selector, prefix)?;
        let mut cache = self.selector_cache.borrow_mut();
        if cache.len() >= capacity {
            trace!(capacity, "selector cache full, clearing");
            cache.clear();
        }
        cache.insert(key, expression.clone());
        trace!(selector, prefix, "selector cache miss");
        Ok(expression)
    }

    /// Evaluate a path expression with `context` as the context node
    pub fn evaluate(&self, expression: &str, context: NodeId) -> Result<Vec<NodeId>> {
        self.evaluator.evaluate(&self.arena, expression, context)
    }

    /// Sort nodes into document order and drop duplicates
    ///
    /// Nodes attached under the document root come first. Detached subtrees
    /// follow, grouped by their own root.
    pub fn sort_document_order(&self, nodes: &mut Vec<NodeId>) -> Result<()> {
        let mut keyed = Vec::with_capacity(nodes.len());
        for &node in nodes.iter() {
            keyed.push((self.position_key(node)?, node));
        }
        keyed.sort_by(|(a, _), (b, _)| compare_keys(a, b));
        keyed.dedup_by_key(|(_, node)| *node);

        *nodes = keyed.into_iter().map(|(_, node)| node).collect();
        Ok(())
    }

    /// (detached?, tree root, child index path from that root)
    fn position_key(&self, node: NodeId) -> Result<(bool, NodeId, Vec<usize>)> {
        let mut path = Vec::new();
        let mut current = node;
        while let Some(parent) = self.arena.parent_node(current)? {
            let index = self
                .arena
                .child_nodes(parent)?
                .iter()
                .position(|&id| id == current)
                .ok_or(DomError::NotAChild {
                    parent,
                    child: current,
                })?;
            path.push(index);
            current = parent;
        }
        path.reverse();
        Ok((current != self.root, current, path))
    }

    /// Load a fixture node (or a document node's children) under the root
    ///
    /// Returns the id of the last top-level node loaded.
    pub fn load_json(&mut self, value: &Value) -> Result<NodeId> {
        let node_type = fixture_node_type(value)?;
        if node_type != NodeType::Document {
            return self.load_node(value, self.root);
        }

        let mut last = self.root;
        if let Some(children) = value.get("children").and_then(Value::as_array) {
            for child in children {
                last = self.load_node(child, self.root)?;
            }
        }
        debug!(nodes = self.arena.len(), "loaded document fixture");
        Ok(last)
    }

    /// Recursively load a fixture node under `parent`
    fn load_node(&mut self, value: &Value, parent: NodeId) -> Result<NodeId> {
        let node_type = fixture_node_type(value)?;
        if node_type == NodeType::Document {
            return Err(DomError::InvalidFixture(
                "document nodes may only appear at the top level".to_string(),
            ));
        }

        let default_name = match node_type {
            NodeType::Text => "#text",
            NodeType::CdataSection => "#cdata-section",
            NodeType::Comment => "#comment",
            NodeType::DocumentFragment => "#document-fragment",
            _ => "",
        };
        let name = value
            .get("nodeName")
            .and_then(Value::as_str)
            .unwrap_or(default_name);
        let node_value = value.get("nodeValue").and_then(Value::as_str).unwrap_or("");

        let id = self.create_node(node_type, name, node_value);

        // Parse attributes: a flat [name, value, name, value, ...] list
        if let Some(attrs) = value.get("attributes").and_then(Value::as_array) {
            if attrs.len() % 2 != 0 {
                return Err(DomError::InvalidFixture(format!(
                    "odd attribute list on '{}'",
                    name
                )));
            }
            let record = self.arena.get_mut(id)?;
            for pair in attrs.chunks(2) {
                if let (Some(key), Some(attr_value)) = (pair[0].as_str(), pair[1].as_str()) {
                    record.set_attr(key, attr_value);
                }
            }
        }

        self.arena.append_child(parent, id)?;

        if let Some(children) = value.get("children").and_then(Value::as_array) {
            for child in children {
                self.load_node(child, id)?;
            }
        }

        Ok(id)
    }
}

fn fixture_node_type(value: &Value) -> Result<NodeType> {
    let raw = value
        .get("nodeType")
        .and_then(Value::as_u64)
        .ok_or_else(|| DomError::InvalidFixture("missing nodeType".to_string()))?;

    u8::try_from(raw)
        .ok()
        .and_then(NodeType::from_u8)
        .ok_or_else(|| DomError::InvalidNodeType {
            expected: "valid NodeType".to_string(),
            actual: raw.to_string(),
        })
}

fn compare_keys(a: &(bool, NodeId, Vec<usize>), b: &(bool, NodeId, Vec<usize>)) -> Ordering {
    a.0.cmp(&b.0)
        .then(a.1.cmp(&b.1))
        .then_with(|| a.2.cmp(&b.2))
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("config", &self.config)
            .field("root", &self.root)
            .field("nodes", &self.arena.len())
            .finish()
    }
}
