//! DOM navigation library
//!
//! Chainable traversal, filtering and mutation over an arena-backed DOM tree.
//!
//! ## Core Design
//!
//! ```text
//! JSON fixture / builders → DomArena (owned) → Document
//!                                                 ↓
//!                     NodeRef / NodeMut (TraversableNode) → NodeCollection
//!                                                 ↓
//!            CSS selector → SelectorCompiler → path → PathEvaluator
//! ```
//!
//! Nodes are addressed by `NodeId` (u32). Handles borrow the document, so a
//! shared `NodeRef` can never observe a half-applied mutation.
//!
//! ```no_run
//! use dom_nav::{Document, NodeType, TextFlags, TraversableNode};
//!
//! # fn main() -> dom_nav::Result<()> {
//! let doc = Document::from_json_str(
//!     r#"{"nodeType": 1, "nodeName": "ul", "children": [
//!         {"nodeType": 1, "nodeName": "li", "children": [{"nodeType": 3, "nodeValue": " a "}]},
//!         {"nodeType": 1, "nodeName": "li", "attributes": ["class", "on"]}
//!     ]}"#,
//! )?;
//! let ul = doc.node(doc.document_element().unwrap_or(doc.root()))?;
//! let items = ul.filter("li")?;
//! let first = doc.node(items[0])?;
//! assert_eq!(first.next(Some(NodeType::Element))?, Some(items[1]));
//! assert_eq!(first.text(TextFlags::TRIM)?, "a");
//! assert!(doc.node(items[1])?.is("li.on")?);
//! # Ok(())
//! # }
//! ```

pub mod arena;
pub mod collection;
pub mod document;
pub mod engine;
pub mod error;
pub mod node;
pub mod selector;
pub mod types;
pub mod utils;
pub mod xpath;

pub use arena::DomArena;
pub use collection::NodeCollection;
pub use document::{Document, DocumentConfig};
pub use engine::TreeEngine;
pub use error::{DomError, Result};
pub use node::{NodeMut, NodeRef, TraversableNode};
pub use selector::{CssSelectorCompiler, SelectorCompiler, DESCENDANT_PREFIX, SELF_PREFIX};
pub use types::*;
pub use xpath::{PathEvaluator, XPathEvaluator};
