//! Expression evaluator against a `TreeEngine`

use super::parser::{Axis, Expression, Function, LocationPath, NodeTest, Predicate, Step};
use crate::engine::TreeEngine;
use crate::error::{DomError, Result};
use crate::types::{NodeId, NodeType};
use crate::utils::collapse_whitespace;
use ahash::{AHashMap, AHashSet};
use std::cell::RefCell;

/// Value of a predicate sub-expression
#[derive(Debug, Clone, PartialEq)]
enum Value {
    Bool(bool),
    Number(f64),
    Str(String),
    /// Attribute lookup: an empty node-set when absent
    Attr(Option<String>),
}

impl Value {
    fn truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Attr(a) => a.is_some(),
        }
    }

    fn into_string(self) -> String {
        match self {
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::Str(s) => s,
            Value::Attr(a) => a.unwrap_or_default(),
        }
    }
}

pub(crate) struct Evaluation<'t> {
    tree: &'t dyn TreeEngine,
    case_insensitive: bool,
    /// Index of a node in its parent's child list, filled one parent at a time
    child_index: RefCell<AHashMap<NodeId, usize>>,
}

impl<'t> Evaluation<'t> {
    pub(crate) fn new(tree: &'t dyn TreeEngine, case_insensitive: bool) -> Self {
        Self {
            tree,
            case_insensitive,
            child_index: RefCell::new(AHashMap::new()),
        }
    }

    pub(crate) fn run(&self, expression: &Expression, context: NodeId) -> Result<Vec<NodeId>> {
        let mut result = Vec::new();
        for path in &expression.paths {
            result.extend(self.eval_path(path, context)?);
        }
        self.normalize(result)
    }

    /// Deduplicate and sort into document order
    fn normalize(&self, nodes: Vec<NodeId>) -> Result<Vec<NodeId>> {
        let mut seen = AHashSet::with_capacity(nodes.len());
        let unique: Vec<NodeId> = nodes.into_iter().filter(|id| seen.insert(*id)).collect();
        if unique.len() < 2 {
            return Ok(unique);
        }

        let mut keyed = Vec::with_capacity(unique.len());
        for id in unique {
            keyed.push((self.position(id)?, id));
        }
        keyed.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(keyed.into_iter().map(|(_, id)| id).collect())
    }

    /// Child-index path from the tree root; prefixes sort first
    fn position(&self, node: NodeId) -> Result<Vec<usize>> {
        let mut path = Vec::new();
        let mut current = node;
        while let Some(parent) = self.tree.parent_node(current)? {
            path.push(self.index_in(parent, current)?);
            current = parent;
        }
        path.reverse();
        Ok(path)
    }

    fn index_in(&self, parent: NodeId, node: NodeId) -> Result<usize> {
        if let Some(&index) = self.child_index.borrow().get(&node) {
            return Ok(index);
        }
        let mut index = self.child_index.borrow_mut();
        for (i, &child) in self.tree.child_nodes(parent)?.iter().enumerate() {
            index.insert(child, i);
        }
        index
            .get(&node)
            .copied()
            .ok_or(DomError::NotAChild {
                parent,
                child: node,
            })
    }

    fn eval_path(&self, path: &LocationPath, context: NodeId) -> Result<Vec<NodeId>> {
        let start = if path.absolute {
            self.tree.root_of(context)?
        } else {
            context
        };

        let mut current = vec![start];
        for step in &path.steps {
            let mut next = Vec::new();
            for &node in &current {
                next.extend(self.eval_step(step, node)?);
            }
            current = self.normalize(next)?;
            if current.is_empty() {
                break;
            }
        }
        Ok(current)
    }

    /// Candidates in axis order, nearest first for reverse axes
    fn axis_nodes(&self, axis: Axis, node: NodeId) -> Result<Vec<NodeId>> {
        let tree = self.tree;
        let mut out = Vec::new();
        match axis {
            Axis::SelfAxis => out.push(node),
            Axis::Child => out.extend_from_slice(tree.child_nodes(node)?),
            Axis::Descendant | Axis::DescendantOrSelf => {
                if axis == Axis::DescendantOrSelf {
                    out.push(node);
                }
                let mut stack: Vec<NodeId> = tree.child_nodes(node)?.iter().rev().copied().collect();
                while let Some(id) = stack.pop() {
                    out.push(id);
                    stack.extend(tree.child_nodes(id)?.iter().rev());
                }
            }
            Axis::Parent => out.extend(tree.parent_node(node)?),
            Axis::Ancestor => {
                let mut current = tree.parent_node(node)?;
                while let Some(id) = current {
                    out.push(id);
                    current = tree.parent_node(id)?;
                }
            }
            Axis::FollowingSibling => out.extend_from_slice(tree.split_siblings(node)?.1),
            Axis::PrecedingSibling => out.extend(tree.split_siblings(node)?.0.iter().rev()),
        }
        Ok(out)
    }

    fn matches_test(&self, test: &NodeTest, node: NodeId) -> Result<bool> {
        let node_type = self.tree.node_type(node)?;
        Ok(match test {
            NodeTest::Node => true,
            NodeTest::Text => matches!(node_type, NodeType::Text | NodeType::CdataSection),
            NodeTest::Comment => node_type == NodeType::Comment,
            NodeTest::AnyElement => node_type == NodeType::Element,
            NodeTest::Name(name) => {
                node_type == NodeType::Element && {
                    let actual = self.tree.node_name(node)?;
                    if self.case_insensitive {
                        actual.eq_ignore_ascii_case(name)
                    } else {
                        actual == name
                    }
                }
            }
        })
    }

    fn eval_step(&self, step: &Step, node: NodeId) -> Result<Vec<NodeId>> {
        let mut candidates = Vec::new();
        for id in self.axis_nodes(step.axis, node)? {
            if self.matches_test(&step.test, id)? {
                candidates.push(id);
            }
        }

        for predicate in &step.predicates {
            let mut kept = Vec::with_capacity(candidates.len());
            for (index, &id) in candidates.iter().enumerate() {
                let keep = match self.eval_predicate(predicate, id)? {
                    Value::Number(n) => n == (index + 1) as f64,
                    other => other.truthy(),
                };
                if keep {
                    kept.push(id);
                }
            }
            candidates = kept;
        }

        Ok(candidates)
    }

    fn eval_predicate(&self, predicate: &Predicate, node: NodeId) -> Result<Value> {
        Ok(match predicate {
            Predicate::Literal(s) => Value::Str(s.clone()),
            Predicate::Number(n) => Value::Number(*n),
            Predicate::Attribute(name) => {
                Value::Attr(self.tree.attribute(node, name)?.map(str::to_string))
            }
            Predicate::Or(a, b) => Value::Bool(
                self.eval_predicate(a, node)?.truthy() || self.eval_predicate(b, node)?.truthy(),
            ),
            Predicate::And(a, b) => Value::Bool(
                self.eval_predicate(a, node)?.truthy() && self.eval_predicate(b, node)?.truthy(),
            ),
            Predicate::Equals(a, b) => {
                let (a, b) = (self.eval_predicate(a, node)?, self.eval_predicate(b, node)?);
                Value::Bool(compare(a, b).unwrap_or(false))
            }
            Predicate::NotEquals(a, b) => {
                let (a, b) = (self.eval_predicate(a, node)?, self.eval_predicate(b, node)?);
                Value::Bool(compare(a, b).map(|eq| !eq).unwrap_or(false))
            }
            Predicate::Call(function, args) => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval_predicate(arg, node)?);
                }
                call(*function, values)
            }
        })
    }
}

/// Equality under XPath 1.0 conversion rules; None when a side is an empty node-set
fn compare(a: Value, b: Value) -> Option<bool> {
    match (a, b) {
        (Value::Attr(None), _) | (_, Value::Attr(None)) => None,
        (Value::Bool(x), other) | (other, Value::Bool(x)) => Some(x == other.truthy()),
        (Value::Number(x), other) | (other, Value::Number(x)) => {
            Some(other.into_string().trim().parse::<f64>().is_ok_and(|y| y == x))
        }
        (a, b) => Some(a.into_string() == b.into_string()),
    }
}

fn call(function: Function, mut args: Vec<Value>) -> Value {
    match function {
        Function::Not => Value::Bool(!args.remove(0).truthy()),
        Function::Contains => {
            let needle = args.remove(1).into_string();
            Value::Bool(args.remove(0).into_string().contains(&needle))
        }
        Function::StartsWith => {
            let prefix = args.remove(1).into_string();
            Value::Bool(args.remove(0).into_string().starts_with(&prefix))
        }
        Function::Concat => Value::Str(args.into_iter().map(Value::into_string).collect()),
        Function::NormalizeSpace => {
            Value::Str(collapse_whitespace(&args.remove(0).into_string()).trim_matches(' ').to_string())
        }
    }
}
