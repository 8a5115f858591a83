//! Selector compilation
//!
//! Turns a CSS selector plus an axis prefix into a path expression that the
//! evaluator understands:
//!
//! ```text
//! "ul > li.active, p"  +  "descendant::"
//!   → descendant::ul/li[contains(concat(' ', normalize-space(@class), ' '), ' active ')] | descendant::p
//! ```
//!
//! The prefix only applies to the first compound of each group. It is what
//! lets `filter`, `is` and `has` share a single pipeline.

use crate::error::{DomError, Result};
use tracing::trace;

/// Prefix that scopes a selector to the context node's descendants
pub const DESCENDANT_PREFIX: &str = "descendant::";

/// Prefix that scopes a selector to the context node itself
pub const SELF_PREFIX: &str = "self::";

/// `compile(selector, prefix) -> path expression`
pub trait SelectorCompiler {
    fn compile(&self, selector: &str, prefix: &str) -> Result<String>;
}

impl<F> SelectorCompiler for F
where
    F: Fn(&str, &str) -> Result<String>,
{
    fn compile(&self, selector: &str, prefix: &str) -> Result<String> {
        self(selector, prefix)
    }
}

/// CSS subset compiler
///
/// Supported: type and universal selectors, `#id`, `.class`, attribute
/// selectors (`[a]`, `=`, `~=`, `|=`, `^=`, `*=`), the four combinators and
/// `,` groups. Pseudo-classes are rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct CssSelectorCompiler;

impl CssSelectorCompiler {
    pub fn new() -> Self {
        Self
    }
}

impl SelectorCompiler for CssSelectorCompiler {
    fn compile(&self, selector: &str, prefix: &str) -> Result<String> {
        let groups = Parser::new(selector).parse()?;
        let expression = groups
            .iter()
            .map(|group| render_group(group, prefix, selector))
            .collect::<Result<Vec<_>>>()?
            .join(" | ");

        trace!(selector, prefix, %expression, "compiled selector");
        Ok(expression)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
    Adjacent,
    Sibling,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Condition {
    Id(String),
    Class(String),
    Attribute {
        name: String,
        op: Option<AttrOp>,
        value: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttrOp {
    Equals,
    Includes,
    DashMatch,
    Prefix,
    Substring,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    conditions: Vec<Condition>,
}

/// One comma-separated group: a first compound, then (combinator, compound) pairs
type Group = (Compound, Vec<(Combinator, Compound)>);

struct Parser<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, message: impl Into<String>) -> DomError {
        DomError::selector(self.source, message)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn parse(mut self) -> Result<Vec<Group>> {
        let mut groups = Vec::new();
        loop {
            groups.push(self.parse_group()?);
            match self.peek() {
                None => break,
                Some(',') => self.pos += 1,
                Some(c) => return Err(self.error(format!("unexpected '{}'", c))),
            }
        }
        Ok(groups)
    }

    fn parse_group(&mut self) -> Result<Group> {
        self.skip_whitespace();
        let first = self.parse_compound()?;
        let mut rest = Vec::new();

        loop {
            let had_space = self.skip_whitespace();
            let combinator = match self.peek() {
                None | Some(',') => break,
                Some('>') => Combinator::Child,
                Some('+') => Combinator::Adjacent,
                Some('~') => Combinator::Sibling,
                Some(_) if had_space => Combinator::Descendant,
                Some(c) => return Err(self.error(format!("unexpected '{}'", c))),
            };
            if combinator != Combinator::Descendant {
                self.pos += 1;
                self.skip_whitespace();
            }
            rest.push((combinator, self.parse_compound()?));
        }

        Ok((first, rest))
    }

    fn parse_compound(&mut self) -> Result<Compound> {
        let mut compound = Compound::default();
        let mut has_type = false;

        match self.peek() {
            Some('*') => {
                self.pos += 1;
                has_type = true;
            }
            Some(c) if is_ident_char(c) => {
                compound.tag = Some(self.parse_name()?);
                has_type = true;
            }
            _ => {}
        }

        loop {
            match self.peek() {
                Some('#') => {
                    self.pos += 1;
                    compound.conditions.push(Condition::Id(self.parse_ident()?));
                }
                Some('.') => {
                    self.pos += 1;
                    compound.conditions.push(Condition::Class(self.parse_ident()?));
                }
                Some('[') => {
                    self.pos += 1;
                    compound.conditions.push(self.parse_attribute()?);
                }
                Some(':') => return Err(self.error("pseudo-classes are not supported")),
                _ => break,
            }
        }

        if !has_type && compound.conditions.is_empty() {
            return Err(match self.peek() {
                None => self.error("expected a selector"),
                Some(c) => self.error(format!("unexpected '{}'", c)),
            });
        }
        Ok(compound)
    }

    fn parse_ident(&mut self) -> Result<String> {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_char) {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.error("expected an identifier"));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    /// Element or attribute name; these end up as path name tests
    fn parse_name(&mut self) -> Result<String> {
        match self.peek() {
            Some(c) if is_name_start(c) => self.parse_ident(),
            Some(c) => Err(self.error(format!("a name cannot start with '{}'", c))),
            None => Err(self.error("expected a name")),
        }
    }

    fn parse_attribute(&mut self) -> Result<Condition> {
        self.skip_whitespace();
        let name = self.parse_name()?;
        self.skip_whitespace();

        let op = match self.peek() {
            Some(']') => {
                self.pos += 1;
                return Ok(Condition::Attribute {
                    name,
                    op: None,
                    value: String::new(),
                });
            }
            Some('=') => None,
            Some('~') => Some(AttrOp::Includes),
            Some('|') => Some(AttrOp::DashMatch),
            Some('^') => Some(AttrOp::Prefix),
            Some('*') => Some(AttrOp::Substring),
            Some('$') => return Err(self.error("suffix attribute match is not supported")),
            Some(c) => return Err(self.error(format!("unexpected '{}' in attribute selector", c))),
            None => return Err(self.error("unterminated attribute selector")),
        };
        if op.is_some() {
            self.pos += 1;
        }
        if self.peek() != Some('=') {
            return Err(self.error("expected '=' in attribute selector"));
        }
        self.pos += 1;
        self.skip_whitespace();

        let value = match self.peek() {
            Some(quote @ ('\'' | '"')) => {
                self.pos += 1;
                let start = self.pos;
                while self.peek().is_some_and(|c| c != quote) {
                    self.pos += 1;
                }
                if self.peek().is_none() {
                    return Err(self.error("unterminated string"));
                }
                let value: String = self.chars[start..self.pos].iter().collect();
                self.pos += 1;
                value
            }
            _ => self.parse_ident()?,
        };

        self.skip_whitespace();
        if self.peek() != Some(']') {
            return Err(self.error("unterminated attribute selector"));
        }
        self.pos += 1;

        Ok(Condition::Attribute {
            name,
            op: Some(op.unwrap_or(AttrOp::Equals)),
            value,
        })
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_' || !c.is_ascii()
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || !c.is_ascii()
}

/// XPath 1.0 has no escapes inside literals; pick the quote that is absent
fn literal(value: &str, selector: &str) -> Result<String> {
    if !value.contains('\'') {
        Ok(format!("'{}'", value))
    } else if !value.contains('"') {
        Ok(format!("\"{}\"", value))
    } else {
        Err(DomError::selector(
            selector,
            format!("value {:?} mixes both quote characters", value),
        ))
    }
}

fn token_match(attribute: &str, value: &str, selector: &str) -> Result<String> {
    Ok(format!(
        "[contains(concat(' ', normalize-space(@{}), ' '), {})]",
        attribute,
        literal(&format!(" {} ", value), selector)?
    ))
}

fn render_compound(compound: &Compound, selector: &str) -> Result<String> {
    let mut out = compound.tag.clone().unwrap_or_else(|| "*".to_string());

    for condition in &compound.conditions {
        let predicate = match condition {
            Condition::Id(id) => format!("[@id = {}]", literal(id, selector)?),
            Condition::Class(class) => token_match("class", class, selector)?,
            Condition::Attribute { name, op: None, .. } => format!("[@{}]", name),
            Condition::Attribute {
                name,
                op: Some(op),
                value,
            } => match op {
                AttrOp::Equals => format!("[@{} = {}]", name, literal(value, selector)?),
                AttrOp::Includes => token_match(name, value, selector)?,
                AttrOp::DashMatch => format!(
                    "[@{name} = {} or starts-with(@{name}, {})]",
                    literal(value, selector)?,
                    literal(&format!("{}-", value), selector)?
                ),
                AttrOp::Prefix => format!("[starts-with(@{}, {})]", name, literal(value, selector)?),
                AttrOp::Substring => format!("[contains(@{}, {})]", name, literal(value, selector)?),
            },
        };
        out.push_str(&predicate);
    }

    Ok(out)
}

fn render_group(group: &Group, prefix: &str, selector: &str) -> Result<String> {
    let (first, rest) = group;
    let mut out = format!("{}{}", prefix, render_compound(first, selector)?);

    for (combinator, compound) in rest {
        let step = render_compound(compound, selector)?;
        match combinator {
            Combinator::Descendant => out.push_str("/descendant-or-self::*/"),
            Combinator::Child => out.push('/'),
            Combinator::Adjacent => out.push_str("/following-sibling::*[1]/self::"),
            Combinator::Sibling => out.push_str("/following-sibling::"),
        }
        out.push_str(&step);
    }

    Ok(out)
}
