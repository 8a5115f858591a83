//! Tokenizer and recursive descent parser for location paths

use crate::error::{DomError, Result};

/// A `|` separated union of location paths
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub paths: Vec<LocationPath>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocationPath {
    /// Starts at the root of the context node's tree
    pub absolute: bool,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub axis: Axis,
    pub test: NodeTest,
    pub predicates: Vec<Predicate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    SelfAxis,
    Child,
    Descendant,
    DescendantOrSelf,
    Parent,
    Ancestor,
    FollowingSibling,
    PrecedingSibling,
}

impl Axis {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "self" => Some(Axis::SelfAxis),
            "child" => Some(Axis::Child),
            "descendant" => Some(Axis::Descendant),
            "descendant-or-self" => Some(Axis::DescendantOrSelf),
            "parent" => Some(Axis::Parent),
            "ancestor" => Some(Axis::Ancestor),
            "following-sibling" => Some(Axis::FollowingSibling),
            "preceding-sibling" => Some(Axis::PrecedingSibling),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeTest {
    Name(String),
    /// `*`: any element
    AnyElement,
    /// `node()`
    Node,
    /// `text()`
    Text,
    /// `comment()`
    Comment,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Or(Box<Predicate>, Box<Predicate>),
    And(Box<Predicate>, Box<Predicate>),
    Equals(Box<Predicate>, Box<Predicate>),
    NotEquals(Box<Predicate>, Box<Predicate>),
    Attribute(String),
    Literal(String),
    Number(f64),
    Call(Function, Vec<Predicate>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Not,
    Contains,
    StartsWith,
    Concat,
    NormalizeSpace,
}

impl Function {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "not" => Some(Function::Not),
            "contains" => Some(Function::Contains),
            "starts-with" => Some(Function::StartsWith),
            "concat" => Some(Function::Concat),
            "normalize-space" => Some(Function::NormalizeSpace),
            _ => None,
        }
    }

    fn accepts(self, arity: usize) -> bool {
        match self {
            Function::Not => arity == 1,
            Function::Contains | Function::StartsWith => arity == 2,
            Function::Concat => arity >= 2,
            Function::NormalizeSpace => arity == 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Slash,
    DoubleSlash,
    Pipe,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Comma,
    At,
    Star,
    Dot,
    DotDot,
    ColonColon,
    Equals,
    NotEquals,
    Name(String),
    Literal(String),
    Number(f64),
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || !c.is_ascii()
}

fn is_name_char(c: char) -> bool {
    is_name_start(c) || c.is_ascii_digit() || c == '-' || c == '.'
}

fn tokenize(expression: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = expression.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        let token = match c {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '/' if next == Some('/') => {
                i += 1;
                Token::DoubleSlash
            }
            '/' => Token::Slash,
            '|' => Token::Pipe,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            '(' => Token::LParen,
            ')' => Token::RParen,
            ',' => Token::Comma,
            '@' => Token::At,
            '*' => Token::Star,
            '=' => Token::Equals,
            '!' if next == Some('=') => {
                i += 1;
                Token::NotEquals
            }
            ':' if next == Some(':') => {
                i += 1;
                Token::ColonColon
            }
            '.' if next == Some('.') => {
                i += 1;
                Token::DotDot
            }
            '.' if !next.is_some_and(|n| n.is_ascii_digit()) => Token::Dot,
            quote @ ('\'' | '"') => {
                let start = i + 1;
                let end = chars[start..]
                    .iter()
                    .position(|&ch| ch == quote)
                    .map(|offset| start + offset)
                    .ok_or_else(|| DomError::path(expression, "unterminated string literal"))?;
                i = end;
                Token::Literal(chars[start..end].iter().collect())
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while chars.get(i + 1).is_some_and(|ch| ch.is_ascii_digit() || *ch == '.') {
                    i += 1;
                }
                let text: String = chars[start..=i].iter().collect();
                let value = text
                    .parse::<f64>()
                    .map_err(|_| DomError::path(expression, format!("invalid number '{}'", text)))?;
                Token::Number(value)
            }
            c if is_name_start(c) => {
                let start = i;
                while chars.get(i + 1).copied().is_some_and(is_name_char) {
                    i += 1;
                }
                Token::Name(chars[start..=i].iter().collect())
            }
            other => {
                return Err(DomError::path(
                    expression,
                    format!("unexpected character '{}'", other),
                ))
            }
        };
        tokens.push(token);
        i += 1;
    }

    Ok(tokens)
}

/// Parse a path expression
pub fn parse(expression: &str) -> Result<Expression> {
    let tokens = tokenize(expression)?;
    let mut parser = Parser {
        expression,
        tokens,
        pos: 0,
    };
    let parsed = parser.parse_union()?;
    if let Some(token) = parser.peek() {
        return Err(parser.error(format!("unexpected {:?}", token)));
    }
    Ok(parsed)
}

struct Parser<'a> {
    expression: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn error(&self, message: impl Into<String>) -> DomError {
        DomError::path(self.expression, message)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<()> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error(format!("expected {:?}", token)))
        }
    }

    fn parse_union(&mut self) -> Result<Expression> {
        let mut paths = vec![self.parse_path()?];
        while self.eat(&Token::Pipe) {
            paths.push(self.parse_path()?);
        }
        Ok(Expression { paths })
    }

    fn parse_path(&mut self) -> Result<LocationPath> {
        let mut steps = Vec::new();
        let absolute = match self.peek() {
            Some(Token::Slash) => {
                self.pos += 1;
                // A lone "/" selects the root itself
                if !self.starts_step() {
                    return Ok(LocationPath {
                        absolute: true,
                        steps,
                    });
                }
                true
            }
            Some(Token::DoubleSlash) => {
                self.pos += 1;
                steps.push(descendant_or_self_node());
                true
            }
            _ => false,
        };

        steps.push(self.parse_step()?);
        loop {
            if self.eat(&Token::Slash) {
                steps.push(self.parse_step()?);
            } else if self.eat(&Token::DoubleSlash) {
                steps.push(descendant_or_self_node());
                steps.push(self.parse_step()?);
            } else {
                break;
            }
        }

        Ok(LocationPath { absolute, steps })
    }

    fn starts_step(&self) -> bool {
        matches!(
            self.peek(),
            Some(Token::Name(_) | Token::Star | Token::Dot | Token::DotDot)
        )
    }

    fn parse_step(&mut self) -> Result<Step> {
        if self.eat(&Token::Dot) {
            return Ok(Step {
                axis: Axis::SelfAxis,
                test: NodeTest::Node,
                predicates: Vec::new(),
            });
        }
        if self.eat(&Token::DotDot) {
            return Ok(Step {
                axis: Axis::Parent,
                test: NodeTest::Node,
                predicates: Vec::new(),
            });
        }
        if self.peek() == Some(&Token::At) {
            return Err(self.error("attribute steps are only supported inside predicates"));
        }

        let axis = match (self.peek(), self.peek_at(1)) {
            (Some(Token::Name(name)), Some(Token::ColonColon)) => {
                let axis = Axis::from_name(name)
                    .ok_or_else(|| self.error(format!("unsupported axis '{}'", name)))?;
                self.pos += 2;
                axis
            }
            _ => Axis::Child,
        };

        let test = match self.peek().cloned() {
            Some(Token::Star) => {
                self.pos += 1;
                NodeTest::AnyElement
            }
            Some(Token::Name(name)) => {
                self.pos += 1;
                if self.eat(&Token::LParen) {
                    self.expect(&Token::RParen)?;
                    match name.as_str() {
                        "node" => NodeTest::Node,
                        "text" => NodeTest::Text,
                        "comment" => NodeTest::Comment,
                        other => return Err(self.error(format!("unsupported node test '{}()'", other))),
                    }
                } else {
                    NodeTest::Name(name)
                }
            }
            _ => return Err(self.error("expected a node test")),
        };

        let mut predicates = Vec::new();
        while self.eat(&Token::LBracket) {
            predicates.push(self.parse_or()?);
            self.expect(&Token::RBracket)?;
        }

        Ok(Step {
            axis,
            test,
            predicates,
        })
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        match self.peek() {
            Some(Token::Name(name)) if name == keyword => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    fn parse_or(&mut self) -> Result<Predicate> {
        let mut left = self.parse_and()?;
        while self.eat_keyword("or") {
            left = Predicate::Or(Box::new(left), Box::new(self.parse_and()?));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Predicate> {
        let mut left = self.parse_equality()?;
        while self.eat_keyword("and") {
            left = Predicate::And(Box::new(left), Box::new(self.parse_equality()?));
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Predicate> {
        let left = self.parse_primary()?;
        if self.eat(&Token::Equals) {
            return Ok(Predicate::Equals(Box::new(left), Box::new(self.parse_primary()?)));
        }
        if self.eat(&Token::NotEquals) {
            return Ok(Predicate::NotEquals(Box::new(left), Box::new(self.parse_primary()?)));
        }
        Ok(left)
    }

    fn parse_primary(&mut self) -> Result<Predicate> {
        match self.peek().cloned() {
            Some(Token::At) => {
                self.pos += 1;
                match self.peek().cloned() {
                    Some(Token::Name(name)) => {
                        self.pos += 1;
                        Ok(Predicate::Attribute(name))
                    }
                    _ => Err(self.error("expected an attribute name after '@'")),
                }
            }
            Some(Token::Literal(value)) => {
                self.pos += 1;
                Ok(Predicate::Literal(value))
            }
            Some(Token::Number(value)) => {
                self.pos += 1;
                Ok(Predicate::Number(value))
            }
            Some(Token::LParen) => {
                self.pos += 1;
                let inner = self.parse_or()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Name(name)) if self.peek_at(1) == Some(&Token::LParen) => {
                let function = Function::from_name(&name)
                    .ok_or_else(|| self.error(format!("unsupported function '{}'", name)))?;
                self.pos += 2;

                let mut args = Vec::new();
                if !self.eat(&Token::RParen) {
                    loop {
                        args.push(self.parse_or()?);
                        if self.eat(&Token::Comma) {
                            continue;
                        }
                        self.expect(&Token::RParen)?;
                        break;
                    }
                }
                if !function.accepts(args.len()) {
                    return Err(self.error(format!(
                        "wrong number of arguments for '{}': {}",
                        name,
                        args.len()
                    )));
                }
                Ok(Predicate::Call(function, args))
            }
            Some(token) => Err(self.error(format!("unexpected {:?} in predicate", token))),
            None => Err(self.error("unterminated predicate")),
        }
    }
}

fn descendant_or_self_node() -> Step {
    Step {
        axis: Axis::DescendantOrSelf,
        test: NodeTest::Node,
        predicates: Vec::new(),
    }
}
