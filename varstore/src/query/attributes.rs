//! Boolean expressions over bit-encoded enumerations.
//!
//! `prb and not sib`, `(mom or dad) and affected`, `any(prb, sib)`,
//! `all([denovo, possible_denovo])`: every token names one variant of a
//! [`BitmaskEnum`] and tests one bit of an integer column. Precedence is
//! `not` > `and` > `or`.

use std::fmt::Display;
use std::marker::PhantomData;

use once_cell::sync::Lazy;
use regex_lite::Regex;

use crate::data_structs::{
    BitmaskEnum,
    Inheritance,
    Role,
};
use crate::errors::{
    StorageError,
    StorageResult,
};
use crate::query::predicate::Predicate;

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[()\[\],]|[A-Za-z0-9_+\-]+|\S").expect("token pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Open,
    Close,
    ListOpen,
    ListClose,
    Comma,
    Not,
    And,
    Or,
    Any,
    All,
    Word(String),
}

fn tokenize(source: &str) -> StorageResult<Vec<Token>> {
    TOKEN_RE
        .find_iter(source)
        .map(|m| {
            let text = m.as_str();
            let token = match text.to_lowercase().as_str() {
                "(" => Token::Open,
                ")" => Token::Close,
                "[" => Token::ListOpen,
                "]" => Token::ListClose,
                "," => Token::Comma,
                "not" => Token::Not,
                "and" => Token::And,
                "or" => Token::Or,
                "any" => Token::Any,
                "all" => Token::All,
                _ if text.chars().all(|c| c.is_ascii_alphanumeric() || "_+-".contains(c)) => {
                    Token::Word(text.to_string())
                },
                _ => {
                    return Err(StorageError::Query(format!(
                        "unexpected character '{}' in '{}'",
                        text, source
                    )))
                },
            };
            Ok(token)
        })
        .collect()
}

/// Parsed expression; tokens are already resolved to their bit values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryNode {
    Bit { name: String, value: u32 },
    Not(Box<QueryNode>),
    And(Box<QueryNode>, Box<QueryNode>),
    Or(Box<QueryNode>, Box<QueryNode>),
}

impl QueryNode {
    /// A token matches when all of its bits are set in `mask`.
    pub fn matches(
        &self,
        mask: u32,
    ) -> bool {
        match self {
            QueryNode::Bit { value, .. } => mask & value == *value,
            QueryNode::Not(inner) => !inner.matches(mask),
            QueryNode::And(left, right) => left.matches(mask) && right.matches(mask),
            QueryNode::Or(left, right) => left.matches(mask) || right.matches(mask),
        }
    }

    pub fn to_predicate(
        &self,
        column: &str,
    ) -> Predicate {
        match self {
            QueryNode::Bit { value, .. } => Predicate::bit_and(column, *value),
            QueryNode::Not(inner) => inner.to_predicate(column).not(),
            QueryNode::And(left, right) => {
                left.to_predicate(column)
                    .and(right.to_predicate(column))
            },
            QueryNode::Or(left, right) => {
                left.to_predicate(column)
                    .or(right.to_predicate(column))
            },
        }
    }
}

impl Display for QueryNode {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            QueryNode::Bit { name, .. } => write!(f, "{}", name),
            QueryNode::Not(inner) => write!(f, "not {}", inner),
            QueryNode::And(left, right) => write!(f, "({} and {})", left, right),
            QueryNode::Or(left, right) => write!(f, "({} or {})", left, right),
        }
    }
}

struct Parser<'a, E: BitmaskEnum> {
    source: &'a str,
    tokens: Vec<Token>,
    pos:    usize,
    _enum:  PhantomData<E>,
}

impl<'a, E: BitmaskEnum> Parser<'a, E> {
    fn error(
        &self,
        message: impl Display,
    ) -> StorageError {
        StorageError::Query(format!("{} in '{}'", message, self.source))
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(
        &mut self,
        expected: Token,
    ) -> StorageResult<()> {
        match self.next() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(self.error(format!("expected {:?}, found {:?}", expected, token))),
            None => Err(self.error(format!("expected {:?} at end of input", expected))),
        }
    }

    fn parse(mut self) -> StorageResult<QueryNode> {
        let node = self.or_expr()?;
        match self.peek() {
            None => Ok(node),
            Some(token) => Err(self.error(format!("unexpected {:?}", token))),
        }
    }

    fn or_expr(&mut self) -> StorageResult<QueryNode> {
        let mut node = self.and_expr()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            node = QueryNode::Or(Box::new(node), Box::new(self.and_expr()?));
        }
        Ok(node)
    }

    fn and_expr(&mut self) -> StorageResult<QueryNode> {
        let mut node = self.unary()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            node = QueryNode::And(Box::new(node), Box::new(self.unary()?));
        }
        Ok(node)
    }

    fn unary(&mut self) -> StorageResult<QueryNode> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            return Ok(QueryNode::Not(Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> StorageResult<QueryNode> {
        match self.next() {
            Some(Token::Open) => {
                let node = self.or_expr()?;
                self.expect(Token::Close)?;
                Ok(node)
            },
            Some(Token::Any) => self.list(QueryNode::Or),
            Some(Token::All) => self.list(QueryNode::And),
            Some(Token::Word(word)) => {
                let value = word
                    .parse::<E>()
                    .map_err(|_| self.error(format!("unknown token '{}'", word)))?;
                Ok(QueryNode::Bit {
                    name:  word.to_lowercase(),
                    value: value.value(),
                })
            },
            Some(token) => Err(self.error(format!("unexpected {:?}", token))),
            None => Err(self.error("unexpected end of input")),
        }
    }

    /// `(a, b)` or `([a, b])` folded left with `combine`.
    fn list(
        &mut self,
        combine: fn(Box<QueryNode>, Box<QueryNode>) -> QueryNode,
    ) -> StorageResult<QueryNode> {
        self.expect(Token::Open)?;
        let bracketed = self.peek() == Some(&Token::ListOpen);
        if bracketed {
            self.pos += 1;
        }
        let mut node = self.or_expr()?;
        while self.peek() == Some(&Token::Comma) {
            self.pos += 1;
            node = combine(Box::new(node), Box::new(self.or_expr()?));
        }
        if bracketed {
            self.expect(Token::ListClose)?;
        }
        self.expect(Token::Close)?;
        Ok(node)
    }
}

/// Compiled attribute expression over the enumeration `E`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeQuery<E: BitmaskEnum> {
    source: String,
    root:   QueryNode,
    _enum:  PhantomData<E>,
}

impl<E: BitmaskEnum> AttributeQuery<E> {
    pub fn parse(source: &str) -> StorageResult<Self> {
        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Err(StorageError::Query("empty attribute expression".into()));
        }
        let root = Parser::<E> {
            source,
            tokens,
            pos: 0,
            _enum: PhantomData,
        }
        .parse()?;
        Ok(Self {
            source: source.to_string(),
            root,
            _enum: PhantomData,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn root(&self) -> &QueryNode {
        &self.root
    }

    pub fn matches(
        &self,
        mask: u32,
    ) -> bool {
        self.root.matches(mask)
    }

    /// Bitwise predicate over `column`.
    pub fn to_predicate(
        &self,
        column: &str,
    ) -> Predicate {
        self.root.to_predicate(column)
    }
}

/// Roles expression that can only be met by alleles found in children:
/// satisfied by `prb|sib`, not satisfied once the parents carry it too.
pub fn roles_denovo_only(query: &AttributeQuery<Role>) -> bool {
    let children = Role::Prb.value() | Role::Sib.value();
    let with_parents = children | Role::Mom.value() | Role::Dad.value();
    query.matches(children) && !query.matches(with_parents)
}

/// Inheritance expressions (AND-ed) that only a mask carrying the denovo bit
/// can satisfy. Every combination of the remaining bits is checked, so
/// expressions admitting omission, other or unknown rows are never denovo-only.
pub fn inheritance_denovo_only(queries: &[AttributeQuery<Inheritance>]) -> bool {
    if queries.is_empty() {
        return false;
    }
    let others = Inheritance::ALL
        .iter()
        .filter(|i| **i != Inheritance::Denovo)
        .map(|i| i.value())
        .collect::<Vec<_>>();
    (0u32..1 << others.len())
        .map(|subset| {
            others
                .iter()
                .enumerate()
                .filter(|(bit, _)| subset & (1 << bit) != 0)
                .fold(0, |mask, (_, value)| mask | value)
        })
        .all(|mask| !queries.iter().all(|q| q.matches(mask)))
}
