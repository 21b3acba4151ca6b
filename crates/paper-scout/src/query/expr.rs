//! Interest expressions: a small boolean language over keyword terms.
//!
//! ```text
//! expr    := or
//! or      := and ("OR" and)*
//! and     := unary (("AND")? unary)*        adjacency is an implicit AND
//! unary   := "NOT" unary | primary
//! primary := "(" expr ")" | term
//! term    := "[" text "]" | '"' text '"' | word+
//! ```
//!
//! Operators are uppercase. Consecutive bare words form a single phrase, so
//! `single cell AND atlas` has the terms `single cell` and `atlas`.

use std::fmt;

use crate::error::QueryError;

/// Maximum nesting of parentheses and `NOT`s.
pub const MAX_DEPTH: usize = 64;

/// A parsed interest expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// A keyword or phrase.
    Term(String),
    /// Every child must match.
    And(Vec<Expr>),
    /// Any child may match.
    Or(Vec<Expr>),
    /// The child must not match.
    Not(Box<Expr>),
}

impl Expr {
    /// Parse an expression.
    pub fn parse(text: &str) -> Result<Self, QueryError> {
        let tokens = lex(text)?;
        if tokens.is_empty() {
            return Err(QueryError::Empty);
        }
        let mut parser = Parser { tokens, pos: 0, depth: 0 };
        let expr = parser.parse_or()?;
        if let Some(token) = parser.tokens.get(parser.pos) {
            return Err(match token.kind {
                Kind::RParen => QueryError::UnbalancedParen { offset: token.offset },
                _ => QueryError::DanglingOperator {
                    operator: token.kind.to_string(),
                    offset: token.offset,
                },
            });
        }
        Ok(expr)
    }

    /// Build a term.
    #[must_use]
    pub fn term(text: impl Into<String>) -> Self {
        Self::Term(text.into())
    }

    /// Conjunction, flattening nested conjunctions.
    #[must_use]
    pub fn and(children: Vec<Self>) -> Self {
        Self::flatten(children, true)
    }

    /// Disjunction, flattening nested disjunctions.
    #[must_use]
    pub fn or(children: Vec<Self>) -> Self {
        Self::flatten(children, false)
    }

    /// Negation.
    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn not(child: Self) -> Self {
        Self::Not(Box::new(child))
    }

    fn flatten(children: Vec<Self>, conjunctive: bool) -> Self {
        let mut flat = Vec::with_capacity(children.len());
        for child in children {
            match child {
                Self::And(inner) if conjunctive => flat.extend(inner),
                Self::Or(inner) if !conjunctive => flat.extend(inner),
                other => flat.push(other),
            }
        }
        if flat.len() == 1 {
            return flat.remove(0);
        }
        if conjunctive { Self::And(flat) } else { Self::Or(flat) }
    }

    /// True when the expression is a term or an OR of terms (at any depth).
    #[must_use]
    pub fn is_disjunctive(&self) -> bool {
        match self {
            Self::Term(_) => true,
            Self::Or(children) => children.iter().all(Self::is_disjunctive),
            Self::And(_) | Self::Not(_) => false,
        }
    }

    /// Terms that occur under an even number of negations, first occurrence order.
    #[must_use]
    pub fn positive_terms(&self) -> Vec<&str> {
        self.terms_with_polarity(true)
    }

    /// Terms that occur under an odd number of negations, first occurrence order.
    #[must_use]
    pub fn negated_terms(&self) -> Vec<&str> {
        self.terms_with_polarity(false)
    }

    fn terms_with_polarity(&self, positive: bool) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_terms(true, positive, &mut out);
        out
    }

    fn collect_terms<'a>(&'a self, polarity: bool, wanted: bool, out: &mut Vec<&'a str>) {
        match self {
            Self::Term(term) => {
                if polarity == wanted
                    && !out.iter().any(|seen: &&str| seen.eq_ignore_ascii_case(term))
                {
                    out.push(term);
                }
            }
            Self::Not(child) => child.collect_terms(!polarity, wanted, out),
            Self::And(children) | Self::Or(children) => {
                for child in children {
                    child.collect_terms(polarity, wanted, out);
                }
            }
        }
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And(_) | Self::Or(_) => write!(f, "({self})"),
            _ => write!(f, "{self}"),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Term(term) => write!(f, "[{term}]"),
            Self::Not(child) => {
                f.write_str("NOT ")?;
                child.fmt_operand(f)
            }
            Self::And(children) | Self::Or(children) => {
                let op = if matches!(self, Self::And(_)) { " AND " } else { " OR " };
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        f.write_str(op)?;
                    }
                    child.fmt_operand(f)?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Kind {
    LParen,
    RParen,
    And,
    Or,
    Not,
    Term(String),
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LParen => f.write_str("("),
            Self::RParen => f.write_str(")"),
            Self::And => f.write_str("AND"),
            Self::Or => f.write_str("OR"),
            Self::Not => f.write_str("NOT"),
            Self::Term(t) => write!(f, "[{t}]"),
        }
    }
}

#[derive(Debug, Clone)]
struct Token {
    kind: Kind,
    offset: usize,
}

fn lex(text: &str) -> Result<Vec<Token>, QueryError> {
    let mut tokens: Vec<Token> = Vec::new();
    let mut chars = text.char_indices().peekable();
    // Set while the previous token is a bare word that the next word may extend.
    let mut open_phrase = false;

    while let Some(&(offset, ch)) = chars.peek() {
        if ch.is_whitespace() {
            chars.next();
            continue;
        }
        match ch {
            '(' | ')' => {
                chars.next();
                let kind = if ch == '(' { Kind::LParen } else { Kind::RParen };
                tokens.push(Token { kind, offset });
                open_phrase = false;
            }
            '[' | '"' => {
                chars.next();
                let close = if ch == '[' { ']' } else { '"' };
                let mut term = String::new();
                let mut closed = false;
                for (_, c) in chars.by_ref() {
                    if c == close {
                        closed = true;
                        break;
                    }
                    term.push(c);
                }
                if !closed {
                    return Err(QueryError::UnterminatedTerm { offset });
                }
                let term = collapse_ws(&term);
                if !term.is_empty() {
                    tokens.push(Token { kind: Kind::Term(term), offset });
                }
                open_phrase = false;
            }
            _ => {
                let mut word = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_whitespace() || matches!(c, '(' | ')' | '[' | '"') {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                let kind = match word.as_str() {
                    "AND" => Some(Kind::And),
                    "OR" => Some(Kind::Or),
                    "NOT" => Some(Kind::Not),
                    _ => None,
                };
                if let Some(kind) = kind {
                    tokens.push(Token { kind, offset });
                    open_phrase = false;
                } else if open_phrase {
                    if let Some(Token { kind: Kind::Term(phrase), .. }) = tokens.last_mut() {
                        phrase.push(' ');
                        phrase.push_str(&word);
                    }
                } else {
                    tokens.push(Token { kind: Kind::Term(word), offset });
                    open_phrase = true;
                }
            }
        }
    }
    Ok(tokens)
}

fn collapse_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Kind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn descend(&mut self, offset: usize) -> Result<(), QueryError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(QueryError::TooDeep { offset });
        }
        Ok(())
    }

    fn starts_operand(&self) -> bool {
        matches!(self.peek(), Some(Kind::Term(_) | Kind::LParen | Kind::Not))
    }

    /// Consume an operator token and insist that an operand follows it.
    fn operator(&mut self) -> Result<(), QueryError> {
        let token = self.tokens[self.pos].clone();
        self.pos += 1;
        if self.starts_operand() {
            Ok(())
        } else {
            Err(QueryError::DanglingOperator { operator: token.kind.to_string(), offset: token.offset })
        }
    }

    fn parse_or(&mut self) -> Result<Expr, QueryError> {
        let mut children = vec![self.parse_and()?];
        while matches!(self.peek(), Some(Kind::Or)) {
            self.operator()?;
            children.push(self.parse_and()?);
        }
        Ok(Expr::or(children))
    }

    fn parse_and(&mut self) -> Result<Expr, QueryError> {
        let mut children = vec![self.parse_unary()?];
        loop {
            if matches!(self.peek(), Some(Kind::And)) {
                self.operator()?;
            } else if !self.starts_operand() {
                break;
            }
            children.push(self.parse_unary()?);
        }
        Ok(Expr::and(children))
    }

    fn parse_unary(&mut self) -> Result<Expr, QueryError> {
        if matches!(self.peek(), Some(Kind::Not)) {
            self.descend(self.tokens[self.pos].offset)?;
            self.operator()?;
            let child = self.parse_unary()?;
            self.depth -= 1;
            return Ok(Expr::not(child));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, QueryError> {
        let Some(token) = self.tokens.get(self.pos).cloned() else {
            return Err(QueryError::Empty);
        };
        self.pos += 1;
        match token.kind {
            Kind::Term(term) => Ok(Expr::Term(term)),
            Kind::LParen => {
                if matches!(self.peek(), Some(Kind::RParen)) {
                    return Err(QueryError::Empty);
                }
                self.descend(token.offset)?;
                let inner = self.parse_or()?;
                self.depth -= 1;
                if matches!(self.peek(), Some(Kind::RParen)) {
                    self.pos += 1;
                    Ok(inner)
                } else {
                    Err(QueryError::UnbalancedParen { offset: token.offset })
                }
            }
            Kind::RParen => Err(QueryError::UnbalancedParen { offset: token.offset }),
            op @ (Kind::And | Kind::Or | Kind::Not) => {
                Err(QueryError::DanglingOperator { operator: op.to_string(), offset: token.offset })
            }
        }
    }
}
