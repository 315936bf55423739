//! Control/treatment classification of samples.
//!
//! A sample is a control when a [`ControlPredicate`] evaluated against its
//! metadata returns `true`. Predicates are either plain closures or a parsed
//! [`ControlExpr`]:
//!
//! - `substrate == '12C-Con'`
//! - `substrate != '13C-Cel' & day <= 14`
//! - `!(Treatment %in% c('13C-Glu', '13C-Xyl')) | control`
//!
//! A bare column name must hold boolean levels (`TRUE`/`FALSE`).

use crate::data::{SampleView, Variable};
use crate::error::{Result, SipError};
use std::cmp::Ordering;
use std::fmt;

/// Classifies a sample as control (`true`) or labeled treatment (`false`).
pub trait ControlPredicate {
    /// Evaluate against one sample. Errors are configuration errors.
    fn is_control(&self, sample: &SampleView<'_>) -> Result<bool>;
}

impl<F> ControlPredicate for F
where
    F: Fn(&SampleView<'_>) -> bool,
{
    fn is_control(&self, sample: &SampleView<'_>) -> Result<bool> {
        Ok(self(sample))
    }
}

/// A literal on the right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Text(String),
    Number(f64),
    Bool(bool),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Text(s) => write!(f, "'{}'", s),
            Literal::Number(v) => write!(f, "{}", v),
            Literal::Bool(true) => write!(f, "TRUE"),
            Literal::Bool(false) => write!(f, "FALSE"),
        }
    }
}

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn holds(self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

/// Expression tree over sample metadata columns.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlExpr {
    /// Constant `TRUE` / `FALSE`.
    Const(bool),
    /// A column holding boolean levels.
    Column(String),
    /// `column <op> literal`.
    Compare {
        column: String,
        op: CompareOp,
        value: Literal,
    },
    /// `column %in% c(...)`.
    In { column: String, values: Vec<Literal> },
    Not(Box<ControlExpr>),
    And(Box<ControlExpr>, Box<ControlExpr>),
    Or(Box<ControlExpr>, Box<ControlExpr>),
}

impl ControlExpr {
    /// Parse an expression string.
    ///
    /// # Examples
    /// ```
    /// use sipkit::data::ControlExpr;
    /// let expr = ControlExpr::parse("substrate == '12C-Con'").unwrap();
    /// assert_eq!(expr, ControlExpr::equals("substrate", "12C-Con"));
    /// ```
    pub fn parse(input: &str) -> Result<Self> {
        let tokens = tokenize(input)?;
        if tokens.is_empty() {
            return Err(SipError::PredicateParse("Expression is empty".to_string()));
        }
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.or_expr()?;
        if let Some(tok) = parser.peek() {
            return Err(SipError::PredicateParse(format!(
                "Unexpected token {:?} in '{}'",
                tok, input
            )));
        }
        Ok(expr)
    }

    /// `column == 'value'`.
    pub fn equals(column: &str, value: &str) -> Self {
        ControlExpr::Compare {
            column: column.to_string(),
            op: CompareOp::Eq,
            value: Literal::Text(value.to_string()),
        }
    }

    /// Logical negation, e.g. to swap control and treatment.
    pub fn negate(self) -> Self {
        ControlExpr::Not(Box::new(self))
    }

    /// Columns referenced by the expression.
    pub fn columns(&self) -> Vec<&str> {
        match self {
            ControlExpr::Const(_) => vec![],
            ControlExpr::Column(c) => vec![c.as_str()],
            ControlExpr::Compare { column, .. } | ControlExpr::In { column, .. } => {
                vec![column.as_str()]
            }
            ControlExpr::Not(e) => e.columns(),
            ControlExpr::And(a, b) | ControlExpr::Or(a, b) => {
                let mut cols = a.columns();
                cols.extend(b.columns());
                cols
            }
        }
    }

    fn eval(&self, sample: &SampleView<'_>) -> Result<bool> {
        match self {
            ControlExpr::Const(b) => Ok(*b),
            ControlExpr::Column(column) => {
                let var = lookup(sample, column)?;
                var.as_bool().ok_or_else(|| {
                    eval_error(sample, format!("column '{}' value '{}' is not boolean", column, var))
                })
            }
            ControlExpr::Compare { column, op, value } => {
                let var = lookup(sample, column)?;
                let ordering = compare(var, value).ok_or_else(|| {
                    eval_error(
                        sample,
                        format!("cannot compare '{}' value '{}' with {}", column, var, value),
                    )
                })?;
                Ok(op.holds(ordering))
            }
            ControlExpr::In { column, values } => {
                let var = lookup(sample, column)?;
                let mut comparable = false;
                for value in values {
                    match compare(var, value) {
                        Some(Ordering::Equal) => return Ok(true),
                        Some(_) => comparable = true,
                        None => {}
                    }
                }
                if comparable {
                    Ok(false)
                } else {
                    Err(eval_error(
                        sample,
                        format!("cannot match '{}' value '{}' against {}", column, var, self),
                    ))
                }
            }
            ControlExpr::Not(e) => Ok(!e.eval(sample)?),
            ControlExpr::And(a, b) => Ok(a.eval(sample)? && b.eval(sample)?),
            ControlExpr::Or(a, b) => Ok(a.eval(sample)? || b.eval(sample)?),
        }
    }
}

impl ControlPredicate for ControlExpr {
    fn is_control(&self, sample: &SampleView<'_>) -> Result<bool> {
        self.eval(sample)
    }
}

impl fmt::Display for ControlExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlExpr::Const(true) => write!(f, "TRUE"),
            ControlExpr::Const(false) => write!(f, "FALSE"),
            ControlExpr::Column(c) => write!(f, "{}", c),
            ControlExpr::Compare { column, op, value } => {
                write!(f, "{} {} {}", column, op.symbol(), value)
            }
            ControlExpr::In { column, values } => {
                let items: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "{} %in% c({})", column, items.join(", "))
            }
            ControlExpr::Not(e) => write!(f, "!({})", e),
            ControlExpr::And(a, b) => write!(f, "({} & {})", a, b),
            ControlExpr::Or(a, b) => write!(f, "({} | {})", a, b),
        }
    }
}

fn eval_error(sample: &SampleView<'_>, reason: String) -> SipError {
    SipError::PredicateEval {
        sample: sample.sample_id().to_string(),
        reason,
    }
}

fn lookup<'a>(sample: &SampleView<'a>, column: &str) -> Result<&'a Variable> {
    let var = sample
        .get(column)
        .ok_or_else(|| SipError::MissingColumn(column.to_string()))?;
    if var.is_missing() {
        return Err(eval_error(sample, format!("column '{}' is missing", column)));
    }
    Ok(var)
}

/// Order a metadata value against a literal; `None` when incomparable.
fn compare(var: &Variable, literal: &Literal) -> Option<Ordering> {
    match literal {
        Literal::Text(s) => Some(var.to_string().as_str().cmp(s.as_str())),
        Literal::Number(n) => var.as_number().and_then(|v| v.partial_cmp(n)),
        Literal::Bool(b) => var.as_bool().map(|v| v.cmp(b)),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Text(String),
    Number(f64),
    Op(CompareOp),
    And,
    Or,
    Not,
    In,
    LParen,
    RParen,
    Comma,
    Minus,
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '&' => {
                tokens.push(Token::And);
                i += if next == Some('&') { 2 } else { 1 };
            }
            '|' => {
                tokens.push(Token::Or);
                i += if next == Some('|') { 2 } else { 1 };
            }
            '=' if next == Some('=') => {
                tokens.push(Token::Op(CompareOp::Eq));
                i += 2;
            }
            '!' if next == Some('=') => {
                tokens.push(Token::Op(CompareOp::Ne));
                i += 2;
            }
            '!' => {
                tokens.push(Token::Not);
                i += 1;
            }
            '<' | '>' => {
                let op = match (c, next == Some('=')) {
                    ('<', true) => CompareOp::Le,
                    ('<', false) => CompareOp::Lt,
                    (_, true) => CompareOp::Ge,
                    (_, false) => CompareOp::Gt,
                };
                tokens.push(Token::Op(op));
                i += if next == Some('=') { 2 } else { 1 };
            }
            '%' => {
                let rest: String = chars[i..].iter().take(4).collect();
                if rest != "%in%" {
                    return Err(SipError::PredicateParse(format!(
                        "Unknown operator at position {}",
                        i
                    )));
                }
                tokens.push(Token::In);
                i += 4;
            }
            '\'' | '"' | '`' => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|&ch| ch == c)
                    .ok_or_else(|| {
                        SipError::PredicateParse(format!("Unterminated quote at position {}", i))
                    })?;
                let text: String = chars[i + 1..i + 1 + end].iter().collect();
                // Backticks quote column names, other quotes quote values.
                tokens.push(if c == '`' {
                    Token::Ident(text)
                } else {
                    Token::Text(text)
                });
                i += end + 2;
            }
            c if c.is_ascii_digit() || (c == '.' && next.map_or(false, |n| n.is_ascii_digit())) => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_ascii_digit()
                        || chars[i] == '.'
                        || chars[i] == 'e'
                        || chars[i] == 'E'
                        || ((chars[i] == '-' || chars[i] == '+')
                            && matches!(chars[i - 1], 'e' | 'E')))
                {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let value = text.parse::<f64>().map_err(|_| {
                    SipError::PredicateParse(format!("Invalid number '{}'", text))
                })?;
                tokens.push(Token::Number(value));
            }
            c if c.is_alphabetic() || c == '_' || c == '.' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '.')
                {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => {
                return Err(SipError::PredicateParse(format!(
                    "Unexpected character '{}' at position {}",
                    other, i
                )))
            }
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        match self.advance() {
            Some(tok) if tok == expected => Ok(()),
            other => Err(SipError::PredicateParse(format!(
                "Expected {:?}, found {:?}",
                expected, other
            ))),
        }
    }

    fn or_expr(&mut self) -> Result<ControlExpr> {
        let mut lhs = self.and_expr()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let rhs = self.and_expr()?;
            lhs = ControlExpr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<ControlExpr> {
        let mut lhs = self.unary()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = ControlExpr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<ControlExpr> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            return Ok(self.unary()?.negate());
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<ControlExpr> {
        match self.advance() {
            Some(Token::LParen) => {
                let expr = self.or_expr()?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }
            Some(Token::Ident(name)) => match name.as_str() {
                "TRUE" | "T" => Ok(ControlExpr::Const(true)),
                "FALSE" | "F" => Ok(ControlExpr::Const(false)),
                _ => self.column_expr(name),
            },
            other => Err(SipError::PredicateParse(format!(
                "Expected a column name or '(', found {:?}",
                other
            ))),
        }
    }

    fn column_expr(&mut self, column: String) -> Result<ControlExpr> {
        match self.peek().cloned() {
            Some(Token::Op(op)) => {
                self.pos += 1;
                let value = self.literal()?;
                Ok(ControlExpr::Compare { column, op, value })
            }
            Some(Token::In) => {
                self.pos += 1;
                let values = self.literal_list()?;
                Ok(ControlExpr::In { column, values })
            }
            _ => Ok(ControlExpr::Column(column)),
        }
    }

    fn literal_list(&mut self) -> Result<Vec<Literal>> {
        if matches!(self.peek(), Some(Token::Ident(name)) if name == "c") {
            self.pos += 1;
            self.expect(Token::LParen)?;
            let mut values = vec![self.literal()?];
            while self.peek() == Some(&Token::Comma) {
                self.pos += 1;
                values.push(self.literal()?);
            }
            self.expect(Token::RParen)?;
            Ok(values)
        } else {
            Ok(vec![self.literal()?])
        }
    }

    fn literal(&mut self) -> Result<Literal> {
        match self.advance() {
            Some(Token::Text(s)) => Ok(Literal::Text(s)),
            Some(Token::Number(v)) => Ok(Literal::Number(v)),
            Some(Token::Minus) => match self.advance() {
                Some(Token::Number(v)) => Ok(Literal::Number(-v)),
                other => Err(SipError::PredicateParse(format!(
                    "Expected a number after '-', found {:?}",
                    other
                ))),
            },
            Some(Token::Ident(name)) if name == "TRUE" || name == "T" => Ok(Literal::Bool(true)),
            Some(Token::Ident(name)) if name == "FALSE" || name == "F" => Ok(Literal::Bool(false)),
            other => Err(SipError::PredicateParse(format!(
                "Expected a literal value, found {:?}",
                other
            ))),
        }
    }
}
