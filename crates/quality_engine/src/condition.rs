//! Row predicates used to gate rules.
//!
//! A condition string is compiled once into an [`Expr`] tree and evaluated
//! a whole batch at a time, producing one boolean per record.
//!
//! ```
//! use quality_engine::{Batch, Columns, DataValue, compile};
//! use std::sync::Arc;
//!
//! let predicate = compile("status == 'active' AND age >= 18").unwrap();
//! let columns = Arc::new(Columns::new(["status", "age"]));
//! let batch = Batch::from_rows(
//!     columns,
//!     vec![
//!         vec!["active".into(), "30".into()],
//!         vec!["active".into(), "12".into()],
//!         vec!["closed".into(), "40".into()],
//!     ],
//!     1,
//! );
//! assert_eq!(predicate.evaluate(&batch), vec![true, false, false]);
//! ```

use crate::{Batch, ConditionError, DataValue};
use std::cmp::Ordering;
use std::fmt;

/// Comparison operators.
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
    /// Parses an operator symbol (`==`, `=`, `!=`, `<>`, `<`, `<=`, `>`, `>=`).
    pub fn parse(symbol: &str) -> Option<Self> {
        match symbol.trim() {
            "==" | "=" => Some(Self::Eq),
            "!=" | "<>" => Some(Self::Ne),
            "<" => Some(Self::Lt),
            "<=" => Some(Self::Le),
            ">" => Some(Self::Gt),
            ">=" => Some(Self::Ge),
            _ => None,
        }
    }

    /// The canonical symbol.
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }

    fn holds(&self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
            Self::Lt => ordering == Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
            Self::Gt => ordering == Ordering::Greater,
            Self::Ge => ordering != Ordering::Less,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Orders two non-null values.
///
/// Numbers compare numerically (numeric strings included), booleans as
/// booleans, everything else as text. Returns `None` when either side is null
/// or the values cannot be compared (e.g., a number against `"abc"`).
pub fn compare_values(left: &DataValue, right: &DataValue) -> Option<Ordering> {
    if left.is_null() || right.is_null() {
        return None;
    }

    let numeric = |v: &DataValue| matches!(v, DataValue::Int(_) | DataValue::Float(_));
    let boolean = |v: &DataValue| matches!(v, DataValue::Bool(_));

    if boolean(left) || boolean(right) {
        return Some(left.as_bool()?.cmp(&right.as_bool()?));
    }
    if let (DataValue::Int(a), DataValue::Int(b)) = (left, right) {
        return Some(a.cmp(b));
    }
    match (left.as_f64(), right.as_f64()) {
        (Some(a), Some(b)) => a.partial_cmp(&b),
        _ if numeric(left) || numeric(right) => None,
        _ => Some(left.to_string().cmp(&right.to_string())),
    }
}

/// A literal in a condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    String(String),
    Bool(bool),
    Null,
}

impl Literal {
    fn to_value(&self) -> DataValue {
        match self {
            Literal::Number(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => DataValue::Int(*n as i64),
            Literal::Number(n) => DataValue::Float(*n),
            Literal::String(s) => DataValue::String(s.clone()),
            Literal::Bool(b) => DataValue::Bool(*b),
            Literal::Null => DataValue::Null,
        }
    }
}

/// Compiled condition tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    FieldRef(String),
    Literal(Literal),
    Comparison {
        left: Box<Expr>,
        op: CompareOp,
        right: Box<Expr>,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

impl Expr {
    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::FieldRef(name) => {
                if !out.contains(&name.as_str()) {
                    out.push(name);
                }
            }
            Expr::Literal(_) => {}
            Expr::Comparison { left, right, .. } | Expr::And(left, right) | Expr::Or(left, right) => {
                left.collect_fields(out);
                right.collect_fields(out);
            }
            Expr::Not(inner) => inner.collect_fields(out),
        }
    }

    /// Three-valued evaluation: `None` is unknown (null or absent operand).
    fn evaluate(&self, batch: &Batch) -> Vec<Option<bool>> {
        let n = batch.len();
        match self {
            Expr::Literal(Literal::Bool(b)) => vec![Some(*b); n],
            Expr::Literal(_) => vec![None; n],
            Expr::FieldRef(name) => match batch.column(name) {
                None => vec![None; n],
                Some(values) => values.iter().map(DataValue::as_bool).collect(),
            },
            Expr::Comparison { left, op, right } => compare_operands(batch, left, *op, right),
            Expr::And(left, right) => {
                let mut mask = left.evaluate(batch);
                if mask.iter().any(|m| *m != Some(false)) {
                    for (m, r) in mask.iter_mut().zip(right.evaluate(batch)) {
                        *m = match (*m, r) {
                            (Some(false), _) | (_, Some(false)) => Some(false),
                            (Some(true), Some(true)) => Some(true),
                            _ => None,
                        };
                    }
                }
                mask
            }
            Expr::Or(left, right) => {
                let mut mask = left.evaluate(batch);
                if mask.iter().any(|m| *m != Some(true)) {
                    for (m, r) in mask.iter_mut().zip(right.evaluate(batch)) {
                        *m = match (*m, r) {
                            (Some(true), _) | (_, Some(true)) => Some(true),
                            (Some(false), Some(false)) => Some(false),
                            _ => None,
                        };
                    }
                }
                mask
            }
            Expr::Not(inner) => inner.evaluate(batch).into_iter().map(|m| m.map(|b| !b)).collect(),
        }
    }
}

static NULL: DataValue = DataValue::Null;

enum Operand<'a> {
    Column(&'a [DataValue]),
    Scalar(DataValue),
    Missing,
}

impl Operand<'_> {
    fn resolve<'a>(batch: &'a Batch, expr: &Expr) -> Operand<'a> {
        match expr {
            Expr::FieldRef(name) => batch.column(name).map_or(Operand::Missing, Operand::Column),
            Expr::Literal(literal) => Operand::Scalar(literal.to_value()),
            // The parser only puts fields and literals under a comparison.
            _ => Operand::Missing,
        }
    }

    fn get(&self, row: usize) -> &DataValue {
        match self {
            Operand::Column(values) => &values[row],
            Operand::Scalar(value) => value,
            Operand::Missing => &NULL,
        }
    }
}

fn compare_operands(batch: &Batch, left: &Expr, op: CompareOp, right: &Expr) -> Vec<Option<bool>> {
    let n = batch.len();
    let left = Operand::resolve(batch, left);
    let right = Operand::resolve(batch, right);
    if matches!(left, Operand::Missing) || matches!(right, Operand::Missing) {
        return vec![None; n];
    }

    let null_test = |operand: &Operand<'_>| matches!(operand, Operand::Scalar(DataValue::Null));
    if null_test(&left) || null_test(&right) {
        let other = if null_test(&left) { &right } else { &left };
        return (0..n)
            .map(|i| {
                let is_null = other.get(i).is_null();
                match op {
                    CompareOp::Eq => Some(is_null),
                    CompareOp::Ne => Some(!is_null),
                    _ => None,
                }
            })
            .collect();
    }

    (0..n)
        .map(|i| compare_values(left.get(i), right.get(i)).map(|ord| op.holds(ord)))
        .collect()
}

/// A condition ready to be evaluated.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledPredicate {
    source: String,
    expr: Expr,
}

impl CompiledPredicate {
    /// The expression tree.
    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// The original text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Field names referenced by the condition, in first-use order.
    pub fn fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.expr.collect_fields(&mut out);
        out
    }

    /// One boolean per record of the batch. Pure.
    ///
    /// Null and absent operands are unknown and propagate through `NOT`,
    /// `AND` and `OR`; a record is selected only when the result is known
    /// to be true.
    pub fn evaluate(&self, batch: &Batch) -> Vec<bool> {
        self.expr
            .evaluate(batch)
            .into_iter()
            .map(|m| m == Some(true))
            .collect()
    }
}

impl fmt::Display for CompiledPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Parses a condition.
pub fn compile(expression: &str) -> Result<CompiledPredicate, ConditionError> {
    let tokens = tokenize(expression)?;
    let mut parser = Parser {
        source: expression,
        tokens: &tokens,
        pos: 0,
    };
    let expr = parser.parse_or()?;
    if let Some((position, token)) = parser.tokens.get(parser.pos) {
        return Err(syntax(expression, *position, format!("unexpected {}", token)));
    }
    Ok(CompiledPredicate {
        source: expression.to_string(),
        expr,
    })
}

/// Parses a condition and checks every field against a known column set.
pub fn compile_with_columns<S: AsRef<str>>(
    expression: &str,
    columns: &[S],
) -> Result<CompiledPredicate, ConditionError> {
    let predicate = compile(expression)?;
    if let Some(unknown) = predicate
        .fields()
        .into_iter()
        .find(|field| !columns.iter().any(|c| c.as_ref() == *field))
    {
        return Err(ConditionError::UnknownField {
            field: unknown.to_string(),
        });
    }
    Ok(predicate)
}

fn syntax(expression: &str, position: usize, message: impl Into<String>) -> ConditionError {
    ConditionError::Syntax {
        expression: expression.to_string(),
        position,
        message: message.into(),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(f64),
    Str(String),
    True,
    False,
    Null,
    And,
    Or,
    Not,
    Op(CompareOp),
    LParen,
    RParen,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(name) => write!(f, "field '{}'", name),
            Token::Number(n) => write!(f, "number {}", n),
            Token::Str(s) => write!(f, "string '{}'", s),
            Token::True => f.write_str("'true'"),
            Token::False => f.write_str("'false'"),
            Token::Null => f.write_str("'null'"),
            Token::And => f.write_str("'AND'"),
            Token::Or => f.write_str("'OR'"),
            Token::Not => f.write_str("'NOT'"),
            Token::Op(op) => write!(f, "operator '{}'", op),
            Token::LParen => f.write_str("'('"),
            Token::RParen => f.write_str("')'"),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<(usize, Token)>, ConditionError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(pos, ch)) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                tokens.push((pos, Token::LParen));
                chars.next();
            }
            ')' => {
                tokens.push((pos, Token::RParen));
                chars.next();
            }
            '=' | '!' | '<' | '>' | '&' | '|' => {
                chars.next();
                let next = chars.peek().map(|&(_, c)| c);
                let (token, two) = match (ch, next) {
                    ('=', Some('=')) => (Token::Op(CompareOp::Eq), true),
                    ('=', _) => (Token::Op(CompareOp::Eq), false),
                    ('!', Some('=')) => (Token::Op(CompareOp::Ne), true),
                    ('!', _) => (Token::Not, false),
                    ('<', Some('=')) => (Token::Op(CompareOp::Le), true),
                    ('<', Some('>')) => (Token::Op(CompareOp::Ne), true),
                    ('<', _) => (Token::Op(CompareOp::Lt), false),
                    ('>', Some('=')) => (Token::Op(CompareOp::Ge), true),
                    ('>', _) => (Token::Op(CompareOp::Gt), false),
                    ('&', Some('&')) => (Token::And, true),
                    ('|', Some('|')) => (Token::Or, true),
                    _ => return Err(syntax(input, pos, format!("unexpected character '{}'", ch))),
                };
                if two {
                    chars.next();
                }
                tokens.push((pos, token));
            }
            '\'' | '"' => {
                let quote = ch;
                chars.next();
                let mut text = String::new();
                let mut closed = false;
                while let Some((_, c)) = chars.next() {
                    match c {
                        '\\' => match chars.next() {
                            Some((_, 'n')) => text.push('\n'),
                            Some((_, 't')) => text.push('\t'),
                            Some((_, escaped)) => text.push(escaped),
                            None => break,
                        },
                        c if c == quote => {
                            closed = true;
                            break;
                        }
                        c => text.push(c),
                    }
                }
                if !closed {
                    return Err(syntax(input, pos, "unterminated string"));
                }
                tokens.push((pos, Token::Str(text)));
            }
            '`' => {
                chars.next();
                let mut name = String::new();
                let mut closed = false;
                for (_, c) in chars.by_ref() {
                    if c == '`' {
                        closed = true;
                        break;
                    }
                    name.push(c);
                }
                if !closed || name.is_empty() {
                    return Err(syntax(input, pos, "unterminated quoted field name"));
                }
                tokens.push((pos, Token::Ident(name)));
            }
            '0'..='9' | '.' | '-' | '+' => {
                let mut num_str = String::new();
                num_str.push(ch);
                chars.next();
                while let Some(&(_, c)) = chars.peek() {
                    let exponent_sign = (c == '-' || c == '+')
                        && matches!(num_str.chars().last(), Some('e' | 'E'));
                    if c.is_ascii_digit() || c == '.' || c == 'e' || c == 'E' || exponent_sign {
                        num_str.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let num: f64 = num_str
                    .parse()
                    .map_err(|_| syntax(input, pos, format!("invalid number '{}'", num_str)))?;
                tokens.push((pos, Token::Number(num)));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut word = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' || c == '.' {
                        word.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let token = match word.to_ascii_lowercase().as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "true" => Token::True,
                    "false" => Token::False,
                    "null" => Token::Null,
                    _ => Token::Ident(word),
                };
                tokens.push((pos, token));
            }
            _ => {
                return Err(syntax(input, pos, format!("unexpected character '{}'", ch)));
            }
        }
    }

    Ok(tokens)
}

struct Parser<'a> {
    source: &'a str,
    tokens: &'a [(usize, Token)],
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn position(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map_or(self.source.len(), |(p, _)| *p)
    }

    fn error(&self, message: impl Into<String>) -> ConditionError {
        syntax(self.source, self.position(), message)
    }

    // or = and (OR and)*
    fn parse_or(&mut self) -> Result<Expr, ConditionError> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    // and = not (AND not)*
    fn parse_and(&mut self) -> Result<Expr, ConditionError> {
        let mut left = self.parse_not()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let right = self.parse_not()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    // not = NOT not | primary
    fn parse_not(&mut self) -> Result<Expr, ConditionError> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            return Ok(Expr::Not(Box::new(self.parse_not()?)));
        }
        self.parse_primary()
    }

    // primary = '(' or ')' | operand (op operand)?
    fn parse_primary(&mut self) -> Result<Expr, ConditionError> {
        if self.peek() == Some(&Token::LParen) {
            self.pos += 1;
            let inner = self.parse_or()?;
            if self.peek() != Some(&Token::RParen) {
                return Err(self.error("expected ')'"));
            }
            self.pos += 1;
            return Ok(inner);
        }

        let left = self.parse_operand()?;
        if let Some(Token::Op(op)) = self.peek() {
            let op = *op;
            self.pos += 1;
            let right = self.parse_operand()?;
            return Ok(Expr::Comparison {
                left: Box::new(left),
                op,
                right: Box::new(right),
            });
        }

        match left {
            Expr::FieldRef(_) | Expr::Literal(Literal::Bool(_)) => Ok(left),
            _ => Err(self.error("expected a comparison operator")),
        }
    }

    // operand = IDENT | NUMBER | STRING | true | false | null
    fn parse_operand(&mut self) -> Result<Expr, ConditionError> {
        let expr = match self.peek() {
            Some(Token::Ident(name)) => Expr::FieldRef(name.clone()),
            Some(Token::Number(n)) => Expr::Literal(Literal::Number(*n)),
            Some(Token::Str(s)) => Expr::Literal(Literal::String(s.clone())),
            Some(Token::True) => Expr::Literal(Literal::Bool(true)),
            Some(Token::False) => Expr::Literal(Literal::Bool(false)),
            Some(Token::Null) => Expr::Literal(Literal::Null),
            Some(other) => return Err(self.error(format!("expected a field or literal, found {}", other))),
            None => return Err(self.error("unexpected end of condition")),
        };
        self.pos += 1;
        Ok(expr)
    }
}
