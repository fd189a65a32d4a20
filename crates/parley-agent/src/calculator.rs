//! Arithmetic calculator tool.
//!
//! Evaluates `+ - * /` with parentheses and unary signs. Integer arithmetic
//! stays integral and checked; `/` always produces a decimal. Evaluation
//! failures are part of the tool's answer, not errors, so the planner's
//! caller can show them to the user.

use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::errors::{AgentError, Result};
use crate::tools::Tool;

/// Name the planner uses for [`CalculatorTool`].
pub const CALCULATOR_NAME: &str = "calculator";

const MAX_DEPTH: usize = 64;

/// Evaluates arithmetic passed as the `expression` argument.
#[derive(Clone, Copy, Debug, Default)]
pub struct CalculatorTool;

impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        CALCULATOR_NAME
    }

    fn description(&self) -> &str {
        "Performs basic arithmetic expressions."
    }

    fn run(&self, arguments: &Map<String, Value>) -> Result<String> {
        let expression = arguments
            .get("expression")
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::Tool {
                name: CALCULATOR_NAME.into(),
                message: "missing string argument `expression`".into(),
            })?;

        Ok(match evaluate(expression) {
            Ok(value) => format!("Result: {value}"),
            Err(e) => {
                debug!(expression, error = %e, "calculator rejected expression");
                format!("Error evaluating expression: {e}")
            }
        })
    }
}

/// A calculator value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Number {
    /// Whole number from integer-only arithmetic.
    Int(i64),
    /// Anything that went through a decimal or a division.
    Float(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            #[allow(clippy::cast_precision_loss)]
            Self::Int(n) => n as f64,
            Self::Float(f) => f,
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            // Debug keeps the trailing `.0` on whole decimals
            Self::Float(x) => write!(f, "{x:?}"),
        }
    }
}

/// Why an expression could not be evaluated.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CalcError {
    /// Nothing to evaluate.
    #[error("empty expression")]
    Empty,
    /// A character outside the grammar.
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),
    /// A malformed or out-of-range literal.
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
    /// A token where the grammar wanted something else.
    #[error("unexpected '{0}'")]
    UnexpectedToken(String),
    /// Input ended mid-expression.
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    /// Division by zero.
    #[error("division by zero")]
    DivisionByZero,
    /// Integer result out of range.
    #[error("integer overflow")]
    Overflow,
    /// Parentheses nested past the evaluator's limit.
    #[error("expression nested too deeply")]
    TooDeep,
}

/// Evaluate an arithmetic expression.
pub fn evaluate(expression: &str) -> std::result::Result<Number, CalcError> {
    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err(CalcError::Empty);
    }
    let mut parser = Parser { tokens, pos: 0 };
    let value = parser.expr(0)?;
    match parser.peek() {
        None => Ok(value),
        Some(token) => Err(CalcError::UnexpectedToken(token.to_string())),
    }
}

// ── Lexing ──────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq)]
enum Token {
    Num(Number),
    Op(char),
    Open,
    Close,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Num(n) => write!(f, "{n}"),
            Self::Op(c) => write!(f, "{c}"),
            Self::Open => f.write_str("("),
            Self::Close => f.write_str(")"),
        }
    }
}

fn tokenize(input: &str) -> std::result::Result<Vec<Token>, CalcError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();
    while let Some(&(start, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                let _ = chars.next();
            }
            '+' | '-' | '*' | '/' => {
                let _ = chars.next();
                tokens.push(Token::Op(c));
            }
            '(' => {
                let _ = chars.next();
                tokens.push(Token::Open);
            }
            ')' => {
                let _ = chars.next();
                tokens.push(Token::Close);
            }
            c if c.is_ascii_digit() || c == '.' => {
                let mut end = start;
                while let Some(&(i, d)) = chars.peek() {
                    if !(d.is_ascii_digit() || d == '.') {
                        break;
                    }
                    end = i + d.len_utf8();
                    let _ = chars.next();
                }
                tokens.push(Token::Num(parse_literal(&input[start..end])?));
            }
            other => return Err(CalcError::UnexpectedChar(other)),
        }
    }
    Ok(tokens)
}

fn parse_literal(text: &str) -> std::result::Result<Number, CalcError> {
    let invalid = || CalcError::InvalidNumber(text.to_owned());
    if text.contains('.') {
        if text == "." || text.matches('.').count() > 1 {
            return Err(invalid());
        }
        text.parse().map(Number::Float).map_err(|_| invalid())
    } else {
        text.parse().map(Number::Int).map_err(|_| invalid())
    }
}

// ── Parsing and evaluation ──────────────────────────────────────────────────

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.peek();
        self.pos += 1;
        token
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self, depth: usize) -> std::result::Result<Number, CalcError> {
        let mut value = self.term(depth)?;
        while let Some(Token::Op(op @ ('+' | '-'))) = self.peek() {
            self.pos += 1;
            let rhs = self.term(depth)?;
            value = apply(op, value, rhs)?;
        }
        Ok(value)
    }

    // term := unary (('*' | '/') unary)*
    fn term(&mut self, depth: usize) -> std::result::Result<Number, CalcError> {
        let mut value = self.unary(depth)?;
        while let Some(Token::Op(op @ ('*' | '/'))) = self.peek() {
            self.pos += 1;
            let rhs = self.unary(depth)?;
            value = apply(op, value, rhs)?;
        }
        Ok(value)
    }

    // unary := ('+' | '-') unary | primary
    fn unary(&mut self, depth: usize) -> std::result::Result<Number, CalcError> {
        if depth > MAX_DEPTH {
            return Err(CalcError::TooDeep);
        }
        match self.peek() {
            Some(Token::Op('+')) => {
                self.pos += 1;
                self.unary(depth + 1)
            }
            Some(Token::Op('-')) => {
                self.pos += 1;
                match self.unary(depth + 1)? {
                    Number::Int(n) => n.checked_neg().map(Number::Int).ok_or(CalcError::Overflow),
                    Number::Float(f) => Ok(Number::Float(-f)),
                }
            }
            _ => self.primary(depth),
        }
    }

    // primary := number | '(' expr ')'
    fn primary(&mut self, depth: usize) -> std::result::Result<Number, CalcError> {
        match self.next() {
            Some(Token::Num(n)) => Ok(n),
            Some(Token::Open) => {
                let value = self.expr(depth + 1)?;
                match self.next() {
                    Some(Token::Close) => Ok(value),
                    Some(other) => Err(CalcError::UnexpectedToken(other.to_string())),
                    None => Err(CalcError::UnexpectedEnd),
                }
            }
            Some(other) => Err(CalcError::UnexpectedToken(other.to_string())),
            None => Err(CalcError::UnexpectedEnd),
        }
    }
}

fn apply(op: char, lhs: Number, rhs: Number) -> std::result::Result<Number, CalcError> {
    if op == '/' {
        let divisor = rhs.as_f64();
        if divisor == 0.0 {
            return Err(CalcError::DivisionByZero);
        }
        return Ok(Number::Float(lhs.as_f64() / divisor));
    }

    match (lhs, rhs) {
        (Number::Int(a), Number::Int(b)) => {
            let result = match op {
                '+' => a.checked_add(b),
                '-' => a.checked_sub(b),
                _ => a.checked_mul(b),
            };
            result.map(Number::Int).ok_or(CalcError::Overflow)
        }
        _ => {
            let (a, b) = (lhs.as_f64(), rhs.as_f64());
            Ok(Number::Float(match op {
                '+' => a + b,
                '-' => a - b,
                _ => a * b,
            }))
        }
    }
}
