// Restricted arithmetic for counting channels that accept things like "50+50".
//
// Only integers, + - * /, unary signs and parentheses. There are no
// identifiers or calls, so nothing a user types can do more than arithmetic.

use thiserror::Error;

/// Deep enough for any sane submission, shallow enough to keep recursion bounded.
const MAX_DEPTH: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExpressionError {
    #[error("Expression is empty")]
    Empty,

    #[error("Unexpected character '{0}'")]
    UnexpectedChar(char),

    #[error("Expression ended unexpectedly")]
    UnexpectedEnd,

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Arithmetic overflow")]
    Overflow,

    #[error("Expression is nested too deeply")]
    TooDeep,
}

/// Evaluate an arithmetic expression with integer semantics.
/// Division truncates toward zero.
pub fn evaluate(input: &str) -> Result<i64, ExpressionError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ExpressionError::Empty);
    }

    let mut parser = Parser {
        chars: input.chars().collect(),
        pos: 0,
        depth: 0,
    };

    let value = parser.expr()?;
    match parser.peek() {
        None => Ok(value),
        Some(c) => Err(ExpressionError::UnexpectedChar(c)),
    }
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
    depth: usize,
}

impl Parser {
    /// Next significant character; whitespace between tokens is skipped.
    fn peek(&mut self) -> Option<char> {
        while self.peek_raw().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        self.peek_raw()
    }

    fn peek_raw(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self) -> Result<i64, ExpressionError> {
        let mut value = self.term()?;
        while let Some(op @ ('+' | '-')) = self.peek() {
            self.pos += 1;
            let rhs = self.term()?;
            value = if op == '+' {
                value.checked_add(rhs)
            } else {
                value.checked_sub(rhs)
            }
            .ok_or(ExpressionError::Overflow)?;
        }
        Ok(value)
    }

    // term := factor (('*' | '/') factor)*
    fn term(&mut self) -> Result<i64, ExpressionError> {
        let mut value = self.factor()?;
        while let Some(op @ ('*' | '/')) = self.peek() {
            self.pos += 1;
            let rhs = self.factor()?;
            value = if op == '*' {
                value.checked_mul(rhs).ok_or(ExpressionError::Overflow)?
            } else if rhs == 0 {
                return Err(ExpressionError::DivisionByZero);
            } else {
                value.checked_div(rhs).ok_or(ExpressionError::Overflow)?
            };
        }
        Ok(value)
    }

    // factor := ('+' | '-') factor | integer | '(' expr ')'
    fn factor(&mut self) -> Result<i64, ExpressionError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ExpressionError::TooDeep);
        }

        let result = match self.peek() {
            None => Err(ExpressionError::UnexpectedEnd),
            Some('+') => {
                self.pos += 1;
                self.factor()
            }
            Some('-') => {
                self.pos += 1;
                self.factor()?
                    .checked_neg()
                    .ok_or(ExpressionError::Overflow)
            }
            Some('(') => {
                self.pos += 1;
                let inner = self.expr()?;
                match self.bump() {
                    Some(')') => Ok(inner),
                    Some(c) => Err(ExpressionError::UnexpectedChar(c)),
                    None => Err(ExpressionError::UnexpectedEnd),
                }
            }
            Some(c) if c.is_ascii_digit() => self.integer(),
            Some(c) => Err(ExpressionError::UnexpectedChar(c)),
        };

        self.depth -= 1;
        result
    }

    fn integer(&mut self) -> Result<i64, ExpressionError> {
        let mut value: i64 = 0;
        while let Some(c) = self.peek_raw() {
            let Some(digit) = c.to_digit(10) else {
                break;
            };
            self.pos += 1;
            value = value
                .checked_mul(10)
                .and_then(|v| v.checked_add(i64::from(digit)))
                .ok_or(ExpressionError::Overflow)?;
        }
        Ok(value)
    }
}
