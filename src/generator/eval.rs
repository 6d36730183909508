//! Exact Expression Evaluation
//!
//! Recursive descent over `+ - * /`, parentheses and unary signs, using
//! exact rationals. Used to check that a problem's stored answer really is
//! the value of its expression.

use num_rational::BigRational;
use num_traits::Zero;
use thiserror::Error;

use crate::core::hash::normalize_expression;
use crate::core::rational::parse_decimal;

/// Evaluation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    /// A character that cannot start or continue a term.
    #[error("unexpected character '{ch}' at position {pos}")]
    UnexpectedChar {
        /// Offending character.
        ch: char,
        /// Byte offset in the normalized expression.
        pos: usize,
    },

    /// Input ended in the middle of a term.
    #[error("unexpected end of expression")]
    UnexpectedEnd,

    /// A literal that is not a valid number.
    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    /// Division by an expression equal to zero.
    #[error("division by zero")]
    DivisionByZero,
}

/// Evaluate an arithmetic expression exactly.
pub fn evaluate(expr: &str) -> Result<BigRational, EvalError> {
    let normalized = normalize_expression(expr);
    let mut parser = Parser { src: normalized.as_bytes(), pos: 0 };
    let value = parser.expression()?;
    match parser.peek() {
        None => Ok(value),
        Some(ch) => Err(EvalError::UnexpectedChar { ch: ch as char, pos: parser.pos }),
    }
}

struct Parser<'a> {
    src: &'a [u8],
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn expression(&mut self) -> Result<BigRational, EvalError> {
        let mut value = self.term()?;
        while let Some(op @ (b'+' | b'-')) = self.peek() {
            self.pos += 1;
            let rhs = self.term()?;
            if op == b'+' {
                value += rhs;
            } else {
                value -= rhs;
            }
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<BigRational, EvalError> {
        let mut value = self.factor()?;
        while let Some(op @ (b'*' | b'/')) = self.peek() {
            self.pos += 1;
            let rhs = self.factor()?;
            if op == b'*' {
                value *= rhs;
            } else {
                if rhs.is_zero() {
                    return Err(EvalError::DivisionByZero);
                }
                value /= rhs;
            }
        }
        Ok(value)
    }

    fn factor(&mut self) -> Result<BigRational, EvalError> {
        match self.peek() {
            None => Err(EvalError::UnexpectedEnd),
            Some(b'-') => {
                self.pos += 1;
                Ok(-self.factor()?)
            }
            Some(b'+') => {
                self.pos += 1;
                self.factor()
            }
            Some(b'(') => {
                self.pos += 1;
                let value = self.expression()?;
                match self.peek() {
                    Some(b')') => {
                        self.pos += 1;
                        Ok(value)
                    }
                    Some(ch) => Err(EvalError::UnexpectedChar { ch: ch as char, pos: self.pos }),
                    None => Err(EvalError::UnexpectedEnd),
                }
            }
            Some(ch) if ch.is_ascii_digit() || ch == b'.' => self.number(),
            Some(ch) => Err(EvalError::UnexpectedChar { ch: ch as char, pos: self.pos }),
        }
    }

    fn number(&mut self) -> Result<BigRational, EvalError> {
        let start = self.pos;
        while matches!(self.peek(), Some(ch) if ch.is_ascii_digit() || ch == b'.') {
            self.pos += 1;
        }
        // The slice is ASCII digits and dots only
        let literal = String::from_utf8_lossy(&self.src[start..self.pos]).into_owned();
        parse_decimal(&literal).ok_or(EvalError::InvalidNumber(literal))
    }
}
