//! Expression Terms
//!
//! A term is a rendered expression together with its exact value and its
//! heuristic difficulty. Leaves are plain numbers.

use std::collections::BTreeSet;

use num_rational::BigRational;

use crate::core::rational::format_rational;
use crate::generator::options::Operator;

/// An expression under construction.
#[derive(Clone, Debug, PartialEq)]
pub struct Term {
    /// Rendered expression, no whitespace.
    pub expr: String,
    /// Exact value of `expr`.
    pub value: BigRational,
    /// True for a bare number.
    pub is_number: bool,
    /// Heuristic difficulty.
    pub difficulty: f64,
    /// Operators applied anywhere in `expr`.
    pub operators: BTreeSet<Operator>,
}

impl Term {
    /// Create a leaf term.
    pub fn number(value: BigRational, difficulty: f64) -> Self {
        Self {
            expr: format_rational(&value),
            value,
            is_number: true,
            difficulty,
            operators: BTreeSet::new(),
        }
    }

    /// Canonical answer string.
    pub fn answer(&self) -> String {
        format_rational(&self.value)
    }

    /// Render for use as an operand that must bind tighter than `+`/`-`.
    pub(crate) fn grouped(&self) -> String {
        if self.is_number {
            self.expr.clone()
        } else {
            format!("({})", self.expr)
        }
    }
}

impl std::fmt::Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let desc = if self.is_number { "Number" } else { "Problem" };
        write!(f, "{}[{:.3}] {{{} = {}}}", desc, self.difficulty, self.expr, self.answer())
    }
}
