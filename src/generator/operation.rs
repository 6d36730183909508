//! Operator Combination
//!
//! Each operator knows how to render two terms into one, compute the exact
//! value, and combine difficulties. `input_difficulty` inverts the
//! combination so the caller can bound the second operand.

use crate::generator::options::{GeneratorConfig, Operator, Options};
use crate::generator::term::Term;

impl Operator {
    /// Largest operand difficulty that keeps the combination within `remaining`.
    pub fn input_difficulty(self, remaining: f64, config: &GeneratorConfig) -> f64 {
        remaining / config.multiplier(self)
    }

    /// Combine `a` and `b` into a new term.
    ///
    /// Without negatives, subtraction puts the larger value first so the
    /// result never drops below zero.
    pub fn apply(self, a: &Term, b: &Term, options: &Options, config: &GeneratorConfig) -> Term {
        let (expr, value, difficulty) = match self {
            Operator::Add => (
                format!("{}+{}", a.expr, b.expr),
                &a.value + &b.value,
                (a.difficulty + b.difficulty) * config.multiplier(self),
            ),
            Operator::Subtract => {
                let (a, b) = if !options.negatives && b.value > a.value { (b, a) } else { (a, b) };
                (
                    format!("{}-{}", a.expr, b.grouped()),
                    &a.value - &b.value,
                    (a.difficulty + b.difficulty) * config.multiplier(self),
                )
            }
            Operator::Multiply => (
                format!("{}*{}", a.grouped(), b.grouped()),
                &a.value * &b.value,
                (a.difficulty * b.difficulty) * config.multiplier(self),
            ),
        };

        let mut operators = a.operators.clone();
        operators.extend(b.operators.iter().copied());
        operators.insert(self);

        Term {
            expr,
            value,
            is_number: false,
            difficulty,
            operators,
        }
    }
}
